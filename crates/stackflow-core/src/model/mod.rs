//! モデル定義
//!
//! スタックを構成するリソース、プロパティ値、参照を定義します。

mod kind;
mod resource;
mod topology;
mod value;

// Re-exports
pub use kind::*;
pub use resource::*;
pub use topology::*;
pub use value::*;

/// スタックファイルで宣言されたテンプレートパラメータ
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub description: Option<String>,
    pub default: Option<String>,
}

/// `declare` 1回分の記録
///
/// パーサーはファイルを宣言の列に変換し、合成時に順に再生する。
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub kind: ResourceKind,
    pub name: String,
    pub properties: Properties,
}

/// パース済みスタックファイル
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StackFile {
    /// スタック名
    pub name: String,
    pub parameters: Vec<Parameter>,
    /// 宣言順のリソース
    pub declarations: Vec<Declaration>,
}

impl StackFile {
    /// 宣言を再生してトポロジーを構築
    pub fn into_topology(self) -> crate::error::Result<Topology> {
        let mut topology = Topology::new(self.name);
        for decl in self.declarations {
            topology.declare(decl.kind, decl.name, decl.properties)?;
        }
        Ok(topology)
    }
}
