//! KDLパーサー
//!
//! stackflowのKDLスタックファイルをパースし、`declare` 呼び出しの列に変換します。
//!
//! ```kdl
//! stack "engineering"
//!
//! vpc "engineering-vpc" {
//!     cidr "10.0.0.0/18"
//!     availability-zones "us-east-1b" "us-east-1c"
//! }
//! ```

mod resource;

use resource::{parse_parameter, parse_resource};

use crate::error::{FlowError, Result};
use crate::model::{Parameter, ResourceKind, StackFile};
use kdl::KdlDocument;
use regex::Regex;
use std::fs;
use std::path::Path;
use tracing::debug;

/// KDLファイルをパースしてStackFileを生成
pub fn parse_kdl_file<P: AsRef<Path>>(path: P) -> Result<StackFile> {
    let content = fs::read_to_string(path.as_ref())?;
    let name = path
        .as_ref()
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .unwrap_or("unnamed")
        .to_string();
    parse_kdl_string(&content, name)
}

/// KDL文字列をパース
pub fn parse_kdl_string(content: &str, default_name: String) -> Result<StackFile> {
    let doc: KdlDocument = content.parse()?;

    let mut stack = StackFile {
        name: default_name,
        ..Default::default()
    };

    for node in doc.nodes() {
        match node.name().value() {
            "stack" => {
                // stackノードからスタック名を取得
                if let Some(stack_name) =
                    node.entries().first().and_then(|e| e.value().as_string())
                {
                    stack.name = stack_name.to_string();
                }
            }
            "parameter" => {
                stack.parameters.push(parse_parameter(node)?);
            }
            other => {
                let kind = ResourceKind::parse(other)
                    .ok_or_else(|| FlowError::UnknownResourceKind(other.to_string()))?;
                let declaration = parse_resource(kind, node)?;
                debug!(kind = %kind, name = %declaration.name, "Parsed resource node");
                stack.declarations.push(declaration);
            }
        }
    }

    Ok(stack)
}

/// テンプレート展開前のKDLから parameter 宣言のみを抽出
///
/// 展開前のファイルには `{{ ... }}` が含まれ、文書全体としては
/// パースできない場合があるため、parameter 行だけを個別にパースする。
pub fn extract_parameters(content: &str) -> Result<Vec<Parameter>> {
    let re = Regex::new(r"(?m)^\s*parameter\s+.*$")
        .map_err(|e| FlowError::InvalidConfig(format!("正規表現のコンパイルエラー: {}", e)))?;

    let mut parameters = Vec::new();
    for mat in re.find_iter(content) {
        let doc: KdlDocument = mat.as_str().trim().parse().map_err(|e| {
            FlowError::InvalidConfig(format!("KDL パースエラー (parameter 宣言): {}", e))
        })?;
        if let Some(node) = doc.nodes().first() {
            parameters.push(parse_parameter(node)?);
        }
    }

    Ok(parameters)
}

#[cfg(test)]
mod tests;
