//! リソース定義

use super::kind::ResourceKind;
use super::value::{Properties, Reference, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 宣言順のインデックス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId(pub usize);

impl ResourceId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 宣言されたリソース
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub id: ResourceId,
    pub kind: ResourceKind,
    pub name: String,
    pub properties: Properties,
}

impl Resource {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_reference(&self, key: &str) -> Option<&Reference> {
        self.get(key).and_then(Value::as_reference)
    }
}

/// `declare` の戻り値
///
/// 後続の宣言で `attr()` を使って参照を作る。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceHandle {
    id: ResourceId,
    kind: ResourceKind,
    name: String,
}

impl ResourceHandle {
    pub(crate) fn new(id: ResourceId, kind: ResourceKind, name: String) -> Self {
        Self { id, kind, name }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 出力属性への参照を作成
    pub fn attr(&self, attribute: &str) -> Reference {
        Reference::new(self.name.clone(), attribute)
    }

    /// `id` 属性への参照
    pub fn reference(&self) -> Reference {
        self.attr("id")
    }
}
