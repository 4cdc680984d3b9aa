//! プロパティ値と参照

use crate::error::{FlowError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 他リソースの出力属性への参照
///
/// 名前で解決されるため、宣言前のリソースを指すこともできる。
/// 存在確認は解決段階で行う。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Reference {
    /// 参照先リソース名
    pub resource: String,
    /// 参照先の属性名（id, private_ip など）
    pub attribute: String,
}

impl Reference {
    pub fn new(resource: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            attribute: attribute.into(),
        }
    }

    /// `id` 属性への参照
    pub fn id(resource: impl Into<String>) -> Self {
        Self::new(resource, "id")
    }

    /// `"web1.private_ip"` 形式をパース
    ///
    /// 属性を省略した場合は `id` になる。
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let (resource, attribute) = match s.rsplit_once('.') {
            Some((resource, attribute)) => (resource, attribute),
            None => (s, "id"),
        };
        if resource.is_empty() || attribute.is_empty() {
            return Err(FlowError::InvalidReference(s.to_string()));
        }
        Ok(Self::new(resource, attribute.replace('-', "_")))
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.resource, self.attribute)
    }
}

/// プロパティ値
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Ref(Reference),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&Reference> {
        match self {
            Value::Ref(r) => Some(r),
            _ => None,
        }
    }

    /// リストなら各要素、それ以外は自身のみを返す
    ///
    /// `ingress` のように1件でも複数件でも書けるプロパティ向け。
    pub fn items(&self) -> Vec<&Value> {
        match self {
            Value::List(items) => items.iter().collect(),
            other => vec![other],
        }
    }

    /// 値に含まれる参照をパス付きで再帰的に列挙
    ///
    /// パスは `ingress[1].source` の形式。
    pub fn references<'a>(&'a self, path: &str, out: &mut Vec<(String, &'a Reference)>) {
        match self {
            Value::Ref(r) => out.push((path.to_string(), r)),
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    item.references(&format!("{}[{}]", path, i), out);
                }
            }
            Value::Map(map) => {
                for (key, item) in map {
                    item.references(&format!("{}.{}", path, key), out);
                }
            }
            _ => {}
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<u16> for Value {
    fn from(i: u16) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Reference> for Value {
    fn from(r: Reference) -> Self {
        Value::Ref(r)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<Properties> for Value {
    fn from(props: Properties) -> Self {
        Value::Map(props.0)
    }
}

/// リソースのプロパティ（キー順で保持）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties(BTreeMap<String, Value>);

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 全プロパティに含まれる参照を列挙
    pub fn references(&self) -> Vec<(String, &Reference)> {
        let mut out = Vec::new();
        for (key, value) in &self.0 {
            value.references(key, &mut out);
        }
        out
    }
}

impl From<BTreeMap<String, Value>> for Properties {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}
