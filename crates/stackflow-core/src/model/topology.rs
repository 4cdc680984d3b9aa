//! トポロジー（宣言中のリソースグラフ）

use super::kind::ResourceKind;
use super::resource::{Resource, ResourceHandle, ResourceId};
use super::value::Properties;
use crate::error::{FlowError, Result};
use std::collections::HashMap;
use tracing::debug;

/// 1回の合成で宣言されたリソースの集合
///
/// リソースは宣言順に保持され、`ResourceId` はその位置を表す。
#[derive(Debug, Clone, Default)]
pub struct Topology {
    name: String,
    resources: Vec<Resource>,
    index: HashMap<String, ResourceId>,
}

impl Topology {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// リソースを宣言
    ///
    /// 同名のリソースが既にあれば `DuplicateName` を返す。
    /// `.` は参照の属性区切りなので名前には使えない。
    pub fn declare(
        &mut self,
        kind: ResourceKind,
        name: impl Into<String>,
        properties: Properties,
    ) -> Result<ResourceHandle> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(FlowError::InvalidConfig(format!(
                "{} のリソース名が空です",
                kind
            )));
        }
        if name.contains('.') {
            return Err(FlowError::InvalidConfig(format!(
                "リソース名に '.' は使えません: {}",
                name
            )));
        }
        if self.index.contains_key(&name) {
            return Err(FlowError::DuplicateName(name));
        }

        let id = ResourceId(self.resources.len());
        debug!(resource = %name, kind = %kind, id = id.index(), "Declared resource");
        self.index.insert(name.clone(), id);
        self.resources.push(Resource {
            id,
            kind,
            name: name.clone(),
            properties,
        });

        Ok(ResourceHandle::new(id, kind, name))
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn get(&self, id: ResourceId) -> Option<&Resource> {
        self.resources.get(id.index())
    }

    pub fn lookup(&self, name: &str) -> Option<&Resource> {
        self.index.get(name).and_then(|id| self.get(*id))
    }

    pub fn by_kind(&self, kind: ResourceKind) -> impl Iterator<Item = &Resource> {
        self.resources.iter().filter(move |r| r.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}
