//! Plan document emission
//!
//! Turns an ordered, resolved topology into the document handed to the
//! provisioning engine. Only ordered collections are used, so emitting the
//! same topology twice gives byte-identical output.

use crate::error::{PlanError, Result};
use crate::resolver::{Edge, ResolvedGraph};
use crate::validator::{Finding, Severity};
use serde::Serialize;
use stackflow_core::{Reference, Resource, ResourceId, ResourceKind, Value};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, instrument};

/// The synthesized plan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanDocument {
    pub stack: String,
    /// Resources in creation order
    pub resources: Vec<PlanRecord>,
    pub edges: Vec<Edge>,
    pub findings: Vec<Finding>,
}

/// One resource in the plan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanRecord {
    pub resource_type: ResourceKind,
    pub name: String,
    pub resolved_properties: BTreeMap<String, ResolvedValue>,
    /// Names of the resources this one depends on, in creation order
    pub dependency_ids: Vec<String>,
}

/// A property value with references checked against the plan
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResolvedValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    List(Vec<ResolvedValue>),
    Map(BTreeMap<String, ResolvedValue>),
    Ref {
        #[serde(rename = "ref")]
        target: Reference,
    },
}

impl PlanDocument {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn record(&self, name: &str) -> Option<&PlanRecord> {
        self.resources.iter().find(|r| r.name == name)
    }

    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            resources: self.resources.len(),
            edges: self.edges.len(),
            errors: self
                .findings
                .iter()
                .filter(|f| f.severity == Severity::Error)
                .count(),
            warnings: self
                .findings
                .iter()
                .filter(|f| f.severity == Severity::Warning)
                .count(),
        }
    }
}

/// Counts for a one-line report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanSummary {
    pub resources: usize,
    pub edges: usize,
    pub errors: usize,
    pub warnings: usize,
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} resources, {} dependencies, {} errors, {} warnings",
            self.resources, self.edges, self.errors, self.warnings
        )
    }
}

/// Build the plan document for `order`
///
/// Re-checks every reference: it must name a resource in the plan that
/// exposes the attribute and is created before the referring resource.
#[instrument(skip_all, fields(stack = %graph.topology().name()))]
pub fn emit(order: &[ResourceId], graph: &ResolvedGraph<'_>) -> Result<PlanDocument> {
    let topology = graph.topology();

    let mut position: Vec<Option<usize>> = vec![None; topology.len()];
    for (pos, id) in order.iter().enumerate() {
        let Some(slot) = position.get_mut(id.index()) else {
            return Err(PlanError::Emission(format!(
                "resource {} is not part of stack '{}'",
                id,
                topology.name()
            )));
        };
        if slot.is_some() {
            return Err(PlanError::Emission(format!(
                "resource {} appears twice in the creation order",
                id
            )));
        }
        *slot = Some(pos);
    }
    if let Some(missing) = position.iter().position(Option::is_none) {
        return Err(PlanError::Emission(format!(
            "resource '{}' is missing from the creation order",
            topology.resources()[missing].name
        )));
    }

    let mut resources = Vec::with_capacity(order.len());
    for (pos, id) in order.iter().enumerate() {
        let Some(resource) = topology.get(*id) else {
            return Err(PlanError::Emission(format!("unknown resource {}", id)));
        };
        let check = |reference: &Reference| -> Result<()> {
            let target = topology
                .lookup(&reference.resource)
                .filter(|t| t.kind.exposes(&reference.attribute))
                .ok_or_else(|| {
                    PlanError::Emission(format!(
                        "{} references unresolved {}",
                        resource.name, reference
                    ))
                })?;
            match position[target.id.index()] {
                Some(target_pos) if target_pos < pos => Ok(()),
                _ => Err(PlanError::Emission(format!(
                    "{} is ordered before its dependency {}",
                    resource.name, target.name
                ))),
            }
        };

        let mut resolved_properties = BTreeMap::new();
        for (key, value) in resource.properties.iter() {
            resolved_properties.insert(key.clone(), resolve_value(value, &check)?);
        }

        resources.push(PlanRecord {
            resource_type: resource.kind,
            name: resource.name.clone(),
            resolved_properties,
            dependency_ids: dependency_ids(resource, graph, &position),
        });
    }

    debug!(resources = resources.len(), "Emission complete");
    Ok(PlanDocument {
        stack: topology.name().to_string(),
        resources,
        edges: graph.edges().to_vec(),
        findings: Vec::new(),
    })
}

fn resolve_value(
    value: &Value,
    check: &dyn Fn(&Reference) -> Result<()>,
) -> Result<ResolvedValue> {
    Ok(match value {
        Value::String(s) => ResolvedValue::String(s.clone()),
        Value::Integer(i) => ResolvedValue::Integer(*i),
        Value::Float(f) => ResolvedValue::Float(*f),
        Value::Bool(b) => ResolvedValue::Bool(*b),
        Value::List(items) => ResolvedValue::List(
            items
                .iter()
                .map(|item| resolve_value(item, check))
                .collect::<Result<_>>()?,
        ),
        Value::Map(map) => ResolvedValue::Map(
            map.iter()
                .map(|(k, v)| Ok((k.clone(), resolve_value(v, check)?)))
                .collect::<Result<_>>()?,
        ),
        Value::Ref(reference) => {
            check(reference)?;
            ResolvedValue::Ref {
                target: reference.clone(),
            }
        }
    })
}

/// Distinct dependency names, in creation order
fn dependency_ids(
    resource: &Resource,
    graph: &ResolvedGraph<'_>,
    position: &[Option<usize>],
) -> Vec<String> {
    let mut deps: Vec<(Option<usize>, &str)> = graph
        .dependencies_of(resource.id)
        .map(|e| (position[e.to_id.index()], e.to.as_str()))
        .collect();
    deps.sort();
    deps.dedup();
    deps.into_iter().map(|(_, name)| name.to_string()).collect()
}
