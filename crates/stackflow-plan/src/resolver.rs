//! Reference resolution
//!
//! Confirms that every reference in the topology points at a declared
//! resource and an attribute that resource exposes, and turns the
//! references into dependency edges.

use crate::error::{PlanError, Result};
use serde::Serialize;
use stackflow_core::{ResourceId, Topology};
use tracing::{debug, instrument};

/// `from` depends on `to` through `property`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge {
    #[serde(skip)]
    pub from_id: ResourceId,
    #[serde(skip)]
    pub to_id: ResourceId,
    pub from: String,
    pub to: String,
    /// Property path on the source, e.g. `targets[1]`
    pub property: String,
    pub attribute: String,
}

/// A topology whose references are known to be valid
#[derive(Debug, Clone)]
pub struct ResolvedGraph<'a> {
    topology: &'a Topology,
    edges: Vec<Edge>,
}

impl<'a> ResolvedGraph<'a> {
    pub fn topology(&self) -> &'a Topology {
        self.topology
    }

    /// One edge per reference occurrence, in declaration order of the source
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Edges leaving `id`
    pub fn dependencies_of(&self, id: ResourceId) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.from_id == id)
    }
}

/// Resolve every reference in the topology
#[instrument(skip(topology), fields(stack = %topology.name(), resources = topology.len()))]
pub fn resolve(topology: &Topology) -> Result<ResolvedGraph<'_>> {
    let mut edges = Vec::new();

    for resource in topology.resources() {
        for (property, reference) in resource.properties.references() {
            let target = topology.lookup(&reference.resource).ok_or_else(|| {
                PlanError::DanglingReference {
                    source_resource: resource.name.clone(),
                    property: property.clone(),
                    target: reference.resource.clone(),
                }
            })?;

            if !target.kind.exposes(&reference.attribute) {
                return Err(PlanError::UnknownAttribute {
                    source_resource: resource.name.clone(),
                    property,
                    target: target.name.clone(),
                    kind: target.kind,
                    attribute: reference.attribute.clone(),
                });
            }

            debug!(from = %resource.name, to = %target.name, property = %property, "Resolved reference");
            edges.push(Edge {
                from_id: resource.id,
                to_id: target.id,
                from: resource.name.clone(),
                to: target.name.clone(),
                property,
                attribute: reference.attribute.clone(),
            });
        }
    }

    debug!(edge_count = edges.len(), "Resolution complete");
    Ok(ResolvedGraph { topology, edges })
}
