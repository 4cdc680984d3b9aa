//! Plan error types

use crate::synth::Stage;
use crate::validator::Finding;
use stackflow_core::{FlowError, ResourceKind};
use thiserror::Error;

/// Errors that abort a synthesis run
#[derive(Error, Debug)]
pub enum PlanError {
    #[error(transparent)]
    Declaration(#[from] FlowError),

    #[error("{source_resource}.{property} references undeclared resource '{target}'")]
    DanglingReference {
        source_resource: String,
        property: String,
        target: String,
    },

    #[error(
        "{source_resource}.{property} references unknown attribute '{attribute}' of {kind} '{target}' (exposes: {})",
        .kind.attributes().join(", ")
    )]
    UnknownAttribute {
        source_resource: String,
        property: String,
        target: String,
        kind: ResourceKind,
        attribute: String,
    },

    #[error("Edge {from} -> {to} points outside the topology")]
    InvalidEdge { from: String, to: String },

    #[error("Cyclic dependency: {}", format_cycle(.cycle))]
    CyclicDependency { cycle: Vec<String> },

    #[error("Emission error: {0}")]
    Emission(String),

    #[error("Synthesis already finished ({0})")]
    Finished(Stage),

    #[error("Blocked by {} finding(s)", .findings.len())]
    Blocked { findings: Vec<Finding> },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl PlanError {
    /// Findings attached to a blocked run
    pub fn findings(&self) -> &[Finding] {
        match self {
            PlanError::Blocked { findings } => findings,
            _ => &[],
        }
    }
}

/// A failed synthesis: the stage that failed and why
#[derive(Error, Debug)]
#[error("{stage} stage failed: {error}")]
pub struct SynthError {
    pub stage: Stage,
    #[source]
    pub error: PlanError,
}

impl SynthError {
    pub fn new(stage: Stage, error: impl Into<PlanError>) -> Self {
        Self {
            stage,
            error: error.into(),
        }
    }
}

/// `a -> b -> a`, closing the loop back to the first name
fn format_cycle(cycle: &[String]) -> String {
    let mut parts: Vec<&str> = cycle.iter().map(String::as_str).collect();
    if let Some(first) = cycle.first() {
        parts.push(first);
    }
    parts.join(" -> ")
}

pub type Result<T> = std::result::Result<T, PlanError>;
