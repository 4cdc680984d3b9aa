//! Synthesis state machine
//!
//! `Declaring -> Resolving -> Ordering -> Validating -> Emitting -> Done`.
//! Transitions only move forward. Any failure moves the run to `Failed`,
//! which is terminal and remembers the stage that failed.

use crate::emit::{PlanDocument, emit};
use crate::error::{PlanError, SynthError};
use crate::order::order;
use crate::resolver::resolve;
use crate::validator::{Finding, Severity, validate};
use serde::{Deserialize, Serialize};
use stackflow_core::{Properties, ResourceHandle, ResourceKind, Topology};
use std::fmt;
use tracing::{debug, info, instrument, warn};

/// Synthesis stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Declaring,
    Resolving,
    Ordering,
    Validating,
    Emitting,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Declaring => write!(f, "Declaring"),
            Stage::Resolving => write!(f, "Resolving"),
            Stage::Ordering => write!(f, "Ordering"),
            Stage::Validating => write!(f, "Validating"),
            Stage::Emitting => write!(f, "Emitting"),
            Stage::Done => write!(f, "Done"),
            Stage::Failed => write!(f, "Failed"),
        }
    }
}

/// Which findings stop a run before emission
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockOn {
    /// Error findings block (default)
    #[default]
    Errors,
    /// Errors and warnings block
    Warnings,
    /// Nothing blocks; findings are only reported
    Never,
}

/// Caller policy for validation findings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Policy {
    pub block_on: BlockOn,
}

impl Policy {
    pub fn new(block_on: BlockOn) -> Self {
        Self { block_on }
    }

    /// Report findings without blocking
    pub fn report_only() -> Self {
        Self::new(BlockOn::Never)
    }

    pub fn is_blocking(&self, finding: &Finding) -> bool {
        match self.block_on {
            BlockOn::Errors => finding.severity == Severity::Error,
            BlockOn::Warnings => true,
            BlockOn::Never => false,
        }
    }

    pub fn blocks(&self, findings: &[Finding]) -> bool {
        findings.iter().any(|f| self.is_blocking(f))
    }
}

/// One synthesis run over an exclusively owned topology
#[derive(Debug)]
pub struct Synthesis {
    topology: Topology,
    stage: Stage,
    failed_stage: Option<Stage>,
}

impl Synthesis {
    pub fn new(name: impl Into<String>) -> Self {
        Self::from_topology(Topology::new(name))
    }

    /// Start from an already declared topology
    pub fn from_topology(topology: Topology) -> Self {
        Self {
            topology,
            stage: Stage::Declaring,
            failed_stage: None,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Stage that was running when the synthesis failed
    pub fn failed_stage(&self) -> Option<Stage> {
        self.failed_stage
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Declare a resource
    ///
    /// A failed declaration fails the whole synthesis.
    pub fn declare(
        &mut self,
        kind: ResourceKind,
        name: impl Into<String>,
        properties: Properties,
    ) -> Result<ResourceHandle, SynthError> {
        if self.stage != Stage::Declaring {
            return Err(SynthError::new(self.stage, PlanError::Finished(self.stage)));
        }
        match self.topology.declare(kind, name, properties) {
            Ok(handle) => Ok(handle),
            Err(e) => {
                self.fail(Stage::Declaring);
                Err(SynthError::new(Stage::Declaring, e))
            }
        }
    }

    /// Resolve, order, validate and emit
    ///
    /// Blocking findings fail the run in `Validating` with every finding
    /// attached. Non-blocking findings are carried into the document.
    #[instrument(skip_all, fields(stack = %self.topology.name(), block_on = ?policy.block_on))]
    pub fn run(&mut self, policy: &Policy) -> Result<PlanDocument, SynthError> {
        if self.stage != Stage::Declaring {
            return Err(SynthError::new(self.stage, PlanError::Finished(self.stage)));
        }

        match synthesize(&self.topology, policy, &mut self.stage) {
            Ok(document) => {
                advance(&mut self.stage, Stage::Done);
                info!(summary = %document.summary(), "Synthesis complete");
                Ok(document)
            }
            Err(e) => {
                warn!(stage = %e.stage, error = %e.error, "Synthesis failed");
                self.fail(e.stage);
                Err(e)
            }
        }
    }

    fn fail(&mut self, stage: Stage) {
        self.failed_stage = Some(stage);
        self.stage = Stage::Failed;
    }
}

fn advance(stage: &mut Stage, next: Stage) {
    debug!(from = %stage, to = %next, "Stage transition");
    *stage = next;
}

fn synthesize(
    topology: &Topology,
    policy: &Policy,
    stage: &mut Stage,
) -> Result<PlanDocument, SynthError> {
    advance(stage, Stage::Resolving);
    let graph = resolve(topology).map_err(|e| SynthError::new(Stage::Resolving, e))?;

    advance(stage, Stage::Ordering);
    let sequence = order(graph.edges(), topology.resources())
        .map_err(|e| SynthError::new(Stage::Ordering, e))?;

    advance(stage, Stage::Validating);
    let findings = validate(topology);
    if policy.blocks(&findings) {
        return Err(SynthError::new(
            Stage::Validating,
            PlanError::Blocked { findings },
        ));
    }

    advance(stage, Stage::Emitting);
    let mut document =
        emit(&sequence, &graph).map_err(|e| SynthError::new(Stage::Emitting, e))?;
    document.findings = findings;

    Ok(document)
}
