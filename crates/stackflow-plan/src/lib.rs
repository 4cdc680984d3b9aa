//! stackflow plan synthesis
//!
//! This crate turns a declared [`Topology`](stackflow_core::Topology) into a
//! deterministic plan document for a provisioning engine. It performs no
//! I/O and never talks to a cloud API.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  stack CLI                      │
//! │            (stack validate / plan)              │
//! └─────────────────┬───────────────────────────────┘
//!                   │ StackFile → Topology
//! ┌─────────────────▼───────────────────────────────┐
//! │               stackflow-plan                    │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │              Synthesis                   │   │
//! │  │  Declaring → Resolving → Ordering →      │   │
//! │  │  Validating → Emitting → Done | Failed   │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────┐ ┌────────┐ ┌───────────┐ ┌──────┐ │
//! │  │ resolver │ │ order  │ │ validator │ │ emit │ │
//! │  └──────────┘ └────────┘ └───────────┘ └──────┘ │
//! └─────────────────┬───────────────────────────────┘
//!                   │ PlanDocument (JSON / YAML)
//! ┌─────────────────▼───────────────────────────────┐
//! │           provisioning engine                   │
//! └─────────────────────────────────────────────────┘
//! ```

pub mod emit;
pub mod error;
pub mod order;
pub mod resolver;
pub mod synth;
pub mod validator;

// Re-exports
pub use emit::{PlanDocument, PlanRecord, PlanSummary, ResolvedValue, emit};
pub use error::{PlanError, Result, SynthError};
pub use order::order;
pub use resolver::{Edge, ResolvedGraph, resolve};
pub use synth::{BlockOn, Policy, Stage, Synthesis};
pub use validator::{Cidr, CidrError, Finding, Rule, Severity, validate};
