//! Topology validation
//!
//! A fixed battery of independent rules. Every rule runs against every
//! resource and all findings are collected; validation never fails the run
//! by itself. Whether findings block emission is decided by [`Policy`].
//!
//! [`Policy`]: crate::synth::Policy

mod cidr;
mod rules;

pub use cidr::{Cidr, CidrError};

use serde::{Deserialize, Serialize};
use stackflow_core::{Resource, Topology};
use std::fmt;
use tracing::{debug, instrument};

/// Finding severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Validation rules, in battery order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rule {
    CidrSyntax,
    SubnetContainment,
    SubnetOverlap,
    PortRange,
    SecurityGroupRule,
    RoutingTarget,
    HealthCheckInterval,
    InsufficientSubnets,
    UnknownAvailabilityZone,
    OpenAdminIngress,
    BroadManagedPolicy,
    ResourceName,
}

impl Rule {
    pub const ALL: [Rule; 12] = [
        Rule::CidrSyntax,
        Rule::SubnetContainment,
        Rule::SubnetOverlap,
        Rule::PortRange,
        Rule::SecurityGroupRule,
        Rule::RoutingTarget,
        Rule::HealthCheckInterval,
        Rule::InsufficientSubnets,
        Rule::UnknownAvailabilityZone,
        Rule::OpenAdminIngress,
        Rule::BroadManagedPolicy,
        Rule::ResourceName,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Rule::CidrSyntax => "cidr-syntax",
            Rule::SubnetContainment => "subnet-containment",
            Rule::SubnetOverlap => "subnet-overlap",
            Rule::PortRange => "port-range",
            Rule::SecurityGroupRule => "security-group-rule",
            Rule::RoutingTarget => "routing-target",
            Rule::HealthCheckInterval => "health-check-interval",
            Rule::InsufficientSubnets => "insufficient-subnets",
            Rule::UnknownAvailabilityZone => "unknown-availability-zone",
            Rule::OpenAdminIngress => "open-admin-ingress",
            Rule::BroadManagedPolicy => "broad-managed-policy",
            Rule::ResourceName => "resource-name",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Rule::UnknownAvailabilityZone
            | Rule::OpenAdminIngress
            | Rule::BroadManagedPolicy
            | Rule::ResourceName => Severity::Warning,
            _ => Severity::Error,
        }
    }

    fn check(&self, resource: &Resource, topology: &Topology) -> Vec<String> {
        match self {
            Rule::CidrSyntax => rules::cidr_syntax(resource),
            Rule::SubnetContainment => rules::subnet_containment(resource, topology),
            Rule::SubnetOverlap => rules::subnet_overlap(resource, topology),
            Rule::PortRange => rules::port_range(resource),
            Rule::SecurityGroupRule => rules::security_group_rule(resource, topology),
            Rule::RoutingTarget => rules::routing_target(resource, topology),
            Rule::HealthCheckInterval => rules::health_check_interval(resource),
            Rule::InsufficientSubnets => rules::insufficient_subnets(resource, topology),
            Rule::UnknownAvailabilityZone => rules::unknown_availability_zone(resource, topology),
            Rule::OpenAdminIngress => rules::open_admin_ingress(resource),
            Rule::BroadManagedPolicy => rules::broad_managed_policy(resource),
            Rule::ResourceName => rules::resource_name(resource),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// A problem found in the topology
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    pub resource: String,
    pub message: String,
    pub rule: Rule,
}

impl Finding {
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {}: {}",
            self.severity, self.rule, self.resource, self.message
        )
    }
}

/// Run every rule against every resource
///
/// Findings come out in declaration order of the offending resource, then
/// in rule order.
#[instrument(skip(topology), fields(stack = %topology.name()))]
pub fn validate(topology: &Topology) -> Vec<Finding> {
    let mut findings = Vec::new();

    for resource in topology.resources() {
        for rule in Rule::ALL {
            for message in rule.check(resource, topology) {
                findings.push(Finding {
                    severity: rule.severity(),
                    resource: resource.name.clone(),
                    message,
                    rule,
                });
            }
        }
    }

    debug!(
        errors = findings.iter().filter(|f| f.is_error()).count(),
        warnings = findings.iter().filter(|f| !f.is_error()).count(),
        "Validation complete"
    );
    findings
}
