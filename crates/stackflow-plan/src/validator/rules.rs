//! Individual validation rules
//!
//! Each rule returns one message per problem on the given resource. Rules
//! ignore references to undeclared resources; those belong to the resolver.

use super::cidr::Cidr;
use regex::Regex;
use stackflow_core::{Resource, ResourceId, ResourceKind, Topology, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

const PORT_KEYS: [&str; 3] = ["port", "from_port", "to_port"];
const ADMIN_PORTS: [i64; 2] = [22, 3389];
const ANY_IPV4: &str = "0.0.0.0/0";
const MIN_LOAD_BALANCER_ZONES: usize = 2;

static DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<value>\d+)\s*(?P<unit>s|sec|m|min|h)?$").expect("duration regex")
});

static DNS_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?$").expect("name regex"));

// --- helpers ---

fn vpc_of<'a>(resource: &Resource, topology: &'a Topology) -> Option<&'a Resource> {
    resource
        .get_reference("vpc")
        .and_then(|r| topology.lookup(&r.resource))
        .filter(|vpc| vpc.kind == ResourceKind::Vpc)
}

fn subnets_in<'a>(vpc: &'a Resource, topology: &'a Topology) -> impl Iterator<Item = &'a Resource> {
    topology
        .by_kind(ResourceKind::Subnet)
        .filter(move |s| s.get_reference("vpc").is_some_and(|r| r.resource == vpc.name))
}

fn parse_cidr(resource: &Resource) -> Option<Cidr> {
    resource.get_str("cidr").and_then(|s| Cidr::new(s).ok())
}

/// `cidr_mask` of a subnet carved from its VPC block, if it is a usable prefix length
fn cidr_mask(resource: &Resource) -> Option<u8> {
    resource
        .get("cidr_mask")
        .and_then(Value::as_integer)
        .and_then(|m| u8::try_from(m).ok())
        .filter(|m| *m <= 32)
}

/// Blocks for the VPC's `cidr_mask` subnets
///
/// Explicit subnet blocks are reserved first. Masked subnets then take the
/// lowest free aligned block in declaration order. A subnet that does not
/// fit is left out.
fn carve_subnets(vpc: &Resource, topology: &Topology) -> Vec<(ResourceId, Cidr)> {
    let Some(block) = parse_cidr(vpc) else {
        return Vec::new();
    };
    let mut taken: Vec<Cidr> = subnets_in(vpc, topology)
        .filter_map(parse_cidr)
        .filter(|c| block.contains(c))
        .collect();

    let mut carved = Vec::new();
    for subnet in subnets_in(vpc, topology) {
        if subnet.properties.contains_key("cidr") {
            continue;
        }
        if let Some(mask) = cidr_mask(subnet)
            && let Some(free) = block.first_free(mask, &taken)
        {
            taken.push(free);
            carved.push((subnet.id, free));
        }
    }
    carved
}

/// `(direction, index, rule map)` for every ingress/egress rule written as a map
fn sg_rules(resource: &Resource) -> Vec<(&'static str, usize, &BTreeMap<String, Value>)> {
    let mut out = Vec::new();
    for direction in ["ingress", "egress"] {
        if let Some(value) = resource.get(direction) {
            for (i, item) in value.items().into_iter().enumerate() {
                if let Some(map) = item.as_map() {
                    out.push((direction, i, map));
                }
            }
        }
    }
    out
}

/// Peer key of a security-group rule
fn peer_key(direction: &str) -> &'static str {
    if direction == "egress" {
        "destination"
    } else {
        "source"
    }
}

/// Whether a rule names its ports, as integers or references
fn has_port(rule: &BTreeMap<String, Value>) -> bool {
    let given = |key: &str| matches!(rule.get(key), Some(Value::Integer(_) | Value::Ref(_)));
    given("port") || (given("from_port") && given("to_port"))
}

/// Inclusive integer port range of a rule, if it has one
fn port_span(rule: &BTreeMap<String, Value>) -> Option<(i64, i64)> {
    if let Some(port) = rule.get("port").and_then(Value::as_integer) {
        return Some((port, port));
    }
    let from = rule.get("from_port").and_then(Value::as_integer)?;
    let to = rule.get("to_port").and_then(Value::as_integer)?;
    Some((from, to))
}

fn is_all_protocols(rule: &BTreeMap<String, Value>) -> bool {
    matches!(
        rule.get("protocol").and_then(Value::as_str),
        Some("all") | Some("-1")
    )
}

/// Seconds in a duration: `30s`, `1m`, `2h` or a bare integer
pub(crate) fn duration_seconds(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(seconds) => Some(*seconds),
        Value::String(s) => {
            let caps = DURATION.captures(s.trim())?;
            let amount: i64 = caps.name("value")?.as_str().parse().ok()?;
            let factor = match caps.name("unit").map(|m| m.as_str()) {
                None | Some("s") | Some("sec") => 1,
                Some("m") | Some("min") => 60,
                Some(_) => 3600,
            };
            amount.checked_mul(factor)
        }
        _ => None,
    }
}

// --- rules ---

pub(super) fn cidr_syntax(resource: &Resource) -> Vec<String> {
    let mut messages = Vec::new();

    if resource.kind == ResourceKind::Subnet && resource.properties.contains_key("cidr_mask") {
        if resource.properties.contains_key("cidr") {
            messages.push("set either cidr or cidr_mask, not both".to_string());
        } else {
            match resource.get("cidr_mask") {
                Some(Value::Integer(m)) if !(0..=32).contains(m) => messages.push(format!(
                    "cidr_mask {} is not a prefix length between 0 and 32",
                    m
                )),
                Some(Value::Integer(_)) => {}
                _ => messages.push("cidr_mask must be an integer".to_string()),
            }
        }
    } else if matches!(resource.kind, ResourceKind::Vpc | ResourceKind::Subnet) {
        match resource.get("cidr") {
            None => messages.push(format!("{} has no cidr", resource.kind)),
            Some(Value::String(s)) => {
                if let Err(e) = Cidr::new(s) {
                    messages.push(format!("invalid cidr: {}", e));
                }
            }
            Some(Value::Ref(_)) => {}
            Some(_) => messages.push("cidr must be a string".to_string()),
        }
    }

    if resource.kind == ResourceKind::SecurityGroup {
        for (direction, i, rule) in sg_rules(resource) {
            let key = peer_key(direction);
            if let Some(Value::String(s)) = rule.get(key)
                && let Err(e) = Cidr::new(s)
            {
                messages.push(format!("{}[{}].{}: {}", direction, i, key, e));
            }
        }
    }

    messages
}

pub(super) fn subnet_containment(resource: &Resource, topology: &Topology) -> Vec<String> {
    if resource.kind != ResourceKind::Subnet {
        return Vec::new();
    }
    let Some(vpc) = vpc_of(resource, topology) else {
        return Vec::new();
    };

    let Some(vpc_block) = parse_cidr(vpc) else {
        return Vec::new();
    };

    if !resource.properties.contains_key("cidr")
        && let Some(mask) = cidr_mask(resource)
    {
        if mask < vpc_block.prefix_length() {
            return vec![format!(
                "cidr_mask /{} is wider than VPC '{}' block {}",
                mask, vpc.name, vpc_block
            )];
        }
        if !carve_subnets(vpc, topology)
            .iter()
            .any(|(id, _)| *id == resource.id)
        {
            return vec![format!(
                "no room left in VPC '{}' block {} for a /{} subnet",
                vpc.name, vpc_block, mask
            )];
        }
        return Vec::new();
    }

    match parse_cidr(resource) {
        Some(block) if !vpc_block.contains(&block) => vec![format!(
            "subnet block {} is outside VPC '{}' block {}",
            block, vpc.name, vpc_block
        )],
        _ => Vec::new(),
    }
}

/// Reported on the later-declared subnet of each overlapping pair
pub(super) fn subnet_overlap(resource: &Resource, topology: &Topology) -> Vec<String> {
    if resource.kind != ResourceKind::Subnet {
        return Vec::new();
    }
    let (Some(vpc), Some(block)) = (vpc_of(resource, topology), parse_cidr(resource)) else {
        return Vec::new();
    };

    subnets_in(vpc, topology)
        .filter(|other| other.id < resource.id)
        .filter_map(|other| {
            let other_block = parse_cidr(other)?;
            block.overlaps(&other_block).then(|| {
                format!(
                    "subnet block {} overlaps '{}' ({})",
                    block, other.name, other_block
                )
            })
        })
        .collect()
}

pub(super) fn port_range(resource: &Resource) -> Vec<String> {
    let mut messages = Vec::new();
    for (key, value) in resource.properties.iter() {
        check_ports(key, key, value, &mut messages);
    }
    messages
}

/// `key` is the property name the value sits under; list items keep their parent's key
fn check_ports(path: &str, key: &str, value: &Value, messages: &mut Vec<String>) {
    match value {
        Value::List(items) => {
            for (i, item) in items.iter().enumerate() {
                check_ports(&format!("{}[{}]", path, i), key, item, messages);
            }
        }
        Value::Map(map) => {
            check_port_map(path, map, messages);
            for (child, item) in map {
                if matches!(item, Value::List(_) | Value::Map(_)) {
                    check_ports(&format!("{}.{}", path, child), child, item, messages);
                }
            }
        }
        _ => check_port_value(path, key, value, messages),
    }
}

fn check_port_map(path: &str, map: &BTreeMap<String, Value>, messages: &mut Vec<String>) {
    for key in PORT_KEYS {
        if let Some(value) = map.get(key)
            && !matches!(value, Value::List(_) | Value::Map(_))
        {
            check_port_value(&format!("{}.{}", path, key), key, value, messages);
        }
    }
    if let (Some(from), Some(to)) = (
        map.get("from_port").and_then(Value::as_integer),
        map.get("to_port").and_then(Value::as_integer),
    ) && from > to
    {
        messages.push(format!(
            "{}: from_port {} is greater than to_port {}",
            path, from, to
        ));
    }
}

fn check_port_value(path: &str, key: &str, value: &Value, messages: &mut Vec<String>) {
    if !PORT_KEYS.contains(&key) {
        return;
    }
    match value {
        Value::Integer(port) if !(0..=65535).contains(port) => {
            messages.push(format!("{}: port {} is outside 0-65535", path, port));
        }
        Value::Integer(_) | Value::Ref(_) => {}
        other => messages.push(format!("{}: port must be an integer, got {:?}", path, other)),
    }
}

pub(super) fn security_group_rule(resource: &Resource, topology: &Topology) -> Vec<String> {
    if resource.kind != ResourceKind::SecurityGroup {
        return Vec::new();
    }
    let mut messages = Vec::new();

    for direction in ["ingress", "egress"] {
        let Some(value) = resource.get(direction) else {
            continue;
        };
        for (i, item) in value.items().into_iter().enumerate() {
            let at = format!("{}[{}]", direction, i);
            let Some(rule) = item.as_map() else {
                messages.push(format!("{}: rule must be a block of key=value entries", at));
                continue;
            };

            if rule.get("protocol").and_then(Value::as_str).is_none() {
                messages.push(format!("{}: missing protocol", at));
            }
            if !is_all_protocols(rule) && !has_port(rule) {
                messages.push(format!("{}: missing port or from_port/to_port", at));
            }

            let key = peer_key(direction);
            match rule.get(key) {
                None => messages.push(format!("{}: missing {}", at, key)),
                Some(Value::String(_)) => {}
                Some(Value::Ref(r)) => {
                    if let Some(peer) = topology.lookup(&r.resource)
                        && peer.kind != ResourceKind::SecurityGroup
                    {
                        messages.push(format!(
                            "{}: {} '{}' is a {}, expected a CIDR or security-group",
                            at, key, peer.name, peer.kind
                        ));
                    }
                }
                Some(_) => messages.push(format!(
                    "{}: {} must be a CIDR or security-group reference",
                    at, key
                )),
            }
        }
    }

    messages
}

pub(super) fn routing_target(resource: &Resource, topology: &Topology) -> Vec<String> {
    let mut messages = Vec::new();

    match resource.kind {
        ResourceKind::TargetGroup => {
            if !resource.properties.contains_key("port") {
                messages.push("target group has no port".to_string());
            }
            if let Some(targets) = resource.get("targets") {
                for (i, item) in targets.items().into_iter().enumerate() {
                    let Some(r) = item.as_reference() else {
                        messages.push(format!("targets[{}]: target must be a reference", i));
                        continue;
                    };
                    let Some(target) = topology.lookup(&r.resource) else {
                        continue;
                    };
                    if target.kind != ResourceKind::Instance {
                        messages.push(format!(
                            "targets[{}]: '{}' is a {}, expected an instance",
                            i, target.name, target.kind
                        ));
                    } else if r.attribute != "id" {
                        messages.push(format!(
                            "targets[{}]: must reference '{}.id', not '{}'",
                            i, target.name, r
                        ));
                    }
                }
            }
        }
        ResourceKind::Listener => {
            match resource.get("target_groups") {
                None => messages.push("listener has no target_groups".to_string()),
                Some(groups) => check_refs(
                    groups,
                    "target_groups",
                    ResourceKind::TargetGroup,
                    topology,
                    &mut messages,
                ),
            }
            if let Some(groups) = resource.get("security_groups") {
                check_refs(
                    groups,
                    "security_groups",
                    ResourceKind::SecurityGroup,
                    topology,
                    &mut messages,
                );
            }
            if let Some(subnets) = resource.get("subnets") {
                check_refs(subnets, "subnets", ResourceKind::Subnet, topology, &mut messages);

                // at most one subnet per availability zone
                let mut seen: BTreeMap<&str, &str> = BTreeMap::new();
                for (i, item) in subnets.items().into_iter().enumerate() {
                    let Some(subnet) = item
                        .as_reference()
                        .and_then(|r| topology.lookup(&r.resource))
                        .filter(|s| s.kind == ResourceKind::Subnet)
                    else {
                        continue;
                    };
                    let Some(zone) = subnet.get_str("availability_zone") else {
                        continue;
                    };
                    if let Some(first) = seen.insert(zone, subnet.name.as_str()) {
                        messages.push(format!(
                            "subnets[{}]: '{}' is a second subnet in {} (after '{}')",
                            i, subnet.name, zone, first
                        ));
                    }
                }
            }
        }
        _ => {}
    }

    messages
}

/// Every item of `value` must reference a resource of `expected` kind
fn check_refs(
    value: &Value,
    key: &str,
    expected: ResourceKind,
    topology: &Topology,
    messages: &mut Vec<String>,
) {
    for (i, item) in value.items().into_iter().enumerate() {
        let Some(r) = item.as_reference() else {
            messages.push(format!("{}[{}]: {} must be a reference", key, i, expected));
            continue;
        };
        if let Some(target) = topology.lookup(&r.resource)
            && target.kind != expected
        {
            messages.push(format!(
                "{}[{}]: '{}' is a {}, expected a {}",
                key, i, target.name, target.kind, expected
            ));
        }
    }
}

/// Declared subnets a listener's load balancer is placed in
fn listener_subnets<'a>(listener: &Resource, topology: &'a Topology) -> Vec<&'a Resource> {
    listener
        .get("subnets")
        .map(|subnets| {
            subnets
                .items()
                .into_iter()
                .filter_map(Value::as_reference)
                .filter_map(|r| topology.lookup(&r.resource))
                .filter(|s| s.kind == ResourceKind::Subnet)
                .collect()
        })
        .unwrap_or_default()
}

pub(super) fn health_check_interval(resource: &Resource) -> Vec<String> {
    let Some(interval) = resource
        .get("health_check")
        .and_then(Value::as_map)
        .and_then(|hc| hc.get("interval"))
    else {
        return Vec::new();
    };

    match duration_seconds(interval) {
        Some(seconds) if seconds > 0 => Vec::new(),
        Some(_) => vec!["health_check.interval must be greater than zero".to_string()],
        None => vec![format!(
            "health_check.interval {:?} is not a duration (e.g. 30s, 1m, 2h)",
            interval
        )],
    }
}

pub(super) fn insufficient_subnets(resource: &Resource, topology: &Topology) -> Vec<String> {
    if resource.kind == ResourceKind::Listener {
        return insufficient_listener_zones(resource, topology);
    }
    if resource.kind != ResourceKind::Vpc {
        return Vec::new();
    }
    let zones = requested_zones(resource);
    let subnets = subnets_in(resource, topology).count();

    if subnets < zones.len() {
        vec![format!(
            "{} availability zone(s) requested but only {} subnet(s) declared",
            zones.len(),
            subnets
        )]
    } else {
        Vec::new()
    }
}

/// An internet-facing load balancer needs subnets in two zones or more
fn insufficient_listener_zones(listener: &Resource, topology: &Topology) -> Vec<String> {
    let internet_facing = listener
        .get("internet_facing")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if !internet_facing || !listener.properties.contains_key("subnets") {
        return Vec::new();
    }

    let zones: BTreeSet<&str> = listener_subnets(listener, topology)
        .into_iter()
        .filter_map(|s| s.get_str("availability_zone"))
        .collect();
    if zones.len() < MIN_LOAD_BALANCER_ZONES {
        vec![format!(
            "internet-facing load balancer needs subnets in at least {} availability zones, got {}",
            MIN_LOAD_BALANCER_ZONES,
            zones.len()
        )]
    } else {
        Vec::new()
    }
}

fn requested_zones(vpc: &Resource) -> BTreeSet<&str> {
    vpc.get("availability_zones")
        .map(|zones| zones.items().into_iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

pub(super) fn unknown_availability_zone(resource: &Resource, topology: &Topology) -> Vec<String> {
    if resource.kind != ResourceKind::Subnet {
        return Vec::new();
    }
    let (Some(zone), Some(vpc)) = (
        resource.get_str("availability_zone"),
        vpc_of(resource, topology),
    ) else {
        return Vec::new();
    };

    let zones = requested_zones(vpc);
    if zones.is_empty() || zones.contains(zone) {
        Vec::new()
    } else {
        vec![format!(
            "availability zone '{}' is not among VPC '{}' zones",
            zone, vpc.name
        )]
    }
}

pub(super) fn open_admin_ingress(resource: &Resource) -> Vec<String> {
    if resource.kind != ResourceKind::SecurityGroup {
        return Vec::new();
    }

    sg_rules(resource)
        .into_iter()
        .filter(|(direction, _, rule)| {
            *direction == "ingress"
                && rule
                    .get("source")
                    .and_then(Value::as_str)
                    .and_then(|s| Cidr::new(s).ok())
                    .is_some_and(|c| c.is_any())
        })
        .filter_map(|(_, i, rule)| {
            let exposed: Vec<String> = if is_all_protocols(rule) {
                ADMIN_PORTS.iter().map(i64::to_string).collect()
            } else {
                let (from, to) = port_span(rule)?;
                ADMIN_PORTS
                    .iter()
                    .filter(|p| (from..=to).contains(*p))
                    .map(i64::to_string)
                    .collect()
            };
            (!exposed.is_empty()).then(|| {
                format!(
                    "ingress[{}]: port {} open to {}",
                    i,
                    exposed.join(", "),
                    ANY_IPV4
                )
            })
        })
        .collect()
}

pub(super) fn broad_managed_policy(resource: &Resource) -> Vec<String> {
    if resource.kind != ResourceKind::Role {
        return Vec::new();
    }
    let Some(policies) = resource.get("managed_policies") else {
        return Vec::new();
    };

    policies
        .items()
        .into_iter()
        .filter_map(Value::as_str)
        .filter(|p| p.ends_with("FullAccess") || *p == "AdministratorAccess")
        .map(|p| format!("managed policy '{}' grants broad access", p))
        .collect()
}

pub(super) fn resource_name(resource: &Resource) -> Vec<String> {
    if DNS_LABEL.is_match(&resource.name) {
        Vec::new()
    } else {
        vec![format!(
            "'{}' is not a lowercase DNS label (a-z, 0-9, '-', at most 63 characters)",
            resource.name
        )]
    }
}
