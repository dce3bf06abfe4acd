//! network node parsing

use super::{children, first_string, flag, name_of, string_map, strings};
use crate::error::{ConfigError, Result};
use crate::model::{Direction, NetworkConfig, RuleConfig, SecurityGroupConfig, SubnetGroupConfig};
use kdl::KdlNode;

pub(super) fn parse_network(node: &KdlNode) -> Result<NetworkConfig> {
    let mut network = NetworkConfig::default();

    for child in children(node) {
        match child.name().value() {
            "cidr" => network.cidr = first_string(child).unwrap_or_default(),
            "availability-zones" | "availability_zones" | "azs" => {
                network.availability_zones = strings(child);
            }
            "cidr-aliases" | "cidr_aliases" => network.cidr_aliases = string_map(child),
            "cidr-groups" | "cidr_groups" => {
                for group in children(child) {
                    network
                        .cidr_groups
                        .insert(group.name().value().to_string(), strings(group));
                }
            }
            "subnet-group" | "subnet_group" => {
                network.subnet_groups.push(parse_subnet_group(child)?);
            }
            "security-group" | "security_group" => {
                network.security_groups.push(parse_security_group(child)?);
            }
            other => {
                tracing::debug!(node = other, "ignoring unknown network node");
            }
        }
    }

    if network.cidr.is_empty() {
        return Err(ConfigError::Missing("network cidr".to_string()));
    }

    Ok(network)
}

fn parse_subnet_group(node: &KdlNode) -> Result<SubnetGroupConfig> {
    let mut group = SubnetGroupConfig {
        name: name_of(node, "subnet-group")?,
        ..Default::default()
    };

    for child in children(node) {
        match child.name().value() {
            "cidr" => group.cidr = first_string(child).unwrap_or_default(),
            "access" => {
                // Access::from_str never fails
                group.access = first_string(child)
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_default();
            }
            "manage-routes" | "manage_routes" => group.manage_routes = flag(child),
            _ => {}
        }
    }

    if group.cidr.is_empty() {
        return Err(ConfigError::Missing(format!(
            "cidr of subnet-group '{}'",
            group.name
        )));
    }

    Ok(group)
}

fn parse_security_group(node: &KdlNode) -> Result<SecurityGroupConfig> {
    let name = name_of(node, "security-group")?;
    let mut rules = Vec::new();

    for child in children(node) {
        if child.name().value() == "rule" {
            rules.push(parse_rule(child, &name)?);
        }
    }

    Ok(SecurityGroupConfig { name, rules })
}

/// `rule "ingress" "tcp" "22" "remote" ...`
fn parse_rule(node: &KdlNode, group: &str) -> Result<RuleConfig> {
    let mut parts = strings(node).into_iter();
    let invalid = |what: &str| {
        ConfigError::Invalid(format!("rule in security-group '{}': {}", group, what))
    };

    let direction = match parts.next().as_deref() {
        Some("ingress") => Direction::Ingress,
        Some("egress") => Direction::Egress,
        Some(other) => return Err(invalid(&format!("unknown direction '{}'", other))),
        None => return Err(invalid("missing direction")),
    };
    let protocol = parts.next().ok_or_else(|| invalid("missing protocol"))?;
    let ports = parts.next().ok_or_else(|| invalid("missing ports"))?;
    let remotes: Vec<String> = parts.collect();
    if remotes.is_empty() {
        return Err(invalid("missing remote"));
    }

    Ok(RuleConfig {
        direction,
        protocol,
        ports,
        remotes,
    })
}
