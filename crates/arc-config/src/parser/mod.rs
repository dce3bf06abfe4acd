//! KDL parser
//!
//! Parses a `<datacenter>.kdl` document into [`Config`].
//! Each top-level section lives in its own module.

mod compute;
mod network;
mod services;
mod users;

#[cfg(test)]
mod tests;

use crate::error::{ConfigError, Result};
use crate::model::{Config, ProviderConfig};
use kdl::{KdlDocument, KdlNode, KdlValue};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Parse a KDL file into a configuration named after the datacenter
pub fn parse_kdl_file<P: AsRef<Path>>(path: P, datacenter: &str) -> Result<Config> {
    let content = fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::IoError {
        path: path.as_ref().to_path_buf(),
        message: e.to_string(),
    })?;
    parse_kdl_string(&content, datacenter)
}

/// Parse a KDL string
pub fn parse_kdl_string(content: &str, datacenter: &str) -> Result<Config> {
    let doc: KdlDocument = content.parse()?;

    let mut config = Config {
        name: datacenter.to_string(),
        ..Default::default()
    };
    let mut seen_datacenter = false;

    for node in doc.nodes() {
        match node.name().value() {
            "datacenter" => {
                config.datacenter = compute::parse_datacenter(node, datacenter)?;
                seen_datacenter = true;
            }
            "dns" => config.dns = Some(services::parse_dns(node)?),
            "database-service" | "database_service" => {
                config.database = Some(services::parse_database_service(node)?)
            }
            "container-service" | "container_service" => {
                config.container = Some(services::parse_container_service(node)?)
            }
            "users" => {
                let (users, groups) = users::parse_users(node)?;
                config.users.extend(users);
                config.groups.extend(groups);
            }
            "teams" => config.teams.extend(users::parse_teams(node)?),
            other => {
                tracing::debug!(node = other, "ignoring unknown top-level node");
            }
        }
    }

    if !seen_datacenter {
        return Err(ConfigError::Missing("datacenter".to_string()));
    }

    Ok(config)
}

// ---- shared helpers ----

/// Positional (unnamed) entries of a node
fn args(node: &KdlNode) -> impl Iterator<Item = &KdlValue> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .map(|e| e.value())
}

/// Named property of a node
fn prop<'a>(node: &'a KdlNode, key: &str) -> Option<&'a KdlValue> {
    node.entries()
        .iter()
        .find(|e| e.name().map(|n| n.value()) == Some(key))
        .map(|e| e.value())
}

/// Strings and integers both render as text
fn value_text(value: &KdlValue) -> Option<String> {
    value
        .as_string()
        .map(|s| s.to_string())
        .or_else(|| value.as_integer().map(|i| i.to_string()))
}

fn first_string(node: &KdlNode) -> Option<String> {
    args(node).next().and_then(value_text)
}

fn strings(node: &KdlNode) -> Vec<String> {
    args(node).filter_map(value_text).collect()
}

fn first_u32(node: &KdlNode) -> Option<u32> {
    args(node)
        .next()
        .and_then(|v| v.as_integer())
        .and_then(|i| u32::try_from(i).ok())
}

fn first_u64(node: &KdlNode) -> Option<u64> {
    args(node)
        .next()
        .and_then(|v| v.as_integer())
        .and_then(|i| u64::try_from(i).ok())
}

/// A presence-only node is true; otherwise the first boolean argument decides
fn flag(node: &KdlNode) -> bool {
    match args(node).next() {
        None => true,
        Some(v) => v.as_bool().unwrap_or(false),
    }
}

/// Name argument of a named block such as `pod "web" { ... }`
fn name_of(node: &KdlNode, what: &str) -> Result<String> {
    first_string(node).ok_or_else(|| ConfigError::Missing(format!("{} name", what)))
}

fn children(node: &KdlNode) -> &[KdlNode] {
    node.children().map(|c| c.nodes()).unwrap_or(&[])
}

/// `key "value"` children as a map
fn string_map(node: &KdlNode) -> BTreeMap<String, String> {
    children(node)
        .iter()
        .filter_map(|c| first_string(c).map(|v| (c.name().value().to_string(), v)))
        .collect()
}

/// `provider "vendor" { key "value" }`
fn parse_provider(node: &KdlNode) -> Result<ProviderConfig> {
    let vendor = name_of(node, "provider")?;
    Ok(ProviderConfig {
        vendor,
        data: string_map(node),
    })
}
