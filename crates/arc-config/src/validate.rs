//! Cross-reference validation
//!
//! Everything a build needs to trust about the document is checked here,
//! before any resource is constructed.

use crate::error::{ConfigError, Result};
use crate::model::Config;
use std::collections::HashSet;

fn unique<'a>(kind: &'static str, names: impl IntoIterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(ConfigError::Duplicate {
                kind,
                name: name.to_string(),
            });
        }
    }
    Ok(())
}

fn unknown(kind: &'static str, name: &str, by: String) -> ConfigError {
    ConfigError::Unknown {
        kind,
        name: name.to_string(),
        by,
    }
}

/// Validate names and references of a parsed configuration
pub fn validate(config: &Config) -> Result<()> {
    let dc = &config.datacenter;
    let network = &dc.network;

    if dc.provider.vendor.is_empty() {
        return Err(ConfigError::Missing("datacenter provider vendor".to_string()));
    }
    if network.availability_zones.is_empty() {
        return Err(ConfigError::Missing("network availability-zones".to_string()));
    }

    unique(
        "subnet-group",
        network.subnet_groups.iter().map(|g| g.name.as_str()),
    )?;
    unique(
        "security-group",
        network.security_groups.iter().map(|g| g.name.as_str()),
    )?;
    unique(
        "cluster",
        dc.compute.clusters.iter().map(|c| c.name.as_str()),
    )?;
    unique("pod", config.pods().map(|p| p.name.as_str()))?;
    unique("user", config.users.iter().map(|u| u.name.as_str()))?;
    unique("group", config.groups.iter().map(|g| g.name.as_str()))?;
    unique("team", config.teams.iter().map(|t| t.name.as_str()))?;

    for group in &network.security_groups {
        for rule in &group.rules {
            for remote in &rule.remotes {
                if network.resolve_remote(remote).is_none() {
                    return Err(unknown(
                        "rule remote",
                        remote,
                        format!("security-group '{}'", group.name),
                    ));
                }
            }
        }
    }

    for pod in config.pods() {
        let by = || format!("pod '{}'", pod.name);
        if pod.count == 0 {
            return Err(ConfigError::Invalid(format!(
                "pod '{}' must have a positive count",
                pod.name
            )));
        }
        if network.subnet_group(&pod.subnet_group).is_none() {
            return Err(unknown("subnet-group", &pod.subnet_group, by()));
        }
        for sg in &pod.security_groups {
            if network.security_group(sg).is_none() {
                return Err(unknown("security-group", sg, by()));
            }
        }
        for team in &pod.teams {
            if config.team(team).is_none() {
                return Err(unknown("team", team, by()));
            }
        }
        unique("volume device", pod.volumes.iter().map(|v| v.device.as_str())).map_err(
            |_| {
                ConfigError::Invalid(format!(
                    "pod '{}' has a non-unique volume device",
                    pod.name
                ))
            },
        )?;
        if pod.volumes.iter().filter(|v| v.boot).count() > 1 {
            return Err(ConfigError::Invalid(format!(
                "pod '{}' has more than one boot volume",
                pod.name
            )));
        }
    }

    for team in &config.teams {
        for user in &team.users {
            if config.user(user).is_none() {
                return Err(unknown("user", user, format!("team '{}'", team.name)));
            }
        }
        for group in &team.groups {
            if config.group(group).is_none() {
                return Err(unknown("group", group, format!("team '{}'", team.name)));
            }
        }
    }

    if let Some(dns) = &config.dns {
        unique(
            "dns record",
            dns.a_records
                .iter()
                .chain(dns.cname_records.iter())
                .map(|r| r.name.as_str()),
        )?;
        for record in &dns.cname_records {
            if let Some(pod) = &record.pod
                && !config.pods().any(|p| &p.name == pod)
            {
                return Err(unknown("pod", pod, format!("cname '{}'", record.name)));
            }
        }
    }

    if let Some(db) = &config.database {
        unique("database", db.databases.iter().map(|d| d.name.as_str()))?;
        for database in &db.databases {
            if !database.subnet_group.is_empty()
                && network.subnet_group(&database.subnet_group).is_none()
            {
                return Err(unknown(
                    "subnet-group",
                    &database.subnet_group,
                    format!("db '{}'", database.name),
                ));
            }
        }
    }

    Ok(())
}
