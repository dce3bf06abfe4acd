//! dns, database-service and container-service node parsing

use super::{children, first_string, first_u32, name_of, parse_provider, strings};
use crate::error::{ConfigError, Result};
use crate::model::{
    Access, ContainerServiceConfig, DatabaseConfig, DatabaseServiceConfig, DnsConfig,
    RecordConfig,
};
use kdl::KdlNode;

const DEFAULT_TTL: u32 = 300;

pub(super) fn parse_dns(node: &KdlNode) -> Result<DnsConfig> {
    let mut dns = DnsConfig {
        ttl: DEFAULT_TTL,
        ..Default::default()
    };
    let mut seen_provider = false;

    for child in children(node) {
        match child.name().value() {
            "provider" => {
                dns.provider = parse_provider(child)?;
                seen_provider = true;
            }
            "domain" => dns.domain = first_string(child).unwrap_or_default(),
            "subdomain" => dns.subdomain = first_string(child).unwrap_or_default(),
            "ttl" => dns.ttl = first_u32(child).unwrap_or(DEFAULT_TTL),
            "a" => dns.a_records.push(parse_record(child, "a")?),
            "cname" => dns.cname_records.push(parse_record(child, "cname")?),
            _ => {}
        }
    }

    if !seen_provider {
        return Err(ConfigError::Missing("dns provider".to_string()));
    }
    if dns.domain.is_empty() {
        return Err(ConfigError::Missing("dns domain".to_string()));
    }

    // records without a TTL inherit the zone default
    for record in dns.a_records.iter_mut().chain(dns.cname_records.iter_mut()) {
        if record.ttl == 0 {
            record.ttl = dns.ttl;
        }
    }

    Ok(dns)
}

fn parse_record(node: &KdlNode, kind: &str) -> Result<RecordConfig> {
    let mut record = RecordConfig {
        name: name_of(node, kind)?,
        ..Default::default()
    };

    for child in children(node) {
        match child.name().value() {
            "ttl" => record.ttl = first_u32(child).unwrap_or_default(),
            "values" | "value" => record.values = strings(child),
            "pod" => record.pod = first_string(child),
            "access" => {
                record.access = first_string(child)
                    .and_then(|s| s.parse::<Access>().ok())
                    .unwrap_or_default()
            }
            _ => {}
        }
    }

    if record.values.is_empty() && record.pod.is_none() {
        return Err(ConfigError::Invalid(format!(
            "{} record '{}' needs values or a pod",
            kind, record.name
        )));
    }

    Ok(record)
}

pub(super) fn parse_database_service(node: &KdlNode) -> Result<DatabaseServiceConfig> {
    let mut service = DatabaseServiceConfig::default();
    let mut seen_provider = false;

    for child in children(node) {
        match child.name().value() {
            "provider" => {
                service.provider = parse_provider(child)?;
                seen_provider = true;
            }
            "db" | "database" => service.databases.push(parse_database(child)?),
            _ => {}
        }
    }

    if !seen_provider {
        return Err(ConfigError::Missing("database-service provider".to_string()));
    }

    Ok(service)
}

fn parse_database(node: &KdlNode) -> Result<DatabaseConfig> {
    let mut db = DatabaseConfig {
        name: name_of(node, "db")?,
        ..Default::default()
    };

    for child in children(node) {
        match child.name().value() {
            "engine" => db.engine = first_string(child).unwrap_or_default(),
            "version" => db.version = first_string(child).unwrap_or_default(),
            "instance-type" | "instance_type" => {
                db.instance_type = first_string(child).unwrap_or_default()
            }
            "storage" => db.storage = first_u32(child).unwrap_or_default(),
            "subnet-group" | "subnet_group" => {
                db.subnet_group = first_string(child).unwrap_or_default()
            }
            "security-groups" | "security_groups" => db.security_groups = strings(child),
            _ => {}
        }
    }

    Ok(db)
}

pub(super) fn parse_container_service(node: &KdlNode) -> Result<ContainerServiceConfig> {
    let name = first_string(node).unwrap_or_else(|| "container".to_string());
    let provider = children(node)
        .iter()
        .find(|c| c.name().value() == "provider")
        .ok_or_else(|| ConfigError::Missing("container-service provider".to_string()))?;

    Ok(ContainerServiceConfig {
        name,
        provider: parse_provider(provider)?,
    })
}
