//! datacenter and compute node parsing

use super::network::parse_network;
use super::{
    children, first_string, first_u32, first_u64, flag, name_of, parse_provider, string_map,
    strings,
};
use crate::error::{ConfigError, Result};
use crate::model::{ClusterConfig, ComputeConfig, DatacenterConfig, PodConfig, VolumeConfig};
use kdl::KdlNode;

/// `datacenter "name" { provider ...; network {...}; compute {...} }`
pub(super) fn parse_datacenter(node: &KdlNode, default_name: &str) -> Result<DatacenterConfig> {
    let mut dc = DatacenterConfig {
        name: first_string(node).unwrap_or_else(|| default_name.to_string()),
        ..Default::default()
    };
    let mut seen_provider = false;
    let mut seen_network = false;
    let mut seen_compute = false;

    for child in children(node) {
        match child.name().value() {
            "provider" => {
                dc.provider = parse_provider(child)?;
                seen_provider = true;
            }
            "security-tags" | "security_tags" => dc.security_tags = string_map(child),
            "network" => {
                dc.network = parse_network(child)?;
                seen_network = true;
            }
            "compute" => {
                dc.compute = parse_compute(child)?;
                seen_compute = true;
            }
            other => {
                tracing::debug!(node = other, "ignoring unknown datacenter node");
            }
        }
    }

    if !seen_provider {
        return Err(ConfigError::Missing("datacenter provider".to_string()));
    }
    if !seen_network {
        return Err(ConfigError::Missing("network".to_string()));
    }
    if !seen_compute {
        return Err(ConfigError::Missing("compute".to_string()));
    }

    Ok(dc)
}

fn parse_compute(node: &KdlNode) -> Result<ComputeConfig> {
    let mut compute = ComputeConfig::default();

    for child in children(node) {
        match child.name().value() {
            "keypair" => compute.keypair = first_string(child).unwrap_or_default(),
            "cluster" => compute.clusters.push(parse_cluster(child)?),
            _ => {}
        }
    }

    if compute.keypair.is_empty() {
        return Err(ConfigError::Missing("compute keypair".to_string()));
    }

    Ok(compute)
}

fn parse_cluster(node: &KdlNode) -> Result<ClusterConfig> {
    let mut cluster = ClusterConfig {
        name: name_of(node, "cluster")?,
        ..Default::default()
    };

    for child in children(node) {
        match child.name().value() {
            "audit-ignore" | "audit_ignore" => cluster.audit_ignore = flag(child),
            "security-tags" | "security_tags" => cluster.security_tags = string_map(child),
            "pod" => cluster.pods.push(parse_pod(child)?),
            _ => {}
        }
    }

    // audit-ignore is a cluster property that pods carry along
    for pod in &mut cluster.pods {
        pod.audit_ignore = cluster.audit_ignore;
    }

    Ok(cluster)
}

fn parse_pod(node: &KdlNode) -> Result<PodConfig> {
    let mut pod = PodConfig {
        name: name_of(node, "pod")?,
        count: 1,
        ..Default::default()
    };

    for child in children(node) {
        match child.name().value() {
            "server-type" | "server_type" => {
                pod.server_type = first_string(child).unwrap_or_default()
            }
            "version" => pod.version = first_string(child).unwrap_or_default(),
            "package-name" | "package_name" => {
                pod.package_name = first_string(child).unwrap_or_default()
            }
            "image-family" | "image_family" => {
                pod.image_family = first_string(child).unwrap_or_default()
            }
            "instance-type" | "instance_type" => {
                pod.instance_type = first_string(child).unwrap_or_default()
            }
            "security-groups" | "security_groups" => pod.security_groups = strings(child),
            "role" => pod.role = first_string(child),
            "subnet-group" | "subnet_group" => {
                pod.subnet_group = first_string(child).unwrap_or_default()
            }
            "teams" => pod.teams = strings(child),
            "count" => {
                pod.count = first_u32(child).ok_or_else(|| {
                    ConfigError::Invalid(format!("count of pod '{}' must be a number", pod.name))
                })?
            }
            "volume" => pod.volumes.push(parse_volume(child)?),
            _ => {}
        }
    }

    if pod.server_type.is_empty() {
        pod.server_type = pod.name.clone();
    }
    if pod.subnet_group.is_empty() {
        return Err(ConfigError::Missing(format!(
            "subnet-group of pod '{}'",
            pod.name
        )));
    }

    Ok(pod)
}

fn parse_volume(node: &KdlNode) -> Result<VolumeConfig> {
    let mut volume = VolumeConfig {
        device: name_of(node, "volume")?,
        fs: "xfs".to_string(),
        kind: "gp2".to_string(),
        ..Default::default()
    };

    for child in children(node) {
        match child.name().value() {
            "size" => volume.size = first_u32(child).unwrap_or_default(),
            "type" => volume.kind = first_string(child).unwrap_or(volume.kind),
            "fs" | "filesystem" => volume.fs = first_string(child).unwrap_or(volume.fs),
            "inodes" => volume.inodes = first_u64(child).unwrap_or_default(),
            "mount" | "mount-point" | "mount_point" => {
                volume.mount_point = first_string(child).unwrap_or_default()
            }
            "boot" => volume.boot = flag(child),
            "preserve" => volume.preserve = flag(child),
            _ => {}
        }
    }

    Ok(volume)
}
