//! In-memory cloud state
//!
//! Every operation checks the same dependency rules a real cloud enforces,
//! so ordering mistakes in the orchestrator surface as rejected calls.

use arc_cloud::{
    CloudError, ContainerSpec, DatabaseSpec, InstanceSpec, InstanceState, KeyPairSpec,
    NetworkSpec, RecordKind, RecordListing, RecordSpec, Result, RulePeer, RuleSpec,
    SecurityGroupSpec, SubnetSpec, VolumeSpec,
};
use chrono::{DateTime, Utc};
use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;

pub const STATE_VERSION: u32 = 1;

/// Group every network gets from the provider
pub const DEFAULT_GROUP: &str = "default";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkRecord {
    pub id: String,
    pub cidr: String,
    pub default_group: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubnetRecord {
    pub id: String,
    pub network: String,
    pub cidr: String,
    pub availability_zone: String,
    pub public: bool,
    pub next_host: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupRecord {
    pub id: String,
    pub network: String,
    pub rules: Vec<RuleSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyRecord {
    pub id: String,
    pub public_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub id: String,
    pub state: InstanceState,
    pub subnet: String,
    pub key_name: String,
    pub image_id: String,
    pub instance_type: String,
    pub security_groups: Vec<String>,
    pub private_ip: String,
    pub public_ip: Option<String>,
    pub tags: BTreeMap<String, String>,
    pub role: Option<String>,
    pub console: Vec<String>,
    pub launched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeRecord {
    pub id: String,
    pub size: u32,
    pub kind: String,
    pub boot: bool,
    /// Instance id
    pub attached_to: Option<String>,
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EipRecord {
    pub id: String,
    pub ip: String,
    /// Instance id
    pub attached_to: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleRecord {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordEntry {
    pub id: String,
    pub kind: RecordKind,
    pub ttl: u32,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseRecord {
    pub id: String,
    pub engine: String,
    pub version: String,
    pub instance_type: String,
    pub storage: u32,
    pub endpoint: String,
    pub snapshots: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerRecord {
    pub id: String,
    pub revision: u32,
}

/// Whole provider side state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockCloud {
    pub version: u32,
    pub updated_at: DateTime<Utc>,
    next_id: u64,
    next_public: u32,
    pub networks: BTreeMap<String, NetworkRecord>,
    pub subnets: BTreeMap<String, SubnetRecord>,
    pub security_groups: BTreeMap<String, GroupRecord>,
    pub keypairs: BTreeMap<String, KeyRecord>,
    pub instances: BTreeMap<String, InstanceRecord>,
    /// Keyed by `<instance>:<device>`
    pub volumes: BTreeMap<String, VolumeRecord>,
    /// Keyed by owning instance name
    pub eips: BTreeMap<String, EipRecord>,
    pub roles: BTreeMap<String, RoleRecord>,
    /// Keyed by FQDN
    pub records: BTreeMap<String, RecordEntry>,
    pub databases: BTreeMap<String, DatabaseRecord>,
    pub containers: BTreeMap<String, ContainerRecord>,
    /// Write calls in order, for assertions
    #[serde(skip)]
    pub calls: Vec<String>,
}

impl Default for MockCloud {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            updated_at: Utc::now(),
            next_id: 0,
            next_public: 0,
            networks: BTreeMap::new(),
            subnets: BTreeMap::new(),
            security_groups: BTreeMap::new(),
            keypairs: BTreeMap::new(),
            instances: BTreeMap::new(),
            volumes: BTreeMap::new(),
            eips: BTreeMap::new(),
            roles: BTreeMap::new(),
            records: BTreeMap::new(),
            databases: BTreeMap::new(),
            containers: BTreeMap::new(),
            calls: Vec::new(),
        }
    }
}

fn parse_net(cidr: &str) -> Result<Ipv4Net> {
    cidr.parse::<Ipv4Net>()
        .map(|n| n.trunc())
        .map_err(|e| CloudError::InvalidConfig(format!("{}: {}", cidr, e)))
}

fn exists(kind: &str, name: &str) -> CloudError {
    CloudError::ResourceAlreadyExists(format!("{} {}", kind, name))
}

fn missing(kind: &str, name: &str) -> CloudError {
    CloudError::ResourceNotFound(format!("{} {}", kind, name))
}

impl MockCloud {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{:08x}", prefix, self.next_id)
    }

    fn allocate_public(&mut self, base: [u8; 3]) -> String {
        self.next_public += 1;
        let host = (self.next_public % 250) as u8 + 1;
        Ipv4Addr::new(base[0], base[1], base[2], host).to_string()
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    fn group_exists(&self, name: &str) -> bool {
        name == DEFAULT_GROUP || self.security_groups.contains_key(name)
    }

    fn instance_name_by_id(&self, id: &str) -> Option<String> {
        self.instances
            .iter()
            .find(|(_, i)| i.id == id)
            .map(|(name, _)| name.clone())
    }

    // ---- network ----

    pub fn create_network(&mut self, spec: &NetworkSpec) -> Result<String> {
        if self.networks.contains_key(&spec.name) {
            return Err(exists("network", &spec.name));
        }
        parse_net(&spec.cidr)?;
        let id = self.allocate("vpc");
        let default_group = self.allocate("sg");
        self.networks.insert(
            spec.name.clone(),
            NetworkRecord {
                id: id.clone(),
                cidr: spec.cidr.clone(),
                default_group,
            },
        );
        self.touch();
        Ok(id)
    }

    pub fn delete_network(&mut self, name: &str) -> Result<()> {
        if !self.networks.contains_key(name) {
            return Err(missing("network", name));
        }
        if self.subnets.values().any(|s| s.network == name) {
            return Err(CloudError::Rejected(format!(
                "network {} still has subnets",
                name
            )));
        }
        if self.security_groups.values().any(|g| g.network == name) {
            return Err(CloudError::Rejected(format!(
                "network {} still has security groups",
                name
            )));
        }
        self.networks.remove(name);
        self.touch();
        Ok(())
    }

    pub fn create_subnet(&mut self, spec: &SubnetSpec) -> Result<String> {
        if self.subnets.contains_key(&spec.name) {
            return Err(exists("subnet", &spec.name));
        }
        let network = self
            .networks
            .get(&spec.network)
            .ok_or_else(|| missing("network", &spec.network))?;
        let parent = parse_net(&network.cidr)?;
        let net = parse_net(&spec.cidr)?;
        if !parent.contains(&net) {
            return Err(CloudError::Rejected(format!(
                "subnet {} ({}) is outside network {} ({})",
                spec.name, spec.cidr, spec.network, network.cidr
            )));
        }
        for (name, other) in &self.subnets {
            let other_net = parse_net(&other.cidr)?;
            if other_net.contains(&net) || net.contains(&other_net) {
                return Err(CloudError::Rejected(format!(
                    "subnet {} ({}) overlaps {} ({})",
                    spec.name, spec.cidr, name, other.cidr
                )));
            }
        }
        let id = self.allocate("subnet");
        self.subnets.insert(
            spec.name.clone(),
            SubnetRecord {
                id: id.clone(),
                network: spec.network.clone(),
                cidr: spec.cidr.clone(),
                availability_zone: spec.availability_zone.clone(),
                public: spec.public,
                next_host: 0,
            },
        );
        self.touch();
        Ok(id)
    }

    pub fn delete_subnet(&mut self, name: &str) -> Result<()> {
        if !self.subnets.contains_key(name) {
            return Err(missing("subnet", name));
        }
        if self.instances.values().any(|i| i.subnet == name) {
            return Err(CloudError::Rejected(format!(
                "subnet {} still has instances",
                name
            )));
        }
        self.subnets.remove(name);
        self.touch();
        Ok(())
    }

    fn check_rules(&self, group: &str, rules: &[RuleSpec]) -> Result<()> {
        for rule in rules {
            match &rule.peer {
                RulePeer::Group(peer) if peer != group && !self.group_exists(peer) => {
                    return Err(CloudError::Rejected(format!(
                        "rule of {} references unknown group {}",
                        group, peer
                    )));
                }
                RulePeer::Cidr(cidr) => {
                    parse_net(cidr)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Create a group, with or without its rules
    pub fn create_group(&mut self, spec: &SecurityGroupSpec, with_rules: bool) -> Result<String> {
        if self.group_exists(&spec.name) {
            return Err(exists("secgroup", &spec.name));
        }
        if !self.networks.contains_key(&spec.network) {
            return Err(missing("network", &spec.network));
        }
        let rules = if with_rules {
            self.check_rules(&spec.name, &spec.rules)?;
            spec.rules.clone()
        } else {
            Vec::new()
        };
        let id = self.allocate("sg");
        self.security_groups.insert(
            spec.name.clone(),
            GroupRecord {
                id: id.clone(),
                network: spec.network.clone(),
                rules,
            },
        );
        self.touch();
        Ok(id)
    }

    /// Replace the rules of an existing group
    pub fn set_rules(&mut self, name: &str, rules: &[RuleSpec]) -> Result<()> {
        if !self.security_groups.contains_key(name) {
            return Err(missing("secgroup", name));
        }
        self.check_rules(name, rules)?;
        if let Some(group) = self.security_groups.get_mut(name) {
            group.rules = rules.to_vec();
        }
        self.touch();
        Ok(())
    }

    pub fn delete_group(&mut self, name: &str) -> Result<()> {
        if !self.security_groups.contains_key(name) {
            return Err(missing("secgroup", name));
        }
        let referenced_by = self.security_groups.iter().find(|(other, g)| {
            other.as_str() != name
                && g.rules
                    .iter()
                    .any(|r| r.peer == RulePeer::Group(name.to_string()))
        });
        if let Some((other, _)) = referenced_by {
            return Err(CloudError::Rejected(format!(
                "secgroup {} is referenced by {}",
                name, other
            )));
        }
        if self
            .instances
            .values()
            .any(|i| i.security_groups.iter().any(|g| g == name))
        {
            return Err(CloudError::Rejected(format!(
                "secgroup {} is in use by an instance",
                name
            )));
        }
        self.security_groups.remove(name);
        self.touch();
        Ok(())
    }

    /// Group names including the provider default of every network
    pub fn group_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.security_groups.keys().cloned().collect();
        if !self.networks.is_empty() {
            names.push(DEFAULT_GROUP.to_string());
        }
        names
    }

    // ---- compute ----

    pub fn import_keypair(&mut self, spec: &KeyPairSpec) -> Result<String> {
        if self.keypairs.contains_key(&spec.name) {
            return Err(exists("keypair", &spec.name));
        }
        if spec.public_key.split_whitespace().count() < 2 {
            return Err(CloudError::InvalidConfig(format!(
                "keypair {}: malformed public key",
                spec.name
            )));
        }
        let id = self.allocate("key");
        self.keypairs.insert(
            spec.name.clone(),
            KeyRecord {
                id: id.clone(),
                public_key: spec.public_key.clone(),
            },
        );
        self.touch();
        Ok(id)
    }

    pub fn delete_keypair(&mut self, name: &str) -> Result<()> {
        self.keypairs
            .remove(name)
            .ok_or_else(|| missing("keypair", name))?;
        self.touch();
        Ok(())
    }

    pub fn run_instance(&mut self, spec: &InstanceSpec) -> Result<String> {
        if self.instances.contains_key(&spec.name) {
            return Err(exists("instance", &spec.name));
        }
        if !self.keypairs.contains_key(&spec.keypair) {
            return Err(missing("keypair", &spec.keypair));
        }
        for group in &spec.security_groups {
            if !self.group_exists(group) {
                return Err(missing("secgroup", group));
            }
        }
        let subnet = self
            .subnets
            .get(&spec.subnet)
            .cloned()
            .ok_or_else(|| missing("subnet", &spec.subnet))?;

        // first addresses of a block are reserved
        let net = parse_net(&subnet.cidr)?;
        let host = subnet.next_host as usize + 4;
        let private_ip = net
            .hosts()
            .nth(host)
            .ok_or_else(|| CloudError::Rejected(format!("subnet {} is full", spec.subnet)))?
            .to_string();
        if let Some(s) = self.subnets.get_mut(&spec.subnet) {
            s.next_host += 1;
        }
        let public_ip = subnet.public.then(|| self.allocate_public([203, 0, 113]));

        let id = self.allocate("i");
        if let Some(boot) = &spec.boot_volume {
            let volume_id = self.allocate("vol");
            self.volumes.insert(
                boot.name(),
                VolumeRecord {
                    id: volume_id,
                    size: boot.size,
                    kind: boot.kind.clone(),
                    boot: true,
                    attached_to: Some(id.clone()),
                    tags: BTreeMap::new(),
                },
            );
        }
        self.instances.insert(
            spec.name.clone(),
            InstanceRecord {
                id: id.clone(),
                state: InstanceState::Running,
                subnet: spec.subnet.clone(),
                key_name: spec.keypair.clone(),
                image_id: format!("ami-{}", spec.image_family),
                instance_type: spec.instance_type.clone(),
                security_groups: spec.security_groups.clone(),
                private_ip,
                public_ip,
                tags: BTreeMap::new(),
                role: None,
                console: vec![format!("{} booted", spec.name)],
                launched_at: Utc::now(),
            },
        );
        self.touch();
        Ok(id)
    }

    /// Terminate an instance; every volume still attached goes with it
    pub fn terminate_instance(&mut self, name: &str) -> Result<()> {
        let instance = self
            .instances
            .remove(name)
            .ok_or_else(|| missing("instance", name))?;
        self.volumes
            .retain(|_, v| v.attached_to.as_deref() != Some(instance.id.as_str()));
        for eip in self.eips.values_mut() {
            if eip.attached_to.as_deref() == Some(instance.id.as_str()) {
                eip.attached_to = None;
            }
        }
        self.touch();
        Ok(())
    }

    pub fn set_instance_state(&mut self, name: &str, state: InstanceState) -> Result<()> {
        let instance = self
            .instances
            .get_mut(name)
            .ok_or_else(|| missing("instance", name))?;
        instance.state = state;
        instance
            .console
            .push(format!("{} {}", name, state));
        self.touch();
        Ok(())
    }

    pub fn tag_instance(&mut self, name: &str, tags: &BTreeMap<String, String>) -> Result<()> {
        let instance = self
            .instances
            .get_mut(name)
            .ok_or_else(|| missing("instance", name))?;
        instance.tags.extend(tags.clone());
        self.touch();
        Ok(())
    }

    pub fn attach_role(&mut self, name: &str, role: &str) -> Result<()> {
        if !self.roles.contains_key(role) {
            return Err(missing("role", role));
        }
        let instance = self
            .instances
            .get_mut(name)
            .ok_or_else(|| missing("instance", name))?;
        instance.role = Some(role.to_string());
        self.touch();
        Ok(())
    }

    pub fn create_volume(&mut self, spec: &VolumeSpec) -> Result<String> {
        let key = spec.name();
        if self.volumes.contains_key(&key) {
            return Err(exists("volume", &key));
        }
        let id = self.allocate("vol");
        self.volumes.insert(
            key,
            VolumeRecord {
                id: id.clone(),
                size: spec.size,
                kind: spec.kind.clone(),
                boot: spec.boot,
                attached_to: None,
                tags: BTreeMap::new(),
            },
        );
        self.touch();
        Ok(id)
    }

    pub fn attach_volume(&mut self, key: &str, instance_id: &str) -> Result<()> {
        if self.instance_name_by_id(instance_id).is_none() {
            return Err(missing("instance", instance_id));
        }
        let volume = self
            .volumes
            .get_mut(key)
            .ok_or_else(|| missing("volume", key))?;
        match &volume.attached_to {
            Some(current) if current == instance_id => {}
            Some(current) => {
                return Err(CloudError::Rejected(format!(
                    "volume {} is attached to {}",
                    key, current
                )));
            }
            None => volume.attached_to = Some(instance_id.to_string()),
        }
        self.touch();
        Ok(())
    }

    pub fn detach_volume(&mut self, key: &str) -> Result<()> {
        let volume = self
            .volumes
            .get_mut(key)
            .ok_or_else(|| missing("volume", key))?;
        volume.attached_to = None;
        self.touch();
        Ok(())
    }

    pub fn delete_volume(&mut self, key: &str) -> Result<()> {
        match self.volumes.get(key) {
            None => return Err(missing("volume", key)),
            Some(v) if v.attached_to.is_some() => {
                return Err(CloudError::Rejected(format!("volume {} is attached", key)));
            }
            Some(_) => {}
        }
        self.volumes.remove(key);
        self.touch();
        Ok(())
    }

    pub fn tag_volume(&mut self, key: &str, tags: &BTreeMap<String, String>) -> Result<()> {
        let volume = self
            .volumes
            .get_mut(key)
            .ok_or_else(|| missing("volume", key))?;
        volume.tags.extend(tags.clone());
        self.touch();
        Ok(())
    }

    pub fn allocate_eip(&mut self, owner: &str) -> Result<String> {
        if self.eips.contains_key(owner) {
            return Err(exists("eip", owner));
        }
        let id = self.allocate("eipalloc");
        let ip = self.allocate_public([198, 51, 100]);
        self.eips.insert(
            owner.to_string(),
            EipRecord {
                id: id.clone(),
                ip,
                attached_to: None,
            },
        );
        self.touch();
        Ok(id)
    }

    pub fn associate_eip(&mut self, owner: &str, instance_id: &str) -> Result<()> {
        let name = self
            .instance_name_by_id(instance_id)
            .ok_or_else(|| missing("instance", instance_id))?;
        let eip = self
            .eips
            .get_mut(owner)
            .ok_or_else(|| missing("eip", owner))?;
        eip.attached_to = Some(instance_id.to_string());
        let ip = eip.ip.clone();
        if let Some(instance) = self.instances.get_mut(&name) {
            instance.public_ip = Some(ip);
        }
        self.touch();
        Ok(())
    }

    pub fn disassociate_eip(&mut self, owner: &str) -> Result<()> {
        let eip = self
            .eips
            .get_mut(owner)
            .ok_or_else(|| missing("eip", owner))?;
        eip.attached_to = None;
        self.touch();
        Ok(())
    }

    pub fn release_eip(&mut self, owner: &str) -> Result<()> {
        match self.eips.get(owner) {
            None => return Err(missing("eip", owner)),
            Some(e) if e.attached_to.is_some() => {
                return Err(CloudError::Rejected(format!("eip of {} is attached", owner)));
            }
            Some(_) => {}
        }
        self.eips.remove(owner);
        self.touch();
        Ok(())
    }

    pub fn create_role(&mut self, name: &str) -> Result<String> {
        if self.roles.contains_key(name) {
            return Err(exists("role", name));
        }
        let id = self.allocate("role");
        self.roles
            .insert(name.to_string(), RoleRecord { id: id.clone() });
        self.touch();
        Ok(id)
    }

    pub fn delete_role(&mut self, name: &str) -> Result<()> {
        if self
            .instances
            .values()
            .any(|i| i.role.as_deref() == Some(name))
        {
            return Err(CloudError::Rejected(format!("role {} is in use", name)));
        }
        self.roles
            .remove(name)
            .ok_or_else(|| missing("role", name))?;
        self.touch();
        Ok(())
    }

    // ---- dns ----

    /// Create or replace a record
    pub fn upsert_record(&mut self, spec: &RecordSpec) -> Result<String> {
        if spec.values.is_empty() {
            return Err(CloudError::InvalidConfig(format!(
                "record {} has no values",
                spec.fqdn
            )));
        }
        if !spec.fqdn.ends_with(&spec.zone) {
            return Err(CloudError::Rejected(format!(
                "record {} is outside zone {}",
                spec.fqdn, spec.zone
            )));
        }
        let id = match self.records.get(&spec.fqdn) {
            Some(existing) => existing.id.clone(),
            None => self.allocate("rr"),
        };
        self.records.insert(
            spec.fqdn.clone(),
            RecordEntry {
                id: id.clone(),
                kind: spec.kind,
                ttl: spec.ttl,
                values: spec.values.clone(),
            },
        );
        self.touch();
        Ok(id)
    }

    pub fn delete_record(&mut self, fqdn: &str) -> Result<()> {
        self.records
            .remove(fqdn)
            .ok_or_else(|| missing("record", fqdn))?;
        self.touch();
        Ok(())
    }

    pub fn zone_records(&self, zone: &str) -> Vec<RecordListing> {
        self.records
            .iter()
            .filter(|(fqdn, _)| fqdn.ends_with(zone))
            .map(|(fqdn, r)| RecordListing {
                fqdn: fqdn.clone(),
                kind: r.kind,
                values: r.values.clone(),
            })
            .collect()
    }

    // ---- services ----

    pub fn create_database(&mut self, spec: &DatabaseSpec) -> Result<String> {
        if self.databases.contains_key(&spec.name) {
            return Err(exists("db", &spec.name));
        }
        for group in &spec.security_groups {
            if !self.group_exists(group) {
                return Err(missing("secgroup", group));
            }
        }
        let id = self.allocate("db");
        self.databases.insert(
            spec.name.clone(),
            DatabaseRecord {
                id: id.clone(),
                engine: spec.engine.clone(),
                version: spec.version.clone(),
                instance_type: spec.instance_type.clone(),
                storage: spec.storage,
                endpoint: format!("{}.db.mock.internal", spec.name),
                snapshots: Vec::new(),
            },
        );
        self.touch();
        Ok(id)
    }

    /// Bring an existing database in line with its spec
    pub fn modify_database(&mut self, spec: &DatabaseSpec) -> Result<()> {
        let db = self
            .databases
            .get_mut(&spec.name)
            .ok_or_else(|| missing("db", &spec.name))?;
        if spec.storage < db.storage {
            return Err(CloudError::Rejected(format!(
                "db {}: storage cannot shrink from {} to {}",
                spec.name, db.storage, spec.storage
            )));
        }
        db.version = spec.version.clone();
        db.instance_type = spec.instance_type.clone();
        db.storage = spec.storage;
        self.touch();
        Ok(())
    }

    pub fn delete_database(&mut self, name: &str) -> Result<()> {
        self.databases
            .remove(name)
            .ok_or_else(|| missing("db", name))?;
        self.touch();
        Ok(())
    }

    pub fn snapshot_database(&mut self, name: &str, at: DateTime<Utc>) -> Result<String> {
        let db = self
            .databases
            .get_mut(name)
            .ok_or_else(|| missing("db", name))?;
        let snapshot = format!("{}-{}", name, at.format("%Y%m%d%H%M%S"));
        db.snapshots.push(snapshot.clone());
        self.touch();
        Ok(snapshot)
    }

    pub fn create_container(&mut self, spec: &ContainerSpec) -> Result<String> {
        if self.containers.contains_key(&spec.name) {
            return Err(exists("container", &spec.name));
        }
        let id = self.allocate("ecs");
        self.containers.insert(
            spec.name.clone(),
            ContainerRecord {
                id: id.clone(),
                revision: 1,
            },
        );
        self.touch();
        Ok(id)
    }

    pub fn update_container(&mut self, name: &str) -> Result<u32> {
        let container = self
            .containers
            .get_mut(name)
            .ok_or_else(|| missing("container", name))?;
        container.revision += 1;
        let revision = container.revision;
        self.touch();
        Ok(revision)
    }

    pub fn delete_container(&mut self, name: &str) -> Result<()> {
        self.containers
            .remove(name)
            .ok_or_else(|| missing("container", name))?;
        self.touch();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arc_cloud::RuleDirection;

    fn network(cloud: &mut MockCloud) {
        cloud
            .create_network(&NetworkSpec {
                name: "dev".to_string(),
                cidr: "10.0.0.0/16".to_string(),
            })
            .unwrap();
    }

    fn subnet(name: &str, cidr: &str, public: bool) -> SubnetSpec {
        SubnetSpec {
            name: name.to_string(),
            group: "g".to_string(),
            network: "dev".to_string(),
            cidr: cidr.to_string(),
            availability_zone: "az1".to_string(),
            public,
            manage_routes: false,
        }
    }

    fn rule_to(group: &str) -> RuleSpec {
        RuleSpec {
            direction: RuleDirection::Ingress,
            protocol: "tcp".to_string(),
            ports: "22".to_string(),
            peer: RulePeer::Group(group.to_string()),
        }
    }

    fn group(name: &str, rules: Vec<RuleSpec>) -> SecurityGroupSpec {
        SecurityGroupSpec {
            name: name.to_string(),
            network: "dev".to_string(),
            rules,
        }
    }

    fn instance(cloud: &mut MockCloud, name: &str) -> String {
        cloud
            .import_keypair(&KeyPairSpec {
                name: format!("key-{}", name),
                public_key: "ssh-ed25519 AAAA alice".to_string(),
            })
            .unwrap();
        cloud
            .run_instance(&InstanceSpec {
                name: name.to_string(),
                datacenter: "dev".to_string(),
                subnet: "public-az1".to_string(),
                availability_zone: "az1".to_string(),
                keypair: format!("key-{}", name),
                security_groups: vec![DEFAULT_GROUP.to_string()],
                image_family: "centos7".to_string(),
                instance_type: "t3.small".to_string(),
                boot_volume: Some(VolumeSpec {
                    instance: name.to_string(),
                    device: "/dev/sda1".to_string(),
                    size: 20,
                    kind: "gp2".to_string(),
                    boot: true,
                }),
            })
            .unwrap()
    }

    #[test]
    fn test_subnet_must_be_inside_network() {
        let mut cloud = MockCloud::new();
        assert!(cloud.create_subnet(&subnet("a", "10.0.1.0/24", false)).is_err());

        network(&mut cloud);
        cloud.create_subnet(&subnet("a", "10.0.1.0/24", false)).unwrap();
        assert!(matches!(
            cloud.create_subnet(&subnet("b", "10.1.0.0/24", false)),
            Err(CloudError::Rejected(_))
        ));
        assert!(matches!(
            cloud.create_subnet(&subnet("c", "10.0.1.128/25", false)),
            Err(CloudError::Rejected(_))
        ));
    }

    #[test]
    fn test_rules_need_existing_groups() {
        let mut cloud = MockCloud::new();
        network(&mut cloud);

        let web = group("web", vec![rule_to("ssh")]);
        assert!(matches!(
            cloud.create_group(&web, true),
            Err(CloudError::Rejected(_))
        ));
        // without rules the group can be created first
        cloud.create_group(&web, false).unwrap();
        cloud.create_group(&group("ssh", vec![]), false).unwrap();
        cloud.set_rules("web", &web.rules).unwrap();
        assert_eq!(cloud.security_groups["web"].rules.len(), 1);

        // referenced groups cannot go away
        assert!(matches!(
            cloud.delete_group("ssh"),
            Err(CloudError::Rejected(_))
        ));
        cloud.set_rules("web", &[]).unwrap();
        cloud.delete_group("ssh").unwrap();
    }

    #[test]
    fn test_default_group_is_listed() {
        let mut cloud = MockCloud::new();
        assert!(cloud.group_names().is_empty());
        network(&mut cloud);
        assert_eq!(cloud.group_names(), vec![DEFAULT_GROUP.to_string()]);
    }

    #[test]
    fn test_instance_requires_dependencies() {
        let mut cloud = MockCloud::new();
        network(&mut cloud);
        let spec = InstanceSpec {
            name: "web-01".to_string(),
            subnet: "public-az1".to_string(),
            keypair: "missing".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            cloud.run_instance(&spec),
            Err(CloudError::ResourceNotFound(_))
        ));
    }

    #[test]
    fn test_terminate_reaps_attached_volumes() {
        let mut cloud = MockCloud::new();
        network(&mut cloud);
        cloud
            .create_subnet(&subnet("public-az1", "10.0.1.0/24", true))
            .unwrap();
        let id = instance(&mut cloud, "web-01");

        let instance = &cloud.instances["web-01"];
        assert_eq!(instance.private_ip, "10.0.1.5");
        assert!(instance.public_ip.is_some());

        let data = VolumeSpec {
            instance: "web-01".to_string(),
            device: "/dev/sdf".to_string(),
            size: 100,
            kind: "gp2".to_string(),
            boot: false,
        };
        let logs = VolumeSpec {
            device: "/dev/sdg".to_string(),
            ..data.clone()
        };
        cloud.create_volume(&data).unwrap();
        cloud.create_volume(&logs).unwrap();
        cloud.attach_volume(&data.name(), &id).unwrap();
        cloud.attach_volume(&logs.name(), &id).unwrap();
        cloud.detach_volume(&data.name()).unwrap();

        cloud.terminate_instance("web-01").unwrap();
        // detached volume survives, boot and attached ones are gone
        assert!(cloud.volumes.contains_key("web-01:/dev/sdf"));
        assert!(!cloud.volumes.contains_key("web-01:/dev/sdg"));
        assert!(!cloud.volumes.contains_key("web-01:/dev/sda1"));
    }

    #[test]
    fn test_eip_must_be_detached_before_release() {
        let mut cloud = MockCloud::new();
        network(&mut cloud);
        cloud
            .create_subnet(&subnet("public-az1", "10.0.1.0/24", true))
            .unwrap();
        let id = instance(&mut cloud, "web-01");

        cloud.allocate_eip("web-01").unwrap();
        cloud.associate_eip("web-01", &id).unwrap();
        let ip = cloud.eips["web-01"].ip.clone();
        assert_eq!(cloud.instances["web-01"].public_ip.as_deref(), Some(ip.as_str()));

        assert!(cloud.release_eip("web-01").is_err());
        cloud.disassociate_eip("web-01").unwrap();
        cloud.release_eip("web-01").unwrap();
    }

    #[test]
    fn test_upsert_record_keeps_id() {
        let mut cloud = MockCloud::new();
        let mut spec = RecordSpec {
            zone: "dev.example.com".to_string(),
            fqdn: "web-01.dev.example.com".to_string(),
            kind: RecordKind::A,
            ttl: 300,
            values: vec!["10.0.1.5".to_string()],
        };
        let first = cloud.upsert_record(&spec).unwrap();
        spec.values = vec!["10.0.1.6".to_string()];
        let second = cloud.upsert_record(&spec).unwrap();
        assert_eq!(first, second);
        assert_eq!(cloud.zone_records("dev.example.com")[0].values, spec.values);

        spec.fqdn = "web.other.org".to_string();
        assert!(cloud.upsert_record(&spec).is_err());
    }

    #[test]
    fn test_database_storage_cannot_shrink() {
        let mut cloud = MockCloud::new();
        let mut spec = DatabaseSpec {
            name: "main".to_string(),
            engine: "postgres".to_string(),
            storage: 100,
            ..Default::default()
        };
        cloud.create_database(&spec).unwrap();
        spec.storage = 50;
        assert!(cloud.modify_database(&spec).is_err());
        spec.storage = 200;
        cloud.modify_database(&spec).unwrap();
        assert_eq!(cloud.databases["main"].storage, 200);
    }
}
