//! Resource specifications handed to provider factories
//!
//! Cross references between resources are by name; a provider resolves names
//! to its own identifiers when the resource is created.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Resource families a provider can list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Network,
    Subnet,
    SecurityGroup,
    KeyPair,
    Instance,
    Volume,
    ElasticIp,
    Role,
    DnsRecord,
    Database,
    Container,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceKind::Network => "network",
            ResourceKind::Subnet => "subnet",
            ResourceKind::SecurityGroup => "secgroup",
            ResourceKind::KeyPair => "keypair",
            ResourceKind::Instance => "instance",
            ResourceKind::Volume => "volume",
            ResourceKind::ElasticIp => "eip",
            ResourceKind::Role => "role",
            ResourceKind::DnsRecord => "dns",
            ResourceKind::Database => "db",
            ResourceKind::Container => "container",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub name: String,
    pub cidr: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubnetSpec {
    /// `<group>-<az>`
    pub name: String,
    pub group: String,
    pub network: String,
    pub cidr: String,
    pub availability_zone: String,
    /// Instances launched here get a public address
    pub public: bool,
    pub manage_routes: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleDirection {
    #[default]
    Ingress,
    Egress,
}

impl fmt::Display for RuleDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleDirection::Ingress => write!(f, "ingress"),
            RuleDirection::Egress => write!(f, "egress"),
        }
    }
}

/// Peer of a rule: an address block or another group by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RulePeer {
    Cidr(String),
    Group(String),
}

impl fmt::Display for RulePeer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RulePeer::Cidr(c) => write!(f, "{}", c),
            RulePeer::Group(g) => write!(f, "sg:{}", g),
        }
    }
}

/// One resolved rule; a configured rule with several remotes expands to several of these
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub direction: RuleDirection,
    pub protocol: String,
    pub ports: String,
    pub peer: RulePeer,
}

impl fmt::Display for RuleSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.direction, self.protocol, self.ports, self.peer
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityGroupSpec {
    pub name: String,
    pub network: String,
    pub rules: Vec<RuleSpec>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeyPairSpec {
    pub name: String,
    /// OpenSSH public key line
    pub public_key: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VolumeSpec {
    /// Owning instance name
    pub instance: String,
    pub device: String,
    /// GiB
    pub size: u32,
    pub kind: String,
    pub boot: bool,
}

impl VolumeSpec {
    /// Stable name a volume is found by across instance replacement
    pub fn name(&self) -> String {
        format!("{}:{}", self.instance, self.device)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstanceSpec {
    pub name: String,
    pub datacenter: String,
    pub subnet: String,
    pub availability_zone: String,
    pub keypair: String,
    pub security_groups: Vec<String>,
    pub image_family: String,
    pub instance_type: String,
    /// Created together with the instance
    pub boot_volume: Option<VolumeSpec>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ElasticIpSpec {
    /// Owning instance name
    pub instance: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleSpec {
    pub name: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    #[default]
    A,
    Cname,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::A => write!(f, "A"),
            RecordKind::Cname => write!(f, "CNAME"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZoneSpec {
    pub domain: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordSpec {
    pub zone: String,
    pub fqdn: String,
    pub kind: RecordKind,
    pub ttl: u32,
    pub values: Vec<String>,
}

/// A record as listed by a zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordListing {
    pub fqdn: String,
    pub kind: RecordKind,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseSpec {
    pub name: String,
    pub engine: String,
    pub version: String,
    pub instance_type: String,
    pub storage: u32,
    pub subnet_group: String,
    pub security_groups: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub name: String,
    pub datacenter: String,
}
