//! Datacenter configuration model
//!
//! Typed form of a `<datacenter>.kdl` document. Everything here is plain data;
//! the resource tree in `arc-core` is built from it.

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Whole configuration document for one datacenter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Datacenter name (the first CLI argument)
    pub name: String,

    pub datacenter: DatacenterConfig,

    pub dns: Option<DnsConfig>,

    pub database: Option<DatabaseServiceConfig>,

    pub container: Option<ContainerServiceConfig>,

    pub users: Vec<User>,

    pub groups: Vec<Group>,

    pub teams: Vec<Team>,
}

impl Config {
    pub fn team(&self, name: &str) -> Option<&Team> {
        self.teams.iter().find(|t| t.name == name)
    }

    pub fn user(&self, name: &str) -> Option<&User> {
        self.users.iter().find(|u| u.name == name)
    }

    pub fn group(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// All pods of the datacenter, in cluster then pod order
    pub fn pods(&self) -> impl Iterator<Item = &PodConfig> {
        self.datacenter
            .compute
            .clusters
            .iter()
            .flat_map(|c| c.pods.iter())
    }
}

/// Vendor selection for a subtree
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Vendor tag (mock, aws, ...)
    pub vendor: String,

    /// Vendor specific settings
    pub data: BTreeMap<String, String>,
}

impl ProviderConfig {
    pub fn new(vendor: impl Into<String>) -> Self {
        Self {
            vendor: vendor.into(),
            data: BTreeMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatacenterConfig {
    pub name: String,

    pub provider: ProviderConfig,

    /// Tags applied to every instance and volume of the datacenter
    pub security_tags: BTreeMap<String, String>,

    pub network: NetworkConfig,

    pub compute: ComputeConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub cidr: String,

    pub availability_zones: Vec<String>,

    /// name -> CIDR
    pub cidr_aliases: BTreeMap<String, String>,

    /// name -> list of aliases or CIDRs
    pub cidr_groups: BTreeMap<String, Vec<String>>,

    pub subnet_groups: Vec<SubnetGroupConfig>,

    pub security_groups: Vec<SecurityGroupConfig>,
}

impl NetworkConfig {
    pub fn subnet_group(&self, name: &str) -> Option<&SubnetGroupConfig> {
        self.subnet_groups.iter().find(|g| g.name == name)
    }

    pub fn security_group(&self, name: &str) -> Option<&SecurityGroupConfig> {
        self.security_groups.iter().find(|g| g.name == name)
    }

    /// Resolve a rule remote token into concrete remotes.
    ///
    /// Lookup order: security group, CIDR alias, CIDR group, literal CIDR.
    pub fn resolve_remote(&self, token: &str) -> Option<Vec<Remote>> {
        if self.security_group(token).is_some() {
            return Some(vec![Remote::Group(token.to_string())]);
        }
        if let Some(cidr) = self.cidr_aliases.get(token) {
            return Some(vec![Remote::Cidr(cidr.clone())]);
        }
        if let Some(members) = self.cidr_groups.get(token) {
            let mut remotes = Vec::new();
            for member in members {
                match self.cidr_aliases.get(member) {
                    Some(cidr) => remotes.push(Remote::Cidr(cidr.clone())),
                    None if is_cidr(member) => remotes.push(Remote::Cidr(member.clone())),
                    None => return None,
                }
            }
            return Some(remotes);
        }
        if is_cidr(token) {
            return Some(vec![Remote::Cidr(token.to_string())]);
        }
        None
    }
}

fn is_cidr(s: &str) -> bool {
    s.parse::<Ipv4Net>().is_ok()
}

/// Connectivity tier of a subnet
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    Public,
    PublicElastic,
    #[default]
    Private,
}

impl Access {
    /// Subnets of this class get a public hostname
    pub fn is_public(&self) -> bool {
        matches!(self, Access::Public | Access::PublicElastic)
    }

    pub fn is_elastic(&self) -> bool {
        matches!(self, Access::PublicElastic)
    }
}

impl FromStr for Access {
    type Err = std::convert::Infallible;

    /// Anything that is not public is private
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "public" => Access::Public,
            "public_elastic" => Access::PublicElastic,
            _ => Access::Private,
        })
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::Public => write!(f, "public"),
            Access::PublicElastic => write!(f, "public_elastic"),
            Access::Private => write!(f, "private"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubnetGroupConfig {
    pub name: String,

    /// Base CIDR; the first availability zone gets it, the rest get successors
    pub cidr: String,

    pub access: Access,

    pub manage_routes: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityGroupConfig {
    pub name: String,

    pub rules: Vec<RuleConfig>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Ingress,
    Egress,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Ingress => write!(f, "ingress"),
            Direction::Egress => write!(f, "egress"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleConfig {
    pub direction: Direction,

    /// tcp, udp, icmp or all
    pub protocol: String,

    /// Single port ("22"), range ("8000-8080") or empty for all
    pub ports: String,

    /// Unresolved remote tokens
    pub remotes: Vec<String>,
}

/// Resolved rule peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Remote {
    Cidr(String),
    Group(String),
}

impl fmt::Display for Remote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Remote::Cidr(c) => write!(f, "{}", c),
            Remote::Group(g) => write!(f, "sg:{}", g),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComputeConfig {
    /// Private key filename whose public half is selected from the SSH agent
    pub keypair: String,

    pub clusters: Vec<ClusterConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub name: String,

    pub audit_ignore: bool,

    pub security_tags: BTreeMap<String, String>,

    pub pods: Vec<PodConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PodConfig {
    pub name: String,

    pub server_type: String,

    pub version: String,

    /// Package filename pattern; `{version}` is replaced by the pod version
    pub package_name: String,

    pub image_family: String,

    pub instance_type: String,

    pub security_groups: Vec<String>,

    pub role: Option<String>,

    pub subnet_group: String,

    pub teams: Vec<String>,

    pub count: u32,

    pub volumes: Vec<VolumeConfig>,

    /// Inherited from the owning cluster
    pub audit_ignore: bool,
}

impl PodConfig {
    pub fn package_file(&self) -> String {
        if self.package_name.contains("{version}") {
            self.package_name.replace("{version}", &self.version)
        } else {
            format!("{}-{}", self.package_name, self.version)
        }
    }

    pub fn boot_volume(&self) -> Option<&VolumeConfig> {
        self.volumes.iter().find(|v| v.boot)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VolumeConfig {
    pub device: String,

    /// Size in GiB
    pub size: u32,

    #[serde(rename = "type")]
    pub kind: String,

    pub fs: String,

    pub inodes: u64,

    pub mount_point: String,

    pub boot: bool,

    /// Survives instance replacement
    pub preserve: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DnsConfig {
    pub provider: ProviderConfig,

    pub domain: String,

    pub subdomain: String,

    /// TTL for records that do not set one
    pub ttl: u32,

    pub a_records: Vec<RecordConfig>,

    pub cname_records: Vec<RecordConfig>,
}

impl DnsConfig {
    /// Domain used for FQDNs: `<subdomain>.<domain>` or just the domain
    pub fn zone(&self) -> String {
        if self.subdomain.is_empty() {
            self.domain.clone()
        } else {
            format!("{}.{}", self.subdomain, self.domain)
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordConfig {
    pub name: String,

    pub ttl: u32,

    pub values: Vec<String>,

    /// CNAME only: resolve the value from this pod
    pub pod: Option<String>,

    /// CNAME only: which FQDN of the pod instance to use
    pub access: Access,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseServiceConfig {
    pub provider: ProviderConfig,

    pub databases: Vec<DatabaseConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub name: String,

    pub engine: String,

    pub version: String,

    pub instance_type: String,

    /// Storage in GiB
    pub storage: u32,

    pub subnet_group: String,

    pub security_groups: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerServiceConfig {
    pub name: String,

    pub provider: ProviderConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct User {
    pub name: String,

    pub uid: u32,

    pub groups: Vec<String>,

    pub sudo: bool,

    /// authorized_keys lines
    pub keys: Vec<String>,

    /// Remove the account instead of provisioning it
    pub removed: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Group {
    pub name: String,

    pub gid: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Team {
    pub name: String,

    pub users: Vec<String>,

    pub groups: Vec<String>,
}
