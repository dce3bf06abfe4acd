//! Provider handle and factory traits
//!
//! A vendor implements one handle trait per resource family and a factory per
//! service. The orchestrator owns ordering and user facing behavior; a handle
//! only performs the provider work for a single resource and caches what it
//! last loaded.

use crate::error::{CloudError, Result};
use crate::route::Request;
use crate::spec::{
    ContainerSpec, DatabaseSpec, ElasticIpSpec, InstanceSpec, KeyPairSpec, NetworkSpec,
    RecordKind, RecordListing, RecordSpec, ResourceKind, RoleSpec, SecurityGroupSpec,
    SubnetSpec, VolumeSpec, ZoneSpec,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Vendor specific sub-verb published by a handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelpCommand {
    pub name: String,
    pub description: String,
}

impl HelpCommand {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Operations shared by every provider handle
#[async_trait]
pub trait ProviderResource: Send + Sync {
    /// Provider identifier; empty while the resource does not exist
    fn id(&self) -> &str;

    fn created(&self) -> bool {
        !self.id().is_empty()
    }

    fn destroyed(&self) -> bool {
        !self.created()
    }

    /// Refresh the cached state from the provider
    async fn load(&mut self) -> Result<()>;

    async fn create(&mut self, req: &Request) -> Result<()>;

    async fn destroy(&mut self, req: &Request) -> Result<()>;

    /// Key/value lines describing the resource
    fn info(&self) -> Vec<(String, String)> {
        vec![("id".to_string(), self.id().to_string())]
    }

    /// Drift between configuration and provider state
    async fn audit(&mut self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    /// Whether the top path token of `req` is a vendor sub-verb
    fn can_route(&self, _req: &Request) -> bool {
        false
    }

    fn help_commands(&self) -> Vec<HelpCommand> {
        Vec::new()
    }

    async fn vendor_route(&mut self, req: &Request) -> Result<()> {
        Err(CloudError::Unsupported(format!(
            "{} {}",
            req.path(),
            req.command()
        )))
    }
}

pub trait NetworkProvider: ProviderResource {}

pub trait SubnetProvider: ProviderResource {}

#[async_trait]
pub trait SecurityGroupProvider: ProviderResource {
    /// Install or reconcile the configured rules
    async fn provision(&mut self, req: &Request) -> Result<()>;
}

pub trait KeyPairProvider: ProviderResource {}

/// Power state of an instance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    #[default]
    Unknown,
    Pending,
    Running,
    Stopping,
    Stopped,
    Terminated,
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InstanceState::Unknown => "unknown",
            InstanceState::Pending => "pending",
            InstanceState::Running => "running",
            InstanceState::Stopping => "stopping",
            InstanceState::Stopped => "stopped",
            InstanceState::Terminated => "terminated",
        };
        write!(f, "{}", s)
    }
}

#[async_trait]
pub trait InstanceProvider: ProviderResource {
    fn state(&self) -> InstanceState;

    fn started(&self) -> bool {
        self.state() == InstanceState::Running
    }

    fn stopped(&self) -> bool {
        self.state() == InstanceState::Stopped
    }

    fn private_ip(&self) -> Option<&str>;

    fn public_ip(&self) -> Option<&str>;

    async fn start(&mut self, req: &Request) -> Result<()>;

    async fn stop(&mut self, req: &Request) -> Result<()>;

    /// Provider side restart
    async fn restart(&mut self, req: &Request) -> Result<()>;

    async fn set_tags(&mut self, tags: &BTreeMap<String, String>) -> Result<()>;

    fn tags(&self) -> BTreeMap<String, String>;

    async fn attach_role(&mut self, role: &str) -> Result<()>;
}

#[async_trait]
pub trait VolumeProvider: ProviderResource {
    async fn attach(&mut self, instance_id: &str) -> Result<()>;

    async fn detach(&mut self) -> Result<()>;

    /// Forget the cached identity without touching the provider
    fn reset(&mut self);

    fn attached(&self) -> bool;

    async fn set_tags(&mut self, tags: &BTreeMap<String, String>) -> Result<()>;
}

#[async_trait]
pub trait ElasticIpProvider: ProviderResource {
    fn ip(&self) -> Option<&str>;

    async fn attach(&mut self, instance_id: &str) -> Result<()>;

    async fn detach(&mut self) -> Result<()>;

    fn attached(&self) -> bool;
}

pub trait RoleProvider: ProviderResource {}

#[async_trait]
pub trait DnsZoneProvider: Send + Sync {
    /// Every record currently in the zone
    async fn records(&self) -> Result<Vec<RecordListing>>;
}

pub trait DnsRecordProvider: ProviderResource {
    fn kind(&self) -> RecordKind;

    /// Values as last loaded from the provider
    fn values(&self) -> &[String];

    fn ttl(&self) -> u32;

    /// Desired values for the next create
    fn set_values(&mut self, values: Vec<String>);
}

#[async_trait]
pub trait DatabaseProvider: ProviderResource {
    async fn provision(&mut self, req: &Request) -> Result<()>;
}

#[async_trait]
pub trait ContainerProvider: ProviderResource {
    async fn provision(&mut self, req: &Request) -> Result<()>;
}

/// Handles for everything inside a datacenter
#[async_trait]
pub trait DatacenterFactory: Send + Sync {
    fn network(&self, spec: &NetworkSpec) -> Result<Box<dyn NetworkProvider>>;

    fn subnet(&self, spec: &SubnetSpec) -> Result<Box<dyn SubnetProvider>>;

    fn security_group(&self, spec: &SecurityGroupSpec) -> Result<Box<dyn SecurityGroupProvider>>;

    fn keypair(&self, spec: &KeyPairSpec) -> Result<Box<dyn KeyPairProvider>>;

    fn instance(&self, spec: &InstanceSpec) -> Result<Box<dyn InstanceProvider>>;

    fn volume(&self, spec: &VolumeSpec) -> Result<Box<dyn VolumeProvider>>;

    fn elastic_ip(&self, spec: &ElasticIpSpec) -> Result<Box<dyn ElasticIpProvider>>;

    fn role(&self, spec: &RoleSpec) -> Result<Box<dyn RoleProvider>>;

    /// Names of every resource of `kind` present at the provider
    async fn inventory(&self, kind: ResourceKind) -> Result<Vec<String>>;
}

pub trait DnsFactory: Send + Sync {
    fn zone(&self, spec: &ZoneSpec) -> Result<Box<dyn DnsZoneProvider>>;

    fn record(&self, spec: &RecordSpec) -> Result<Box<dyn DnsRecordProvider>>;
}

#[async_trait]
pub trait DatabaseFactory: Send + Sync {
    fn database(&self, spec: &DatabaseSpec) -> Result<Box<dyn DatabaseProvider>>;

    async fn inventory(&self) -> Result<Vec<String>>;
}

pub trait ContainerFactory: Send + Sync {
    fn container(&self, spec: &ContainerSpec) -> Result<Box<dyn ContainerProvider>>;
}

/// Vendor specific settings from the `provider` node
pub type Settings = BTreeMap<String, String>;

/// A vendor: the entry point the registry hands out by tag
pub trait Provider: Send + Sync {
    fn vendor(&self) -> &str;

    fn datacenter(&self, datacenter: &str, settings: &Settings)
    -> Result<Arc<dyn DatacenterFactory>>;

    fn dns(&self, settings: &Settings) -> Result<Arc<dyn DnsFactory>> {
        let _ = settings;
        Err(CloudError::Unsupported(format!("{} dns", self.vendor())))
    }

    fn database(&self, settings: &Settings) -> Result<Arc<dyn DatabaseFactory>> {
        let _ = settings;
        Err(CloudError::Unsupported(format!("{} database", self.vendor())))
    }

    fn container(&self, settings: &Settings) -> Result<Arc<dyn ContainerFactory>> {
        let _ = settings;
        Err(CloudError::Unsupported(format!("{} container", self.vendor())))
    }
}
