//! Mock cloud provider for arc
//!
//! A complete in-memory cloud behind the `mock` vendor tag. It enforces the
//! dependency rules of a real provider and records every write it accepts,
//! which makes it the backend of choice for tests and dry runs.
//!
//! Setting `ARC_MOCK_STATE` to a file path keeps the cloud between
//! invocations.

mod cloud;
mod compute;
mod dns;
mod network;
mod services;
mod shared;
mod store;

pub use cloud::{
    ContainerRecord, DEFAULT_GROUP, DatabaseRecord, EipRecord, GroupRecord, InstanceRecord,
    KeyRecord, MockCloud, NetworkRecord, RecordEntry, RoleRecord, SubnetRecord, VolumeRecord,
};
pub use store::StateStore;

use arc_cloud::{
    ContainerFactory, ContainerProvider, ContainerSpec, DatabaseFactory, DatabaseProvider,
    DatabaseSpec, DatacenterFactory, DnsFactory, DnsRecordProvider, DnsZoneProvider,
    ElasticIpProvider, ElasticIpSpec, InstanceProvider, InstanceSpec, KeyPairProvider,
    KeyPairSpec, NetworkProvider, NetworkSpec, Provider, RecordSpec, ResourceKind, Result,
    RoleProvider, RoleSpec, SecurityGroupProvider, SecurityGroupSpec, Settings, SubnetProvider,
    SubnetSpec, VolumeProvider, VolumeSpec, ZoneSpec,
};
use async_trait::async_trait;
use shared::Shared;
use std::path::Path;
use std::sync::Arc;

pub const VENDOR: &str = "mock";

/// Environment variable naming the state file
pub const STATE_ENV: &str = "ARC_MOCK_STATE";

/// The `mock` vendor
#[derive(Clone)]
pub struct MockProvider {
    shared: Arc<Shared>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    /// An empty cloud that lives as long as the provider
    pub fn new() -> Self {
        Self::with_cloud(MockCloud::new())
    }

    /// Start from a prepared cloud
    pub fn with_cloud(cloud: MockCloud) -> Self {
        Self {
            shared: Arc::new(Shared::new(cloud, None)),
        }
    }

    /// Load the cloud from a state file and save it back after every write
    pub async fn with_state_file(path: impl AsRef<Path>) -> Result<Self> {
        let store = StateStore::new(path);
        let cloud = store.load().await?;
        Ok(Self {
            shared: Arc::new(Shared::new(cloud, Some(store))),
        })
    }

    /// Persistent when `ARC_MOCK_STATE` is set, in-memory otherwise
    pub async fn from_env() -> Result<Self> {
        match std::env::var(STATE_ENV) {
            Ok(path) if !path.is_empty() => Self::with_state_file(path).await,
            _ => Ok(Self::new()),
        }
    }

    /// Write calls accepted so far
    pub async fn calls(&self) -> Vec<String> {
        self.shared.read(|c| c.calls.clone()).await
    }

    /// Copy of the whole cloud
    pub async fn snapshot(&self) -> MockCloud {
        self.shared.snapshot().await
    }

    /// Change the cloud behind the orchestrator's back
    pub async fn tamper<F>(&self, op: F)
    where
        F: FnOnce(&mut MockCloud) + Send,
    {
        self.shared.update(op).await
    }

    fn factory(&self) -> Arc<MockFactory> {
        Arc::new(MockFactory {
            shared: self.shared.clone(),
        })
    }
}

impl Provider for MockProvider {
    fn vendor(&self) -> &str {
        VENDOR
    }

    fn datacenter(
        &self,
        datacenter: &str,
        settings: &Settings,
    ) -> Result<Arc<dyn DatacenterFactory>> {
        tracing::debug!(datacenter, region = ?settings.get("region"), "mock datacenter");
        Ok(self.factory())
    }

    fn dns(&self, _settings: &Settings) -> Result<Arc<dyn DnsFactory>> {
        Ok(self.factory())
    }

    fn database(&self, _settings: &Settings) -> Result<Arc<dyn DatabaseFactory>> {
        Ok(self.factory())
    }

    fn container(&self, _settings: &Settings) -> Result<Arc<dyn ContainerFactory>> {
        Ok(self.factory())
    }
}

/// One factory serves every family; all handles share the provider's cloud
struct MockFactory {
    shared: Arc<Shared>,
}

#[async_trait]
impl DatacenterFactory for MockFactory {
    fn network(&self, spec: &NetworkSpec) -> Result<Box<dyn NetworkProvider>> {
        Ok(Box::new(network::MockNetwork::new(
            self.shared.clone(),
            spec.clone(),
        )))
    }

    fn subnet(&self, spec: &SubnetSpec) -> Result<Box<dyn SubnetProvider>> {
        Ok(Box::new(network::MockSubnet::new(
            self.shared.clone(),
            spec.clone(),
        )))
    }

    fn security_group(&self, spec: &SecurityGroupSpec) -> Result<Box<dyn SecurityGroupProvider>> {
        Ok(Box::new(network::MockSecurityGroup::new(
            self.shared.clone(),
            spec.clone(),
        )))
    }

    fn keypair(&self, spec: &KeyPairSpec) -> Result<Box<dyn KeyPairProvider>> {
        Ok(Box::new(compute::MockKeyPair::new(
            self.shared.clone(),
            spec.clone(),
        )))
    }

    fn instance(&self, spec: &InstanceSpec) -> Result<Box<dyn InstanceProvider>> {
        Ok(Box::new(compute::MockInstance::new(
            self.shared.clone(),
            spec.clone(),
        )))
    }

    fn volume(&self, spec: &VolumeSpec) -> Result<Box<dyn VolumeProvider>> {
        Ok(Box::new(compute::MockVolume::new(
            self.shared.clone(),
            spec.clone(),
        )))
    }

    fn elastic_ip(&self, spec: &ElasticIpSpec) -> Result<Box<dyn ElasticIpProvider>> {
        Ok(Box::new(compute::MockElasticIp::new(
            self.shared.clone(),
            spec.clone(),
        )))
    }

    fn role(&self, spec: &RoleSpec) -> Result<Box<dyn RoleProvider>> {
        Ok(Box::new(compute::MockRole::new(
            self.shared.clone(),
            spec.clone(),
        )))
    }

    async fn inventory(&self, kind: ResourceKind) -> Result<Vec<String>> {
        Ok(self
            .shared
            .read(|c| match kind {
                ResourceKind::Network => c.networks.keys().cloned().collect(),
                ResourceKind::Subnet => c.subnets.keys().cloned().collect(),
                ResourceKind::SecurityGroup => c.group_names(),
                ResourceKind::KeyPair => c.keypairs.keys().cloned().collect(),
                ResourceKind::Instance => c.instances.keys().cloned().collect(),
                ResourceKind::Volume => c.volumes.keys().cloned().collect(),
                ResourceKind::ElasticIp => c.eips.keys().cloned().collect(),
                ResourceKind::Role => c.roles.keys().cloned().collect(),
                ResourceKind::DnsRecord => c.records.keys().cloned().collect(),
                ResourceKind::Database => c.databases.keys().cloned().collect(),
                ResourceKind::Container => c.containers.keys().cloned().collect(),
            })
            .await)
    }
}

impl DnsFactory for MockFactory {
    fn zone(&self, spec: &ZoneSpec) -> Result<Box<dyn DnsZoneProvider>> {
        Ok(Box::new(dns::MockZone::new(self.shared.clone(), spec.clone())))
    }

    fn record(&self, spec: &RecordSpec) -> Result<Box<dyn DnsRecordProvider>> {
        Ok(Box::new(dns::MockRecord::new(
            self.shared.clone(),
            spec.clone(),
        )))
    }
}

#[async_trait]
impl DatabaseFactory for MockFactory {
    fn database(&self, spec: &DatabaseSpec) -> Result<Box<dyn DatabaseProvider>> {
        Ok(Box::new(services::MockDatabase::new(
            self.shared.clone(),
            spec.clone(),
        )))
    }

    async fn inventory(&self) -> Result<Vec<String>> {
        Ok(self
            .shared
            .read(|c| c.databases.keys().cloned().collect())
            .await)
    }
}

impl ContainerFactory for MockFactory {
    fn container(&self, spec: &ContainerSpec) -> Result<Box<dyn ContainerProvider>> {
        Ok(Box::new(services::MockContainer::new(
            self.shared.clone(),
            spec.clone(),
        )))
    }
}
