//! Database and container service handles

use crate::cloud::{ContainerRecord, DatabaseRecord};
use crate::shared::Shared;
use arc_cloud::{
    ContainerProvider, ContainerSpec, DatabaseProvider, DatabaseSpec, HelpCommand,
    ProviderResource, Request, Result,
};
use async_trait::async_trait;
use std::sync::Arc;

pub struct MockDatabase {
    shared: Arc<Shared>,
    spec: DatabaseSpec,
    record: Option<DatabaseRecord>,
}

impl MockDatabase {
    pub(crate) fn new(shared: Arc<Shared>, spec: DatabaseSpec) -> Self {
        Self {
            shared,
            spec,
            record: None,
        }
    }
}

#[async_trait]
impl ProviderResource for MockDatabase {
    fn id(&self) -> &str {
        self.record.as_ref().map(|r| r.id.as_str()).unwrap_or("")
    }

    async fn load(&mut self) -> Result<()> {
        let name = &self.spec.name;
        self.record = self.shared.read(|c| c.databases.get(name).cloned()).await;
        Ok(())
    }

    async fn create(&mut self, _req: &Request) -> Result<()> {
        let spec = self.spec.clone();
        self.shared
            .write(format!("create db {}", spec.name), move |c| {
                c.create_database(&spec)
            })
            .await?;
        self.load().await
    }

    async fn destroy(&mut self, _req: &Request) -> Result<()> {
        let name = self.spec.name.clone();
        self.shared
            .write(format!("destroy db {}", name), move |c| {
                c.delete_database(&name)
            })
            .await?;
        self.record = None;
        Ok(())
    }

    fn info(&self) -> Vec<(String, String)> {
        let Some(r) = &self.record else {
            return vec![("id".to_string(), String::new())];
        };
        vec![
            ("id".to_string(), r.id.clone()),
            ("engine".to_string(), format!("{} {}", r.engine, r.version)),
            ("type".to_string(), r.instance_type.clone()),
            ("storage".to_string(), format!("{} GiB", r.storage)),
            ("endpoint".to_string(), r.endpoint.clone()),
            ("snapshots".to_string(), r.snapshots.len().to_string()),
        ]
    }

    async fn audit(&mut self) -> Result<Vec<String>> {
        let mut findings = Vec::new();
        if let Some(r) = &self.record {
            if r.version != self.spec.version {
                findings.push(format!(
                    "version is {}, configured {}",
                    r.version, self.spec.version
                ));
            }
            if r.storage != self.spec.storage {
                findings.push(format!(
                    "storage is {} GiB, configured {} GiB",
                    r.storage, self.spec.storage
                ));
            }
        }
        Ok(findings)
    }

    fn can_route(&self, req: &Request) -> bool {
        req.top() == Some("snapshot")
    }

    fn help_commands(&self) -> Vec<HelpCommand> {
        vec![HelpCommand::new("snapshot", "Take a database snapshot")]
    }

    async fn vendor_route(&mut self, req: &Request) -> Result<()> {
        let name = self.spec.name.clone();
        let at = req.time();
        let snapshot = self
            .shared
            .write(format!("snapshot db {}", name), move |c| {
                c.snapshot_database(&name, at)
            })
            .await?;
        println!("snapshot: {}", snapshot);
        self.load().await
    }
}

#[async_trait]
impl DatabaseProvider for MockDatabase {
    async fn provision(&mut self, _req: &Request) -> Result<()> {
        let spec = self.spec.clone();
        self.shared
            .write(format!("provision db {}", spec.name), move |c| {
                c.modify_database(&spec)
            })
            .await?;
        self.load().await
    }
}

pub struct MockContainer {
    shared: Arc<Shared>,
    spec: ContainerSpec,
    record: Option<ContainerRecord>,
}

impl MockContainer {
    pub(crate) fn new(shared: Arc<Shared>, spec: ContainerSpec) -> Self {
        Self {
            shared,
            spec,
            record: None,
        }
    }
}

#[async_trait]
impl ProviderResource for MockContainer {
    fn id(&self) -> &str {
        self.record.as_ref().map(|r| r.id.as_str()).unwrap_or("")
    }

    async fn load(&mut self) -> Result<()> {
        let name = &self.spec.name;
        self.record = self.shared.read(|c| c.containers.get(name).cloned()).await;
        Ok(())
    }

    async fn create(&mut self, _req: &Request) -> Result<()> {
        let spec = self.spec.clone();
        self.shared
            .write(format!("create container {}", spec.name), move |c| {
                c.create_container(&spec)
            })
            .await?;
        self.load().await
    }

    async fn destroy(&mut self, _req: &Request) -> Result<()> {
        let name = self.spec.name.clone();
        self.shared
            .write(format!("destroy container {}", name), move |c| {
                c.delete_container(&name)
            })
            .await?;
        self.record = None;
        Ok(())
    }

    fn info(&self) -> Vec<(String, String)> {
        vec![
            ("id".to_string(), self.id().to_string()),
            (
                "revision".to_string(),
                self.record
                    .as_ref()
                    .map(|r| r.revision.to_string())
                    .unwrap_or_default(),
            ),
        ]
    }
}

#[async_trait]
impl ContainerProvider for MockContainer {
    async fn provision(&mut self, _req: &Request) -> Result<()> {
        let name = self.spec.name.clone();
        self.shared
            .write(format!("provision container {}", name), move |c| {
                c.update_container(&name)
            })
            .await?;
        self.load().await
    }
}
