//! Network, subnet and security group handles

use crate::cloud::{GroupRecord, NetworkRecord, SubnetRecord};
use crate::shared::Shared;
use arc_cloud::{
    NetworkProvider, NetworkSpec, ProviderResource, Request, Result, RuleSpec,
    SecurityGroupProvider, SecurityGroupSpec, SubnetProvider, SubnetSpec, flag,
};
use async_trait::async_trait;
use std::sync::Arc;

pub struct MockNetwork {
    shared: Arc<Shared>,
    spec: NetworkSpec,
    record: Option<NetworkRecord>,
}

impl MockNetwork {
    pub(crate) fn new(shared: Arc<Shared>, spec: NetworkSpec) -> Self {
        Self {
            shared,
            spec,
            record: None,
        }
    }
}

#[async_trait]
impl ProviderResource for MockNetwork {
    fn id(&self) -> &str {
        self.record.as_ref().map(|r| r.id.as_str()).unwrap_or("")
    }

    async fn load(&mut self) -> Result<()> {
        let name = &self.spec.name;
        self.record = self
            .shared
            .read(|c| c.networks.get(name).cloned())
            .await;
        Ok(())
    }

    async fn create(&mut self, _req: &Request) -> Result<()> {
        let spec = self.spec.clone();
        self.shared
            .write(format!("create network {}", spec.name), move |c| {
                c.create_network(&spec)
            })
            .await?;
        self.load().await
    }

    async fn destroy(&mut self, _req: &Request) -> Result<()> {
        let name = self.spec.name.clone();
        self.shared
            .write(format!("destroy network {}", name), move |c| {
                c.delete_network(&name)
            })
            .await?;
        self.record = None;
        Ok(())
    }

    fn info(&self) -> Vec<(String, String)> {
        vec![
            ("id".to_string(), self.id().to_string()),
            ("cidr".to_string(), self.spec.cidr.clone()),
        ]
    }
}

impl NetworkProvider for MockNetwork {}

pub struct MockSubnet {
    shared: Arc<Shared>,
    spec: SubnetSpec,
    record: Option<SubnetRecord>,
}

impl MockSubnet {
    pub(crate) fn new(shared: Arc<Shared>, spec: SubnetSpec) -> Self {
        Self {
            shared,
            spec,
            record: None,
        }
    }
}

#[async_trait]
impl ProviderResource for MockSubnet {
    fn id(&self) -> &str {
        self.record.as_ref().map(|r| r.id.as_str()).unwrap_or("")
    }

    async fn load(&mut self) -> Result<()> {
        let name = &self.spec.name;
        self.record = self.shared.read(|c| c.subnets.get(name).cloned()).await;
        Ok(())
    }

    async fn create(&mut self, _req: &Request) -> Result<()> {
        let spec = self.spec.clone();
        self.shared
            .write(format!("create subnet {}", spec.name), move |c| {
                c.create_subnet(&spec)
            })
            .await?;
        self.load().await
    }

    async fn destroy(&mut self, _req: &Request) -> Result<()> {
        let name = self.spec.name.clone();
        self.shared
            .write(format!("destroy subnet {}", name), move |c| {
                c.delete_subnet(&name)
            })
            .await?;
        self.record = None;
        Ok(())
    }

    fn info(&self) -> Vec<(String, String)> {
        vec![
            ("id".to_string(), self.id().to_string()),
            ("cidr".to_string(), self.spec.cidr.clone()),
            ("zone".to_string(), self.spec.availability_zone.clone()),
        ]
    }

    async fn audit(&mut self) -> Result<Vec<String>> {
        let mut findings = Vec::new();
        if let Some(record) = &self.record
            && record.cidr != self.spec.cidr
        {
            findings.push(format!(
                "cidr is {}, configured {}",
                record.cidr, self.spec.cidr
            ));
        }
        Ok(findings)
    }
}

impl SubnetProvider for MockSubnet {}

pub struct MockSecurityGroup {
    shared: Arc<Shared>,
    spec: SecurityGroupSpec,
    record: Option<GroupRecord>,
}

impl MockSecurityGroup {
    pub(crate) fn new(shared: Arc<Shared>, spec: SecurityGroupSpec) -> Self {
        Self {
            shared,
            spec,
            record: None,
        }
    }

    fn installed(&self) -> &[RuleSpec] {
        self.record.as_ref().map(|r| r.rules.as_slice()).unwrap_or(&[])
    }
}

#[async_trait]
impl ProviderResource for MockSecurityGroup {
    fn id(&self) -> &str {
        self.record.as_ref().map(|r| r.id.as_str()).unwrap_or("")
    }

    async fn load(&mut self) -> Result<()> {
        let name = &self.spec.name;
        self.record = self
            .shared
            .read(|c| c.security_groups.get(name).cloned())
            .await;
        Ok(())
    }

    /// `norules` creates the bare group
    async fn create(&mut self, req: &Request) -> Result<()> {
        let spec = self.spec.clone();
        let with_rules = !req.has(flag::NORULES);
        let call = if with_rules {
            format!("create secgroup {}", spec.name)
        } else {
            format!("create secgroup {} norules", spec.name)
        };
        self.shared
            .write(call, move |c| c.create_group(&spec, with_rules))
            .await?;
        self.load().await
    }

    /// `rules_only` removes the rules and keeps the group
    async fn destroy(&mut self, req: &Request) -> Result<()> {
        let name = self.spec.name.clone();
        if req.has(flag::RULES_ONLY) {
            self.shared
                .write(format!("destroy secgroup {} rules_only", name), move |c| {
                    c.set_rules(&name, &[])
                })
                .await?;
            return self.load().await;
        }
        self.shared
            .write(format!("destroy secgroup {}", name), move |c| {
                c.delete_group(&name)
            })
            .await?;
        self.record = None;
        Ok(())
    }

    fn info(&self) -> Vec<(String, String)> {
        let mut lines = vec![("id".to_string(), self.id().to_string())];
        for rule in self.installed() {
            lines.push(("rule".to_string(), rule.to_string()));
        }
        lines
    }

    async fn audit(&mut self) -> Result<Vec<String>> {
        let mut findings = Vec::new();
        if self.record.is_none() {
            return Ok(findings);
        }
        let installed = self.installed();
        for rule in &self.spec.rules {
            if !installed.contains(rule) {
                findings.push(format!("missing rule: {}", rule));
            }
        }
        for rule in installed {
            if !self.spec.rules.contains(rule) {
                findings.push(format!("unconfigured rule: {}", rule));
            }
        }
        Ok(findings)
    }
}

#[async_trait]
impl SecurityGroupProvider for MockSecurityGroup {
    async fn provision(&mut self, _req: &Request) -> Result<()> {
        let name = self.spec.name.clone();
        let rules = self.spec.rules.clone();
        self.shared
            .write(format!("provision secgroup {}", name), move |c| {
                c.set_rules(&name, &rules)
            })
            .await?;
        self.load().await
    }
}
