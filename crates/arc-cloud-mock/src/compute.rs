//! Keypair, instance, volume, elastic IP and role handles

use crate::cloud::{EipRecord, InstanceRecord, KeyRecord, RoleRecord, VolumeRecord};
use crate::shared::Shared;
use arc_cloud::{
    ElasticIpProvider, ElasticIpSpec, HelpCommand, InstanceProvider, InstanceSpec, InstanceState,
    KeyPairProvider, KeyPairSpec, ProviderResource, Request, Result, RoleProvider, RoleSpec,
    VolumeProvider, VolumeSpec, flag,
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct MockKeyPair {
    shared: Arc<Shared>,
    spec: KeyPairSpec,
    record: Option<KeyRecord>,
}

impl MockKeyPair {
    pub(crate) fn new(shared: Arc<Shared>, spec: KeyPairSpec) -> Self {
        Self {
            shared,
            spec,
            record: None,
        }
    }
}

#[async_trait]
impl ProviderResource for MockKeyPair {
    fn id(&self) -> &str {
        self.record.as_ref().map(|r| r.id.as_str()).unwrap_or("")
    }

    async fn load(&mut self) -> Result<()> {
        let name = &self.spec.name;
        self.record = self.shared.read(|c| c.keypairs.get(name).cloned()).await;
        Ok(())
    }

    async fn create(&mut self, _req: &Request) -> Result<()> {
        let spec = self.spec.clone();
        self.shared
            .write(format!("import keypair {}", spec.name), move |c| {
                c.import_keypair(&spec)
            })
            .await?;
        self.load().await
    }

    async fn destroy(&mut self, _req: &Request) -> Result<()> {
        let name = self.spec.name.clone();
        self.shared
            .write(format!("destroy keypair {}", name), move |c| {
                c.delete_keypair(&name)
            })
            .await?;
        self.record = None;
        Ok(())
    }

    fn info(&self) -> Vec<(String, String)> {
        vec![
            ("id".to_string(), self.id().to_string()),
            ("name".to_string(), self.spec.name.clone()),
        ]
    }

    async fn audit(&mut self) -> Result<Vec<String>> {
        Ok(match &self.record {
            Some(r) if r.public_key != self.spec.public_key => {
                vec!["imported key differs from the agent key".to_string()]
            }
            _ => Vec::new(),
        })
    }
}

impl KeyPairProvider for MockKeyPair {}

pub struct MockInstance {
    shared: Arc<Shared>,
    spec: InstanceSpec,
    record: Option<InstanceRecord>,
}

impl MockInstance {
    pub(crate) fn new(shared: Arc<Shared>, spec: InstanceSpec) -> Self {
        Self {
            shared,
            spec,
            record: None,
        }
    }

    async fn set_state(&mut self, verb: &str, state: InstanceState) -> Result<()> {
        let name = self.spec.name.clone();
        self.shared
            .write(format!("{} instance {}", verb, name), move |c| {
                c.set_instance_state(&name, state)
            })
            .await?;
        self.load().await
    }
}

#[async_trait]
impl ProviderResource for MockInstance {
    fn id(&self) -> &str {
        self.record.as_ref().map(|r| r.id.as_str()).unwrap_or("")
    }

    async fn load(&mut self) -> Result<()> {
        let name = &self.spec.name;
        self.record = self.shared.read(|c| c.instances.get(name).cloned()).await;
        Ok(())
    }

    async fn create(&mut self, _req: &Request) -> Result<()> {
        let spec = self.spec.clone();
        self.shared
            .write(format!("create instance {}", spec.name), move |c| {
                c.run_instance(&spec)
            })
            .await?;
        self.load().await
    }

    async fn destroy(&mut self, _req: &Request) -> Result<()> {
        let name = self.spec.name.clone();
        self.shared
            .write(format!("terminate instance {}", name), move |c| {
                c.terminate_instance(&name)
            })
            .await?;
        self.record = None;
        Ok(())
    }

    fn info(&self) -> Vec<(String, String)> {
        let Some(r) = &self.record else {
            return vec![("id".to_string(), String::new())];
        };
        let mut lines = vec![
            ("id".to_string(), r.id.clone()),
            ("state".to_string(), r.state.to_string()),
            ("type".to_string(), r.instance_type.clone()),
            ("image".to_string(), r.image_id.clone()),
            ("key".to_string(), r.key_name.clone()),
            ("subnet".to_string(), r.subnet.clone()),
            ("private ip".to_string(), r.private_ip.clone()),
        ];
        if let Some(ip) = &r.public_ip {
            lines.push(("public ip".to_string(), ip.clone()));
        }
        if let Some(role) = &r.role {
            lines.push(("role".to_string(), role.clone()));
        }
        lines
    }

    async fn audit(&mut self) -> Result<Vec<String>> {
        let mut findings = Vec::new();
        if let Some(r) = &self.record {
            if r.instance_type != self.spec.instance_type {
                findings.push(format!(
                    "type is {}, configured {}",
                    r.instance_type, self.spec.instance_type
                ));
            }
            if r.subnet != self.spec.subnet {
                findings.push(format!(
                    "subnet is {}, configured {}",
                    r.subnet, self.spec.subnet
                ));
            }
        }
        Ok(findings)
    }

    fn can_route(&self, req: &Request) -> bool {
        req.top() == Some("console")
    }

    fn help_commands(&self) -> Vec<HelpCommand> {
        vec![HelpCommand::new("console", "Print the instance console log")]
    }

    async fn vendor_route(&mut self, _req: &Request) -> Result<()> {
        self.load().await?;
        if let Some(r) = &self.record {
            for line in &r.console {
                println!("{}", line);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl InstanceProvider for MockInstance {
    fn state(&self) -> InstanceState {
        self.record
            .as_ref()
            .map(|r| r.state)
            .unwrap_or(InstanceState::Unknown)
    }

    fn private_ip(&self) -> Option<&str> {
        self.record.as_ref().map(|r| r.private_ip.as_str())
    }

    fn public_ip(&self) -> Option<&str> {
        self.record.as_ref().and_then(|r| r.public_ip.as_deref())
    }

    async fn start(&mut self, _req: &Request) -> Result<()> {
        self.set_state("start", InstanceState::Running).await
    }

    async fn stop(&mut self, _req: &Request) -> Result<()> {
        self.set_state("stop", InstanceState::Stopped).await
    }

    async fn restart(&mut self, req: &Request) -> Result<()> {
        let verb = if req.has(flag::HARD) {
            "hard restart"
        } else {
            "restart"
        };
        self.set_state(verb, InstanceState::Running).await
    }

    async fn set_tags(&mut self, tags: &BTreeMap<String, String>) -> Result<()> {
        let name = self.spec.name.clone();
        let tags = tags.clone();
        self.shared
            .write(format!("tag instance {}", name), move |c| {
                c.tag_instance(&name, &tags)
            })
            .await?;
        self.load().await
    }

    fn tags(&self) -> BTreeMap<String, String> {
        self.record
            .as_ref()
            .map(|r| r.tags.clone())
            .unwrap_or_default()
    }

    async fn attach_role(&mut self, role: &str) -> Result<()> {
        let name = self.spec.name.clone();
        let role = role.to_string();
        self.shared
            .write(format!("attach role {} {}", role, name), move |c| {
                c.attach_role(&name, &role)
            })
            .await?;
        self.load().await
    }
}

pub struct MockVolume {
    shared: Arc<Shared>,
    spec: VolumeSpec,
    key: String,
    record: Option<VolumeRecord>,
}

impl MockVolume {
    pub(crate) fn new(shared: Arc<Shared>, spec: VolumeSpec) -> Self {
        let key = spec.name();
        Self {
            shared,
            spec,
            key,
            record: None,
        }
    }
}

#[async_trait]
impl ProviderResource for MockVolume {
    fn id(&self) -> &str {
        self.record.as_ref().map(|r| r.id.as_str()).unwrap_or("")
    }

    async fn load(&mut self) -> Result<()> {
        let key = &self.key;
        self.record = self.shared.read(|c| c.volumes.get(key).cloned()).await;
        Ok(())
    }

    async fn create(&mut self, _req: &Request) -> Result<()> {
        let spec = self.spec.clone();
        self.shared
            .write(format!("create volume {}", self.key), move |c| {
                c.create_volume(&spec)
            })
            .await?;
        self.load().await
    }

    async fn destroy(&mut self, _req: &Request) -> Result<()> {
        let key = self.key.clone();
        self.shared
            .write(format!("destroy volume {}", key), move |c| {
                c.delete_volume(&key)
            })
            .await?;
        self.record = None;
        Ok(())
    }

    fn info(&self) -> Vec<(String, String)> {
        let mut lines = vec![
            ("id".to_string(), self.id().to_string()),
            ("device".to_string(), self.spec.device.clone()),
            ("size".to_string(), format!("{} GiB", self.spec.size)),
            ("type".to_string(), self.spec.kind.clone()),
        ];
        if let Some(instance) = self.record.as_ref().and_then(|r| r.attached_to.as_ref()) {
            lines.push(("attached to".to_string(), instance.clone()));
        }
        lines
    }

    async fn audit(&mut self) -> Result<Vec<String>> {
        let mut findings = Vec::new();
        if let Some(r) = &self.record {
            if r.size != self.spec.size {
                findings.push(format!(
                    "size is {} GiB, configured {} GiB",
                    r.size, self.spec.size
                ));
            }
            if r.attached_to.is_none() {
                findings.push("not attached".to_string());
            }
        }
        Ok(findings)
    }
}

#[async_trait]
impl VolumeProvider for MockVolume {
    async fn attach(&mut self, instance_id: &str) -> Result<()> {
        let key = self.key.clone();
        let instance_id = instance_id.to_string();
        self.shared
            .write(format!("attach volume {}", key), move |c| {
                c.attach_volume(&key, &instance_id)
            })
            .await?;
        self.load().await
    }

    async fn detach(&mut self) -> Result<()> {
        let key = self.key.clone();
        self.shared
            .write(format!("detach volume {}", key), move |c| {
                c.detach_volume(&key)
            })
            .await?;
        self.load().await
    }

    fn reset(&mut self) {
        self.record = None;
    }

    fn attached(&self) -> bool {
        self.record
            .as_ref()
            .map(|r| r.attached_to.is_some())
            .unwrap_or(false)
    }

    async fn set_tags(&mut self, tags: &BTreeMap<String, String>) -> Result<()> {
        let key = self.key.clone();
        let tags = tags.clone();
        self.shared
            .write(format!("tag volume {}", key), move |c| c.tag_volume(&key, &tags))
            .await?;
        self.load().await
    }
}

pub struct MockElasticIp {
    shared: Arc<Shared>,
    spec: ElasticIpSpec,
    record: Option<EipRecord>,
}

impl MockElasticIp {
    pub(crate) fn new(shared: Arc<Shared>, spec: ElasticIpSpec) -> Self {
        Self {
            shared,
            spec,
            record: None,
        }
    }
}

#[async_trait]
impl ProviderResource for MockElasticIp {
    fn id(&self) -> &str {
        self.record.as_ref().map(|r| r.id.as_str()).unwrap_or("")
    }

    async fn load(&mut self) -> Result<()> {
        let owner = &self.spec.instance;
        self.record = self.shared.read(|c| c.eips.get(owner).cloned()).await;
        Ok(())
    }

    async fn create(&mut self, _req: &Request) -> Result<()> {
        let owner = self.spec.instance.clone();
        self.shared
            .write(format!("allocate eip {}", owner), move |c| {
                c.allocate_eip(&owner)
            })
            .await?;
        self.load().await
    }

    async fn destroy(&mut self, _req: &Request) -> Result<()> {
        let owner = self.spec.instance.clone();
        self.shared
            .write(format!("release eip {}", owner), move |c| {
                c.release_eip(&owner)
            })
            .await?;
        self.record = None;
        Ok(())
    }

    fn info(&self) -> Vec<(String, String)> {
        vec![
            ("id".to_string(), self.id().to_string()),
            ("ip".to_string(), self.ip().unwrap_or_default().to_string()),
            ("attached".to_string(), self.attached().to_string()),
        ]
    }
}

#[async_trait]
impl ElasticIpProvider for MockElasticIp {
    fn ip(&self) -> Option<&str> {
        self.record.as_ref().map(|r| r.ip.as_str())
    }

    async fn attach(&mut self, instance_id: &str) -> Result<()> {
        let owner = self.spec.instance.clone();
        let instance_id = instance_id.to_string();
        self.shared
            .write(format!("attach eip {}", owner), move |c| {
                c.associate_eip(&owner, &instance_id)
            })
            .await?;
        self.load().await
    }

    async fn detach(&mut self) -> Result<()> {
        let owner = self.spec.instance.clone();
        self.shared
            .write(format!("detach eip {}", owner), move |c| {
                c.disassociate_eip(&owner)
            })
            .await?;
        self.load().await
    }

    fn attached(&self) -> bool {
        self.record
            .as_ref()
            .map(|r| r.attached_to.is_some())
            .unwrap_or(false)
    }
}

pub struct MockRole {
    shared: Arc<Shared>,
    spec: RoleSpec,
    record: Option<RoleRecord>,
}

impl MockRole {
    pub(crate) fn new(shared: Arc<Shared>, spec: RoleSpec) -> Self {
        Self {
            shared,
            spec,
            record: None,
        }
    }
}

#[async_trait]
impl ProviderResource for MockRole {
    fn id(&self) -> &str {
        self.record.as_ref().map(|r| r.id.as_str()).unwrap_or("")
    }

    async fn load(&mut self) -> Result<()> {
        let name = &self.spec.name;
        self.record = self.shared.read(|c| c.roles.get(name).cloned()).await;
        Ok(())
    }

    async fn create(&mut self, _req: &Request) -> Result<()> {
        let name = self.spec.name.clone();
        self.shared
            .write(format!("create role {}", name), move |c| c.create_role(&name))
            .await?;
        self.load().await
    }

    async fn destroy(&mut self, _req: &Request) -> Result<()> {
        let name = self.spec.name.clone();
        self.shared
            .write(format!("destroy role {}", name), move |c| c.delete_role(&name))
            .await?;
        self.record = None;
        Ok(())
    }
}

impl RoleProvider for MockRole {}
