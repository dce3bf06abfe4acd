//! A single server of a pod and everything attached to it
//!
//! The instance owns its volumes, its elastic IP and its role, keeps its own
//! DNS A records current and drives the remote setup scripts. Create lives in
//! `create`, provisioning and the power verbs in `provision`.

mod create;
mod provision;
pub mod users;
pub mod volume;

use crate::dns::DnsLink;
use crate::dns::record::{InstanceStatus, InstanceView, SharedRecord};
use crate::error::{CoreError, Result};
use crate::factory::InstanceHooks;
use crate::help;
use crate::leaf;
use crate::lifecycle::{Lifecycle, Verb, drive};
use crate::msg;
use crate::resource::{Resource, Resources};
use crate::runtime::Runtime;
use crate::ssh::Batch;
use arc_cloud::{
    Command, DatacenterFactory, ElasticIpSpec, InstanceProvider, InstanceSpec, ProviderResource,
    Request, Response, RoleSpec, SubnetSpec, VolumeSpec,
};
use arc_config::{Access, Config, PodConfig, VolumeConfig};
use async_trait::async_trait;
use std::cell::{OnceCell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;
use volume::{ElasticIp, Role, Volume};

/// What a pod hands to each of its instances
pub struct Placement {
    pub rt: Rc<Runtime>,
    pub factory: Arc<dyn DatacenterFactory>,
    pub config: Rc<Config>,
    pub pod: Rc<PodConfig>,
    /// Provider side keypair name
    pub keypair: String,
    /// Subnets of the pod's subnet group, one per zone
    pub subnets: Vec<SubnetSpec>,
    pub access: Access,
    /// Security tags of the datacenter overlaid with the cluster's
    pub tags: BTreeMap<String, String>,
    /// Filled once the DNS subtree exists
    pub dns: Rc<OnceCell<DnsLink>>,
    pub hooks: Rc<dyn InstanceHooks>,
}

fn volume_spec(instance: &str, config: &VolumeConfig) -> VolumeSpec {
    VolumeSpec {
        instance: instance.to_string(),
        device: config.device.clone(),
        size: config.size,
        kind: config.kind.clone(),
        boot: config.boot,
    }
}

pub struct Instance {
    rt: Rc<Runtime>,
    name: String,
    spec: InstanceSpec,
    config: Rc<Config>,
    pod: Rc<PodConfig>,
    access: Access,
    tags: BTreeMap<String, String>,
    provider: Box<dyn InstanceProvider>,
    volumes: Resources<Volume>,
    eip: Option<ElasticIp>,
    role: Option<Role>,
    dns: Rc<OnceCell<DnsLink>>,
    private_record: Option<SharedRecord>,
    public_record: Option<SharedRecord>,
    view: InstanceView,
    hooks: Rc<dyn InstanceHooks>,
}

impl Instance {
    /// Instance `index` (from zero) of the pod, placed round-robin over the
    /// zones of its subnet group
    pub fn build(placement: &Placement, index: usize) -> Result<Self> {
        let pod = &placement.pod;
        let name = format!("{}-{:02}", pod.name, index + 1);
        if placement.subnets.is_empty() {
            return Err(CoreError::Config(format!(
                "pod {}: subnet group '{}' has no subnets",
                pod.name, pod.subnet_group
            )));
        }
        let subnet = &placement.subnets[index % placement.subnets.len()];

        let spec = InstanceSpec {
            name: name.clone(),
            datacenter: placement.config.name.clone(),
            subnet: subnet.name.clone(),
            availability_zone: subnet.availability_zone.clone(),
            keypair: placement.keypair.clone(),
            security_groups: pod.security_groups.clone(),
            image_family: pod.image_family.clone(),
            instance_type: pod.instance_type.clone(),
            boot_volume: pod.boot_volume().map(|v| volume_spec(&name, v)),
        };
        let factory = placement.factory.as_ref();
        let provider = factory.instance(&spec)?;

        let mut volumes = Resources::new();
        for config in &pod.volumes {
            let volume = volume_spec(&name, config);
            volumes.push(Volume::new(
                placement.rt.clone(),
                config.clone(),
                &volume,
                factory.volume(&volume)?,
            ));
        }

        let eip = if placement.access.is_elastic() {
            let provider = factory.elastic_ip(&ElasticIpSpec {
                instance: name.clone(),
            })?;
            Some(ElasticIp::new(placement.rt.clone(), &name, provider))
        } else {
            None
        };

        let role = match &pod.role {
            Some(role) => {
                let provider = factory.role(&RoleSpec { name: role.clone() })?;
                Some(Role::new(placement.rt.clone(), role, provider))
            }
            None => None,
        };

        let view = Rc::new(RefCell::new(InstanceStatus {
            name: name.clone(),
            created: false,
            private_host: format!("{}-internal", name),
            public_host: placement.access.is_public().then(|| name.clone()),
        }));

        Ok(Self {
            rt: placement.rt.clone(),
            name,
            spec,
            config: placement.config.clone(),
            pod: pod.clone(),
            access: placement.access,
            tags: placement.tags.clone(),
            provider,
            volumes,
            eip,
            role,
            dns: placement.dns.clone(),
            private_record: None,
            public_record: None,
            view,
            hooks: placement.hooks.clone(),
        })
    }

    pub fn pod(&self) -> &PodConfig {
        &self.pod
    }

    pub fn spec(&self) -> &InstanceSpec {
        &self.spec
    }

    pub fn provider(&self) -> &dyn InstanceProvider {
        self.provider.as_ref()
    }

    pub fn volumes(&self) -> &Resources<Volume> {
        &self.volumes
    }

    pub fn elastic_ip(&self) -> Option<&ElasticIp> {
        self.eip.as_ref()
    }

    /// Shared status CNAME records select from
    pub fn view(&self) -> InstanceView {
        self.view.clone()
    }

    pub fn private_ip(&self) -> Option<String> {
        self.provider.private_ip().map(str::to_string)
    }

    /// The elastic IP when attached, else the provider's public address
    pub fn public_ip(&self) -> Option<String> {
        match &self.eip {
            Some(eip) if eip.attached() => eip.ip().map(str::to_string),
            _ => self.provider.public_ip().map(str::to_string),
        }
    }

    pub fn ssh_host(&self) -> Option<String> {
        self.public_ip().or_else(|| self.private_ip())
    }

    /// `<host>.<zone>`, or the bare host without DNS
    pub fn fqdn(&self, access: Access) -> String {
        let view = self.view.borrow();
        let host = view.host(access);
        match self.dns.get() {
            Some(link) => format!("{}.{}", host, link.zone),
            None => host.to_string(),
        }
    }

    pub fn batch(&self) -> Batch {
        Batch::new(&self.rt.env)
    }

    /// Run `batch` over SSH as the operator
    pub async fn run_batch(&self, batch: &Batch) -> Result<()> {
        let host = self
            .ssh_host()
            .ok_or_else(|| CoreError::Internal(format!("instance {} has no address", self.name)))?;
        batch
            .run(self.rt.transport.as_ref(), &host, &self.rt.env.user)
            .await?;
        Ok(())
    }

    fn update_view(&self) {
        self.view.borrow_mut().created = self.provider.created();
    }

    /// Poll the provider until `done` holds
    async fn wait_for(&mut self, what: &str, done: fn(&dyn InstanceProvider) -> bool) -> Result<()> {
        let timing = self.rt.timing;
        let since = tokio::time::Instant::now();
        loop {
            self.provider.load().await?;
            if done(self.provider.as_ref()) {
                return Ok(());
            }
            if since.elapsed() >= timing.timeout {
                return Err(CoreError::Timeout {
                    what: format!("{} to be {}", self.name, what),
                    seconds: timing.timeout.as_secs(),
                });
            }
            tracing::debug!(instance = %self.name, state = %self.provider.state(), "waiting");
            tokio::time::sleep(timing.interval).await;
        }
    }

    /// Find or register this instance's A records in the zone
    fn link_records(&mut self) -> Result<()> {
        if self.private_record.is_some() {
            return Ok(());
        }
        let Some(link) = self.dns.get() else {
            return Ok(());
        };
        let (private_host, public_host) = {
            let view = self.view.borrow();
            (view.private_host.clone(), view.public_host.clone())
        };
        let register = |host: &str| -> Result<SharedRecord> {
            if let Some(existing) = link.records.find(host) {
                return Ok(existing);
            }
            let record = SharedRecord::new(link.record(self.rt.clone(), host)?);
            link.records.append_dynamic(record.clone());
            Ok(record)
        };
        let private = register(&private_host)?;
        let public = match public_host {
            Some(host) => Some(register(&host)?),
            None => None,
        };
        self.private_record = Some(private);
        self.public_record = public;
        Ok(())
    }

    /// Each A record with the address it should hold
    fn addresses(&self) -> Vec<(SharedRecord, Option<String>)> {
        let mut out = Vec::new();
        if let Some(record) = &self.private_record {
            out.push((record.clone(), self.private_ip()));
        }
        if let Some(record) = &self.public_record {
            out.push((record.clone(), self.public_ip()));
        }
        out
    }

    /// Rewrite records that point at an old address
    async fn reconcile_records(&self, req: &Request) -> Response {
        if !self.provider.created() {
            return Response::Ok;
        }
        for (record, address) in self.addresses() {
            if let Some(address) = address {
                let response = record.reconcile(&address, req).await;
                if !response.is_ok() {
                    return response;
                }
            }
        }
        Response::Ok
    }

    async fn load(&mut self, req: &Request) -> Response {
        if let Err(e) = self.provider.load().await {
            return leaf::fail(format!("Instance {}: load failed: {}", self.name, e));
        }
        self.update_view();

        let response = self.volumes.route_in_order(req).await;
        if !response.is_ok() {
            return response;
        }
        if let Some(eip) = &mut self.eip {
            let response = eip.route(&mut req.clone()).await;
            if !response.is_ok() {
                return response;
            }
        }
        if let Some(role) = &mut self.role {
            let response = role.route(&mut req.clone()).await;
            if !response.is_ok() {
                return response;
            }
        }

        if let Err(e) = self.link_records() {
            return leaf::fail(format!("Instance {}: {}", self.name, e));
        }
        for (record, _) in self.addresses() {
            let response = record.route(req).await;
            if !response.is_ok() {
                return response;
            }
        }
        self.reconcile_records(req).await
    }

    fn info(&self) -> Response {
        let response = leaf::info("Instance", &self.name, self.provider.as_ref());
        if self.provider.destroyed() {
            return response;
        }
        msg::detail(format!("state: {}", self.provider.state()));
        msg::detail(format!("subnet: {}", self.spec.subnet));
        if let Some(ip) = self.private_ip() {
            msg::detail(format!("private: {} ({})", ip, self.fqdn(Access::Private)));
        }
        if let Some(ip) = self.public_ip() {
            msg::detail(format!("public: {} ({})", ip, self.fqdn(self.access)));
        }
        for volume in self.volumes.iter() {
            let id = if volume.created() { volume.id() } else { "not created" };
            msg::detail(format!("volume {}: {}", volume.device(), id));
        }
        if let Some(role) = &self.role {
            msg::detail(format!("role: {}", role.name()));
        }
        response
    }

    async fn audit(&mut self, req: &Request) -> Response {
        if self.pod.audit_ignore {
            msg::detail(format!("Instance {}: audit ignored", self.name));
            return Response::Ok;
        }
        let response = leaf::audit(&self.rt, "Instance", &self.name, &mut *self.provider).await;
        if !response.is_ok() || self.provider.destroyed() {
            return response;
        }
        let response = self.volumes.route_in_order(req).await;
        if !response.is_ok() {
            return response;
        }
        match &mut self.eip {
            Some(eip) => eip.route(&mut req.clone()).await,
            None => Response::Ok,
        }
    }

    async fn route_volume(&mut self, req: &mut Request) -> Response {
        let Some(device) = req.top().map(str::to_string) else {
            help::print("Instance", help::INSTANCE);
            return Response::Ok;
        };
        let found = self.volumes.iter_mut().find(|v| {
            v.device() == device || v.device().rsplit('/').next() == Some(device.as_str())
        });
        match found {
            Some(volume) => volume.route(req.pop()).await,
            None => leaf::fail(format!("Instance {}: no volume {}", self.name, device)),
        }
    }
}

#[async_trait(?Send)]
impl Resource for Instance {
    fn name(&self) -> &str {
        &self.name
    }

    fn created(&self) -> bool {
        self.provider.created()
    }

    fn destroyed(&self) -> bool {
        self.provider.destroyed()
    }

    async fn route(&mut self, req: &mut Request) -> Response {
        let hooks = self.hooks.clone();
        match hooks.route(self, req).await {
            Response::Continue => {}
            other => return other,
        }

        if let Some(top) = req.top().map(str::to_string) {
            let name = self.name.clone();
            return match top.as_str() {
                "volume" => self.route_volume(req.pop()).await,
                "eip" => match &mut self.eip {
                    Some(eip) => eip.route(req.pop()).await,
                    None => leaf::fail(format!("Instance {}: no elastic IP", name)),
                },
                "role" => match &mut self.role {
                    Some(role) => role.route(req.pop()).await,
                    None => leaf::fail(format!("Instance {}: no role", name)),
                },
                _ => leaf::unknown("Instance", help::INSTANCE, &mut *self.provider, req).await,
            };
        }

        match req.command() {
            Command::None | Command::Help => {
                help::print("Instance", help::INSTANCE);
                Response::Ok
            }
            Command::Config => leaf::config(&self.spec),
            Command::Load => self.load(req).await,
            Command::Info => self.info(),
            Command::Audit => self.audit(req).await,
            command => match Verb::from_command(command) {
                Some(verb) => drive(self, verb, req).await,
                None => leaf::fail(format!("Unknown command: {}", command)),
            },
        }
    }
}

#[async_trait(?Send)]
impl Lifecycle for Instance {
    fn kind(&self) -> &'static str {
        "Instance"
    }

    fn runtime(&self) -> &Runtime {
        &self.rt
    }

    fn leaf(&self) -> bool {
        true
    }

    async fn pre(&mut self, verb: Verb, req: &Request) -> Response {
        let hooks = self.hooks.clone();
        hooks.pre(self, verb, req).await
    }

    async fn run(&mut self, verb: Verb, req: &Request) -> Response {
        let result = match verb {
            Verb::Create => self.create(req).await,
            Verb::Destroy => self.destroy(req).await,
            Verb::Provision => self.provision(req).await,
            Verb::Start => self.start(req).await,
            Verb::Stop => self.stop(req).await,
            Verb::Restart => self.restart(req).await,
            Verb::Replace => return self.replace(req).await,
        };
        self.update_view();
        match result {
            Ok(()) => Response::Ok,
            Err(e) => leaf::fail(format!("Instance {}: {} failed: {}", self.name, verb, e)),
        }
    }

    async fn post(&mut self, verb: Verb, req: &Request) -> Response {
        if verb == Verb::Create {
            if let Err(e) = self.post_create(req).await {
                return leaf::fail(format!("Instance {}: setup failed: {}", self.name, e));
            }
        }
        let hooks = self.hooks.clone();
        hooks.post(self, verb, req).await
    }
}
