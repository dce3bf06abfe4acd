//! Volumes, the elastic IP and the role of an instance
//!
//! Their verbs are driven by the owning instance; addressed directly they
//! only answer read-only commands.

use crate::help;
use crate::leaf;
use crate::resource::Resource;
use crate::runtime::Runtime;
use arc_cloud::{
    Command, ElasticIpProvider, ProviderResource, Request, Response, RoleProvider, VolumeProvider,
    VolumeSpec,
};
use arc_config::VolumeConfig;
use async_trait::async_trait;
use serde::Serialize;
use std::rc::Rc;

async fn route_attachment<P, C>(
    rt: &Runtime,
    kind: &str,
    name: &str,
    config: &C,
    provider: &mut P,
    req: &mut Request,
) -> Response
where
    P: ProviderResource + ?Sized,
    C: Serialize + ?Sized,
{
    if req.top().is_some() {
        return leaf::unknown(kind, help::ATTACHMENT, provider, req).await;
    }
    match req.command() {
        Command::None | Command::Help => {
            help::print(kind, help::ATTACHMENT);
            Response::Ok
        }
        Command::Config => leaf::config(config),
        Command::Load => leaf::load(kind, name, provider).await,
        Command::Info => leaf::info(kind, name, provider),
        Command::Audit => leaf::audit(rt, kind, name, provider).await,
        command => leaf::fail(format!(
            "{} {}: {} runs through the instance",
            kind, name, command
        )),
    }
}

pub struct Volume {
    rt: Rc<Runtime>,
    name: String,
    config: VolumeConfig,
    pub(super) provider: Box<dyn VolumeProvider>,
}

impl Volume {
    pub fn new(
        rt: Rc<Runtime>,
        config: VolumeConfig,
        spec: &VolumeSpec,
        provider: Box<dyn VolumeProvider>,
    ) -> Self {
        Self {
            rt,
            name: spec.name(),
            config,
            provider,
        }
    }

    pub fn config(&self) -> &VolumeConfig {
        &self.config
    }

    pub fn device(&self) -> &str {
        &self.config.device
    }

    pub fn id(&self) -> &str {
        self.provider.id()
    }

    pub fn is_boot(&self) -> bool {
        self.config.boot
    }

    pub fn preserved(&self) -> bool {
        self.config.preserve
    }

    pub fn attached(&self) -> bool {
        self.provider.attached()
    }

    /// Arguments of the volume setup script
    pub fn setup_args(&self, skip_format: bool) -> Vec<String> {
        let mut args = vec![
            self.config.device.clone(),
            self.config.mount_point.clone(),
            self.config.fs.clone(),
            self.config.inodes.to_string(),
        ];
        if skip_format {
            args.push("skip_format".to_string());
        }
        args
    }
}

#[async_trait(?Send)]
impl Resource for Volume {
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
        route_attachment(
            &self.rt,
            "Volume",
            &self.name,
            &self.config,
            &mut *self.provider,
            req,
        )
        .await
    }
}

pub struct ElasticIp {
    rt: Rc<Runtime>,
    name: String,
    pub(super) provider: Box<dyn ElasticIpProvider>,
}

impl ElasticIp {
    pub fn new(rt: Rc<Runtime>, instance: &str, provider: Box<dyn ElasticIpProvider>) -> Self {
        Self {
            rt,
            name: format!("{}-eip", instance),
            provider,
        }
    }

    pub fn ip(&self) -> Option<&str> {
        self.provider.ip()
    }

    pub fn attached(&self) -> bool {
        self.provider.attached()
    }
}

#[async_trait(?Send)]
impl Resource for ElasticIp {
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
        let ip = self.provider.ip().map(str::to_string);
        route_attachment(&self.rt, "ElasticIp", &self.name, &ip, &mut *self.provider, req).await
    }
}

pub struct Role {
    rt: Rc<Runtime>,
    name: String,
    pub(super) provider: Box<dyn RoleProvider>,
}

impl Role {
    pub fn new(rt: Rc<Runtime>, name: &str, provider: Box<dyn RoleProvider>) -> Self {
        Self {
            rt,
            name: name.to_string(),
            provider,
        }
    }
}

#[async_trait(?Send)]
impl Resource for Role {
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
        let name = self.name.clone();
        route_attachment(&self.rt, "Role", &name, &name, &mut *self.provider, req).await
    }
}
