//! Container service, a single provider backed leaf

use crate::error::Result;
use crate::help;
use crate::leaf;
use crate::lifecycle::{Lifecycle, Verb, drive};
use crate::resource::Resource;
use crate::runtime::Runtime;
use arc_cloud::{
    Command, ContainerFactory, ContainerProvider, ContainerSpec, ProviderResource, Request,
    Response,
};
use arc_config::ContainerServiceConfig;
use async_trait::async_trait;
use std::rc::Rc;

pub struct ContainerService {
    rt: Rc<Runtime>,
    config: ContainerServiceConfig,
    provider: Box<dyn ContainerProvider>,
}

impl ContainerService {
    pub fn build(
        rt: Rc<Runtime>,
        factory: &dyn ContainerFactory,
        datacenter: &str,
        config: &ContainerServiceConfig,
    ) -> Result<Self> {
        let provider = factory.container(&ContainerSpec {
            name: config.name.clone(),
            datacenter: datacenter.to_string(),
        })?;
        Ok(Self {
            rt,
            config: config.clone(),
            provider,
        })
    }
}

#[async_trait(?Send)]
impl Resource for ContainerService {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn created(&self) -> bool {
        self.provider.created()
    }

    fn destroyed(&self) -> bool {
        self.provider.destroyed()
    }

    async fn route(&mut self, req: &mut Request) -> Response {
        if req.top().is_some() {
            return leaf::unknown("Container", help::ATTACHMENT, &mut *self.provider, req).await;
        }
        let name = self.config.name.clone();
        match req.command() {
            Command::None | Command::Help => {
                help::print("Container service", help::ATTACHMENT);
                Response::Ok
            }
            Command::Config => leaf::config(&self.config),
            Command::Load => leaf::load("Container", &name, &mut *self.provider).await,
            Command::Info => leaf::info("Container", &name, &*self.provider),
            Command::Audit => leaf::audit(&self.rt, "Container", &name, &mut *self.provider).await,
            command => match Verb::from_command(command) {
                Some(verb) => drive(self, verb, req).await,
                None => leaf::fail(format!("Unknown command: {}", command)),
            },
        }
    }
}

#[async_trait(?Send)]
impl Lifecycle for ContainerService {
    fn kind(&self) -> &'static str {
        "ContainerService"
    }

    fn runtime(&self) -> &Runtime {
        &self.rt
    }

    fn leaf(&self) -> bool {
        true
    }

    async fn run(&mut self, verb: Verb, req: &Request) -> Response {
        let name = self.config.name.clone();
        if verb != Verb::Provision {
            return leaf::run("Container", &name, &mut *self.provider, verb, req).await;
        }
        match self.provider.provision(req).await {
            Ok(()) => Response::Ok,
            Err(e) => leaf::fail(format!("Container {}: provision failed: {}", name, e)),
        }
    }
}
