//! The datacenter: one network and the compute inside it

use crate::compute::Compute;
use crate::dns::DnsLink;
use crate::dns::record::Directory;
use crate::error::{CoreError, Result};
use crate::factory::Factories;
use crate::help;
use crate::leaf;
use crate::lifecycle::{Lifecycle, Verb, drive};
use crate::network::Network;
use crate::resource::Resource;
use crate::runtime::Runtime;
use arc_cloud::{Command, Provider, Registry, Request, Response};
use arc_config::Config;
use async_trait::async_trait;
use std::cell::OnceCell;
use std::rc::Rc;
use std::sync::Arc;

pub struct Datacenter {
    rt: Rc<Runtime>,
    name: String,
    config: Rc<Config>,
    network: Network,
    compute: Compute,
}

/// Vendor registered under `vendor`; unknown tags are configuration errors
pub(crate) fn lookup(registry: &Registry, vendor: &str) -> Result<Arc<dyn Provider>> {
    registry
        .get(vendor)
        .map_err(|_| CoreError::Config(format!("unknown provider '{}'", vendor)))
}

impl Datacenter {
    pub async fn build(
        rt: Rc<Runtime>,
        config: Rc<Config>,
        registry: &Registry,
        factories: &Factories,
        dns: Rc<OnceCell<DnsLink>>,
    ) -> Result<Self> {
        let dc = &config.datacenter;
        let provider = lookup(registry, &dc.provider.vendor)?;
        let factory = provider.datacenter(&config.name, &dc.provider.data)?;
        tracing::debug!(
            datacenter = %config.name,
            vendor = %dc.provider.vendor,
            "building datacenter"
        );

        let network = Network::build(rt.clone(), factory.clone(), &config.name, &dc.network)?;
        let compute =
            Compute::build(rt.clone(), factory, config.clone(), &network, factories, dns).await?;

        Ok(Self {
            rt,
            name: config.name.clone(),
            config,
            network,
            compute,
        })
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn compute(&self) -> &Compute {
        &self.compute
    }

    pub fn directory(&self) -> Directory {
        self.compute.directory()
    }

    /// Network and compute namespaces the root forwards here
    pub fn routes(token: &str) -> bool {
        matches!(
            token,
            "network"
                | "subnet"
                | "secgroup"
                | "compute"
                | "keypair"
                | "cluster"
                | "pod"
                | "instance"
        )
    }
}

#[async_trait(?Send)]
impl Resource for Datacenter {
    fn name(&self) -> &str {
        &self.name
    }

    fn created(&self) -> bool {
        self.network.created() && self.compute.created()
    }

    fn destroyed(&self) -> bool {
        self.network.destroyed() && self.compute.destroyed()
    }

    async fn route(&mut self, req: &mut Request) -> Response {
        if let Some(top) = req.top().map(str::to_string) {
            return match top.as_str() {
                "network" => self.network.route(req.pop()).await,
                "subnet" | "secgroup" => self.network.route(req).await,
                "compute" => self.compute.route(req.pop()).await,
                "keypair" | "cluster" | "pod" | "instance" => self.compute.route(req).await,
                _ => leaf::fail(CoreError::Internal(format!(
                    "datacenter {} cannot route '{}'",
                    self.name, top
                ))),
            };
        }
        match req.command() {
            Command::None | Command::Help => {
                help::print("Datacenter", help::ROOT);
                Response::Ok
            }
            Command::Config => leaf::config(&self.config.datacenter),
            Command::Load | Command::Info | Command::Audit => {
                let response = self.network.route(&mut req.clone()).await;
                if !response.is_ok() {
                    return response;
                }
                self.compute.route(&mut req.clone()).await
            }
            command => match Verb::from_command(command) {
                Some(verb) => drive(self, verb, req).await,
                None => leaf::fail(format!("Unknown command: {}", command)),
            },
        }
    }
}

#[async_trait(?Send)]
impl Lifecycle for Datacenter {
    fn kind(&self) -> &'static str {
        "Datacenter"
    }

    fn runtime(&self) -> &Runtime {
        &self.rt
    }

    async fn run(&mut self, verb: Verb, req: &Request) -> Response {
        let mut child = req.clone_with(verb.command());
        match verb {
            Verb::Create | Verb::Provision => {
                let response = self.network.route(&mut child.clone()).await;
                if !response.is_ok() {
                    return response;
                }
                self.compute.route(&mut child).await
            }
            Verb::Destroy => {
                let response = self.compute.route(&mut child.clone()).await;
                if !response.is_ok() {
                    return response;
                }
                self.network.route(&mut child).await
            }
            _ => self.compute.route(&mut child).await,
        }
    }
}
