//! Network subtree: the network itself, subnet groups and security groups

pub mod cidr;
pub mod security_group;
pub mod subnet;

use crate::aaa::{self, Scope};
use crate::error::Result;
use crate::help;
use crate::leaf;
use crate::lifecycle::{Lifecycle, Verb, drive};
use crate::msg;
use crate::resource::{Resource, Resources};
use crate::runtime::Runtime;
use arc_cloud::{
    Command, DatacenterFactory, NetworkProvider, NetworkSpec, Request, ResourceKind, Response,
    flag,
};
use arc_config::NetworkConfig;
use async_trait::async_trait;
use security_group::{SecurityGroup, SecurityGroups};
use std::rc::Rc;
use std::sync::Arc;
use subnet::{Subnet, SubnetGroup};

/// Group providers create with every network
const PROVIDER_DEFAULT_GROUP: &str = "default";

pub struct Network {
    rt: Rc<Runtime>,
    name: String,
    config: NetworkConfig,
    factory: Arc<dyn DatacenterFactory>,
    provider: Box<dyn NetworkProvider>,
    subnet_groups: Resources<SubnetGroup>,
    security_groups: SecurityGroups,
}

impl Network {
    pub fn build(
        rt: Rc<Runtime>,
        factory: Arc<dyn DatacenterFactory>,
        name: &str,
        config: &NetworkConfig,
    ) -> Result<Self> {
        let provider = factory.network(&NetworkSpec {
            name: name.to_string(),
            cidr: config.cidr.clone(),
        })?;

        let mut subnet_groups = Resources::new();
        for group in &config.subnet_groups {
            subnet_groups.push(SubnetGroup::build(
                rt.clone(),
                factory.as_ref(),
                name,
                group,
                &config.availability_zones,
            )?);
        }

        let mut groups = Resources::new();
        for group in &config.security_groups {
            groups.push(SecurityGroup::build(
                rt.clone(),
                factory.as_ref(),
                name,
                config,
                group,
            )?);
        }

        Ok(Self {
            rt,
            name: name.to_string(),
            config: config.clone(),
            factory,
            provider,
            subnet_groups,
            security_groups: SecurityGroups::new(groups),
        })
    }

    pub fn subnet_group(&self, name: &str) -> Option<&SubnetGroup> {
        self.subnet_groups.get(name)
    }

    pub fn security_groups(&self) -> &SecurityGroups {
        &self.security_groups
    }

    fn find_subnet(&mut self, name: &str) -> Option<&mut Subnet> {
        self.subnet_groups
            .iter_mut()
            .find_map(|g| g.subnets_mut().get_mut(name))
    }

    /// `subnet <group>` or `subnet <subnet>`
    async fn route_subnet(&mut self, req: &mut Request) -> Response {
        let Some(name) = req.top().map(str::to_string) else {
            help::print("Subnets", help::NETWORK);
            return Response::Ok;
        };
        if let Some(group) = self.subnet_groups.get_mut(&name) {
            return group.route(req.pop()).await;
        }
        if let Some(subnet) = self.find_subnet(&name) {
            return subnet.route(req.pop()).await;
        }
        help::print("Network", help::NETWORK);
        leaf::fail(format!("Unknown subnet: {}", name))
    }

    async fn load(&mut self, req: &Request) -> Response {
        let response = leaf::load("Network", &self.name, &mut *self.provider).await;
        if !response.is_ok() {
            return response;
        }
        let response = self.subnet_groups.route_in_order(req).await;
        if !response.is_ok() {
            return response;
        }
        self.security_groups.route_all(req).await
    }

    async fn info(&mut self, req: &Request) -> Response {
        leaf::info("Network", &self.name, &*self.provider);
        let response = self.subnet_groups.route_in_order(req).await;
        if !response.is_ok() {
            return response;
        }
        self.security_groups.route_all(req).await
    }

    async fn audit(&mut self, req: &Request) -> Response {
        let response = leaf::audit(&self.rt, "Network", &self.name, &mut *self.provider).await;
        if !response.is_ok() {
            return response;
        }
        let response = self.subnet_groups.route_in_order(req).await;
        if !response.is_ok() {
            return response;
        }
        let response = self.security_groups.route_all(req).await;
        if !response.is_ok() {
            return response;
        }

        let configured: Vec<String> = self
            .subnet_groups
            .iter()
            .flat_map(|g| g.subnets().names())
            .collect();
        if let Err(e) = self.report_extras(ResourceKind::Subnet, &configured).await {
            return leaf::fail(e);
        }
        let mut configured = self.security_groups.names();
        configured.push(PROVIDER_DEFAULT_GROUP.to_string());
        if let Err(e) = self
            .report_extras(ResourceKind::SecurityGroup, &configured)
            .await
        {
            return leaf::fail(e);
        }
        Response::Ok
    }

    /// Provider resources of `kind` nobody configured
    async fn report_extras(&self, kind: ResourceKind, configured: &[String]) -> Result<()> {
        for name in self.factory.inventory(kind).await? {
            if !configured.contains(&name) {
                self.rt.audit.push(format!("{} {}", kind, name), "not configured");
            }
        }
        Ok(())
    }
}

#[async_trait(?Send)]
impl Resource for Network {
    fn name(&self) -> &str {
        &self.name
    }

    fn created(&self) -> bool {
        self.provider.created()
            && self.subnet_groups.iter().all(|g| g.created())
            && self.security_groups.groups().iter().all(|g| g.created())
    }

    fn destroyed(&self) -> bool {
        self.provider.destroyed()
            && self.subnet_groups.destroyed()
            && self.security_groups.destroyed()
    }

    async fn route(&mut self, req: &mut Request) -> Response {
        if !aaa::check(self.rt.aaa.as_ref(), Scope::Network, &self.name, req) {
            return Response::Unauthorized;
        }

        if let Some(top) = req.top().map(str::to_string) {
            return match top.as_str() {
                "subnet" => self.route_subnet(req.pop()).await,
                "secgroup" => self.security_groups.route_one(req.pop()).await,
                _ => {
                    help::print("Network", help::NETWORK);
                    leaf::fail(format!("Unknown network command: {}", top))
                }
            };
        }

        match req.command() {
            Command::None | Command::Help => {
                help::print("Network", help::NETWORK);
                Response::Ok
            }
            Command::Config => leaf::config(&self.config),
            Command::Load => self.load(req).await,
            Command::Info => self.info(req).await,
            Command::Audit => self.audit(req).await,
            command => match Verb::from_command(command) {
                Some(verb) => drive(self, verb, req).await,
                None => leaf::fail(format!("Unknown command: {}", command)),
            },
        }
    }
}

#[async_trait(?Send)]
impl Lifecycle for Network {
    fn kind(&self) -> &'static str {
        "Network"
    }

    fn runtime(&self) -> &Runtime {
        &self.rt
    }

    async fn run(&mut self, verb: Verb, req: &Request) -> Response {
        match verb {
            Verb::Create => {
                if !self.provider.created() {
                    if req.has(flag::TEST) {
                        msg::detail("Test. Skipping...");
                    } else if let Err(e) = self.provider.create(req).await {
                        return leaf::fail(format!("Network {}: create failed: {}", self.name, e));
                    }
                }
                let response = self
                    .subnet_groups
                    .route_in_order(&req.clone_with(Command::Create))
                    .await;
                if !response.is_ok() {
                    return response;
                }
                self.security_groups.create(None, req).await
            }
            Verb::Destroy => {
                let response = self.security_groups.destroy(None, req).await;
                if !response.is_ok() {
                    return response;
                }
                let response = self
                    .subnet_groups
                    .route_reverse_order(&req.clone_with(Command::Destroy))
                    .await;
                if !response.is_ok() {
                    return response;
                }
                if self.provider.destroyed() {
                    return Response::Ok;
                }
                if req.has(flag::TEST) {
                    msg::detail("Test. Skipping...");
                    return Response::Ok;
                }
                match self.provider.destroy(req).await {
                    Ok(()) => Response::Ok,
                    Err(e) => leaf::fail(format!("Network {}: destroy failed: {}", self.name, e)),
                }
            }
            Verb::Provision => {
                self.security_groups
                    .route_all(&req.clone_with(Command::Provision))
                    .await
            }
            other => leaf::fail(format!("Network {}: {} is not supported", self.name, other)),
        }
    }
}
