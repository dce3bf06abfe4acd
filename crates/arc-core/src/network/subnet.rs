use super::cidr;
use crate::error::Result;
use crate::help;
use crate::leaf;
use crate::lifecycle::{Lifecycle, Verb, drive};
use crate::resource::{Resource, Resources};
use crate::runtime::Runtime;
use arc_cloud::{Command, DatacenterFactory, Request, Response, SubnetProvider, SubnetSpec};
use arc_config::{Access, SubnetGroupConfig};
use async_trait::async_trait;
use std::rc::Rc;

/// One subnet per availability zone
pub struct SubnetGroup {
    rt: Rc<Runtime>,
    config: SubnetGroupConfig,
    subnets: Resources<Subnet>,
}

impl SubnetGroup {
    /// The first zone gets the base block, each further zone the successor
    /// of the previous one
    pub fn build(
        rt: Rc<Runtime>,
        factory: &dyn DatacenterFactory,
        network: &str,
        config: &SubnetGroupConfig,
        zones: &[String],
    ) -> Result<Self> {
        let blocks = cidr::distribute(&config.cidr, zones.len())?;
        let mut subnets = Resources::new();
        for (zone, block) in zones.iter().zip(blocks) {
            let spec = SubnetSpec {
                name: format!("{}-{}", config.name, zone),
                group: config.name.clone(),
                network: network.to_string(),
                cidr: block.to_string(),
                availability_zone: zone.clone(),
                public: config.access.is_public(),
                manage_routes: config.manage_routes,
            };
            let provider = factory.subnet(&spec)?;
            subnets.push(Subnet {
                rt: rt.clone(),
                access: config.access,
                spec,
                provider,
            });
        }
        Ok(Self {
            rt,
            config: config.clone(),
            subnets,
        })
    }

    pub fn subnets(&self) -> &Resources<Subnet> {
        &self.subnets
    }

    pub fn subnets_mut(&mut self) -> &mut Resources<Subnet> {
        &mut self.subnets
    }

    pub fn access(&self) -> Access {
        self.config.access
    }
}

#[async_trait(?Send)]
impl Resource for SubnetGroup {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn created(&self) -> bool {
        self.subnets.created()
    }

    fn destroyed(&self) -> bool {
        self.subnets.destroyed()
    }

    async fn route(&mut self, req: &mut Request) -> Response {
        if let Some(top) = req.top().map(str::to_string) {
            return match self.subnets.get_mut(&top) {
                Some(subnet) => subnet.route(req.pop()).await,
                None => {
                    help::print("Subnet group", help::ATTACHMENT);
                    leaf::fail(format!("Unknown subnet: {}", top))
                }
            };
        }
        match req.command() {
            Command::None | Command::Help => {
                help::print("Subnet group", help::ATTACHMENT);
                Response::Ok
            }
            Command::Config => leaf::config(&self.config),
            Command::Load | Command::Info | Command::Audit => {
                self.subnets.route_in_order(req).await
            }
            command => match Verb::from_command(command) {
                Some(verb) => drive(self, verb, req).await,
                None => leaf::fail(format!("Unknown command: {}", command)),
            },
        }
    }
}

#[async_trait(?Send)]
impl Lifecycle for SubnetGroup {
    fn kind(&self) -> &'static str {
        "SubnetGroup"
    }

    fn runtime(&self) -> &Runtime {
        &self.rt
    }

    async fn run(&mut self, verb: Verb, req: &Request) -> Response {
        let child = req.clone_with(verb.command());
        if verb.is_reverse() {
            self.subnets.route_reverse_order(&child).await
        } else {
            self.subnets.route_in_order(&child).await
        }
    }
}

pub struct Subnet {
    rt: Rc<Runtime>,
    access: Access,
    spec: SubnetSpec,
    provider: Box<dyn SubnetProvider>,
}

impl Subnet {
    pub fn spec(&self) -> &SubnetSpec {
        &self.spec
    }

    pub fn access(&self) -> Access {
        self.access
    }
}

#[async_trait(?Send)]
impl Resource for Subnet {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn created(&self) -> bool {
        self.provider.created()
    }

    fn destroyed(&self) -> bool {
        self.provider.destroyed()
    }

    async fn route(&mut self, req: &mut Request) -> Response {
        if req.top().is_some() {
            return leaf::unknown("Subnet", help::ATTACHMENT, &mut *self.provider, req).await;
        }
        match req.command() {
            Command::None | Command::Help => {
                help::print("Subnet", help::ATTACHMENT);
                Response::Ok
            }
            Command::Config => leaf::config(&self.spec),
            Command::Load => leaf::load("Subnet", &self.spec.name, &mut *self.provider).await,
            Command::Info => leaf::info("Subnet", &self.spec.name, &*self.provider),
            Command::Audit => {
                leaf::audit(&self.rt, "Subnet", &self.spec.name, &mut *self.provider).await
            }
            command => match Verb::from_command(command) {
                Some(verb) => drive(self, verb, req).await,
                None => leaf::fail(format!("Unknown command: {}", command)),
            },
        }
    }
}

#[async_trait(?Send)]
impl Lifecycle for Subnet {
    fn kind(&self) -> &'static str {
        "Subnet"
    }

    fn runtime(&self) -> &Runtime {
        &self.rt
    }

    fn leaf(&self) -> bool {
        true
    }

    async fn run(&mut self, verb: Verb, req: &Request) -> Response {
        leaf::run("Subnet", &self.spec.name, &mut *self.provider, verb, req).await
    }
}
