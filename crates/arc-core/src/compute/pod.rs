//! A group of identical instances
//!
//! Every instance of a pod shares the server type, package and image; they
//! differ only in index and availability zone.

use super::instance::{Instance, Placement};
use crate::aaa::{self, Scope};
use crate::dns::record::InstanceView;
use crate::error::Result;
use crate::factory::PodHooks;
use crate::help;
use crate::leaf;
use crate::lifecycle::{Lifecycle, Verb, drive};
use crate::resource::{Resource, Resources};
use crate::runtime::Runtime;
use arc_cloud::{Command, Request, Response, flag};
use arc_config::PodConfig;
use async_trait::async_trait;
use std::rc::Rc;

pub struct Pod {
    rt: Rc<Runtime>,
    config: Rc<PodConfig>,
    hooks: Rc<dyn PodHooks>,
    instances: Resources<Instance>,
}

impl Pod {
    pub fn build(placement: &Placement, hooks: Rc<dyn PodHooks>) -> Result<Self> {
        let mut instances = Resources::new();
        for index in 0..placement.pod.count as usize {
            instances.push(Instance::build(placement, index)?);
        }
        Ok(Self {
            rt: placement.rt.clone(),
            config: placement.pod.clone(),
            hooks,
            instances,
        })
    }

    pub fn config(&self) -> &PodConfig {
        &self.config
    }

    pub fn instances(&self) -> &Resources<Instance> {
        &self.instances
    }

    pub fn views(&self) -> Vec<InstanceView> {
        self.instances.iter().map(Instance::view).collect()
    }
}

#[async_trait(?Send)]
impl Resource for Pod {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn created(&self) -> bool {
        self.instances.created()
    }

    fn destroyed(&self) -> bool {
        self.instances.destroyed()
    }

    async fn route(&mut self, req: &mut Request) -> Response {
        if !aaa::check(self.rt.aaa.as_ref(), Scope::Pod, &self.config.name, req) {
            return Response::Unauthorized;
        }
        let hooks = self.hooks.clone();
        match hooks.route(self, req).await {
            Response::Continue => {}
            other => return other,
        }

        if let Some(top) = req.top().map(str::to_string) {
            return match self.instances.get_mut(&top) {
                Some(instance) => instance.route(req.pop()).await,
                None => {
                    help::print("Pod", help::POD);
                    leaf::fail(format!("Unknown instance: {}", top))
                }
            };
        }

        match req.command() {
            Command::None | Command::Help => {
                help::print("Pod", help::POD);
                Response::Ok
            }
            Command::Config => leaf::config(&*self.config),
            Command::Load | Command::Info | Command::Audit => {
                self.instances.route_in_order(req).await
            }
            command => match Verb::from_command(command) {
                Some(verb) => drive(self, verb, req).await,
                None => leaf::fail(format!("Unknown command: {}", command)),
            },
        }
    }
}

#[async_trait(?Send)]
impl Lifecycle for Pod {
    fn kind(&self) -> &'static str {
        "Pod"
    }

    fn runtime(&self) -> &Runtime {
        &self.rt
    }

    fn scope_flag(&self) -> Option<&'static str> {
        Some(flag::PODONLY)
    }

    async fn pre(&mut self, verb: Verb, req: &Request) -> Response {
        let hooks = self.hooks.clone();
        hooks.pre(self, verb, req).await
    }

    async fn run(&mut self, verb: Verb, req: &Request) -> Response {
        let child = req.clone_with(verb.command());
        if verb.is_reverse() {
            self.instances.route_reverse_order(&child).await
        } else {
            self.instances.route_in_order(&child).await
        }
    }

    async fn post(&mut self, verb: Verb, req: &Request) -> Response {
        let hooks = self.hooks.clone();
        hooks.post(self, verb, req).await
    }
}
