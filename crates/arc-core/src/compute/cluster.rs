//! A named set of pods sharing security tags

use super::pod::Pod;
use crate::aaa::{self, Scope};
use crate::factory::ClusterHooks;
use crate::help;
use crate::leaf;
use crate::lifecycle::{Lifecycle, Verb, drive};
use crate::resource::{Resource, Resources};
use crate::runtime::Runtime;
use arc_cloud::{Command, Request, Response, flag};
use arc_config::ClusterConfig;
use async_trait::async_trait;
use std::rc::Rc;

pub struct Cluster {
    rt: Rc<Runtime>,
    config: ClusterConfig,
    hooks: Rc<dyn ClusterHooks>,
    pods: Resources<Pod>,
}

impl Cluster {
    pub fn new(
        rt: Rc<Runtime>,
        config: ClusterConfig,
        hooks: Rc<dyn ClusterHooks>,
        pods: Resources<Pod>,
    ) -> Self {
        Self {
            rt,
            config,
            hooks,
            pods,
        }
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    pub fn pods(&self) -> &Resources<Pod> {
        &self.pods
    }

    pub fn has_pod(&self, name: &str) -> bool {
        self.pods.get(name).is_some()
    }

    /// Name of the pod holding instance `name`
    pub fn pod_of(&self, instance: &str) -> Option<String> {
        self.pods
            .iter()
            .find(|p| p.instances().get(instance).is_some())
            .map(|p| p.name().to_string())
    }
}

#[async_trait(?Send)]
impl Resource for Cluster {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn created(&self) -> bool {
        self.pods.created()
    }

    fn destroyed(&self) -> bool {
        self.pods.destroyed()
    }

    async fn route(&mut self, req: &mut Request) -> Response {
        if !aaa::check(self.rt.aaa.as_ref(), Scope::Cluster, &self.config.name, req) {
            return Response::Unauthorized;
        }
        let hooks = self.hooks.clone();
        match hooks.route(self, req).await {
            Response::Continue => {}
            other => return other,
        }

        if let Some(top) = req.top().map(str::to_string) {
            return match self.pods.get_mut(&top) {
                Some(pod) => pod.route(req.pop()).await,
                None => {
                    help::print("Cluster", help::CLUSTER);
                    leaf::fail(format!("Unknown pod: {}", top))
                }
            };
        }

        match req.command() {
            Command::None | Command::Help => {
                help::print("Cluster", help::CLUSTER);
                Response::Ok
            }
            Command::Config => leaf::config(&self.config),
            Command::Load | Command::Info => self.pods.route_in_order(req).await,
            Command::Audit => {
                if self.config.audit_ignore {
                    return Response::Ok;
                }
                self.pods.route_in_order(req).await
            }
            command => match Verb::from_command(command) {
                Some(verb) => drive(self, verb, req).await,
                None => leaf::fail(format!("Unknown command: {}", command)),
            },
        }
    }
}

#[async_trait(?Send)]
impl Lifecycle for Cluster {
    fn kind(&self) -> &'static str {
        "Cluster"
    }

    fn runtime(&self) -> &Runtime {
        &self.rt
    }

    fn scope_flag(&self) -> Option<&'static str> {
        Some(flag::CLUSTERONLY)
    }

    async fn pre(&mut self, verb: Verb, req: &Request) -> Response {
        let hooks = self.hooks.clone();
        hooks.pre(self, verb, req).await
    }

    async fn run(&mut self, verb: Verb, req: &Request) -> Response {
        let child = req.clone_with(verb.command());
        if verb.is_reverse() {
            self.pods.route_reverse_order(&child).await
        } else {
            self.pods.route_in_order(&child).await
        }
    }

    async fn post(&mut self, verb: Verb, req: &Request) -> Response {
        let hooks = self.hooks.clone();
        hooks.post(self, verb, req).await
    }
}
