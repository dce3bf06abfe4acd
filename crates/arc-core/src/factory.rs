//! Name-keyed lifecycle hook strategies
//!
//! Clusters are looked up by name, pods and instances by server type. Any
//! name without a registration gets [`DefaultHooks`]. Registration happens in
//! the composition root before the tree is built.

use crate::compute::cluster::Cluster;
use crate::compute::instance::Instance;
use crate::compute::pod::Pod;
use crate::lifecycle::Verb;
use arc_cloud::{Request, Response};
use async_trait::async_trait;
use std::collections::HashMap;
use std::rc::Rc;

#[async_trait(?Send)]
pub trait ClusterHooks {
    /// `Continue` lets the default routing run
    async fn route(&self, _cluster: &mut Cluster, _req: &mut Request) -> Response {
        Response::Continue
    }

    async fn pre(&self, _cluster: &mut Cluster, _verb: Verb, _req: &Request) -> Response {
        Response::Continue
    }

    async fn post(&self, _cluster: &mut Cluster, _verb: Verb, _req: &Request) -> Response {
        Response::Ok
    }
}

#[async_trait(?Send)]
pub trait PodHooks {
    async fn route(&self, _pod: &mut Pod, _req: &mut Request) -> Response {
        Response::Continue
    }

    async fn pre(&self, _pod: &mut Pod, _verb: Verb, _req: &Request) -> Response {
        Response::Continue
    }

    async fn post(&self, _pod: &mut Pod, _verb: Verb, _req: &Request) -> Response {
        Response::Ok
    }
}

#[async_trait(?Send)]
pub trait InstanceHooks {
    async fn route(&self, _instance: &mut Instance, _req: &mut Request) -> Response {
        Response::Continue
    }

    async fn pre(&self, _instance: &mut Instance, _verb: Verb, _req: &Request) -> Response {
        Response::Continue
    }

    async fn post(&self, _instance: &mut Instance, _verb: Verb, _req: &Request) -> Response {
        Response::Ok
    }
}

/// Hooks that change nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultHooks;

impl ClusterHooks for DefaultHooks {}
impl PodHooks for DefaultHooks {}
impl InstanceHooks for DefaultHooks {}

#[derive(Default, Clone)]
pub struct Factories {
    clusters: HashMap<String, Rc<dyn ClusterHooks>>,
    pods: HashMap<String, Rc<dyn PodHooks>>,
    instances: HashMap<String, Rc<dyn InstanceHooks>>,
}

impl Factories {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_cluster(&mut self, name: impl Into<String>, hooks: impl ClusterHooks + 'static) {
        self.clusters.insert(name.into(), Rc::new(hooks));
    }

    pub fn register_pod(&mut self, server_type: impl Into<String>, hooks: impl PodHooks + 'static) {
        self.pods.insert(server_type.into(), Rc::new(hooks));
    }

    pub fn register_instance(
        &mut self,
        server_type: impl Into<String>,
        hooks: impl InstanceHooks + 'static,
    ) {
        self.instances.insert(server_type.into(), Rc::new(hooks));
    }

    pub fn cluster(&self, name: &str) -> Rc<dyn ClusterHooks> {
        match self.clusters.get(name) {
            Some(hooks) => hooks.clone(),
            None => Rc::new(DefaultHooks),
        }
    }

    pub fn pod(&self, server_type: &str) -> Rc<dyn PodHooks> {
        match self.pods.get(server_type) {
            Some(hooks) => hooks.clone(),
            None => Rc::new(DefaultHooks),
        }
    }

    pub fn instance(&self, server_type: &str) -> Rc<dyn InstanceHooks> {
        match self.instances.get(server_type) {
            Some(hooks) => hooks.clone(),
            None => Rc::new(DefaultHooks),
        }
    }
}
