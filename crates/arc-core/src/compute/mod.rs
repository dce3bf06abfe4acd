//! Compute subtree: the user keypair and the clusters

pub mod cluster;
pub mod instance;
pub mod keypair;
pub mod pod;

use crate::dns::DnsLink;
use crate::dns::record::Directory;
use crate::error::{CoreError, Result};
use crate::factory::Factories;
use crate::help;
use crate::leaf;
use crate::lifecycle::{Lifecycle, Verb, drive};
use crate::network::Network;
use crate::resource::{Resource, Resources};
use crate::runtime::Runtime;
use arc_cloud::{Command, DatacenterFactory, Request, ResourceKind, Response};
use arc_config::{Config, PodConfig};
use async_trait::async_trait;
use cluster::Cluster;
use instance::Placement;
use keypair::KeyPair;
use pod::Pod;
use std::cell::OnceCell;
use std::rc::Rc;
use std::sync::Arc;

pub struct Compute {
    rt: Rc<Runtime>,
    factory: Arc<dyn DatacenterFactory>,
    keypair: KeyPair,
    clusters: Resources<Cluster>,
}

impl Compute {
    pub async fn build(
        rt: Rc<Runtime>,
        factory: Arc<dyn DatacenterFactory>,
        config: Rc<Config>,
        network: &Network,
        factories: &Factories,
        dns: Rc<OnceCell<DnsLink>>,
    ) -> Result<Self> {
        let dc = &config.datacenter;
        let keypair = KeyPair::build(rt.clone(), factory.as_ref(), &dc.compute.keypair).await?;

        let mut clusters = Resources::new();
        for cluster in &dc.compute.clusters {
            let mut tags = dc.security_tags.clone();
            tags.extend(cluster.security_tags.clone());

            let mut pods = Resources::new();
            for pod in &cluster.pods {
                let group = network.subnet_group(&pod.subnet_group).ok_or_else(|| {
                    CoreError::Config(format!(
                        "pod {}: unknown subnet group '{}'",
                        pod.name, pod.subnet_group
                    ))
                })?;
                let pod_config = PodConfig {
                    audit_ignore: pod.audit_ignore || cluster.audit_ignore,
                    ..pod.clone()
                };
                let placement = Placement {
                    rt: rt.clone(),
                    factory: factory.clone(),
                    config: config.clone(),
                    pod: Rc::new(pod_config),
                    keypair: keypair.key_name().to_string(),
                    subnets: group.subnets().iter().map(|s| s.spec().clone()).collect(),
                    access: group.access(),
                    tags: tags.clone(),
                    dns: dns.clone(),
                    hooks: factories.instance(&pod.server_type),
                };
                pods.push(Pod::build(&placement, factories.pod(&pod.server_type))?);
            }

            clusters.push(Cluster::new(
                rt.clone(),
                cluster.clone(),
                factories.cluster(&cluster.name),
                pods,
            ));
        }

        Ok(Self {
            rt,
            factory,
            keypair,
            clusters,
        })
    }

    pub fn keypair(&self) -> &KeyPair {
        &self.keypair
    }

    pub fn clusters(&self) -> &Resources<Cluster> {
        &self.clusters
    }

    /// Instance status by pod, for CNAME selection
    pub fn directory(&self) -> Directory {
        let mut directory = Directory::new();
        for cluster in self.clusters.iter() {
            for pod in cluster.pods().iter() {
                directory.insert(pod.name().to_string(), pod.views());
            }
        }
        directory
    }

    /// Keypair and clusters, then provider instances no pod accounts for
    async fn audit(&mut self, req: &Request) -> Response {
        let response = self.keypair.route(&mut req.clone()).await;
        if !response.is_ok() {
            return response;
        }
        let response = self.clusters.route_in_order(req).await;
        if !response.is_ok() {
            return response;
        }
        let configured: Vec<String> = self
            .clusters
            .iter()
            .flat_map(|c| c.pods().iter())
            .flat_map(|p| p.instances().names())
            .collect();
        match self.factory.inventory(ResourceKind::Instance).await {
            Ok(names) => {
                for name in names.into_iter().filter(|n| !configured.contains(n)) {
                    self.rt.audit.push(format!("instance {}", name), "not configured");
                }
                Response::Ok
            }
            Err(e) => leaf::fail(format!("instance inventory failed: {}", e)),
        }
    }

    fn cluster_of_pod(&mut self, pod: &str) -> Option<&mut Cluster> {
        self.clusters.iter_mut().find(|c| c.has_pod(pod))
    }

    async fn route_named(&mut self, kind: &str, req: &mut Request) -> Response {
        let Some(name) = req.top().map(str::to_string) else {
            help::print("Compute", help::COMPUTE);
            return leaf::fail(format!("{} name required", kind));
        };
        match kind {
            "cluster" => match self.clusters.get_mut(&name) {
                Some(cluster) => cluster.route(req.pop()).await,
                None => leaf::fail(format!("Unknown cluster: {}", name)),
            },
            // pods and instances route through their cluster so its checks
            // and hooks apply
            "pod" => match self.cluster_of_pod(&name) {
                Some(cluster) => cluster.route(req).await,
                None => leaf::fail(format!("Unknown pod: {}", name)),
            },
            _ => {
                let owner = self
                    .clusters
                    .iter_mut()
                    .find_map(|c| c.pod_of(&name).map(|pod| (c, pod)));
                match owner {
                    Some((cluster, pod)) => cluster.route(req.push(pod)).await,
                    None => leaf::fail(format!("Unknown instance: {}", name)),
                }
            }
        }
    }
}

#[async_trait(?Send)]
impl Resource for Compute {
    fn name(&self) -> &str {
        "compute"
    }

    fn created(&self) -> bool {
        self.keypair.created() && self.clusters.iter().all(|c| c.created())
    }

    /// The keypair outlives the clusters, so it decides too
    fn destroyed(&self) -> bool {
        self.keypair.destroyed() && self.clusters.destroyed()
    }

    async fn route(&mut self, req: &mut Request) -> Response {
        if let Some(top) = req.top().map(str::to_string) {
            return match top.as_str() {
                "keypair" => self.keypair.route(req.pop()).await,
                "cluster" | "pod" | "instance" => self.route_named(&top, req.pop()).await,
                _ => {
                    help::print("Compute", help::COMPUTE);
                    leaf::fail(format!("Unknown compute command: {}", top))
                }
            };
        }
        match req.command() {
            Command::None | Command::Help => {
                help::print("Compute", help::COMPUTE);
                Response::Ok
            }
            Command::Config => {
                let clusters: Vec<_> = self.clusters.iter().map(|c| c.config()).collect();
                leaf::config(&clusters)
            }
            Command::Audit => self.audit(req).await,
            Command::Load | Command::Info => {
                let response = self.keypair.route(&mut req.clone()).await;
                if !response.is_ok() {
                    return response;
                }
                self.clusters.route_in_order(req).await
            }
            command => match Verb::from_command(command) {
                Some(verb) => drive(self, verb, req).await,
                None => leaf::fail(format!("Unknown command: {}", command)),
            },
        }
    }
}

#[async_trait(?Send)]
impl Lifecycle for Compute {
    fn kind(&self) -> &'static str {
        "Compute"
    }

    fn runtime(&self) -> &Runtime {
        &self.rt
    }

    async fn run(&mut self, verb: Verb, req: &Request) -> Response {
        let child = req.clone_with(verb.command());
        match verb {
            Verb::Create => {
                let response = self.keypair.route(&mut child.clone()).await;
                if !response.is_ok() {
                    return response;
                }
                self.clusters.route_in_order(&child).await
            }
            Verb::Destroy => {
                let response = self.clusters.route_reverse_order(&child).await;
                if !response.is_ok() {
                    return response;
                }
                self.keypair.route(&mut child.clone()).await
            }
            Verb::Stop => self.clusters.route_reverse_order(&child).await,
            _ => self.clusters.route_in_order(&child).await,
        }
    }
}
