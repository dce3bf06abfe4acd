//! Security groups and their two-pass protocol
//!
//! Rules may name other groups, so on a plain `create` every group is first
//! allocated without rules, the groups are reloaded and only then are the
//! rules installed. `destroy` mirrors it: rules go first, then the groups.
//! Any flag on the request opts out and runs a single pass.

use crate::error::{CoreError, Result};
use crate::help;
use crate::leaf;
use crate::lifecycle::{Lifecycle, Verb, drive};
use crate::msg;
use crate::resource::{Resource, Resources};
use crate::runtime::Runtime;
use arc_cloud::{
    Command, DatacenterFactory, Request, Response, RuleDirection, RulePeer, RuleSpec,
    SecurityGroupProvider, SecurityGroupSpec, flag,
};
use arc_config::{Direction, NetworkConfig, Remote, SecurityGroupConfig};
use async_trait::async_trait;
use std::rc::Rc;

/// Expand configured rules into one rule per resolved remote
pub fn resolve_rules(network: &NetworkConfig, group: &SecurityGroupConfig) -> Result<Vec<RuleSpec>> {
    let mut rules = Vec::new();
    for rule in &group.rules {
        let direction = match rule.direction {
            Direction::Ingress => RuleDirection::Ingress,
            Direction::Egress => RuleDirection::Egress,
        };
        for token in &rule.remotes {
            let remotes = network.resolve_remote(token).ok_or_else(|| {
                CoreError::Config(format!(
                    "security group '{}': unknown remote '{}'",
                    group.name, token
                ))
            })?;
            for remote in remotes {
                let peer = match remote {
                    Remote::Cidr(cidr) => RulePeer::Cidr(cidr),
                    Remote::Group(name) => RulePeer::Group(name),
                };
                rules.push(RuleSpec {
                    direction,
                    protocol: rule.protocol.clone(),
                    ports: rule.ports.clone(),
                    peer,
                });
            }
        }
    }
    Ok(rules)
}

pub struct SecurityGroup {
    rt: Rc<Runtime>,
    config: SecurityGroupConfig,
    provider: Box<dyn SecurityGroupProvider>,
}

impl SecurityGroup {
    pub fn build(
        rt: Rc<Runtime>,
        factory: &dyn DatacenterFactory,
        network_name: &str,
        network: &NetworkConfig,
        config: &SecurityGroupConfig,
    ) -> Result<Self> {
        let spec = SecurityGroupSpec {
            name: config.name.clone(),
            network: network_name.to_string(),
            rules: resolve_rules(network, config)?,
        };
        Ok(Self {
            rt,
            config: config.clone(),
            provider: factory.security_group(&spec)?,
        })
    }
}

#[async_trait(?Send)]
impl Resource for SecurityGroup {
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
            return leaf::unknown("SecurityGroup", help::ATTACHMENT, &mut *self.provider, req)
                .await;
        }
        let name = self.config.name.clone();
        match req.command() {
            Command::None | Command::Help => {
                help::print("Security group", help::ATTACHMENT);
                Response::Ok
            }
            Command::Config => leaf::config(&self.config),
            Command::Load => leaf::load("SecurityGroup", &name, &mut *self.provider).await,
            Command::Info => leaf::info("SecurityGroup", &name, &*self.provider),
            Command::Audit => {
                leaf::audit(&self.rt, "SecurityGroup", &name, &mut *self.provider).await
            }
            command => match Verb::from_command(command) {
                Some(verb) => drive(self, verb, req).await,
                None => leaf::fail(format!("Unknown command: {}", command)),
            },
        }
    }
}

#[async_trait(?Send)]
impl Lifecycle for SecurityGroup {
    fn kind(&self) -> &'static str {
        "SecurityGroup"
    }

    fn runtime(&self) -> &Runtime {
        &self.rt
    }

    fn leaf(&self) -> bool {
        true
    }

    async fn run(&mut self, verb: Verb, req: &Request) -> Response {
        let name = self.config.name.clone();
        let result = match verb {
            Verb::Create => {
                if req.has(flag::NORULES) {
                    msg::detail(format!("Create norules: {}", name));
                }
                self.provider.create(req).await
            }
            Verb::Destroy => {
                if req.has(flag::RULES_ONLY) {
                    msg::detail(format!("Destroy rules_only: {}", name));
                }
                self.provider.destroy(req).await
            }
            Verb::Provision => self.provider.provision(req).await,
            other => {
                return leaf::fail(format!("SecurityGroup {}: {} is not supported", name, other));
            }
        };
        match result {
            Ok(()) => Response::Ok,
            Err(e) => leaf::fail(format!("SecurityGroup {}: {} failed: {}", name, verb, e)),
        }
    }
}

/// Every group of the network
pub struct SecurityGroups {
    groups: Resources<SecurityGroup>,
}

impl SecurityGroups {
    pub fn new(groups: Resources<SecurityGroup>) -> Self {
        Self { groups }
    }

    pub fn groups(&self) -> &Resources<SecurityGroup> {
        &self.groups
    }

    pub fn created(&self) -> bool {
        self.groups.created()
    }

    pub fn destroyed(&self) -> bool {
        self.groups.destroyed()
    }

    fn selected<'a>(
        &'a mut self,
        only: Option<&'a str>,
    ) -> impl Iterator<Item = &'a mut SecurityGroup> + 'a {
        self.groups
            .iter_mut()
            .filter(move |g| only.is_none_or(|name| g.name() == name))
    }

    async fn pass(&mut self, only: Option<&str>, req: &Request, reverse: bool) -> Response {
        let mut targets: Vec<&mut SecurityGroup> = self.selected(only).collect();
        if reverse {
            targets.reverse();
        }
        for group in targets {
            let mut child = req.clone();
            let response = group.route(&mut child).await;
            if !response.is_ok() {
                return response;
            }
        }
        Response::Ok
    }

    /// Create `only` or every group
    pub async fn create(&mut self, only: Option<&str>, req: &Request) -> Response {
        let create = req.clone_with(Command::Create);
        if !req.flags().is_empty() {
            return self.pass(only, &create, false).await;
        }

        let response = self
            .pass(only, &create.clone().with_flag(flag::NORULES), false)
            .await;
        if !response.is_ok() {
            return response;
        }
        // every group, so rules can resolve peers outside the selection
        let response = self.pass(None, &req.clone_with(Command::Load), false).await;
        if !response.is_ok() {
            return response;
        }
        self.pass(only, &req.clone_with(Command::Provision), false)
            .await
    }

    /// Destroy `only` or every group, last to first
    pub async fn destroy(&mut self, only: Option<&str>, req: &Request) -> Response {
        let destroy = req.clone_with(Command::Destroy);
        if !req.flags().is_empty() {
            return self.pass(only, &destroy, true).await;
        }

        let response = self
            .pass(only, &destroy.clone().with_flag(flag::RULES_ONLY), true)
            .await;
        if !response.is_ok() {
            return response;
        }
        self.pass(only, &destroy, true).await
    }

    /// Any other command, first to last
    pub async fn route_all(&mut self, req: &Request) -> Response {
        self.groups.route_in_order(req).await
    }

    /// Address a single group by name
    pub async fn route_one(&mut self, req: &mut Request) -> Response {
        let Some(name) = req.top().map(str::to_string) else {
            help::print("Security groups", help::NETWORK);
            return Response::Ok;
        };
        if self.groups.get(&name).is_none() {
            msg::error(format!("Unknown secgroup: {}", name));
            help::print("Security groups", help::NETWORK);
            return Response::Fail;
        }
        req.pop();
        if req.top().is_none() {
            match req.command() {
                Command::Create => return self.create(Some(&name), req).await,
                Command::Destroy => return self.destroy(Some(&name), req).await,
                _ => {}
            }
        }
        match self.groups.get_mut(&name) {
            Some(group) => group.route(req).await,
            None => Response::Fail,
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.groups.names()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arc_config::RuleConfig;

    #[test]
    fn test_resolve_rules_expands_groups_of_cidrs() {
        let network = NetworkConfig {
            cidr_aliases: [("office".to_string(), "192.168.10.0/24".to_string())]
                .into_iter()
                .collect(),
            cidr_groups: [(
                "trusted".to_string(),
                vec!["office".to_string(), "10.0.0.0/16".to_string()],
            )]
            .into_iter()
            .collect(),
            security_groups: vec![SecurityGroupConfig {
                name: "ssh".to_string(),
                rules: vec![],
            }],
            ..Default::default()
        };
        let web = SecurityGroupConfig {
            name: "web".to_string(),
            rules: vec![RuleConfig {
                direction: Direction::Ingress,
                protocol: "tcp".to_string(),
                ports: "22".to_string(),
                remotes: vec!["trusted".to_string(), "ssh".to_string()],
            }],
        };

        let rules = resolve_rules(&network, &web).unwrap();
        let peers: Vec<String> = rules.iter().map(|r| r.peer.to_string()).collect();
        assert_eq!(peers, vec!["192.168.10.0/24", "10.0.0.0/16", "sg:ssh"]);

        let broken = SecurityGroupConfig {
            name: "broken".to_string(),
            rules: vec![RuleConfig {
                remotes: vec!["nowhere".to_string()],
                ..Default::default()
            }],
        };
        assert!(matches!(
            resolve_rules(&network, &broken),
            Err(CoreError::Config(_))
        ));
    }
}
