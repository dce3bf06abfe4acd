//! The user keypair, imported from the SSH agent

use crate::aaa::{self, Scope};
use crate::error::{CoreError, Result};
use crate::help;
use crate::leaf;
use crate::lifecycle::{Lifecycle, Verb, drive};
use crate::msg;
use crate::resource::Resource;
use crate::runtime::Runtime;
use crate::ssh::SshError;
use arc_cloud::{Command, DatacenterFactory, KeyPairProvider, KeyPairSpec, Request, Response};
use async_trait::async_trait;
use std::path::Path;
use std::rc::Rc;
use tokio::process::Command as Process;

/// Where public keys come from
#[async_trait(?Send)]
pub trait KeySource {
    /// OpenSSH public key lines
    async fn public_keys(&self) -> Result<Vec<String>>;
}

/// `ssh-add -L` against the agent socket
#[derive(Debug, Clone)]
pub struct AgentKeys {
    sock: String,
}

impl AgentKeys {
    pub fn new(sock: impl Into<String>) -> Self {
        Self { sock: sock.into() }
    }
}

#[async_trait(?Send)]
impl KeySource for AgentKeys {
    async fn public_keys(&self) -> Result<Vec<String>> {
        let output = Process::new("ssh-add")
            .arg("-L")
            .env("SSH_AUTH_SOCK", &self.sock)
            .output()
            .await?;
        if !output.status.success() {
            return Err(SshError::Exit {
                command: "ssh-add -L".to_string(),
                status: output.status.to_string(),
                output: String::from_utf8_lossy(&output.stderr).into_owned(),
            }
            .into());
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }
}

/// A fixed list of keys
#[derive(Debug, Clone, Default)]
pub struct StaticKeys(pub Vec<String>);

#[async_trait(?Send)]
impl KeySource for StaticKeys {
    async fn public_keys(&self) -> Result<Vec<String>> {
        Ok(self.0.clone())
    }
}

/// The key whose comment names the private key file `keypair`
pub fn select(keys: &[String], keypair: &str) -> Option<String> {
    keys.iter()
        .find(|line| {
            line.split_whitespace()
                .nth(2)
                .and_then(|comment| Path::new(comment).file_name())
                .is_some_and(|base| base == keypair)
        })
        .cloned()
}

pub struct KeyPair {
    rt: Rc<Runtime>,
    spec: KeyPairSpec,
    provider: Box<dyn KeyPairProvider>,
}

impl KeyPair {
    /// Fails when the agent holds no matching key
    pub async fn build(
        rt: Rc<Runtime>,
        factory: &dyn DatacenterFactory,
        keypair: &str,
    ) -> Result<Self> {
        let keys = rt.keys.public_keys().await?;
        let public_key =
            select(&keys, keypair).ok_or_else(|| CoreError::KeyNotFound(keypair.to_string()))?;
        let spec = KeyPairSpec {
            name: rt.env.user.clone(),
            public_key,
        };
        let provider = factory.keypair(&spec)?;
        Ok(Self { rt, spec, provider })
    }

    /// Provider side name instances launch with
    pub fn key_name(&self) -> &str {
        &self.spec.name
    }
}

#[async_trait(?Send)]
impl Resource for KeyPair {
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
        if !aaa::check(self.rt.aaa.as_ref(), Scope::KeyPair, &self.spec.name, req) {
            return Response::Unauthorized;
        }
        if req.top().is_some() {
            return leaf::unknown("KeyPair", help::ATTACHMENT, &mut *self.provider, req).await;
        }
        let name = self.spec.name.clone();
        match req.command() {
            Command::None | Command::Help => {
                help::print("Keypair", help::ATTACHMENT);
                Response::Ok
            }
            Command::Config => {
                msg::message(format!("{}: {}", name, self.spec.public_key));
                Response::Ok
            }
            Command::Load => leaf::load("KeyPair", &name, &mut *self.provider).await,
            Command::Info => leaf::info("KeyPair", &name, &*self.provider),
            Command::Audit => leaf::audit(&self.rt, "KeyPair", &name, &mut *self.provider).await,
            command => match Verb::from_command(command) {
                Some(verb) => drive(self, verb, req).await,
                None => leaf::fail(format!("Unknown command: {}", command)),
            },
        }
    }
}

#[async_trait(?Send)]
impl Lifecycle for KeyPair {
    fn kind(&self) -> &'static str {
        "KeyPair"
    }

    fn runtime(&self) -> &Runtime {
        &self.rt
    }

    fn leaf(&self) -> bool {
        true
    }

    async fn run(&mut self, verb: Verb, req: &Request) -> Response {
        let name = self.spec.name.clone();
        leaf::run("KeyPair", &name, &mut *self.provider, verb, req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_matches_comment_basename() {
        let keys = vec![
            "ssh-rsa AAAAB3Nza alice@laptop".to_string(),
            "ssh-ed25519 AAAAC3Nza /home/alice/.ssh/id_ed25519".to_string(),
            "ssh-ed25519 AAAAC3Nzb /home/alice/.ssh/work_ed25519".to_string(),
        ];
        assert_eq!(
            select(&keys, "id_ed25519").as_deref(),
            Some("ssh-ed25519 AAAAC3Nza /home/alice/.ssh/id_ed25519")
        );
        assert!(select(&keys, "id_rsa").is_none());
        assert!(select(&["ssh-rsa AAAA".to_string()], "id_rsa").is_none());
    }

    #[tokio::test]
    async fn test_static_keys() {
        let keys = StaticKeys(vec!["ssh-ed25519 AAAA id_ed25519".to_string()]);
        assert_eq!(keys.public_keys().await.unwrap().len(), 1);
    }
}
