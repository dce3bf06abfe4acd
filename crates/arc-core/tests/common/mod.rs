//! Shared harness for arc-core integration tests

use arc_cloud::{Registry, Request, Response};
use arc_cloud_mock::MockProvider;
use arc_core::{
    AllowAll, App, Env, Factories, MemoryAccounting, RecordingTransport, Runtime, StaticKeys,
    Timing,
};
use chrono::Utc;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub const DATACENTER: &str = r#"
datacenter "dev" {
    provider "mock" { region "us-east-1" }
    security-tags { Owner "infra" }
    network {
        cidr "10.0.0.0/16"
        availability-zones "us-east-1a" "us-east-1b"
        cidr-aliases { office "192.168.10.0/24" }
        cidr-groups { trusted "office" "10.0.0.0/16" }
        subnet-group "public" { cidr "10.0.1.0/24"; access "public_elastic" }
        subnet-group "private" { cidr "10.0.10.0/24" }
        security-group "ssh" { rule "ingress" "tcp" "22" "trusted" }
        security-group "web" {
            rule "ingress" "tcp" "80-443" "0.0.0.0/0"
            rule "ingress" "tcp" "8080" "ssh"
        }
        security-group "db" { rule "ingress" "tcp" "5432" "web" }
    }
    compute {
        keypair "id_ed25519"
        cluster "prod" {
            security-tags { Tier "prod" }
            pod "web" {
                server-type "web"
                version "1.4.2"
                package-name "web-server-{version}.rpm"
                image-family "centos7"
                instance-type "t3.small"
                role "web"
                subnet-group "public"
                security-groups "ssh" "web"
                teams "ops"
                count 2
                volume "/dev/sda1" { size 20; type "gp2"; fs "xfs"; boot }
                volume "/dev/sdf" { size 100; fs "xfs"; inodes 0; mount "/data"; preserve }
            }
        }
    }
}
dns {
    provider "mock"
    domain "example.com"
    subdomain "dev"
    ttl 300
    a "bastion" { ttl 60; values "10.0.1.5" }
    cname "www" { pod "web"; access "public" }
}
database-service {
    provider "mock"
    db "main" {
        engine "postgres"
        version "13"
        instance-type "db.t3.medium"
        storage 100
        subnet-group "private"
        security-groups "db"
    }
}
container-service "ecs" { provider "mock" }
users {
    group "ops" gid=5000
    user "alice" uid=6001 { groups "ops"; sudo; key "ssh-ed25519 AAAA alice" }
    user "bob" uid=6002 { removed }
}
teams { team "ops" { users "alice" "bob"; groups "ops" } }
"#;

/// One mock cloud that outlives every `App` built against it, the way the
/// real cloud outlives each command line invocation
pub struct Harness {
    pub mock: MockProvider,
    pub transport: RecordingTransport,
    pub accounting: MemoryAccounting,
    pub factories: Factories,
    registry: Registry,
    dir: TempDir,
}

#[allow(dead_code)]
impl Harness {
    pub fn new() -> Self {
        let mock = MockProvider::new();
        let mut registry = Registry::new();
        registry.register(Arc::new(mock.clone()));
        Self {
            mock,
            transport: RecordingTransport::new(),
            accounting: MemoryAccounting::new(),
            factories: Factories::new(),
            registry,
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn arc_dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn env(&self) -> Env {
        Env {
            user: "alice".to_string(),
            ssh_auth_sock: String::new(),
            arc_dir: self.dir.path().to_path_buf(),
            root: self.dir.path().join("root"),
            version: "test".to_string(),
        }
    }

    pub fn runtime(&self) -> Runtime {
        Runtime::new(self.env())
            .with_aaa(AllowAll)
            .with_accounting(self.accounting.clone())
            .with_transport(self.transport.clone())
            .with_keys(StaticKeys(vec![
                "ssh-ed25519 AAAAC3Nza /home/alice/.ssh/id_ed25519".to_string(),
            ]))
            .with_timing(Timing {
                interval: Duration::from_millis(1),
                timeout: Duration::from_millis(200),
            })
    }

    pub async fn app(&self) -> App {
        self.app_with(self.runtime()).await
    }

    pub async fn app_with(&self, rt: Runtime) -> App {
        self.build(DATACENTER, rt).await
    }

    /// An app for a different document against the same cloud
    pub async fn app_from(&self, kdl: &str) -> App {
        self.build(kdl, self.runtime()).await
    }

    async fn build(&self, kdl: &str, rt: Runtime) -> App {
        let config = arc_config::parse_kdl_string(kdl, "dev").unwrap();
        arc_config::validate(&config).unwrap();
        App::build(config, Rc::new(rt), &self.registry, &self.factories)
            .await
            .unwrap()
    }

    /// Run one command line against a fresh tree
    pub async fn run(&self, tokens: &[&str]) -> Response {
        let mut app = self.app().await;
        run(&mut app, tokens).await
    }

    pub async fn calls(&self) -> Vec<String> {
        self.mock.calls().await
    }

    /// Remote commands in the order they ran
    pub fn remote(&self) -> Vec<String> {
        self.transport
            .log()
            .into_iter()
            .filter_map(|line| line.strip_prefix("run ").map(str::to_string))
            .collect()
    }
}

pub async fn run(app: &mut App, tokens: &[&str]) -> Response {
    let mut req = Request::new("dev", "alice", Utc::now(), tokens);
    app.run(&mut req).await
}

/// Index of the first call equal to `call`
#[allow(dead_code)]
pub fn position(calls: &[String], call: &str) -> usize {
    calls
        .iter()
        .position(|c| c == call)
        .unwrap_or_else(|| panic!("no call '{}' in {:#?}", call, calls))
}
