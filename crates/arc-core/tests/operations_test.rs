//! Provisioning, power verbs, hooks and authorization

mod common;

use arc_cloud::{Request, Response};
use arc_core::compute::cluster::Cluster;
use arc_core::compute::instance::Instance;
use arc_core::compute::pod::Pod;
use arc_core::resource::Resource;
use arc_core::{ClusterHooks, DenyScopes, InstanceHooks, PodHooks, Scope, Verb};
use async_trait::async_trait;
use common::{Harness, position};
use std::cell::RefCell;
use std::rc::Rc;

async fn created() -> Harness {
    let h = Harness::new();
    assert_eq!(h.run(&["create"]).await, Response::Ok);
    h.transport.clear();
    h
}

#[tokio::test]
async fn test_provision_installs_software_in_order() {
    let h = created().await;
    std::fs::write(h.arc_dir().join("packages-1.4.2.txt"), "extra.rpm\n\n").unwrap();
    std::fs::write(h.arc_dir().join("extra.rpm"), "rpm").unwrap();

    assert_eq!(h.run(&["instance", "web-01", "provision"]).await, Response::Ok);

    assert_eq!(
        h.remote(),
        vec![
            "sudo /tmp/install_hiera.sh",
            "sudo /tmp/install_package.sh /tmp/web-server-1.4.2.rpm",
            "sudo /tmp/install_package.sh /tmp/extra.rpm",
            "sudo /tmp/install_puppet.sh",
            "sudo /tmp/install_certs.sh",
            "sudo /tmp/setup_machine_user.sh",
            "sudo /tmp/puppet_apply.sh web",
            "sudo /tmp/start_paging.sh",
            "sudo /tmp/puppet_apply.sh aide",
        ]
    );

    let lib = h.arc_dir().join("root/usr/lib/arc");
    let pull = format!(
        "local {} web-server-1.4.2.rpm {}",
        lib.join("tools/pull_package.sh").display(),
        h.arc_dir().display()
    );
    let log = h.transport.log();
    assert!(log.contains(&pull));
    let support = format!("copy {} /tmp/arc.sh", lib.join("arc.sh").display());
    assert!(log.contains(&support));
}

#[tokio::test]
async fn test_provision_skips_puppet_and_certs_when_asked() {
    let h = created().await;
    assert_eq!(
        h.run(&["instance", "web-01", "provision", "nopuppet", "bootstrap"]).await,
        Response::Ok
    );
    let remote = h.remote();
    assert!(!remote.iter().any(|c| c.contains("install_puppet")));
    assert!(!remote.iter().any(|c| c.contains("install_certs")));
    assert!(remote.contains(&"sudo /tmp/puppet_apply.sh web".to_string()));
}

#[tokio::test]
async fn test_provision_fails_on_missing_listed_package() {
    let h = created().await;
    std::fs::write(h.arc_dir().join("packages-1.4.2.txt"), "absent.rpm\n").unwrap();

    assert_eq!(
        h.run(&["instance", "web-01", "provision"]).await,
        Response::Fail
    );
    assert!(h.remote().is_empty());
}

#[tokio::test]
async fn test_initial_provision_restarts_through_provider() {
    let h = created().await;
    assert_eq!(
        h.run(&["instance", "web-02", "provision", "initial"]).await,
        Response::Ok
    );
    let calls = h.calls().await;
    assert!(calls.contains(&"restart instance web-02".to_string()));
    let remote = h.remote();
    assert!(remote.contains(&"sudo /tmp/update_software.sh".to_string()));
    assert!(!remote.contains(&"sudo /tmp/start_paging.sh".to_string()));
}

#[tokio::test]
async fn test_provision_sub_steps() {
    let h = created().await;

    assert_eq!(
        h.run(&["instance", "web-01", "provision", "aide"]).await,
        Response::Ok
    );
    assert_eq!(h.remote(), vec!["sudo /tmp/puppet_apply.sh aide"]);

    h.transport.clear();
    assert_eq!(
        h.run(&["instance", "web-01", "provision", "users"]).await,
        Response::Ok
    );
    let remote = h.remote();
    assert!(remote.contains(&"sudo /tmp/setup_user.sh alice 6001".to_string()));
    assert_eq!(
        remote.last().map(String::as_str),
        Some("sudo /tmp/fix_arc_permissions.sh")
    );

    let before = h.calls().await.len();
    assert_eq!(
        h.run(&["instance", "web-01", "provision", "role"]).await,
        Response::Ok
    );
    assert_eq!(
        h.calls().await[before..],
        ["attach role web web-01".to_string()]
    );
}

#[tokio::test]
async fn test_provision_tags_keeps_creator() {
    let h = created().await;
    let mut app = h.app().await;
    let tokens = ["instance", "web-01", "provision", "tags"];
    let mut req = Request::new("dev", "bob", chrono::Utc::now(), &tokens);
    assert_eq!(app.run(&mut req).await, Response::Ok);

    let cloud = h.mock.snapshot().await;
    let tags = &cloud.instances["web-01"].tags;
    assert_eq!(tags.get("Created By").map(String::as_str), Some("alice"));
    assert_eq!(tags.get("Last Modified By").map(String::as_str), Some("bob"));
}

#[tokio::test]
async fn test_stop_and_start_the_datacenter() {
    let h = created().await;

    assert_eq!(h.run(&["stop"]).await, Response::Ok);
    let calls = h.calls().await;
    let (first, second) = ("stop instance web-01", "stop instance web-02");
    assert!(position(&calls, second) < position(&calls, first));
    assert!(h.remote().contains(&"sudo /tmp/stop_paging.sh".to_string()));
    let cloud = h.mock.snapshot().await;
    assert!(cloud.instances.values().all(|i| i.state.to_string() == "stopped"));

    assert_eq!(h.run(&["start"]).await, Response::Ok);
    let calls = h.calls().await;
    let (first, second) = ("start instance web-01", "start instance web-02");
    assert!(position(&calls, first) < position(&calls, second));
    let cloud = h.mock.snapshot().await;
    assert!(cloud.instances.values().all(|i| i.state.to_string() == "running"));
}

#[tokio::test]
async fn test_hard_restart_uses_provider() {
    let h = created().await;
    assert_eq!(
        h.run(&["instance", "web-01", "restart", "hard"]).await,
        Response::Ok
    );
    assert!(h.calls().await.contains(&"hard restart instance web-01".to_string()));
    assert!(h.remote().is_empty());
}

#[tokio::test]
async fn test_failed_remote_step_fails_the_verb() {
    let h = created().await;
    h.transport.fail_on("puppet_apply.sh web");
    assert_eq!(
        h.run(&["instance", "web-01", "provision"]).await,
        Response::Fail
    );
    // nothing runs after the failing step
    assert!(!h.remote().contains(&"sudo /tmp/start_paging.sh".to_string()));
}

#[tokio::test]
async fn test_unreachable_instance_fails_create() {
    let h = Harness::new();
    h.transport.refuse_connections(true);
    assert_eq!(h.run(&["create"]).await, Response::Fail);
    // the instance exists, setup never ran
    let cloud = h.mock.snapshot().await;
    assert!(cloud.instances.contains_key("web-01"));
    assert!(!cloud.instances.contains_key("web-02"));
}

struct Recorder {
    seen: Rc<RefCell<Vec<String>>>,
    veto: &'static str,
}

#[async_trait(?Send)]
impl InstanceHooks for Recorder {
    async fn pre(&self, instance: &mut Instance, verb: Verb, _req: &Request) -> Response {
        self.seen
            .borrow_mut()
            .push(format!("pre {} {}", verb, instance.name()));
        if instance.name() == self.veto {
            return Response::Fail;
        }
        Response::Ok
    }

    async fn post(&self, instance: &mut Instance, verb: Verb, _req: &Request) -> Response {
        let line = format!(
            "post {} {} {}",
            verb,
            instance.name(),
            instance.spec().instance_type
        );
        self.seen.borrow_mut().push(line);
        Response::Ok
    }
}

#[tokio::test]
async fn test_instance_hooks_wrap_and_veto() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut h = Harness::new();
    h.factories.register_instance(
        "web",
        Recorder {
            seen: seen.clone(),
            veto: "web-02",
        },
    );

    assert_eq!(h.run(&["create"]).await, Response::Fail);
    assert_eq!(
        *seen.borrow(),
        vec![
            "pre Create web-01".to_string(),
            "post Create web-01 t3.small".to_string(),
            "pre Create web-02".to_string(),
        ]
    );
    let calls = h.calls().await;
    assert!(calls.contains(&"create instance web-01".to_string()));
    assert!(!calls.contains(&"create instance web-02".to_string()));
}

#[tokio::test]
async fn test_denied_scope_is_unauthorized() {
    let h = Harness::new();
    let mut app = h
        .app_with(h.runtime().with_aaa(DenyScopes(vec![Scope::Network])))
        .await;
    assert_eq!(common::run(&mut app, &["create"]).await, Response::Unauthorized);
    assert!(h.calls().await.is_empty());
    // reads are never denied
    assert_eq!(common::run(&mut app, &["info"]).await, Response::Ok);
}

#[tokio::test]
async fn test_denied_cluster_blocks_instance_verbs() {
    let h = created().await;
    let mut app = h
        .app_with(h.runtime().with_aaa(DenyScopes(vec![Scope::Cluster])))
        .await;
    let before = h.calls().await.len();
    assert_eq!(
        common::run(&mut app, &["instance", "web-01", "stop"]).await,
        Response::Unauthorized
    );
    assert_eq!(h.calls().await.len(), before);
}

#[tokio::test]
async fn test_vendor_sub_verbs() {
    let h = created().await;
    assert_eq!(h.run(&["instance", "web-01", "console"]).await, Response::Ok);

    assert_eq!(h.run(&["db", "main", "snapshot"]).await, Response::Ok);
    assert_eq!(
        h.calls().await.last().map(String::as_str),
        Some("snapshot db main")
    );

    // anything the vendor does not publish is still unknown
    assert_eq!(h.run(&["db", "main", "backup"]).await, Response::Fail);
}

/// Answers `drain` itself and lets everything else through
struct Drain {
    seen: Rc<RefCell<Vec<String>>>,
}

#[async_trait(?Send)]
impl ClusterHooks for Drain {
    async fn route(&self, cluster: &mut Cluster, req: &mut Request) -> Response {
        if req.top() != Some("drain") {
            return Response::Continue;
        }
        for pod in cluster.pods().iter() {
            self.seen.borrow_mut().push(format!("drain {}", pod.name()));
        }
        Response::Ok
    }
}

struct NoStop;

#[async_trait(?Send)]
impl PodHooks for NoStop {
    async fn pre(&self, _pod: &mut Pod, verb: Verb, _req: &Request) -> Response {
        match verb {
            Verb::Stop => Response::Fail,
            _ => Response::Continue,
        }
    }
}

#[tokio::test]
async fn test_cluster_and_pod_hooks() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut h = created().await;
    h.factories.register_cluster("prod", Drain { seen: seen.clone() });
    h.factories.register_pod("web", NoStop);

    assert_eq!(h.run(&["cluster", "prod", "drain"]).await, Response::Ok);
    assert_eq!(*seen.borrow(), vec!["drain web".to_string()]);

    let before = h.calls().await.len();
    assert_eq!(h.run(&["stop"]).await, Response::Fail);
    assert_eq!(h.calls().await.len(), before);
}

#[tokio::test]
async fn test_route_hooks_run_after_authorization() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut h = created().await;
    h.factories.register_cluster("prod", Drain { seen: seen.clone() });

    let mut app = h
        .app_with(h.runtime().with_aaa(DenyScopes(vec![Scope::Cluster])))
        .await;
    assert_eq!(
        common::run(&mut app, &["cluster", "prod", "drain", "create"]).await,
        Response::Unauthorized
    );
    assert!(seen.borrow().is_empty());

    // reads still reach the hook
    assert_eq!(
        common::run(&mut app, &["cluster", "prod", "drain"]).await,
        Response::Ok
    );
    assert_eq!(*seen.borrow(), vec!["drain web".to_string()]);
}
