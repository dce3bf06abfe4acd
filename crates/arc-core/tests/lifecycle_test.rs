//! Create, destroy and replace of a whole datacenter against the mock cloud

mod common;

use arc_cloud::Response;
use arc_core::Verb;
use arc_core::resource::Resource;
use common::{Harness, position};

#[tokio::test]
async fn test_help_needs_no_cloud() {
    let h = Harness::new();
    assert_eq!(h.run(&["help"]).await, Response::Ok);
    assert_eq!(h.run(&[]).await, Response::Ok);
    assert!(h.calls().await.is_empty());
}

#[tokio::test]
async fn test_unknown_namespace_fails() {
    let h = Harness::new();
    assert_eq!(h.run(&["nonsense", "create"]).await, Response::Fail);
    assert!(h.calls().await.is_empty());
}

#[tokio::test]
async fn test_create_with_test_flag_writes_nothing() {
    let h = Harness::new();
    assert_eq!(h.run(&["create", "test"]).await, Response::Ok);
    assert!(h.calls().await.is_empty());
    assert!(h.transport.log().is_empty());
}

#[tokio::test]
async fn test_create_builds_everything_in_dependency_order() {
    let h = Harness::new();
    assert_eq!(h.run(&["create"]).await, Response::Ok);

    let calls = h.calls().await;
    let network = position(&calls, "create network dev");
    let ssh_bare = position(&calls, "create secgroup ssh norules");
    let web_bare = position(&calls, "create secgroup web norules");
    let ssh_rules = position(&calls, "provision secgroup ssh");
    let web_rules = position(&calls, "provision secgroup web");
    let keypair = position(&calls, "import keypair alice");
    let role = position(&calls, "create role web");
    let first = position(&calls, "create instance web-01");
    let second = position(&calls, "create instance web-02");
    let db = position(&calls, "create db main");
    let container = position(&calls, "create container ecs");

    assert!(network < ssh_bare);
    // every group exists before any rule is installed
    assert!(ssh_bare < ssh_rules && web_bare < ssh_rules);
    assert!(ssh_rules < web_rules);
    assert!(web_rules < keypair);
    assert!(keypair < role && role < first && first < second);
    assert!(second < db && db < container);
    assert_eq!(
        calls.iter().filter(|c| c.as_str() == "create role web").count(),
        1
    );

    let cloud = h.mock.snapshot().await;
    assert_eq!(cloud.instances.len(), 2);
    let web01 = &cloud.instances["web-01"];
    assert_eq!(web01.key_name, "alice");
    assert_eq!(web01.role.as_deref(), Some("web"));
    assert_eq!(web01.tags.get("Name").map(String::as_str), Some("web-01"));
    assert_eq!(web01.tags.get("Tier").map(String::as_str), Some("prod"));
    assert_eq!(web01.tags.get("Owner").map(String::as_str), Some("infra"));
    assert_eq!(web01.tags.get("DataCenter").map(String::as_str), Some("dev"));
    assert_eq!(web01.tags.get("Created By").map(String::as_str), Some("alice"));

    // the two instances land in different zones
    assert_ne!(web01.subnet, cloud.instances["web-02"].subnet);

    let data = &cloud.volumes["web-01:/dev/sdf"];
    assert_eq!(data.attached_to.as_deref(), Some(web01.id.as_str()));
    let eip = &cloud.eips["web-01"];
    assert_eq!(eip.attached_to.as_deref(), Some(web01.id.as_str()));
    assert_eq!(web01.public_ip.as_deref(), Some(eip.ip.as_str()));

    let private = &cloud.records["web-01-internal.dev.example.com"];
    assert_eq!(private.values, vec![web01.private_ip.clone()]);
    let public = &cloud.records["web-01.dev.example.com"];
    assert_eq!(public.values, vec![eip.ip.clone()]);
    assert_eq!(cloud.records["bastion.dev.example.com"].values, vec!["10.0.1.5"]);
    assert_eq!(
        cloud.records["www.dev.example.com"].values,
        vec!["web-01.dev.example.com"]
    );
    assert!(cloud.databases.contains_key("main"));
    assert!(cloud.containers.contains_key("ecs"));
}

#[tokio::test]
async fn test_create_runs_setup_scripts_over_ssh() {
    let h = Harness::new();
    assert_eq!(h.run(&["create"]).await, Response::Ok);

    let log = h.transport.log();
    let cloud = h.mock.snapshot().await;
    let eip = &cloud.eips["web-01"].ip;
    assert!(log.contains(&format!("connect alice@{}", eip)));

    let remote = h.remote();
    let ran = |command: &str| remote.iter().any(|r| r == command);
    assert!(ran("sudo /tmp/arc_setup.sh alice"));
    assert!(ran("sudo /tmp/setup_group.sh ops 5000"));
    assert!(ran("sudo /tmp/setup_user.sh alice 6001"));
    assert!(ran("sudo /tmp/setup_user.sh bob remove"));
    assert!(ran("sudo /tmp/set_hostname.sh web-01-internal.dev.example.com"));
    assert!(ran("sudo /tmp/setup_dhcp.sh dev.consul dev.example.com"));
    assert!(ran("sudo /tmp/setup_repos.sh disable"));
    assert!(ran("sudo /tmp/setup_volume.sh /dev/sdf /data xfs 0"));

    let staged = h.arc_dir().join("authorized_keys.alice");
    let copy = format!("copy {} /tmp/authorized_keys.alice", staged.display());
    assert!(log.contains(&copy));
    let keys = std::fs::read_to_string(staged).unwrap();
    assert_eq!(keys, "ssh-ed25519 AAAA alice\n");
}

#[tokio::test]
async fn test_second_create_changes_nothing() {
    let h = Harness::new();
    assert_eq!(h.run(&["create"]).await, Response::Ok);
    let before = h.calls().await.len();
    h.transport.clear();

    assert_eq!(h.run(&["create"]).await, Response::Ok);
    assert_eq!(h.calls().await.len(), before);
    assert!(h.transport.log().is_empty());
}

#[tokio::test]
async fn test_create_is_accounted() {
    let h = Harness::new();
    assert_eq!(h.run(&["create"]).await, Response::Ok);

    let entries = h.accounting.entries();
    let instance = entries
        .iter()
        .find(|e| e.kind == "Instance" && e.name == "web-01")
        .unwrap();
    assert_eq!(instance.verb, Verb::Create);
    assert_eq!(instance.user, "alice");
    assert_eq!(instance.datacenter, "dev");
    assert!(entries.iter().any(|e| e.kind == "Datacenter" && e.name == "dev"));
}

#[tokio::test]
async fn test_destroy_tears_everything_down() {
    let h = Harness::new();
    assert_eq!(h.run(&["create"]).await, Response::Ok);
    assert_eq!(h.run(&["destroy"]).await, Response::Ok);

    let calls = h.calls().await;
    let container = position(&calls, "destroy container ecs");
    let records = position(&calls, "delete record www.dev.example.com");
    let second = position(&calls, "terminate instance web-02");
    let first = position(&calls, "terminate instance web-01");
    let keypair = position(&calls, "destroy keypair alice");
    let rules = position(&calls, "destroy secgroup web rules_only");
    let group = position(&calls, "destroy secgroup web");
    let network = position(&calls, "destroy network dev");
    assert!(container < records && records < second && second < first);
    assert!(first < keypair && keypair < rules && rules < group && group < network);

    let remote = h.remote();
    assert!(remote.contains(&"sudo /tmp/stop_paging.sh".to_string()));
    assert!(remote.contains(&"sudo /tmp/unmount_volume.sh /data".to_string()));

    let cloud = h.mock.snapshot().await;
    assert!(cloud.instances.is_empty());
    assert!(cloud.volumes.is_empty());
    assert!(cloud.eips.is_empty());
    assert!(cloud.records.is_empty());
    assert!(cloud.networks.is_empty());
    assert!(cloud.subnets.is_empty());
    assert!(cloud.databases.is_empty());
}

#[tokio::test]
async fn test_destroy_instance_preserving_its_volume() {
    let h = Harness::new();
    assert_eq!(h.run(&["create"]).await, Response::Ok);
    assert_eq!(
        h.run(&["instance", "web-01", "destroy", "preserve_volume"]).await,
        Response::Ok
    );

    let calls = h.calls().await;
    assert!(calls.contains(&"detach volume web-01:/dev/sdf".to_string()));
    assert!(!calls.contains(&"destroy volume web-01:/dev/sdf".to_string()));
    assert!(calls.contains(&"release eip web-01".to_string()));

    let cloud = h.mock.snapshot().await;
    assert!(!cloud.instances.contains_key("web-01"));
    assert!(cloud.instances.contains_key("web-02"));
    assert_eq!(cloud.volumes["web-01:/dev/sdf"].attached_to, None);
    assert!(!cloud.volumes.contains_key("web-01:/dev/sda1"));
    assert!(!cloud.records.contains_key("web-01.dev.example.com"));
    assert!(!cloud.records.contains_key("web-01-internal.dev.example.com"));
}

#[tokio::test]
async fn test_destroying_twice_is_skipped() {
    let h = Harness::new();
    assert_eq!(h.run(&["create"]).await, Response::Ok);
    assert_eq!(h.run(&["instance", "web-02", "destroy"]).await, Response::Ok);
    let before = h.calls().await.len();

    assert_eq!(h.run(&["instance", "web-02", "destroy"]).await, Response::Ok);
    assert_eq!(h.calls().await.len(), before);
}

#[tokio::test]
async fn test_replace_keeps_volume_and_address() {
    let h = Harness::new();
    assert_eq!(h.run(&["create"]).await, Response::Ok);
    let before = h.mock.snapshot().await;
    h.transport.clear();

    assert_eq!(
        h.run(&["instance", "web-01", "replace", "noprovision"]).await,
        Response::Ok
    );

    let after = h.mock.snapshot().await;
    let old = &before.instances["web-01"];
    let new = &after.instances["web-01"];
    assert_ne!(old.id, new.id);

    let data = &after.volumes["web-01:/dev/sdf"];
    assert_eq!(data.id, before.volumes["web-01:/dev/sdf"].id);
    assert_eq!(data.attached_to.as_deref(), Some(new.id.as_str()));
    assert_eq!(after.eips["web-01"].ip, before.eips["web-01"].ip);
    assert_eq!(after.eips["web-01"].attached_to.as_deref(), Some(new.id.as_str()));
    assert_eq!(
        after.records["web-01-internal.dev.example.com"].values,
        vec![new.private_ip.clone()]
    );

    let remote = h.remote();
    let remount = "sudo /tmp/setup_volume.sh /dev/sdf /data xfs 0 skip_format";
    assert!(remote.iter().any(|c| c == remount));
    assert!(!remote.iter().any(|c| c.contains("puppet_apply")));
}

#[tokio::test]
async fn test_replace_provisions_with_restart() {
    let h = Harness::new();
    assert_eq!(h.run(&["create"]).await, Response::Ok);

    assert_eq!(h.run(&["instance", "web-01", "replace"]).await, Response::Ok);

    let calls = h.calls().await;
    assert!(calls.contains(&"restart instance web-01".to_string()));
    let remote = h.remote();
    assert!(remote.contains(&"sudo /tmp/update_software.sh".to_string()));
    assert_eq!(remote.last().map(String::as_str), Some("sudo /tmp/puppet_apply.sh aide"));
}

#[tokio::test]
async fn test_loaded_tree_reports_state() {
    let h = Harness::new();
    let mut app = h.app().await;
    assert_eq!(common::run(&mut app, &["load"]).await, Response::Ok);
    assert!(!app.datacenter().created());
    assert!(app.datacenter().destroyed());

    assert_eq!(h.run(&["create"]).await, Response::Ok);
    let mut app = h.app().await;
    assert_eq!(common::run(&mut app, &["load"]).await, Response::Ok);
    assert!(app.datacenter().created());
    assert!(!app.datacenter().destroyed());
}

#[tokio::test]
async fn test_create_single_security_group() {
    let h = Harness::new();
    assert_eq!(h.run(&["create"]).await, Response::Ok);
    h.mock
        .tamper(|cloud| {
            cloud.security_groups.remove("db");
        })
        .await;
    let before = h.calls().await.len();

    assert_eq!(h.run(&["secgroup", "db", "create"]).await, Response::Ok);
    assert_eq!(
        h.calls().await[before..],
        [
            "create secgroup db norules".to_string(),
            "provision secgroup db".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_replace_cluster_without_provisioning() {
    let h = Harness::new();
    assert_eq!(h.run(&["create"]).await, Response::Ok);
    let before = h.mock.snapshot().await;

    assert_eq!(
        h.run(&["cluster", "prod", "replace", "noprovision"]).await,
        Response::Ok
    );

    let after = h.mock.snapshot().await;
    for name in ["web-01", "web-02"] {
        assert_ne!(before.instances[name].id, after.instances[name].id);
        let device = format!("{}:/dev/sdf", name);
        assert_eq!(before.volumes[&device].id, after.volumes[&device].id);
    }
    assert!(!h.remote().iter().any(|c| c.contains("puppet_apply")));
}

#[tokio::test]
async fn test_destroy_instance_preserving_volume_and_address() {
    let h = Harness::new();
    assert_eq!(h.run(&["create"]).await, Response::Ok);
    let ip = h.mock.snapshot().await.eips["web-02"].ip.clone();

    assert_eq!(
        h.run(&["instance", "web-02", "destroy", "preserve_volume", "preserve_eip"])
            .await,
        Response::Ok
    );

    let cloud = h.mock.snapshot().await;
    assert!(!cloud.instances.contains_key("web-02"));
    assert_eq!(cloud.eips["web-02"].ip, ip);
    assert_eq!(cloud.eips["web-02"].attached_to, None);
    assert_eq!(cloud.volumes["web-02:/dev/sdf"].attached_to, None);
}

#[tokio::test]
async fn test_info_on_instance_record() {
    let h = Harness::new();
    assert_eq!(h.run(&["create"]).await, Response::Ok);
    let before = h.calls().await.len();

    assert_eq!(
        h.run(&["dns", "a", "web-01-internal", "info"]).await,
        Response::Ok
    );
    assert_eq!(
        h.run(&["dns", "a", "nowhere", "info"]).await,
        Response::Fail
    );
    assert_eq!(h.calls().await.len(), before);
}

#[tokio::test]
async fn test_destroy_after_cluster_destroy_removes_keypair() {
    let h = Harness::new();
    assert_eq!(h.run(&["create"]).await, Response::Ok);
    assert_eq!(h.run(&["cluster", "prod", "destroy"]).await, Response::Ok);

    let mut app = h.app().await;
    assert_eq!(common::run(&mut app, &["load"]).await, Response::Ok);
    assert!(!app.datacenter().compute().destroyed());
    assert!(!app.datacenter().destroyed());

    assert_eq!(h.run(&["destroy"]).await, Response::Ok);
    let cloud = h.mock.snapshot().await;
    assert!(cloud.keypairs.is_empty());
    assert!(cloud.networks.is_empty());
}

const BARE: &str = r#"
datacenter "dev" {
    provider "mock"
    network {
        cidr "10.0.0.0/16"
        availability-zones "us-east-1a"
        subnet-group "private" { cidr "10.0.10.0/24" }
    }
    compute { keypair "id_ed25519" }
}
dns {
    provider "mock"
    domain "example.com"
    subdomain "dev"
}
"#;

#[tokio::test]
async fn test_childless_composites_are_never_both_created_and_destroyed() {
    let h = Harness::new();
    let steps: [&[&str]; 3] = [&["load"], &["create"], &["destroy"]];
    for step in steps {
        let mut app = h.app_from(BARE).await;
        assert_eq!(common::run(&mut app, step).await, Response::Ok, "{:?}", step);
        assert_eq!(common::run(&mut app, &["load"]).await, Response::Ok);

        let dns = app.dns().unwrap();
        assert!(!dns.created(), "{:?}", step);
        assert!(dns.destroyed(), "{:?}", step);
        let compute = app.datacenter().compute();
        assert!(!(compute.created() && compute.destroyed()), "{:?}", step);
        let datacenter = app.datacenter();
        assert!(!(datacenter.created() && datacenter.destroyed()), "{:?}", step);
    }
}

#[tokio::test]
async fn test_create_in_test_mode_loads_without_writing() {
    let h = Harness::new();
    assert_eq!(h.run(&["create"]).await, Response::Ok);
    h.mock
        .tamper(|cloud| {
            if let Some(record) = cloud.records.get_mut("web-01-internal.dev.example.com") {
                record.values = vec!["10.9.9.9".to_string()];
            }
        })
        .await;
    let before = h.calls().await.len();
    h.transport.clear();

    let mut app = h.app().await;
    assert_eq!(common::run(&mut app, &["create", "test"]).await, Response::Ok);
    assert!(app.datacenter().created());
    assert_eq!(h.calls().await.len(), before);
    assert!(h.transport.log().is_empty());
    let cloud = h.mock.snapshot().await;
    assert_eq!(
        cloud.records["web-01-internal.dev.example.com"].values,
        vec!["10.9.9.9"]
    );
}
