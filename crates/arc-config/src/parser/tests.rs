use super::*;
use crate::error::ConfigError;
use crate::model::{Access, Direction, Remote};
use crate::validate;

const FULL: &str = r#"
datacenter "dev" {
    provider "mock" { region "us-east-1" }
    security-tags { Owner "infra" }
    network {
        cidr "10.0.0.0/16"
        availability-zones "us-east-1a" "us-east-1b"
        cidr-aliases { office "192.168.10.0/24" }
        cidr-groups { trusted "office" "10.0.0.0/16" }
        subnet-group "public" { cidr "10.0.1.0/24"; access "public_elastic"; manage-routes }
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
            audit-ignore
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
                volume "/dev/sdf" { size 100; inodes 0; mount "/data"; preserve }
            }
        }
        cluster "tools" {
            pod "bastion" { subnet-group "public"; security-groups "ssh" }
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

#[test]
fn test_parse_full_document() {
    let config = parse_kdl_string(FULL, "dev").unwrap();
    validate(&config).unwrap();

    let dc = &config.datacenter;
    assert_eq!(dc.name, "dev");
    assert_eq!(dc.provider.vendor, "mock");
    assert_eq!(dc.provider.get("region"), Some("us-east-1"));
    assert_eq!(dc.security_tags.get("Owner").map(String::as_str), Some("infra"));

    let net = &dc.network;
    assert_eq!(net.cidr, "10.0.0.0/16");
    assert_eq!(net.availability_zones, vec!["us-east-1a", "us-east-1b"]);
    assert_eq!(net.subnet_groups.len(), 2);
    let public = net.subnet_group("public").unwrap();
    assert_eq!(public.access, Access::PublicElastic);
    assert!(public.manage_routes);
    assert_eq!(net.subnet_group("private").unwrap().access, Access::Private);

    let web = net.security_group("web").unwrap();
    assert_eq!(web.rules.len(), 2);
    assert_eq!(web.rules[0].direction, Direction::Ingress);
    assert_eq!(web.rules[0].ports, "80-443");
    assert_eq!(
        net.resolve_remote(&web.rules[1].remotes[0]),
        Some(vec![Remote::Group("ssh".to_string())])
    );
}

#[test]
fn test_parse_compute() {
    let config = parse_kdl_string(FULL, "dev").unwrap();
    let compute = &config.datacenter.compute;
    assert_eq!(compute.keypair, "id_ed25519");
    assert_eq!(compute.clusters.len(), 2);

    let prod = &compute.clusters[0];
    assert!(prod.audit_ignore);
    let web = &prod.pods[0];
    assert!(web.audit_ignore);
    assert_eq!(web.count, 2);
    assert_eq!(web.role.as_deref(), Some("web"));
    assert_eq!(web.security_groups, vec!["ssh", "web"]);
    assert_eq!(web.package_file(), "web-server-1.4.2.rpm");
    assert_eq!(web.volumes.len(), 2);
    assert_eq!(web.boot_volume().unwrap().device, "/dev/sda1");

    let data = &web.volumes[1];
    assert_eq!(data.mount_point, "/data");
    assert!(data.preserve);
    // defaults
    assert_eq!(data.fs, "xfs");
    assert_eq!(data.kind, "gp2");

    let bastion = &compute.clusters[1].pods[0];
    assert_eq!(bastion.server_type, "bastion");
    assert_eq!(bastion.count, 1);
    assert!(!bastion.audit_ignore);
}

#[test]
fn test_parse_services_and_users() {
    let config = parse_kdl_string(FULL, "dev").unwrap();

    let dns = config.dns.as_ref().unwrap();
    assert_eq!(dns.zone(), "dev.example.com");
    assert_eq!(dns.a_records[0].ttl, 60);
    // inherited from the zone
    assert_eq!(dns.cname_records[0].ttl, 300);
    assert_eq!(dns.cname_records[0].pod.as_deref(), Some("web"));
    assert_eq!(dns.cname_records[0].access, Access::Public);

    let db = config.database.as_ref().unwrap();
    assert_eq!(db.databases[0].engine, "postgres");
    assert_eq!(db.databases[0].storage, 100);

    let container = config.container.as_ref().unwrap();
    assert_eq!(container.name, "ecs");
    assert_eq!(container.provider.vendor, "mock");

    assert_eq!(config.groups[0].gid, 5000);
    let alice = config.user("alice").unwrap();
    assert_eq!(alice.uid, 6001);
    assert!(alice.sudo);
    assert_eq!(alice.keys.len(), 1);
    assert!(config.user("bob").unwrap().removed);
    assert_eq!(config.team("ops").unwrap().users, vec!["alice", "bob"]);
}

#[test]
fn test_missing_datacenter() {
    let result = parse_kdl_string("users { }", "dev");
    assert!(matches!(result, Err(ConfigError::Missing(_))));
}

#[test]
fn test_missing_keypair() {
    let kdl = r#"
datacenter {
    provider "mock"
    network { cidr "10.0.0.0/16" }
    compute { }
}
"#;
    match parse_kdl_string(kdl, "dev") {
        Err(ConfigError::Missing(what)) => assert!(what.contains("keypair")),
        other => panic!("unexpected: {:?}", other),
    }
}

#[test]
fn test_bad_rule_direction() {
    let kdl = FULL.replace(r#"rule "ingress" "tcp" "22""#, r#"rule "sideways" "tcp" "22""#);
    assert!(matches!(
        parse_kdl_string(&kdl, "dev"),
        Err(ConfigError::Invalid(_))
    ));
}

#[test]
fn test_syntax_error() {
    let result = parse_kdl_string("datacenter { provider", "dev");
    assert!(matches!(result, Err(ConfigError::KdlParse(_))));
}

#[test]
fn test_validate_rejects_bad_references() {
    let unknown_remote = FULL.replace(r#""5432" "web""#, r#""5432" "nobody""#);
    let config = parse_kdl_string(&unknown_remote, "dev").unwrap();
    assert!(matches!(
        validate(&config),
        Err(ConfigError::Unknown { kind: "rule remote", .. })
    ));

    let duplicate_pod = FULL.replace(r#"pod "bastion""#, r#"pod "web""#);
    let config = parse_kdl_string(&duplicate_pod, "dev").unwrap();
    assert!(matches!(
        validate(&config),
        Err(ConfigError::Duplicate { kind: "pod", .. })
    ));

    let two_boots = FULL.replace("mount \"/data\"; preserve", "mount \"/data\"; boot");
    let config = parse_kdl_string(&two_boots, "dev").unwrap();
    assert!(matches!(validate(&config), Err(ConfigError::Invalid(_))));

    let zero_count = FULL.replace("count 2", "count 0");
    let config = parse_kdl_string(&zero_count, "dev").unwrap();
    assert!(matches!(validate(&config), Err(ConfigError::Invalid(_))));

    let bad_cname = FULL.replace(r#"cname "www" { pod "web""#, r#"cname "www" { pod "api""#);
    let config = parse_kdl_string(&bad_cname, "dev").unwrap();
    assert!(matches!(
        validate(&config),
        Err(ConfigError::Unknown { kind: "pod", .. })
    ));

    let unknown_team = FULL.replace(r#"teams "ops""#, r#"teams "dev""#);
    let config = parse_kdl_string(&unknown_team, "dev").unwrap();
    assert!(matches!(
        validate(&config),
        Err(ConfigError::Unknown { kind: "team", .. })
    ));
}
