//! Help tables

use crate::msg;
use arc_cloud::HelpCommand;
use colored::Colorize;

pub type Table = &'static [(&'static str, &'static str)];

pub const ROOT: Table = &[
    ("network", "Network, subnet groups and security groups"),
    ("subnet <name>", "A subnet group or a single subnet"),
    ("secgroup <name>", "A security group"),
    ("compute", "Keypair and clusters"),
    ("keypair", "The user keypair"),
    ("cluster <name>", "A cluster and its pods"),
    ("pod <name>", "A pod and its instances"),
    ("instance <name>", "A single instance"),
    ("db <name>", "Database service"),
    ("dns", "DNS records"),
    ("container", "Container service"),
    ("config", "Print the configuration"),
    ("info", "Print provider state"),
    ("help", "Print this help"),
];

pub const VERBS: Table = &[
    ("create", "Create the resource and its children"),
    ("destroy", "Destroy the resource and its children"),
    ("provision", "Install software and configuration"),
    ("start", "Start instances"),
    ("stop", "Stop instances"),
    ("restart", "Restart instances (hard: provider restart)"),
    ("replace", "Destroy and create, preserving volumes and elastic IPs"),
    ("audit", "Compare the configuration with provider state"),
    ("info", "Print provider state"),
    ("config", "Print the configuration"),
];

pub const NETWORK: Table = &[
    ("subnet <name>", "A subnet group or a single subnet"),
    ("secgroup <name>", "A security group"),
    ("create [norules]", "Create the network, subnets and security groups"),
    ("destroy [rules_only]", "Destroy security groups, subnets and the network"),
    ("provision", "Install security group rules"),
];

pub const COMPUTE: Table = &[
    ("keypair", "The user keypair"),
    ("cluster <name>", "A cluster"),
    ("pod <name>", "A pod"),
    ("instance <name>", "An instance"),
];

pub const CLUSTER: Table = &[
    ("<pod>", "A pod of the cluster"),
    ("create [clusteronly]", "Create the pods of the cluster"),
];

pub const POD: Table = &[
    ("<instance>", "An instance of the pod"),
    ("create [podonly]", "Create the instances of the pod"),
];

pub const INSTANCE: Table = &[
    ("volume <device>", "A volume of the instance"),
    ("eip", "The elastic IP of the instance"),
    ("create [bootstrap]", "Create and set up the instance"),
    ("destroy [preserve_volume] [preserve_eip]", "Destroy the instance"),
    ("provision [aide|role|users|tags]", "Install software, or a single step"),
    ("provision [initial] [nopuppet]", "Full provision"),
    ("restart [hard]", "Restart the instance"),
    ("replace [noprovision]", "Replace the instance"),
];

pub const ATTACHMENT: Table = &[
    ("info", "Print provider state"),
    ("audit", "Compare the configuration with provider state"),
    ("config", "Print the configuration"),
];

pub const DNS: Table = &[
    ("a <name>", "An A record"),
    ("cname <name>", "A CNAME record"),
    ("provision [<instance>]", "Point CNAME records at another instance"),
];

pub const SERVICE: Table = &[
    ("<name>", "A database"),
    ("create", "Create the databases"),
    ("provision", "Apply configuration changes"),
    ("destroy", "Destroy the databases"),
];

/// Print a titled table followed by the common verbs it does not list
pub fn print(title: &str, table: Table) {
    print_with(title, table, &[]);
}

/// Print a table with provider published sub-verbs appended
pub fn print_with(title: &str, table: Table, vendor: &[HelpCommand]) {
    msg::message(format!("{}", title.bold()));
    let width = table
        .iter()
        .map(|(name, _)| name.len())
        .chain(vendor.iter().map(|c| c.name.len()))
        .chain(VERBS.iter().map(|(name, _)| name.len()))
        .max()
        .unwrap_or(0);
    let verbs = VERBS
        .iter()
        .filter(|(verb, _)| !table.iter().any(|(name, _)| name == verb));
    for (name, description) in table.iter().chain(verbs) {
        msg::message(format!("  {:width$}  {}", name, description, width = width));
    }
    for command in vendor {
        msg::message(format!(
            "  {:width$}  {}",
            command.name,
            command.description,
            width = width
        ));
    }
}
