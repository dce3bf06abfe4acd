//! Resource tree engine for arc
//!
//! Builds the datacenter resource tree from an [`arc_config::Config`],
//! routes [`arc_cloud::Request`]s through it and drives the create, destroy,
//! provision and power lifecycles of every resource. Vendors are reached only
//! through the factories of an [`arc_cloud::Registry`].

pub mod aaa;
pub mod accounting;
pub mod app;
pub mod compute;
pub mod container;
pub mod database;
pub mod datacenter;
pub mod dns;
pub mod env;
pub mod error;
pub mod factory;
pub mod help;
pub mod leaf;
pub mod lifecycle;
pub mod msg;
pub mod network;
pub mod resource;
pub mod runtime;
pub mod ssh;

pub use aaa::{Aaa, AllowAll, DenyScopes, Scope};
pub use accounting::{Accounting, Entry, MemoryAccounting, TracingAccounting};
pub use app::App;
pub use compute::keypair::{AgentKeys, KeySource, StaticKeys};
pub use env::Env;
pub use error::{CoreError, Result};
pub use factory::{ClusterHooks, DefaultHooks, Factories, InstanceHooks, PodHooks};
pub use lifecycle::Verb;
pub use runtime::{Runtime, Timing};
pub use ssh::{OpenSsh, RecordingTransport, Transport};
