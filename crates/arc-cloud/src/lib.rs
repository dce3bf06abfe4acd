//! arc cloud abstraction
//!
//! Value types for requests walking the resource tree, and the provider
//! surface concrete vendors implement.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                     arc CLI                      │
//! │          arc <dc> [path...] <verb> [flags]       │
//! └─────────────────┬───────────────────────────────┘
//!                   │ Request
//! ┌─────────────────▼───────────────────────────────┐
//! │                    arc-core                      │
//! │      resource tree, router, lifecycle driver     │
//! └─────────────────┬───────────────────────────────┘
//!                   │ Registry::get(vendor)
//! ┌─────────────────▼───────────────────────────────┐
//! │                    arc-cloud                     │
//! │  trait Provider -> factories -> resource handles │
//! └───────┬─────────────────────────────────────────┘
//!         │
//! ┌───────▼───────┐
//! │ arc-cloud-mock│
//! └───────────────┘
//! ```

pub mod error;
pub mod provider;
pub mod registry;
pub mod route;
pub mod spec;

// Re-exports
pub use error::{CloudError, Result};
pub use provider::{
    ContainerFactory, ContainerProvider, DatabaseFactory, DatabaseProvider, DatacenterFactory,
    DnsFactory, DnsRecordProvider, DnsZoneProvider, ElasticIpProvider, HelpCommand,
    InstanceProvider, InstanceState, KeyPairProvider, NetworkProvider, Provider,
    ProviderResource, RoleProvider, SecurityGroupProvider, Settings, SubnetProvider,
    VolumeProvider,
};
pub use registry::Registry;
pub use route::{Command, Flags, Path, Request, Response, flag};
pub use spec::{
    ContainerSpec, DatabaseSpec, ElasticIpSpec, InstanceSpec, KeyPairSpec, NetworkSpec,
    RecordKind, RecordListing, RecordSpec, ResourceKind, RoleSpec, RuleDirection, RulePeer,
    RuleSpec, SecurityGroupSpec, SubnetSpec, VolumeSpec, ZoneSpec,
};
