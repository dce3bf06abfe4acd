//! A and CNAME record leaves and the shared A record list

use crate::help;
use crate::leaf;
use crate::lifecycle::{Lifecycle, Verb, drive};
use crate::msg;
use crate::resource::Resource;
use crate::runtime::Runtime;
use arc_cloud::{Command, DnsRecordProvider, RecordKind, Request, Response, flag};
use arc_config::Access;
use async_trait::async_trait;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use tokio::sync::{Mutex, MutexGuard};

/// What an instance publishes about itself for CNAME selection
#[derive(Debug, Clone, Default)]
pub struct InstanceStatus {
    pub name: String,
    pub created: bool,
    pub private_host: String,
    pub public_host: Option<String>,
}

impl InstanceStatus {
    pub fn host(&self, access: Access) -> &str {
        match (&self.public_host, access.is_public()) {
            (Some(host), true) => host,
            _ => &self.private_host,
        }
    }
}

pub type InstanceView = Rc<RefCell<InstanceStatus>>;

/// Instances by pod, in pod order
pub type Directory = BTreeMap<String, Vec<InstanceView>>;

/// Where the values of a record come from
#[derive(Debug, Clone)]
pub enum Target {
    /// Configured values
    Static,
    /// Address of an instance, kept current by the instance
    Dynamic,
    /// FQDN of an instance of a pod
    Pod { pod: String, access: Access },
}

pub struct DnsRecord {
    rt: Rc<Runtime>,
    name: String,
    fqdn: String,
    zone: String,
    target: Target,
    directory: Rc<Directory>,
    provider: Box<dyn DnsRecordProvider>,
}

impl DnsRecord {
    pub fn new(
        rt: Rc<Runtime>,
        name: &str,
        zone: &str,
        target: Target,
        directory: Rc<Directory>,
        provider: Box<dyn DnsRecordProvider>,
    ) -> Self {
        Self {
            rt,
            name: name.to_string(),
            fqdn: format!("{}.{}", name, zone),
            zone: zone.to_string(),
            target,
            directory,
            provider,
        }
    }

    pub fn fqdn(&self) -> &str {
        &self.fqdn
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self.target, Target::Dynamic)
    }

    /// Values stored at the provider
    pub fn values(&self) -> &[String] {
        self.provider.values()
    }

    /// Values the next create writes
    pub fn set_values(&mut self, values: Vec<String>) {
        self.provider.set_values(values);
    }

    fn fqdn_of(&self, view: &InstanceStatus, access: Access) -> String {
        format!("{}.{}", view.host(access), self.zone)
    }

    fn created_instances(&self, pod: &str) -> Vec<InstanceStatus> {
        self.directory
            .get(pod)
            .map(|views| {
                views
                    .iter()
                    .map(|v| v.borrow().clone())
                    .filter(|v| v.created)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The created instance the record currently points at
    pub fn primary(&self) -> Option<InstanceStatus> {
        let Target::Pod { pod, access } = &self.target else {
            return None;
        };
        let values = self.provider.values();
        self.created_instances(pod)
            .into_iter()
            .find(|i| values.contains(&self.fqdn_of(i, *access)))
    }

    /// Created instances other than the primary, starting right after it
    pub fn secondaries(&self) -> Vec<InstanceStatus> {
        let Target::Pod { pod, access } = &self.target else {
            return Vec::new();
        };
        let created = self.created_instances(pod);
        if created.len() < 2 {
            return Vec::new();
        }
        let values = self.provider.values();
        let primary = created
            .iter()
            .position(|i| values.contains(&self.fqdn_of(i, *access)))
            .unwrap_or(0);
        let mut rotated = created;
        rotated.rotate_left(primary + 1);
        rotated.pop();
        rotated
    }

    /// First created instance of the pod
    fn first_created(&self, pod: &str, access: Access) -> Option<String> {
        self.created_instances(pod)
            .first()
            .map(|i| self.fqdn_of(i, access))
    }

    /// Instance named by a flag, else the first secondary
    fn reselect(&self, pod: &str, access: Access, req: &Request) -> Option<String> {
        let created = self.created_instances(pod);
        if let Some(named) = created
            .iter()
            .find(|i| req.flags().iter().any(|f| f == i.name))
        {
            return Some(self.fqdn_of(named, access));
        }
        self.secondaries()
            .first()
            .map(|i| self.fqdn_of(i, access))
    }

    async fn write(&mut self, verb: Verb, req: &Request) -> Response {
        match self.provider.create(req).await {
            Ok(()) => Response::Ok,
            Err(e) => leaf::fail(format!("DnsRecord {}: {} failed: {}", self.fqdn, verb, e)),
        }
    }
}

#[async_trait(?Send)]
impl Resource for DnsRecord {
    fn name(&self) -> &str {
        &self.name
    }

    fn created(&self) -> bool {
        self.provider.created()
    }

    fn destroyed(&self) -> bool {
        self.provider.destroyed()
    }

    async fn route(&mut self, req: &mut Request) -> Response {
        if req.top().is_some() {
            return leaf::unknown("DnsRecord", help::ATTACHMENT, &mut *self.provider, req).await;
        }
        let fqdn = self.fqdn.clone();
        match req.command() {
            Command::None | Command::Help => {
                help::print("DNS record", help::ATTACHMENT);
                Response::Ok
            }
            Command::Config => {
                msg::message(format!("{} {}", self.provider.kind(), fqdn));
                match &self.target {
                    Target::Pod { pod, access } => {
                        msg::message(format!("  pod: {} ({})", pod, access))
                    }
                    Target::Dynamic => msg::message("  dynamic"),
                    Target::Static => {}
                }
                Response::Ok
            }
            Command::Load => leaf::load("DnsRecord", &fqdn, &mut *self.provider).await,
            Command::Info => leaf::info("DnsRecord", &fqdn, &*self.provider),
            Command::Audit => leaf::audit(&self.rt, "DnsRecord", &fqdn, &mut *self.provider).await,
            command => match Verb::from_command(command) {
                Some(verb) => drive(self, verb, req).await,
                None => leaf::fail(format!("Unknown command: {}", command)),
            },
        }
    }
}

#[async_trait(?Send)]
impl Lifecycle for DnsRecord {
    fn kind(&self) -> &'static str {
        "DnsRecord"
    }

    fn runtime(&self) -> &Runtime {
        &self.rt
    }

    fn leaf(&self) -> bool {
        true
    }

    async fn run(&mut self, verb: Verb, req: &Request) -> Response {
        match verb {
            Verb::Create => {
                if let Target::Pod { pod, access } = self.target.clone() {
                    match self.first_created(&pod, access) {
                        Some(value) => self.set_values(vec![value]),
                        None => {
                            return leaf::fail(format!(
                                "CNAME {}: pod {} has no created instance",
                                self.fqdn, pod
                            ));
                        }
                    }
                }
                self.write(verb, req).await
            }
            Verb::Provision => {
                if let Target::Pod { pod, access } = self.target.clone() {
                    match self.reselect(&pod, access, req) {
                        Some(value) => {
                            msg::detail(format!("CNAME {} -> {}", self.fqdn, value));
                            self.set_values(vec![value]);
                        }
                        None => {
                            return leaf::fail(format!(
                                "CNAME {}: pod {} has no secondary instance",
                                self.fqdn, pod
                            ));
                        }
                    }
                }
                self.write(verb, req).await
            }
            Verb::Destroy => match self.provider.destroy(req).await {
                Ok(()) => Response::Ok,
                Err(e) => leaf::fail(format!("DnsRecord {}: destroy failed: {}", self.fqdn, e)),
            },
            other => leaf::fail(format!("DnsRecord {}: {} is not supported", self.fqdn, other)),
        }
    }
}

/// A record reachable both from the DNS subtree and from the instance that
/// keeps it current
#[derive(Clone)]
pub struct SharedRecord {
    name: Rc<str>,
    dynamic: bool,
    kind: RecordKind,
    inner: Rc<Mutex<DnsRecord>>,
}

impl SharedRecord {
    pub fn new(record: DnsRecord) -> Self {
        Self {
            name: Rc::from(record.name.as_str()),
            dynamic: record.is_dynamic(),
            kind: record.provider.kind(),
            inner: Rc::new(Mutex::new(record)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    /// False while the record is in use
    pub fn created(&self) -> bool {
        self.inner.try_lock().is_ok_and(|r| r.created())
    }

    pub fn destroyed(&self) -> bool {
        self.inner.try_lock().is_ok_and(|r| r.destroyed())
    }

    pub async fn lock(&self) -> MutexGuard<'_, DnsRecord> {
        self.inner.lock().await
    }

    /// Route a copy of `req` to the record
    pub async fn route(&self, req: &Request) -> Response {
        let mut child = req.clone();
        self.lock().await.route(&mut child).await
    }

    /// Point the record at `value`, rewriting it when it is stale
    pub async fn reconcile(&self, value: &str, req: &Request) -> Response {
        let mut record = self.lock().await;
        let stale = record.created() && record.values() != [value.to_string()];
        record.set_values(vec![value.to_string()]);
        if !stale {
            return Response::Ok;
        }
        msg::detail(format!("DNS {} is stale, updating to {}", record.fqdn(), value));
        let mut create = req
            .clone_with(Command::Create)
            .with_flag(flag::SKIP_CREATED_CHECK);
        record.route(&mut create).await
    }
}

/// The A records of the zone; instances append theirs during load
#[derive(Clone, Default)]
pub struct ARecords {
    records: Rc<RefCell<Vec<SharedRecord>>>,
}

impl ARecords {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, record: SharedRecord) {
        self.records.borrow_mut().push(record);
    }

    /// Register an instance record unless one of that name exists
    pub fn append_dynamic(&self, record: SharedRecord) {
        if self.find(record.name()).is_none() {
            self.push(record);
        }
    }

    pub fn find(&self, name: &str) -> Option<SharedRecord> {
        self.records
            .borrow()
            .iter()
            .find(|r| r.name() == name)
            .cloned()
    }

    /// Current records; the list may grow while a copy is in use
    pub fn list(&self) -> Vec<SharedRecord> {
        self.records.borrow().clone()
    }

    pub fn statics(&self) -> Vec<SharedRecord> {
        self.list().into_iter().filter(|r| !r.is_dynamic()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }
}
