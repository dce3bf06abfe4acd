//! DNS subtree: static A records, instance A records and CNAMEs

pub mod record;

use crate::error::Result;
use crate::help;
use crate::leaf;
use crate::lifecycle::{Lifecycle, Verb, drive};
use crate::msg;
use crate::resource::{Resource, Resources};
use crate::runtime::Runtime;
use arc_cloud::{
    Command, DnsFactory, DnsZoneProvider, RecordKind, RecordSpec, Request, Response, ZoneSpec,
};
use arc_config::{DnsConfig, RecordConfig};
use async_trait::async_trait;
use record::{ARecords, Directory, DnsRecord, SharedRecord, Target};
use std::rc::Rc;
use std::sync::Arc;

/// What an instance needs to publish its own A records
#[derive(Clone)]
pub struct DnsLink {
    pub zone: String,
    pub ttl: u32,
    pub factory: Arc<dyn DnsFactory>,
    pub records: ARecords,
    pub directory: Rc<Directory>,
}

impl DnsLink {
    /// A dynamic A record for `host`, not yet registered
    pub fn record(&self, rt: Rc<Runtime>, host: &str) -> Result<DnsRecord> {
        let provider = self.factory.record(&RecordSpec {
            zone: self.zone.clone(),
            fqdn: format!("{}.{}", host, self.zone),
            kind: RecordKind::A,
            ttl: self.ttl,
            values: Vec::new(),
        })?;
        Ok(DnsRecord::new(
            rt,
            host,
            &self.zone,
            Target::Dynamic,
            self.directory.clone(),
            provider,
        ))
    }
}

pub struct Dns {
    rt: Rc<Runtime>,
    config: DnsConfig,
    zone: String,
    factory: Arc<dyn DnsFactory>,
    zone_provider: Box<dyn DnsZoneProvider>,
    a_records: ARecords,
    cnames: Resources<DnsRecord>,
    directory: Rc<Directory>,
}

impl Dns {
    pub fn build(
        rt: Rc<Runtime>,
        factory: Arc<dyn DnsFactory>,
        config: &DnsConfig,
        directory: Directory,
    ) -> Result<Self> {
        let zone = config.zone();
        let directory = Rc::new(directory);
        let zone_provider = factory.zone(&ZoneSpec {
            domain: zone.clone(),
        })?;

        let a_records = ARecords::new();
        for a in &config.a_records {
            let record = Self::record(
                &rt,
                &factory,
                config,
                &zone,
                a,
                RecordKind::A,
                Target::Static,
                &directory,
            )?;
            a_records.push(SharedRecord::new(record));
        }

        let mut cnames = Resources::new();
        for c in &config.cname_records {
            let target = match &c.pod {
                Some(pod) => Target::Pod {
                    pod: pod.clone(),
                    access: c.access,
                },
                None => Target::Static,
            };
            cnames.push(Self::record(
                &rt,
                &factory,
                config,
                &zone,
                c,
                RecordKind::Cname,
                target,
                &directory,
            )?);
        }

        Ok(Self {
            rt,
            config: config.clone(),
            zone,
            factory,
            zone_provider,
            a_records,
            cnames,
            directory,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn record(
        rt: &Rc<Runtime>,
        factory: &Arc<dyn DnsFactory>,
        config: &DnsConfig,
        zone: &str,
        record: &RecordConfig,
        kind: RecordKind,
        target: Target,
        directory: &Rc<Directory>,
    ) -> Result<DnsRecord> {
        let ttl = if record.ttl > 0 { record.ttl } else { config.ttl };
        let provider = factory.record(&RecordSpec {
            zone: zone.to_string(),
            fqdn: format!("{}.{}", record.name, zone),
            kind,
            ttl,
            values: record.values.clone(),
        })?;
        Ok(DnsRecord::new(
            rt.clone(),
            &record.name,
            zone,
            target,
            directory.clone(),
            provider,
        ))
    }

    /// Handle instances use to publish their records
    pub fn link(&self) -> DnsLink {
        DnsLink {
            zone: self.zone.clone(),
            ttl: self.config.ttl,
            factory: self.factory.clone(),
            records: self.a_records.clone(),
            directory: self.directory.clone(),
        }
    }

    pub fn zone(&self) -> &str {
        &self.zone
    }

    pub fn a_records(&self) -> &ARecords {
        &self.a_records
    }

    async fn route_a(&mut self, req: &mut Request) -> Response {
        let Some(name) = req.top().map(str::to_string) else {
            help::print("DNS", help::DNS);
            return Response::Ok;
        };
        match self.a_records.find(&name) {
            Some(record) => {
                req.pop();
                record.lock().await.route(req).await
            }
            None => {
                help::print("DNS", help::DNS);
                leaf::fail(format!("Unknown A record: {}", name))
            }
        }
    }

    async fn route_cname(&mut self, req: &mut Request) -> Response {
        let Some(name) = req.top().map(str::to_string) else {
            help::print("DNS", help::DNS);
            return Response::Ok;
        };
        match self.cnames.get_mut(&name) {
            Some(record) => record.route(req.pop()).await,
            None => {
                help::print("DNS", help::DNS);
                leaf::fail(format!("Unknown CNAME record: {}", name))
            }
        }
    }

    async fn route_records(records: &[SharedRecord], req: &Request, reverse: bool) -> Response {
        let ordered: Vec<&SharedRecord> = if reverse {
            records.iter().rev().collect()
        } else {
            records.iter().collect()
        };
        for record in ordered {
            let response = record.route(req).await;
            if !response.is_ok() {
                return response;
            }
        }
        Response::Ok
    }

    /// Every A record, then every CNAME
    async fn route_all(&mut self, req: &Request) -> Response {
        let response = Self::route_records(&self.a_records.list(), req, false).await;
        if !response.is_ok() {
            return response;
        }
        self.cnames.route_in_order(req).await
    }

    async fn audit(&mut self, req: &Request) -> Response {
        // instance records of instances that do not exist are not findings
        let records: Vec<SharedRecord> = self
            .a_records
            .list()
            .into_iter()
            .filter(|r| !(r.is_dynamic() && r.destroyed()))
            .collect();
        let response = Self::route_records(&records, req, false).await;
        if !response.is_ok() {
            return response;
        }
        let response = self.cnames.route_in_order(req).await;
        if !response.is_ok() {
            return response;
        }

        let mut expected = Vec::new();
        for record in self.a_records.list() {
            expected.push(record.lock().await.fqdn().to_string());
        }
        expected.extend(self.cnames.iter().map(|r| r.fqdn().to_string()));

        match self.zone_provider.records().await {
            Ok(listing) => {
                for entry in listing {
                    if !expected.contains(&entry.fqdn) {
                        self.rt
                            .audit
                            .push(format!("dns {} {}", entry.kind, entry.fqdn), "not configured");
                    }
                }
                Response::Ok
            }
            Err(e) => leaf::fail(format!("DNS {}: audit failed: {}", self.zone, e)),
        }
    }

    fn statics_created(&self) -> bool {
        self.a_records
            .statics()
            .iter()
            .all(|r| r.created())
    }
}

#[async_trait(?Send)]
impl Resource for Dns {
    fn name(&self) -> &str {
        &self.zone
    }

    fn created(&self) -> bool {
        if self.a_records.statics().is_empty() && self.cnames.is_empty() {
            return false;
        }
        self.statics_created() && self.cnames.iter().all(|r| r.created())
    }

    fn destroyed(&self) -> bool {
        self.a_records
            .statics()
            .iter()
            .all(|r| r.destroyed())
            && self.cnames.destroyed()
    }

    async fn route(&mut self, req: &mut Request) -> Response {
        if let Some(top) = req.top().map(str::to_string) {
            return match top.as_str() {
                "a" => self.route_a(req.pop()).await,
                "cname" => self.route_cname(req.pop()).await,
                _ => {
                    help::print("DNS", help::DNS);
                    leaf::fail(format!("Unknown dns command: {}", top))
                }
            };
        }
        match req.command() {
            Command::None | Command::Help => {
                help::print("DNS", help::DNS);
                Response::Ok
            }
            Command::Config => leaf::config(&self.config),
            Command::Load | Command::Info => self.route_all(req).await,
            Command::Audit => self.audit(req).await,
            command => match Verb::from_command(command) {
                Some(verb) => drive(self, verb, req).await,
                None => leaf::fail(format!("Unknown command: {}", command)),
            },
        }
    }
}

#[async_trait(?Send)]
impl Lifecycle for Dns {
    fn kind(&self) -> &'static str {
        "Dns"
    }

    fn runtime(&self) -> &Runtime {
        &self.rt
    }

    async fn run(&mut self, verb: Verb, req: &Request) -> Response {
        let child = req.clone_with(verb.command());
        let statics = self.a_records.statics();
        match verb {
            Verb::Create | Verb::Provision => {
                let response = Self::route_records(&statics, &child, false).await;
                if !response.is_ok() {
                    return response;
                }
                self.cnames.route_in_order(&child).await
            }
            Verb::Destroy => {
                let response = self.cnames.route_reverse_order(&child).await;
                if !response.is_ok() {
                    return response;
                }
                Self::route_records(&statics, &child, true).await
            }
            other => {
                msg::error(format!("DNS {}: {} is not supported", self.zone, other));
                Response::Fail
            }
        }
    }
}
