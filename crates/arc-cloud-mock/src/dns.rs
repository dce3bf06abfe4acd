//! DNS zone and record handles

use crate::cloud::RecordEntry;
use crate::shared::Shared;
use arc_cloud::{
    DnsRecordProvider, DnsZoneProvider, ProviderResource, RecordKind, RecordListing, RecordSpec,
    Request, Result, ZoneSpec,
};
use async_trait::async_trait;
use std::sync::Arc;

pub struct MockZone {
    shared: Arc<Shared>,
    spec: ZoneSpec,
}

impl MockZone {
    pub(crate) fn new(shared: Arc<Shared>, spec: ZoneSpec) -> Self {
        Self { shared, spec }
    }
}

#[async_trait]
impl DnsZoneProvider for MockZone {
    async fn records(&self) -> Result<Vec<RecordListing>> {
        let domain = &self.spec.domain;
        Ok(self.shared.read(|c| c.zone_records(domain)).await)
    }
}

pub struct MockRecord {
    shared: Arc<Shared>,
    spec: RecordSpec,
    record: Option<RecordEntry>,
}

impl MockRecord {
    pub(crate) fn new(shared: Arc<Shared>, spec: RecordSpec) -> Self {
        Self {
            shared,
            spec,
            record: None,
        }
    }
}

#[async_trait]
impl ProviderResource for MockRecord {
    fn id(&self) -> &str {
        self.record.as_ref().map(|r| r.id.as_str()).unwrap_or("")
    }

    async fn load(&mut self) -> Result<()> {
        let fqdn = &self.spec.fqdn;
        self.record = self.shared.read(|c| c.records.get(fqdn).cloned()).await;
        Ok(())
    }

    /// Creates or replaces the record with the desired values
    async fn create(&mut self, _req: &Request) -> Result<()> {
        let spec = self.spec.clone();
        self.shared
            .write(
                format!("upsert record {} {}", spec.fqdn, spec.values.join(",")),
                move |c| c.upsert_record(&spec),
            )
            .await?;
        self.load().await
    }

    async fn destroy(&mut self, _req: &Request) -> Result<()> {
        let fqdn = self.spec.fqdn.clone();
        self.shared
            .write(format!("delete record {}", fqdn), move |c| {
                c.delete_record(&fqdn)
            })
            .await?;
        self.record = None;
        Ok(())
    }

    fn info(&self) -> Vec<(String, String)> {
        vec![
            ("id".to_string(), self.id().to_string()),
            ("fqdn".to_string(), self.spec.fqdn.clone()),
            ("type".to_string(), self.spec.kind.to_string()),
            ("ttl".to_string(), self.ttl().to_string()),
            ("values".to_string(), self.values().join(", ")),
        ]
    }

    async fn audit(&mut self) -> Result<Vec<String>> {
        let mut findings = Vec::new();
        if let Some(r) = &self.record {
            if !self.spec.values.is_empty() && r.values != self.spec.values {
                findings.push(format!(
                    "values are {}, expected {}",
                    r.values.join(","),
                    self.spec.values.join(",")
                ));
            }
            if r.ttl != self.spec.ttl {
                findings.push(format!("ttl is {}, configured {}", r.ttl, self.spec.ttl));
            }
        }
        Ok(findings)
    }
}

impl DnsRecordProvider for MockRecord {
    fn kind(&self) -> RecordKind {
        self.spec.kind
    }

    fn values(&self) -> &[String] {
        self.record
            .as_ref()
            .map(|r| r.values.as_slice())
            .unwrap_or(&[])
    }

    fn ttl(&self) -> u32 {
        self.record.as_ref().map(|r| r.ttl).unwrap_or(self.spec.ttl)
    }

    fn set_values(&mut self, values: Vec<String>) {
        self.spec.values = values;
    }
}
