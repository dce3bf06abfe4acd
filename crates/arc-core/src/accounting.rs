//! Accounting of completed lifecycle verbs and the run-wide audit buffer

use crate::lifecycle::Verb;
use crate::msg;
use chrono::{DateTime, Utc};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub datacenter: String,
    pub user: String,
    pub time: DateTime<Utc>,
    pub verb: Verb,
    pub kind: &'static str,
    pub name: String,
}

pub trait Accounting {
    fn record(&self, entry: &Entry);
}

/// Emits one event per entry on the `arc::accounting` target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAccounting;

impl Accounting for TracingAccounting {
    fn record(&self, entry: &Entry) {
        tracing::info!(
            target: "arc::accounting",
            datacenter = %entry.datacenter,
            user = %entry.user,
            time = %entry.time.to_rfc3339(),
            verb = %entry.verb,
            kind = entry.kind,
            name = %entry.name,
            "verb completed"
        );
    }
}

/// Keeps entries in memory; clones share the same list
#[derive(Debug, Default, Clone)]
pub struct MemoryAccounting {
    entries: Rc<RefCell<Vec<Entry>>>,
}

impl MemoryAccounting {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<Entry> {
        self.entries.borrow().clone()
    }
}

impl Accounting for MemoryAccounting {
    fn record(&self, entry: &Entry) {
        self.entries.borrow_mut().push(entry.clone());
    }
}

/// Findings collected by `audit` and printed once routing is done
#[derive(Debug, Default)]
pub struct AuditBuffer {
    findings: RefCell<Vec<String>>,
}

impl AuditBuffer {
    pub fn push(&self, subject: impl std::fmt::Display, finding: impl std::fmt::Display) {
        self.findings
            .borrow_mut()
            .push(format!("{}: {}", subject, finding));
    }

    pub fn len(&self) -> usize {
        self.findings.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.borrow().is_empty()
    }

    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.findings.borrow_mut())
    }

    /// Print and clear, handing back what was printed
    pub fn flush(&self) -> Vec<String> {
        let findings = self.take();
        if findings.is_empty() {
            msg::info("Audit: no findings");
            return findings;
        }
        msg::info(format!("Audit: {} finding(s)", findings.len()));
        for finding in &findings {
            msg::warn(finding);
        }
        findings
    }
}
