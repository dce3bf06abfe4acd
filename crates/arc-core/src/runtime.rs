//! Collaborators shared by every resource of one run

use crate::aaa::{Aaa, AllowAll};
use crate::accounting::{Accounting, AuditBuffer, TracingAccounting};
use crate::compute::keypair::{AgentKeys, KeySource};
use crate::env::Env;
use crate::ssh::{OpenSsh, Transport};
use std::time::Duration;

/// Poll settings for instance state waits
#[derive(Debug, Clone, Copy)]
pub struct Timing {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(300),
        }
    }
}

pub struct Runtime {
    pub env: Env,
    pub aaa: Box<dyn Aaa>,
    pub accounting: Box<dyn Accounting>,
    pub audit: AuditBuffer,
    pub transport: Box<dyn Transport>,
    pub keys: Box<dyn KeySource>,
    pub timing: Timing,
}

impl Runtime {
    /// Production collaborators: allow-all authorization, tracing accounting,
    /// OpenSSH and the SSH agent
    pub fn new(env: Env) -> Self {
        let keys = AgentKeys::new(env.ssh_auth_sock.clone());
        Self {
            env,
            aaa: Box::new(AllowAll),
            accounting: Box::new(TracingAccounting),
            audit: AuditBuffer::default(),
            transport: Box::new(OpenSsh::default()),
            keys: Box::new(keys),
            timing: Timing::default(),
        }
    }

    pub fn with_aaa(mut self, aaa: impl Aaa + 'static) -> Self {
        self.aaa = Box::new(aaa);
        self
    }

    pub fn with_accounting(mut self, accounting: impl Accounting + 'static) -> Self {
        self.accounting = Box::new(accounting);
        self
    }

    pub fn with_transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Box::new(transport);
        self
    }

    pub fn with_keys(mut self, keys: impl KeySource + 'static) -> Self {
        self.keys = Box::new(keys);
        self
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }
}
