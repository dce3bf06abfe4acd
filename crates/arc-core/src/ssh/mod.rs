//! Remote execution
//!
//! A [`Transport`] opens one [`Session`] per instance; command [`Batch`]es run
//! over that session. [`OpenSsh`] drives the system `ssh`/`scp` binaries and
//! relies on the user's agent for authentication.

mod batch;

pub use batch::{Batch, Step};

use async_trait::async_trait;
use std::cell::{Cell, RefCell};
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

#[derive(Error, Debug)]
pub enum SshError {
    #[error("cannot connect to {target} after {attempts} attempts")]
    Connect { target: String, attempts: u32 },

    #[error("'{command}' failed ({status})\n{output}")]
    Exit {
        command: String,
        status: String,
        output: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SshError>;

#[async_trait(?Send)]
pub trait Session {
    /// Run a command and return its combined output
    async fn run(&mut self, command: &str) -> Result<String>;

    async fn copy(&mut self, local: &Path, remote: &str) -> Result<()>;
}

#[async_trait(?Send)]
pub trait Transport {
    async fn connect(&self, host: &str, user: &str) -> Result<Box<dyn Session>>;

    /// Run a command on this machine
    async fn local(&self, args: &[String]) -> Result<String>;
}

fn combined(output: &std::process::Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    text
}

async fn execute(program: &str, args: &[String], shown: String) -> Result<String> {
    let output = Command::new(program).args(args).output().await?;
    let text = combined(&output);
    if output.status.success() {
        Ok(text)
    } else {
        Err(SshError::Exit {
            command: shown,
            status: output.status.to_string(),
            output: text,
        })
    }
}

const SSH_OPTIONS: [&str; 6] = [
    "-o",
    "BatchMode=yes",
    "-o",
    "StrictHostKeyChecking=accept-new",
    "-o",
    "ConnectTimeout=5",
];

/// The system OpenSSH client
#[derive(Debug, Clone)]
pub struct OpenSsh {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for OpenSsh {
    fn default() -> Self {
        Self {
            attempts: 600,
            interval: Duration::from_secs(1),
        }
    }
}

#[async_trait(?Send)]
impl Transport for OpenSsh {
    async fn connect(&self, host: &str, user: &str) -> Result<Box<dyn Session>> {
        let target = format!("{}@{}", user, host);
        let mut args: Vec<String> = SSH_OPTIONS.iter().map(|s| s.to_string()).collect();
        args.push(target.clone());
        args.push("true".to_string());

        for attempt in 1..=self.attempts {
            match execute("ssh", &args, format!("ssh {}", target)).await {
                Ok(_) => {
                    tracing::debug!(host = %target, attempt, "ssh connected");
                    return Ok(Box::new(OpenSshSession { target }));
                }
                Err(e) => {
                    tracing::debug!(host = %target, attempt, error = %e, "ssh not ready");
                    tokio::time::sleep(self.interval).await;
                }
            }
        }
        Err(SshError::Connect {
            target,
            attempts: self.attempts,
        })
    }

    async fn local(&self, args: &[String]) -> Result<String> {
        let Some((program, rest)) = args.split_first() else {
            return Ok(String::new());
        };
        execute(program, rest, args.join(" ")).await
    }
}

struct OpenSshSession {
    target: String,
}

#[async_trait(?Send)]
impl Session for OpenSshSession {
    async fn run(&mut self, command: &str) -> Result<String> {
        let mut args: Vec<String> = SSH_OPTIONS.iter().map(|s| s.to_string()).collect();
        args.push(self.target.clone());
        args.push(command.to_string());
        execute("ssh", &args, command.to_string()).await
    }

    async fn copy(&mut self, local: &Path, remote: &str) -> Result<()> {
        let mut args: Vec<String> = SSH_OPTIONS.iter().map(|s| s.to_string()).collect();
        args.push(local.display().to_string());
        args.push(format!("{}:{}", self.target, remote));
        execute("scp", &args, format!("scp {} {}", local.display(), remote)).await?;
        Ok(())
    }
}

/// Records every step instead of executing it; clones share the log
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    log: Rc<RefCell<Vec<String>>>,
    fail_on: Rc<RefCell<Option<String>>>,
    refuse: Rc<Cell<bool>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> Vec<String> {
        self.log.borrow().clone()
    }

    pub fn clear(&self) {
        self.log.borrow_mut().clear();
    }

    /// Make every remote command containing `pattern` exit non-zero
    pub fn fail_on(&self, pattern: impl Into<String>) {
        *self.fail_on.borrow_mut() = Some(pattern.into());
    }

    pub fn refuse_connections(&self, refuse: bool) {
        self.refuse.set(refuse);
    }
}

#[async_trait(?Send)]
impl Transport for RecordingTransport {
    async fn connect(&self, host: &str, user: &str) -> Result<Box<dyn Session>> {
        let target = format!("{}@{}", user, host);
        self.log.borrow_mut().push(format!("connect {}", target));
        if self.refuse.get() {
            return Err(SshError::Connect {
                target,
                attempts: 1,
            });
        }
        Ok(Box::new(self.clone()))
    }

    async fn local(&self, args: &[String]) -> Result<String> {
        self.log
            .borrow_mut()
            .push(format!("local {}", args.join(" ")));
        Ok(String::new())
    }
}

#[async_trait(?Send)]
impl Session for RecordingTransport {
    async fn run(&mut self, command: &str) -> Result<String> {
        self.log.borrow_mut().push(format!("run {}", command));
        let failing = self
            .fail_on
            .borrow()
            .as_deref()
            .is_some_and(|p| command.contains(p));
        if failing {
            return Err(SshError::Exit {
                command: command.to_string(),
                status: "exit status: 1".to_string(),
                output: "simulated failure".to_string(),
            });
        }
        Ok(String::new())
    }

    async fn copy(&mut self, local: &Path, remote: &str) -> Result<()> {
        self.log
            .borrow_mut()
            .push(format!("copy {} {}", local.display(), remote));
        Ok(())
    }
}
