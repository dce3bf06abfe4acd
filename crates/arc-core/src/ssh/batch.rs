use super::{Result, Session, Transport};
use crate::env::Env;
use crate::msg;
use std::path::PathBuf;

/// One step of a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Run on this machine
    Local(Vec<String>),
    Copy { local: PathBuf, remote: String },
    Remote(String),
    Sudo(String),
    /// Printed even while the batch keeps the console quiet
    Message(String),
}

/// Ordered steps sharing one connection to an instance
#[derive(Debug, Clone)]
pub struct Batch {
    lib: PathBuf,
    steps: Vec<Step>,
    has_script: bool,
}

impl Batch {
    pub fn new(env: &Env) -> Self {
        Self {
            lib: env.lib_dir(),
            steps: Vec::new(),
            has_script: false,
        }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn local<S: AsRef<str>>(&mut self, args: &[S]) -> &mut Self {
        self.steps.push(Step::Local(
            args.iter().map(|a| a.as_ref().to_string()).collect(),
        ));
        self
    }

    pub fn copy(&mut self, local: impl Into<PathBuf>, remote: impl Into<String>) -> &mut Self {
        self.steps.push(Step::Copy {
            local: local.into(),
            remote: remote.into(),
        });
        self
    }

    pub fn remote(&mut self, command: impl Into<String>) -> &mut Self {
        self.steps.push(Step::Remote(command.into()));
        self
    }

    pub fn sudo(&mut self, command: impl Into<String>) -> &mut Self {
        self.steps.push(Step::Sudo(command.into()));
        self
    }

    pub fn message(&mut self, text: impl Into<String>) -> &mut Self {
        self.steps.push(Step::Message(text.into()));
        self
    }

    /// Copy `<lib>/<dir>/<name>` to `/tmp/<name>` and run it with sudo.
    ///
    /// The first script of a batch also puts the support library in place.
    pub fn script<S: AsRef<str>>(&mut self, dir: &str, name: &str, args: &[S]) -> &mut Self {
        if !self.has_script {
            self.has_script = true;
            self.steps.insert(
                0,
                Step::Copy {
                    local: self.lib.join("arc.sh"),
                    remote: "/tmp/arc.sh".to_string(),
                },
            );
        }
        let remote = format!("/tmp/{}", name);
        let mut command = remote.clone();
        for arg in args {
            command.push(' ');
            command.push_str(arg.as_ref());
        }
        self.copy(self.lib.join(dir).join(name), remote);
        self.sudo(command)
    }

    /// Path of a bundled script, for local steps
    pub fn lib_path(&self, dir: &str, name: &str) -> PathBuf {
        self.lib.join(dir).join(name)
    }

    fn needs_connection(&self) -> bool {
        self.steps.iter().any(|s| {
            matches!(
                s,
                Step::Copy { .. } | Step::Remote(_) | Step::Sudo(_)
            )
        })
    }

    /// Run every step in order, stopping at the first failure
    pub async fn run(&self, transport: &dyn Transport, host: &str, user: &str) -> Result<()> {
        let _quiet = msg::QuietGuard::new();

        let mut session: Option<Box<dyn Session>> = None;
        if self.needs_connection() {
            session = Some(transport.connect(host, user).await?);
        }

        for step in &self.steps {
            tracing::debug!(host, step = ?step, "batch step");
            match (step, session.as_mut()) {
                (Step::Local(args), _) => {
                    let out = transport.local(args).await?;
                    msg::detail(out.trim_end());
                }
                (Step::Copy { local, remote }, Some(s)) => s.copy(local, remote).await?,
                (Step::Remote(command), Some(s)) => {
                    let out = s.run(command).await?;
                    msg::detail(out.trim_end());
                }
                (Step::Sudo(command), Some(s)) => {
                    let out = s.run(&format!("sudo {}", command)).await?;
                    msg::detail(out.trim_end());
                }
                (Step::Message(text), _) => msg::message(text),
                (_, None) => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssh::RecordingTransport;

    fn env() -> Env {
        Env {
            root: PathBuf::from("/r"),
            ..Default::default()
        }
    }

    #[test]
    fn test_script_copies_library_first() {
        let mut batch = Batch::new(&env());
        batch.message("setting up");
        batch.script("create", "set_hostname.sh", &["web-01-internal.dev.example.com"]);
        batch.script("create", "setup_repos.sh", &["disable"]);

        assert_eq!(
            batch.steps()[0],
            Step::Copy {
                local: PathBuf::from("/r/usr/lib/arc/arc.sh"),
                remote: "/tmp/arc.sh".to_string()
            }
        );
        let library_copies = batch
            .steps()
            .iter()
            .filter(|s| matches!(s, Step::Copy { remote, .. } if remote == "/tmp/arc.sh"))
            .count();
        assert_eq!(library_copies, 1);
        assert_eq!(
            batch.steps().last(),
            Some(&Step::Sudo("/tmp/setup_repos.sh disable".to_string()))
        );
    }

    #[tokio::test]
    async fn test_run_records_steps_in_order() {
        let transport = RecordingTransport::new();
        let mut batch = Batch::new(&env());
        batch.local(&["echo", "hi"]);
        batch.script("users", "setup_ssh.sh", &["alice"]);

        batch.run(&transport, "10.0.1.5", "alice").await.unwrap();

        assert_eq!(
            transport.log(),
            vec![
                "connect alice@10.0.1.5",
                "copy /r/usr/lib/arc/arc.sh /tmp/arc.sh",
                "local echo hi",
                "copy /r/usr/lib/arc/users/setup_ssh.sh /tmp/setup_ssh.sh",
                "run sudo /tmp/setup_ssh.sh alice",
            ]
        );
    }

    #[tokio::test]
    async fn test_local_only_batch_does_not_connect() {
        let transport = RecordingTransport::new();
        let mut batch = Batch::new(&env());
        batch.local(&["true"]);
        batch.run(&transport, "", "alice").await.unwrap();
        assert_eq!(transport.log(), vec!["local true"]);
    }

    #[tokio::test]
    async fn test_failure_stops_the_batch() {
        let transport = RecordingTransport::new();
        transport.fail_on("setup_user.sh");
        let mut batch = Batch::new(&env());
        batch.script("users", "setup_user.sh", &["alice", "6001"]);
        batch.script("users", "setup_ssh.sh", &["alice"]);

        let err = batch.run(&transport, "10.0.1.5", "alice").await.unwrap_err();
        assert!(err.to_string().contains("simulated failure"));
        assert!(!transport.log().iter().any(|l| l.contains("setup_ssh.sh alice")));
    }
}
