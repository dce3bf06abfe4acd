//! Software provisioning and the power verbs

use super::Instance;
use super::create::NO_ARGS;
use super::users;
use crate::error::{CoreError, Result};
use crate::lifecycle::{Verb, drive};
use crate::msg;
use crate::resource::Resource;
use arc_cloud::{Command, InstanceProvider, ProviderResource, Request, Response, flag};

impl Instance {
    pub(super) async fn provision(&mut self, req: &Request) -> Result<()> {
        if req.has(flag::AIDE) {
            let mut batch = self.batch();
            batch.script("provision", "puppet_apply.sh", &["aide"]);
            return self.run_batch(&batch).await;
        }
        if req.has(flag::ROLE) {
            return self.attach_role().await;
        }
        if req.has(flag::USERS) {
            let mut batch = self.batch();
            users::configure(&mut batch, &self.rt.env, &self.config, &self.pod.teams).await?;
            batch.script("tools", "fix_arc_permissions.sh", NO_ARGS);
            return self.run_batch(&batch).await;
        }
        if req.has(flag::TAGS) {
            return self.apply_tags(req).await;
        }
        self.provision_software(req).await
    }

    async fn attach_role(&mut self) -> Result<()> {
        let Some(role) = &self.role else {
            msg::warn(format!("{} has no role", self.name));
            return Ok(());
        };
        self.provider.attach_role(role.name()).await?;
        msg::detail(format!("Attached role {} to {}", role.name(), self.name));
        Ok(())
    }

    /// Files listed in `packages-<version>.txt` next to the package
    async fn extra_packages(&self) -> Result<Vec<String>> {
        let env = &self.rt.env;
        let manifest = env.staged(&format!("packages-{}.txt", self.pod.version));
        if !tokio::fs::try_exists(&manifest).await? {
            return Ok(Vec::new());
        }
        let content = tokio::fs::read_to_string(&manifest).await?;
        let mut files = Vec::new();
        for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if !tokio::fs::try_exists(env.staged(line)).await? {
                return Err(CoreError::Config(format!(
                    "{} lists {}, which is not in {}",
                    manifest.display(),
                    line,
                    env.arc_dir.display()
                )));
            }
            files.push(line.to_string());
        }
        Ok(files)
    }

    async fn provision_software(&mut self, req: &Request) -> Result<()> {
        let env = &self.rt.env;
        let package = self.pod.package_file();
        let mut batch = self.batch();

        batch.script("provision", "install_hiera.sh", NO_ARGS);
        let pull = batch.lib_path("tools", "pull_package.sh");
        batch.local(&[
            pull.display().to_string(),
            package.clone(),
            env.arc_dir.display().to_string(),
        ]);
        let mut packages = vec![package];
        packages.extend(self.extra_packages().await?);
        for file in &packages {
            let remote = format!("/tmp/{}", file);
            batch.copy(env.staged(file), remote.clone());
            batch.script("provision", "install_package.sh", &[remote]);
        }

        if !req.has(flag::NOPUPPET) {
            batch.script("provision", "install_puppet.sh", NO_ARGS);
        }
        if !req.has(flag::BOOTSTRAP) {
            batch.script("provision", "install_certs.sh", NO_ARGS);
            batch.script("users", "setup_machine_user.sh", NO_ARGS);
        }
        batch.script("provision", "puppet_apply.sh", &[self.pod.server_type.as_str()]);

        let mut finish = self.batch();
        if req.has(flag::INITIAL) {
            batch.script("provision", "update_software.sh", NO_ARGS);
            self.run_batch(&batch).await?;
            msg::detail(format!("Restarting {} after initial provisioning", self.name));
            self.provider.restart(req).await?;
            self.wait_for("running", |p| p.started()).await?;
        } else {
            batch.script("paging", "start_paging.sh", NO_ARGS);
            self.run_batch(&batch).await?;
        }
        finish.script("provision", "puppet_apply.sh", &["aide"]);
        self.run_batch(&finish).await
    }

    pub(super) async fn start(&mut self, req: &Request) -> Result<()> {
        self.provider.start(req).await?;
        self.wait_for("running", |p| p.started()).await?;
        self.update_view();
        if !self.reconcile_records(req).await.is_ok() {
            return Err(CoreError::Incomplete(format!("DNS update of {}", self.name)));
        }
        Ok(())
    }

    pub(super) async fn stop(&mut self, req: &Request) -> Result<()> {
        if self.provider.started() {
            let mut batch = self.batch();
            batch.script("paging", "stop_paging.sh", NO_ARGS);
            self.run_batch(&batch).await?;
        }
        self.provider.stop(req).await?;
        self.wait_for("stopped", |p| p.stopped()).await
    }

    /// Hard restarts go through the provider, soft ones shut down from
    /// inside and start again
    pub(super) async fn restart(&mut self, req: &Request) -> Result<()> {
        if req.has(flag::HARD) {
            self.provider.restart(req).await?;
            return self.wait_for("running", |p| p.started()).await;
        }
        if self.provider.started() {
            let mut batch = self.batch();
            batch.sudo("/sbin/shutdown -h now");
            // the session drops while the machine goes down
            if let Err(e) = self.run_batch(&batch).await {
                tracing::debug!(instance = %self.name, error = %e, "shutdown session ended");
            }
            self.wait_for("stopped", |p| p.stopped()).await?;
        }
        self.start(req).await
    }

    /// Destroy keeping volumes and the elastic IP, create again, then
    /// provision unless told not to
    pub(super) async fn replace(&mut self, req: &Request) -> Response {
        let mut destroy = req
            .clone_with(Command::Destroy)
            .with_flag(flag::PRESERVE_VOLUME);
        if self.eip.is_some() {
            destroy = destroy.with_flag(flag::PRESERVE_EIP);
        }
        let response = drive(self, Verb::Destroy, &destroy).await;
        if !response.is_ok() {
            return response;
        }

        let create = destroy.clone_with(Command::Create);
        let response = drive(self, Verb::Create, &create).await;
        if !response.is_ok() || req.has(flag::NOPROVISION) {
            return response;
        }

        let provision = create
            .clone_with(Command::Provision)
            .without_flag(flag::PRESERVE_VOLUME)
            .without_flag(flag::PRESERVE_EIP)
            .with_flag(flag::INITIAL);
        let response = drive(self, Verb::Provision, &provision).await;
        self.update_view();
        if response.is_ok() {
            msg::detail(format!("{} replaced as {}", self.name, self.provider.id()));
        }
        response
    }
}
