//! Create, post-create setup and destroy of an instance

use super::{Instance, users};
use crate::error::{CoreError, Result};
use crate::msg;
use crate::resource::Resource;
use arc_cloud::{
    Command, ElasticIpProvider, InstanceProvider, ProviderResource, Request, VolumeProvider, flag,
};
use arc_config::Access;
use std::collections::BTreeMap;

const CREATED_BY: &str = "Created By";

impl Instance {
    pub(super) async fn create(&mut self, req: &Request) -> Result<()> {
        if let Some(role) = &mut self.role {
            role.provider.load().await?;
            if role.provider.destroyed() {
                role.provider.create(req).await?;
            }
        }

        self.provider.create(req).await?;
        let instance_id = self.provider.id().to_string();

        for volume in self.volumes.iter_mut() {
            volume.provider.load().await?;
            if volume.is_boot() {
                continue;
            }
            if volume.provider.destroyed() {
                volume.provider.create(req).await?;
            }
            if !volume.provider.attached() {
                volume.provider.attach(&instance_id).await?;
            }
        }

        if let Some(eip) = &mut self.eip {
            eip.provider.load().await?;
            if eip.provider.destroyed() {
                eip.provider.create(req).await?;
            }
            eip.provider.attach(&instance_id).await?;
        }

        if let Some(role) = &self.role {
            self.provider.attach_role(role.name()).await?;
        }

        self.provider.load().await?;
        self.update_view();
        Ok(())
    }

    /// Tags written on the instance and its volumes
    pub fn tags(&self, req: &Request) -> BTreeMap<String, String> {
        let existing = self.provider.tags();
        let mut tags = BTreeMap::new();
        tags.insert("Name".to_string(), self.name.clone());
        tags.insert(
            CREATED_BY.to_string(),
            existing
                .get(CREATED_BY)
                .cloned()
                .unwrap_or_else(|| req.user().to_string()),
        );
        tags.insert("Last Modified By".to_string(), req.user().to_string());
        tags.insert("Last Modified".to_string(), req.time().to_rfc3339());
        tags.insert("DataCenter".to_string(), req.datacenter().to_string());
        for (key, value) in &self.tags {
            tags.insert(key.clone(), value.clone());
        }
        tags
    }

    pub(super) async fn apply_tags(&mut self, req: &Request) -> Result<()> {
        let tags = self.tags(req);
        self.provider.set_tags(&tags).await?;
        for volume in self.volumes.iter_mut() {
            if volume.created() {
                volume.provider.set_tags(&tags).await?;
            }
        }
        msg::detail(format!("Tagged {}", self.name));
        Ok(())
    }

    /// Write the A records with the current addresses
    async fn publish(&mut self, req: &Request) -> Result<()> {
        self.link_records()?;
        let create = req
            .clone_with(Command::Create)
            .with_flag(flag::SKIP_CREATED_CHECK);
        for (record, address) in self.addresses() {
            let Some(address) = address else {
                continue;
            };
            record.lock().await.set_values(vec![address]);
            if !record.route(&create).await.is_ok() {
                return Err(CoreError::Incomplete(format!("DNS record {}", record.name())));
            }
        }
        Ok(())
    }

    async fn unpublish(&mut self, req: &Request) -> Result<()> {
        let destroy = req.clone_with(Command::Destroy);
        for (record, _) in self.addresses() {
            if !record.created() {
                continue;
            }
            if !record.route(&destroy).await.is_ok() {
                return Err(CoreError::Incomplete(format!("DNS record {}", record.name())));
            }
        }
        Ok(())
    }

    /// Tags, DNS, then one SSH session of setup scripts
    pub(super) async fn post_create(&mut self, req: &Request) -> Result<()> {
        self.apply_tags(req).await?;
        self.publish(req).await?;

        let bootstrap = req.has(flag::BOOTSTRAP);
        let mut batch = self.batch();
        batch.message(format!("Setting up {}", self.name));
        batch.script("create", "arc_setup.sh", &[self.rt.env.user.as_str()]);
        users::configure(&mut batch, &self.rt.env, &self.config, &self.pod.teams).await?;
        if !bootstrap {
            batch.script("tools", "fix_arc_permissions.sh", NO_ARGS);
        }
        batch.script(
            "create",
            "set_hostname.sh",
            &[self.fqdn(Access::Private)],
        );
        let consul = format!("{}.consul", req.datacenter());
        let domain = self.dns.get().map(|link| link.zone.clone()).unwrap_or_default();
        batch.script("create", "setup_dhcp.sh", &[consul, domain]);
        batch.script(
            "create",
            "setup_repos.sh",
            &[if bootstrap { "enable" } else { "disable" }],
        );

        let preserving = req.has(flag::PRESERVE_VOLUME);
        for volume in self.volumes.iter() {
            if volume.is_boot() {
                continue;
            }
            let skip_format = preserving && volume.preserved();
            batch.script("create", "setup_volume.sh", &volume.setup_args(skip_format));
        }

        self.run_batch(&batch).await
    }

    pub(super) async fn destroy(&mut self, req: &Request) -> Result<()> {
        let started = self.provider.started();
        if started {
            let mut batch = self.batch();
            batch.script("tools", "fix_arc_permissions.sh", NO_ARGS);
            batch.script("paging", "stop_paging.sh", NO_ARGS);
            self.run_batch(&batch).await?;
        } else {
            msg::warn(format!(
                "{} is {}, skipping remote cleanup",
                self.name,
                self.provider.state()
            ));
        }

        self.unpublish(req).await?;

        let preserve_volume = req.has(flag::PRESERVE_VOLUME);
        let mut unmount = self.batch();
        for volume in self.volumes.iter() {
            if volume.preserved() && !volume.is_boot() && volume.attached() {
                let mount_point = volume.config().mount_point.as_str();
                unmount.script("destroy", "unmount_volume.sh", &[mount_point]);
            }
        }
        if started && !unmount.is_empty() {
            self.run_batch(&unmount).await?;
        }

        for volume in self.volumes.iter_mut() {
            if !volume.preserved() || volume.is_boot() {
                volume.provider.reset();
                continue;
            }
            if volume.provider.destroyed() {
                continue;
            }
            if volume.provider.attached() {
                volume.provider.detach().await?;
            }
            if !preserve_volume {
                volume.provider.destroy(req).await?;
            }
        }

        if let Some(eip) = &mut self.eip {
            if eip.provider.attached() {
                eip.provider.detach().await?;
            }
            if !req.has(flag::PRESERVE_EIP) && eip.provider.created() {
                eip.provider.destroy(req).await?;
            }
        }

        self.provider.destroy(req).await?;
        self.update_view();
        Ok(())
    }
}

pub(super) const NO_ARGS: &[&str] = &[];

