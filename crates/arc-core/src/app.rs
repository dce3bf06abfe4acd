//! Root of the resource tree
//!
//! Builds every subtree from the configuration, loads provider state before
//! a verb runs and routes the request to the addressed namespace.

use crate::container::ContainerService;
use crate::database::DatabaseService;
use crate::datacenter::{Datacenter, lookup};
use crate::dns::Dns;
use crate::error::{CoreError, Result};
use crate::factory::Factories;
use crate::help;
use crate::leaf;
use crate::msg;
use crate::resource::Resource;
use crate::runtime::Runtime;
use arc_cloud::{Command, Registry, Request, Response};
use arc_config::Config;
use std::cell::OnceCell;
use std::rc::Rc;

pub struct App {
    rt: Rc<Runtime>,
    config: Rc<Config>,
    datacenter: Datacenter,
    dns: Option<Dns>,
    database: Option<DatabaseService>,
    container: Option<ContainerService>,
    findings: Vec<String>,
}

impl App {
    pub async fn build(
        config: Config,
        rt: Rc<Runtime>,
        registry: &Registry,
        factories: &Factories,
    ) -> Result<Self> {
        let config = Rc::new(config);
        let link = Rc::new(OnceCell::new());
        let datacenter =
            Datacenter::build(rt.clone(), config.clone(), registry, factories, link.clone())
                .await?;

        // instances find the zone through the shared link once it exists
        let dns = match &config.dns {
            Some(dns) => {
                let factory = lookup(registry, &dns.provider.vendor)?.dns(&dns.provider.data)?;
                let dns = Dns::build(rt.clone(), factory, dns, datacenter.directory())?;
                if link.set(dns.link()).is_err() {
                    return Err(CoreError::Internal("DNS linked twice".to_string()));
                }
                Some(dns)
            }
            None => None,
        };

        let database = match &config.database {
            Some(db) => {
                let factory = lookup(registry, &db.provider.vendor)?.database(&db.provider.data)?;
                Some(DatabaseService::build(rt.clone(), factory, db)?)
            }
            None => None,
        };

        let container = match &config.container {
            Some(service) => {
                let factory =
                    lookup(registry, &service.provider.vendor)?.container(&service.provider.data)?;
                Some(ContainerService::build(
                    rt.clone(),
                    factory.as_ref(),
                    &config.name,
                    service,
                )?)
            }
            None => None,
        };

        tracing::info!(
            datacenter = %config.name,
            dns = dns.is_some(),
            database = database.is_some(),
            container = container.is_some(),
            "resource tree built"
        );

        Ok(Self {
            rt,
            config,
            datacenter,
            dns,
            database,
            container,
            findings: Vec::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn datacenter(&self) -> &Datacenter {
        &self.datacenter
    }

    pub fn dns(&self) -> Option<&Dns> {
        self.dns.as_ref()
    }

    /// Findings of the last audit
    pub fn findings(&self) -> &[String] {
        &self.findings
    }

    /// Every subtree, datacenter first
    fn subtrees(&mut self) -> Vec<&mut dyn Resource> {
        let mut out: Vec<&mut dyn Resource> = vec![&mut self.datacenter];
        if let Some(dns) = &mut self.dns {
            out.push(dns);
        }
        if let Some(db) = &mut self.database {
            out.push(db);
        }
        if let Some(container) = &mut self.container {
            out.push(container);
        }
        out
    }

    async fn route_each(&mut self, req: &Request, reverse: bool) -> Response {
        let mut subtrees = self.subtrees();
        if reverse {
            subtrees.reverse();
        }
        for subtree in subtrees {
            let response = subtree.route(&mut req.clone()).await;
            if !response.is_ok() {
                return response;
            }
        }
        Response::Ok
    }

    /// Pull provider state into the whole tree
    pub async fn load(&mut self, req: &Request) -> Response {
        self.route_each(&req.clone_with(Command::Load), false).await
    }

    fn needs_load(req: &Request) -> bool {
        !matches!(
            req.command(),
            Command::None | Command::Help | Command::Config | Command::Load
        )
    }

    /// Handle one request end to end
    pub async fn run(&mut self, req: &mut Request) -> Response {
        let audit = req.command() == Command::Audit;
        let response = self.dispatch(req).await;
        if audit {
            self.findings = self.rt.audit.flush();
        }
        response
    }

    async fn dispatch(&mut self, req: &mut Request) -> Response {
        if Self::needs_load(req) {
            let response = self.load(req).await;
            if !response.is_ok() {
                msg::error("Load failed");
                return response;
            }
        }

        if let Some(top) = req.top().map(str::to_string) {
            if Datacenter::routes(&top) {
                return self.datacenter.route(req).await;
            }
            return match top.as_str() {
                "dns" => match &mut self.dns {
                    Some(dns) => dns.route(req.pop()).await,
                    None => leaf::fail("No dns configured"),
                },
                "db" => match &mut self.database {
                    Some(db) => db.route(req.pop()).await,
                    None => leaf::fail("No database service configured"),
                },
                "container" => match &mut self.container {
                    Some(container) => container.route(req.pop()).await,
                    None => leaf::fail("No container service configured"),
                },
                _ => {
                    help::print("arc", help::ROOT);
                    leaf::fail(format!("Unknown command: {}", top))
                }
            };
        }

        match req.command() {
            Command::None | Command::Help => {
                help::print("arc", help::ROOT);
                Response::Ok
            }
            Command::Config => leaf::config(&*self.config),
            Command::Load => self.load(req).await,
            Command::Create | Command::Provision | Command::Audit | Command::Info => {
                self.route_each(req, false).await
            }
            Command::Destroy => self.route_each(req, true).await,
            Command::Start | Command::Stop | Command::Restart | Command::Replace => {
                self.datacenter.route(req).await
            }
        }
    }
}
