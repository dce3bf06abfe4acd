//! Managed database service

use crate::error::Result;
use crate::help;
use crate::leaf;
use crate::lifecycle::{Lifecycle, Verb, drive};
use crate::resource::{Resource, Resources};
use crate::runtime::Runtime;
use arc_cloud::{
    Command, DatabaseFactory, DatabaseProvider, DatabaseSpec, ProviderResource, Request, Response,
};
use arc_config::{DatabaseConfig, DatabaseServiceConfig};
use async_trait::async_trait;
use std::rc::Rc;
use std::sync::Arc;

/// One database, holding its own provider handle
pub struct Database {
    rt: Rc<Runtime>,
    config: DatabaseConfig,
    provider: Box<dyn DatabaseProvider>,
}

impl Database {
    pub fn build(
        rt: Rc<Runtime>,
        factory: &dyn DatabaseFactory,
        config: &DatabaseConfig,
    ) -> Result<Self> {
        let provider = factory.database(&DatabaseSpec {
            name: config.name.clone(),
            engine: config.engine.clone(),
            version: config.version.clone(),
            instance_type: config.instance_type.clone(),
            storage: config.storage,
            subnet_group: config.subnet_group.clone(),
            security_groups: config.security_groups.clone(),
        })?;
        Ok(Self {
            rt,
            config: config.clone(),
            provider,
        })
    }
}

#[async_trait(?Send)]
impl Resource for Database {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn created(&self) -> bool {
        self.provider.created()
    }

    fn destroyed(&self) -> bool {
        self.provider.destroyed()
    }

    async fn route(&mut self, req: &mut Request) -> Response {
        if req.top().is_some() {
            return leaf::unknown("Database", help::ATTACHMENT, &mut *self.provider, req).await;
        }
        let name = self.config.name.clone();
        match req.command() {
            Command::None | Command::Help => {
                help::print_with("Database", help::ATTACHMENT, &self.provider.help_commands());
                Response::Ok
            }
            Command::Config => leaf::config(&self.config),
            Command::Load => leaf::load("Database", &name, &mut *self.provider).await,
            Command::Info => leaf::info("Database", &name, &*self.provider),
            Command::Audit => leaf::audit(&self.rt, "Database", &name, &mut *self.provider).await,
            command => match Verb::from_command(command) {
                Some(verb) => drive(self, verb, req).await,
                None => leaf::fail(format!("Unknown command: {}", command)),
            },
        }
    }
}

#[async_trait(?Send)]
impl Lifecycle for Database {
    fn kind(&self) -> &'static str {
        "Database"
    }

    fn runtime(&self) -> &Runtime {
        &self.rt
    }

    fn leaf(&self) -> bool {
        true
    }

    async fn run(&mut self, verb: Verb, req: &Request) -> Response {
        let name = self.config.name.clone();
        if verb != Verb::Provision {
            return leaf::run("Database", &name, &mut *self.provider, verb, req).await;
        }
        match self.provider.provision(req).await {
            Ok(()) => Response::Ok,
            Err(e) => leaf::fail(format!("Database {}: provision failed: {}", name, e)),
        }
    }
}

pub struct DatabaseService {
    rt: Rc<Runtime>,
    config: DatabaseServiceConfig,
    factory: Arc<dyn DatabaseFactory>,
    databases: Resources<Database>,
}

impl DatabaseService {
    pub fn build(
        rt: Rc<Runtime>,
        factory: Arc<dyn DatabaseFactory>,
        config: &DatabaseServiceConfig,
    ) -> Result<Self> {
        let mut databases = Resources::new();
        for db in &config.databases {
            databases.push(Database::build(rt.clone(), factory.as_ref(), db)?);
        }
        Ok(Self {
            rt,
            config: config.clone(),
            factory,
            databases,
        })
    }

    pub fn databases(&self) -> &Resources<Database> {
        &self.databases
    }

    async fn audit(&mut self, req: &Request) -> Response {
        let response = self.databases.route_in_order(req).await;
        if !response.is_ok() {
            return response;
        }
        match self.factory.inventory().await {
            Ok(names) => {
                for name in names {
                    if self.databases.get(&name).is_none() {
                        self.rt.audit.push(format!("database {}", name), "not configured");
                    }
                }
                Response::Ok
            }
            Err(e) => leaf::fail(format!("database inventory failed: {}", e)),
        }
    }
}

#[async_trait(?Send)]
impl Resource for DatabaseService {
    fn name(&self) -> &str {
        "db"
    }

    fn created(&self) -> bool {
        self.databases.created()
    }

    fn destroyed(&self) -> bool {
        self.databases.destroyed()
    }

    async fn route(&mut self, req: &mut Request) -> Response {
        if let Some(name) = req.top().map(str::to_string) {
            return match self.databases.get_mut(&name) {
                Some(db) => db.route(req.pop()).await,
                None => {
                    help::print("Database service", help::SERVICE);
                    leaf::fail(format!("Unknown database: {}", name))
                }
            };
        }
        match req.command() {
            Command::None | Command::Help => {
                help::print("Database service", help::SERVICE);
                Response::Ok
            }
            Command::Config => leaf::config(&self.config),
            Command::Load | Command::Info => self.databases.route_in_order(req).await,
            Command::Audit => self.audit(req).await,
            command => match Verb::from_command(command) {
                Some(verb) => drive(self, verb, req).await,
                None => leaf::fail(format!("Unknown command: {}", command)),
            },
        }
    }
}

#[async_trait(?Send)]
impl Lifecycle for DatabaseService {
    fn kind(&self) -> &'static str {
        "DatabaseService"
    }

    fn runtime(&self) -> &Runtime {
        &self.rt
    }

    async fn run(&mut self, verb: Verb, req: &Request) -> Response {
        let child = req.clone_with(verb.command());
        match verb {
            Verb::Create | Verb::Provision => self.databases.route_in_order(&child).await,
            Verb::Destroy => self.databases.route_reverse_order(&child).await,
            other => leaf::fail(format!("Database service: {} is not supported", other)),
        }
    }
}
