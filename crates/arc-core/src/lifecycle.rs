//! Lifecycle driver shared by every resource that takes verbs
//!
//! [`drive`] wraps a verb in the common envelope: banner, state check, test
//! short-circuit for leaves, then `pre`, `run` and `post`, and finally the
//! completion line and an accounting entry. Resources only supply the hooks.

use crate::accounting::Entry;
use crate::msg;
use crate::resource::Resource;
use crate::runtime::Runtime;
use arc_cloud::{Command, Request, Response, flag};
use async_trait::async_trait;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Create,
    Destroy,
    Provision,
    Start,
    Stop,
    Restart,
    Replace,
}

impl Verb {
    pub fn from_command(command: Command) -> Option<Verb> {
        match command {
            Command::Create => Some(Verb::Create),
            Command::Destroy => Some(Verb::Destroy),
            Command::Provision => Some(Verb::Provision),
            Command::Start => Some(Verb::Start),
            Command::Stop => Some(Verb::Stop),
            Command::Restart => Some(Verb::Restart),
            Command::Replace => Some(Verb::Replace),
            _ => None,
        }
    }

    pub fn command(&self) -> Command {
        match self {
            Verb::Create => Command::Create,
            Verb::Destroy => Command::Destroy,
            Verb::Provision => Command::Provision,
            Verb::Start => Command::Start,
            Verb::Stop => Command::Stop,
            Verb::Restart => Command::Restart,
            Verb::Replace => Command::Replace,
        }
    }

    pub fn past(&self) -> &'static str {
        match self {
            Verb::Create => "Created",
            Verb::Destroy => "Destroyed",
            Verb::Provision => "Provisioned",
            Verb::Start => "Started",
            Verb::Stop => "Stopped",
            Verb::Restart => "Restarted",
            Verb::Replace => "Replaced",
        }
    }

    /// Verbs whose children run last to first
    pub fn is_reverse(&self) -> bool {
        matches!(self, Verb::Destroy | Verb::Stop)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verb::Create => "Create",
            Verb::Destroy => "Destroy",
            Verb::Provision => "Provision",
            Verb::Start => "Start",
            Verb::Stop => "Stop",
            Verb::Restart => "Restart",
            Verb::Replace => "Replace",
        };
        write!(f, "{}", s)
    }
}

#[async_trait(?Send)]
pub trait Lifecycle: Resource {
    /// Type name used in progress lines ("Instance", "Pod", ...)
    fn kind(&self) -> &'static str;

    fn runtime(&self) -> &Runtime;

    /// Flag that forces `create` of an already created composite
    fn scope_flag(&self) -> Option<&'static str> {
        None
    }

    /// Leaves honor the `test` flag
    fn leaf(&self) -> bool {
        false
    }

    async fn pre(&mut self, _verb: Verb, _req: &Request) -> Response {
        Response::Ok
    }

    async fn run(&mut self, verb: Verb, req: &Request) -> Response;

    async fn post(&mut self, _verb: Verb, _req: &Request) -> Response {
        Response::Ok
    }
}

fn skip_reason<T: Lifecycle + ?Sized>(target: &T, verb: Verb, req: &Request) -> Option<&'static str> {
    match verb {
        Verb::Create => {
            let forced = req.has(flag::SKIP_CREATED_CHECK)
                || target.scope_flag().is_some_and(|f| req.has(f));
            (target.created() && !forced).then_some("already created")
        }
        _ => target.destroyed().then_some("already destroyed"),
    }
}

/// Run `verb` on `target` inside the common envelope
pub async fn drive<T: Lifecycle + ?Sized>(target: &mut T, verb: Verb, req: &Request) -> Response {
    let kind = target.kind();
    let name = target.name().to_string();
    msg::info(format!("{} {}: {}", kind, verb, name));

    if let Some(reason) = skip_reason(target, verb, req) {
        msg::detail(format!("{} {} {}. Skipping...", kind, name, reason));
        return Response::Ok;
    }

    if target.leaf() && req.has(flag::TEST) {
        msg::detail("Test. Skipping...");
        return Response::Ok;
    }

    match target.pre(verb, req).await {
        Response::Ok | Response::Continue => {}
        other => return other,
    }

    let response = target.run(verb, req).await;
    if !response.is_ok() {
        return response;
    }

    let response = target.post(verb, req).await;
    if !response.is_ok() {
        return response;
    }

    msg::detail(format!("{} {}: {}", kind, verb.past(), name));
    target.runtime().accounting.record(&Entry {
        datacenter: req.datacenter().to_string(),
        user: req.user().to_string(),
        time: req.time(),
        verb,
        kind,
        name,
    });
    Response::Ok
}
