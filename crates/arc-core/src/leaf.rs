//! Routing shared by leaves backed by a single provider handle

use crate::help::{self, Table};
use crate::lifecycle::Verb;
use crate::msg;
use crate::runtime::Runtime;
use arc_cloud::{ProviderResource, Request, Response};
use serde::Serialize;
use std::fmt::Display;

/// Print an error and fail
pub fn fail(error: impl Display) -> Response {
    msg::error(error);
    Response::Fail
}

/// Print configuration as JSON
pub fn config<T: Serialize + ?Sized>(value: &T) -> Response {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            msg::message(json);
            Response::Ok
        }
        Err(e) => fail(e),
    }
}

pub fn info<P: ProviderResource + ?Sized>(kind: &str, name: &str, provider: &P) -> Response {
    msg::info(format!("{} {}", kind, name));
    if provider.destroyed() {
        msg::detail("not created");
        return Response::Ok;
    }
    for (key, value) in provider.info() {
        msg::detail(format!("{}: {}", key, value));
    }
    Response::Ok
}

pub async fn load<P: ProviderResource + ?Sized>(kind: &str, name: &str, provider: &mut P) -> Response {
    match provider.load().await {
        Ok(()) => Response::Ok,
        Err(e) => fail(format!("{} {}: load failed: {}", kind, name, e)),
    }
}

/// Report a missing resource or the provider's drift findings
pub async fn audit<P: ProviderResource + ?Sized>(
    rt: &Runtime,
    kind: &str,
    name: &str,
    provider: &mut P,
) -> Response {
    let subject = format!("{} {}", kind.to_lowercase(), name);
    if provider.destroyed() {
        rt.audit.push(subject, "missing");
        return Response::Ok;
    }
    match provider.audit().await {
        Ok(findings) => {
            for finding in findings {
                rt.audit.push(&subject, finding);
            }
            Response::Ok
        }
        Err(e) => fail(format!("{}: audit failed: {}", subject, e)),
    }
}

/// Create or destroy through the provider; other verbs have nothing to do
pub async fn run<P: ProviderResource + ?Sized>(
    kind: &str,
    name: &str,
    provider: &mut P,
    verb: Verb,
    req: &Request,
) -> Response {
    let result = match verb {
        Verb::Create => provider.create(req).await,
        Verb::Destroy => provider.destroy(req).await,
        Verb::Provision => Ok(()),
        other => return fail(format!("{} {}: {} is not supported", kind, name, other)),
    };
    match result {
        Ok(()) => Response::Ok,
        Err(e) => fail(format!("{} {}: {} failed: {}", kind, name, verb, e)),
    }
}

/// A path token nobody recognized: offer it to the provider, else help and fail
pub async fn unknown<P: ProviderResource + ?Sized>(
    kind: &str,
    table: Table,
    provider: &mut P,
    req: &Request,
) -> Response {
    if provider.can_route(req) {
        return match provider.vendor_route(req).await {
            Ok(()) => Response::Ok,
            Err(e) => fail(e),
        };
    }
    msg::error(format!(
        "Unknown {} command: {}",
        kind.to_lowercase(),
        req.top().unwrap_or_default()
    ));
    help::print_with(kind, table, &provider.help_commands());
    Response::Fail
}
