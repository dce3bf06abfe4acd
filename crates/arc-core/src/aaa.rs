//! Authorization of mutating requests

use arc_cloud::Request;
use std::fmt;

/// What a request is about to touch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    KeyPair,
    Cluster,
    Pod,
    Network,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::KeyPair => write!(f, "keypair"),
            Scope::Cluster => write!(f, "cluster"),
            Scope::Pod => write!(f, "pod"),
            Scope::Network => write!(f, "network"),
        }
    }
}

pub trait Aaa {
    fn authorized(&self, scope: Scope, name: &str, req: &Request) -> bool;
}

/// Permits everything
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl Aaa for AllowAll {
    fn authorized(&self, _scope: Scope, _name: &str, _req: &Request) -> bool {
        true
    }
}

/// Denies every request in the listed scopes
#[derive(Debug, Default, Clone)]
pub struct DenyScopes(pub Vec<Scope>);

impl Aaa for DenyScopes {
    fn authorized(&self, scope: Scope, _name: &str, _req: &Request) -> bool {
        !self.0.contains(&scope)
    }
}

/// Read-only commands pass without asking
pub fn check(aaa: &dyn Aaa, scope: Scope, name: &str, req: &Request) -> bool {
    if req.command().is_read_only() {
        return true;
    }
    let allowed = aaa.authorized(scope, name, req);
    if !allowed {
        tracing::warn!(%scope, name, user = req.user(), command = %req.command(), "request denied");
    }
    allowed
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_read_only_commands_skip_the_check() {
        let deny = DenyScopes(vec![Scope::Cluster]);
        let info = Request::new("dev", "alice", Utc::now(), &["info"]);
        let create = Request::new("dev", "alice", Utc::now(), &["create"]);

        assert!(check(&deny, Scope::Cluster, "prod", &info));
        assert!(!check(&deny, Scope::Cluster, "prod", &create));
        assert!(check(&deny, Scope::Pod, "web", &create));
        assert!(check(&AllowAll, Scope::Network, "dev", &create));
    }
}
