//! Request routing value types
//!
//! A [`Request`] is built once from the command line tail and then walks the
//! resource tree. Each hop pops the path token it consumed; the command and
//! flags travel unchanged unless a resource clones the request with a new
//! command.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Flags that change routing or lifecycle behavior
pub mod flag {
    pub const TEST: &str = "test";
    pub const BOOTSTRAP: &str = "bootstrap";
    pub const INITIAL: &str = "initial";
    pub const PRESERVE_VOLUME: &str = "preserve_volume";
    pub const PRESERVE_EIP: &str = "preserve_eip";
    pub const NOPROVISION: &str = "noprovision";
    pub const NOPUPPET: &str = "nopuppet";
    pub const NORULES: &str = "norules";
    pub const RULES_ONLY: &str = "rules_only";
    pub const CLUSTERONLY: &str = "clusteronly";
    pub const PODONLY: &str = "podonly";
    pub const FORCE: &str = "force";
    pub const HARD: &str = "hard";
    pub const SKIP_CREATED_CHECK: &str = "skip_created_check";
    pub const AIDE: &str = "aide";
    pub const ROLE: &str = "role";
    pub const USERS: &str = "users";
    pub const TAGS: &str = "tags";
    pub const RELOAD: &str = "reload";
}

/// Verb carried by a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    None,
    Load,
    Help,
    Config,
    Info,
    Create,
    Provision,
    Start,
    Stop,
    Restart,
    Replace,
    Destroy,
    Audit,
}

impl Command {
    /// Map a command line token to a command, if it names one
    pub fn parse(token: &str) -> Option<Command> {
        let command = match token {
            "load" => Command::Load,
            "help" | "-h" | "--help" => Command::Help,
            "config" | "conf" => Command::Config,
            "info" | "show" | "list" => Command::Info,
            "create" | "new" => Command::Create,
            "provision" | "refresh" | "update" => Command::Provision,
            "start" | "boot" => Command::Start,
            "stop" | "halt" => Command::Stop,
            "restart" | "reboot" => Command::Restart,
            "replace" => Command::Replace,
            "destroy" | "delete" | "nuke" => Command::Destroy,
            "audit" => Command::Audit,
            _ => return None,
        };
        Some(command)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Command::None => "none",
            Command::Load => "load",
            Command::Help => "help",
            Command::Config => "config",
            Command::Info => "info",
            Command::Create => "create",
            Command::Provision => "provision",
            Command::Start => "start",
            Command::Stop => "stop",
            Command::Restart => "restart",
            Command::Replace => "replace",
            Command::Destroy => "destroy",
            Command::Audit => "audit",
        }
    }

    /// Commands that only read state and never need authorization
    pub fn is_read_only(&self) -> bool {
        matches!(
            self,
            Command::None
                | Command::Load
                | Command::Help
                | Command::Config
                | Command::Info
                | Command::Audit
        )
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of routing a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    Ok,
    Fail,
    Unauthorized,
    /// No decision was taken; default handling should proceed
    Continue,
}

impl Response {
    pub fn is_ok(&self) -> bool {
        matches!(self, Response::Ok)
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Ok => write!(f, "OK"),
            Response::Fail => write!(f, "FAIL"),
            Response::Unauthorized => write!(f, "UNAUTHORIZED"),
            Response::Continue => write!(f, "CONTINUE"),
        }
    }
}

/// Remaining path tokens; the front is the top of the stack
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Path(VecDeque<String>);

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a token back on top of the stack
    pub fn push(&mut self, token: impl Into<String>) {
        self.0.push_front(token.into());
    }

    pub fn pop(&mut self) -> Option<String> {
        self.0.pop_front()
    }

    pub fn top(&self) -> Option<&str> {
        self.0.front().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tokens: Vec<&str> = self.0.iter().map(String::as_str).collect();
        write!(f, "{}", tokens.join(" "))
    }
}

/// Ordered, duplicate free flag list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flags(Vec<String>);

impl Flags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, flag: impl Into<String>) {
        let flag = flag.into();
        if !self.0.contains(&flag) {
            self.0.push(flag);
        }
    }

    pub fn remove(&mut self, flag: &str) {
        self.0.retain(|f| f != flag);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has(&self, flag: &str) -> bool {
        self.0.iter().any(|f| f == flag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(" "))
    }
}

/// A request walking the resource tree
#[derive(Debug, Clone)]
pub struct Request {
    datacenter: String,
    user: String,
    time: DateTime<Utc>,
    path: Path,
    command: Command,
    flags: Flags,
}

impl Request {
    /// Build a request from the command line tail following the datacenter name
    pub fn new<S: AsRef<str>>(
        datacenter: impl Into<String>,
        user: impl Into<String>,
        time: DateTime<Utc>,
        tokens: &[S],
    ) -> Self {
        let (path, command, flags) = Self::parse(tokens);
        Self {
            datacenter: datacenter.into(),
            user: user.into(),
            time,
            path,
            command,
            flags,
        }
    }

    /// Split tokens into path, command and flags.
    ///
    /// Tokens are path components until the first one naming a command;
    /// everything after it is a flag.
    pub fn parse<S: AsRef<str>>(tokens: &[S]) -> (Path, Command, Flags) {
        let mut path = VecDeque::new();
        let mut command = Command::None;
        let mut flags = Flags::new();

        let mut iter = tokens.iter();
        for token in iter.by_ref() {
            let token: &str = token.as_ref();
            if let Some(c) = Command::parse(token) {
                command = c;
                break;
            }
            path.push_back(token.to_string());
        }
        for token in iter {
            let token: &str = token.as_ref();
            flags.append(token);
        }

        (Path(path), command, flags)
    }

    /// Same identity and flags, a new command and an empty path
    pub fn clone_with(&self, command: Command) -> Request {
        Request {
            datacenter: self.datacenter.clone(),
            user: self.user.clone(),
            time: self.time,
            path: Path::new(),
            command,
            flags: self.flags.clone(),
        }
    }

    /// Builder style flag addition
    pub fn with_flag(mut self, flag: &str) -> Request {
        self.flags.append(flag);
        self
    }

    /// Builder style flag removal
    pub fn without_flag(mut self, flag: &str) -> Request {
        self.flags.remove(flag);
        self
    }

    /// Remove the top path token
    pub fn pop(&mut self) -> &mut Self {
        self.path.pop();
        self
    }

    pub fn top(&self) -> Option<&str> {
        self.path.top()
    }

    pub fn push(&mut self, token: impl Into<String>) -> &mut Self {
        self.path.push(token);
        self
    }

    pub fn has(&self, flag: &str) -> bool {
        self.flags.has(flag)
    }

    pub fn datacenter(&self) -> &str {
        &self.datacenter
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn command(&self) -> Command {
        self.command
    }

    pub fn flags(&self) -> &Flags {
        &self.flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn request(tokens: &[&str]) -> Request {
        Request::new("dev", "alice", Utc::now(), tokens)
    }

    #[test]
    fn test_parse_path_command_flags() {
        let req = request(&["instance", "web-01", "destroy", "preserve_volume", "preserve_eip"]);
        assert_eq!(req.top(), Some("instance"));
        assert_eq!(req.path().len(), 2);
        assert_eq!(req.command(), Command::Destroy);
        assert!(req.has(flag::PRESERVE_VOLUME));
        assert!(req.has(flag::PRESERVE_EIP));
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!(request(&["show"]).command(), Command::Info);
        assert_eq!(request(&["list"]).command(), Command::Info);
        assert_eq!(request(&["nuke"]).command(), Command::Destroy);
        assert_eq!(request(&["delete"]).command(), Command::Destroy);
        assert_eq!(request(&["refresh"]).command(), Command::Provision);
        assert_eq!(request(&["update"]).command(), Command::Provision);
        assert_eq!(request(&["--help"]).command(), Command::Help);
        assert_eq!(request(&["network"]).command(), Command::None);
    }

    #[test]
    fn test_flags_are_duplicate_free() {
        let req = request(&["create", "test", "test", "norules"]);
        let flags: Vec<&str> = req.flags().iter().collect();
        assert_eq!(flags, vec!["test", "norules"]);
    }

    #[test]
    fn test_pop_and_push() {
        let mut req = request(&["dns", "a", "www", "info"]);
        assert_eq!(req.pop().top(), Some("a"));
        req.pop();
        assert_eq!(req.top(), Some("www"));
        req.push("a");
        assert_eq!(req.top(), Some("a"));
    }

    #[test]
    fn test_clone_with() {
        let req = request(&["cluster", "prod", "replace", "noprovision"]);
        let clone = req.clone_with(Command::Destroy).with_flag(flag::PRESERVE_VOLUME);

        assert_eq!(clone.datacenter(), "dev");
        assert_eq!(clone.user(), "alice");
        assert_eq!(clone.time(), req.time());
        assert!(clone.path().is_empty());
        assert_eq!(clone.command(), Command::Destroy);
        assert!(clone.has(flag::NOPROVISION));
        // the source request keeps its own flag set
        assert!(!req.has(flag::PRESERVE_VOLUME));
    }

    fn token() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("create".to_string()),
            Just("destroy".to_string()),
            Just("show".to_string()),
            Just("network".to_string()),
            Just("web-01".to_string()),
            Just("test".to_string()),
            "[a-z]{1,8}",
        ]
    }

    proptest! {
        #[test]
        fn prop_parse_is_deterministic(tokens in proptest::collection::vec(token(), 0..8)) {
            let (path_a, command_a, flags_a) = Request::parse(&tokens);
            let (path_b, command_b, flags_b) = Request::parse(&tokens);
            prop_assert_eq!(&path_a, &path_b);
            prop_assert_eq!(command_a, command_b);
            prop_assert_eq!(&flags_a, &flags_b);

            // the first command token ends the path
            match tokens.iter().position(|t| Command::parse(t).is_some()) {
                Some(i) => {
                    prop_assert_eq!(path_a.len(), i);
                    prop_assert_eq!(Some(command_a), Command::parse(&tokens[i]));
                }
                None => {
                    prop_assert_eq!(path_a.len(), tokens.len());
                    prop_assert_eq!(command_a, Command::None);
                    prop_assert!(flags_a.is_empty());
                }
            }
        }

        #[test]
        fn prop_clone_with_keeps_identity(tokens in proptest::collection::vec(token(), 0..8)) {
            let req = Request::new("dc", "bob", Utc::now(), &tokens);
            let clone = req.clone_with(Command::Load);
            prop_assert_eq!(clone.datacenter(), req.datacenter());
            prop_assert_eq!(clone.user(), req.user());
            prop_assert_eq!(clone.time(), req.time());
            prop_assert_eq!(clone.flags(), req.flags());
            prop_assert!(clone.path().is_empty());
        }
    }
}
