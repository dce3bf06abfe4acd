use crate::ssh::SshError;
use arc_cloud::CloudError;
use arc_config::ConfigError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    ConfigFile(#[from] ConfigError),

    #[error("provider error: {0}")]
    Cloud(#[from] CloudError),

    #[error("remote execution failed: {0}")]
    Ssh(#[from] SshError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no key matching '{0}' in the SSH agent")]
    KeyNotFound(String),

    #[error("CIDR error: {0}")]
    Cidr(String),

    #[error("timed out after {seconds}s waiting for {what}")]
    Timeout { what: String, seconds: u64 },

    /// A step already reported its own failure
    #[error("{0} did not complete")]
    Incomplete(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
