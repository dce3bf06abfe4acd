use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("KDL parse error: {0}")]
    KdlParse(#[from] kdl::KdlError),

    #[error("IO error: {path}\nreason: {message}")]
    IoError { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(
        "configuration for datacenter '{0}' not found. Looked in:\n\
        - ARC_CONFIG_PATH (direct path)\n\
        - ARC_CONFIG_DIR\n\
        - the current directory and ./.arc/\n\
        - ~/.config/arc/"
    )]
    NotFound(String),

    #[error("missing mandatory element: {0}")]
    Missing(String),

    #[error("duplicate {kind} name: {name}")]
    Duplicate { kind: &'static str, name: String },

    #[error("unknown {kind} '{name}' referenced by {by}")]
    Unknown {
        kind: &'static str,
        name: String,
        by: String,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
