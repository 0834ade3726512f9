// ABOUTME: Application-wide error types for reglist.
// ABOUTME: Wraps client, TLS and configuration failures for the CLI.

use crate::auth::AuthError;
use crate::client::ClientError;
use crate::client::tls::TlsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("no registry address given (use --registry or set `registry` in the config file)")]
    MissingRegistry,

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Tls(#[from] TlsError),

    #[error("invalid credentials: {0}")]
    Auth(#[from] AuthError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
