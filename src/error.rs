// ABOUTME: Application-wide error types for shipwright.
// ABOUTME: Uses thiserror for ergonomic error handling.

use crate::converge::ConvergeError;
use crate::provision::ProvisionError;
use crate::runtime::RuntimeError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("no {kind} named {name} in configuration")]
    UnknownResource { kind: &'static str, name: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Converge(#[from] ConvergeError),

    #[error(transparent)]
    Provision(#[from] ProvisionError),
}

pub type Result<T> = std::result::Result<T, Error>;
