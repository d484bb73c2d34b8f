// ABOUTME: Collaborators that write provisioning data, wrapper scripts and identities.
// ABOUTME: Traits consumed by the convergence engine plus their filesystem implementations.

mod context;
mod fs;
mod script;

pub use context::BuildContext;
pub use fs::{FsProvisioner, KeyFileRegistry};
pub use script::InitScriptWriter;

use crate::runtime::BuildOptions;
use crate::types::{ContainerId, ImageRef};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Name of the bootstrap manifest staged into every build context.
pub const FIRST_BOOT_FILE: &str = "first-boot.json";
/// Name of the build descriptor staged into every build context.
pub const DOCKERFILE: &str = "Dockerfile";
/// File holding the id of the active container in its cache directory.
pub const CID_FILE: &str = "cid";

/// Errors from filesystem collaborators.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("{action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to render {0}: {1}")]
    Render(&'static str, serde_json::Error),

    #[error("build for {0} needs either base_image or build_dir")]
    MissingBaseImage(String),
}

impl ProvisionError {
    pub(crate) fn io(action: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Secret material written into a secure directory.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Secrets {
    pub encrypted_data_bag_secret: Option<String>,
    pub validation_key: Option<String>,
}

/// Inputs for staging an image build.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildSpec {
    /// Image the build descriptor starts `FROM`.
    pub base_image: Option<ImageRef>,
    /// Extra build descriptor instructions, appended verbatim.
    pub commands: Vec<String>,
    /// Bootstrap manifest content.
    pub first_boot: serde_json::Value,
    /// Prepared context used as-is instead of staging one.
    pub build_dir: Option<PathBuf>,
    /// Builder knobs.
    pub options: BuildOptions,
    /// Secrets staged for the bootstrap run.
    pub secrets: Secrets,
}

/// Writes provisioning data for identities and build contexts.
pub trait ProvisioningWriter: Send + Sync {
    /// Host directory bound into containers of `name`.
    fn secure_dir(&self, name: &str) -> PathBuf;

    /// Write secrets for `name`, removing any stale client key.
    fn populate_secure_dir(&self, name: &str, secrets: &Secrets) -> Result<(), ProvisionError>;

    /// Delete the secure directory. Returns whether it existed.
    fn remove_secure_dir(&self, name: &str) -> Result<bool, ProvisionError>;

    /// Fill `dir` with the bootstrap manifest, secure files and build descriptor.
    fn stage_build_context(
        &self,
        dir: &Path,
        spec: &BuildSpec,
        bootstrap_name: &str,
    ) -> Result<(), ProvisionError>;

    /// Record the active container id for `name`.
    fn record_container_id(&self, name: &str, id: &ContainerId)
    -> Result<PathBuf, ProvisionError>;

    /// Delete the cache directory holding the container id file. Returns whether it existed.
    fn remove_cache_dir(&self, name: &str) -> Result<bool, ProvisionError>;
}

/// Knows which logical identities are registered with the configuration service.
pub trait IdentityRegistry: Send + Sync {
    fn exists(&self, name: &str) -> Result<bool, ProvisionError>;

    /// Returns whether the identity was registered.
    fn deregister(&self, name: &str) -> Result<bool, ProvisionError>;
}

/// Host-level control script bound to a container.
pub trait WrapperScriptWriter: Send + Sync {
    fn write(&self, name: &str, id: &ContainerId) -> Result<PathBuf, ProvisionError>;

    /// Returns whether a script existed.
    fn remove(&self, name: &str) -> Result<bool, ProvisionError>;
}

/// Remove a directory tree, treating absence as success.
pub(crate) fn remove_dir_if_exists(path: &Path) -> Result<bool, ProvisionError> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(ProvisionError::io("remove", path, e)),
    }
}

/// Remove a file, treating absence as success.
pub(crate) fn remove_file_if_exists(path: &Path) -> Result<bool, ProvisionError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(ProvisionError::io("remove", path, e)),
    }
}
