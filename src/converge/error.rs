// ABOUTME: Error types for convergence operations.
// ABOUTME: One variant per failing step, with a kind enum for programmatic handling.

use crate::naming::NamingError;
use crate::provision::ProvisionError;
use crate::runtime::{ContainerError, ImageError};

/// Errors that abort a convergence action.
///
/// Runtime messages are carried verbatim so the operator sees what the
/// runtime reported.
#[derive(Debug, thiserror::Error)]
pub enum ConvergeError {
    /// Image pull failed.
    #[error("failed to pull {image}: {reason}")]
    Pull { image: String, reason: String },

    /// Image push failed.
    #[error("failed to push {image}: {reason}")]
    Push { image: String, reason: String },

    /// Image build failed, including staging of its context.
    #[error("failed to build {image}: {reason}")]
    Build { image: String, reason: String },

    /// Container creation failed.
    #[error("failed to create container for {name}: {reason}")]
    Create { name: String, reason: String },

    /// Container start failed.
    #[error("failed to start container {name}: {reason}")]
    Start { name: String, reason: String },

    /// Container is still running after stop and kill, or stop itself failed.
    #[error("failed to stop container {name}: {reason}")]
    Stop { name: String, reason: String },

    /// Container removal failed.
    #[error("failed to remove container {name}: {reason}")]
    Remove { name: String, reason: String },

    /// An image expected on the host is absent.
    #[error("image not found on host: {0}")]
    GetImage(String),

    /// A resource expected on the host is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// No free unique name.
    #[error(transparent)]
    NameGeneration(NamingError),

    /// Writing provisioning data or artifacts failed.
    #[error("provisioning failed: {0}")]
    Provisioning(#[from] ProvisionError),

    /// Any other runtime failure (listing, inspecting, renaming).
    #[error("runtime error: {0}")]
    Runtime(String),
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergeErrorKind {
    Pull,
    Push,
    Build,
    Create,
    Start,
    Stop,
    Remove,
    GetImage,
    NotFound,
    NameGeneration,
    Provisioning,
    Runtime,
}

impl ConvergeError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> ConvergeErrorKind {
        match self {
            ConvergeError::Pull { .. } => ConvergeErrorKind::Pull,
            ConvergeError::Push { .. } => ConvergeErrorKind::Push,
            ConvergeError::Build { .. } => ConvergeErrorKind::Build,
            ConvergeError::Create { .. } => ConvergeErrorKind::Create,
            ConvergeError::Start { .. } => ConvergeErrorKind::Start,
            ConvergeError::Stop { .. } => ConvergeErrorKind::Stop,
            ConvergeError::Remove { .. } => ConvergeErrorKind::Remove,
            ConvergeError::GetImage(_) => ConvergeErrorKind::GetImage,
            ConvergeError::NotFound(_) => ConvergeErrorKind::NotFound,
            ConvergeError::NameGeneration(_) => ConvergeErrorKind::NameGeneration,
            ConvergeError::Provisioning(_) => ConvergeErrorKind::Provisioning,
            ConvergeError::Runtime(_) => ConvergeErrorKind::Runtime,
        }
    }
}

impl From<NamingError> for ConvergeError {
    fn from(err: NamingError) -> Self {
        match err {
            NamingError::Runtime(e) => ConvergeError::Runtime(e.to_string()),
            other => ConvergeError::NameGeneration(other),
        }
    }
}

impl From<ContainerError> for ConvergeError {
    fn from(err: ContainerError) -> Self {
        match err {
            ContainerError::NotFound(what) => ConvergeError::NotFound(what),
            other => ConvergeError::Runtime(other.to_string()),
        }
    }
}

impl From<ImageError> for ConvergeError {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::NotFound(image) => ConvergeError::GetImage(image),
            other => ConvergeError::Runtime(other.to_string()),
        }
    }
}
