// ABOUTME: Convergence engine for images and containers on a single host.
// ABOUTME: Exports the engine, action enums, rollout typestate and error taxonomy.

mod action;
mod cleanup;
mod container;
mod error;
mod image;
pub mod rotation;
mod spec;
mod state;

pub use action::{
    ActionOutcome, ApplyReport, ContainerAction, ContainerResource, DesiredState, ImageAction,
    ImageResource,
};
pub use cleanup::{CleanupFailure, CleanupResult};
pub use container::{LOGICAL_NAME_ENV, Rollout, comparable_host_config};
pub use error::{ConvergeError, ConvergeErrorKind};
pub use image::BOOTSTRAP_BASE;
pub use spec::{ContainerSpec, DEFAULT_KEEP_RELEASES, ImageSpec};
pub use state::{Candidate, Resolved, Rotated, Started};

use crate::diagnostics::{Diagnostics, Warning};
use crate::provision::{IdentityRegistry, ProvisioningWriter, WrapperScriptWriter};
use crate::runtime::{ContainerRuntime, DEFAULT_STOP_TIMEOUT, ImageError};
use crate::types::ImageId;
use std::path::PathBuf;
use std::time::Duration;

/// Mount point of the secure directory inside containers.
pub const DEFAULT_SECURE_MOUNT: &str = "/etc/chef/secure";

/// External collaborators the engine writes through.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub provisioner: &'a dyn ProvisioningWriter,
    pub identities: &'a dyn IdentityRegistry,
    pub scripts: &'a dyn WrapperScriptWriter,
}

/// Engine tunables.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Grace period passed to stop before escalating to kill.
    pub stop_timeout: Duration,
    /// Where the secure directory is mounted inside containers.
    pub secure_mount: PathBuf,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            secure_mount: PathBuf::from(DEFAULT_SECURE_MOUNT),
        }
    }
}

/// Drives the host towards the desired images and containers.
///
/// Runtime calls are awaited one at a time. Swallowed failures end up in
/// [`Engine::diagnostics`].
pub struct Engine<'a, R: ContainerRuntime + ?Sized> {
    pub(crate) runtime: &'a R,
    pub(crate) collaborators: Collaborators<'a>,
    pub(crate) settings: EngineSettings,
    pub(crate) diagnostics: Diagnostics,
}

impl<'a, R: ContainerRuntime + ?Sized> Engine<'a, R> {
    pub fn new(runtime: &'a R, collaborators: Collaborators<'a>, settings: EngineSettings) -> Self {
        Self {
            runtime,
            collaborators,
            settings,
            diagnostics: Diagnostics::default(),
        }
    }

    pub fn runtime(&self) -> &'a R {
        self.runtime
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }

    /// Remove an image, logging instead of failing. Returns whether it was removed.
    pub(crate) async fn remove_image_best_effort(&mut self, id: &ImageId) -> bool {
        match self.runtime.remove_image(id, false).await {
            Ok(()) => {
                tracing::info!(image = %id.short(), "removed image");
                true
            }
            Err(ImageError::NotFound(_)) => false,
            Err(ImageError::InUse(reason)) => {
                self.diagnostics.warn(Warning::image_in_use(format!(
                    "not removing image in use {}: {}",
                    id.short(),
                    reason
                )));
                false
            }
            Err(e) => {
                self.diagnostics.warn(Warning::image_removal(format!(
                    "could not remove image {}: {}",
                    id.short(),
                    e
                )));
                false
            }
        }
    }
}
