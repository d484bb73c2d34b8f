// ABOUTME: Shared types used across runtime trait definitions.
// ABOUTME: CreateRequest, ContainerRecord, ImageRecord, BuildRequest, filters, RegistryAuth.

use crate::types::{ContainerId, ImageId, ImageRef};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::PathBuf;

/// Label carrying the logical name of every generation.
pub const IDENTITY_LABEL: &str = "shipwright.logical-name";
/// Label marking containers created by shipwright.
pub const MANAGED_LABEL: &str = "shipwright.managed";

/// Request for creating a container.
///
/// `create_options` and `start_options` use the runtime's own vocabulary
/// (`Env`, `Hostname`, `Labels`, `Binds`, `PortBindings`, ...). They are
/// passed through untouched apart from the keys the engine injects.
#[derive(Debug, Clone, Default)]
pub struct CreateRequest {
    /// Unique instance name.
    pub name: String,
    /// Image id or `repository:tag`.
    pub image: String,
    /// Command to run (overrides image CMD when non-empty).
    pub command: Vec<String>,
    /// Container-level configuration.
    pub create_options: Map<String, Value>,
    /// Host-level configuration.
    pub start_options: Map<String, Value>,
}

/// Observed state of a container, as reported by inspect.
#[derive(Debug, Clone)]
pub struct ContainerRecord {
    /// Container ID.
    pub id: ContainerId,
    /// Current container name (unique per instance).
    pub unique_name: String,
    /// Identity label, falling back to hostname.
    pub logical_name: String,
    /// Image the container was created from.
    pub parent_image_id: ImageId,
    /// Echoed container configuration.
    pub config: Value,
    /// Echoed host configuration.
    pub host_config: Value,
    /// Whether the container is running.
    pub running: bool,
    /// Unix nanoseconds of the last exit, 0 if it never finished.
    pub finished_at: i64,
}

impl ContainerRecord {
    /// Derive the logical name from an echoed config: identity label first,
    /// then hostname.
    pub fn identity_of(config: &Value) -> String {
        config
            .get("Labels")
            .and_then(|labels| labels.get(IDENTITY_LABEL))
            .and_then(Value::as_str)
            .or_else(|| config.get("Hostname").and_then(Value::as_str))
            .unwrap_or_default()
            .to_string()
    }
}

/// Summary information about a container.
#[derive(Debug, Clone)]
pub struct ContainerSummary {
    /// Container ID.
    pub id: ContainerId,
    /// Container name.
    pub name: String,
    /// Image used.
    pub image: String,
    /// Current state (`running`, `exited`, `created`, ...).
    pub state: String,
    /// Labels.
    pub labels: HashMap<String, String>,
}

impl ContainerSummary {
    pub fn is_running(&self) -> bool {
        self.state == "running"
    }
}

/// Filters for listing containers.
#[derive(Debug, Clone, Default)]
pub struct ContainerFilters {
    /// Filter by label (key=value).
    pub labels: HashMap<String, String>,
    /// Filter by name (supports partial match on Docker).
    pub name: Option<String>,
    /// Include stopped containers.
    pub all: bool,
}

impl ContainerFilters {
    /// Every container, running or not.
    pub fn everything() -> Self {
        Self {
            all: true,
            ..Default::default()
        }
    }

    /// Only running containers.
    pub fn running() -> Self {
        Self::default()
    }
}

/// Observed image.
#[derive(Debug, Clone)]
pub struct ImageRecord {
    /// Image ID.
    pub id: ImageId,
    /// Tags pointing at the image.
    pub tags: Vec<ImageRef>,
    /// Unix seconds of creation.
    pub created_at: i64,
}

impl ImageRecord {
    /// Untagged images are dangling.
    pub fn is_dangling(&self) -> bool {
        self.tags.is_empty()
    }
}

/// Filters for listing images.
#[derive(Debug, Clone, Default)]
pub struct ImageFilters {
    /// Only dangling (`Some(true)`) or only tagged (`Some(false)`) images.
    pub dangling: Option<bool>,
    /// Include intermediate layers.
    pub all: bool,
}

impl ImageFilters {
    pub fn dangling() -> Self {
        Self {
            dangling: Some(true),
            all: true,
        }
    }
}

/// Knobs passed to the image builder.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(default)]
pub struct BuildOptions {
    /// Do not use the build cache.
    pub nocache: bool,
    /// Always remove intermediate containers, even after failures.
    pub forcerm: bool,
    /// Always attempt to pull a newer base image.
    pub pull: bool,
}

/// Request for building an image from a context directory.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    /// Tag for the result.
    pub image: ImageRef,
    /// Directory holding the build descriptor and its inputs.
    pub context: PathBuf,
    /// Builder options.
    pub options: BuildOptions,
}

/// Registry authentication credentials.
#[derive(Debug, Clone)]
pub struct RegistryAuth {
    /// Username.
    pub username: String,
    /// Password or token.
    pub password: String,
    /// Registry server (e.g., "ghcr.io").
    pub server: Option<String>,
}

/// Runtime metadata.
#[derive(Debug, Clone)]
pub struct RuntimeMetadata {
    /// Runtime name (e.g., "docker", "podman").
    pub name: String,
    /// Runtime version.
    pub version: String,
    /// Operating system.
    pub os: String,
    /// Architecture.
    pub arch: String,
}
