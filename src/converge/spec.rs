// ABOUTME: Desired-state descriptions consumed by the convergence engine.
// ABOUTME: ImageSpec for images, ContainerSpec for the generations of a logical name.

use crate::provision::{BuildSpec, Secrets};
use crate::runtime::RegistryAuth;
use crate::types::{ImageRef, LogicalName};
use serde_json::{Map, Value};

/// Generations kept by default, counting the active one.
pub const DEFAULT_KEEP_RELEASES: u32 = 3;

/// Desired image.
#[derive(Debug, Clone)]
pub struct ImageSpec {
    pub image: ImageRef,
    /// How to build it; required by the build actions.
    pub build: Option<BuildSpec>,
    pub auth: Option<RegistryAuth>,
}

impl ImageSpec {
    pub fn new(image: ImageRef) -> Self {
        Self {
            image,
            build: None,
            auth: None,
        }
    }
}

/// Desired container.
///
/// `create_options` and `start_options` are opaque apart from the keys the
/// engine injects: `Hostname`, the identity label, `Env` and `Binds`.
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    pub logical_name: LogicalName,
    pub base_image: ImageRef,
    pub create_options: Map<String, Value>,
    pub start_options: Map<String, Value>,
    pub command: Vec<String>,
    pub keep_releases: u32,
    pub secrets: Secrets,
}

impl ContainerSpec {
    pub fn new(logical_name: LogicalName, base_image: ImageRef) -> Self {
        Self {
            logical_name,
            base_image,
            create_options: Map::new(),
            start_options: Map::new(),
            command: Vec::new(),
            keep_releases: DEFAULT_KEEP_RELEASES,
            secrets: Secrets::default(),
        }
    }

    /// Set a create option.
    pub fn with_create_option(mut self, key: &str, value: Value) -> Self {
        self.create_options.insert(key.to_string(), value);
        self
    }

    /// Set a start (host config) option.
    pub fn with_start_option(mut self, key: &str, value: Value) -> Self {
        self.start_options.insert(key.to_string(), value);
        self
    }

    pub fn with_keep_releases(mut self, keep_releases: u32) -> Self {
        self.keep_releases = keep_releases;
        self
    }

    pub fn with_command(mut self, command: Vec<String>) -> Self {
        self.command = command;
        self
    }

    pub fn name(&self) -> &str {
        self.logical_name.as_str()
    }
}
