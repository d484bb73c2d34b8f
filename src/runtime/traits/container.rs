// ABOUTME: Container operations trait for container runtimes.
// ABOUTME: Create, start, stop, kill, remove, rename, inspect, and list containers.

use super::sealed::Sealed;
use super::shared_types::{ContainerFilters, ContainerRecord, ContainerSummary, CreateRequest};
use crate::types::ContainerId;
use async_trait::async_trait;
use std::time::Duration;

/// Container lifecycle operations.
#[async_trait]
pub trait ContainerOps: Sealed + Send + Sync {
    /// Create a container from the given request.
    async fn create_container(&self, request: &CreateRequest)
    -> Result<ContainerId, ContainerError>;

    /// Start a created container.
    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError>;

    /// Stop a running container, waiting up to `timeout` before the runtime kills it.
    async fn stop_container(
        &self,
        id: &ContainerId,
        timeout: Duration,
    ) -> Result<(), ContainerError>;

    /// Send SIGKILL to a container.
    async fn kill_container(&self, id: &ContainerId) -> Result<(), ContainerError>;

    /// Remove a container.
    async fn remove_container(&self, id: &ContainerId, force: bool) -> Result<(), ContainerError>;

    /// Rename a container.
    async fn rename_container(
        &self,
        id: &ContainerId,
        new_name: &str,
    ) -> Result<(), ContainerError>;

    /// Inspect a container by id or name.
    async fn inspect_container(&self, id: &ContainerId)
    -> Result<ContainerRecord, ContainerError>;

    /// Whether any container, running or not, holds `name`.
    async fn container_exists(&self, name: &str) -> Result<bool, ContainerError>;

    /// List containers matching the given filters.
    async fn list_containers(
        &self,
        filters: &ContainerFilters,
    ) -> Result<Vec<ContainerSummary>, ContainerError>;
}

/// Errors from container operations.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("container not found: {0}")]
    NotFound(String),

    #[error("container already exists: {0}")]
    AlreadyExists(String),

    #[error("container not running: {0}")]
    NotRunning(String),

    #[error("container already running: {0}")]
    AlreadyRunning(String),

    #[error("image not found: {0}")]
    ImageNotFound(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
