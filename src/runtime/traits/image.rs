// ABOUTME: Image operations trait for container runtimes.
// ABOUTME: Inspect, pull, push, build, tag, remove and list images.

use super::sealed::Sealed;
use super::shared_types::{BuildRequest, ImageFilters, ImageRecord, RegistryAuth};
use crate::types::{ImageId, ImageRef};
use async_trait::async_trait;

/// Image operations.
#[async_trait]
pub trait ImageOps: Sealed + Send + Sync {
    /// Inspect a local image by reference.
    async fn inspect_image(&self, reference: &ImageRef) -> Result<ImageRecord, ImageError>;

    /// Check if an image exists locally.
    async fn image_exists(&self, reference: &ImageRef) -> Result<bool, ImageError>;

    /// Pull an image from a registry and return the local id it now resolves to.
    async fn pull_image(
        &self,
        reference: &ImageRef,
        auth: Option<&RegistryAuth>,
    ) -> Result<ImageId, ImageError>;

    /// Push a local image to its registry.
    async fn push_image(
        &self,
        reference: &ImageRef,
        auth: Option<&RegistryAuth>,
    ) -> Result<(), ImageError>;

    /// Build an image from a context directory and tag it.
    async fn build_image(&self, request: &BuildRequest) -> Result<ImageRecord, ImageError>;

    /// Point `reference` at an existing image.
    async fn tag_image(&self, id: &ImageId, reference: &ImageRef) -> Result<(), ImageError>;

    /// Remove an image by id.
    async fn remove_image(&self, id: &ImageId, force: bool) -> Result<(), ImageError>;

    /// List local images.
    async fn list_images(&self, filters: &ImageFilters) -> Result<Vec<ImageRecord>, ImageError>;
}

/// Errors from image operations.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("image not found: {0}")]
    NotFound(String),

    #[error("authentication failed for registry: {0}")]
    AuthenticationFailed(String),

    #[error("pull failed: {0}")]
    PullFailed(String),

    #[error("push failed: {0}")]
    PushFailed(String),

    #[error("build failed: {0}")]
    BuildFailed(String),

    #[error("image in use, cannot remove: {0}")]
    InUse(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
