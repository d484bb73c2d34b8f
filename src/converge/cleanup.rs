// ABOUTME: Sweeps that reclaim dangling images and leftover generations.
// ABOUTME: Per-item failures are collected instead of aborting the sweep.

use super::{ConvergeError, Engine};
use crate::diagnostics::Warning;
use crate::naming::generation_set;
use crate::runtime::{ContainerError, ContainerRuntime, ImageError, ImageFilters};
use serde::Serialize;

/// A resource the sweep could not reclaim.
#[derive(Debug, Clone, Serialize)]
pub struct CleanupFailure {
    pub id: String,
    pub reason: String,
}

/// Outcome of a sweep.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupResult {
    pub removed: Vec<String>,
    pub failed: Vec<CleanupFailure>,
}

impl CleanupResult {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    fn fail(&mut self, id: impl Into<String>, reason: impl Into<String>) {
        self.failed.push(CleanupFailure {
            id: id.into(),
            reason: reason.into(),
        });
    }
}

impl<R: ContainerRuntime + ?Sized> Engine<'_, R> {
    /// Remove every untagged image.
    pub async fn remove_dangling_images(&mut self) -> CleanupResult {
        let mut result = CleanupResult::default();
        let images = match self.runtime.list_images(&ImageFilters::dangling()).await {
            Ok(images) => images,
            Err(e) => {
                self.diagnostics.warn(Warning::image_removal(format!(
                    "could not list dangling images: {}",
                    e
                )));
                result.fail("*", e.to_string());
                return result;
            }
        };

        for image in images.into_iter().filter(|i| i.is_dangling()) {
            match self.runtime.remove_image(&image.id, false).await {
                Ok(()) => {
                    tracing::debug!(image = %image.id.short(), "removed dangling image");
                    result.removed.push(image.id.into_inner());
                }
                Err(ImageError::NotFound(_)) => {}
                Err(e) => {
                    self.diagnostics.warn(Warning::image_removal(format!(
                        "could not remove dangling image {}: {}",
                        image.id.short(),
                        e
                    )));
                    result.fail(image.id.into_inner(), e.to_string());
                }
            }
        }
        result
    }

    /// Stop and remove every generation of `logical_name`, continuing past failures.
    pub async fn force_remove(&mut self, logical_name: &str) -> Result<CleanupResult, ConvergeError> {
        let mut result = CleanupResult::default();

        for record in generation_set(self.runtime, logical_name, &[]).await? {
            if let Err(e) = self.stop_container(&record).await {
                tracing::warn!(container = %record.unique_name, error = %e, "stop failed, forcing removal");
            }
            match self.runtime.remove_container(&record.id, true).await {
                Ok(()) | Err(ContainerError::NotFound(_)) => {
                    result.removed.push(record.unique_name.clone());
                    if !record.parent_image_id.as_str().is_empty() {
                        self.remove_image_best_effort(&record.parent_image_id).await;
                    }
                }
                Err(e) => {
                    self.diagnostics.warn(Warning::container_cleanup(format!(
                        "could not remove {}: {}",
                        record.unique_name, e
                    )));
                    result.fail(record.unique_name.clone(), e.to_string());
                }
            }
        }
        Ok(result)
    }

    /// Attempt to remove every image on the host; images in use are kept.
    pub async fn remove_unused_images(&mut self) -> Result<CleanupResult, ConvergeError> {
        let mut result = CleanupResult::default();
        let images = self
            .runtime
            .list_images(&ImageFilters::default())
            .await
            .map_err(|e| ConvergeError::Runtime(e.to_string()))?;

        for image in images {
            match self.runtime.remove_image(&image.id, false).await {
                Ok(()) => {
                    tracing::info!(image = %image.id.short(), "removed unused image");
                    result.removed.push(image.id.into_inner());
                }
                Err(ImageError::NotFound(_)) => {}
                Err(ImageError::InUse(_)) => {
                    tracing::debug!(image = %image.id.short(), "image in use, keeping");
                }
                Err(e) => {
                    self.diagnostics.warn(Warning::image_removal(format!(
                        "could not remove image {}: {}",
                        image.id.short(),
                        e
                    )));
                    result.fail(image.id.into_inner(), e.to_string());
                }
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converge::{Collaborators, ContainerSpec, EngineSettings};
    use crate::provision::{FsProvisioner, InitScriptWriter, KeyFileRegistry};
    use crate::runtime::{ContainerOps, MemoryRuntime, StopBehavior};
    use crate::types::{ImageRef, LogicalName};

    #[tokio::test]
    async fn force_remove_reports_survivors_and_continues() {
        let root = tempfile::tempdir().unwrap();
        let provisioner = FsProvisioner::new(root.path(), "/etc/chef/secure");
        let identities = KeyFileRegistry::new(root.path());
        let scripts = InitScriptWriter::new(root.path().join("init.d"), "docker");
        let collaborators = Collaborators {
            provisioner: &provisioner,
            identities: &identities,
            scripts: &scripts,
        };

        let runtime = MemoryRuntime::new();
        let image = ImageRef::new("app", "v1");
        runtime.seed_image(&image);
        let mut engine = Engine::new(&runtime, collaborators, EngineSettings::default());

        let spec = ContainerSpec::new(LogicalName::new("web").unwrap(), image);
        engine.create_and_rotate(&spec).await.unwrap();
        runtime.set_stop_behavior("web", StopBehavior::Unkillable);

        let result = engine.force_remove("web").await.unwrap();
        assert_eq!(result.removed, vec!["web".to_string()]);
        assert!(result.is_clean());
        assert!(!runtime.container_exists("web").await.unwrap());
    }
}
