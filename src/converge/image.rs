// ABOUTME: Image convergence: pull, build, push and removal of tagged images.
// ABOUTME: Builds stage a scoped context and always deregister the bootstrap identity.

use super::spec::ImageSpec;
use super::{ActionOutcome, ConvergeError, Engine};
use crate::diagnostics::Warning;
use crate::naming::unique_name;
use crate::provision::{BuildContext, BuildSpec};
use crate::runtime::{BuildRequest, ContainerRuntime, ImageError, ImageRecord};
use crate::types::{ImageId, ImageRef};

/// Base name of the transient identity used while building.
pub const BOOTSTRAP_BASE: &str = "buildtmp";

impl<R: ContainerRuntime + ?Sized> Engine<'_, R> {
    async fn local_image(&self, image: &ImageRef) -> Result<Option<ImageRecord>, ConvergeError> {
        match self.runtime.inspect_image(image).await {
            Ok(record) => Ok(Some(record)),
            Err(ImageError::NotFound(_)) => Ok(None),
            Err(e) => Err(ConvergeError::Runtime(e.to_string())),
        }
    }

    async fn fetch(&self, spec: &ImageSpec) -> Result<ImageId, ConvergeError> {
        let id = self
            .runtime
            .pull_image(&spec.image, spec.auth.as_ref())
            .await
            .map_err(|e| ConvergeError::Pull {
                image: spec.image.to_string(),
                reason: e.to_string(),
            })?;
        tracing::info!(image = %spec.image, id = %id.short(), "pulled image");
        Ok(id)
    }

    /// Pull the image unless it is already on the host.
    pub async fn pull_if_missing(&mut self, spec: &ImageSpec) -> Result<ActionOutcome, ConvergeError> {
        if self.local_image(&spec.image).await?.is_some() {
            tracing::debug!(image = %spec.image, "image present, not pulling");
            return Ok(ActionOutcome::unchanged(&spec.image, "pull_if_missing"));
        }
        let id = self.fetch(spec).await?;
        Ok(ActionOutcome::new(
            spec.image.to_string(),
            "pull_if_missing",
            true,
            format!("pulled {} ({})", spec.image, id.short()),
        ))
    }

    /// Pull the image; a changed id replaces the prior image.
    pub async fn pull(&mut self, spec: &ImageSpec) -> Result<ActionOutcome, ConvergeError> {
        let Some(prior) = self.local_image(&spec.image).await? else {
            let mut outcome = self.pull_if_missing(spec).await?;
            outcome.action = "pull".to_string();
            return Ok(outcome);
        };

        let id = self.fetch(spec).await?;
        if id == prior.id {
            return Ok(ActionOutcome::unchanged(&spec.image, "pull"));
        }

        self.remove_image_best_effort(&prior.id).await;
        Ok(ActionOutcome::new(
            spec.image.to_string(),
            "pull",
            true,
            format!("updated {} {} -> {}", spec.image, prior.id.short(), id.short()),
        ))
    }

    /// Build the image unless it is already on the host.
    pub async fn build_if_missing(
        &mut self,
        spec: &ImageSpec,
    ) -> Result<ActionOutcome, ConvergeError> {
        if self.local_image(&spec.image).await?.is_some() {
            return Ok(ActionOutcome::unchanged(&spec.image, "build_if_missing"));
        }
        let record = self.build_with_cleanup(spec).await?;
        Ok(ActionOutcome::new(
            spec.image.to_string(),
            "build_if_missing",
            true,
            format!("built {} ({})", spec.image, record.id.short()),
        ))
    }

    /// Build the image, replacing the prior image once the build succeeded.
    pub async fn build(&mut self, spec: &ImageSpec) -> Result<ActionOutcome, ConvergeError> {
        let prior = self.local_image(&spec.image).await?;
        let record = self.build_with_cleanup(spec).await?;

        if let Some(prior) = prior
            && prior.id != record.id
        {
            self.remove_image_best_effort(&prior.id).await;
        }
        Ok(ActionOutcome::new(
            spec.image.to_string(),
            "build",
            true,
            format!("built {} ({})", spec.image, record.id.short()),
        ))
    }

    /// Run a build, then release the context and bootstrap identity and sweep
    /// dangling layers whatever the outcome.
    async fn build_with_cleanup(&mut self, spec: &ImageSpec) -> Result<ImageRecord, ConvergeError> {
        let build_error = |reason: String| ConvergeError::Build {
            image: spec.image.to_string(),
            reason,
        };
        let build = spec
            .build
            .as_ref()
            .ok_or_else(|| build_error("no build section configured".to_string()))?;

        let context = match &build.build_dir {
            Some(dir) => BuildContext::provided(dir),
            None => BuildContext::staged()?,
        };
        let bootstrap = if context.is_staged() {
            Some(unique_name(self.runtime, BOOTSTRAP_BASE).await?)
        } else {
            None
        };

        let result = self
            .run_build(spec, build, &context, bootstrap.as_deref())
            .await;

        drop(context);
        if let Some(name) = &bootstrap {
            match self.collaborators.identities.deregister(name) {
                Ok(_) => tracing::debug!(identity = %name, "deregistered bootstrap identity"),
                Err(e) => self.diagnostics.warn(Warning::deregistration(format!(
                    "could not deregister {}: {}",
                    name, e
                ))),
            }
        }
        let sweep = self.remove_dangling_images().await;
        if !sweep.removed.is_empty() {
            tracing::debug!(count = sweep.removed.len(), "swept dangling images after build");
        }

        result
    }

    async fn run_build(
        &self,
        spec: &ImageSpec,
        build: &BuildSpec,
        context: &BuildContext,
        bootstrap: Option<&str>,
    ) -> Result<ImageRecord, ConvergeError> {
        let build_error = |reason: String| ConvergeError::Build {
            image: spec.image.to_string(),
            reason,
        };

        if let Some(bootstrap) = bootstrap {
            self.collaborators
                .provisioner
                .stage_build_context(context.path(), build, bootstrap)
                .map_err(|e| build_error(e.to_string()))?;
        }

        tracing::info!(image = %spec.image, context = %context.path().display(), "building image");
        let record = self
            .runtime
            .build_image(&BuildRequest {
                image: spec.image.clone(),
                context: context.path().to_path_buf(),
                options: build.options.clone(),
            })
            .await
            .map_err(|e| build_error(e.to_string()))?;

        self.runtime
            .tag_image(&record.id, &spec.image)
            .await
            .map_err(|e| build_error(e.to_string()))?;
        Ok(record)
    }

    /// Push a local image to its registry.
    pub async fn push(&mut self, spec: &ImageSpec) -> Result<ActionOutcome, ConvergeError> {
        if self.local_image(&spec.image).await?.is_none() {
            return Err(ConvergeError::GetImage(spec.image.to_string()));
        }
        self.runtime
            .push_image(&spec.image, spec.auth.as_ref())
            .await
            .map_err(|e| ConvergeError::Push {
                image: spec.image.to_string(),
                reason: e.to_string(),
            })?;
        tracing::info!(image = %spec.image, "pushed image");
        Ok(ActionOutcome::new(
            spec.image.to_string(),
            "push",
            true,
            format!("pushed {}", spec.image),
        ))
    }

    /// Remove the image unless a container still uses it.
    pub async fn remove_if_unused(
        &mut self,
        spec: &ImageSpec,
    ) -> Result<ActionOutcome, ConvergeError> {
        let Some(image) = self.local_image(&spec.image).await? else {
            return Ok(ActionOutcome::unchanged(&spec.image, "remove_if_unused"));
        };
        let removed = self.remove_image_best_effort(&image.id).await;
        let summary = if removed {
            format!("removed {} ({})", spec.image, image.id.short())
        } else {
            format!("kept {}", spec.image)
        };
        Ok(ActionOutcome::new(
            spec.image.to_string(),
            "remove_if_unused",
            removed,
            summary,
        ))
    }

    /// [`Engine::pull`], recording failure as a warning.
    pub async fn try_pull(&mut self, spec: &ImageSpec) -> ActionOutcome {
        let result = self.pull(spec).await;
        self.swallow(spec, "try_pull", result)
    }

    /// [`Engine::pull_if_missing`], recording failure as a warning.
    pub async fn try_pull_if_missing(&mut self, spec: &ImageSpec) -> ActionOutcome {
        let result = self.pull_if_missing(spec).await;
        self.swallow(spec, "try_pull_if_missing", result)
    }

    fn swallow(
        &mut self,
        spec: &ImageSpec,
        action: &str,
        result: Result<ActionOutcome, ConvergeError>,
    ) -> ActionOutcome {
        match result {
            Ok(mut outcome) => {
                outcome.action = action.to_string();
                outcome
            }
            Err(e) => {
                self.diagnostics
                    .warn(Warning::try_action(format!("{} {}: {}", action, spec.image, e)));
                ActionOutcome::new(
                    spec.image.to_string(),
                    action,
                    false,
                    format!("skipped {}: {}", spec.image, e),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converge::{Collaborators, EngineSettings};
    use crate::diagnostics::WarningKind;
    use crate::provision::{FsProvisioner, InitScriptWriter, KeyFileRegistry};
    use crate::runtime::{FailPoint, ImageFilters, ImageOps, MemoryRuntime};

    struct Host {
        _root: tempfile::TempDir,
        provisioner: FsProvisioner,
        identities: KeyFileRegistry,
        scripts: InitScriptWriter,
    }

    impl Host {
        fn new() -> Self {
            let root = tempfile::tempdir().unwrap();
            Self {
                provisioner: FsProvisioner::new(root.path(), "/etc/chef/secure"),
                identities: KeyFileRegistry::new(root.path()),
                scripts: InitScriptWriter::new(root.path().join("init.d"), "docker"),
                _root: root,
            }
        }

        fn collaborators(&self) -> Collaborators<'_> {
            Collaborators {
                provisioner: &self.provisioner,
                identities: &self.identities,
                scripts: &self.scripts,
            }
        }
    }

    fn app() -> ImageRef {
        ImageRef::new("app", "v1")
    }

    #[tokio::test]
    async fn pull_if_missing_is_a_no_op_when_present() {
        let host = Host::new();
        let runtime = MemoryRuntime::new();
        runtime.seed_image(&app());
        let mut engine = Engine::new(&runtime, host.collaborators(), EngineSettings::default());

        let outcome = engine.pull_if_missing(&ImageSpec::new(app())).await.unwrap();
        assert!(!outcome.updated);
    }

    #[tokio::test]
    async fn pull_replaces_changed_image() {
        let host = Host::new();
        let runtime = MemoryRuntime::new();
        let old = runtime.seed_image(&app());
        let new = runtime.publish(&app());
        let mut engine = Engine::new(&runtime, host.collaborators(), EngineSettings::default());

        let outcome = engine.pull(&ImageSpec::new(app())).await.unwrap();
        assert!(outcome.updated);
        assert_eq!(runtime.image_ids(), vec![new]);
        assert!(!runtime.image_ids().contains(&old));
    }

    #[tokio::test]
    async fn pull_of_same_id_is_not_an_update() {
        let host = Host::new();
        let runtime = MemoryRuntime::new();
        runtime.publish(&app());
        let mut engine = Engine::new(&runtime, host.collaborators(), EngineSettings::default());

        assert!(engine.pull(&ImageSpec::new(app())).await.unwrap().updated);
        assert!(!engine.pull(&ImageSpec::new(app())).await.unwrap().updated);
    }

    #[tokio::test]
    async fn try_pull_records_failure() {
        let host = Host::new();
        let runtime = MemoryRuntime::new();
        runtime.set_failure(FailPoint::Pull, true);
        let mut engine = Engine::new(&runtime, host.collaborators(), EngineSettings::default());

        let outcome = engine.try_pull(&ImageSpec::new(app())).await;
        assert!(!outcome.updated);
        assert_eq!(engine.diagnostics().count(WarningKind::TryActionFailed), 1);
    }

    #[tokio::test]
    async fn push_requires_local_image() {
        let host = Host::new();
        let runtime = MemoryRuntime::new();
        let mut engine = Engine::new(&runtime, host.collaborators(), EngineSettings::default());

        let err = engine.push(&ImageSpec::new(app())).await.unwrap_err();
        assert!(matches!(err, ConvergeError::GetImage(_)));
    }

    #[tokio::test]
    async fn failed_build_sweeps_its_layers() {
        let host = Host::new();
        let runtime = MemoryRuntime::new();
        runtime.set_failure(FailPoint::Build, true);
        let mut engine = Engine::new(&runtime, host.collaborators(), EngineSettings::default());

        let mut spec = ImageSpec::new(app());
        spec.build = Some(BuildSpec {
            base_image: Some(ImageRef::new("debian", "12")),
            ..Default::default()
        });

        let err = engine.build(&spec).await.unwrap_err();
        assert!(matches!(err, ConvergeError::Build { .. }));
        let dangling = runtime.list_images(&ImageFilters::dangling()).await.unwrap();
        assert!(dangling.is_empty());
    }
}
