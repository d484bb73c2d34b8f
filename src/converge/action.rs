// ABOUTME: Action enums, per-action outcomes and the apply entry point.
// ABOUTME: Dispatches declared resources to image and container convergence in order.

use super::cleanup::CleanupResult;
use super::spec::{ContainerSpec, ImageSpec};
use super::{ConvergeError, Engine};
use crate::diagnostics::Warning;
use crate::runtime::ContainerRuntime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What to do with a declared image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum ImageAction {
    #[default]
    PullIfMissing,
    TryPullIfMissing,
    Pull,
    TryPull,
    BuildIfMissing,
    Build,
    Push,
    RemoveIfUnused,
}

/// What to do with a declared container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum ContainerAction {
    CreateIfMissing,
    Create,
    #[default]
    CreateAndRotate,
    Stop,
    Remove,
}

impl fmt::Display for ImageAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImageAction::PullIfMissing => "pull_if_missing",
            ImageAction::TryPullIfMissing => "try_pull_if_missing",
            ImageAction::Pull => "pull",
            ImageAction::TryPull => "try_pull",
            ImageAction::BuildIfMissing => "build_if_missing",
            ImageAction::Build => "build",
            ImageAction::Push => "push",
            ImageAction::RemoveIfUnused => "remove_if_unused",
        };
        f.write_str(name)
    }
}

impl fmt::Display for ContainerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContainerAction::CreateIfMissing => "create_if_missing",
            ContainerAction::Create => "create",
            ContainerAction::CreateAndRotate => "create_and_rotate",
            ContainerAction::Stop => "stop",
            ContainerAction::Remove => "remove",
        };
        f.write_str(name)
    }
}

/// Result of one action: whether host state changed, and how.
#[derive(Debug, Clone, Serialize)]
pub struct ActionOutcome {
    pub target: String,
    pub action: String,
    pub updated: bool,
    pub summary: String,
}

impl ActionOutcome {
    pub fn new(
        target: impl Into<String>,
        action: impl Into<String>,
        updated: bool,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            target: target.into(),
            action: action.into(),
            updated,
            summary: summary.into(),
        }
    }

    pub(crate) fn unchanged(target: impl ToString, action: &str) -> Self {
        let target = target.to_string();
        let summary = format!("{} already up to date", target);
        Self::new(target, action, false, summary)
    }
}

/// A declared image and the action to take on it.
#[derive(Debug, Clone)]
pub struct ImageResource {
    pub action: ImageAction,
    pub spec: ImageSpec,
}

/// A declared container and the action to take on it.
#[derive(Debug, Clone)]
pub struct ContainerResource {
    pub action: ContainerAction,
    pub spec: ContainerSpec,
}

/// Everything a run should converge, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct DesiredState {
    pub images: Vec<ImageResource>,
    pub containers: Vec<ContainerResource>,
    /// Remove dangling images once every resource converged.
    pub sweep_dangling: bool,
}

/// What a full run did.
#[derive(Debug, Default, Serialize)]
pub struct ApplyReport {
    pub outcomes: Vec<ActionOutcome>,
    pub warnings: Vec<Warning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sweep: Option<CleanupResult>,
}

impl ApplyReport {
    pub fn updated(&self) -> bool {
        self.outcomes.iter().any(|o| o.updated)
            || self.sweep.as_ref().is_some_and(|s| !s.removed.is_empty())
    }
}

impl<R: ContainerRuntime + ?Sized> Engine<'_, R> {
    pub async fn execute_image(
        &mut self,
        action: ImageAction,
        spec: &ImageSpec,
    ) -> Result<ActionOutcome, ConvergeError> {
        tracing::debug!(image = %spec.image, %action, "converging image");
        match action {
            ImageAction::PullIfMissing => self.pull_if_missing(spec).await,
            ImageAction::TryPullIfMissing => Ok(self.try_pull_if_missing(spec).await),
            ImageAction::Pull => self.pull(spec).await,
            ImageAction::TryPull => Ok(self.try_pull(spec).await),
            ImageAction::BuildIfMissing => self.build_if_missing(spec).await,
            ImageAction::Build => self.build(spec).await,
            ImageAction::Push => self.push(spec).await,
            ImageAction::RemoveIfUnused => self.remove_if_unused(spec).await,
        }
    }

    pub async fn execute_container(
        &mut self,
        action: ContainerAction,
        spec: &ContainerSpec,
    ) -> Result<ActionOutcome, ConvergeError> {
        tracing::debug!(container = spec.name(), %action, "converging container");
        let mut outcome = match action {
            ContainerAction::CreateIfMissing => self.create_if_missing(spec).await?,
            ContainerAction::Create => self.create(spec).await?,
            ContainerAction::CreateAndRotate => self.create_and_rotate(spec).await?,
            ContainerAction::Stop => self.stop(spec.name()).await?,
            ContainerAction::Remove => self.remove(spec.name()).await?,
        };
        outcome.action = action.to_string();
        Ok(outcome)
    }

    /// Converge images, then containers, then sweep dangling images.
    ///
    /// Stops at the first failing action; warnings collected so far stay in
    /// [`Engine::diagnostics`].
    pub async fn apply(&mut self, desired: &DesiredState) -> Result<ApplyReport, ConvergeError> {
        let mut report = ApplyReport::default();

        for resource in &desired.images {
            let outcome = self.execute_image(resource.action, &resource.spec).await?;
            report.outcomes.push(outcome);
        }
        for resource in &desired.containers {
            let outcome = self
                .execute_container(resource.action, &resource.spec)
                .await?;
            report.outcomes.push(outcome);
        }
        if desired.sweep_dangling {
            report.sweep = Some(self.remove_dangling_images().await);
        }

        report.warnings = self.diagnostics.drain();
        Ok(report)
    }
}
