// ABOUTME: Diagnostics accumulator for non-fatal warnings during convergence.
// ABOUTME: Collects swallowed failures that shouldn't fail a run but should be shown to users.

use serde::Serialize;

/// Collects non-fatal warnings during convergence.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!(kind = ?warning.kind, "{}", warning.message);
        self.warnings.push(warning);
    }

    /// Get all collected warnings.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Check if any warnings were collected.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Number of warnings of one kind.
    pub fn count(&self, kind: WarningKind) -> usize {
        self.warnings.iter().filter(|w| w.kind == kind).count()
    }

    /// Hand the collected warnings to the caller, leaving the accumulator empty.
    pub fn drain(&mut self) -> Vec<Warning> {
        std::mem::take(&mut self.warnings)
    }
}

/// A non-fatal warning collected during convergence.
#[derive(Debug, Clone, Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    /// An image could not be removed because a container still uses it.
    pub fn image_in_use(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::ImageInUse,
            message: message.into(),
        }
    }

    /// An image removal failed for another reason.
    pub fn image_removal(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::ImageRemoval,
            message: message.into(),
        }
    }

    /// A best-effort action failed and was skipped.
    pub fn try_action(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::TryActionFailed,
            message: message.into(),
        }
    }

    /// A transient identity could not be deregistered.
    pub fn deregistration(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::Deregistration,
            message: message.into(),
        }
    }

    /// A container could not be stopped or removed during a forced sweep.
    pub fn container_cleanup(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::ContainerCleanup,
            message: message.into(),
        }
    }
}

/// Categories of warnings that can occur during convergence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// Image still referenced by a container.
    ImageInUse,
    /// Image removal failed for a reason other than use.
    ImageRemoval,
    /// A try_* action failed.
    TryActionFailed,
    /// Failed to deregister an identity.
    Deregistration,
    /// Failed to stop or remove a container while sweeping.
    ContainerCleanup,
}
