// ABOUTME: Scoped build context directory.
// ABOUTME: Staged contexts live in a temp dir removed on drop; user-supplied ones are left alone.

use super::ProvisionError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Directory handed to the image builder.
#[derive(Debug)]
pub enum BuildContext {
    /// Created for this build and deleted when dropped, on every exit path.
    Staged(TempDir),
    /// Supplied by the user.
    Provided(PathBuf),
}

impl BuildContext {
    /// Create an empty temporary context.
    pub fn staged() -> Result<Self, ProvisionError> {
        let dir = tempfile::Builder::new()
            .prefix("shipwright-build-")
            .tempdir()
            .map_err(|e| ProvisionError::io("create", &std::env::temp_dir(), e))?;
        Ok(Self::Staged(dir))
    }

    pub fn provided(path: impl Into<PathBuf>) -> Self {
        Self::Provided(path.into())
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Staged(dir) => dir.path(),
            Self::Provided(path) => path,
        }
    }

    pub fn is_staged(&self) -> bool {
        matches!(self, Self::Staged(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staged_context_is_removed_on_drop() {
        let context = BuildContext::staged().unwrap();
        let path = context.path().to_path_buf();
        std::fs::write(path.join("Dockerfile"), "FROM scratch\n").unwrap();
        assert!(path.is_dir());

        drop(context);
        assert!(!path.exists());
    }

    #[test]
    fn provided_context_survives_drop() {
        let dir = tempfile::tempdir().unwrap();
        let context = BuildContext::provided(dir.path());
        assert!(!context.is_staged());
        drop(context);
        assert!(dir.path().is_dir());
    }
}
