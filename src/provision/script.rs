// ABOUTME: SysV-style init wrapper script for the active container of a logical name.
// ABOUTME: Written executable under the init scripts directory, removed on teardown.

use super::{ProvisionError, WrapperScriptWriter, remove_file_if_exists};
use crate::types::ContainerId;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

/// Writes `<dir>/<name>` scripts that drive the container through the runtime CLI.
#[derive(Debug, Clone)]
pub struct InitScriptWriter {
    dir: PathBuf,
    cli: String,
}

impl InitScriptWriter {
    /// `cli` is the runtime command line tool invoked by the script (`docker` or `podman`).
    pub fn new(dir: impl Into<PathBuf>, cli: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            cli: cli.into(),
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    fn render(&self, name: &str, id: &ContainerId) -> String {
        format!(
            r#"#!/bin/sh
# {name}: managed by shipwright, regenerated on every rollout
CONTAINER_ID="{id}"
RUNTIME="{cli}"

case "$1" in
  start)
    exec "$RUNTIME" start "$CONTAINER_ID"
    ;;
  stop)
    exec "$RUNTIME" stop "$CONTAINER_ID"
    ;;
  restart)
    "$RUNTIME" stop "$CONTAINER_ID"
    exec "$RUNTIME" start "$CONTAINER_ID"
    ;;
  status)
    exec "$RUNTIME" inspect --format '{{{{.State.Status}}}}' "$CONTAINER_ID"
    ;;
  attach)
    exec "$RUNTIME" attach "$CONTAINER_ID"
    ;;
  *)
    echo "Usage: $0 {{start|stop|restart|status|attach}}" >&2
    exit 2
    ;;
esac
"#,
            name = name,
            id = id,
            cli = self.cli,
        )
    }
}

impl WrapperScriptWriter for InitScriptWriter {
    fn write(&self, name: &str, id: &ContainerId) -> Result<PathBuf, ProvisionError> {
        fs::create_dir_all(&self.dir).map_err(|e| ProvisionError::io("create", &self.dir, e))?;
        let path = self.path(name);
        fs::write(&path, self.render(name, id))
            .map_err(|e| ProvisionError::io("write", &path, e))?;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
            .map_err(|e| ProvisionError::io("chmod", &path, e))?;
        tracing::debug!(name, path = %path.display(), "wrote init script");
        Ok(path)
    }

    fn remove(&self, name: &str) -> Result<bool, ProvisionError> {
        remove_file_if_exists(&self.path(name))
    }
}
