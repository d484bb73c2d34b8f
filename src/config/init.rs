// ABOUTME: Config scaffolding for new hosts.
// ABOUTME: Creates shipwright.yml template files.

use std::path::Path;

use crate::error::{Error, Result};
use crate::types::{ImageRef, LogicalName};

use super::{CONFIG_FILENAME, Config};

pub fn init_config(dir: &Path, name: Option<&str>, image: Option<&str>, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let name = LogicalName::new(name.unwrap_or("my-app"))
        .map_err(|e| Error::InvalidConfig(e.to_string()))?;
    let image = match image {
        Some(i) => ImageRef::parse(i).map_err(|e| Error::InvalidConfig(e.to_string()))?,
        None => ImageRef::new(name.as_str(), "latest"),
    };

    let yaml = generate_template_yaml(&Config::template(), &name, &image);
    std::fs::write(&config_path, yaml)?;

    Ok(())
}

fn generate_template_yaml(config: &Config, name: &LogicalName, image: &ImageRef) -> String {
    format!(
        r#"runtime:
  # docker or podman; auto-detected when omitted
  # runtime: docker
  stop_timeout: {stop_timeout}
paths:
  cache: {cache}
  init_scripts: {init_scripts}
  secure_mount: {secure_mount}
sweep_dangling: {sweep}
images:
  - name: {repository}
    tag: {tag}
    action: pull_if_missing
containers:
  - name: {name}
    image: {image}
    action: create_and_rotate
    keep_releases: 3
    # ports: ["8080:80"]
    # env:
    #   DATABASE_URL: {{ env: DATABASE_URL }}
"#,
        stop_timeout = humantime_serde::re::humantime::format_duration(config.runtime.stop_timeout),
        cache = config.paths.cache.display(),
        init_scripts = config.paths.init_scripts.display(),
        secure_mount = config.paths.secure_mount.display(),
        sweep = config.sweep_dangling,
        repository = image.repository(),
        tag = image.tag(),
        name = name,
        image = image,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_round_trips_through_the_parser() {
        let dir = tempfile::tempdir().unwrap();
        init_config(dir.path(), Some("web"), Some("registry:5000/web:v2"), false).unwrap();

        let config = Config::load(&dir.path().join(CONFIG_FILENAME)).unwrap();
        assert_eq!(config.containers[0].name.as_str(), "web");
        assert_eq!(config.images[0].reference().unwrap().to_string(), "registry:5000/web:v2");
        assert_eq!(config.runtime.stop_timeout, std::time::Duration::from_secs(10));
    }

    #[test]
    fn refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        init_config(dir.path(), None, None, false).unwrap();
        let err = init_config(dir.path(), None, None, false).unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
        init_config(dir.path(), None, None, true).unwrap();
    }
}
