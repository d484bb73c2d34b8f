// ABOUTME: Configuration types and parsing for shipwright.yml.
// ABOUTME: Declares runtime settings, paths and the image and container resources to converge.

mod deserialize;
mod env_value;
mod init;

pub use deserialize::PortMapping;
pub use env_value::{EnvValue, resolve_env_entries, resolve_optional};
pub use init::init_config;

use crate::converge::{
    ContainerAction, ContainerResource, ContainerSpec, DEFAULT_KEEP_RELEASES,
    DEFAULT_SECURE_MOUNT, DesiredState, EngineSettings, ImageAction, ImageResource, ImageSpec,
};
use crate::error::{Error, Result};
use crate::provision::{BuildSpec, Secrets};
use crate::runtime::{RegistryAuth, RuntimeConfig};
use crate::types::{ImageRef, LogicalName};
use deserialize::deserialize_ports;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const CONFIG_FILENAME: &str = "shipwright.yml";
pub const CONFIG_FILENAME_ALT: &str = "shipwright.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".shipwright/config.yml";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub runtime: RuntimeConfig,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default = "default_true")]
    pub sweep_dangling: bool,

    #[serde(default)]
    pub images: Vec<ImageConfig>,

    #[serde(default)]
    pub containers: Vec<ContainerConfig>,
}

/// Host locations for provisioning data and scripts.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    /// Root of secure directories and container id files.
    pub cache: PathBuf,
    /// Directory receiving the wrapper scripts.
    pub init_scripts: PathBuf,
    /// Mount point of the secure directory inside containers.
    pub secure_mount: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            cache: PathBuf::from("/var/cache/shipwright"),
            init_scripts: PathBuf::from("/etc/init.d"),
            secure_mount: PathBuf::from(DEFAULT_SECURE_MOUNT),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageConfig {
    /// Repository, optionally with a tag when `tag` is absent.
    pub name: String,

    #[serde(default)]
    pub tag: Option<String>,

    #[serde(default)]
    pub action: ImageAction,

    #[serde(default)]
    pub build: Option<BuildSpec>,

    #[serde(default)]
    pub auth: Option<AuthConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    pub username: String,
    pub password: EnvValue,
    #[serde(default)]
    pub server: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContainerConfig {
    pub name: LogicalName,

    pub image: ImageRef,

    #[serde(default)]
    pub action: ContainerAction,

    #[serde(default = "default_keep_releases")]
    pub keep_releases: u32,

    #[serde(default)]
    pub command: Vec<String>,

    #[serde(default)]
    pub env: BTreeMap<String, EnvValue>,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    #[serde(default)]
    pub binds: Vec<String>,

    #[serde(default, deserialize_with = "deserialize_ports")]
    pub ports: Vec<PortMapping>,

    /// Raw container-level options, in the runtime's vocabulary.
    #[serde(default)]
    pub create_options: Map<String, Value>,

    /// Raw host-level options, in the runtime's vocabulary.
    #[serde(default)]
    pub start_options: Map<String, Value>,

    #[serde(default)]
    pub secrets: SecretsConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SecretsConfig {
    pub encrypted_data_bag_secret: Option<EnvValue>,
    pub validation_key: Option<EnvValue>,
}

impl SecretsConfig {
    pub fn resolve(&self) -> Result<Secrets> {
        Ok(Secrets {
            encrypted_data_bag_secret: resolve_optional(self.encrypted_data_bag_secret.as_ref())?,
            validation_key: resolve_optional(self.validation_key.as_ref())?,
        })
    }
}

fn default_true() -> bool {
    true
}

fn default_keep_releases() -> u32 {
    DEFAULT_KEEP_RELEASES
}

impl ImageConfig {
    pub fn reference(&self) -> Result<ImageRef> {
        let invalid = |e: crate::types::ParseImageRefError| Error::InvalidConfig(e.to_string());
        match &self.tag {
            None => ImageRef::parse(&self.name).map_err(invalid),
            Some(tag) => {
                let repository = ImageRef::parse(&self.name).map_err(invalid)?;
                if repository.repository() != self.name {
                    return Err(Error::InvalidConfig(format!(
                        "image {} has a tag in both name and tag",
                        self.name
                    )));
                }
                ImageRef::parse(&format!("{}:{}", self.name, tag)).map_err(invalid)
            }
        }
    }

    pub fn spec(&self) -> Result<ImageSpec> {
        let mut spec = ImageSpec::new(self.reference()?);
        spec.build = self.build.clone();
        spec.auth = self
            .auth
            .as_ref()
            .map(|auth| {
                Ok::<_, Error>(RegistryAuth {
                    username: auth.username.clone(),
                    password: auth.password.resolve()?,
                    server: auth.server.clone(),
                })
            })
            .transpose()?;

        let needs_build = matches!(self.action, ImageAction::Build | ImageAction::BuildIfMissing);
        if needs_build && spec.build.is_none() {
            return Err(Error::InvalidConfig(format!(
                "image {} uses action {} but has no build section",
                spec.image, self.action
            )));
        }
        Ok(spec)
    }
}

/// Append `items` to the list stored under `key`.
fn extend_list(options: &mut Map<String, Value>, key: &str, items: Vec<String>) {
    if items.is_empty() {
        return;
    }
    let entry = options
        .entry(key.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    if let Value::Array(list) = entry {
        list.extend(items.into_iter().map(Value::String));
    }
}

fn object_entry<'a>(options: &'a mut Map<String, Value>, key: &str) -> Option<&'a mut Map<String, Value>> {
    options
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
}

impl ContainerConfig {
    /// Fold the convenience fields into the raw option maps.
    pub fn spec(&self) -> Result<ContainerSpec> {
        let mut create_options = self.create_options.clone();
        let mut start_options = self.start_options.clone();

        extend_list(&mut create_options, "Env", resolve_env_entries(&self.env)?);
        extend_list(&mut start_options, "Binds", self.binds.clone());

        if !self.labels.is_empty() {
            let labels = object_entry(&mut create_options, "Labels").ok_or_else(|| {
                Error::InvalidConfig(format!("{}: create_options.Labels must be a map", self.name))
            })?;
            for (k, v) in &self.labels {
                labels.insert(k.clone(), Value::String(v.clone()));
            }
        }

        for port in &self.ports {
            let exposed = object_entry(&mut create_options, "ExposedPorts").ok_or_else(|| {
                Error::InvalidConfig(format!("{}: ExposedPorts must be a map", self.name))
            })?;
            exposed.insert(port.key(), json!({}));

            let bindings = object_entry(&mut start_options, "PortBindings").ok_or_else(|| {
                Error::InvalidConfig(format!("{}: PortBindings must be a map", self.name))
            })?;
            let binding = json!({
                "HostIp": port.host_ip.clone().unwrap_or_default(),
                "HostPort": port.host_port.map(|p| p.to_string()).unwrap_or_default(),
            });
            match bindings
                .entry(port.key())
                .or_insert_with(|| Value::Array(Vec::new()))
            {
                Value::Array(list) => list.push(binding),
                _ => {
                    return Err(Error::InvalidConfig(format!(
                        "{}: PortBindings.{} must be a list",
                        self.name,
                        port.key()
                    )));
                }
            }
        }

        let mut spec = ContainerSpec::new(self.name.clone(), self.image.clone())
            .with_keep_releases(self.keep_releases)
            .with_command(self.command.clone());
        spec.create_options = create_options;
        spec.start_options = start_options;
        spec.secrets = self.secrets.resolve()?;
        Ok(spec)
    }
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            stop_timeout: self.runtime.stop_timeout,
            secure_mount: self.paths.secure_mount.clone(),
        }
    }

    /// Resolve every declared resource, failing on the first invalid one.
    pub fn desired_state(&self) -> Result<DesiredState> {
        let images = self
            .images
            .iter()
            .map(|image| -> Result<ImageResource> {
                Ok(ImageResource {
                    action: image.action,
                    spec: image.spec()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let containers = self
            .containers
            .iter()
            .map(|container| -> Result<ContainerResource> {
                Ok(ContainerResource {
                    action: container.action,
                    spec: container.spec()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(DesiredState {
            images,
            containers,
            sweep_dangling: self.sweep_dangling,
        })
    }

    /// The declared image whose reference matches `reference`.
    pub fn image(&self, reference: &ImageRef) -> Result<Option<&ImageConfig>> {
        for image in &self.images {
            if image.reference()? == *reference {
                return Ok(Some(image));
            }
        }
        Ok(None)
    }

    pub fn container(&self, name: &str) -> Option<&ContainerConfig> {
        self.containers.iter().find(|c| c.name.as_str() == name)
    }

    pub fn template() -> Self {
        Config {
            runtime: RuntimeConfig::default(),
            paths: PathsConfig::default(),
            sweep_dangling: true,
            images: vec![ImageConfig {
                name: "my-app".to_string(),
                tag: Some("latest".to_string()),
                action: ImageAction::PullIfMissing,
                build: None,
                auth: None,
            }],
            containers: Vec::new(),
        }
    }
}
