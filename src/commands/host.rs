// ABOUTME: Wires the runtime and filesystem collaborators into a convergence engine.
// ABOUTME: Dry runs use an in-memory host and scratch directories instead.

use shipwright::config::Config;
use shipwright::converge::{Collaborators, DesiredState, Engine};
use shipwright::error::Result;
use shipwright::output::Output;
use shipwright::provision::{FsProvisioner, InitScriptWriter, KeyFileRegistry};
use shipwright::runtime::{self, BollardRuntime, ContainerRuntime, MemoryRuntime};
use std::collections::HashSet;
use tempfile::TempDir;

enum HostRuntime {
    Live(BollardRuntime),
    Simulated(MemoryRuntime),
}

/// Runtime plus collaborators for one run.
pub struct Host {
    runtime: HostRuntime,
    provisioner: FsProvisioner,
    identities: KeyFileRegistry,
    scripts: InitScriptWriter,
    // Dry runs write provisioning data here
    _scratch: Option<TempDir>,
}

impl Host {
    /// Connect to the local runtime.
    pub async fn open(config: &Config, output: &Output) -> Result<Self> {
        output.progress("→ Detecting runtime...");
        let runtime = runtime::connect(&config.runtime).await?;
        output.progress(&format!("→ Connected to {}", runtime.runtime_type()));

        let paths = &config.paths;
        Ok(Self {
            scripts: InitScriptWriter::new(&paths.init_scripts, runtime.runtime_type().to_string()),
            provisioner: FsProvisioner::new(&paths.cache, &paths.secure_mount),
            identities: KeyFileRegistry::new(&paths.cache),
            runtime: HostRuntime::Live(runtime),
            _scratch: None,
        })
    }

    /// An empty simulated host where every declared image is available from
    /// the registry and every undeclared base image is already local.
    pub fn simulated(config: &Config, desired: &DesiredState, output: &Output) -> Result<Self> {
        output.progress("→ Dry run against a simulated host");
        let scratch = tempfile::Builder::new()
            .prefix("shipwright-dry-run-")
            .tempdir()?;

        let memory = MemoryRuntime::new();
        let mut declared = HashSet::new();
        for resource in &desired.images {
            memory.publish(&resource.spec.image);
            declared.insert(resource.spec.image.clone());
        }
        for resource in &desired.containers {
            if declared.insert(resource.spec.base_image.clone()) {
                memory.seed_image(&resource.spec.base_image);
            }
        }

        let cache = scratch.path().join("cache");
        Ok(Self {
            provisioner: FsProvisioner::new(&cache, &config.paths.secure_mount),
            identities: KeyFileRegistry::new(&cache),
            scripts: InitScriptWriter::new(scratch.path().join("init.d"), "docker"),
            runtime: HostRuntime::Simulated(memory),
            _scratch: Some(scratch),
        })
    }

    pub async fn for_run(
        config: &Config,
        desired: &DesiredState,
        dry_run: bool,
        output: &Output,
    ) -> Result<Self> {
        if dry_run {
            Self::simulated(config, desired, output)
        } else {
            Self::open(config, output).await
        }
    }

    fn runtime(&self) -> &(dyn ContainerRuntime + 'static) {
        match &self.runtime {
            HostRuntime::Live(runtime) => runtime,
            HostRuntime::Simulated(runtime) => runtime,
        }
    }

    pub fn engine(&self, config: &Config) -> Engine<'_, dyn ContainerRuntime> {
        let collaborators = Collaborators {
            provisioner: &self.provisioner,
            identities: &self.identities,
            scripts: &self.scripts,
        };
        Engine::new(self.runtime(), collaborators, config.engine_settings())
    }
}
