// ABOUTME: Test support utilities.
// ABOUTME: Provides tracing setup and a simulated host with filesystem collaborators in a temp dir.

use shipwright::converge::{Collaborators, ContainerSpec, Engine, EngineSettings};
use shipwright::provision::{FsProvisioner, InitScriptWriter, KeyFileRegistry};
use shipwright::runtime::MemoryRuntime;
use shipwright::types::{ImageRef, LogicalName};
use std::path::PathBuf;
use std::sync::Once;
use tempfile::TempDir;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env()
            .add_directive("shipwright=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// A simulated runtime plus real filesystem collaborators rooted in a temp dir.
#[allow(dead_code)]
pub struct TestHost {
    pub runtime: MemoryRuntime,
    pub provisioner: FsProvisioner,
    pub identities: KeyFileRegistry,
    pub scripts: InitScriptWriter,
    root: TempDir,
}

#[allow(dead_code)]
impl TestHost {
    pub fn new() -> Self {
        init_tracing();
        let root = tempfile::tempdir().unwrap();
        let cache = root.path().join("cache");
        Self {
            runtime: MemoryRuntime::new(),
            provisioner: FsProvisioner::new(&cache, "/etc/chef/secure"),
            identities: KeyFileRegistry::new(&cache),
            scripts: InitScriptWriter::new(root.path().join("init.d"), "docker"),
            root,
        }
    }

    pub fn engine(&self) -> Engine<'_, MemoryRuntime> {
        let collaborators = Collaborators {
            provisioner: &self.provisioner,
            identities: &self.identities,
            scripts: &self.scripts,
        };
        Engine::new(&self.runtime, collaborators, EngineSettings::default())
    }

    pub fn root(&self) -> PathBuf {
        self.root.path().to_path_buf()
    }

    pub fn script_path(&self, name: &str) -> PathBuf {
        self.scripts.path(name)
    }
}

#[allow(dead_code)]
pub fn image(reference: &str) -> ImageRef {
    ImageRef::parse(reference).unwrap()
}

/// Spec for `name` running `image`, with the given env entries.
#[allow(dead_code)]
pub fn container_spec(name: &str, image: &ImageRef, env: &[&str]) -> ContainerSpec {
    ContainerSpec::new(LogicalName::new(name).unwrap(), image.clone())
        .with_create_option("Env", serde_json::json!(env))
}
