// ABOUTME: In-process container runtime that simulates a single host.
// ABOUTME: Backs --dry-run and the convergence tests, with failure injection.

use crate::runtime::traits::sealed::Sealed;
use crate::runtime::traits::{
    BuildRequest, ContainerError, ContainerFilters, ContainerOps, ContainerRecord,
    ContainerSummary, CreateRequest, ImageError, ImageFilters, ImageOps, ImageRecord,
    RegistryAuth, RuntimeInfo, RuntimeInfoError, RuntimeMetadata,
};
use crate::types::{ContainerId, ImageId, ImageRef};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;

const EPOCH: i64 = 1_700_000_000;
const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Operations that can be made to fail on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    Pull,
    Push,
    Build,
    Create,
    Start,
    Rename,
}

/// How a container reacts to stop and kill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBehavior {
    /// Stops normally.
    Obedient,
    /// Ignores stop, dies on kill.
    IgnoresStop,
    /// Ignores both stop and kill.
    Unkillable,
    /// Stops normally and is then removed, like a `--rm` container.
    AutoRemove,
}

#[derive(Debug, Clone)]
struct StoredImage {
    tags: Vec<ImageRef>,
    created_at: i64,
}

#[derive(Debug, Clone)]
struct StoredContainer {
    id: ContainerId,
    name: String,
    image_id: ImageId,
    config: Value,
    host_config: Value,
    running: bool,
    finished_at: i64,
    behavior: StopBehavior,
}

#[derive(Debug, Default)]
struct HostState {
    images: BTreeMap<String, StoredImage>,
    containers: Vec<StoredContainer>,
    registry: HashMap<ImageRef, ImageId>,
    pushed: Vec<ImageRef>,
    failures: HashSet<FailPoint>,
    vanishing: HashSet<String>,
    clock: i64,
    counter: u64,
}

impl HostState {
    fn tick(&mut self) -> i64 {
        self.clock += 1;
        EPOCH + self.clock
    }

    /// Exit times carry nanoseconds, like a real runtime's `FinishedAt`.
    fn exit_time(&mut self) -> i64 {
        self.tick() * NANOS_PER_SECOND
    }

    fn next_hex(&mut self) -> String {
        self.counter += 1;
        format!("{:064x}", self.counter)
    }

    fn image_id_for(&self, reference: &ImageRef) -> Option<ImageId> {
        self.images
            .iter()
            .find(|(_, image)| image.tags.contains(reference))
            .map(|(id, _)| ImageId::new(id.clone()))
    }

    fn resolve_image(&self, name: &str) -> Option<ImageId> {
        if self.images.contains_key(name) {
            return Some(ImageId::new(name));
        }
        ImageRef::parse(name)
            .ok()
            .and_then(|reference| self.image_id_for(&reference))
    }

    /// Point `reference` at `id`, untagging whatever held it before.
    fn move_tag(&mut self, id: &ImageId, reference: &ImageRef) {
        for image in self.images.values_mut() {
            image.tags.retain(|t| t != reference);
        }
        if let Some(image) = self.images.get_mut(id.as_str())
            && !image.tags.contains(reference)
        {
            image.tags.push(reference.clone());
        }
    }

    fn insert_image(&mut self, id: &ImageId) {
        let created_at = self.tick();
        self.images.entry(id.to_string()).or_insert(StoredImage {
            tags: Vec::new(),
            created_at,
        });
    }

    fn container(&self, key: &str) -> Option<&StoredContainer> {
        self.containers
            .iter()
            .find(|c| c.id.as_str() == key || c.name == key)
    }

    fn container_mut(&mut self, key: &str) -> Option<&mut StoredContainer> {
        self.containers
            .iter_mut()
            .find(|c| c.id.as_str() == key || c.name == key)
    }

    fn remove_container(&mut self, key: &str) {
        self.containers.retain(|c| c.id.as_str() != key && c.name != key);
    }

    fn fails(&self, point: FailPoint) -> bool {
        self.failures.contains(&point)
    }
}

fn image_record(id: &str, image: &StoredImage) -> ImageRecord {
    ImageRecord {
        id: ImageId::new(id),
        tags: image.tags.clone(),
        created_at: image.created_at,
    }
}

/// A container host held in memory.
///
/// Configuration is echoed back the way a real runtime does: the create
/// options plus `Image`, `Cmd` and a default `Env` entry, with list order
/// reversed so callers must normalize before comparing.
#[derive(Debug, Default)]
pub struct MemoryRuntime {
    state: Mutex<HostState>,
}

impl MemoryRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `reference` available in the registry under a fresh id and return it.
    pub fn publish(&self, reference: &ImageRef) -> ImageId {
        let mut state = self.state.lock();
        let id = ImageId::new(format!("sha256:{}", state.next_hex()));
        state.registry.insert(reference.clone(), id.clone());
        id
    }

    /// Put `reference` on the host directly, as if pulled earlier.
    pub fn seed_image(&self, reference: &ImageRef) -> ImageId {
        let mut state = self.state.lock();
        let id = ImageId::new(format!("sha256:{}", state.next_hex()));
        state.insert_image(&id);
        state.move_tag(&id, reference);
        id
    }

    /// Make every subsequent call of `point` fail until cleared.
    pub fn set_failure(&self, point: FailPoint, failing: bool) {
        let mut state = self.state.lock();
        if failing {
            state.failures.insert(point);
        } else {
            state.failures.remove(&point);
        }
    }

    /// Change how a container reacts to stop and kill.
    pub fn set_stop_behavior(&self, key: &str, behavior: StopBehavior) {
        if let Some(container) = self.state.lock().container_mut(key) {
            container.behavior = behavior;
        }
    }

    /// Remove a container the next time it is inspected, as if another
    /// client deleted it after it was listed.
    pub fn vanish_on_inspect(&self, key: &str) {
        self.state.lock().vanishing.insert(key.to_string());
    }

    /// Mark a running container as exited at the next clock tick.
    pub fn exit(&self, key: &str) {
        let mut state = self.state.lock();
        let now = state.exit_time();
        if let Some(container) = state.container_mut(key)
            && container.running
        {
            container.running = false;
            container.finished_at = now;
        }
    }

    /// Names of every container in creation order.
    pub fn container_names(&self) -> Vec<String> {
        self.state
            .lock()
            .containers
            .iter()
            .map(|c| c.name.clone())
            .collect()
    }

    /// Ids of every local image.
    pub fn image_ids(&self) -> Vec<ImageId> {
        self.state
            .lock()
            .images
            .keys()
            .map(|id| ImageId::new(id.clone()))
            .collect()
    }

    /// References pushed so far.
    pub fn pushed(&self) -> Vec<ImageRef> {
        self.state.lock().pushed.clone()
    }

    fn echo_config(request: &CreateRequest, image_id: &ImageId) -> Value {
        let mut config: Map<String, Value> = request.create_options.clone();
        config.insert("Image".to_string(), Value::String(image_id.to_string()));
        if !request.command.is_empty() {
            config.insert("Cmd".to_string(), serde_json::json!(request.command));
        }

        let mut env: Vec<Value> = config
            .get("Env")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        env.push(Value::String(
            "PATH=/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin".to_string(),
        ));
        env.reverse();
        config.insert("Env".to_string(), Value::Array(env));

        Value::Object(config)
    }
}

impl Sealed for MemoryRuntime {}

#[async_trait]
impl RuntimeInfo for MemoryRuntime {
    async fn info(&self) -> Result<RuntimeMetadata, RuntimeInfoError> {
        Ok(RuntimeMetadata {
            name: "memory".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        })
    }

    async fn ping(&self) -> Result<(), RuntimeInfoError> {
        Ok(())
    }
}

#[async_trait]
impl ImageOps for MemoryRuntime {
    async fn inspect_image(&self, reference: &ImageRef) -> Result<ImageRecord, ImageError> {
        let state = self.state.lock();
        let id = state
            .image_id_for(reference)
            .ok_or_else(|| ImageError::NotFound(reference.to_string()))?;
        let image = state
            .images
            .get(id.as_str())
            .ok_or_else(|| ImageError::NotFound(reference.to_string()))?;
        Ok(image_record(id.as_str(), image))
    }

    async fn image_exists(&self, reference: &ImageRef) -> Result<bool, ImageError> {
        Ok(self.state.lock().image_id_for(reference).is_some())
    }

    async fn pull_image(
        &self,
        reference: &ImageRef,
        _auth: Option<&RegistryAuth>,
    ) -> Result<ImageId, ImageError> {
        let mut state = self.state.lock();
        if state.fails(FailPoint::Pull) {
            return Err(ImageError::PullFailed(format!(
                "{}: registry unreachable",
                reference
            )));
        }
        let id = state.registry.get(reference).cloned().ok_or_else(|| {
            ImageError::PullFailed(format!("{}: manifest unknown", reference))
        })?;
        state.insert_image(&id);
        state.move_tag(&id, reference);
        Ok(id)
    }

    async fn push_image(
        &self,
        reference: &ImageRef,
        _auth: Option<&RegistryAuth>,
    ) -> Result<(), ImageError> {
        let mut state = self.state.lock();
        let id = state
            .image_id_for(reference)
            .ok_or_else(|| ImageError::NotFound(reference.to_string()))?;
        if state.fails(FailPoint::Push) {
            return Err(ImageError::PushFailed(format!(
                "{}: denied: requested access to the resource is denied",
                reference
            )));
        }
        state.registry.insert(reference.clone(), id);
        state.pushed.push(reference.clone());
        Ok(())
    }

    async fn build_image(&self, request: &BuildRequest) -> Result<ImageRecord, ImageError> {
        if !request.context.join("Dockerfile").is_file() {
            return Err(ImageError::BuildFailed(format!(
                "{}: no Dockerfile in {}",
                request.image,
                request.context.display()
            )));
        }

        let mut state = self.state.lock();
        if state.fails(FailPoint::Build) {
            // A failed build still leaves its intermediate layer behind
            let layer = ImageId::new(format!("sha256:{}", state.next_hex()));
            state.insert_image(&layer);
            return Err(ImageError::BuildFailed(format!(
                "{}: The command '/bin/sh -c chef-client' returned a non-zero code: 1",
                request.image
            )));
        }

        let id = ImageId::new(format!("sha256:{}", state.next_hex()));
        state.insert_image(&id);
        state.move_tag(&id, &request.image);
        let image = state
            .images
            .get(id.as_str())
            .ok_or_else(|| ImageError::BuildFailed(request.image.to_string()))?;
        Ok(image_record(id.as_str(), image))
    }

    async fn tag_image(&self, id: &ImageId, reference: &ImageRef) -> Result<(), ImageError> {
        let mut state = self.state.lock();
        if !state.images.contains_key(id.as_str()) {
            return Err(ImageError::NotFound(id.to_string()));
        }
        state.move_tag(id, reference);
        Ok(())
    }

    async fn remove_image(&self, id: &ImageId, force: bool) -> Result<(), ImageError> {
        let mut state = self.state.lock();
        if !state.images.contains_key(id.as_str()) {
            return Err(ImageError::NotFound(id.to_string()));
        }
        if !force {
            if let Some(user) = state.containers.iter().find(|c| &c.image_id == id) {
                return Err(ImageError::InUse(format!(
                    "{}: image is being used by container {}",
                    id.short(),
                    user.id.short()
                )));
            }
        }
        state.images.remove(id.as_str());
        Ok(())
    }

    async fn list_images(&self, filters: &ImageFilters) -> Result<Vec<ImageRecord>, ImageError> {
        let state = self.state.lock();
        Ok(state
            .images
            .iter()
            .filter(|(_, image)| match filters.dangling {
                Some(dangling) => image.tags.is_empty() == dangling,
                None => true,
            })
            .map(|(id, image)| image_record(id, image))
            .collect())
    }
}

#[async_trait]
impl ContainerOps for MemoryRuntime {
    async fn create_container(
        &self,
        request: &CreateRequest,
    ) -> Result<ContainerId, ContainerError> {
        let mut state = self.state.lock();
        if state.fails(FailPoint::Create) {
            return Err(ContainerError::Runtime(format!(
                "{}: create failed",
                request.name
            )));
        }
        if state.container(&request.name).is_some() {
            return Err(ContainerError::AlreadyExists(request.name.clone()));
        }
        let image_id = state
            .resolve_image(&request.image)
            .ok_or_else(|| ContainerError::ImageNotFound(request.image.clone()))?;

        let id = ContainerId::new(state.next_hex());
        let config = Self::echo_config(request, &image_id);
        state.containers.push(StoredContainer {
            id: id.clone(),
            name: request.name.clone(),
            image_id,
            config,
            host_config: Value::Object(request.start_options.clone()),
            running: false,
            finished_at: 0,
            behavior: StopBehavior::Obedient,
        });
        Ok(id)
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError> {
        let mut state = self.state.lock();
        if state.fails(FailPoint::Start) {
            return Err(ContainerError::Runtime(format!(
                "{}: OCI runtime create failed",
                id.short()
            )));
        }
        let container = state
            .container_mut(id.as_str())
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;
        if container.running {
            return Err(ContainerError::AlreadyRunning(id.to_string()));
        }
        container.running = true;
        Ok(())
    }

    async fn stop_container(
        &self,
        id: &ContainerId,
        _timeout: Duration,
    ) -> Result<(), ContainerError> {
        let mut state = self.state.lock();
        let now = state.exit_time();
        let container = state
            .container_mut(id.as_str())
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;
        if !container.running {
            return Err(ContainerError::NotRunning(id.to_string()));
        }
        let behavior = container.behavior;
        if matches!(behavior, StopBehavior::Obedient | StopBehavior::AutoRemove) {
            container.running = false;
            container.finished_at = now;
        }
        if behavior == StopBehavior::AutoRemove {
            state.remove_container(id.as_str());
        }
        Ok(())
    }

    async fn kill_container(&self, id: &ContainerId) -> Result<(), ContainerError> {
        let mut state = self.state.lock();
        let now = state.exit_time();
        let container = state
            .container_mut(id.as_str())
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;
        if !container.running {
            return Err(ContainerError::NotRunning(id.to_string()));
        }
        let behavior = container.behavior;
        if behavior != StopBehavior::Unkillable {
            container.running = false;
            container.finished_at = now;
        }
        if behavior == StopBehavior::AutoRemove {
            state.remove_container(id.as_str());
        }
        Ok(())
    }

    async fn remove_container(&self, id: &ContainerId, force: bool) -> Result<(), ContainerError> {
        let mut state = self.state.lock();
        let index = state
            .containers
            .iter()
            .position(|c| c.id == *id || c.name == id.as_str())
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;
        if state.containers[index].running && !force {
            return Err(ContainerError::AlreadyRunning(format!(
                "{}: stop the container before removing",
                id.short()
            )));
        }
        state.containers.remove(index);
        Ok(())
    }

    async fn rename_container(
        &self,
        id: &ContainerId,
        new_name: &str,
    ) -> Result<(), ContainerError> {
        let mut state = self.state.lock();
        if state.fails(FailPoint::Rename) {
            return Err(ContainerError::Runtime(format!(
                "{}: rename failed",
                id.short()
            )));
        }
        if let Some(holder) = state.container(new_name)
            && holder.id != *id
        {
            return Err(ContainerError::AlreadyExists(new_name.to_string()));
        }
        let container = state
            .container_mut(id.as_str())
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;
        container.name = new_name.to_string();
        Ok(())
    }

    async fn inspect_container(
        &self,
        id: &ContainerId,
    ) -> Result<ContainerRecord, ContainerError> {
        let mut state = self.state.lock();
        let vanished = state.container(id.as_str()).and_then(|c| {
            [c.id.as_str(), c.name.as_str()]
                .into_iter()
                .find(|key| state.vanishing.contains(*key))
                .map(str::to_string)
        });
        if let Some(key) = vanished {
            state.vanishing.remove(&key);
            state.remove_container(id.as_str());
        }
        let container = state
            .container(id.as_str())
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;
        Ok(ContainerRecord {
            id: container.id.clone(),
            unique_name: container.name.clone(),
            logical_name: ContainerRecord::identity_of(&container.config),
            parent_image_id: container.image_id.clone(),
            config: container.config.clone(),
            host_config: container.host_config.clone(),
            running: container.running,
            finished_at: container.finished_at,
        })
    }

    async fn container_exists(&self, name: &str) -> Result<bool, ContainerError> {
        Ok(self.state.lock().containers.iter().any(|c| c.name == name))
    }

    async fn list_containers(
        &self,
        filters: &ContainerFilters,
    ) -> Result<Vec<ContainerSummary>, ContainerError> {
        let state = self.state.lock();
        Ok(state
            .containers
            .iter()
            .filter(|c| filters.all || c.running)
            .filter(|c| {
                filters
                    .name
                    .as_ref()
                    .is_none_or(|name| c.name.contains(name.as_str()))
            })
            .map(|c| {
                let labels: HashMap<String, String> = c
                    .config
                    .get("Labels")
                    .and_then(Value::as_object)
                    .map(|labels| {
                        labels
                            .iter()
                            .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                            .collect()
                    })
                    .unwrap_or_default();
                ContainerSummary {
                    id: c.id.clone(),
                    name: c.name.clone(),
                    image: c.image_id.to_string(),
                    state: if c.running { "running" } else { "exited" }.to_string(),
                    labels,
                }
            })
            .filter(|summary| {
                filters
                    .labels
                    .iter()
                    .all(|(k, v)| summary.labels.get(k) == Some(v))
            })
            .collect())
    }
}
