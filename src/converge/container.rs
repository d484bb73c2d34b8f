// ABOUTME: Container convergence: candidate creation, adoption, rotation, stop and remove.
// ABOUTME: Rollout transitions consume self and return the next state on success.

use super::rotation::{excess, removal_queue};
use super::spec::ContainerSpec;
use super::state::{Candidate, Resolved, Rotated, Started};
use super::{ActionOutcome, ConvergeError, Engine};
use crate::naming::{generation_set, resolve_active, unique_name};
use crate::normalize;
use crate::provision::Secrets;
use crate::runtime::{
    ContainerError, ContainerFilters, ContainerRecord, ContainerRuntime, CreateRequest,
    IDENTITY_LABEL, ImageError, MANAGED_LABEL,
};
use crate::types::ContainerId;
use serde_json::{Map, Value};
use std::collections::VecDeque;

/// Environment variable carrying the logical name inside every generation.
pub const LOGICAL_NAME_ENV: &str = "SHIPWRIGHT_LOGICAL_NAME";

/// A rollout of one logical name, parameterized by its current state.
///
/// `changed` accumulates the updated signal: it is set whenever a container
/// was started, stopped, removed or renamed.
#[derive(Debug)]
#[must_use = "a rollout does nothing until driven to finish()"]
pub struct Rollout<S> {
    pub(crate) logical_name: String,
    pub(crate) keep_releases: u32,
    pub(crate) secrets: Secrets,
    pub(crate) changed: bool,
    pub(crate) state: S,
}

impl<S> Rollout<S> {
    pub fn logical_name(&self) -> &str {
        &self.logical_name
    }

    pub fn changed(&self) -> bool {
        self.changed
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    fn transition<T>(self, state: T) -> Rollout<T> {
        Rollout {
            logical_name: self.logical_name,
            keep_releases: self.keep_releases,
            secrets: self.secrets,
            changed: self.changed,
            state,
        }
    }
}

/// Host config prepared for comparison: links naming the container itself
/// are rewritten to the logical name so generations compare equal.
pub fn comparable_host_config(record: &ContainerRecord) -> Value {
    let mut host_config = record.host_config.clone();
    if let Some(links) = host_config.get_mut("Links").and_then(Value::as_array_mut) {
        for link in links.iter_mut() {
            let Some(text) = link.as_str() else { continue };
            // "/db:/web-0123456789ab/db"
            let mut parts: Vec<&str> = text.split('/').collect();
            if parts.len() > 2 && parts[2] == record.unique_name {
                parts[2] = &record.logical_name;
                *link = Value::String(parts.join("/"));
            }
        }
    }
    host_config
}

fn same_configuration(a: &ContainerRecord, b: &ContainerRecord) -> bool {
    normalize::equal(&a.config, &b.config)
        && normalize::equal(&comparable_host_config(a), &comparable_host_config(b))
}

fn push_unique(list: &mut Vec<Value>, value: String) {
    if !list.iter().any(|v| v.as_str() == Some(value.as_str())) {
        list.push(Value::String(value));
    }
}

fn string_list(map: &mut Map<String, Value>, key: &str) -> Vec<Value> {
    match map.remove(key) {
        Some(Value::Array(items)) => items,
        Some(Value::Null) | None => Vec::new(),
        Some(other) => vec![other],
    }
}

// =============================================================================
// Engine: container primitives
// =============================================================================

impl<R: ContainerRuntime + ?Sized> Engine<'_, R> {
    /// Create options with the identity keys injected.
    fn create_request(&self, spec: &ContainerSpec, name: String, image: String) -> CreateRequest {
        let logical = spec.name();

        let mut create_options = spec.create_options.clone();
        create_options.insert("Hostname".to_string(), Value::String(logical.to_string()));

        let mut labels = match create_options.remove("Labels") {
            Some(Value::Object(labels)) => labels,
            _ => Map::new(),
        };
        labels.insert(IDENTITY_LABEL.to_string(), Value::String(logical.to_string()));
        labels.insert(MANAGED_LABEL.to_string(), Value::String("true".to_string()));
        create_options.insert("Labels".to_string(), Value::Object(labels));

        let mut env = string_list(&mut create_options, "Env");
        push_unique(&mut env, format!("{}={}", LOGICAL_NAME_ENV, logical));
        create_options.insert("Env".to_string(), Value::Array(env));
        create_options.insert("Image".to_string(), Value::String(image.clone()));

        let mut start_options = spec.start_options.clone();
        let mut binds = string_list(&mut start_options, "Binds");
        let secure_dir = self.collaborators.provisioner.secure_dir(logical);
        push_unique(
            &mut binds,
            format!(
                "{}:{}",
                secure_dir.display(),
                self.settings.secure_mount.display()
            ),
        );
        start_options.insert("Binds".to_string(), Value::Array(binds));

        CreateRequest {
            name,
            image,
            command: spec.command.clone(),
            create_options,
            start_options,
        }
    }

    /// Stop a container, escalating to kill. Returns whether it was running.
    ///
    /// Fails if the container is still running after the kill.
    pub(crate) async fn stop_container(
        &mut self,
        record: &ContainerRecord,
    ) -> Result<bool, ConvergeError> {
        if !record.running {
            return Ok(false);
        }
        let stop_error = |reason: String| ConvergeError::Stop {
            name: record.unique_name.clone(),
            reason,
        };

        match self
            .runtime
            .stop_container(&record.id, self.settings.stop_timeout)
            .await
        {
            Ok(()) | Err(ContainerError::NotRunning(_)) => {}
            Err(ContainerError::NotFound(_)) => return Ok(false),
            Err(e) => return Err(stop_error(e.to_string())),
        }

        if self.is_running(&record.id).await? {
            tracing::warn!(container = %record.unique_name, "still running after stop, killing");
            match self.runtime.kill_container(&record.id).await {
                Ok(()) | Err(ContainerError::NotRunning(_)) => {}
                Err(ContainerError::NotFound(_)) => return Ok(true),
                Err(e) => return Err(stop_error(e.to_string())),
            }
            if self.is_running(&record.id).await? {
                return Err(stop_error("container is still running after kill".to_string()));
            }
        }

        tracing::info!(container = %record.unique_name, "stopped container");
        Ok(true)
    }

    async fn is_running(&self, id: &ContainerId) -> Result<bool, ConvergeError> {
        match self.runtime.inspect_container(id).await {
            Ok(record) => Ok(record.running),
            Err(ContainerError::NotFound(_)) => Ok(false),
            Err(e) => Err(ConvergeError::Runtime(e.to_string())),
        }
    }

    /// Stop, delete, then delete the parent image if nothing else uses it.
    pub(crate) async fn remove_container(
        &mut self,
        record: &ContainerRecord,
    ) -> Result<(), ConvergeError> {
        // The parent image is fixed for the container's lifetime
        let parent = record.parent_image_id.clone();

        self.stop_container(record).await?;
        match self.runtime.remove_container(&record.id, false).await {
            Ok(()) | Err(ContainerError::NotFound(_)) => {}
            Err(e) => {
                return Err(ConvergeError::Remove {
                    name: record.unique_name.clone(),
                    reason: e.to_string(),
                });
            }
        }
        tracing::info!(container = %record.unique_name, "removed container");

        if !parent.as_str().is_empty() {
            self.remove_image_best_effort(&parent).await;
        }
        Ok(())
    }

    /// Create a uniquely named candidate from `spec`.
    pub async fn create_candidate(
        &mut self,
        spec: &ContainerSpec,
    ) -> Result<Rollout<Candidate>, ConvergeError> {
        let image = match self.runtime.inspect_image(&spec.base_image).await {
            Ok(image) => image,
            Err(ImageError::NotFound(_)) => {
                return Err(ConvergeError::GetImage(spec.base_image.to_string()));
            }
            Err(e) => return Err(ConvergeError::Runtime(e.to_string())),
        };

        let name = unique_name(self.runtime, spec.name()).await?;
        let request = self.create_request(spec, name.clone(), image.id.to_string());
        let id = self
            .runtime
            .create_container(&request)
            .await
            .map_err(|e| ConvergeError::Create {
                name: spec.name().to_string(),
                reason: e.to_string(),
            })?;
        tracing::debug!(container = %name, id = %id.short(), "created candidate");

        let candidate = self.runtime.inspect_container(&id).await?;
        Ok(Rollout {
            logical_name: spec.name().to_string(),
            keep_releases: spec.keep_releases,
            secrets: spec.secrets.clone(),
            changed: false,
            state: Candidate { candidate },
        })
    }

    async fn rollout_with_retention(
        &mut self,
        spec: &ContainerSpec,
        keep_releases: u32,
    ) -> Result<ActionOutcome, ConvergeError> {
        let mut rollout = self.create_candidate(spec).await?;
        rollout.keep_releases = keep_releases;
        rollout
            .resolve(self)
            .await?
            .rotate(self)
            .await?
            .start(self)
            .await?
            .finish(self)
            .await
    }

    /// Create a candidate, adopt an equivalent generation or activate the
    /// candidate, stop and rotate the rest, start, then take the stable name.
    pub async fn create_and_rotate(
        &mut self,
        spec: &ContainerSpec,
    ) -> Result<ActionOutcome, ConvergeError> {
        self.rollout_with_retention(spec, spec.keep_releases).await
    }

    /// Like [`Engine::create_and_rotate`] but every superseded generation is removed.
    pub async fn create(&mut self, spec: &ContainerSpec) -> Result<ActionOutcome, ConvergeError> {
        self.rollout_with_retention(spec, 0).await
    }

    /// Make sure some generation exists and runs, without comparing configuration.
    pub async fn create_if_missing(
        &mut self,
        spec: &ContainerSpec,
    ) -> Result<ActionOutcome, ConvergeError> {
        let rotated = match resolve_active(self.runtime, spec.name()).await? {
            Some(active) => Rollout {
                logical_name: spec.name().to_string(),
                keep_releases: spec.keep_releases,
                secrets: spec.secrets.clone(),
                changed: false,
                state: Rotated { active },
            },
            None => self.create_candidate(spec).await?.activate().rotate(self).await?,
        };
        rotated.start(self).await?.finish(self).await
    }

    /// Stop every running generation of `logical_name`.
    pub async fn stop(&mut self, logical_name: &str) -> Result<ActionOutcome, ConvergeError> {
        let mut stopped = 0;
        for record in generation_set(self.runtime, logical_name, &[]).await? {
            if self.stop_container(&record).await? {
                stopped += 1;
            }
        }

        Ok(ActionOutcome::new(
            logical_name,
            "stop",
            stopped > 0,
            format!("stopped {} container(s) for {}", stopped, logical_name),
        ))
    }

    /// Remove every generation of `logical_name` and its artifacts, and
    /// deregister the identity.
    pub async fn remove(&mut self, logical_name: &str) -> Result<ActionOutcome, ConvergeError> {
        let mut removed = 0;
        for record in generation_set(self.runtime, logical_name, &[]).await? {
            self.remove_container(&record).await?;
            removed += 1;
        }

        let collaborators = self.collaborators;
        let deregistered = collaborators.identities.deregister(logical_name)?;
        let secure = collaborators.provisioner.remove_secure_dir(logical_name)?;
        let cache = collaborators.provisioner.remove_cache_dir(logical_name)?;
        let script = collaborators.scripts.remove(logical_name)?;

        Ok(ActionOutcome::new(
            logical_name,
            "remove",
            removed > 0 || deregistered || secure || cache || script,
            format!("removed {} container(s) for {}", removed, logical_name),
        ))
    }
}

// =============================================================================
// Candidate -> Resolved
// =============================================================================

impl Rollout<Candidate> {
    /// Compare the candidate against the other generations.
    ///
    /// The first generation with an equal normalized configuration is adopted
    /// and the candidate is discarded; otherwise the candidate becomes active.
    /// Every other generation is stopped and queued for rotation.
    pub async fn resolve<R: ContainerRuntime + ?Sized>(
        mut self,
        engine: &mut Engine<'_, R>,
    ) -> Result<Rollout<Resolved>, ConvergeError> {
        let candidate = &self.state.candidate;
        let others =
            generation_set(engine.runtime, &self.logical_name, &[candidate.id.clone()]).await?;

        let mut adopted: Option<ContainerRecord> = None;
        let mut superseded = Vec::new();
        for record in others {
            if adopted.is_none() && same_configuration(&record, candidate) {
                tracing::info!(
                    container = %record.unique_name,
                    "equivalent container exists, adopting it"
                );
                adopted = Some(record);
                continue;
            }

            if engine.stop_container(&record).await? {
                self.changed = true;
            }
            // Finish time is only meaningful once stopped
            match engine.runtime.inspect_container(&record.id).await {
                Ok(fresh) => superseded.push(fresh),
                Err(ContainerError::NotFound(_)) => {}
                Err(e) => return Err(ConvergeError::Runtime(e.to_string())),
            }
        }

        let active = match adopted {
            Some(existing) => {
                // The candidate shares the adopted image, so its image stays
                let candidate = &self.state.candidate;
                engine.stop_container(candidate).await?;
                match engine.runtime.remove_container(&candidate.id, true).await {
                    Ok(()) | Err(ContainerError::NotFound(_)) => {}
                    Err(e) => {
                        return Err(ConvergeError::Remove {
                            name: candidate.unique_name.clone(),
                            reason: e.to_string(),
                        });
                    }
                }
                tracing::debug!(container = %candidate.unique_name, "discarded candidate");
                existing
            }
            None => self.state.candidate.clone(),
        };

        let queue = removal_queue(superseded);
        Ok(self.transition(Resolved { active, queue }))
    }

    /// Make the candidate active without looking at other generations.
    pub fn activate(self) -> Rollout<Resolved> {
        let active = self.state.candidate.clone();
        self.transition(Resolved {
            active,
            queue: VecDeque::new(),
        })
    }
}

// =============================================================================
// Resolved -> Rotated
// =============================================================================

impl Rollout<Resolved> {
    /// Remove the oldest queued generations until fewer than `keep_releases` remain.
    pub async fn rotate<R: ContainerRuntime + ?Sized>(
        mut self,
        engine: &mut Engine<'_, R>,
    ) -> Result<Rollout<Rotated>, ConvergeError> {
        let surplus = excess(self.state.queue.len(), self.keep_releases);
        for _ in 0..surplus {
            let Some(oldest) = self.state.queue.pop_front() else {
                break;
            };
            tracing::info!(
                container = %oldest.unique_name,
                finished_at = oldest.finished_at,
                "rotating out old generation"
            );
            engine.remove_container(&oldest).await?;
            self.changed = true;
        }

        let active = self.state.active.clone();
        Ok(self.transition(Rotated { active }))
    }
}

// =============================================================================
// Rotated -> Started
// =============================================================================

impl Rollout<Rotated> {
    /// Start the active generation if needed, provisioning an unknown identity first.
    pub async fn start<R: ContainerRuntime + ?Sized>(
        mut self,
        engine: &mut Engine<'_, R>,
    ) -> Result<Rollout<Started>, ConvergeError> {
        let mut active = self.state.active.clone();

        if !active.running {
            let collaborators = engine.collaborators;
            if !collaborators.identities.exists(&self.logical_name)? {
                collaborators
                    .provisioner
                    .populate_secure_dir(&self.logical_name, &self.secrets)?;
            }

            match engine.runtime.start_container(&active.id).await {
                Ok(()) | Err(ContainerError::AlreadyRunning(_)) => {}
                Err(e) => {
                    return Err(ConvergeError::Start {
                        name: active.unique_name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
            tracing::info!(container = %active.unique_name, "started container");
            active.running = true;
            self.changed = true;
        }

        Ok(self.transition(Started { active }))
    }
}

// =============================================================================
// Started -> done
// =============================================================================

impl Rollout<Started> {
    /// Give the active generation the stable name and refresh its artifacts.
    pub async fn finish<R: ContainerRuntime + ?Sized>(
        mut self,
        engine: &mut Engine<'_, R>,
    ) -> Result<ActionOutcome, ConvergeError> {
        let active = &self.state.active;
        let logical = self.logical_name.as_str();

        if active.unique_name != logical {
            let holder = engine
                .runtime
                .list_containers(&ContainerFilters::everything())
                .await?
                .into_iter()
                .find(|c| c.name == logical);
            if let Some(holder) = holder
                && holder.id != active.id
            {
                let parking = unique_name(engine.runtime, logical).await?;
                engine.runtime.rename_container(&holder.id, &parking).await?;
                tracing::debug!(from = logical, to = %parking, "moved previous holder of the name");
            }

            engine.runtime.rename_container(&active.id, logical).await?;
            tracing::info!(from = %active.unique_name, to = logical, "renamed container");
            self.changed = true;
        }

        let collaborators = engine.collaborators;
        collaborators
            .provisioner
            .record_container_id(logical, &active.id)?;
        collaborators.scripts.write(logical, &active.id)?;

        let summary = if self.changed {
            format!("{} converged on container {}", logical, active.id.short())
        } else {
            format!("{} already up to date ({})", logical, active.id.short())
        };
        Ok(ActionOutcome::new(logical, "converge", self.changed, summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ImageId;
    use serde_json::json;

    fn record(name: &str, host_config: Value) -> ContainerRecord {
        ContainerRecord {
            id: ContainerId::new(name),
            unique_name: name.to_string(),
            logical_name: "web".to_string(),
            parent_image_id: ImageId::new("sha256:1"),
            config: json!({"Hostname": "web"}),
            host_config,
            running: true,
            finished_at: 0,
        }
    }

    #[test]
    fn self_links_are_rewritten_to_the_logical_name() {
        let a = record("web-aaaaaaaaaaaa", json!({"Links": ["/db:/web-aaaaaaaaaaaa/db"]}));
        let b = record("web-bbbbbbbbbbbb", json!({"Links": ["/db:/web-bbbbbbbbbbbb/db"]}));
        assert_eq!(comparable_host_config(&a), json!({"Links": ["/db:/web/db"]}));
        assert!(same_configuration(&a, &b));
    }

    #[test]
    fn foreign_links_are_left_alone() {
        let a = record("web-aaaaaaaaaaaa", json!({"Links": ["/db:/other/db"]}));
        assert_eq!(comparable_host_config(&a), json!({"Links": ["/db:/other/db"]}));
    }

    #[test]
    fn scalar_option_becomes_a_list() {
        let mut map = Map::new();
        map.insert("Env".into(), json!("A=1"));
        assert_eq!(string_list(&mut map, "Env"), vec![json!("A=1")]);
        assert!(string_list(&mut map, "Env").is_empty());
    }
}
