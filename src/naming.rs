// ABOUTME: Unique per-instance container names and logical-name resolution.
// ABOUTME: Generation sets are gathered by inspecting every container on the host.

use crate::runtime::{ContainerError, ContainerFilters, ContainerOps, ContainerRecord};
use crate::types::ContainerId;

/// Attempts before unique name generation gives up.
pub const MAX_ATTEMPTS: usize = 16;

const SUFFIX_LEN: usize = 12;

/// Errors from name generation.
#[derive(Debug, thiserror::Error)]
pub enum NamingError {
    #[error("could not find a free name for {base} after {attempts} attempts")]
    Exhausted { base: String, attempts: usize },

    #[error(transparent)]
    Runtime(#[from] ContainerError),
}

/// Random 12-character lowercase hex suffix.
pub fn random_suffix() -> String {
    let mut hex = uuid::Uuid::new_v4().simple().to_string();
    hex.truncate(SUFFIX_LEN);
    hex
}

/// `"{base}-{12 hex}"`, probed against the runtime until unused.
pub async fn unique_name<R: ContainerOps + ?Sized>(
    runtime: &R,
    base: &str,
) -> Result<String, NamingError> {
    unique_name_with(runtime, base, random_suffix).await
}

/// [`unique_name`] with a caller-supplied suffix source.
pub async fn unique_name_with<R, F>(
    runtime: &R,
    base: &str,
    mut suffix: F,
) -> Result<String, NamingError>
where
    R: ContainerOps + ?Sized,
    F: FnMut() -> String,
{
    for _ in 0..MAX_ATTEMPTS {
        let candidate = format!("{}-{}", base, suffix());
        if !runtime.container_exists(&candidate).await? {
            return Ok(candidate);
        }
        tracing::debug!(name = %candidate, "name already taken, regenerating");
    }

    Err(NamingError::Exhausted {
        base: base.to_string(),
        attempts: MAX_ATTEMPTS,
    })
}

/// Every container whose identity equals `logical_name`, running or not,
/// in the order the runtime lists them. Containers in `exclude` and
/// containers that disappear between list and inspect are skipped.
pub async fn generation_set<R: ContainerOps + ?Sized>(
    runtime: &R,
    logical_name: &str,
    exclude: &[ContainerId],
) -> Result<Vec<ContainerRecord>, ContainerError> {
    let summaries = runtime
        .list_containers(&ContainerFilters::everything())
        .await?;

    let mut records = Vec::new();
    for summary in summaries {
        if exclude.contains(&summary.id) {
            continue;
        }
        match runtime.inspect_container(&summary.id).await {
            Ok(record) if record.logical_name == logical_name => records.push(record),
            Ok(_) => {}
            Err(ContainerError::NotFound(_)) => {
                tracing::debug!(id = %summary.id.short(), "container vanished during scan");
            }
            Err(e) => return Err(e),
        }
    }

    Ok(records)
}

/// The generation currently representing `logical_name`: a running one if
/// any, otherwise the one that finished most recently.
pub async fn resolve_active<R: ContainerOps + ?Sized>(
    runtime: &R,
    logical_name: &str,
) -> Result<Option<ContainerRecord>, ContainerError> {
    let records = generation_set(runtime, logical_name, &[]).await?;
    Ok(pick_active(records))
}

fn pick_active(records: Vec<ContainerRecord>) -> Option<ContainerRecord> {
    let (running, stopped): (Vec<_>, Vec<_>) = records.into_iter().partition(|r| r.running);
    if let Some(record) = running.into_iter().next() {
        return Some(record);
    }
    stopped.into_iter().max_by_key(|r| r.finished_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{CreateRequest, MemoryRuntime};
    use crate::types::ImageRef;
    use serde_json::json;

    fn request(name: &str, logical: &str) -> CreateRequest {
        let mut create_options = serde_json::Map::new();
        create_options.insert("Hostname".into(), json!(logical));
        CreateRequest {
            name: name.into(),
            image: "app:v1".into(),
            create_options,
            ..Default::default()
        }
    }

    fn runtime() -> MemoryRuntime {
        let runtime = MemoryRuntime::new();
        runtime.seed_image(&ImageRef::new("app", "v1"));
        runtime
    }

    #[test]
    fn suffix_is_twelve_lowercase_hex() {
        let suffix = random_suffix();
        assert_eq!(suffix.len(), 12);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[tokio::test]
    async fn collision_regenerates() {
        let runtime = runtime();
        runtime
            .create_container(&request("web-000000000000", "web"))
            .await
            .unwrap();

        let mut suffixes = vec!["111111111111", "000000000000"];
        let name = unique_name_with(&runtime, "web", || suffixes.pop().unwrap().to_string())
            .await
            .unwrap();
        assert_eq!(name, "web-111111111111");
    }

    #[tokio::test]
    async fn gives_up_after_bounded_attempts() {
        let runtime = runtime();
        runtime
            .create_container(&request("web-000000000000", "web"))
            .await
            .unwrap();

        let mut calls = 0;
        let result = unique_name_with(&runtime, "web", || {
            calls += 1;
            "000000000000".to_string()
        })
        .await;
        assert!(matches!(result, Err(NamingError::Exhausted { attempts: MAX_ATTEMPTS, .. })));
        assert_eq!(calls, MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn generation_set_matches_identity_only() {
        let runtime = runtime();
        let a = runtime.create_container(&request("web-a", "web")).await.unwrap();
        runtime.create_container(&request("db-a", "db")).await.unwrap();
        let b = runtime.create_container(&request("web-b", "web")).await.unwrap();

        let all = generation_set(&runtime, "web", &[]).await.unwrap();
        assert_eq!(all.len(), 2);

        let without_b = generation_set(&runtime, "web", &[b]).await.unwrap();
        assert_eq!(without_b.len(), 1);
        assert_eq!(without_b[0].id, a);
    }

    #[tokio::test]
    async fn resolve_prefers_running_then_latest_finished() {
        let runtime = runtime();
        let a = runtime.create_container(&request("web-a", "web")).await.unwrap();
        let b = runtime.create_container(&request("web-b", "web")).await.unwrap();
        runtime.start_container(&a).await.unwrap();
        runtime.start_container(&b).await.unwrap();
        runtime.exit("web-b");
        runtime.exit("web-a");

        // Both stopped: a finished last
        let active = resolve_active(&runtime, "web").await.unwrap().unwrap();
        assert_eq!(active.id, a);

        runtime.start_container(&b).await.unwrap();
        let active = resolve_active(&runtime, "web").await.unwrap().unwrap();
        assert_eq!(active.id, b);
    }

    #[tokio::test]
    async fn resolve_absent_is_none() {
        let runtime = runtime();
        assert!(resolve_active(&runtime, "web").await.unwrap().is_none());
    }
}
