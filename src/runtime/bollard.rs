// ABOUTME: Bollard-based container runtime implementation.
// ABOUTME: Supports both Docker and Podman via Docker-compatible API.

use crate::runtime::traits::sealed::Sealed;
use crate::runtime::traits::{
    BuildRequest, ContainerError, ContainerFilters, ContainerOps, ContainerRecord,
    ContainerSummary, CreateRequest, ImageError, ImageFilters, ImageOps, ImageRecord,
    RegistryAuth, RuntimeInfo, RuntimeInfoError, RuntimeMetadata,
};
use crate::runtime::types::{RuntimeEndpoint, RuntimeType};
use crate::types::{ContainerId, ImageId, ImageRef};
use async_trait::async_trait;
use bollard::Docker;
use bollard::models::ContainerCreateBody;
use bollard::query_parameters::{
    BuildImageOptions, CreateContainerOptions, CreateImageOptions, InspectContainerOptions,
    KillContainerOptions, ListContainersOptions, ListImagesOptions, PushImageOptions,
    RemoveContainerOptions, RemoveImageOptions, StopContainerOptions, TagImageOptions,
};
use bytes::Bytes;
use futures::StreamExt;
use http_body_util::{Either, Full};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

// =============================================================================
// Error Mapping Helpers
// =============================================================================

fn map_image_pull_error(e: bollard::errors::Error, image_name: &str) -> ImageError {
    match &e {
        bollard::errors::Error::DockerResponseServerError { status_code, .. }
            if *status_code == 401 =>
        {
            ImageError::AuthenticationFailed(image_name.to_string())
        }
        _ => ImageError::PullFailed(format!("{}: {}", image_name, e)),
    }
}

fn map_image_push_error(e: bollard::errors::Error, image_name: &str) -> ImageError {
    match &e {
        bollard::errors::Error::DockerResponseServerError { status_code, .. }
            if *status_code == 404 =>
        {
            ImageError::NotFound(image_name.to_string())
        }
        _ => ImageError::PushFailed(format!("{}: {}", image_name, e)),
    }
}

fn map_image_remove_error(e: bollard::errors::Error, image_name: &str) -> ImageError {
    match &e {
        bollard::errors::Error::DockerResponseServerError { status_code, .. }
            if *status_code == 404 =>
        {
            ImageError::NotFound(image_name.to_string())
        }
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 409 => ImageError::InUse(format!("{}: {}", image_name, message)),
        _ => ImageError::Runtime(format!("failed to remove {}: {}", image_name, e)),
    }
}

fn map_image_inspect_error(e: bollard::errors::Error, image_name: &str) -> ImageError {
    match &e {
        bollard::errors::Error::DockerResponseServerError { status_code, .. }
            if *status_code == 404 =>
        {
            ImageError::NotFound(image_name.to_string())
        }
        _ => ImageError::Runtime(format!("failed to inspect {}: {}", image_name, e)),
    }
}

fn map_image_tag_error(e: bollard::errors::Error, id: &str, reference: &ImageRef) -> ImageError {
    match &e {
        bollard::errors::Error::DockerResponseServerError { status_code, .. }
            if *status_code == 404 =>
        {
            ImageError::NotFound(id.to_string())
        }
        _ => ImageError::Runtime(format!("failed to tag {} as {}: {}", id, reference, e)),
    }
}

fn map_container_create_error(e: bollard::errors::Error) -> ContainerError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => ContainerError::ImageNotFound(message.clone()),
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 409 => ContainerError::AlreadyExists(message.clone()),
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 400 => ContainerError::InvalidConfig(message.clone()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_container_start_error(e: bollard::errors::Error) -> ContainerError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => ContainerError::NotFound(message.clone()),
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 304 => ContainerError::AlreadyRunning(message.clone()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_container_stop_error(e: bollard::errors::Error) -> ContainerError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => ContainerError::NotFound(message.clone()),
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 304 || *status_code == 409 => {
            ContainerError::NotRunning(message.clone())
        }
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_container_not_found_error(e: bollard::errors::Error) -> ContainerError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => ContainerError::NotFound(message.clone()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_container_rename_error(e: bollard::errors::Error) -> ContainerError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => ContainerError::NotFound(message.clone()),
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 409 => ContainerError::AlreadyExists(message.clone()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn credentials(auth: Option<&RegistryAuth>) -> Option<bollard::auth::DockerCredentials> {
    auth.map(|a| bollard::auth::DockerCredentials {
        username: Some(a.username.clone()),
        password: Some(a.password.clone()),
        serveraddress: a.server.clone(),
        ..Default::default()
    })
}

const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Unix nanoseconds of an RFC 3339 timestamp. The runtime reports
/// `0001-01-01T00:00:00Z` for containers that never exited, which maps to 0.
pub(crate) fn parse_timestamp(raw: &str) -> i64 {
    chrono::DateTime::parse_from_rfc3339(raw)
        .ok()
        .and_then(|dt| dt.timestamp_nanos_opt())
        .map_or(0, |nanos| nanos.max(0))
}

/// Grace period in the whole seconds the API takes, saturating at `i32::MAX`.
fn stop_timeout_secs(timeout: Duration) -> i32 {
    i32::try_from(timeout.as_secs()).unwrap_or(i32::MAX)
}

fn parse_tags(repo_tags: &[String]) -> Vec<ImageRef> {
    repo_tags
        .iter()
        .filter(|t| t.as_str() != "<none>:<none>")
        .filter_map(|t| ImageRef::parse(t).ok())
        .collect()
}

/// Tar a build context directory in memory.
fn tar_context(dir: &Path) -> Result<Vec<u8>, ImageError> {
    let mut builder = tar::Builder::new(Vec::new());
    builder
        .append_dir_all(".", dir)
        .map_err(|e| ImageError::BuildFailed(format!("failed to archive build context: {}", e)))?;
    builder
        .into_inner()
        .map_err(|e| ImageError::BuildFailed(format!("failed to archive build context: {}", e)))
}

// =============================================================================
// BollardRuntime
// =============================================================================

/// Container runtime implementation using bollard.
///
/// Supports both Docker and Podman via Docker-compatible API.
pub struct BollardRuntime {
    client: Docker,
    runtime_type: RuntimeType,
}

impl BollardRuntime {
    /// Create a new BollardRuntime from a Docker client.
    pub fn new(client: Docker, runtime_type: RuntimeType) -> Self {
        Self {
            client,
            runtime_type,
        }
    }

    /// Connect to the runtime at a detected endpoint.
    ///
    /// `timeout` bounds every request, so it has to cover the longest pull or build.
    pub fn connect(
        endpoint: &RuntimeEndpoint,
        timeout: Duration,
    ) -> Result<Self, RuntimeInfoError> {
        let client = Docker::connect_with_unix(
            &endpoint.socket_path,
            timeout.as_secs().max(1),
            bollard::API_DEFAULT_VERSION,
        )
        .map_err(|e| RuntimeInfoError::ConnectionFailed(e.to_string()))?;
        Ok(Self::new(client, endpoint.runtime_type))
    }

    /// Get the runtime type (Docker or Podman).
    pub fn runtime_type(&self) -> RuntimeType {
        self.runtime_type
    }

    async fn inspect_image_by_name(&self, name: &str) -> Result<ImageRecord, ImageError> {
        let details = self
            .client
            .inspect_image(name)
            .await
            .map_err(|e| map_image_inspect_error(e, name))?;

        Ok(ImageRecord {
            id: ImageId::new(details.id.unwrap_or_default()),
            tags: parse_tags(&details.repo_tags.unwrap_or_default()),
            created_at: details
                .created
                .map(|c| parse_timestamp(&c.to_string()) / NANOS_PER_SECOND)
                .unwrap_or(0),
        })
    }
}

// Implement Sealed trait to allow runtime trait implementations
impl Sealed for BollardRuntime {}

#[async_trait]
impl RuntimeInfo for BollardRuntime {
    async fn info(&self) -> Result<RuntimeMetadata, RuntimeInfoError> {
        let info = self
            .client
            .info()
            .await
            .map_err(|e| RuntimeInfoError::ConnectionFailed(e.to_string()))?;

        Ok(RuntimeMetadata {
            name: self.runtime_type.to_string(),
            version: info.server_version.unwrap_or_default(),
            os: info.operating_system.unwrap_or_default(),
            arch: info.architecture.unwrap_or_default(),
        })
    }

    async fn ping(&self) -> Result<(), RuntimeInfoError> {
        self.client
            .ping()
            .await
            .map_err(|e| RuntimeInfoError::ConnectionFailed(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl ImageOps for BollardRuntime {
    async fn inspect_image(&self, reference: &ImageRef) -> Result<ImageRecord, ImageError> {
        self.inspect_image_by_name(&reference.to_string()).await
    }

    async fn image_exists(&self, reference: &ImageRef) -> Result<bool, ImageError> {
        match self.inspect_image(reference).await {
            Ok(_) => Ok(true),
            Err(ImageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn pull_image(
        &self,
        reference: &ImageRef,
        auth: Option<&RegistryAuth>,
    ) -> Result<ImageId, ImageError> {
        let image_name = reference.to_string();

        let opts = CreateImageOptions {
            from_image: Some(reference.repository().to_string()),
            tag: Some(reference.tag().to_string()),
            ..Default::default()
        };

        // Pull returns a stream of progress updates - consume it
        let mut stream = self.client.create_image(Some(opts), None, credentials(auth));
        while let Some(result) = stream.next().await {
            let info = result.map_err(|e| map_image_pull_error(e, &image_name))?;
            if let Some(detail) = info.error_detail {
                return Err(ImageError::PullFailed(format!(
                    "{}: {}",
                    image_name,
                    detail.message.unwrap_or_default()
                )));
            }
        }

        let record = self.inspect_image(reference).await?;
        Ok(record.id)
    }

    async fn push_image(
        &self,
        reference: &ImageRef,
        auth: Option<&RegistryAuth>,
    ) -> Result<(), ImageError> {
        let image_name = reference.to_string();
        let opts = PushImageOptions {
            tag: Some(reference.tag().to_string()),
            ..Default::default()
        };

        let mut stream = self
            .client
            .push_image(reference.repository(), Some(opts), credentials(auth));
        while let Some(result) = stream.next().await {
            let info = result.map_err(|e| map_image_push_error(e, &image_name))?;
            if let Some(detail) = info.error_detail {
                return Err(ImageError::PushFailed(format!(
                    "{}: {}",
                    image_name,
                    detail.message.unwrap_or_default()
                )));
            }
        }

        Ok(())
    }

    async fn build_image(&self, request: &BuildRequest) -> Result<ImageRecord, ImageError> {
        let image_name = request.image.to_string();
        let archive = tar_context(&request.context)?;

        let opts = BuildImageOptions {
            dockerfile: "Dockerfile".to_string(),
            t: Some(image_name.clone()),
            rm: true,
            forcerm: request.options.forcerm,
            nocache: request.options.nocache,
            pull: request.options.pull.then(|| "true".to_string()),
            ..Default::default()
        };

        let body = Either::Left(Full::new(Bytes::from(archive)));
        let mut stream = self.client.build_image(opts, None, Some(body));
        while let Some(result) = stream.next().await {
            let info = result
                .map_err(|e| ImageError::BuildFailed(format!("{}: {}", image_name, e)))?;
            if let Some(detail) = info.error_detail {
                return Err(ImageError::BuildFailed(format!(
                    "{}: {}",
                    image_name,
                    detail.message.unwrap_or_default()
                )));
            }
            if let Some(line) = info.stream {
                let line = line.trim_end();
                if !line.is_empty() {
                    tracing::debug!(image = %image_name, "{}", line);
                }
            }
        }

        self.inspect_image(&request.image).await
    }

    async fn tag_image(&self, id: &ImageId, reference: &ImageRef) -> Result<(), ImageError> {
        let opts = TagImageOptions {
            repo: Some(reference.repository().to_string()),
            tag: Some(reference.tag().to_string()),
        };

        self.client
            .tag_image(id.as_str(), Some(opts))
            .await
            .map_err(|e| map_image_tag_error(e, id.as_str(), reference))
    }

    async fn remove_image(&self, id: &ImageId, force: bool) -> Result<(), ImageError> {
        let opts = RemoveImageOptions {
            force,
            ..Default::default()
        };

        self.client
            .remove_image(id.as_str(), Some(opts), None)
            .await
            .map_err(|e| map_image_remove_error(e, id.as_str()))?;

        Ok(())
    }

    async fn list_images(&self, filters: &ImageFilters) -> Result<Vec<ImageRecord>, ImageError> {
        let mut filter_map: HashMap<String, Vec<String>> = HashMap::new();
        if let Some(dangling) = filters.dangling {
            filter_map.insert("dangling".to_string(), vec![dangling.to_string()]);
        }

        let opts = ListImagesOptions {
            all: filters.all,
            filters: Some(filter_map),
            ..Default::default()
        };

        let images = self
            .client
            .list_images(Some(opts))
            .await
            .map_err(|e| ImageError::Runtime(format!("failed to list images: {}", e)))?;

        Ok(images
            .into_iter()
            .map(|summary| ImageRecord {
                id: ImageId::new(summary.id),
                tags: parse_tags(&summary.repo_tags),
                created_at: summary.created,
            })
            .collect())
    }
}

#[async_trait]
impl ContainerOps for BollardRuntime {
    async fn create_container(
        &self,
        request: &CreateRequest,
    ) -> Result<ContainerId, ContainerError> {
        let mut body = request.create_options.clone();
        body.insert("Image".to_string(), Value::String(request.image.clone()));
        if !request.command.is_empty() {
            body.insert("Cmd".to_string(), serde_json::json!(request.command));
        }
        if !request.start_options.is_empty() {
            body.insert(
                "HostConfig".to_string(),
                Value::Object(request.start_options.clone()),
            );
        }

        let container_config: ContainerCreateBody = serde_json::from_value(Value::Object(body))
            .map_err(|e| ContainerError::InvalidConfig(e.to_string()))?;

        let opts = CreateContainerOptions {
            name: Some(request.name.clone()),
            ..Default::default()
        };

        let response = self
            .client
            .create_container(Some(opts), container_config)
            .await
            .map_err(map_container_create_error)?;

        Ok(ContainerId::new(response.id))
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError> {
        self.client
            .start_container(
                id.as_str(),
                None::<bollard::query_parameters::StartContainerOptions>,
            )
            .await
            .map_err(map_container_start_error)
    }

    async fn stop_container(
        &self,
        id: &ContainerId,
        timeout: Duration,
    ) -> Result<(), ContainerError> {
        let opts = StopContainerOptions {
            t: Some(stop_timeout_secs(timeout)),
            signal: None,
        };

        self.client
            .stop_container(id.as_str(), Some(opts))
            .await
            .map_err(map_container_stop_error)
    }

    async fn kill_container(&self, id: &ContainerId) -> Result<(), ContainerError> {
        self.client
            .kill_container(id.as_str(), None::<KillContainerOptions>)
            .await
            .map_err(map_container_stop_error)
    }

    async fn remove_container(&self, id: &ContainerId, force: bool) -> Result<(), ContainerError> {
        let opts = RemoveContainerOptions {
            force,
            ..Default::default()
        };

        self.client
            .remove_container(id.as_str(), Some(opts))
            .await
            .map_err(map_container_not_found_error)?;

        Ok(())
    }

    async fn rename_container(
        &self,
        id: &ContainerId,
        new_name: &str,
    ) -> Result<(), ContainerError> {
        self.client
            .rename_container(
                id.as_str(),
                bollard::query_parameters::RenameContainerOptions {
                    name: new_name.to_string(),
                },
            )
            .await
            .map_err(map_container_rename_error)
    }

    async fn inspect_container(
        &self,
        id: &ContainerId,
    ) -> Result<ContainerRecord, ContainerError> {
        let details = self
            .client
            .inspect_container(id.as_str(), None::<InspectContainerOptions>)
            .await
            .map_err(map_container_not_found_error)?;

        let config = details
            .config
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| ContainerError::Runtime(e.to_string()))?
            .unwrap_or(Value::Null);
        let host_config = details
            .host_config
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| ContainerError::Runtime(e.to_string()))?
            .unwrap_or(Value::Null);

        let running = details
            .state
            .as_ref()
            .and_then(|s| s.running)
            .unwrap_or(false);
        let finished_at = details
            .state
            .as_ref()
            .and_then(|s| s.finished_at.as_deref())
            .map(parse_timestamp)
            .unwrap_or(0);

        Ok(ContainerRecord {
            id: ContainerId::new(details.id.unwrap_or_else(|| id.to_string())),
            unique_name: details
                .name
                .unwrap_or_default()
                .trim_start_matches('/')
                .to_string(),
            logical_name: ContainerRecord::identity_of(&config),
            parent_image_id: ImageId::new(details.image.unwrap_or_default()),
            config,
            host_config,
            running,
            finished_at,
        })
    }

    async fn container_exists(&self, name: &str) -> Result<bool, ContainerError> {
        match self
            .client
            .inspect_container(name, None::<InspectContainerOptions>)
            .await
        {
            Ok(_) => Ok(true),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(e) => Err(ContainerError::Runtime(e.to_string())),
        }
    }

    async fn list_containers(
        &self,
        filters: &ContainerFilters,
    ) -> Result<Vec<ContainerSummary>, ContainerError> {
        let mut filter_map: HashMap<String, Vec<String>> = HashMap::new();

        if let Some(ref name) = filters.name {
            filter_map.insert("name".to_string(), vec![name.clone()]);
        }

        for (key, value) in &filters.labels {
            filter_map
                .entry("label".to_string())
                .or_default()
                .push(format!("{}={}", key, value));
        }

        let opts = ListContainersOptions {
            all: filters.all,
            filters: Some(filter_map),
            ..Default::default()
        };

        // Podman reports "stopping" as a container state during shutdown, but bollard
        // doesn't recognize it and fails deserialization. Retry after a short delay
        // since "stopping" is a transient state.
        let mut last_error = None;
        for attempt in 0..3 {
            match self.client.list_containers(Some(opts.clone())).await {
                Ok(containers) => {
                    return Ok(containers
                        .into_iter()
                        .map(|c| {
                            let name = c
                                .names
                                .unwrap_or_default()
                                .first()
                                .map(|n| n.trim_start_matches('/').to_string())
                                .unwrap_or_default();

                            ContainerSummary {
                                id: ContainerId::new(c.id.unwrap_or_default()),
                                name,
                                image: c.image.unwrap_or_default(),
                                state: c
                                    .state
                                    .map(|s| format!("{:?}", s).to_lowercase())
                                    .unwrap_or_default(),
                                labels: c.labels.unwrap_or_default(),
                            }
                        })
                        .collect());
                }
                Err(e) => {
                    let err_str = e.to_string();
                    if (err_str.contains("unknown variant `stopping`")
                        || err_str.contains("unknown variant `stopped`"))
                        && attempt < 2
                    {
                        tokio::time::sleep(Duration::from_millis(500)).await;
                        last_error = Some(err_str);
                        continue;
                    }
                    return Err(ContainerError::Runtime(err_str));
                }
            }
        }

        Err(ContainerError::Runtime(
            last_error.unwrap_or_else(|| "list_containers failed".to_string()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_time_is_never_finished() {
        assert_eq!(parse_timestamp("0001-01-01T00:00:00Z"), 0);
        assert_eq!(parse_timestamp(""), 0);
    }

    #[test]
    fn rfc3339_with_nanos() {
        assert_eq!(
            parse_timestamp("2024-01-02T03:04:05.123456789Z"),
            1_704_164_645_123_456_789
        );
    }

    #[test]
    fn exits_within_one_second_stay_ordered() {
        let older = parse_timestamp("2024-01-02T03:04:05.100Z");
        let newer = parse_timestamp("2024-01-02T03:04:05.900Z");
        assert!(older < newer);
    }

    #[test]
    fn offsets_are_normalized_to_utc() {
        assert_eq!(
            parse_timestamp("2024-01-02T04:04:05.5+01:00"),
            parse_timestamp("2024-01-02T03:04:05.5Z")
        );
    }

    #[test]
    fn stop_timeout_saturates() {
        assert_eq!(stop_timeout_secs(Duration::from_secs(10)), 10);
        assert_eq!(stop_timeout_secs(Duration::from_millis(1500)), 1);
        assert_eq!(stop_timeout_secs(Duration::from_secs(u64::MAX)), i32::MAX);
        assert_eq!(
            stop_timeout_secs(Duration::from_secs(i32::MAX as u64 + 1)),
            i32::MAX
        );
    }

    #[test]
    fn tag_failures_name_the_reference() {
        let err = bollard::errors::Error::DockerResponseServerError {
            status_code: 500,
            message: "conflict".to_string(),
        };
        let reference = ImageRef::new("app", "v1");
        let mapped = map_image_tag_error(err, "sha256:1", &reference);
        let text = mapped.to_string();
        assert!(text.contains("app:v1"), "{text}");
        assert!(!text.contains("inspect"), "{text}");
    }

    #[test]
    fn tag_of_missing_image_is_not_found() {
        let err = bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            message: "no such image".to_string(),
        };
        let mapped = map_image_tag_error(err, "sha256:1", &ImageRef::new("app", "v1"));
        assert!(matches!(mapped, ImageError::NotFound(_)));
    }

    #[test]
    fn untagged_entries_are_dropped() {
        let tags = parse_tags(&["<none>:<none>".to_string(), "app:v1".to_string()]);
        assert_eq!(tags, vec![ImageRef::new("app", "v1")]);
    }
}
