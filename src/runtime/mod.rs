// ABOUTME: Container runtime abstraction: capability traits and implementations.
// ABOUTME: Bollard over a Docker/Podman socket, or an in-memory host for dry runs and tests.

mod bollard;
mod detection;
mod error;
mod memory;
pub mod traits;
mod types;

pub use self::bollard::BollardRuntime;
pub use detection::{DetectionError, SOCKET_ENV, detect_local, detect_runtime};
pub use error::{RuntimeError, RuntimeErrorKind};
pub use memory::{FailPoint, MemoryRuntime, StopBehavior};
pub use traits::{
    BuildOptions, BuildRequest, ContainerError, ContainerFilters, ContainerOps, ContainerRecord,
    ContainerRuntime, ContainerSummary, CreateRequest, IDENTITY_LABEL, ImageError, ImageFilters,
    ImageOps, ImageRecord, MANAGED_LABEL, RegistryAuth, RuntimeInfo, RuntimeInfoError,
    RuntimeMetadata,
};
pub use types::{
    DEFAULT_STOP_TIMEOUT, DEFAULT_TIMEOUT, RuntimeConfig, RuntimeEndpoint, RuntimeType,
};

/// Detect the local runtime and open a verified connection to it.
pub async fn connect(config: &RuntimeConfig) -> Result<BollardRuntime, RuntimeError> {
    let endpoint = detect_runtime(config)?;
    tracing::debug!(
        runtime = %endpoint.runtime_type,
        socket = %endpoint.socket_path,
        "connecting to runtime"
    );
    let runtime = BollardRuntime::connect(&endpoint, config.timeout)?;
    runtime.ping().await?;
    Ok(runtime)
}
