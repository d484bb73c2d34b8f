// ABOUTME: Composable capability traits for container runtimes.
// ABOUTME: Defines ImageOps, ContainerOps, RuntimeInfo and the ContainerRuntime bundle.

mod container;
mod image;
mod runtime_info;
pub(crate) mod sealed;
mod shared_types;

pub use container::{ContainerError, ContainerOps};
pub use image::{ImageError, ImageOps};
pub use runtime_info::{RuntimeInfo, RuntimeInfoError};
pub use shared_types::*;

/// Everything the convergence engine needs from a runtime.
pub trait ContainerRuntime: ImageOps + ContainerOps + RuntimeInfo {}

impl<T: ImageOps + ContainerOps + RuntimeInfo> ContainerRuntime for T {}
