// ABOUTME: Type-safe identifiers and validated domain types.
// ABOUTME: Uses phantom types to prevent ID confusion at compile time.

mod id;
mod image_ref;
mod logical_name;

pub use id::{ContainerId, Id, ImageId};
pub use image_ref::{DEFAULT_TAG, ImageRef, ParseImageRefError};
pub use logical_name::{LogicalName, LogicalNameError};
