// ABOUTME: Sealed trait pattern for runtime traits.
// ABOUTME: Only the bollard and in-memory runtimes may implement them.

/// Sealed trait to prevent external implementations.
///
/// New methods can be added to the runtime traits without breaking
/// downstream code, since only runtimes in this crate implement them.
pub trait Sealed {}
