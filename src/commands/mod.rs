// ABOUTME: Command module aggregator for the shipwright CLI.
// ABOUTME: Re-exports apply, single-resource and sweep command handlers.

mod apply;
mod host;
mod resource;
mod sweep;

pub use apply::apply;
pub use resource::{container, image};
pub use sweep::sweep;
