// ABOUTME: Library root for shipwright - exposes the convergence engine and its collaborators.
// ABOUTME: The main binary is in main.rs.

pub mod config;
pub mod converge;
pub mod diagnostics;
pub mod error;
pub mod naming;
pub mod normalize;
pub mod output;
pub mod provision;
pub mod runtime;
pub mod types;
