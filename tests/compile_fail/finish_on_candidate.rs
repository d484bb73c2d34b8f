// ABOUTME: Compile-fail test verifying finish cannot be called on a fresh candidate.
// ABOUTME: This test should fail to compile, validating rollout state safety.

use shipwright::converge::{ContainerSpec, Engine};
use shipwright::runtime::MemoryRuntime;

async fn try_early_finish(engine: &mut Engine<'_, MemoryRuntime>, spec: &ContainerSpec) {
    let rollout = engine.create_candidate(spec).await.unwrap();

    // ERROR: finish() only exists on Rollout<Started>
    let _ = rollout.finish(engine).await;
}

fn main() {}
