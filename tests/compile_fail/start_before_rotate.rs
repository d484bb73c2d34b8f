// ABOUTME: Compile-fail test verifying a resolved rollout must rotate before starting.
// ABOUTME: This test should fail to compile, validating rollout state safety.

use shipwright::converge::{ContainerSpec, Engine};
use shipwright::runtime::MemoryRuntime;

async fn try_skip_rotation(engine: &mut Engine<'_, MemoryRuntime>, spec: &ContainerSpec) {
    let resolved = engine.create_candidate(spec).await.unwrap().activate();

    // ERROR: start() only exists on Rollout<Rotated>
    let _ = resolved.start(engine).await;
}

fn main() {}
