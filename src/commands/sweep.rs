// ABOUTME: Sweep command implementation.
// ABOUTME: Force-removes named generations, then reclaims dangling or unused images.

use super::host::Host;
use shipwright::config::Config;
use shipwright::converge::{CleanupResult, DesiredState};
use shipwright::error::Result;
use shipwright::output::Output;

pub async fn sweep(
    config: &Config,
    unused: bool,
    force_remove: &[String],
    dry_run: bool,
    output: &Output,
) -> Result<()> {
    let host = Host::for_run(config, &DesiredState::default(), dry_run, output).await?;
    let mut engine = host.engine(config);
    let mut total = CleanupResult::default();

    for name in force_remove {
        output.progress(&format!("→ Removing every generation of {}", name));
        let result = engine.force_remove(name).await?;
        total.removed.extend(result.removed);
        total.failed.extend(result.failed);
    }

    let images = if unused {
        engine.remove_unused_images().await?
    } else {
        engine.remove_dangling_images().await
    };
    total.removed.extend(images.removed);
    total.failed.extend(images.failed);

    output.sweep(&total);
    for warning in engine.diagnostics_mut().drain() {
        output.warning(&warning);
    }
    Ok(())
}
