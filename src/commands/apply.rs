// ABOUTME: Apply command implementation.
// ABOUTME: Converges every declared image, then every declared container, then sweeps.

use super::host::Host;
use shipwright::config::Config;
use shipwright::error::Result;
use shipwright::output::Output;

pub async fn apply(config: &Config, dry_run: bool, output: &Output) -> Result<()> {
    let desired = config.desired_state()?;
    let host = Host::for_run(config, &desired, dry_run, output).await?;
    let mut engine = host.engine(config);

    output.progress(&format!(
        "Converging {} image(s) and {} container(s)",
        desired.images.len(),
        desired.containers.len()
    ));

    match engine.apply(&desired).await {
        Ok(report) => {
            output.report(&report);
            let verdict = if report.updated() {
                "Host updated"
            } else {
                "Host already converged"
            };
            output.success(verdict);
            Ok(())
        }
        Err(e) => {
            for warning in engine.diagnostics().warnings() {
                output.warning(warning);
            }
            Err(e.into())
        }
    }
}
