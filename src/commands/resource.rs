// ABOUTME: Single-resource commands: one action against one image or container.
// ABOUTME: Declared resources supply build, auth and option settings; images may be undeclared.

use super::host::Host;
use shipwright::config::Config;
use shipwright::converge::{
    ContainerAction, ContainerResource, DesiredState, ImageAction, ImageResource, ImageSpec,
};
use shipwright::error::{Error, Result};
use shipwright::output::Output;
use shipwright::types::ImageRef;

pub async fn image(
    config: &Config,
    action: ImageAction,
    reference: &str,
    dry_run: bool,
    output: &Output,
) -> Result<()> {
    let reference = ImageRef::parse(reference).map_err(|e| Error::InvalidConfig(e.to_string()))?;
    let spec = match config.image(&reference)? {
        Some(declared) => declared.spec()?,
        None => ImageSpec::new(reference),
    };

    let desired = DesiredState {
        images: vec![ImageResource {
            action,
            spec: spec.clone(),
        }],
        ..DesiredState::default()
    };
    let host = Host::for_run(config, &desired, dry_run, output).await?;
    let mut engine = host.engine(config);

    let outcome = engine.execute_image(action, &spec).await?;
    output.outcome(&outcome);
    for warning in engine.diagnostics_mut().drain() {
        output.warning(&warning);
    }
    Ok(())
}

pub async fn container(
    config: &Config,
    action: ContainerAction,
    name: &str,
    dry_run: bool,
    output: &Output,
) -> Result<()> {
    let declared = config
        .container(name)
        .ok_or_else(|| Error::UnknownResource {
            kind: "container",
            name: name.to_string(),
        })?;
    let spec = declared.spec()?;

    let desired = DesiredState {
        containers: vec![ContainerResource {
            action,
            spec: spec.clone(),
        }],
        ..DesiredState::default()
    };
    let host = Host::for_run(config, &desired, dry_run, output).await?;
    let mut engine = host.engine(config);

    let outcome = engine.execute_container(action, &spec).await?;
    output.outcome(&outcome);
    for warning in engine.diagnostics_mut().drain() {
        output.warning(&warning);
    }
    Ok(())
}
