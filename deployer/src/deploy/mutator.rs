//! Task definition mutation

use aws_sdk_ecs::types::{HostVolumeProperties, Volume};
use tracing::debug;

use crate::errors::DeployError;
use crate::models::deployment::{ImageOverride, VolumeOverride};
use crate::models::task_definition::{
    ContainerDefinition, TaskDefinition, TaskDefinitionRegistration,
};

/// Copy the container definitions of `current` with the image overrides applied.
///
/// Only the `image` field of matched containers changes. Every named override
/// must match an existing container; an unnamed one needs a single-container
/// definition.
pub fn mutate(
    current: &TaskDefinition,
    overrides: &[ImageOverride],
) -> Result<Vec<ContainerDefinition>, DeployError> {
    if overrides.is_empty() {
        return Err(DeployError::ConfigError(
            "No image overrides given, nothing to deploy".to_string(),
        ));
    }

    let mut containers = current.container_definitions.clone();
    let container_count = containers.len();
    for o in overrides {
        let container = match &o.container {
            Some(name) => containers
                .iter_mut()
                .find(|c| c.name.as_deref() == Some(name.as_str()))
                .ok_or_else(|| DeployError::ContainerNotFound {
                    container: name.clone(),
                    task_definition_arn: current.arn.clone(),
                })?,
            None => match containers.as_mut_slice() {
                [only] => only,
                _ => {
                    return Err(DeployError::ConfigError(format!(
                        "Image '{}' names no container but {} has {} containers",
                        o.image, current.arn, container_count
                    )))
                }
            },
        };

        debug!(
            "Container {}: {} -> {}",
            container.name.as_deref().unwrap_or("<unnamed>"),
            container.image.as_deref().unwrap_or("<none>"),
            o.image
        );
        container.image = Some(o.image.clone());
    }

    Ok(containers)
}

/// Build the registration for the next revision of `current`
pub fn next_revision(
    current: &TaskDefinition,
    overrides: &[ImageOverride],
    volume: Option<&VolumeOverride>,
) -> Result<TaskDefinitionRegistration, DeployError> {
    let container_definitions = mutate(current, overrides)?;

    let volumes = match volume {
        Some(v) => vec![Volume::builder()
            .name(&v.name)
            .host(HostVolumeProperties::builder().source_path(&v.source_path).build())
            .build()],
        None => current.volumes.clone(),
    };

    Ok(TaskDefinitionRegistration {
        family: current.family.clone(),
        container_definitions,
        volumes,
        settings: current.settings.clone(),
    })
}
