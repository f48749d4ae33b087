//! Service / task definition name resolution

use tracing::{debug, info, warn};

use crate::ecs::client::EcsClientExt;
use crate::errors::DeployError;
use crate::models::deployment::DeploymentRequest;
use crate::models::service::service_name_from_arn;
use crate::models::task_definition::family_from_arn;

/// Names the rest of the run operates on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    /// Name passed to DescribeTaskDefinition
    pub task_definition: String,

    /// Service to update
    pub service_name: String,
}

/// Fill in whichever of service name / task definition the request lacks.
///
/// Names given in the request are used verbatim without any remote call.
pub async fn resolve(
    client: &dyn EcsClientExt,
    request: &DeploymentRequest,
) -> Result<ResolvedTarget, DeployError> {
    let cluster = request.cluster();

    let task_definition = match request.task_definition() {
        Some(name) => name.to_string(),
        None => {
            let service_name = request.service_name().ok_or_else(|| {
                DeployError::ConfigError(
                    "Either task-definition or service-name must be provided".to_string(),
                )
            })?;
            task_definition_for_service(client, cluster, service_name).await?
        }
    };

    let service_name = match request.service_name() {
        Some(name) => name.to_string(),
        None => service_for_family(client, cluster, family_from_arn(&task_definition)).await?,
    };

    Ok(ResolvedTarget {
        task_definition,
        service_name,
    })
}

async fn task_definition_for_service(
    client: &dyn EcsClientExt,
    cluster: &str,
    service_name: &str,
) -> Result<String, DeployError> {
    let service = client
        .describe_service(cluster, service_name)
        .await
        .map_err(|e| DeployError::ResolutionError(e.to_string()))?
        .ok_or_else(|| {
            DeployError::ResolutionError(format!(
                "Service '{}' not found in cluster '{}'",
                service_name, cluster
            ))
        })?;

    let arn = service.task_definition_arn.ok_or_else(|| {
        DeployError::ResolutionError(format!(
            "Service '{}' is not bound to a task definition",
            service_name
        ))
    })?;

    let family = family_from_arn(&arn).to_string();
    debug!("Service {} runs {} (family {})", service_name, arn, family);
    Ok(family)
}

/// Pick the service that runs `family`.
///
/// A service whose name equals the family wins. Failing that, the first
/// service whose name contains the family, and as a last resort the first
/// service whose ARN contains it. The substring steps are heuristics and are
/// ambiguous when family names overlap ("app" vs "app-staging").
async fn service_for_family(
    client: &dyn EcsClientExt,
    cluster: &str,
    family: &str,
) -> Result<String, DeployError> {
    let service_arns = client
        .list_services(cluster)
        .await
        .map_err(|e| DeployError::ResolutionError(e.to_string()))?;

    select_service(&service_arns, family).ok_or_else(|| {
        DeployError::ResolutionError(format!(
            "No service in cluster '{}' matches task definition family '{}'",
            cluster, family
        ))
    })
}

/// Exact name match first, then name substring, then ARN substring
pub fn select_service(service_arns: &[String], family: &str) -> Option<String> {
    if let Some(arn) = service_arns
        .iter()
        .find(|arn| service_name_from_arn(arn) == family)
    {
        info!("Resolved service {} for family {}", service_name_from_arn(arn), family);
        return Some(service_name_from_arn(arn).to_string());
    }

    let by_name: Vec<&String> = service_arns
        .iter()
        .filter(|arn| service_name_from_arn(arn).contains(family))
        .collect();
    let (candidates, scope) = if by_name.is_empty() {
        let by_arn: Vec<&String> = service_arns
            .iter()
            .filter(|arn| arn.contains(family))
            .collect();
        (by_arn, "ARN")
    } else {
        (by_name, "name")
    };

    let arn = candidates.first()?;
    let service_name = service_name_from_arn(arn);

    if candidates.len() > 1 {
        warn!(
            "Family '{}' matches {} services by {} substring, using '{}'",
            family,
            candidates.len(),
            scope,
            service_name
        );
    } else {
        warn!(
            "No service named '{}', using {} substring match '{}'",
            family, scope, service_name
        );
    }
    Some(service_name.to_string())
}
