//! Service and task models

use serde::{Deserialize, Serialize};

/// A service bound to a cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    /// Service name
    pub service_name: String,

    /// Cluster name or ARN
    pub cluster: String,

    /// Task definition ARN the service currently points at
    pub task_definition_arn: Option<String>,
}

/// One task observed while polling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningTaskSnapshot {
    pub task_arn: String,
    pub task_definition_arn: String,
}

/// Rolling deployment bounds forwarded to the service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentBounds {
    /// Lower limit on running tasks during a deployment, as a percentage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_healthy_percent: Option<i32>,

    /// Upper limit on running tasks during a deployment, as a percentage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum_percent: Option<i32>,
}

impl DeploymentBounds {
    pub fn is_empty(&self) -> bool {
        self.minimum_healthy_percent.is_none() && self.maximum_percent.is_none()
    }
}

/// Service update request.
///
/// Optional fields are only sent when set; an absent value leaves the
/// service's current setting alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceUpdate {
    pub cluster: String,
    pub service_name: String,

    /// `family:revision` to bind the service to
    pub task_definition: String,

    pub desired_count: Option<i32>,
    pub deployment_bounds: Option<DeploymentBounds>,
}

/// Service name from a service ARN.
///
/// Handles both `service/<name>` and `service/<cluster>/<name>` ARN formats.
pub fn service_name_from_arn(arn: &str) -> &str {
    arn.rsplit('/').next().unwrap_or(arn)
}
