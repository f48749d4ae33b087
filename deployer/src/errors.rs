//! Error types for ecs-deploy

use thiserror::Error;

/// Failure of a single control-plane call.
///
/// Transport, throttling and authorization failures all collapse into this one
/// shape; the deployment stage that issued the call decides what it means.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{operation} failed: {message}")]
pub struct ClientError {
    pub operation: &'static str,
    pub message: String,
}

impl ClientError {
    pub fn new(operation: &'static str, message: impl ToString) -> Self {
        Self {
            operation,
            message: message.to_string(),
        }
    }
}

/// Fatal error for a deployment run
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeployError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Container '{container}' not found in task definition {task_definition_arn}")]
    ContainerNotFound {
        container: String,
        task_definition_arn: String,
    },

    #[error("Resolution error: {0}")]
    ResolutionError(String),

    #[error("Task definition error: {0}")]
    TaskDefinitionError(String),

    #[error("Registration error: {0}")]
    RegistrationError(String),

    #[error("Service update error: {0}")]
    ServiceUpdateError(String),

    #[error("Polling error: {0}")]
    PollingError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl DeployError {
    /// Stable, machine-readable reason for reports and scripts
    pub fn reason(&self) -> &'static str {
        match self {
            DeployError::ConfigError(_) => "configuration_error",
            DeployError::ContainerNotFound { .. } => "container_not_found",
            DeployError::ResolutionError(_) => "resolution_error",
            DeployError::TaskDefinitionError(_) => "task_definition_error",
            DeployError::RegistrationError(_) => "registration_error",
            DeployError::ServiceUpdateError(_) => "service_update_error",
            DeployError::PollingError(_) => "polling_error",
            DeployError::InternalError(_) => "internal_error",
        }
    }

    /// Whether the error is a configuration problem rather than a remote failure
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            DeployError::ConfigError(_) | DeployError::ContainerNotFound { .. }
        )
    }
}
