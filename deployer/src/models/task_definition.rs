//! Task definition models

pub use aws_sdk_ecs::types::{
    Compatibility, ContainerDefinition, NetworkMode, TaskDefinitionPlacementConstraint, Volume,
};

/// Snapshot of a registered task definition revision
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDefinition {
    /// Family name
    pub family: String,

    /// Revision assigned by the control plane
    pub revision: i32,

    /// Full task definition ARN
    pub arn: String,

    /// Container definitions, in registration order
    pub container_definitions: Vec<ContainerDefinition>,

    /// Volume definitions (passed through untouched)
    pub volumes: Vec<Volume>,

    /// Task-level settings carried into every new revision
    pub settings: TaskSettings,
}

impl TaskDefinition {
    /// `family:revision` reference for this revision
    pub fn revision_ref(&self) -> String {
        format!("{}:{}", self.family, self.revision)
    }

    /// Find a container definition by exact name
    pub fn container(&self, name: &str) -> Option<&ContainerDefinition> {
        self.container_definitions
            .iter()
            .find(|c| c.name.as_deref() == Some(name))
    }
}

/// Task-level fields that must survive re-registration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskSettings {
    pub task_role_arn: Option<String>,
    pub execution_role_arn: Option<String>,
    pub network_mode: Option<NetworkMode>,
    pub requires_compatibilities: Vec<Compatibility>,
    pub cpu: Option<String>,
    pub memory: Option<String>,
    pub placement_constraints: Vec<TaskDefinitionPlacementConstraint>,
}

/// Request body for registering a new revision
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDefinitionRegistration {
    pub family: String,
    pub container_definitions: Vec<ContainerDefinition>,
    pub volumes: Vec<Volume>,
    pub settings: TaskSettings,
}

/// Extract the family from a task definition ARN or `family[:revision]` name.
///
/// `arn:aws:ecs:us-east-1:123:task-definition/web:7` yields `web`, as do
/// `web:7` and `web`.
pub fn family_from_arn(arn: &str) -> &str {
    let tail = arn.rsplit('/').next().unwrap_or(arn);
    tail.split(':').next().unwrap_or(tail)
}

/// Extract the revision from a task definition ARN or `family:revision` name
pub fn revision_from_arn(arn: &str) -> Option<i32> {
    let tail = arn.rsplit('/').next().unwrap_or(arn);
    let (_, revision) = tail.rsplit_once(':')?;
    revision.parse().ok()
}
