//! Control plane capability used by the deployment core

use async_trait::async_trait;

use crate::errors::ClientError;
use crate::models::service::{RunningTaskSnapshot, ServiceDescriptor, ServiceUpdate};
use crate::models::task_definition::{TaskDefinition, TaskDefinitionRegistration};

/// ECS operations the deployer depends on.
///
/// Every call is a single round trip with no retries; implementations map
/// transport and authorization failures to [`ClientError`].
#[async_trait]
pub trait EcsClientExt: Send + Sync {
    /// Describe one service. `Ok(None)` when the cluster has no such service.
    async fn describe_service(
        &self,
        cluster: &str,
        service_name: &str,
    ) -> Result<Option<ServiceDescriptor>, ClientError>;

    /// List every service ARN in the cluster
    async fn list_services(&self, cluster: &str) -> Result<Vec<String>, ClientError>;

    /// Describe a task definition by family, `family:revision` or ARN
    async fn describe_task_definition(&self, name: &str) -> Result<TaskDefinition, ClientError>;

    /// Register a new revision; the control plane assigns revision and ARN
    async fn register_task_definition(
        &self,
        registration: TaskDefinitionRegistration,
    ) -> Result<TaskDefinition, ClientError>;

    /// Mark a revision inactive
    async fn deregister_task_definition(
        &self,
        family: &str,
        revision: i32,
    ) -> Result<(), ClientError>;

    /// List ACTIVE revision ARNs of a family, oldest first
    async fn list_task_definitions(&self, family: &str) -> Result<Vec<String>, ClientError>;

    /// Point a service at a task definition
    async fn update_service(&self, update: ServiceUpdate) -> Result<ServiceDescriptor, ClientError>;

    /// List the ARNs of RUNNING tasks that belong to a service
    async fn list_running_tasks(
        &self,
        cluster: &str,
        service_name: &str,
    ) -> Result<Vec<String>, ClientError>;

    /// Describe tasks to learn which task definition each one runs
    async fn describe_tasks(
        &self,
        cluster: &str,
        task_arns: &[String],
    ) -> Result<Vec<RunningTaskSnapshot>, ClientError>;
}
