//! ECS client backed by the AWS SDK

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_ecs::config::{Credentials, Region};
use aws_sdk_ecs::error::DisplayErrorContext;
use aws_sdk_ecs::types::{
    DeploymentConfiguration, DesiredStatus, SortOrder, TaskDefinitionStatus,
};
use aws_sdk_ecs::Client;
use secrecy::ExposeSecret;
use tracing::debug;

use crate::ecs::client::EcsClientExt;
use crate::ecs::config::ClientConfig;
use crate::errors::ClientError;
use crate::models::service::{RunningTaskSnapshot, ServiceDescriptor, ServiceUpdate};
use crate::models::task_definition::{
    family_from_arn, TaskDefinition, TaskDefinitionRegistration, TaskSettings,
};

/// DescribeTasks accepts at most this many ARNs per call
const DESCRIBE_TASKS_BATCH: usize = 100;

/// ECS client over the AWS SDK
#[derive(Debug, Clone)]
pub struct AwsEcsClient {
    client: Client,
}

impl AwsEcsClient {
    /// Wrap an already configured SDK client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from explicit configuration, falling back to the
    /// default provider chain for anything left unset
    pub async fn from_config(config: &ClientConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());

        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(profile) = &config.profile {
            loader = loader.profile_name(profile);
        }
        if let (Some(access_key_id), Some(secret_access_key)) =
            (&config.access_key_id, &config.secret_access_key)
        {
            loader = loader.credentials_provider(Credentials::new(
                access_key_id.clone(),
                secret_access_key.expose_secret().to_string(),
                None,
                None,
                "ecs-deploy",
            ));
        }
        if let Some(endpoint_url) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint_url);
        }

        let sdk_config = loader.load().await;
        Self::new(Client::new(&sdk_config))
    }
}

#[async_trait]
impl EcsClientExt for AwsEcsClient {
    async fn describe_service(
        &self,
        cluster: &str,
        service_name: &str,
    ) -> Result<Option<ServiceDescriptor>, ClientError> {
        debug!("DescribeServices cluster={} service={}", cluster, service_name);

        let output = self
            .client
            .describe_services()
            .cluster(cluster)
            .services(service_name)
            .send()
            .await
            .map_err(|e| ClientError::new("DescribeServices", DisplayErrorContext(&e)))?;

        for failure in output.failures() {
            debug!(
                "DescribeServices failure for {}: {}",
                failure.arn().unwrap_or(service_name),
                failure.reason().unwrap_or("unknown")
            );
        }

        let service = output
            .services()
            .iter()
            .find(|s| s.status() != Some("INACTIVE"));

        Ok(service.map(|s| ServiceDescriptor {
            service_name: s.service_name().unwrap_or(service_name).to_string(),
            cluster: s.cluster_arn().unwrap_or(cluster).to_string(),
            task_definition_arn: s.task_definition().map(str::to_string),
        }))
    }

    async fn list_services(&self, cluster: &str) -> Result<Vec<String>, ClientError> {
        debug!("ListServices cluster={}", cluster);

        let mut arns = Vec::new();
        let mut next_token = None;
        loop {
            let output = self
                .client
                .list_services()
                .cluster(cluster)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| ClientError::new("ListServices", DisplayErrorContext(&e)))?;

            arns.extend(output.service_arns().iter().cloned());
            match output.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        Ok(arns)
    }

    async fn describe_task_definition(&self, name: &str) -> Result<TaskDefinition, ClientError> {
        debug!("DescribeTaskDefinition {}", name);

        let output = self
            .client
            .describe_task_definition()
            .task_definition(name)
            .send()
            .await
            .map_err(|e| ClientError::new("DescribeTaskDefinition", DisplayErrorContext(&e)))?;

        let task_definition = output.task_definition().ok_or_else(|| {
            ClientError::new("DescribeTaskDefinition", "response has no task definition")
        })?;
        task_definition_from_sdk("DescribeTaskDefinition", task_definition)
    }

    async fn register_task_definition(
        &self,
        registration: TaskDefinitionRegistration,
    ) -> Result<TaskDefinition, ClientError> {
        debug!(
            "RegisterTaskDefinition family={} containers={}",
            registration.family,
            registration.container_definitions.len()
        );

        let TaskDefinitionRegistration {
            family,
            container_definitions,
            volumes,
            settings,
        } = registration;

        let output = self
            .client
            .register_task_definition()
            .family(family)
            .set_container_definitions(Some(container_definitions))
            .set_volumes(non_empty(volumes))
            .set_task_role_arn(settings.task_role_arn)
            .set_execution_role_arn(settings.execution_role_arn)
            .set_network_mode(settings.network_mode)
            .set_requires_compatibilities(non_empty(settings.requires_compatibilities))
            .set_cpu(settings.cpu)
            .set_memory(settings.memory)
            .set_placement_constraints(non_empty(settings.placement_constraints))
            .send()
            .await
            .map_err(|e| ClientError::new("RegisterTaskDefinition", DisplayErrorContext(&e)))?;

        let task_definition = output.task_definition().ok_or_else(|| {
            ClientError::new("RegisterTaskDefinition", "response has no task definition")
        })?;
        task_definition_from_sdk("RegisterTaskDefinition", task_definition)
    }

    async fn deregister_task_definition(
        &self,
        family: &str,
        revision: i32,
    ) -> Result<(), ClientError> {
        debug!("DeregisterTaskDefinition {}:{}", family, revision);

        self.client
            .deregister_task_definition()
            .task_definition(format!("{}:{}", family, revision))
            .send()
            .await
            .map_err(|e| ClientError::new("DeregisterTaskDefinition", DisplayErrorContext(&e)))?;
        Ok(())
    }

    async fn list_task_definitions(&self, family: &str) -> Result<Vec<String>, ClientError> {
        debug!("ListTaskDefinitions family={}", family);

        let mut arns = Vec::new();
        let mut next_token = None;
        loop {
            let output = self
                .client
                .list_task_definitions()
                .family_prefix(family)
                .status(TaskDefinitionStatus::Active)
                .sort(SortOrder::Asc)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| ClientError::new("ListTaskDefinitions", DisplayErrorContext(&e)))?;

            // familyPrefix also matches longer families ("app" vs "app-staging")
            arns.extend(
                output
                    .task_definition_arns()
                    .iter()
                    .filter(|arn| family_from_arn(arn) == family)
                    .cloned(),
            );
            match output.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        Ok(arns)
    }

    async fn update_service(&self, update: ServiceUpdate) -> Result<ServiceDescriptor, ClientError> {
        debug!(
            "UpdateService cluster={} service={} task_definition={}",
            update.cluster, update.service_name, update.task_definition
        );

        let deployment_configuration = update.deployment_bounds.map(|bounds| {
            DeploymentConfiguration::builder()
                .set_minimum_healthy_percent(bounds.minimum_healthy_percent)
                .set_maximum_percent(bounds.maximum_percent)
                .build()
        });

        let output = self
            .client
            .update_service()
            .cluster(&update.cluster)
            .service(&update.service_name)
            .task_definition(&update.task_definition)
            .set_desired_count(update.desired_count)
            .set_deployment_configuration(deployment_configuration)
            .send()
            .await
            .map_err(|e| ClientError::new("UpdateService", DisplayErrorContext(&e)))?;

        let service = output
            .service()
            .ok_or_else(|| ClientError::new("UpdateService", "response has no service"))?;

        Ok(ServiceDescriptor {
            service_name: service
                .service_name()
                .unwrap_or(&update.service_name)
                .to_string(),
            cluster: service.cluster_arn().unwrap_or(&update.cluster).to_string(),
            task_definition_arn: service.task_definition().map(str::to_string),
        })
    }

    async fn list_running_tasks(
        &self,
        cluster: &str,
        service_name: &str,
    ) -> Result<Vec<String>, ClientError> {
        debug!("ListTasks cluster={} service={}", cluster, service_name);

        let mut arns = Vec::new();
        let mut next_token = None;
        loop {
            let output = self
                .client
                .list_tasks()
                .cluster(cluster)
                .service_name(service_name)
                .desired_status(DesiredStatus::Running)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| ClientError::new("ListTasks", DisplayErrorContext(&e)))?;

            arns.extend(output.task_arns().iter().cloned());
            match output.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        Ok(arns)
    }

    async fn describe_tasks(
        &self,
        cluster: &str,
        task_arns: &[String],
    ) -> Result<Vec<RunningTaskSnapshot>, ClientError> {
        debug!("DescribeTasks cluster={} tasks={}", cluster, task_arns.len());

        let mut snapshots = Vec::with_capacity(task_arns.len());
        for batch in task_arns.chunks(DESCRIBE_TASKS_BATCH) {
            let output = self
                .client
                .describe_tasks()
                .cluster(cluster)
                .set_tasks(Some(batch.to_vec()))
                .send()
                .await
                .map_err(|e| ClientError::new("DescribeTasks", DisplayErrorContext(&e)))?;

            snapshots.extend(output.tasks().iter().filter_map(|task| {
                Some(RunningTaskSnapshot {
                    task_arn: task.task_arn()?.to_string(),
                    task_definition_arn: task.task_definition_arn()?.to_string(),
                })
            }));
        }

        Ok(snapshots)
    }
}

fn task_definition_from_sdk(
    operation: &'static str,
    td: &aws_sdk_ecs::types::TaskDefinition,
) -> Result<TaskDefinition, ClientError> {
    let arn = td
        .task_definition_arn()
        .ok_or_else(|| ClientError::new(operation, "task definition has no ARN"))?;
    let family = td
        .family()
        .map(str::to_string)
        .unwrap_or_else(|| family_from_arn(arn).to_string());

    Ok(TaskDefinition {
        family,
        revision: td.revision(),
        arn: arn.to_string(),
        container_definitions: td.container_definitions().to_vec(),
        volumes: td.volumes().to_vec(),
        settings: TaskSettings {
            task_role_arn: td.task_role_arn().map(str::to_string),
            execution_role_arn: td.execution_role_arn().map(str::to_string),
            network_mode: td.network_mode().cloned(),
            requires_compatibilities: td.requires_compatibilities().to_vec(),
            cpu: td.cpu().map(str::to_string),
            memory: td.memory().map(str::to_string),
            placement_constraints: td.placement_constraints().to_vec(),
        },
    })
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}
