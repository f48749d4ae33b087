//! Deployment orchestration

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::deploy::fsm::{DeploymentEvent, DeploymentFsm, DeploymentState};
use crate::deploy::poller::{self, PollOutcome, PollTarget};
use crate::deploy::{mutator, resolver, retention};
use crate::ecs::client::EcsClientExt;
use crate::errors::DeployError;
use crate::models::deployment::DeploymentRequest;
use crate::models::service::ServiceUpdate;
use crate::utils::generate_uuid;

/// What a run did, filled in as stages complete
#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentSummary {
    pub run_id: String,
    pub cluster: String,
    pub service_name: Option<String>,
    pub task_definition_family: Option<String>,
    pub previous_task_definition_arn: Option<String>,
    pub new_task_definition_arn: Option<String>,
    pub new_revision: Option<i32>,
    pub deregistered_revisions: Vec<i32>,
    pub poll_iterations: Option<u32>,
    pub converged_task_arn: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl DeploymentSummary {
    fn new(run_id: String, request: &DeploymentRequest) -> Self {
        Self {
            run_id,
            cluster: request.cluster().to_string(),
            service_name: request.service_name().map(str::to_string),
            task_definition_family: None,
            previous_task_definition_arn: None,
            new_task_definition_arn: None,
            new_revision: None,
            deregistered_revisions: Vec::new(),
            poll_iterations: None,
            converged_task_arn: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }
}

/// Result of a deployment run.
///
/// `TimedOut` means the service update was accepted but the new revision was
/// not observed running in time; it is not a [`DeployError`].
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Succeeded(DeploymentSummary),
    TimedOut(DeploymentSummary),
    Failed {
        summary: DeploymentSummary,
        stage: DeploymentState,
        error: DeployError,
    },
}

impl RunOutcome {
    pub fn summary(&self) -> &DeploymentSummary {
        match self {
            RunOutcome::Succeeded(summary)
            | RunOutcome::TimedOut(summary)
            | RunOutcome::Failed { summary, .. } => summary,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Succeeded(_))
    }

    /// Machine-readable reason; `None` on success
    pub fn reason(&self) -> Option<&'static str> {
        match self {
            RunOutcome::Succeeded(_) => None,
            RunOutcome::TimedOut(_) => Some("convergence_timeout"),
            RunOutcome::Failed { error, .. } => Some(error.reason()),
        }
    }

    /// Process exit code. Timeouts and fatal errors both exit 1; use
    /// [`RunOutcome::reason`] to tell them apart.
    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }
}

/// Drives one deployment from name resolution to convergence
pub struct Deployer {
    client: Arc<dyn EcsClientExt>,
}

impl Deployer {
    /// Create a new deployer
    pub fn new(client: Arc<dyn EcsClientExt>) -> Self {
        Self { client }
    }

    /// Run a deployment using the wall clock
    pub async fn run(&self, request: &DeploymentRequest) -> RunOutcome {
        self.run_with(request, Instant::now, tokio::time::sleep).await
    }

    /// Run a deployment with an injected clock and sleep
    pub async fn run_with<N, S, F>(
        &self,
        request: &DeploymentRequest,
        now_fn: N,
        sleep_fn: S,
    ) -> RunOutcome
    where
        N: Fn() -> Instant,
        S: Fn(Duration) -> F,
        F: Future<Output = ()>,
    {
        let run_id = generate_uuid();
        let span = info_span!(
            "deploy",
            run_id = %run_id,
            cluster = %request.cluster(),
            target = %request.target()
        );

        async move {
            let mut fsm = DeploymentFsm::new();
            let mut summary = DeploymentSummary::new(run_id, request);

            let result = self
                .execute(request, &mut fsm, &mut summary, now_fn, sleep_fn)
                .await;
            summary.finished_at = Some(Utc::now());

            match result {
                Ok(PollOutcome::Converged { .. }) => {
                    info!(
                        "Deployment of {} succeeded",
                        summary.new_task_definition_arn.as_deref().unwrap_or_default()
                    );
                    RunOutcome::Succeeded(summary)
                }
                Ok(PollOutcome::TimedOut { elapsed, .. }) => {
                    warn!(
                        "Service updated but {} was not seen running after {:?}; the rollout may still complete",
                        summary.new_task_definition_arn.as_deref().unwrap_or_default(),
                        elapsed
                    );
                    RunOutcome::TimedOut(summary)
                }
                Err(e) => {
                    if let Err(transition) = fsm.process(DeploymentEvent::Failed(e.to_string())) {
                        error!("{}", transition);
                    }
                    let stage = fsm.failed_stage().unwrap_or_else(|| fsm.state());
                    error!(
                        "Deployment failed while {:?}: {}",
                        stage,
                        fsm.error().unwrap_or_default()
                    );
                    RunOutcome::Failed {
                        summary,
                        stage,
                        error: e,
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn execute<N, S, F>(
        &self,
        request: &DeploymentRequest,
        fsm: &mut DeploymentFsm,
        summary: &mut DeploymentSummary,
        now_fn: N,
        sleep_fn: S,
    ) -> Result<PollOutcome, DeployError>
    where
        N: Fn() -> Instant,
        S: Fn(Duration) -> F,
        F: Future<Output = ()>,
    {
        let client = self.client.as_ref();
        advance(fsm, DeploymentEvent::Start)?;

        // Resolve identifiers
        let target = resolver::resolve(client, request).await?;
        info!(
            "Deploying service {} with task definition {}",
            target.service_name, target.task_definition
        );
        summary.service_name = Some(target.service_name.clone());
        advance(fsm, DeploymentEvent::Resolved)?;

        // Fetch current definition
        let current = client
            .describe_task_definition(&target.task_definition)
            .await
            .map_err(|e| DeployError::TaskDefinitionError(e.to_string()))?;
        info!("Current task definition {}", current.revision_ref());
        summary.task_definition_family = Some(current.family.clone());
        summary.previous_task_definition_arn = Some(current.arn.clone());
        advance(fsm, DeploymentEvent::Fetched)?;

        // Mutate
        let registration =
            mutator::next_revision(&current, request.image_overrides(), request.volume())?;
        advance(fsm, DeploymentEvent::Mutated)?;

        // Register
        if request.deregister_previous()
            && retention::deregister_previous(client, &current).await
        {
            summary.deregistered_revisions.push(current.revision);
        }

        info!("Registering new task definition for {}", registration.family);
        let registered = client
            .register_task_definition(registration)
            .await
            .map_err(|e| DeployError::RegistrationError(e.to_string()))?;
        info!("New task definition {} registered", registered.revision_ref());
        summary.new_task_definition_arn = Some(registered.arn.clone());
        summary.new_revision = Some(registered.revision);
        advance(fsm, DeploymentEvent::Registered)?;

        if let Some(keep) = request.max_definitions() {
            let removed = retention::prune_revisions(client, &registered, keep).await;
            summary.deregistered_revisions.extend(removed);
        }

        // Update service
        info!("Updating ECS service {}", target.service_name);
        client
            .update_service(ServiceUpdate {
                cluster: request.cluster().to_string(),
                service_name: target.service_name.clone(),
                task_definition: registered.revision_ref(),
                desired_count: request.desired_count(),
                deployment_bounds: request.deployment_bounds(),
            })
            .await
            .map_err(|e| DeployError::ServiceUpdateError(e.to_string()))?;
        advance(fsm, DeploymentEvent::ServiceUpdated)?;

        // Poll
        let options = poller::Options {
            timeout: request.timeout(),
            interval: request.poll_interval(),
        };
        let outcome = poller::poll(
            client,
            PollTarget {
                cluster: request.cluster(),
                service_name: &target.service_name,
                task_definition_arn: &registered.arn,
            },
            &options,
            now_fn,
            sleep_fn,
        )
        .await?;

        summary.poll_iterations = Some(outcome.iterations());
        match &outcome {
            PollOutcome::Converged { task_arn, .. } => {
                summary.converged_task_arn = Some(task_arn.clone());
                advance(fsm, DeploymentEvent::Converged)?;
            }
            PollOutcome::TimedOut { .. } => advance(fsm, DeploymentEvent::PollTimedOut)?,
        }

        Ok(outcome)
    }
}

fn advance(fsm: &mut DeploymentFsm, event: DeploymentEvent) -> Result<(), DeployError> {
    let state = fsm.process(event).map_err(DeployError::InternalError)?;
    debug!("Deployment state: {:?}", state);
    Ok(())
}
