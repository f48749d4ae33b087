//! Machine-readable run report

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::deploy::fsm::DeploymentState;
use crate::deploy::orchestrator::RunOutcome;
use crate::errors::DeployError;
use crate::utils::generate_uuid;

/// Final status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Succeeded,
    TimedOut,
    Failed,
}

/// Report printed at the end of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentReport {
    pub run_id: String,
    pub status: RunStatus,

    /// `convergence_timeout` or a [`crate::errors::DeployError::reason`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<DeploymentState>,

    pub cluster: String,
    pub service_name: Option<String>,
    pub task_definition_family: Option<String>,
    pub previous_task_definition_arn: Option<String>,
    pub new_task_definition_arn: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deregistered_revisions: Vec<i32>,

    pub poll_iterations: Option<u32>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl From<&RunOutcome> for DeploymentReport {
    fn from(outcome: &RunOutcome) -> Self {
        let summary = outcome.summary();
        let (status, error, failed_stage) = match outcome {
            RunOutcome::Succeeded(_) => (RunStatus::Succeeded, None, None),
            RunOutcome::TimedOut(_) => (RunStatus::TimedOut, None, None),
            RunOutcome::Failed { stage, error, .. } => {
                (RunStatus::Failed, Some(error.to_string()), Some(*stage))
            }
        };

        Self {
            run_id: summary.run_id.clone(),
            status,
            reason: outcome.reason().map(str::to_string),
            error,
            failed_stage,
            cluster: summary.cluster.clone(),
            service_name: summary.service_name.clone(),
            task_definition_family: summary.task_definition_family.clone(),
            previous_task_definition_arn: summary.previous_task_definition_arn.clone(),
            new_task_definition_arn: summary.new_task_definition_arn.clone(),
            deregistered_revisions: summary.deregistered_revisions.clone(),
            poll_iterations: summary.poll_iterations,
            started_at: summary.started_at,
            finished_at: summary.finished_at,
        }
    }
}

impl DeploymentReport {
    /// Report for a run refused before any remote call, e.g. on invalid input
    pub fn rejected(cluster: &str, error: &DeployError) -> Self {
        let now = Utc::now();
        Self {
            run_id: generate_uuid(),
            status: RunStatus::Failed,
            reason: Some(error.reason().to_string()),
            error: Some(error.to_string()),
            failed_stage: None,
            cluster: cluster.to_string(),
            service_name: None,
            task_definition_family: None,
            previous_task_definition_arn: None,
            new_task_definition_arn: None,
            deregistered_revisions: Vec::new(),
            poll_iterations: None,
            started_at: now,
            finished_at: Some(now),
        }
    }
}
