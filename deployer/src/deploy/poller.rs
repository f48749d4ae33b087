//! Convergence polling

use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::ecs::client::EcsClientExt;
use crate::errors::DeployError;
use crate::models::deployment::{DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT};

/// Poller options
#[derive(Debug, Clone)]
pub struct Options {
    /// Total time allowed for observing the new revision
    pub timeout: Duration,

    /// Delay between observations
    pub interval: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// What to wait for
#[derive(Debug, Clone, Copy)]
pub struct PollTarget<'a> {
    pub cluster: &'a str,
    pub service_name: &'a str,
    pub task_definition_arn: &'a str,
}

/// Result of a polling run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// A task running the target revision was observed
    Converged { iterations: u32, task_arn: String },

    /// Deadline passed without observing the target revision
    TimedOut { iterations: u32, elapsed: Duration },
}

impl PollOutcome {
    pub fn iterations(&self) -> u32 {
        match self {
            PollOutcome::Converged { iterations, .. } | PollOutcome::TimedOut { iterations, .. } => {
                *iterations
            }
        }
    }
}

/// Poll until one running task of the service uses the target revision.
///
/// The deadline is checked after each observation, so an in-flight request
/// always completes. There is no sleep after the final observation. A
/// control-plane failure ends polling with [`DeployError::PollingError`]; a
/// timeout too large to form a deadline is a [`DeployError::ConfigError`].
pub async fn poll<N, S, F>(
    client: &dyn EcsClientExt,
    target: PollTarget<'_>,
    options: &Options,
    now_fn: N,
    sleep_fn: S,
) -> Result<PollOutcome, DeployError>
where
    N: Fn() -> Instant,
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    let started_at = now_fn();
    let deadline = started_at.checked_add(options.timeout).ok_or_else(|| {
        DeployError::ConfigError(format!("Timeout {:?} is out of range", options.timeout))
    })?;
    let mut iterations = 0;

    info!(
        "Will wait {:?} for tasks of {} to start",
        options.timeout, target.task_definition_arn
    );

    loop {
        iterations += 1;
        debug!(
            "Waiting for ECS tasks to update... {}s",
            now_fn().saturating_duration_since(started_at).as_secs()
        );

        if let Some(task_arn) = observe(client, target).await? {
            info!("Task {} runs {}", task_arn, target.task_definition_arn);
            return Ok(PollOutcome::Converged {
                iterations,
                task_arn,
            });
        }

        let now = now_fn();
        if now >= deadline {
            return Ok(PollOutcome::TimedOut {
                iterations,
                elapsed: now.saturating_duration_since(started_at),
            });
        }

        sleep_fn(options.interval).await;
    }
}

/// One observation: the first running task bound to the target, if any
async fn observe(
    client: &dyn EcsClientExt,
    target: PollTarget<'_>,
) -> Result<Option<String>, DeployError> {
    let task_arns = client
        .list_running_tasks(target.cluster, target.service_name)
        .await
        .map_err(|e| DeployError::PollingError(e.to_string()))?;

    if task_arns.is_empty() {
        debug!("No running tasks for {}", target.service_name);
        return Ok(None);
    }

    let tasks = client
        .describe_tasks(target.cluster, &task_arns)
        .await
        .map_err(|e| DeployError::PollingError(e.to_string()))?;

    Ok(tasks
        .into_iter()
        .find(|t| t.task_definition_arn == target.task_definition_arn)
        .map(|t| t.task_arn))
}
