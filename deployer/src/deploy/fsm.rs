//! Finite State Machine for a deployment run

use serde::{Deserialize, Serialize};

/// Deployment state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentState {
    /// Not started
    Pending,

    /// Resolving the missing service or task definition name
    Resolving,

    /// Fetching the current task definition
    Fetching,

    /// Applying image overrides
    Mutating,

    /// Registering the new revision
    Registering,

    /// Pointing the service at the new revision
    UpdatingService,

    /// Waiting for a task of the new revision
    Polling,

    /// New revision observed running
    Succeeded,

    /// Rollout not observed before the deadline
    TimedOut,

    /// A stage failed
    Failed,
}

impl DeploymentState {
    /// Whether the run has finished
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeploymentState::Succeeded | DeploymentState::TimedOut | DeploymentState::Failed
        )
    }
}

/// Deployment event
#[derive(Debug, Clone)]
pub enum DeploymentEvent {
    /// Start the run
    Start,

    /// Service and task definition names known
    Resolved,

    /// Current task definition fetched
    Fetched,

    /// Container definitions rewritten
    Mutated,

    /// New revision registered
    Registered,

    /// Service update accepted
    ServiceUpdated,

    /// New revision observed running
    Converged,

    /// Polling deadline passed
    PollTimedOut,

    /// Current stage failed
    Failed(String),
}

/// Deployment FSM
#[derive(Debug, Clone)]
pub struct DeploymentFsm {
    state: DeploymentState,
    failed_stage: Option<DeploymentState>,
    error: Option<String>,
}

impl DeploymentFsm {
    /// Create a new FSM in pending state
    pub fn new() -> Self {
        Self {
            state: DeploymentState::Pending,
            failed_stage: None,
            error: None,
        }
    }

    /// Get current state
    pub fn state(&self) -> DeploymentState {
        self.state
    }

    /// Stage that was active when the run failed
    pub fn failed_stage(&self) -> Option<DeploymentState> {
        self.failed_stage
    }

    /// Get error message if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: DeploymentEvent) -> Result<DeploymentState, String> {
        let new_state = match (self.state, &event) {
            (DeploymentState::Pending, DeploymentEvent::Start) => DeploymentState::Resolving,
            (DeploymentState::Resolving, DeploymentEvent::Resolved) => DeploymentState::Fetching,
            (DeploymentState::Fetching, DeploymentEvent::Fetched) => DeploymentState::Mutating,
            (DeploymentState::Mutating, DeploymentEvent::Mutated) => DeploymentState::Registering,
            (DeploymentState::Registering, DeploymentEvent::Registered) => {
                DeploymentState::UpdatingService
            }
            (DeploymentState::UpdatingService, DeploymentEvent::ServiceUpdated) => {
                DeploymentState::Polling
            }
            (DeploymentState::Polling, DeploymentEvent::Converged) => DeploymentState::Succeeded,
            (DeploymentState::Polling, DeploymentEvent::PollTimedOut) => DeploymentState::TimedOut,

            // Any in-flight stage may fail
            (state, DeploymentEvent::Failed(err))
                if state != DeploymentState::Pending && !state.is_terminal() =>
            {
                self.failed_stage = Some(state);
                self.error = Some(err.clone());
                DeploymentState::Failed
            }

            // Invalid transitions
            (state, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", state, event));
            }
        };

        self.state = new_state;
        Ok(new_state)
    }
}

impl Default for DeploymentFsm {
    fn default() -> Self {
        Self::new()
    }
}
