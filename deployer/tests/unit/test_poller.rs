//! Convergence poller tests

use std::time::Duration;

use ecs_deploy::deploy::poller::{poll, Options, PollOutcome, PollTarget};
use ecs_deploy::errors::DeployError;

use crate::mock_ecs::{task_definition_arn, FakeClock, MockEcs};

fn target(arn: &str) -> PollTarget<'_> {
    PollTarget {
        cluster: "c1",
        service_name: "svc",
        task_definition_arn: arn,
    }
}

fn options(timeout_secs: u64) -> Options {
    Options {
        timeout: Duration::from_secs(timeout_secs),
        interval: Duration::from_secs(10),
    }
}

#[tokio::test]
async fn test_converges_on_third_observation() {
    let old = task_definition_arn("app", 3);
    let new = task_definition_arn("app", 4);
    let client = MockEcs::new()
        .with_service("c1", "svc", &new)
        .with_poll_frames(vec![
            vec![old.clone()],
            vec![old.clone()],
            vec![old.clone(), new.clone()],
        ]);
    let clock = FakeClock::new();

    let outcome = poll(
        &client,
        target(&new),
        &options(90),
        clock.now_fn(),
        clock.sleep_fn(),
    )
    .await
    .unwrap();

    match outcome {
        PollOutcome::Converged {
            iterations,
            task_arn,
        } => {
            assert_eq!(iterations, 3);
            assert!(task_arn.ends_with("task/c1/task-4"));
        }
        other => panic!("expected convergence, got {:?}", other),
    }
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(10); 2]);
}

#[tokio::test]
async fn test_zero_timeout_observes_once() {
    let old = task_definition_arn("app", 3);
    let new = task_definition_arn("app", 4);
    let client = MockEcs::new()
        .with_service("c1", "svc", &old)
        .with_poll_frames(vec![vec![old.clone()]]);
    let clock = FakeClock::new();

    let outcome = poll(
        &client,
        target(&new),
        &options(0),
        clock.now_fn(),
        clock.sleep_fn(),
    )
    .await
    .unwrap();

    assert_eq!(
        outcome,
        PollOutcome::TimedOut {
            iterations: 1,
            elapsed: Duration::ZERO
        }
    );
    assert!(clock.sleeps().is_empty());
    assert_eq!(client.call_count("ListTasks"), 1);
}

#[tokio::test]
async fn test_times_out_after_deadline() {
    let old = task_definition_arn("app", 3);
    let new = task_definition_arn("app", 4);
    let client = MockEcs::new().with_service("c1", "svc", &old);
    let clock = FakeClock::new();

    let outcome = poll(
        &client,
        target(&new),
        &options(25),
        clock.now_fn(),
        clock.sleep_fn(),
    )
    .await
    .unwrap();

    // Observations at 0s, 10s, 20s and 30s; the last one is past the deadline
    assert_eq!(
        outcome,
        PollOutcome::TimedOut {
            iterations: 4,
            elapsed: Duration::from_secs(30)
        }
    );
    assert_eq!(clock.sleeps().len(), 3);
}

#[tokio::test]
async fn test_empty_task_list_is_not_converged() {
    let new = task_definition_arn("app", 4);
    let client = MockEcs::new()
        .with_service("c1", "svc", &new)
        .with_poll_frames(vec![vec![], vec![new.clone()]]);
    let clock = FakeClock::new();

    let outcome = poll(
        &client,
        target(&new),
        &options(90),
        clock.now_fn(),
        clock.sleep_fn(),
    )
    .await
    .unwrap();

    assert_eq!(outcome.iterations(), 2);
    assert_eq!(client.call_count("ListTasks"), 2);
    assert_eq!(client.call_count("DescribeTasks"), 1);
}

#[tokio::test]
async fn test_client_failure_is_polling_error() {
    let new = task_definition_arn("app", 4);
    let client = MockEcs::new()
        .with_service("c1", "svc", &new)
        .failing("DescribeTasks");
    let clock = FakeClock::new();

    let err = poll(
        &client,
        target(&new),
        &options(90),
        clock.now_fn(),
        clock.sleep_fn(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, DeployError::PollingError(_)));
    assert!(clock.sleeps().is_empty());
}

#[test]
fn test_default_options() {
    let options = Options::default();
    assert_eq!(options.timeout, Duration::from_secs(90));
    assert_eq!(options.interval, Duration::from_secs(10));
}

#[tokio::test]
async fn test_unrepresentable_timeout_is_rejected() {
    let new = task_definition_arn("app", 4);
    let client = MockEcs::new().with_service("c1", "svc", &new);
    let clock = FakeClock::new();
    let options = Options {
        timeout: Duration::from_secs(u64::MAX),
        interval: Duration::from_secs(1),
    };

    let err = poll(
        &client,
        target(&new),
        &options,
        clock.now_fn(),
        clock.sleep_fn(),
    )
    .await
    .unwrap_err();

    assert_eq!(err.reason(), "configuration_error");
    assert!(client.calls().is_empty());
}
