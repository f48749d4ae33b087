//! End-to-end deployment runs against the in-memory control plane

use std::sync::Arc;
use std::time::Duration;

use ecs_deploy::deploy::fsm::DeploymentState;
use ecs_deploy::deploy::orchestrator::{Deployer, RunOutcome};
use ecs_deploy::deploy::report::{DeploymentReport, RunStatus};
use ecs_deploy::errors::DeployError;
use ecs_deploy::models::deployment::{
    DeploymentRequest, DeploymentRequestBuilder, ImageOverride, VolumeOverride,
};
use ecs_deploy::models::service::DeploymentBounds;
use ecs_deploy::models::task_definition::ContainerDefinition;

use crate::mock_ecs::{app_task_definition, task_definition_arn, FakeClock, MockEcs};

/// Cluster `c1` with service `svc` bound to `app:3`
fn deployed_app() -> MockEcs {
    let mut current = app_task_definition(3, "app:v1");
    current.container_definitions.push(
        ContainerDefinition::builder()
            .name("sidecar")
            .image("envoy:1.29")
            .memory(128)
            .build(),
    );

    MockEcs::new()
        .with_task_definition(current)
        .with_service("c1", "svc", &task_definition_arn("app", 3))
}

fn svc_request() -> DeploymentRequestBuilder {
    DeploymentRequest::builder("c1")
        .service_name("svc")
        .image("web", "app:v2")
}

async fn run(client: &Arc<MockEcs>, request: &DeploymentRequest) -> (RunOutcome, FakeClock) {
    let clock = FakeClock::new();
    let outcome = Deployer::new(client.clone())
        .run_with(request, clock.now_fn(), clock.sleep_fn())
        .await;
    (outcome, clock)
}

fn failure(outcome: &RunOutcome) -> (DeploymentState, &DeployError) {
    match outcome {
        RunOutcome::Failed { stage, error, .. } => (*stage, error),
        other => panic!("expected failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_successful_rollout() {
    let old = task_definition_arn("app", 3);
    let new = task_definition_arn("app", 4);
    let client = Arc::new(deployed_app().with_poll_frames(vec![
        vec![old.clone()],
        vec![old.clone()],
        vec![new.clone()],
    ]));

    let (outcome, clock) = run(&client, &svc_request().build().unwrap()).await;

    assert!(outcome.is_success(), "{:?}", outcome);
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(outcome.reason(), None);

    let summary = outcome.summary();
    assert_eq!(summary.service_name.as_deref(), Some("svc"));
    assert_eq!(summary.task_definition_family.as_deref(), Some("app"));
    assert_eq!(summary.previous_task_definition_arn.as_deref(), Some(old.as_str()));
    assert_eq!(summary.new_task_definition_arn.as_deref(), Some(new.as_str()));
    assert_eq!(summary.new_revision, Some(4));
    assert_eq!(summary.poll_iterations, Some(3));
    assert!(summary.converged_task_arn.is_some());
    assert!(summary.finished_at.is_some());
    assert_eq!(clock.sleeps().len(), 2);

    // Only the image of the overridden container changed
    let registration = &client.registrations()[0];
    let web = &registration.container_definitions[0];
    assert_eq!(web.image.as_deref(), Some("app:v2"));
    assert_eq!(web.memory, Some(512));
    let sidecar = &registration.container_definitions[1];
    assert_eq!(sidecar.image.as_deref(), Some("envoy:1.29"));
    assert_eq!(sidecar.memory, Some(128));

    let updates = client.updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].cluster, "c1");
    assert_eq!(updates[0].service_name, "svc");
    assert_eq!(updates[0].task_definition, "app:4");
    assert_eq!(client.service_task_definition("c1", "svc"), Some(new));

    assert_eq!(
        &client.calls()[..4],
        &[
            "DescribeServices",
            "DescribeTaskDefinition",
            "RegisterTaskDefinition",
            "UpdateService"
        ]
    );
}

#[tokio::test]
async fn test_unset_update_fields_are_not_sent() {
    let client = Arc::new(deployed_app());

    let (outcome, _) = run(&client, &svc_request().build().unwrap()).await;

    assert!(outcome.is_success());
    let update = &client.updates()[0];
    assert_eq!(update.desired_count, None);
    assert_eq!(update.deployment_bounds, None);
}

#[tokio::test]
async fn test_update_fields_forwarded() {
    let client = Arc::new(deployed_app());
    let request = svc_request()
        .desired_count(Some(2))
        .minimum_healthy_percent(Some(50))
        .build()
        .unwrap();

    let (outcome, _) = run(&client, &request).await;

    assert!(outcome.is_success());
    let update = &client.updates()[0];
    assert_eq!(update.desired_count, Some(2));
    assert_eq!(
        update.deployment_bounds,
        Some(DeploymentBounds {
            minimum_healthy_percent: Some(50),
            maximum_percent: None,
        })
    );
}

#[tokio::test]
async fn test_repeated_runs_register_new_revisions() {
    let client = Arc::new(
        MockEcs::new()
            .with_task_definition(app_task_definition(4, "app:v2"))
            .with_service("c1", "svc", &task_definition_arn("app", 4)),
    );
    let request = svc_request().build().unwrap();

    let (first, _) = run(&client, &request).await;
    let (second, _) = run(&client, &request).await;

    assert!(first.is_success());
    assert!(second.is_success());
    assert_eq!(first.summary().new_revision, Some(5));
    assert_eq!(second.summary().new_revision, Some(6));
    assert_ne!(first.summary().run_id, second.summary().run_id);

    let images: Vec<_> = client
        .registrations()
        .iter()
        .map(|r| r.container_definitions[0].image.clone())
        .collect();
    assert_eq!(images, vec![Some("app:v2".to_string()); 2]);
}

#[tokio::test]
async fn test_unknown_container_stops_before_registration() {
    let client = Arc::new(deployed_app());
    let request = DeploymentRequest::builder("c1")
        .service_name("svc")
        .image("api", "app:v2")
        .build()
        .unwrap();

    let (outcome, _) = run(&client, &request).await;

    let (stage, error) = failure(&outcome);
    assert_eq!(stage, DeploymentState::Mutating);
    assert_eq!(
        error,
        &DeployError::ContainerNotFound {
            container: "api".to_string(),
            task_definition_arn: task_definition_arn("app", 3),
        }
    );
    assert_eq!(outcome.reason(), Some("container_not_found"));
    assert_eq!(client.call_count("RegisterTaskDefinition"), 0);
    assert_eq!(client.call_count("UpdateService"), 0);
}

#[tokio::test]
async fn test_bare_image_on_single_container() {
    let client = Arc::new(
        MockEcs::new()
            .with_task_definition(app_task_definition(3, "app:v1"))
            .with_service("c1", "svc", &task_definition_arn("app", 3)),
    );
    let request = DeploymentRequest::builder("c1")
        .service_name("svc")
        .image_overrides([ImageOverride::bare("app:v2")])
        .build()
        .unwrap();

    let (outcome, _) = run(&client, &request).await;

    assert!(outcome.is_success(), "{:?}", outcome);
    let web = &client.registrations()[0].container_definitions[0];
    assert_eq!(web.image.as_deref(), Some("app:v2"));
}

#[tokio::test]
async fn test_bare_image_on_several_containers() {
    let client = Arc::new(deployed_app());
    let request = DeploymentRequest::builder("c1")
        .service_name("svc")
        .image_overrides([ImageOverride::bare("app:v2")])
        .build()
        .unwrap();

    let (outcome, _) = run(&client, &request).await;

    let (stage, error) = failure(&outcome);
    assert_eq!(stage, DeploymentState::Mutating);
    assert_eq!(error.reason(), "configuration_error");
    assert_eq!(client.call_count("RegisterTaskDefinition"), 0);
}

#[tokio::test]
async fn test_unresolvable_service() {
    let client = Arc::new(deployed_app());
    let request = DeploymentRequest::builder("c1")
        .service_name("missing")
        .image("web", "app:v2")
        .build()
        .unwrap();

    let (outcome, _) = run(&client, &request).await;

    let (stage, error) = failure(&outcome);
    assert_eq!(stage, DeploymentState::Resolving);
    assert!(matches!(error, DeployError::ResolutionError(_)));
    assert_eq!(client.calls(), vec!["DescribeServices"]);
}

#[tokio::test]
async fn test_missing_task_definition() {
    let client = Arc::new(MockEcs::new().with_service("c1", "svc", &task_definition_arn("app", 3)));

    let (outcome, _) = run(&client, &svc_request().build().unwrap()).await;

    let (stage, error) = failure(&outcome);
    assert_eq!(stage, DeploymentState::Fetching);
    assert_eq!(error.reason(), "task_definition_error");
}

#[tokio::test]
async fn test_registration_and_update_failures_are_distinct() {
    let request = svc_request().build().unwrap();

    let client = Arc::new(deployed_app().failing("RegisterTaskDefinition"));
    let (registration, _) = run(&client, &request).await;
    assert_eq!(failure(&registration).0, DeploymentState::Registering);
    assert_eq!(client.call_count("UpdateService"), 0);

    let client = Arc::new(deployed_app().failing("UpdateService"));
    let (update, _) = run(&client, &request).await;
    assert_eq!(failure(&update).0, DeploymentState::UpdatingService);
    assert_eq!(client.call_count("ListTasks"), 0);
    // The registered revision is left in place
    assert_eq!(update.summary().new_revision, Some(4));
    assert_eq!(client.active_revisions("app"), vec![3, 4]);

    assert_eq!(registration.reason(), Some("registration_error"));
    assert_eq!(update.reason(), Some("service_update_error"));
    assert_eq!(registration.exit_code(), 1);
    assert_eq!(update.exit_code(), 1);
}

#[tokio::test]
async fn test_convergence_timeout() {
    let client = Arc::new(
        deployed_app().with_poll_frames(vec![vec![task_definition_arn("app", 3)]]),
    );
    let request = svc_request().timeout(Duration::ZERO).build().unwrap();

    let (outcome, clock) = run(&client, &request).await;

    assert!(matches!(outcome, RunOutcome::TimedOut(_)));
    assert_eq!(outcome.reason(), Some("convergence_timeout"));
    assert_eq!(outcome.exit_code(), 1);
    assert_eq!(outcome.summary().poll_iterations, Some(1));
    assert!(clock.sleeps().is_empty());
    // The update itself went through
    assert_eq!(client.call_count("UpdateService"), 1);
}

#[tokio::test]
async fn test_polling_failure() {
    let client = Arc::new(deployed_app().failing("ListTasks"));

    let (outcome, _) = run(&client, &svc_request().build().unwrap()).await;

    let (stage, error) = failure(&outcome);
    assert_eq!(stage, DeploymentState::Polling);
    assert!(matches!(error, DeployError::PollingError(_)));
}

#[tokio::test]
async fn test_resolve_service_from_task_definition() {
    let client = Arc::new(
        MockEcs::new()
            .with_task_definition(app_task_definition(3, "app:v1"))
            .with_service("c1", "worker", &task_definition_arn("worker", 1))
            .with_service("c1", "app", &task_definition_arn("app", 3)),
    );
    let request = DeploymentRequest::builder("c1")
        .task_definition("app")
        .image("web", "app:v2")
        .build()
        .unwrap();

    let (outcome, _) = run(&client, &request).await;

    assert!(outcome.is_success(), "{:?}", outcome);
    assert_eq!(outcome.summary().service_name.as_deref(), Some("app"));
    assert_eq!(client.updates()[0].service_name, "app");
}

#[tokio::test]
async fn test_deregisters_previous_revision() {
    let client = Arc::new(deployed_app());
    let request = svc_request().deregister_previous(true).build().unwrap();

    let (outcome, _) = run(&client, &request).await;

    assert!(outcome.is_success());
    assert_eq!(outcome.summary().deregistered_revisions, vec![3]);
    assert_eq!(client.active_revisions("app"), vec![4]);

    let calls = client.calls();
    let position = |op: &str| calls.iter().position(|c| *c == op).unwrap();
    assert!(position("DeregisterTaskDefinition") < position("RegisterTaskDefinition"));
}

#[tokio::test]
async fn test_deregistration_failure_is_not_fatal() {
    let client = Arc::new(deployed_app().failing("DeregisterTaskDefinition"));
    let request = svc_request().deregister_previous(true).build().unwrap();

    let (outcome, _) = run(&client, &request).await;

    assert!(outcome.is_success(), "{:?}", outcome);
    assert!(outcome.summary().deregistered_revisions.is_empty());
    assert_eq!(client.active_revisions("app"), vec![3, 4]);
}

#[tokio::test]
async fn test_max_definitions_prunes_oldest() {
    let client = Arc::new(
        deployed_app()
            .with_task_definition(app_task_definition(1, "app:v0"))
            .with_task_definition(app_task_definition(2, "app:v0")),
    );
    let request = svc_request().max_definitions(Some(2)).build().unwrap();

    let (outcome, _) = run(&client, &request).await;

    assert!(outcome.is_success());
    assert_eq!(outcome.summary().deregistered_revisions, vec![1, 2]);
    assert_eq!(client.active_revisions("app"), vec![3, 4]);
}

#[tokio::test]
async fn test_volume_override() {
    let client = Arc::new(deployed_app());
    let request = svc_request()
        .volume(Some(VolumeOverride {
            name: "data".to_string(),
            source_path: "/srv/data".to_string(),
        }))
        .build()
        .unwrap();

    let (outcome, _) = run(&client, &request).await;

    assert!(outcome.is_success());
    let volumes = &client.registrations()[0].volumes;
    assert_eq!(volumes.len(), 1);
    assert_eq!(volumes[0].name.as_deref(), Some("data"));
    assert_eq!(
        volumes[0].host.as_ref().and_then(|h| h.source_path.as_deref()),
        Some("/srv/data")
    );
}

#[tokio::test]
async fn test_report_from_outcome() {
    let client = Arc::new(deployed_app().failing("UpdateService"));

    let (outcome, _) = run(&client, &svc_request().build().unwrap()).await;
    let report = DeploymentReport::from(&outcome);

    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(report.reason.as_deref(), Some("service_update_error"));
    assert_eq!(report.failed_stage, Some(DeploymentState::UpdatingService));
    assert_eq!(report.new_task_definition_arn, Some(task_definition_arn("app", 4)));

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["status"], "failed");
    assert_eq!(json["failed_stage"], "updating_service");
}

#[test]
fn test_wall_clock_run() {
    let client = Arc::new(deployed_app());
    let request = svc_request().build().unwrap();

    let outcome = tokio_test::block_on(Deployer::new(client).run(&request));

    assert!(outcome.is_success());
}
