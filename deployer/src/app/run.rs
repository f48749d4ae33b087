//! Command execution

use std::sync::Arc;

use colored::Colorize;
use tracing::{error, info};

use crate::app::options::{Cli, OutputFormat};
use crate::deploy::orchestrator::Deployer;
use crate::deploy::report::{DeploymentReport, RunStatus};
use crate::ecs::aws::AwsEcsClient;
use crate::ecs::client::EcsClientExt;
use crate::errors::DeployError;
use crate::utils::version_info;

/// Run one deployment from parsed command line options.
///
/// Returns the process exit code.
pub async fn run(cli: &Cli) -> Result<i32, DeployError> {
    let request = match cli.deployment_request(|var| std::env::var(var).ok()) {
        Ok(request) => request,
        Err(e) => {
            error!("{}", e);
            print_report(&DeploymentReport::rejected(&cli.cluster, &e), cli.output)?;
            return Ok(1);
        }
    };
    info!("ecs-deploy {}", version_info());

    let client: Arc<dyn EcsClientExt> =
        Arc::new(AwsEcsClient::from_config(&cli.client_config()).await);
    let outcome = Deployer::new(client).run(&request).await;

    print_report(&DeploymentReport::from(&outcome), cli.output)?;
    Ok(outcome.exit_code())
}

fn print_report(report: &DeploymentReport, format: OutputFormat) -> Result<(), DeployError> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(report)
                .map_err(|e| DeployError::InternalError(e.to_string()))?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            println!("{}", render_text(report));
        }
    }

    Ok(())
}

/// Human readable summary of a report
pub fn render_text(report: &DeploymentReport) -> String {
    let status = match report.status {
        RunStatus::Succeeded => "SUCCEEDED".green().bold(),
        RunStatus::TimedOut => "TIMED OUT".yellow().bold(),
        RunStatus::Failed => "FAILED".red().bold(),
    };

    let mut lines = vec![format!("Deployment {}", status)];
    let mut field = |label: &str, value: Option<String>| {
        if let Some(value) = value {
            lines.push(format!("  {:<22}{}", label, value));
        }
    };

    field("Run ID:", Some(report.run_id.clone()));
    field("Reason:", report.reason.clone());
    field("Error:", report.error.clone());
    field("Failed stage:", report.failed_stage.map(|s| format!("{:?}", s)));
    field("Cluster:", Some(report.cluster.clone()));
    field("Service:", report.service_name.clone());
    field("Previous revision:", report.previous_task_definition_arn.clone());
    field("New revision:", report.new_task_definition_arn.clone());
    field("Poll iterations:", report.poll_iterations.map(|n| n.to_string()));

    if report.status == RunStatus::TimedOut {
        lines.push(
            "  The service was updated; only observation of the rollout timed out."
                .dimmed()
                .to_string(),
        );
    }

    lines.join("\n")
}
