//! ecs-deploy - Entry Point
//!
//! Deploys new container images to an ECS service and waits for the rollout.

use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use ecs_deploy::app::options::Cli;
use ecs_deploy::app::run::run;
use ecs_deploy::logs::init_logging;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.log_options()) {
        eprintln!("Failed to initialize logging: {e}");
    }

    match run(&cli).await {
        Ok(0) => ExitCode::SUCCESS,
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
