//! Command line options

use std::time::Duration;

use clap::{Parser, ValueEnum};
use secrecy::SecretString;

use crate::ecs::config::ClientConfig;
use crate::errors::DeployError;
use crate::logs::{LogLevel, LogOptions};
use crate::models::deployment::{
    DeploymentRequest, ImageOverride, VolumeOverride, DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT,
};
use crate::models::image::with_tag;

/// Report format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Debug, Parser)]
#[command(name = "ecs-deploy", version, about = "Deploy new container images to an ECS service")]
pub struct Cli {
    /// Name of the ECS cluster
    #[arg(short = 'c', long, env = "ECS_DEPLOY_CLUSTER")]
    pub cluster: String,

    /// Service to deploy (either service-name or task-definition is required)
    #[arg(short = 'n', long, env = "ECS_DEPLOY_SERVICE_NAME")]
    pub service_name: Option<String>,

    /// Task definition family to deploy (either task-definition or service-name is required)
    #[arg(short = 'd', long, env = "ECS_DEPLOY_TASK_DEFINITION")]
    pub task_definition: Option<String>,

    /// Image for a container, as CONTAINER=IMAGE (repeatable); a bare IMAGE
    /// targets the only container of a single-container task definition
    #[arg(short = 'i', long = "image", value_name = "[CONTAINER=]IMAGE", required = true)]
    pub images: Vec<ImageOverride>,

    /// Take the image tag from this environment variable, replacing the tag of every --image
    #[arg(short = 'e', long, value_name = "VAR")]
    pub tag_env_var: Option<String>,

    /// Number of task instances to keep running in the service
    #[arg(short = 'D', long)]
    pub desired_count: Option<i32>,

    /// minimumHealthyPercent: lower limit on running tasks during a deployment
    #[arg(short = 'm', long = "min", value_name = "PERCENT")]
    pub minimum_healthy_percent: Option<i32>,

    /// maximumPercent: upper limit on running tasks during a deployment
    #[arg(short = 'M', long = "max", value_name = "PERCENT")]
    pub maximum_percent: Option<i32>,

    /// Seconds to wait for a task of the new revision to run
    #[arg(short = 't', long, value_name = "SECS", default_value_t = DEFAULT_TIMEOUT.as_secs())]
    pub timeout: u64,

    /// Seconds between checks while waiting (1-20)
    #[arg(long, value_name = "SECS", default_value_t = DEFAULT_POLL_INTERVAL.as_secs())]
    pub poll_interval: u64,

    /// Name of a host volume to define, referenced by container mount points
    #[arg(long, requires = "volume_source_path")]
    pub volume_name: Option<String>,

    /// Host path backing --volume-name
    #[arg(long, requires = "volume_name")]
    pub volume_source_path: Option<String>,

    /// Do not deregister the task definition revision being replaced
    #[arg(long)]
    pub keep_previous: bool,

    /// Number of revisions to keep active before deregistering the oldest
    #[arg(long, value_name = "N")]
    pub max_definitions: Option<u32>,

    /// AWS access key id (defaults to the standard AWS credential chain)
    #[arg(short = 'k', long, requires = "aws_secret_key")]
    pub aws_access_key: Option<String>,

    /// AWS secret access key
    #[arg(short = 's', long, requires = "aws_access_key")]
    pub aws_secret_key: Option<String>,

    /// AWS region
    #[arg(short = 'r', long)]
    pub region: Option<String>,

    /// AWS profile from the shared config files
    #[arg(short = 'p', long)]
    pub profile: Option<String>,

    /// Override the ECS endpoint URL
    #[arg(long)]
    pub endpoint_url: Option<String>,

    /// Verbose output (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Explicit log level, overrides -v
    #[arg(long, env = "ECS_DEPLOY_LOG_LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Emit logs as JSON
    #[arg(long)]
    pub json_logs: bool,

    /// Format of the final report on stdout
    #[arg(short = 'o', long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,
}

impl Cli {
    /// Build the validated deployment request.
    ///
    /// `env` looks up environment variables (for `--tag-env-var`).
    pub fn deployment_request<E>(&self, env: E) -> Result<DeploymentRequest, DeployError>
    where
        E: Fn(&str) -> Option<String>,
    {
        let images = match &self.tag_env_var {
            Some(var) => {
                let tag = env(var).filter(|t| !t.is_empty()).ok_or_else(|| {
                    DeployError::ConfigError(format!(
                        "Environment variable {} is not set or empty",
                        var
                    ))
                })?;
                self.images
                    .iter()
                    .map(|o| ImageOverride {
                        container: o.container.clone(),
                        image: with_tag(&o.image, &tag),
                    })
                    .collect()
            }
            None => self.images.clone(),
        };

        let volume = match (&self.volume_name, &self.volume_source_path) {
            (Some(name), Some(source_path)) => Some(VolumeOverride {
                name: name.clone(),
                source_path: source_path.clone(),
            }),
            _ => None,
        };

        let mut builder = DeploymentRequest::builder(self.cluster.clone())
            .image_overrides(images)
            .desired_count(self.desired_count)
            .minimum_healthy_percent(self.minimum_healthy_percent)
            .maximum_percent(self.maximum_percent)
            .volume(volume)
            .timeout(Duration::from_secs(self.timeout))
            .poll_interval(Duration::from_secs(self.poll_interval))
            .deregister_previous(!self.keep_previous)
            .max_definitions(self.max_definitions);

        if let Some(service_name) = &self.service_name {
            builder = builder.service_name(service_name.clone());
        }
        if let Some(task_definition) = &self.task_definition {
            builder = builder.task_definition(task_definition.clone());
        }

        builder.build()
    }

    /// Control plane client configuration
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            region: self.region.clone(),
            profile: self.profile.clone(),
            access_key_id: self.aws_access_key.clone(),
            secret_access_key: self.aws_secret_key.clone().map(SecretString::from),
            endpoint_url: self.endpoint_url.clone(),
        }
    }

    /// Logging options
    pub fn log_options(&self) -> LogOptions {
        LogOptions {
            log_level: self
                .log_level
                .unwrap_or_else(|| LogLevel::from_verbosity(self.verbose)),
            json_format: self.json_logs,
        }
    }
}
