//! Deployment request model

use std::collections::HashSet;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::DeployError;
use crate::models::service::DeploymentBounds;

/// Default time to wait for the new revision to show up
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(90);

/// Default delay between convergence observations
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Poll interval bounds
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(20);

/// Longest accepted convergence timeout
pub const MAX_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Image to set on one container.
///
/// Without a container name the image applies to the only container of a
/// single-container task definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageOverride {
    pub container: Option<String>,
    pub image: String,
}

impl ImageOverride {
    pub fn new(container: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            container: Some(container.into()),
            image: image.into(),
        }
    }

    /// Image for the sole container
    pub fn bare(image: impl Into<String>) -> Self {
        Self {
            container: None,
            image: image.into(),
        }
    }
}

impl std::fmt::Display for ImageOverride {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.container {
            Some(container) => write!(f, "{}={}", container, self.image),
            None => write!(f, "{}", self.image),
        }
    }
}

impl FromStr for ImageOverride {
    type Err = String;

    /// Parses `container=image` or a bare `image`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("Invalid image override '{}', expected [CONTAINER=]IMAGE", s);
        match s.split_once('=') {
            Some((container, image)) => {
                let (container, image) = (container.trim(), image.trim());
                if container.is_empty() || image.is_empty() {
                    return Err(invalid());
                }
                Ok(ImageOverride::new(container, image))
            }
            None if !s.trim().is_empty() => Ok(ImageOverride::bare(s.trim())),
            None => Err(invalid()),
        }
    }
}

/// Host volume that replaces the task definition's volumes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeOverride {
    /// Volume name referenced by container mount points
    pub name: String,

    /// Path on the container instance
    pub source_path: String,
}

/// Validated input for one deployment run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentRequest {
    cluster: String,
    service_name: Option<String>,
    task_definition: Option<String>,
    image_overrides: Vec<ImageOverride>,
    desired_count: Option<i32>,
    deployment_bounds: DeploymentBounds,
    volume: Option<VolumeOverride>,
    timeout: Duration,
    poll_interval: Duration,
    deregister_previous: bool,
    max_definitions: Option<u32>,
}

impl DeploymentRequest {
    /// Start building a request for a cluster
    pub fn builder(cluster: impl Into<String>) -> DeploymentRequestBuilder {
        DeploymentRequestBuilder::new(cluster)
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    pub fn service_name(&self) -> Option<&str> {
        self.service_name.as_deref()
    }

    pub fn task_definition(&self) -> Option<&str> {
        self.task_definition.as_deref()
    }

    pub fn image_overrides(&self) -> &[ImageOverride] {
        &self.image_overrides
    }

    pub fn desired_count(&self) -> Option<i32> {
        self.desired_count
    }

    /// Bounds to forward, or `None` when neither was given
    pub fn deployment_bounds(&self) -> Option<DeploymentBounds> {
        if self.deployment_bounds.is_empty() {
            None
        } else {
            Some(self.deployment_bounds)
        }
    }

    pub fn volume(&self) -> Option<&VolumeOverride> {
        self.volume.as_ref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn deregister_previous(&self) -> bool {
        self.deregister_previous
    }

    pub fn max_definitions(&self) -> Option<u32> {
        self.max_definitions
    }

    /// Human readable deployment target
    pub fn target(&self) -> &str {
        self.service_name
            .as_deref()
            .or(self.task_definition.as_deref())
            .unwrap_or_default()
    }
}

/// Builder for [`DeploymentRequest`]
#[derive(Debug, Clone)]
pub struct DeploymentRequestBuilder {
    cluster: String,
    service_name: Option<String>,
    task_definition: Option<String>,
    image_overrides: Vec<ImageOverride>,
    desired_count: Option<i32>,
    deployment_bounds: DeploymentBounds,
    volume: Option<VolumeOverride>,
    timeout: Duration,
    poll_interval: Duration,
    deregister_previous: bool,
    max_definitions: Option<u32>,
}

impl DeploymentRequestBuilder {
    fn new(cluster: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            service_name: None,
            task_definition: None,
            image_overrides: Vec::new(),
            desired_count: None,
            deployment_bounds: DeploymentBounds::default(),
            volume: None,
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            deregister_previous: false,
            max_definitions: None,
        }
    }

    pub fn service_name(mut self, service_name: impl Into<String>) -> Self {
        self.service_name = Some(service_name.into());
        self
    }

    pub fn task_definition(mut self, task_definition: impl Into<String>) -> Self {
        self.task_definition = Some(task_definition.into());
        self
    }

    pub fn image(mut self, container: impl Into<String>, image: impl Into<String>) -> Self {
        self.image_overrides.push(ImageOverride::new(container, image));
        self
    }

    pub fn image_overrides(mut self, overrides: impl IntoIterator<Item = ImageOverride>) -> Self {
        self.image_overrides.extend(overrides);
        self
    }

    pub fn desired_count(mut self, desired_count: Option<i32>) -> Self {
        self.desired_count = desired_count;
        self
    }

    pub fn minimum_healthy_percent(mut self, percent: Option<i32>) -> Self {
        self.deployment_bounds.minimum_healthy_percent = percent;
        self
    }

    pub fn maximum_percent(mut self, percent: Option<i32>) -> Self {
        self.deployment_bounds.maximum_percent = percent;
        self
    }

    pub fn volume(mut self, volume: Option<VolumeOverride>) -> Self {
        self.volume = volume;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn deregister_previous(mut self, deregister_previous: bool) -> Self {
        self.deregister_previous = deregister_previous;
        self
    }

    pub fn max_definitions(mut self, max_definitions: Option<u32>) -> Self {
        self.max_definitions = max_definitions;
        self
    }

    /// Validate and build the request
    pub fn build(self) -> Result<DeploymentRequest, DeployError> {
        let cluster = self.cluster.trim().to_string();
        if cluster.is_empty() {
            return Err(DeployError::ConfigError("Cluster must be provided".to_string()));
        }

        let service_name = non_empty(self.service_name);
        let task_definition = non_empty(self.task_definition);
        if service_name.is_none() && task_definition.is_none() {
            return Err(DeployError::ConfigError(
                "Either task-definition or service-name must be provided".to_string(),
            ));
        }

        if self.image_overrides.is_empty() {
            return Err(DeployError::ConfigError(
                "At least one image override is required".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for o in &self.image_overrides {
            if o.image.is_empty() || o.container.as_deref() == Some("") {
                return Err(DeployError::ConfigError(format!(
                    "Image override '{}' has an empty container or image",
                    o
                )));
            }
            match &o.container {
                Some(container) if !seen.insert(container.as_str()) => {
                    return Err(DeployError::ConfigError(format!(
                        "Container '{}' is overridden more than once",
                        container
                    )));
                }
                None if self.image_overrides.len() > 1 => {
                    return Err(DeployError::ConfigError(format!(
                        "Image '{}' names no container; use CONTAINER=IMAGE when giving several images",
                        o.image
                    )));
                }
                _ => {}
            }
        }

        if let Some(count) = self.desired_count {
            if count < 0 {
                return Err(DeployError::ConfigError(format!(
                    "Desired count must not be negative, got {}",
                    count
                )));
            }
        }

        let bounds = self.deployment_bounds;
        for percent in [bounds.minimum_healthy_percent, bounds.maximum_percent]
            .into_iter()
            .flatten()
        {
            if percent < 0 {
                return Err(DeployError::ConfigError(format!(
                    "Deployment percentages must not be negative, got {}",
                    percent
                )));
            }
        }
        if let (Some(min), Some(max)) = (bounds.minimum_healthy_percent, bounds.maximum_percent) {
            if min > max {
                return Err(DeployError::ConfigError(format!(
                    "Minimum healthy percent ({}) exceeds maximum percent ({})",
                    min, max
                )));
            }
        }

        if let Some(volume) = &self.volume {
            if volume.name.is_empty() || volume.source_path.is_empty() {
                return Err(DeployError::ConfigError(
                    "Volume override needs both a name and a source path".to_string(),
                ));
            }
        }

        if self.timeout > MAX_TIMEOUT {
            return Err(DeployError::ConfigError(format!(
                "Timeout must be at most {}s, got {}s",
                MAX_TIMEOUT.as_secs(),
                self.timeout.as_secs()
            )));
        }

        if !(MIN_POLL_INTERVAL..=MAX_POLL_INTERVAL).contains(&self.poll_interval) {
            return Err(DeployError::ConfigError(format!(
                "Poll interval must be between {:?} and {:?}, got {:?}",
                MIN_POLL_INTERVAL, MAX_POLL_INTERVAL, self.poll_interval
            )));
        }

        if self.max_definitions == Some(0) {
            return Err(DeployError::ConfigError(
                "Max definitions must keep at least one revision".to_string(),
            ));
        }

        Ok(DeploymentRequest {
            cluster,
            service_name,
            task_definition,
            image_overrides: self.image_overrides,
            desired_count: self.desired_count,
            deployment_bounds: bounds,
            volume: self.volume,
            timeout: self.timeout,
            poll_interval: self.poll_interval,
            deregister_previous: self.deregister_previous,
            max_definitions: self.max_definitions,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
