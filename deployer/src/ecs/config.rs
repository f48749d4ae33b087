//! Client configuration

use secrecy::SecretString;

/// How to reach and authenticate against the ECS control plane.
///
/// Handed once to [`crate::ecs::aws::AwsEcsClient`]; the deployment core
/// never sees credentials. Unset fields fall back to the default AWS
/// provider chain (environment, shared profile, instance role).
#[derive(Debug, Default)]
pub struct ClientConfig {
    /// AWS region, e.g. `us-east-1`
    pub region: Option<String>,

    /// Named profile from the shared config files
    pub profile: Option<String>,

    /// Static credentials; used only when both halves are present
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<SecretString>,

    /// Custom endpoint, e.g. a local ECS emulator
    pub endpoint_url: Option<String>,
}

impl ClientConfig {
    /// Whether a complete static key pair was supplied
    pub fn has_static_credentials(&self) -> bool {
        self.access_key_id.is_some() && self.secret_access_key.is_some()
    }
}
