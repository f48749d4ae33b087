//! ECS control plane access

pub mod aws;
pub mod client;
pub mod config;
