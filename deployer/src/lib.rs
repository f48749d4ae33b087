//! ECS deployment library
//!
//! Rolls new container images out to an ECS service: resolves the service and
//! task definition, registers a new revision with the images swapped, points
//! the service at it and waits for a task of that revision to run.

pub mod app;
pub mod deploy;
pub mod ecs;
pub mod errors;
pub mod logs;
pub mod models;
pub mod utils;
