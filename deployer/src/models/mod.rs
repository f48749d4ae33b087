//! Data models

pub mod deployment;
pub mod image;
pub mod service;
pub mod task_definition;
