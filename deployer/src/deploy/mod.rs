//! Deployment module

pub mod fsm;
pub mod mutator;
pub mod orchestrator;
pub mod poller;
pub mod report;
pub mod resolver;
pub mod retention;
