//! Drives one credential refresh invocation end to end.

pub mod error;
pub mod orchestrator;

pub use {
    error::LifecycleError,
    orchestrator::{CredentialStatus, LifecycleOrchestrator, RunOptions, RunOutcome},
};
