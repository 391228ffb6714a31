//! Publishing refreshed credentials: CI output channel, repository secret
//! store, and the propagator that drives both.

pub mod channel;
pub mod propagate;
pub mod store;

pub use {
    channel::{ActionsChannel, OutputChannel, OutputError},
    propagate::{Destinations, FailedSecret, PropagationReport, SecretPropagator},
    store::{GhCliSecretStore, SecretStore, SecretStoreError},
};
