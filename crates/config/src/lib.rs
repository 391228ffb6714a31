//! Configuration for credkeep: the credential state carried between runs,
//! the OAuth endpoint, and where refreshed credentials are published.

pub mod defaults;
pub mod error;
pub mod loader;
pub mod schema;

pub use {
    error::ConfigError,
    loader::{load_from_env, load_from_vars},
    schema::{CredkeepConfig, OAuthEndpoint, OutputTargets, RepoRef, SecretNames, StoredCredentials},
};
