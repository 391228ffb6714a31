//! Publishes a credential to the output channel and the secret store.

use std::sync::Arc;

use {
    credkeep_config::{RepoRef, SecretNames},
    credkeep_oauth::Credential,
    secrecy::{ExposeSecret, Secret},
    tracing::{info, warn},
};

use crate::{
    channel::{OutputChannel, OutputError},
    store::{SecretStore, SecretStoreError},
};

pub const OUTPUT_ACCESS_TOKEN: &str = "access_token";
pub const OUTPUT_REFRESH_TOKEN: &str = "refresh_token";
pub const OUTPUT_EXPIRES_AT: &str = "expires_at";

/// Where a credential should go. Each destination is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Destinations {
    pub structured_output: bool,
    pub environment_binding: bool,
    pub secret_store: Option<RepoRef>,
}

impl Destinations {
    /// Step outputs and environment binding, no secret store.
    pub fn outputs() -> Self {
        Self {
            structured_output: true,
            environment_binding: true,
            secret_store: None,
        }
    }

    #[must_use]
    pub fn with_secret_store(mut self, repo: RepoRef) -> Self {
        self.secret_store = Some(repo);
        self
    }
}

#[derive(Debug)]
pub struct FailedSecret {
    pub name: String,
    pub error: SecretStoreError,
}

/// What a propagation run managed to write.
#[derive(Debug, Default)]
pub struct PropagationReport {
    /// Secret-store entries written, in write order.
    pub written: Vec<String>,
    pub failed: Vec<FailedSecret>,
    /// Whether the runner accepted an environment binding.
    pub env_bound: bool,
}

impl PropagationReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct SecretPropagator {
    store: Arc<dyn SecretStore>,
    names: SecretNames,
}

impl SecretPropagator {
    pub fn new(store: Arc<dyn SecretStore>, names: SecretNames) -> Self {
        Self { store, names }
    }

    /// Publish a freshly refreshed credential.
    ///
    /// Output-channel failures abort with an error. Secret-store failures do
    /// not: every entry is attempted and the outcome is recorded in the
    /// report, with earlier writes left in place.
    pub async fn propagate(
        &self,
        credential: &Credential,
        rotated: bool,
        destinations: &Destinations,
        channel: &mut dyn OutputChannel,
    ) -> Result<PropagationReport, OutputError> {
        let access_token = credential.access_token.expose_secret();
        let refresh_token = credential.refresh_token.expose_secret();
        let expires_at = credential.expires_at.map(|at| at.to_string());

        // Masks go out before any value is written anywhere.
        channel.mask(access_token)?;
        channel.mask(refresh_token)?;

        let mut report = PropagationReport::default();

        if destinations.structured_output {
            channel.set_output(OUTPUT_ACCESS_TOKEN, access_token)?;
            channel.set_output(OUTPUT_REFRESH_TOKEN, refresh_token)?;
            if let Some(expires_at) = &expires_at {
                channel.set_output(OUTPUT_EXPIRES_AT, expires_at)?;
            }
        }

        if destinations.environment_binding {
            report.env_bound = channel.set_env(&self.names.access_token, access_token)?;
            if report.env_bound {
                channel.set_env(&self.names.refresh_token, refresh_token)?;
                if let Some(expires_at) = &expires_at {
                    channel.set_env(&self.names.expires_at, expires_at)?;
                }
            } else {
                warn!("GITHUB_ENV not set, skipping environment binding");
            }
        }

        if let Some(repo) = &destinations.secret_store {
            let mut entries = vec![(&self.names.access_token, credential.access_token.clone())];
            if let Some(expires_at) = expires_at {
                entries.push((&self.names.expires_at, Secret::new(expires_at)));
            }
            if rotated {
                entries.push((&self.names.refresh_token, credential.refresh_token.clone()));
            }

            for (name, value) in entries {
                match self.store.set_secret(repo, name, &value).await {
                    Ok(()) => {
                        info!(name = %name, %repo, "updated repository secret");
                        report.written.push(name.clone());
                    },
                    Err(error) => {
                        warn!(name = %name, %repo, %error, "failed to update repository secret");
                        report.failed.push(FailedSecret {
                            name: name.clone(),
                            error,
                        });
                    },
                }
            }
        }

        Ok(report)
    }

    /// Republish a still-valid access token and its expiry. Never touches
    /// the secret store.
    pub fn publish_current(
        &self,
        access_token: &Secret<String>,
        expires_at: i64,
        destinations: &Destinations,
        channel: &mut dyn OutputChannel,
    ) -> Result<(), OutputError> {
        let access_token = access_token.expose_secret();
        let expires_at = expires_at.to_string();

        channel.mask(access_token)?;

        if destinations.structured_output {
            channel.set_output(OUTPUT_ACCESS_TOKEN, access_token)?;
            channel.set_output(OUTPUT_EXPIRES_AT, &expires_at)?;
        }
        if destinations.environment_binding
            && channel.set_env(&self.names.access_token, access_token)?
        {
            channel.set_env(&self.names.expires_at, &expires_at)?;
        }
        Ok(())
    }
}
