//! One invocation of the credential lifecycle:
//! CHECKING → SHORT_CIRCUIT_VALID, or REFRESHING → PROPAGATED / FAILED.

use std::sync::Arc;

use {
    credkeep_config::{ConfigError, CredkeepConfig},
    credkeep_oauth::{
        Clock, ExpiryDecision, ExpiryEvaluator, RefreshOutcome, TokenRefresher, parse_expiry,
    },
    credkeep_secrets::{
        Destinations, OutputChannel, PropagationReport, SecretPropagator, SecretStore,
    },
    tracing::{info, warn},
};

use crate::error::LifecycleError;

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Refresh even when the stored access token is still valid.
    pub force_refresh: bool,
}

#[derive(Debug)]
pub enum RunOutcome {
    /// The stored access token is still valid; nothing was refreshed.
    ShortCircuitValid { expires_at: i64 },
    Propagated {
        expires_at: i64,
        rotated: bool,
        report: PropagationReport,
    },
}

/// Offline view of the stored credential state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialStatus {
    pub has_refresh_token: bool,
    pub has_access_token: bool,
    pub expires_at: Option<i64>,
    /// Stored expiry that could not be parsed.
    pub unparsable_expiry: Option<String>,
    pub decision: ExpiryDecision,
    /// Seconds until literal expiry.
    pub remaining: Option<i64>,
}

pub struct LifecycleOrchestrator {
    refresher: Arc<dyn TokenRefresher>,
    store: Arc<dyn SecretStore>,
    evaluator: ExpiryEvaluator,
    clock: Arc<dyn Clock>,
}

impl LifecycleOrchestrator {
    pub fn new(
        refresher: Arc<dyn TokenRefresher>,
        store: Arc<dyn SecretStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            refresher,
            store,
            evaluator: ExpiryEvaluator::new(clock.clone()),
            clock,
        }
    }

    /// Run one invocation against `config`, publishing through `channel`.
    pub async fn run(
        &self,
        config: &CredkeepConfig,
        options: RunOptions,
        channel: &mut dyn OutputChannel,
    ) -> Result<RunOutcome, LifecycleError> {
        // CHECKING
        let refresh_token = config
            .credentials
            .refresh_token
            .as_ref()
            .ok_or(ConfigError::MissingRefreshToken)?;
        let store_target = if config.update_secret_store {
            Some(
                config
                    .repository
                    .clone()
                    .ok_or(ConfigError::MissingRepository)?,
            )
        } else {
            None
        };

        let propagator = SecretPropagator::new(self.store.clone(), config.secret_names.clone());
        let raw_expiry = config.credentials.expires_at.as_deref();
        let decision = self.evaluator.evaluate(raw_expiry);

        if !options.force_refresh
            && !decision.needs_refresh()
            && let (Some(access_token), Some(expires_at)) = (
                &config.credentials.access_token,
                raw_expiry.and_then(parse_expiry),
            )
        {
            info!(
                expires_at,
                remaining_secs = self.evaluator.remaining(expires_at),
                "access token still valid, skipping refresh"
            );
            propagator.publish_current(
                access_token,
                expires_at,
                &Destinations::outputs(),
                channel,
            )?;
            return Ok(RunOutcome::ShortCircuitValid { expires_at });
        }

        info!(
            ?decision,
            force = options.force_refresh,
            has_access_token = config.credentials.access_token.is_some(),
            "refresh required"
        );

        // REFRESHING
        let (credential, expires_in, rotated) = match self.refresher.refresh(refresh_token).await {
            RefreshOutcome::Success {
                credential,
                expires_in,
                rotated,
            } => (credential, expires_in, rotated),
            RefreshOutcome::TransientNetworkFailure { detail } => {
                return Err(LifecycleError::TransientNetwork { detail });
            },
            RefreshOutcome::RejectedByProvider {
                status,
                body,
                reason,
            } => {
                return Err(LifecycleError::Rejected {
                    status,
                    reason,
                    body,
                });
            },
            RefreshOutcome::MalformedResponse { detail } => {
                return Err(LifecycleError::MalformedResponse { detail });
            },
        };

        let expires_at = self
            .clock
            .now()
            .saturating_add(i64::try_from(expires_in).unwrap_or(i64::MAX));
        let credential = credential.with_expiry(expires_at);

        let destinations = match store_target {
            Some(repo) => Destinations::outputs().with_secret_store(repo),
            None => Destinations::outputs(),
        };
        let report = propagator
            .propagate(&credential, rotated, &destinations, channel)
            .await?;

        if !report.is_complete() {
            warn!(
                written = report.written.len(),
                failed = report.failed.len(),
                "secret store left partially updated"
            );
            return Err(LifecycleError::PartialPropagation {
                written: report.written,
                failed: report.failed,
            });
        }

        info!(expires_at, rotated, "credential propagated");
        Ok(RunOutcome::Propagated {
            expires_at,
            rotated,
            report,
        })
    }

    /// Describe the stored credential state without touching the network.
    pub fn status(&self, config: &CredkeepConfig) -> CredentialStatus {
        let raw = config.credentials.expires_at.as_deref();
        let expires_at = raw.and_then(parse_expiry);
        CredentialStatus {
            has_refresh_token: config.credentials.refresh_token.is_some(),
            has_access_token: config.credentials.access_token.is_some(),
            expires_at,
            unparsable_expiry: match (raw, expires_at) {
                (Some(raw), None) => Some(raw.to_string()),
                _ => None,
            },
            decision: self.evaluator.evaluate(raw),
            remaining: expires_at.map(|at| self.evaluator.remaining(at)),
        }
    }
}
