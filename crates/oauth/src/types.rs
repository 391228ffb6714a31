use std::fmt;

use secrecy::{ExposeSecret, Secret};

/// A bearer credential set. Superseded by a fresh value on refresh, never
/// mutated in place.
#[derive(Clone)]
pub struct Credential {
    pub access_token: Secret<String>,
    pub refresh_token: Secret<String>,
    /// Unix seconds, when known.
    pub expires_at: Option<i64>,
}

impl Credential {
    pub fn new(access_token: Secret<String>, refresh_token: Secret<String>) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_at: None,
        }
    }

    #[must_use]
    pub fn with_expiry(self, expires_at: i64) -> Self {
        Self {
            expires_at: Some(expires_at),
            ..self
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl PartialEq for Credential {
    fn eq(&self, other: &Self) -> bool {
        self.access_token.expose_secret() == other.access_token.expose_secret()
            && self.refresh_token.expose_secret() == other.refresh_token.expose_secret()
            && self.expires_at == other.expires_at
    }
}

/// Why the provider (or something in front of it) refused a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    /// An edge proxy answered instead of the token endpoint.
    IntermediaryBlocked,
    /// The provider refused the refresh token itself.
    CredentialRejected,
    /// Any other non-success status.
    ProviderError,
}

impl RejectionReason {
    /// Remediation hint suitable for an operator-facing diagnostic.
    pub fn hint(self) -> &'static str {
        match self {
            Self::IntermediaryBlocked => {
                "request was blocked by a network intermediary before reaching the token endpoint; retry later, from another network, or authenticate another way"
            },
            Self::CredentialRejected => {
                "the refresh token was rejected; re-authenticate to obtain a new refresh token"
            },
            Self::ProviderError => "the token endpoint returned an unexpected error; retry later",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::IntermediaryBlocked => "blocked by network intermediary",
            Self::CredentialRejected => "credential rejected",
            Self::ProviderError => "provider error",
        })
    }
}

/// Result of one refresh attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// `credential.expires_at` is left unset; the caller stamps it from
    /// `expires_in` with its own clock.
    Success {
        credential: Credential,
        expires_in: u64,
        /// The provider issued a new refresh token.
        rotated: bool,
    },
    TransientNetworkFailure {
        detail: String,
    },
    RejectedByProvider {
        status: u16,
        body: String,
        reason: RejectionReason,
    },
    MalformedResponse {
        detail: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_tokens() {
        let credential = Credential::new(
            Secret::new("at-secret".into()),
            Secret::new("rt-secret".into()),
        )
        .with_expiry(42);
        let out = format!("{credential:?}");
        assert!(!out.contains("at-secret"));
        assert!(!out.contains("rt-secret"));
        assert!(out.contains("42"));
    }

    #[test]
    fn with_expiry_supersedes() {
        let base = Credential::new(Secret::new("a".into()), Secret::new("r".into()));
        assert_eq!(base.expires_at, None);
        let stamped = base.clone().with_expiry(100);
        assert_eq!(stamped.expires_at, Some(100));
        assert_ne!(base, stamped);
    }

    #[test]
    fn hints_differ_by_reason() {
        assert!(RejectionReason::IntermediaryBlocked.hint().contains("intermediary"));
        assert!(RejectionReason::CredentialRejected.hint().contains("re-authenticate"));
        assert_ne!(
            RejectionReason::IntermediaryBlocked.hint(),
            RejectionReason::CredentialRejected.hint()
        );
    }
}
