/// Config schema types for one credential refresh invocation.
use std::{fmt, path::PathBuf, time::Duration};

use {
    secrecy::Secret,
    serde::{Deserialize, Serialize},
};

/// Root configuration. Built once by the entry point and passed down
/// explicitly; nothing below the CLI reads the process environment.
#[derive(Debug, Clone, Default)]
pub struct CredkeepConfig {
    pub credentials: StoredCredentials,
    pub repository: Option<RepoRef>,
    /// Whether the refreshed credential should be written to the secret store.
    pub update_secret_store: bool,
    pub outputs: OutputTargets,
    pub oauth: OAuthEndpoint,
    pub secret_names: SecretNames,
}

/// Credential state carried over from the previous run.
#[derive(Clone, Default)]
pub struct StoredCredentials {
    pub refresh_token: Option<Secret<String>>,
    pub access_token: Option<Secret<String>>,
    /// Raw expiry as stored: unix seconds or an ISO-8601 timestamp.
    pub expires_at: Option<String>,
}

impl fmt::Debug for StoredCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredCredentials")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Owner/repository pair that scopes secret-store writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    /// Parse `owner/repo`. Returns `None` for anything else.
    pub fn parse(slug: &str) -> Option<Self> {
        let (owner, repo) = slug.trim().split_once('/')?;
        if owner.is_empty() || repo.is_empty() || repo.contains('/') {
            return None;
        }
        Some(Self::new(owner, repo))
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// Append-only files provided by the CI runner.
#[derive(Debug, Clone, Default)]
pub struct OutputTargets {
    /// Step output file (`GITHUB_OUTPUT`). When unset the legacy
    /// `::set-output` console command is used instead.
    pub output_file: Option<PathBuf>,
    /// Environment file for subsequent steps (`GITHUB_ENV`).
    pub env_file: Option<PathBuf>,
}

/// OAuth token endpoint settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthEndpoint {
    pub client_id: String,
    pub token_url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl OAuthEndpoint {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for OAuthEndpoint {
    fn default() -> Self {
        crate::defaults::builtin_endpoint()
    }
}

/// Names used for the secret-store entries and the environment binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretNames {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: String,
}

impl Default for SecretNames {
    fn default() -> Self {
        Self {
            access_token: "CLAUDE_ACCESS_TOKEN".into(),
            refresh_token: "CLAUDE_REFRESH_TOKEN".into(),
            expires_at: "CLAUDE_EXPIRES_AT".into(),
        }
    }
}
