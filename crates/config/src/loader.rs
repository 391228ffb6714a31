use std::{collections::HashMap, path::PathBuf};

use {secrecy::Secret, tracing::debug};

use crate::{
    defaults::resolve_endpoint,
    error::ConfigError,
    schema::{CredkeepConfig, OutputTargets, RepoRef, SecretNames, StoredCredentials},
};

pub const REFRESH_TOKEN_VAR: &str = "CLAUDE_REFRESH_TOKEN";
pub const ACCESS_TOKEN_VAR: &str = "CLAUDE_ACCESS_TOKEN";
pub const EXPIRES_AT_VAR: &str = "CLAUDE_EXPIRES_AT";
pub const REPOSITORY_VAR: &str = "GITHUB_REPOSITORY";
pub const REPOSITORY_OWNER_VAR: &str = "GITHUB_REPOSITORY_OWNER";
pub const UPDATE_SECRET_VAR: &str = "UPDATE_GITHUB_SECRET";
pub const OUTPUT_FILE_VAR: &str = "GITHUB_OUTPUT";
pub const ENV_FILE_VAR: &str = "GITHUB_ENV";

/// Build the configuration from the process environment.
///
/// This is the only place that reads ambient state; everything else receives
/// a [`CredkeepConfig`].
pub fn load_from_env() -> Result<CredkeepConfig, ConfigError> {
    load_from_vars(std::env::vars())
}

/// Build the configuration from an explicit set of key/value pairs.
///
/// Empty values count as unset: CI runners export missing secrets as `""`.
pub fn load_from_vars<I, K, V>(vars: I) -> Result<CredkeepConfig, ConfigError>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let vars: HashMap<String, String> = vars
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .filter(|(_, v)| !v.trim().is_empty())
        .collect();

    let credentials = StoredCredentials {
        refresh_token: vars.get(REFRESH_TOKEN_VAR).map(|v| Secret::new(v.trim().to_string())),
        access_token: vars.get(ACCESS_TOKEN_VAR).map(|v| Secret::new(v.trim().to_string())),
        expires_at: vars.get(EXPIRES_AT_VAR).map(|v| v.trim().to_string()),
    };

    let repository = repository_from_vars(&vars);
    let update_secret_store = vars
        .get(UPDATE_SECRET_VAR)
        .map(|v| parse_flag(UPDATE_SECRET_VAR, v))
        .transpose()?
        .unwrap_or(false);

    let outputs = OutputTargets {
        output_file: vars.get(OUTPUT_FILE_VAR).map(PathBuf::from),
        env_file: vars.get(ENV_FILE_VAR).map(PathBuf::from),
    };

    let oauth = resolve_endpoint(&vars)?;

    debug!(
        has_refresh_token = credentials.refresh_token.is_some(),
        has_access_token = credentials.access_token.is_some(),
        has_expiry = credentials.expires_at.is_some(),
        repository = ?repository,
        update_secret_store,
        token_url = %oauth.token_url,
        "configuration loaded"
    );

    Ok(CredkeepConfig {
        credentials,
        repository,
        update_secret_store,
        outputs,
        oauth,
        secret_names: SecretNames::default(),
    })
}

/// `GITHUB_REPOSITORY` is normally `owner/repo`; a bare name takes its owner
/// from `GITHUB_REPOSITORY_OWNER`, which also wins when both are present.
fn repository_from_vars(vars: &HashMap<String, String>) -> Option<RepoRef> {
    let raw = vars.get(REPOSITORY_VAR)?.trim();
    let (slug_owner, repo) = match raw.split_once('/') {
        Some((owner, repo)) => (Some(owner), repo),
        None => (None, raw),
    };
    let owner = vars
        .get(REPOSITORY_OWNER_VAR)
        .map(|o| o.trim())
        .or(slug_owner)?;
    if owner.is_empty() || repo.is_empty() {
        return None;
    }
    Some(RepoRef::new(owner, repo))
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            reason: format!("expected true or false, got {other:?}"),
        }),
    }
}
