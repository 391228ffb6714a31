use std::{collections::HashMap, path::Path};

use crate::{error::ConfigError, schema::OAuthEndpoint};

/// Public client identifier of the token endpoint's CLI application.
pub const DEFAULT_CLIENT_ID: &str = "9d1c250a-e61b-44d9-88ed-5944d1962f5e";

pub const DEFAULT_TOKEN_URL: &str = "https://console.anthropic.com/v1/oauth/token";

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const ENV_PREFIX: &str = "CREDKEEP_OAUTH_";

/// Built-in endpoint used when nothing overrides it.
pub fn builtin_endpoint() -> OAuthEndpoint {
    OAuthEndpoint {
        client_id: DEFAULT_CLIENT_ID.into(),
        token_url: DEFAULT_TOKEN_URL.into(),
        timeout_secs: DEFAULT_TIMEOUT_SECS,
        user_agent: concat!("credkeep/", env!("CARGO_PKG_VERSION")).into(),
    }
}

/// Resolve the OAuth endpoint.
///
/// Priority:
/// 1. Per-field variables (`CREDKEEP_OAUTH_CLIENT_ID`, `CREDKEEP_OAUTH_TOKEN_URL`,
///    `CREDKEEP_OAUTH_TIMEOUT_SECS`, `CREDKEEP_OAUTH_USER_AGENT`)
/// 2. JSON file named by `CREDKEEP_OAUTH_CONFIG`
/// 3. Built-in defaults
pub fn resolve_endpoint(vars: &HashMap<String, String>) -> Result<OAuthEndpoint, ConfigError> {
    let mut endpoint = match vars.get("CREDKEEP_OAUTH_CONFIG") {
        Some(path) => load_endpoint_file(Path::new(path))?,
        None => builtin_endpoint(),
    };

    if let Some(v) = vars.get(&format!("{ENV_PREFIX}CLIENT_ID")) {
        endpoint.client_id = v.clone();
    }
    if let Some(v) = vars.get(&format!("{ENV_PREFIX}TOKEN_URL")) {
        endpoint.token_url = v.clone();
    }
    if let Some(v) = vars.get(&format!("{ENV_PREFIX}TIMEOUT_SECS")) {
        endpoint.timeout_secs =
            v.trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidValue {
                    key: format!("{ENV_PREFIX}TIMEOUT_SECS"),
                    reason: format!("expected a positive number of seconds, got {v:?}"),
                })?;
    }
    if let Some(v) = vars.get(&format!("{ENV_PREFIX}USER_AGENT")) {
        endpoint.user_agent = v.clone();
    }

    validate_endpoint(&endpoint, vars)?;
    Ok(endpoint)
}

/// Check the merged endpoint, blaming whichever source supplied each field.
fn validate_endpoint(
    endpoint: &OAuthEndpoint,
    vars: &HashMap<String, String>,
) -> Result<(), ConfigError> {
    let source_of = |field: &str| {
        let var = format!("{ENV_PREFIX}{field}");
        if vars.contains_key(&var) {
            var
        } else {
            format!("{ENV_PREFIX}CONFIG ({})", field.to_ascii_lowercase())
        }
    };

    url::Url::parse(&endpoint.token_url).map_err(|e| ConfigError::InvalidValue {
        key: source_of("TOKEN_URL"),
        reason: format!("{e}: {:?}", endpoint.token_url),
    })?;
    if endpoint.timeout_secs == 0 {
        return Err(ConfigError::InvalidValue {
            key: source_of("TIMEOUT_SECS"),
            reason: "expected a positive number of seconds, got 0".into(),
        });
    }
    Ok(())
}

fn load_endpoint_file(path: &Path) -> Result<OAuthEndpoint, ConfigError> {
    let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn builtin_defaults_apply_without_overrides() {
        let endpoint = resolve_endpoint(&HashMap::new()).unwrap();
        assert_eq!(endpoint.client_id, DEFAULT_CLIENT_ID);
        assert_eq!(endpoint.token_url, DEFAULT_TOKEN_URL);
        assert_eq!(endpoint.timeout_secs, 30);
        assert!(endpoint.user_agent.starts_with("credkeep/"));
    }

    #[test]
    fn env_overrides_individual_fields() {
        let endpoint = resolve_endpoint(&vars(&[
            ("CREDKEEP_OAUTH_TOKEN_URL", "http://127.0.0.1:9999/token"),
            ("CREDKEEP_OAUTH_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();
        assert_eq!(endpoint.token_url, "http://127.0.0.1:9999/token");
        assert_eq!(endpoint.timeout_secs, 5);
        assert_eq!(endpoint.client_id, DEFAULT_CLIENT_ID);
    }

    #[test]
    fn rejects_bad_timeout_and_url() {
        let err = resolve_endpoint(&vars(&[("CREDKEEP_OAUTH_TIMEOUT_SECS", "soon")])).unwrap_err();
        assert!(err.to_string().contains("CREDKEEP_OAUTH_TIMEOUT_SECS"));

        let err = resolve_endpoint(&vars(&[("CREDKEEP_OAUTH_TIMEOUT_SECS", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        let err = resolve_endpoint(&vars(&[("CREDKEEP_OAUTH_TOKEN_URL", "not a url")])).unwrap_err();
        assert!(err.to_string().contains("CREDKEEP_OAUTH_TOKEN_URL"));
    }

    #[test]
    fn file_config_is_overridden_by_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oauth.json");
        std::fs::write(
            &path,
            r#"{"client_id": "file-client", "token_url": "https://example.test/token"}"#,
        )
        .unwrap();

        let endpoint = resolve_endpoint(&vars(&[
            ("CREDKEEP_OAUTH_CONFIG", path.to_str().unwrap()),
            ("CREDKEEP_OAUTH_CLIENT_ID", "env-client"),
        ]))
        .unwrap();
        assert_eq!(endpoint.client_id, "env-client");
        assert_eq!(endpoint.token_url, "https://example.test/token");
        // Fields missing from the file keep their defaults.
        assert_eq!(endpoint.timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn file_values_are_validated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oauth.json");

        for body in [r#"{"timeout_secs": 0}"#, r#"{"token_url": "not a url"}"#] {
            std::fs::write(&path, body).unwrap();
            let err = resolve_endpoint(&vars(&[("CREDKEEP_OAUTH_CONFIG", path.to_str().unwrap())]))
                .unwrap_err();
            let ConfigError::InvalidValue { key, .. } = err else {
                panic!("expected InvalidValue for {body}, got {err:?}");
            };
            assert!(key.starts_with("CREDKEEP_OAUTH_CONFIG"), "{key}");
        }
    }

    #[test]
    fn env_override_can_repair_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oauth.json");
        std::fs::write(&path, r#"{"timeout_secs": 0}"#).unwrap();

        let endpoint = resolve_endpoint(&vars(&[
            ("CREDKEEP_OAUTH_CONFIG", path.to_str().unwrap()),
            ("CREDKEEP_OAUTH_TIMEOUT_SECS", "10"),
        ]))
        .unwrap();
        assert_eq!(endpoint.timeout_secs, 10);
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = resolve_endpoint(&vars(&[("CREDKEEP_OAUTH_CONFIG", "/nonexistent/oauth.json")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
