//! OAuth `refresh_token` grant against the provider's token endpoint.

use {
    async_trait::async_trait,
    credkeep_config::OAuthEndpoint,
    reqwest::{
        StatusCode,
        header::{HeaderMap, USER_AGENT},
    },
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
    tracing::{debug, info, warn},
};

use crate::types::{Credential, RefreshOutcome, RejectionReason};

/// Lifetime assumed when the provider omits `expires_in` (8 hours).
pub const DEFAULT_EXPIRES_IN_SECS: u64 = 28_800;

/// Provider bodies quoted in diagnostics are cut to this many characters.
const MAX_BODY_CHARS: usize = 512;

/// Markers of an edge proxy challenge page, matched case-insensitively.
const INTERMEDIARY_BODY_SIGNATURES: &[&str] = &[
    "cloudflare",
    "cf-ray",
    "cf-mitigated",
    "attention required!",
    "just a moment...",
];

/// Performs one refresh exchange. Implementations never retry.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &Secret<String>) -> RefreshOutcome;
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    grant_type: &'static str,
    refresh_token: &'a str,
    client_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// HTTP implementation of [`TokenRefresher`].
#[derive(Debug, Clone)]
pub struct RefreshClient {
    client: reqwest::Client,
    endpoint: OAuthEndpoint,
}

impl RefreshClient {
    pub fn new(endpoint: OAuthEndpoint) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint)
    }

    pub fn with_client(client: reqwest::Client, endpoint: OAuthEndpoint) -> Self {
        Self { client, endpoint }
    }
}

#[async_trait]
impl TokenRefresher for RefreshClient {
    async fn refresh(&self, refresh_token: &Secret<String>) -> RefreshOutcome {
        let req = RefreshRequest {
            grant_type: "refresh_token",
            refresh_token: refresh_token.expose_secret(),
            client_id: &self.endpoint.client_id,
        };

        info!(token_url = %self.endpoint.token_url, "refreshing access token");

        let resp = match self
            .client
            .post(&self.endpoint.token_url)
            .header(USER_AGENT, &self.endpoint.user_agent)
            .timeout(self.endpoint.timeout())
            .json(&req)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                warn!(error = %describe_transport_error(&e), "token endpoint unreachable");
                return RefreshOutcome::TransientNetworkFailure {
                    detail: describe_transport_error(&e),
                };
            },
        };

        let status = resp.status();
        let headers = resp.headers().clone();
        let body = match resp.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!(%status, error = %describe_transport_error(&e), "failed to read token response");
                return RefreshOutcome::TransientNetworkFailure {
                    detail: describe_transport_error(&e),
                };
            },
        };
        debug!(%status, body_len = body.len(), "token endpoint responded");

        if status.is_success() {
            parse_success(&body, refresh_token)
        } else {
            let reason = classify_rejection(status, &headers, &body);
            warn!(status = status.as_u16(), %reason, "token refresh rejected");
            RefreshOutcome::RejectedByProvider {
                status: status.as_u16(),
                body: sanitize_body(&body, refresh_token),
                reason,
            }
        }
    }
}

fn parse_success(body: &str, previous: &Secret<String>) -> RefreshOutcome {
    let parsed: TokenResponse = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(e) => {
            return RefreshOutcome::MalformedResponse {
                detail: format!("token response is not valid JSON: {e}"),
            };
        },
    };

    let Some(access_token) = parsed.access_token.filter(|t| !t.is_empty()) else {
        return RefreshOutcome::MalformedResponse {
            detail: "token response has no access_token".into(),
        };
    };

    // Rotation is optional for the provider; keep the old token otherwise.
    let (refresh_token, rotated) = match parsed.refresh_token.filter(|t| !t.is_empty()) {
        Some(new) => {
            let rotated = new != *previous.expose_secret();
            (Secret::new(new), rotated)
        },
        None => (previous.clone(), false),
    };
    let expires_in = parsed.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);

    info!(
        expires_in,
        expires_in_hours = expires_in as f64 / 3600.0,
        rotated,
        "access token refreshed"
    );

    RefreshOutcome::Success {
        credential: Credential::new(Secret::new(access_token), refresh_token),
        expires_in,
        rotated,
    }
}

/// Split non-success statuses into the causes an operator can act on.
pub fn classify_rejection(status: StatusCode, headers: &HeaderMap, body: &str) -> RejectionReason {
    match status {
        StatusCode::FORBIDDEN if is_intermediary_block(headers, body) => {
            RejectionReason::IntermediaryBlocked
        },
        StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            RejectionReason::CredentialRejected
        },
        _ => RejectionReason::ProviderError,
    }
}

fn is_intermediary_block(headers: &HeaderMap, body: &str) -> bool {
    if headers.contains_key("cf-mitigated") {
        return true;
    }
    let body = body.to_ascii_lowercase();
    INTERMEDIARY_BODY_SIGNATURES
        .iter()
        .any(|sig| body.contains(sig))
}

/// Truncate a provider body and scrub the submitted refresh token from it.
fn sanitize_body(body: &str, refresh_token: &Secret<String>) -> String {
    let secret = refresh_token.expose_secret();
    let scrubbed = if secret.is_empty() {
        body.to_string()
    } else {
        body.replace(secret.as_str(), "[REDACTED]")
    };
    let mut out: String = scrubbed.chars().take(MAX_BODY_CHARS).collect();
    if scrubbed.chars().count() > MAX_BODY_CHARS {
        out.push_str("... [truncated]");
    }
    out
}

fn describe_transport_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("request timed out: {e}")
    } else if e.is_connect() {
        format!("connection failed: {e}")
    } else {
        format!("request failed: {e}")
    }
}
