//! End-to-end runs against a mock token endpoint.

use std::{path::Path, sync::Arc};

use {
    credkeep_config::load_from_vars,
    credkeep_lifecycle::{LifecycleError, LifecycleOrchestrator, RunOptions, RunOutcome},
    credkeep_oauth::{ManualClock, RefreshClient, RejectionReason},
    credkeep_secrets::{ActionsChannel, GhCliSecretStore},
    serde_json::json,
    wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_json, method, path},
    },
};

const NOW: i64 = 1_700_000_000;

fn vars(server: &MockServer, dir: &Path, extra: &[(&str, &str)]) -> Vec<(String, String)> {
    let mut vars = vec![
        (
            "CREDKEEP_OAUTH_TOKEN_URL".to_string(),
            format!("{}/v1/oauth/token", server.uri()),
        ),
        (
            "GITHUB_OUTPUT".to_string(),
            dir.join("output").display().to_string(),
        ),
        (
            "GITHUB_ENV".to_string(),
            dir.join("env").display().to_string(),
        ),
    ];
    vars.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));
    vars
}

fn orchestrator(endpoint: credkeep_config::OAuthEndpoint) -> LifecycleOrchestrator {
    LifecycleOrchestrator::new(
        Arc::new(RefreshClient::new(endpoint)),
        Arc::new(GhCliSecretStore::new().with_program("/nonexistent/gh")),
        Arc::new(ManualClock::new(NOW)),
    )
}

#[tokio::test]
async fn refresh_without_rotation_keeps_refresh_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/oauth/token"))
        .and(body_json(json!({
            "grant_type": "refresh_token",
            "refresh_token": "rt1",
            "client_id": "9d1c250a-e61b-44d9-88ed-5944d1962f5e",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "at1",
            "expires_in": 3600,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = load_from_vars(vars(&server, dir.path(), &[("CLAUDE_REFRESH_TOKEN", "rt1")])).unwrap();
    let mut channel = ActionsChannel::new(config.outputs.clone(), Vec::new());

    let outcome = orchestrator(config.oauth.clone())
        .run(&config, RunOptions::default(), &mut channel)
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        RunOutcome::Propagated { expires_at, rotated: false, .. } if expires_at == NOW + 3600
    ));
    let output = std::fs::read_to_string(dir.path().join("output")).unwrap();
    assert_eq!(
        output,
        format!("access_token=at1\nrefresh_token=rt1\nexpires_at={}\n", NOW + 3600)
    );
    let env = std::fs::read_to_string(dir.path().join("env")).unwrap();
    assert!(env.contains("CLAUDE_ACCESS_TOKEN=at1\n"));
    let console = String::from_utf8(channel.into_console()).unwrap();
    assert_eq!(console, "::add-mask::at1\n::add-mask::rt1\n");
}

#[tokio::test]
async fn intermediary_block_fails_with_distinct_reason() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(403)
                .set_body_string("<title>Just a moment...</title> cloudflare"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = load_from_vars(vars(&server, dir.path(), &[("CLAUDE_REFRESH_TOKEN", "rt1")])).unwrap();
    let mut channel = ActionsChannel::new(config.outputs.clone(), Vec::new());

    let err = orchestrator(config.oauth.clone())
        .run(&config, RunOptions::default(), &mut channel)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        LifecycleError::Rejected {
            status: 403,
            reason: RejectionReason::IntermediaryBlocked,
            ..
        }
    ));
    assert!(!dir.path().join("output").exists());
}

#[tokio::test]
async fn unavailable_secret_store_is_partial_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "at1",
            "refresh_token": "rt2",
            "expires_in": 3600,
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = load_from_vars(vars(&server, dir.path(), &[
        ("CLAUDE_REFRESH_TOKEN", "rt1"),
        ("UPDATE_GITHUB_SECRET", "true"),
        ("GITHUB_REPOSITORY", "octo/widgets"),
    ]))
    .unwrap();
    let mut channel = ActionsChannel::new(config.outputs.clone(), Vec::new());

    let err = orchestrator(config.oauth.clone())
        .run(&config, RunOptions::default(), &mut channel)
        .await
        .unwrap_err();

    let LifecycleError::PartialPropagation { written, failed } = err else {
        panic!("expected partial propagation, got {err:?}");
    };
    assert!(written.is_empty());
    assert_eq!(failed.len(), 3);
    // The rotated token is not lost: it reached the step outputs.
    let output = std::fs::read_to_string(dir.path().join("output")).unwrap();
    assert!(output.contains("refresh_token=rt2\n"));
}
