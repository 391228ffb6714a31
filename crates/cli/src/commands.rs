use std::sync::Arc;

use {
    anyhow::{Result, anyhow},
    clap::Args,
    credkeep_config::{CredkeepConfig, RepoRef},
    credkeep_lifecycle::{LifecycleOrchestrator, RunOptions, RunOutcome},
    credkeep_oauth::{ExpiryDecision, RefreshClient, SystemClock},
    credkeep_secrets::{ActionsChannel, GhCliSecretStore},
};

#[derive(Args, Debug)]
pub struct RefreshArgs {
    /// Write the refreshed credential to the repository secret store
    /// (same as UPDATE_GITHUB_SECRET=true).
    #[arg(long)]
    update_secrets: bool,

    /// Repository whose secrets are updated, as owner/repo.
    #[arg(long, value_parser = parse_repo)]
    repository: Option<RepoRef>,

    /// Refresh even if the stored access token is still valid.
    #[arg(long)]
    force: bool,
}

fn parse_repo(raw: &str) -> std::result::Result<RepoRef, String> {
    RepoRef::parse(raw).ok_or_else(|| format!("expected owner/repo, got {raw:?}"))
}

fn orchestrator(config: &CredkeepConfig) -> LifecycleOrchestrator {
    LifecycleOrchestrator::new(
        Arc::new(RefreshClient::new(config.oauth.clone())),
        Arc::new(GhCliSecretStore::new()),
        Arc::new(SystemClock),
    )
}

pub async fn refresh(mut config: CredkeepConfig, args: RefreshArgs) -> Result<()> {
    if args.update_secrets {
        config.update_secret_store = true;
    }
    if let Some(repo) = args.repository {
        config.repository = Some(repo);
    }

    let mut channel = ActionsChannel::stdout(config.outputs.clone());
    let options = RunOptions {
        force_refresh: args.force,
    };

    let outcome = orchestrator(&config)
        .run(&config, options, &mut channel)
        .await?;

    match outcome {
        RunOutcome::ShortCircuitValid { expires_at } => {
            println!("Access token still valid until {expires_at}; no refresh needed.");
        },
        RunOutcome::Propagated {
            expires_at,
            rotated,
            report,
        } => {
            println!("Token refreshed; expires at {expires_at}.");
            if rotated {
                println!("Provider issued a new refresh token.");
            }
            for name in &report.written {
                println!("Updated secret {name}");
            }
        },
    }
    Ok(())
}

pub fn status(config: &CredkeepConfig) -> Result<()> {
    let status = orchestrator(config).status(config);
    let present = |set: bool| if set { "set" } else { "not set" };

    println!("Refresh token: {}", present(status.has_refresh_token));
    println!("Access token:  {}", present(status.has_access_token));

    match (status.expires_at, status.remaining, &status.unparsable_expiry) {
        (Some(at), Some(remaining), _) if remaining > 0 => {
            let hours = remaining / 3600;
            let mins = (remaining % 3600) / 60;
            println!("Expires at:    {at} ({hours}h {mins}m remaining)");
        },
        (Some(at), ..) => println!("Expires at:    {at} (expired)"),
        (None, _, Some(raw)) => println!("Expires at:    unparsable ({raw:?})"),
        (None, ..) => println!("Expires at:    unknown"),
    }

    let verdict = match status.decision {
        ExpiryDecision::Valid => "valid",
        ExpiryDecision::RefreshRequired => "refresh required",
        ExpiryDecision::UnknownTreatAsExpired => "refresh required (expiry unknown)",
    };
    println!("Decision:      {verdict}");

    if !status.has_refresh_token {
        return Err(anyhow!("CLAUDE_REFRESH_TOKEN is required"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_flag_parses_slug() {
        assert_eq!(
            parse_repo("octo/widgets").unwrap(),
            RepoRef::new("octo", "widgets")
        );
        assert!(parse_repo("widgets").unwrap_err().contains("owner/repo"));
    }

    #[test]
    fn status_fails_without_refresh_token() {
        let config = credkeep_config::load_from_vars([("CLAUDE_EXPIRES_AT", "1")]).unwrap();
        assert!(status(&config).is_err());

        let config = credkeep_config::load_from_vars([("CLAUDE_REFRESH_TOKEN", "rt1")]).unwrap();
        assert!(status(&config).is_ok());
    }
}
