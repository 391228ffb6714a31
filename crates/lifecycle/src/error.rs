use {
    credkeep_config::ConfigError,
    credkeep_oauth::RejectionReason,
    credkeep_secrets::{FailedSecret, OutputError},
};

/// Terminal failure of one invocation.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("invalid configuration")]
    Configuration(#[from] ConfigError),

    #[error("token endpoint unreachable: {detail}")]
    TransientNetwork { detail: String },

    #[error("token refresh rejected with HTTP {status} ({reason}): {body}\nhint: {}", .reason.hint())]
    Rejected {
        status: u16,
        reason: RejectionReason,
        body: String,
    },

    #[error("token endpoint violated the protocol: {detail}")]
    MalformedResponse { detail: String },

    /// The refresh succeeded and outputs were published, but the secret store
    /// is now inconsistent.
    #[error("{}", describe_partial(.written, .failed))]
    PartialPropagation {
        written: Vec<String>,
        failed: Vec<FailedSecret>,
    },

    #[error("failed to publish outputs")]
    Output(#[from] OutputError),
}

fn describe_partial(written: &[String], failed: &[FailedSecret]) -> String {
    let written = if written.is_empty() {
        "none".to_string()
    } else {
        written.join(", ")
    };
    let failures = failed
        .iter()
        .map(|f| format!("  {}: {}", f.name, f.error))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "token refreshed and published to outputs, but the secret store was only partially updated (written: {written})\n{failures}"
    )
}
