use std::path::PathBuf;

/// Errors raised while assembling or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("CLAUDE_REFRESH_TOKEN is required")]
    MissingRefreshToken,

    #[error(
        "secret store update requested but no repository is configured (set GITHUB_REPOSITORY or pass --repository owner/repo)"
    )]
    MissingRepository,

    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
