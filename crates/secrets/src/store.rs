use std::{ffi::OsString, process::Stdio, time::Duration};

use {
    async_trait::async_trait,
    credkeep_config::RepoRef,
    secrecy::{ExposeSecret, Secret},
    tokio::{io::AsyncWriteExt, process::Command},
    tracing::{debug, warn},
};

/// stderr excerpts kept in errors are cut to this many characters.
const MAX_DETAIL_CHARS: usize = 400;

#[derive(Debug, thiserror::Error)]
pub enum SecretStoreError {
    #[error(
        "not permitted to set secret {name}: {detail} (a token with admin rights on the repository is required)"
    )]
    PermissionDenied { name: String, detail: String },

    #[error("secret store unavailable: {detail}")]
    Unavailable { detail: String },

    #[error("setting secret {name} failed (exit code {exit_code:?}): {detail}")]
    CommandFailed {
        name: String,
        exit_code: Option<i32>,
        detail: String,
    },

    #[error("setting secret {name} timed out after {secs}s")]
    TimedOut { name: String, secs: u64 },
}

/// Durable, repository-scoped key/value store for secrets.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Create or overwrite `name` in `repo`.
    async fn set_secret(
        &self,
        repo: &RepoRef,
        name: &str,
        value: &Secret<String>,
    ) -> Result<(), SecretStoreError>;
}

/// Secret store backed by the GitHub CLI (`gh secret set`).
///
/// The value is written to the child's stdin so it never shows up in the
/// process table.
#[derive(Debug, Clone)]
pub struct GhCliSecretStore {
    program: OsString,
    timeout: Duration,
}

impl Default for GhCliSecretStore {
    fn default() -> Self {
        Self {
            program: "gh".into(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl GhCliSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_program(mut self, program: impl Into<OsString>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl SecretStore for GhCliSecretStore {
    async fn set_secret(
        &self,
        repo: &RepoRef,
        name: &str,
        value: &Secret<String>,
    ) -> Result<(), SecretStoreError> {
        debug!(name, %repo, "setting repository secret");

        let mut cmd = Command::new(&self.program);
        cmd.args(["secret", "set", name, "--repo"])
            .arg(repo.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| SecretStoreError::Unavailable {
            detail: format!("failed to run {}: {e}", self.program.to_string_lossy()),
        })?;

        let stdin = child.stdin.take();
        let exchange = async {
            if let Some(mut stdin) = stdin {
                let written = async {
                    stdin.write_all(value.expose_secret().as_bytes()).await?;
                    stdin.shutdown().await
                }
                .await;
                if let Err(e) = written {
                    return Err(SecretStoreError::CommandFailed {
                        name: name.to_string(),
                        exit_code: None,
                        detail: format!("failed to pass secret value: {e}"),
                    });
                }
            }
            child
                .wait_with_output()
                .await
                .map_err(|e| SecretStoreError::CommandFailed {
                    name: name.to_string(),
                    exit_code: None,
                    detail: e.to_string(),
                })
        };

        // The stdin write is bounded too: a child that never reads would block it.
        let output = match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(name, "gh secret set timed out");
                return Err(SecretStoreError::TimedOut {
                    name: name.to_string(),
                    secs: self.timeout.as_secs(),
                });
            },
        };

        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(classify_failure(name, output.status.code(), &stderr))
    }
}

/// Map a failed `gh secret set` run onto a [`SecretStoreError`].
pub fn classify_failure(name: &str, exit_code: Option<i32>, stderr: &str) -> SecretStoreError {
    let detail: String = stderr.trim().chars().take(MAX_DETAIL_CHARS).collect();
    let lower = detail.to_ascii_lowercase();
    if lower.contains("403") || lower.contains("not accessible") {
        SecretStoreError::PermissionDenied {
            name: name.to_string(),
            detail,
        }
    } else {
        SecretStoreError::CommandFailed {
            name: name.to_string(),
            exit_code,
            detail,
        }
    }
}
