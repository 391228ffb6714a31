//! CI runner output channel: step outputs, environment binding and masking.
//!
//! Follows the GitHub Actions workflow-command protocol. Step outputs and
//! environment bindings are appended as `key=value` lines to the files the
//! runner names; masking is a console command that must precede the first
//! appearance of a value.

use std::{
    fs::OpenOptions,
    io::{self, Write},
    path::{Path, PathBuf},
};

use {credkeep_config::OutputTargets, tracing::debug};

#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("failed to append to {}: {source}", .path.display())]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write workflow command: {0}")]
    Console(#[source] io::Error),

    /// Values spanning lines would break the `key=value` framing.
    #[error("value for {key} contains a line break")]
    MultilineValue { key: String },
}

/// Destination for values consumed by later automation steps.
pub trait OutputChannel: Send {
    /// Ask the runner to redact `value` from all subsequent log output.
    fn mask(&mut self, value: &str) -> Result<(), OutputError>;

    /// Publish a step output.
    fn set_output(&mut self, key: &str, value: &str) -> Result<(), OutputError>;

    /// Bind an environment variable for subsequent steps. Returns `false`
    /// when the runner offers no environment file.
    fn set_env(&mut self, key: &str, value: &str) -> Result<bool, OutputError>;
}

/// GitHub Actions implementation writing workflow commands to `console`.
#[derive(Debug)]
pub struct ActionsChannel<W> {
    targets: OutputTargets,
    console: W,
}

impl ActionsChannel<io::Stdout> {
    pub fn stdout(targets: OutputTargets) -> Self {
        Self::new(targets, io::stdout())
    }
}

impl<W: Write + Send> ActionsChannel<W> {
    pub fn new(targets: OutputTargets, console: W) -> Self {
        Self { targets, console }
    }

    pub fn console(&self) -> &W {
        &self.console
    }

    pub fn into_console(self) -> W {
        self.console
    }

    fn command(&mut self, line: &str) -> Result<(), OutputError> {
        writeln!(self.console, "{line}")
            .and_then(|()| self.console.flush())
            .map_err(OutputError::Console)
    }
}

impl<W: Write + Send> OutputChannel for ActionsChannel<W> {
    fn mask(&mut self, value: &str) -> Result<(), OutputError> {
        if value.is_empty() {
            return Ok(());
        }
        self.command(&format!("::add-mask::{}", escape_data(value)))
    }

    fn set_output(&mut self, key: &str, value: &str) -> Result<(), OutputError> {
        check_single_line(key, value)?;
        match self.targets.output_file.clone() {
            Some(path) => append_line(&path, key, value),
            None => {
                debug!(key, "GITHUB_OUTPUT not set, using legacy set-output command");
                self.command(&format!("::set-output name={key}::{}", escape_data(value)))
            },
        }
    }

    fn set_env(&mut self, key: &str, value: &str) -> Result<bool, OutputError> {
        check_single_line(key, value)?;
        match &self.targets.env_file {
            Some(path) => append_line(path, key, value).map(|()| true),
            None => Ok(false),
        }
    }
}

/// Workflow-command data escaping; the runner decodes these before use.
fn escape_data(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

fn check_single_line(key: &str, value: &str) -> Result<(), OutputError> {
    if value.contains(['\n', '\r']) {
        return Err(OutputError::MultilineValue {
            key: key.to_string(),
        });
    }
    Ok(())
}

fn append_line(path: &Path, key: &str, value: &str) -> Result<(), OutputError> {
    let to_err = |source| OutputError::File {
        path: path.to_path_buf(),
        source,
    };
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(to_err)?;
    writeln!(file, "{key}={value}").map_err(to_err)
}
