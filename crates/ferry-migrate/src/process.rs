//! External process invocation
//!
//! Transfers, bootstrap scripts and bulk inserts all shell out to client
//! tools. Children are spawned with `kill_on_drop`, so dropping the future
//! returned by [`ExternalCommand::run_until`] (on timeout or cancellation)
//! also terminates the process.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

/// Longest stderr excerpt kept in an error message.
const MAX_STDERR_CHARS: usize = 2_000;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("'{program}' timed out after {timeout:?}")]
    TimedOut { program: String, timeout: Duration },

    #[error("'{program}' was cancelled")]
    Cancelled { program: String },
}

/// A program plus arguments, environment and optional stdin file.
///
/// Secrets go through `env`, never through `args`, so [`ExternalCommand`]'s
/// `Display` output is safe to log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCommand {
    program: String,
    args: Vec<String>,
    envs: Vec<(String, String)>,
    stdin_file: Option<PathBuf>,
}

impl ExternalCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            stdin_file: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn stdin_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdin_file = Some(path.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn get_env(&self, key: &str) -> Option<&str> {
        self.envs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Run to completion with no deadline.
    pub async fn run(&self) -> Result<(), CommandError> {
        self.run_until(&CancellationToken::new(), None).await
    }

    /// Run until the process exits, `timeout` elapses, or `cancel` fires.
    #[instrument(skip_all, fields(program = %self.program))]
    pub async fn run_until(
        &self,
        cancel: &CancellationToken,
        timeout: Option<Duration>,
    ) -> Result<(), CommandError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .envs(self.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        match &self.stdin_file {
            Some(path) => {
                let file = std::fs::File::open(path).map_err(|source| CommandError::Spawn {
                    program: self.program.clone(),
                    source,
                })?;
                command.stdin(Stdio::from(file));
            },
            None => {
                command.stdin(Stdio::null());
            },
        }

        debug!(command = %self, "Spawning external command");

        let child = command.spawn().map_err(|source| CommandError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        let wait = child.wait_with_output();
        let output = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(CommandError::Cancelled { program: self.program.clone() });
            },
            output = with_deadline(wait, timeout) => match output {
                Some(output) => output.map_err(|source| CommandError::Spawn {
                    program: self.program.clone(),
                    source,
                })?,
                None => {
                    return Err(CommandError::TimedOut {
                        program: self.program.clone(),
                        timeout: timeout.unwrap_or_default(),
                    });
                },
            },
        };

        if !output.stdout.is_empty() {
            debug!(stdout = %String::from_utf8_lossy(&output.stdout).trim_end(), "Command output");
        }

        if output.status.success() {
            Ok(())
        } else {
            Err(CommandError::Failed {
                program: self.program.clone(),
                status: output.status,
                stderr: stderr_excerpt(&output.stderr),
            })
        }
    }
}

impl std::fmt::Display for ExternalCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        if let Some(path) = &self.stdin_file {
            write!(f, " < {}", path.display())?;
        }
        Ok(())
    }
}

/// `None` when the deadline passed first.
async fn with_deadline<F>(fut: F, timeout: Option<Duration>) -> Option<F::Output>
where
    F: std::future::Future,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut).await.ok(),
        None => Some(fut.await),
    }
}

fn stderr_excerpt(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    let count = text.chars().count();
    if count > MAX_STDERR_CHARS {
        let tail: String = text.chars().skip(count - MAX_STDERR_CHARS).collect();
        format!("...{}", tail)
    } else {
        text.to_string()
    }
}
