//! External process execution
//!
//! Spawns a program directly (never through a shell), forwards its stderr to
//! the log line by line, and folds spawn and exit into a single `Result`.
//! No retries happen at this layer.

use async_trait::async_trait;
use std::ffi::OsString;
use std::process::Stdio;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// How long to keep draining stderr once the child has exited
pub const STDERR_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// External process errors
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Executable missing, not permitted, or otherwise not startable
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Process ran and exited unsuccessfully; `code` is `None` when killed by a signal
    #[error("{program} exited with status {}", .code.map_or_else(|| "signal".to_string(), |c| c.to_string()))]
    Exit { program: String, code: Option<i32> },

    /// Process exceeded the configured time limit and was killed
    #[error("{program} timed out after {}s", .after.as_secs())]
    TimedOut { program: String, after: Duration },

    /// Waiting on the child failed
    #[error("Failed waiting on {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Runs an external program to completion
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[OsString]) -> Result<(), ProcessError>;
}

/// [`ProcessRunner`] backed by `tokio::process`
#[derive(Debug, Clone, Default)]
pub struct CommandRunner {
    timeout: Option<Duration>,
}

impl CommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill the child once `timeout` elapses
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ProcessRunner for CommandRunner {
    async fn run(&self, program: &str, args: &[OsString]) -> Result<(), ProcessError> {
        let start = Instant::now();
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                program: program.to_string(),
                source,
            })?;

        info!(program, pid = child.id(), args_len = args.len(), "Process started");

        let stderr_task = child.stderr.take().map(|stderr| {
            let program = program.to_string();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                loop {
                    match lines.next_line().await {
                        Ok(Some(line)) => debug!(program = %program, "{}", line),
                        Ok(None) => break,
                        Err(e) => {
                            warn!(program = %program, error = %e, "Failed reading stderr");
                            break;
                        }
                    }
                }
            })
        });

        let waited = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(program, timeout_secs = limit.as_secs(), "Process timed out, killing");
                    if let Err(e) = child.kill().await {
                        warn!(program, error = %e, "Failed to kill timed out process");
                    }
                    // Grandchildren may still hold the pipe open
                    if let Some(task) = stderr_task {
                        task.abort();
                    }
                    return Err(ProcessError::TimedOut {
                        program: program.to_string(),
                        after: limit,
                    });
                }
            },
            None => child.wait().await,
        };

        let status = waited.map_err(|source| ProcessError::Wait {
            program: program.to_string(),
            source,
        })?;

        if let Some(mut task) = stderr_task {
            // A background grandchild can keep stderr open past our child's exit
            if tokio::time::timeout(STDERR_DRAIN_GRACE, &mut task).await.is_err() {
                debug!(program, "stderr still open after exit, detaching");
                task.abort();
            }
        }

        let elapsed_ms = start.elapsed().as_millis() as u64;
        if status.success() {
            info!(program, elapsed_ms, "Process exited successfully");
            Ok(())
        } else {
            warn!(program, elapsed_ms, status = %status, "Process failed");
            Err(ProcessError::Exit {
                program: program.to_string(),
                code: status.code(),
            })
        }
    }
}
