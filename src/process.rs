//! External command execution with a bounded wait

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;

use crate::{Error, Result};

/// Hide the console window that Windows would otherwise open per child
#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Captured result of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, `None` when terminated by a signal
    pub code: Option<i32>,
    /// Standard output (lossy UTF-8)
    pub stdout: String,
    /// Standard error (lossy UTF-8)
    pub stderr: String,
}

impl ProcessOutput {
    /// Whether the process exited with code zero
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.code, Some(0))
    }
}

/// Runs an external command and captures its output
///
/// Implementations must return within roughly `limit`; a child still running
/// at the deadline is killed and [`Error::Timeout`] is returned.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Process`] if the program cannot be spawned or awaited,
    /// and [`Error::Timeout`] if it does not finish within `limit`
    async fn run(&self, program: &str, args: &[String], limit: Duration) -> Result<ProcessOutput>;
}

/// [`CommandRunner`] backed by `tokio::process`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, program: &str, args: &[String], limit: Duration) -> Result<ProcessOutput> {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(windows)]
        cmd.creation_flags(CREATE_NO_WINDOW);

        let child = cmd
            .spawn()
            .map_err(|e| Error::Process(format!("failed to spawn {program}: {e}")))?;

        let output = timeout(limit, child.wait_with_output())
            .await
            .map_err(|_| Error::Timeout(format!("{program} did not finish within {limit:?}")))?
            .map_err(|e| Error::Process(format!("{program} execution failed: {e}")))?;

        if !output.stderr.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::debug!(program, stderr = %stderr, "process stderr");
        }

        Ok(ProcessOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
