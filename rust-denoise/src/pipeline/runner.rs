//! Stage execution.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use process_utils::{run_capturing_stderr, tokio_command};
use tracing::{debug, error, info};

use super::tools::StageInvocation;
use crate::{Error, Result};

/// Executes a single stage invocation.
///
/// Implementations make exactly one attempt and map a non-zero exit to a
/// stage failure carrying the process's diagnostic output.
#[async_trait]
pub trait StageRunner: Send + Sync {
    async fn run(&self, invocation: &StageInvocation) -> Result<()>;
}

/// Runs invocations as child processes.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    timeout: Option<Duration>,
}

impl ProcessRunner {
    /// A runner that waits for processes indefinitely.
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill processes that run longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl StageRunner for ProcessRunner {
    async fn run(&self, invocation: &StageInvocation) -> Result<()> {
        let stage = invocation.stage;
        let start = Instant::now();

        let mut command = tokio_command(&invocation.program);
        command.args(&invocation.args);

        debug!(
            %stage,
            program = %invocation.program.display(),
            args = ?invocation.args,
            "Starting stage process"
        );

        let running = run_capturing_stderr(&mut command);
        let output = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, running).await {
                Ok(output) => output,
                Err(_) => {
                    error!(%stage, timeout_secs = limit.as_secs(), "Stage process timed out");
                    return Err(Error::StageTimeout {
                        stage,
                        secs: limit.as_secs(),
                    });
                }
            },
            None => running.await,
        };

        let output = output.map_err(|source| {
            error!(%stage, error = %source, "Failed to run stage process");
            Error::StageSpawn { stage, source }
        })?;

        if !output.status.success() {
            error!(
                %stage,
                status = %output.status,
                stderr = %output.stderr.trim(),
                "Stage process failed"
            );
            return Err(Error::StageFailed {
                stage,
                exit_code: output.status.code(),
                stderr: output.stderr.trim().to_string(),
            });
        }

        info!(
            %stage,
            duration_ms = start.elapsed().as_millis() as u64,
            "Stage completed"
        );
        Ok(())
    }
}
