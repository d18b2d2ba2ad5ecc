use std::time::Duration;

use async_trait::async_trait;

use crate::error::RelayError;
use crate::models::Run;

/// Anything that can report the current state of a run.
#[async_trait]
pub trait RunStatusSource: Send + Sync {
    async fn run_status(&self, thread_id: &str, run_id: &str) -> Result<Run, RelayError>;
}

/// Terminal run plus the number of status re-queries it took to get there.
#[derive(Debug, Clone)]
pub struct PolledRun {
    pub run: Run,
    pub attempts: u32,
}

/// Fixed-interval run poller.
///
/// Waits `interval` before every re-query, so a run that is already terminal
/// costs nothing. Each wait is a `tokio::time::sleep`; dropping the future
/// (e.g. when the client disconnects) stops the loop.
#[derive(Debug, Clone)]
pub struct RunPoller {
    interval: Duration,
    max_attempts: Option<u32>,
}

impl RunPoller {
    pub fn new(interval: Duration, max_attempts: Option<u32>) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Poll from `initial` until the status leaves queued/in_progress.
    ///
    /// Without `max_attempts` there is no upper bound. Upstream errors end the
    /// loop immediately.
    pub async fn wait<S>(
        &self,
        source: &S,
        thread_id: &str,
        initial: Run,
    ) -> Result<PolledRun, RelayError>
    where
        S: RunStatusSource + ?Sized,
    {
        let mut run = initial;
        let mut attempts = 0u32;

        while run.status.is_pending() {
            if self.max_attempts.is_some_and(|max| attempts >= max) {
                tracing::warn!(
                    run_id = %run.id,
                    status = %run.status,
                    attempts,
                    "run polling gave up"
                );
                return Err(RelayError::PollTimeout {
                    run_id: run.id,
                    status: run.status.to_string(),
                    attempts,
                });
            }

            tokio::time::sleep(self.interval).await;
            run = source.run_status(thread_id, &run.id).await?;
            attempts += 1;
            tracing::debug!(run_id = %run.id, status = %run.status, attempts, "polled run");
        }

        Ok(PolledRun { run, attempts })
    }
}
