use std::{fmt::Display, future::Future, time::Duration};

use tokio::time::{self, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::pipeline::Pipeline;

/// How many extra attempts a failing step gets, and how long to wait between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepPolicy {
    pub retries: u32,
    pub retry_delay: Duration,
}

impl Default for StepPolicy {
    fn default() -> Self {
        Self {
            retries: 1,
            retry_delay: Duration::from_secs(300),
        }
    }
}

impl StepPolicy {
    /// Single attempt, no waiting.
    pub const fn no_retry() -> Self {
        Self {
            retries: 0,
            retry_delay: Duration::ZERO,
        }
    }
}

/// Run `op` until it succeeds or the policy's retries are used up; the last error is returned.
pub async fn run_step<T, E, F, Fut>(step: &str, policy: StepPolicy, mut op: F) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.retries => {
                attempt += 1;
                warn!(
                    step,
                    attempt,
                    retries = policy.retries,
                    error = %e,
                    "Step failed, retrying in {:?}",
                    policy.retry_delay
                );
                time::sleep(policy.retry_delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Fires the pipeline on a fixed cadence. Missed ticks are skipped, never replayed.
#[derive(Debug)]
pub struct Scheduler {
    pipeline: Pipeline,
    interval: Duration,
}

impl Scheduler {
    pub fn new(pipeline: Pipeline, interval: Duration) -> Self {
        Self { pipeline, interval }
    }

    /// Runs immediately, then once per interval, until `shutdown` resolves.
    /// A run still in flight when `shutdown` resolves is dropped.
    /// Returns the number of runs started.
    pub async fn run_until<S>(&self, shutdown: S) -> u64
    where
        S: Future<Output = ()>,
    {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tokio::pin!(shutdown);
        let mut runs = 0;

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(runs, "Scheduler stopping");
                    return runs;
                }
                _ = ticker.tick() => {
                    runs += 1;
                    tokio::select! {
                        _ = &mut shutdown => {
                            warn!(run = runs, "Scheduler stopping, abandoning in-flight run");
                            return runs;
                        }
                        result = self.pipeline.run_once() => match result {
                            Ok(report) => info!(
                                run = runs,
                                written = report.written.len(),
                                "Pipeline run succeeded"
                            ),
                            Err(e) => error!(run = runs, error = %e, "Pipeline run failed"),
                        },
                    }
                }
            }
        }
    }
}
