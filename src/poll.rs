//! Task polling.
//!
//! A task is complete once every source reports 100% progress. Status
//! fetches that fail are tolerated until `max_consecutive_failures` of them
//! happen in a row; any successful fetch resets the streak.

use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use crate::app::{ProgressEvent, ProgressSink};
use crate::config::{DEFAULT_MAX_CONSECUTIVE_FAILURES, DEFAULT_POLL_INTERVAL_MS};
use crate::domain::TaskId;
use crate::error::IqueryError;
use crate::search::{SearchClient, TaskStatus};

pub const COMPLETE: u32 = 100;

pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_consecutive_failures: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
        }
    }
}

/// Minimum progress across sources, `None` when there are no sources.
pub fn overall_progress<I>(progress: I) -> Option<u32>
where
    I: IntoIterator<Item = u32>,
{
    progress.into_iter().min()
}

impl TaskStatus {
    pub fn overall_progress(&self) -> Option<u32> {
        overall_progress(self.sources.iter().map(|source| source.progress))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollAttempt {
    Progress(u32),
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Polling { consecutive_failures: u32 },
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exhausted {
    pub failures: u32,
}

impl PollState {
    pub fn start() -> Self {
        PollState::Polling {
            consecutive_failures: 0,
        }
    }

    pub fn advance(self, attempt: PollAttempt, max_failures: u32) -> Result<PollState, Exhausted> {
        let PollState::Polling {
            consecutive_failures,
        } = self
        else {
            return Ok(PollState::Done);
        };

        match attempt {
            PollAttempt::Progress(progress) if progress >= COMPLETE => Ok(PollState::Done),
            PollAttempt::Progress(_) => Ok(PollState::Polling {
                consecutive_failures: 0,
            }),
            PollAttempt::Failed => {
                let failures = consecutive_failures + 1;
                if failures >= max_failures {
                    return Err(Exhausted { failures });
                }
                Ok(PollState::Polling {
                    consecutive_failures: failures,
                })
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct PollOutcome {
    pub status: TaskStatus,
    pub attempts: u32,
    pub failed_attempts: u32,
}

pub fn poll_until_complete<C, Z>(
    client: &C,
    task_id: &TaskId,
    policy: &PollPolicy,
    sleeper: &Z,
    sink: &dyn ProgressSink,
) -> Result<PollOutcome, IqueryError>
where
    C: SearchClient + ?Sized,
    Z: Sleeper + ?Sized,
{
    let mut state = PollState::start();
    let mut attempts = 0u32;
    let mut failed_attempts = 0u32;

    loop {
        sleeper.sleep(policy.interval);
        attempts += 1;

        let (attempt, status) = match client.task_status(task_id) {
            Ok(status) => match status.overall_progress() {
                Some(progress) => {
                    sink.event(ProgressEvent::new(format!(
                        "phase=Poll; task {task_id} progress {progress}%"
                    )));
                    (PollAttempt::Progress(progress), Some(status))
                }
                None => {
                    warn!(%task_id, "status listed no sources");
                    sink.event(ProgressEvent::new(format!(
                        "phase=Poll; task {task_id} status listed no sources"
                    )));
                    (PollAttempt::Failed, None)
                }
            },
            Err(err) => {
                warn!(%task_id, error = %err, "status fetch failed");
                sink.event(ProgressEvent::new(format!(
                    "phase=Poll; ran into some error: {err}"
                )));
                (PollAttempt::Failed, None)
            }
        };
        if attempt == PollAttempt::Failed {
            failed_attempts += 1;
        }

        state = state
            .advance(attempt, policy.max_consecutive_failures)
            .map_err(|exhausted| IqueryError::PollExhausted {
                task_id: task_id.to_string(),
                failures: exhausted.failures,
            })?;

        if let (PollState::Done, Some(status)) = (state, status) {
            info!(%task_id, attempts, failed_attempts, "task complete");
            return Ok(PollOutcome {
                status,
                attempts,
                failed_attempts,
            });
        }
    }
}
