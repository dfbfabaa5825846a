//! Progress Poller
//!
//! Samples a [`ProgressSource`] on a fixed interval until the
//! [`Detector`] reports a terminal verdict, publishing every update on a
//! `watch` channel. The loop runs as a spawned task owned by a
//! [`PollHandle`]; cancelling or dropping the handle stops it.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::detector::{CompletionPolicy, Detector, Verdict};
use super::status::{JobProgress, JobStatus};
use crate::outreach::{ClientError, ClientResult};

/// Something that reports how far a job has got
#[async_trait]
pub trait ProgressSource: Send + Sync {
    /// Current number of units done
    async fn sample(&self) -> ClientResult<u64>;
}

/// Cadence and stopping rules for one poll loop
#[derive(Debug, Clone)]
pub struct PollConfig {
    pub interval: Duration,
    pub policy: CompletionPolicy,
    pub max_attempts: Option<u32>,
}

impl PollConfig {
    /// Scrape polling: unbounded, stops on the policy alone
    pub fn scrape(interval: Duration, policy: CompletionPolicy) -> Self {
        Self {
            interval,
            policy,
            max_attempts: None,
        }
    }

    /// Bulk-send polling: reach the total within an attempt budget
    pub fn bulk_send(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            policy: CompletionPolicy::ReachTotal,
            max_attempts: Some(max_attempts),
        }
    }
}

/// How a poll loop ended
#[derive(Debug)]
pub enum PollOutcome {
    Complete(JobProgress),
    /// Attempt budget exhausted
    TimedOut { progress: JobProgress, attempts: u32 },
    /// A sample failed; the loop does not retry
    Failed {
        progress: JobProgress,
        error: ClientError,
    },
    /// The handle was cancelled or dropped
    Cancelled(JobProgress),
}

impl PollOutcome {
    pub fn progress(&self) -> JobProgress {
        match self {
            PollOutcome::Complete(p) | PollOutcome::Cancelled(p) => *p,
            PollOutcome::TimedOut { progress, .. } | PollOutcome::Failed { progress, .. } => {
                *progress
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, PollOutcome::Complete(_))
    }
}

/// Owner of a running poll loop
pub struct PollHandle {
    job_id: Uuid,
    cancel: CancellationToken,
    progress: watch::Receiver<JobProgress>,
    task: Option<JoinHandle<PollOutcome>>,
}

impl PollHandle {
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// Subscribe to progress updates
    pub fn subscribe(&self) -> watch::Receiver<JobProgress> {
        self.progress.clone()
    }

    /// Latest published progress
    pub fn latest(&self) -> JobProgress {
        *self.progress.borrow()
    }

    /// Stop the loop at its next suspension point
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the loop to end
    pub async fn finish(mut self) -> PollOutcome {
        let latest = self.latest();
        match self.task.take() {
            Some(task) => match task.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(job_id = %self.job_id, error = %e, "Poll task aborted");
                    PollOutcome::Cancelled(latest)
                }
            },
            None => PollOutcome::Cancelled(latest),
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        // The timer never outlives its owner
        self.cancel.cancel();
    }
}

/// Start polling `source`.
///
/// `progress` already holds the job's total and state (normally
/// `InProgress`); the loop publishes each sample and the terminal status
/// on it.
pub fn spawn(
    source: Arc<dyn ProgressSource>,
    progress: Arc<watch::Sender<JobProgress>>,
    config: PollConfig,
) -> PollHandle {
    let job_id = Uuid::new_v4();
    let cancel = CancellationToken::new();
    let receiver = progress.subscribe();

    let task = tokio::spawn(run(job_id, source, progress, config, cancel.clone()));

    PollHandle {
        job_id,
        cancel,
        progress: receiver,
        task: Some(task),
    }
}

async fn run(
    job_id: Uuid,
    source: Arc<dyn ProgressSource>,
    progress: Arc<watch::Sender<JobProgress>>,
    config: PollConfig,
    cancel: CancellationToken,
) -> PollOutcome {
    let total = progress.borrow().total;
    let mut detector = Detector::new(config.policy, total, config.max_attempts);

    tracing::info!(
        %job_id,
        total,
        interval_ms = config.interval.as_millis() as u64,
        policy = ?config.policy,
        "Polling job progress"
    );

    let mut ticker = tokio::time::interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // Skip the immediate first tick; the first sample comes one interval in
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(%job_id, "Polling cancelled");
                return PollOutcome::Cancelled(*progress.borrow());
            }
            _ = ticker.tick() => {}
        }

        let sample = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(%job_id, "Polling cancelled during request");
                return PollOutcome::Cancelled(*progress.borrow());
            }
            sample = source.sample() => sample,
        };

        let count = match sample {
            Ok(count) => count,
            Err(error) => {
                tracing::warn!(%job_id, error = %error, "Progress check failed, stopping");
                progress.send_modify(|p| {
                    p.advance(JobStatus::Error);
                });
                return PollOutcome::Failed {
                    progress: *progress.borrow(),
                    error,
                };
            }
        };

        let status = progress.borrow().status;
        let verdict = detector.observe(count, status);
        tracing::debug!(%job_id, attempt = detector.attempts(), count, total, ?verdict, "Progress sample");

        match verdict {
            Verdict::Continue => {
                progress.send_modify(|p| p.record(count));
            }
            Verdict::Complete => {
                progress.send_modify(|p| {
                    p.record(count);
                    p.advance(JobStatus::Complete);
                });
                tracing::info!(%job_id, count, total, "Job complete");
                return PollOutcome::Complete(*progress.borrow());
            }
            Verdict::Exhausted => {
                progress.send_modify(|p| {
                    p.record(count);
                    p.advance(JobStatus::Error);
                });
                tracing::warn!(%job_id, attempts = detector.attempts(), count, total, "Gave up polling");
                return PollOutcome::TimedOut {
                    progress: *progress.borrow(),
                    attempts: detector.attempts(),
                };
            }
        }
    }
}
