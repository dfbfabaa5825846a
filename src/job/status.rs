//! Job status and progress projection

use serde::Serialize;

/// Lifecycle of one server-side job as seen from the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Idle,
    Starting,
    InProgress,
    Complete,
    Error,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Error)
    }

    /// Forward-only transitions; `Error` is reachable from anywhere
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        match (self, next) {
            (_, Error) => true,
            (Idle, Starting) | (Starting, InProgress) | (InProgress, Complete) => true,
            _ => false,
        }
    }
}

/// `{done, total, status}` of a scrape or bulk send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct JobProgress {
    /// Units scraped or sent so far
    pub done: u64,
    /// Units requested
    pub total: u64,
    pub status: JobStatus,
}

impl JobProgress {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn starting(total: u64) -> Self {
        Self {
            done: 0,
            total,
            status: JobStatus::Starting,
        }
    }

    /// The cleared projection shown after a failed start or poll
    pub fn failed() -> Self {
        Self {
            done: 0,
            total: 0,
            status: JobStatus::Error,
        }
    }

    /// Move to `next` if the lifecycle allows it
    pub fn advance(&mut self, next: JobStatus) -> bool {
        if self.status.can_transition_to(next) {
            self.status = next;
            true
        } else {
            tracing::warn!(from = ?self.status, to = ?next, "Ignoring invalid job transition");
            false
        }
    }

    /// Record a poll sample, capped at `total`; progress never moves backwards
    pub fn record(&mut self, sample: u64) {
        self.done = self.done.max(sample.min(self.total));
    }

    /// Share of the job done, clamped to 100
    pub fn percentage(&self) -> f64 {
        percentage(self.done, self.total)
    }

    /// The percentage as the progress indicator shows it
    pub fn rounded_percentage(&self) -> u8 {
        self.percentage().round() as u8
    }
}

/// `done / total` as a percentage in `[0, 100]`; 0 when total is 0
pub fn percentage(done: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (done as f64 / total as f64 * 100.0).min(100.0)
}
