//! Completion Detector
//!
//! Decides from successive poll samples whether a job is done. The pure
//! [`evaluate`] rule looks at one pair of samples; [`Detector`] wraps it with
//! the sample history and the attempt budget.

use super::status::{percentage, JobStatus};

/// How a job's end is recognised
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionPolicy {
    /// Done once the count reaches the requested total
    ReachTotal,
    /// Also done when two consecutive samples are equal.
    ///
    /// A slow job that reports the same count twice in a row is declared
    /// finished even if more results would have arrived.
    ReachTotalOrStall,
}

/// Result of looking at one sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Continue,
    Complete,
    /// Attempt budget used up without completing
    Exhausted,
}

/// Judge one sample against the previous one.
///
/// A sample whose percentage rounds to 100 counts as reaching the total.
pub fn evaluate(
    previous: Option<u64>,
    current: u64,
    total: u64,
    status: JobStatus,
    policy: CompletionPolicy,
) -> Verdict {
    if current >= total || percentage(current, total).round() >= 100.0 {
        return Verdict::Complete;
    }

    if policy == CompletionPolicy::ReachTotalOrStall
        && status == JobStatus::InProgress
        && previous == Some(current)
    {
        return Verdict::Complete;
    }

    Verdict::Continue
}

/// Stateful detector for one poll loop
#[derive(Debug, Clone)]
pub struct Detector {
    policy: CompletionPolicy,
    total: u64,
    max_attempts: Option<u32>,
    previous: Option<u64>,
    attempts: u32,
}

impl Detector {
    pub fn new(policy: CompletionPolicy, total: u64, max_attempts: Option<u32>) -> Self {
        Self {
            policy,
            total,
            max_attempts,
            previous: None,
            attempts: 0,
        }
    }

    /// Feed the next sample
    pub fn observe(&mut self, sample: u64, status: JobStatus) -> Verdict {
        self.attempts += 1;
        let verdict = evaluate(self.previous, sample, self.total, status, self.policy);
        self.previous = Some(sample);

        match verdict {
            Verdict::Continue if self.max_attempts.is_some_and(|max| self.attempts >= max) => {
                Verdict::Exhausted
            }
            other => other,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}
