//! Job Progress
//!
//! Client-side tracking of long-running server jobs (map scrapes and bulk
//! sends). The server exposes no job status; progress is inferred by
//! sampling a count endpoint.
//!
//! ## Architecture
//!
//! - **JobProgress**: `{done, total, status}` projection shown to the user
//! - **Detector**: decides from successive samples whether a job is done
//! - **Poller**: spawned loop that samples a [`ProgressSource`] on a fixed
//!   interval, owned by a cancellable [`PollHandle`]

mod detector;
mod poller;
mod status;

pub use detector::{evaluate, CompletionPolicy, Detector, Verdict};
pub use poller::{spawn, PollConfig, PollHandle, PollOutcome, ProgressSource};
pub use status::{percentage, JobProgress, JobStatus};
