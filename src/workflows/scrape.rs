//! Map scraping
//!
//! Starts a Google or Bing maps scrape, follows it through the poller and
//! refreshes the recent leads once it ends.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use super::sources::UnsentLeadCount;
use super::InFlight;
use crate::job::{self, CompletionPolicy, JobProgress, JobStatus, PollConfig, PollHandle, PollOutcome};
use crate::notify::Notifier;
use crate::outreach::{ApiClient, ClientError, ClientResult, Lead, ScrapeRequest};

/// Upper bound the scrape form accepts
pub const MAX_BUSINESSES: u32 = 100;

/// Leads shown after a scrape
pub const RECENT_LEADS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapsProvider {
    Google,
    Bing,
}

impl MapsProvider {
    pub fn endpoint(&self) -> &'static str {
        match self {
            MapsProvider::Google => "/scrape-google-maps",
            MapsProvider::Bing => "/scrape-bing-maps",
        }
    }

    /// The Bing page also treats a stalled count as finished
    pub fn policy(&self) -> CompletionPolicy {
        match self {
            MapsProvider::Google => CompletionPolicy::ReachTotal,
            MapsProvider::Bing => CompletionPolicy::ReachTotalOrStall,
        }
    }
}

impl std::str::FromStr for MapsProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "google" => Ok(MapsProvider::Google),
            "bing" => Ok(MapsProvider::Bing),
            other => Err(format!("unknown maps provider '{}', expected google or bing", other)),
        }
    }
}

/// Check the scrape form before any request goes out
pub fn validate_scrape(query: &str, max_businesses: u32) -> ClientResult<ScrapeRequest> {
    let query = query.trim();
    if query.is_empty() {
        return Err(ClientError::Validation(
            "Please enter a search query".to_string(),
        ));
    }
    if !(1..=MAX_BUSINESSES).contains(&max_businesses) {
        return Err(ClientError::Validation(
            "Please enter a number between 1 and 100".to_string(),
        ));
    }
    Ok(ScrapeRequest {
        query: query.to_string(),
        max_businesses,
    })
}

/// Scrape trigger for one page; refuses overlapping jobs
pub struct ScrapeRunner {
    client: ApiClient,
    notifier: Arc<dyn Notifier>,
    interval: Duration,
    in_flight: Arc<AtomicBool>,
    progress: Arc<watch::Sender<JobProgress>>,
}

impl ScrapeRunner {
    pub fn new(client: ApiClient, notifier: Arc<dyn Notifier>, interval: Duration) -> Self {
        let (tx, _) = watch::channel(JobProgress::idle());
        Self {
            client,
            notifier,
            interval,
            in_flight: Arc::new(AtomicBool::new(false)),
            progress: Arc::new(tx),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<JobProgress> {
        self.progress.subscribe()
    }

    pub fn progress(&self) -> JobProgress {
        *self.progress.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Validate, send the start request and begin polling.
    ///
    /// Errors are also reported through the notifier; on failure the
    /// progress is reset to the failed projection and no poller runs.
    pub async fn start(
        &self,
        provider: MapsProvider,
        query: &str,
        max_businesses: u32,
    ) -> ClientResult<ScrapeJob> {
        let request = validate_scrape(query, max_businesses).map_err(|e| self.report(e))?;
        let guard = InFlight::acquire(&self.in_flight).map_err(|e| self.report(e))?;

        self.progress
            .send_replace(JobProgress::starting(u64::from(request.max_businesses)));

        tracing::info!(
            provider = ?provider,
            query = %request.query,
            max_businesses = request.max_businesses,
            "Starting scrape"
        );

        let started = match self.client.start_scrape(provider.endpoint(), &request).await {
            Ok(started) => started,
            Err(e) => {
                self.progress.send_replace(JobProgress::failed());
                return Err(self.report(e));
            }
        };

        if !started.message.is_empty() {
            self.notifier.success(&started.message);
        }
        self.progress.send_modify(|p| {
            p.advance(JobStatus::InProgress);
        });

        let source = Arc::new(UnsentLeadCount::new(self.client.clone()));
        let handle = job::spawn(
            source,
            self.progress.clone(),
            PollConfig::scrape(self.interval, provider.policy()),
        );

        Ok(ScrapeJob {
            handle,
            client: self.client.clone(),
            notifier: self.notifier.clone(),
            progress: self.progress.clone(),
            _guard: guard,
        })
    }

    fn report(&self, error: ClientError) -> ClientError {
        self.notifier.error(&error.to_string());
        error
    }
}

/// What a finished scrape left behind
#[derive(Debug)]
pub struct ScrapeReport {
    pub progress: JobProgress,
    /// Recent unsent leads, re-fetched after completion
    pub leads: Vec<Lead>,
}

/// A running scrape. Dropping it stops the poller.
pub struct ScrapeJob {
    handle: PollHandle,
    client: ApiClient,
    notifier: Arc<dyn Notifier>,
    progress: Arc<watch::Sender<JobProgress>>,
    _guard: InFlight,
}

impl ScrapeJob {
    pub fn subscribe(&self) -> watch::Receiver<JobProgress> {
        self.handle.subscribe()
    }

    /// Wait for the poller and refresh the lead list
    pub async fn finish(self) -> ClientResult<ScrapeReport> {
        let ScrapeJob {
            handle,
            client,
            notifier,
            progress,
            _guard,
        } = self;

        match handle.finish().await {
            PollOutcome::Complete(done) => {
                let leads = client.unsent_leads(RECENT_LEADS).await.map_err(|e| {
                    notifier.error(&e.to_string());
                    e
                })?;
                notifier.success(&format!(
                    "Scraping completed! Found {} businesses.",
                    done.done
                ));
                Ok(ScrapeReport {
                    progress: done,
                    leads,
                })
            }
            PollOutcome::Failed { error, .. } => {
                notifier.error(&error.to_string());
                progress.send_replace(JobProgress::failed());
                Err(error)
            }
            PollOutcome::TimedOut { attempts, .. } => {
                let error = ClientError::PollTimeout { attempts };
                notifier.error(&error.to_string());
                progress.send_replace(JobProgress::failed());
                Err(error)
            }
            PollOutcome::Cancelled(last) => Ok(ScrapeReport {
                progress: last,
                leads: Vec::new(),
            }),
        }
    }
}
