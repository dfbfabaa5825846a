//! # Leadboard
//!
//! Terminal dashboard for a lead-generation and outreach API: analytics,
//! map scraping, bulk email sends and reply review.
//!
//! The API runs its scrapes and sends as background jobs without a status
//! endpoint. Leadboard infers their progress by sampling the unsent lead
//! count on a fixed interval and decides from successive samples when a
//! job is done.
//!
//! ## Modules
//!
//! - [`outreach`]: REST client, session and wire types
//! - [`job`]: job progress, completion detection and the poller
//! - [`workflows`]: scrape and bulk-send flows built on the two above
//! - [`display`]: terminal tables and status lines
//! - [`config`]: TOML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use leadboard::{ApiClient, Config, ConsoleNotifier, MapsProvider, ScrapeRunner, Session};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_default();
//!     let session = Session::from_config(&config)?;
//!     let client = ApiClient::new(session, config.api.request_timeout())?;
//!
//!     let runner = ScrapeRunner::new(
//!         client,
//!         Arc::new(ConsoleNotifier),
//!         config.polling.scrape_interval(),
//!     );
//!     let report = runner
//!         .start(MapsProvider::Google, "bakeries in Leeds", 20)
//!         .await?
//!         .finish()
//!         .await?;
//!
//!     println!("Found {} businesses", report.progress.done);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod display;
pub mod job;
pub mod logging;
pub mod notify;
pub mod outreach;
pub mod workflows;

#[cfg(test)]
mod test_support;

pub use config::{Config, ConfigError, LoggingConfig, PollingConfig};

pub use job::{CompletionPolicy, JobProgress, JobStatus, PollConfig, PollHandle, PollOutcome, ProgressSource};

pub use notify::{ChannelNotifier, ConsoleNotifier, Level, Notification, Notifier};

pub use outreach::{ApiClient, ClientError, ClientResult, Lead, Session, TokenStore};

pub use workflows::{
    BulkSender, Distribution, DistributionError, MapsProvider, ScrapeRunner, SendContext,
};
