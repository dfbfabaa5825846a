//! Dashboard workflows
//!
//! The long-running flows of the dashboard, built on the outreach client
//! and the job poller:
//!
//! - [`scrape`]: Google or Bing maps scrape with progress and lead refresh
//! - [`send`]: send page state, lead allocation and bulk send tracking
//! - [`distribution`]: per-template lead counts

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::outreach::{ClientError, ClientResult};

pub mod distribution;
pub mod scrape;
pub mod send;
mod sources;

pub use distribution::{parse_split, Distribution, DistributionEntry, DistributionError};
pub use scrape::{validate_scrape, MapsProvider, ScrapeJob, ScrapeReport, ScrapeRunner, MAX_BUSINESSES};
pub use send::{allocate, load_attachment, BulkSender, SendContext, SendReport};
pub use sources::{SentSinceBaseline, UnsentLeadCount};

/// Clears a trigger's in-flight flag when its job goes away
pub(crate) struct InFlight(Arc<AtomicBool>);

impl InFlight {
    pub(crate) fn acquire(flag: &Arc<AtomicBool>) -> ClientResult<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ClientError::JobInFlight)?;
        Ok(Self(flag.clone()))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
