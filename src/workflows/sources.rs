//! Progress sources backed by the unsent lead count

use async_trait::async_trait;

use crate::job::ProgressSource;
use crate::outreach::{ApiClient, ClientResult};

/// Scrape progress: the unsent count is the number of businesses found
pub struct UnsentLeadCount {
    client: ApiClient,
}

impl UnsentLeadCount {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProgressSource for UnsentLeadCount {
    async fn sample(&self) -> ClientResult<u64> {
        self.client.unsent_lead_count().await
    }
}

/// Bulk-send progress: how far the unsent count fell below its value
/// before the send was queued
pub struct SentSinceBaseline {
    client: ApiClient,
    baseline: u64,
}

impl SentSinceBaseline {
    pub fn new(client: ApiClient, baseline: u64) -> Self {
        Self { client, baseline }
    }
}

#[async_trait]
impl ProgressSource for SentSinceBaseline {
    async fn sample(&self) -> ClientResult<u64> {
        let remaining = self.client.unsent_lead_count().await?;
        Ok(self.baseline.saturating_sub(remaining))
    }
}
