//! Bulk email sending
//!
//! Loads what the send page needs, allocates unsent leads across the
//! template distribution, queues the send and follows it until the unsent
//! count has dropped by the number of emails queued.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use super::distribution::Distribution;
use super::sources::SentSinceBaseline;
use super::InFlight;
use crate::job::{self, JobProgress, JobStatus, PollConfig, PollOutcome};
use crate::notify::Notifier;
use crate::outreach::{
    ApiClient, Attachment, ClientError, ClientResult, EmailAccount, Lead, NewEmailAccount,
    NewLead, NewTemplate, SendEmailsRequest, Template,
};

/// Page size used when collecting leads to allocate
pub const ALLOCATION_PAGE: u32 = 1000;

/// State of the send page: templates, sender accounts, the unsent total
/// and the distribution being edited
#[derive(Debug, Clone)]
pub struct SendContext {
    pub templates: Vec<Template>,
    pub accounts: Vec<EmailAccount>,
    pub selected_accounts: Vec<String>,
    pub total_leads: u64,
    pub distribution: Distribution,
}

impl SendContext {
    /// Fetch templates, the unsent count and accounts concurrently.
    /// All accounts start selected.
    pub async fn load(client: &ApiClient) -> ClientResult<Self> {
        let (templates, total_leads, accounts) = futures_util::future::try_join3(
            client.templates(),
            client.unsent_lead_count(),
            client.email_accounts(),
        )
        .await?;

        tracing::debug!(
            templates = templates.len(),
            accounts = accounts.len(),
            total_leads,
            "Loaded send page"
        );

        let distribution = Distribution::new(total_leads, templates.first().map(|t| t.id.as_str()));
        let selected_accounts = accounts.iter().map(|a| a.id.clone()).collect();

        Ok(Self {
            templates,
            accounts,
            selected_accounts,
            total_leads,
            distribution,
        })
    }

    pub fn template(&self, id: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.id == id)
    }

    /// Flip one account in or out of the selection
    pub fn toggle_account(&mut self, account_id: &str) {
        if let Some(pos) = self.selected_accounts.iter().position(|id| id == account_id) {
            self.selected_accounts.remove(pos);
        } else {
            self.selected_accounts.push(account_id.to_string());
        }
    }

    /// Restrict the selection to the given accounts
    pub fn select_accounts(&mut self, ids: &[String]) -> ClientResult<()> {
        if let Some(unknown) = ids
            .iter()
            .find(|id| !self.accounts.iter().any(|a| &a.id == *id))
        {
            return Err(ClientError::Validation(format!(
                "Unknown email account: {}",
                unknown
            )));
        }
        self.selected_accounts = ids.to_vec();
        Ok(())
    }

    fn set_total_leads(&mut self, total: u64) {
        self.total_leads = total;
        self.distribution.set_total_leads(total);
    }

    /// Add a lead by hand; the unsent total grows by one
    pub async fn add_lead(&mut self, client: &ApiClient, lead: &NewLead) -> ClientResult<Lead> {
        let saved = client.add_lead(lead).await?;
        self.set_total_leads(self.total_leads + 1);
        Ok(saved)
    }

    /// Draft a template from a prompt and save it
    pub async fn create_template(
        &mut self,
        client: &ApiClient,
        prompt: &str,
    ) -> ClientResult<Template> {
        let draft = NewTemplate::from_prompt(prompt, self.templates.len())?;
        let saved = client.create_template(&draft).await?;
        self.templates.push(saved.clone());
        Ok(saved)
    }

    /// Add a sender account; it joins the selection
    pub async fn add_account(
        &mut self,
        client: &ApiClient,
        account: &NewEmailAccount,
    ) -> ClientResult<EmailAccount> {
        let saved = client.add_email_account(account).await?;
        self.selected_accounts.push(saved.id.clone());
        self.accounts.push(saved.clone());
        Ok(saved)
    }

    /// Reset an account's daily counter, then re-fetch the account list
    pub async fn reset_account(&mut self, client: &ApiClient, account_id: &str) -> ClientResult<()> {
        client.reset_email_account(account_id).await?;
        self.accounts = client.email_accounts().await?;
        Ok(())
    }
}

/// Split leads with an email across the distribution, in order
pub fn allocate(leads: &[Lead], distribution: &Distribution) -> ClientResult<Vec<String>> {
    let mut remaining = leads.iter().filter(|l| l.has_email());
    let available = leads.iter().filter(|l| l.has_email()).count();

    if available == 0 {
        return Err(ClientError::Validation(
            "No leads with valid email addresses available to send".to_string(),
        ));
    }

    let mut lead_ids = Vec::new();
    for entry in distribution.entries().iter().filter(|e| e.count > 0) {
        lead_ids.extend(
            remaining
                .by_ref()
                .take(entry.count as usize)
                .map(|l| l.id.clone()),
        );
    }

    if lead_ids.is_empty() {
        return Err(ClientError::Validation(
            "No valid leads selected for sending".to_string(),
        ));
    }
    Ok(lead_ids)
}

/// Read a PDF and encode it for the send request
pub async fn load_attachment(path: &Path) -> ClientResult<Attachment> {
    let is_pdf = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);
    if !is_pdf {
        return Err(ClientError::Validation(
            "Only PDF files are allowed".to_string(),
        ));
    }

    let bytes = tokio::fs::read(path).await?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attachment.pdf".to_string());

    Ok(Attachment {
        filename,
        content: STANDARD.encode(bytes),
    })
}

/// Result of a completed bulk send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendReport {
    pub requested: u64,
    pub progress: JobProgress,
    /// Unsent count after the refresh, if it could be fetched
    pub remaining: Option<u64>,
}

/// Queues bulk sends and tracks them to completion; one send at a time
pub struct BulkSender {
    client: ApiClient,
    notifier: Arc<dyn Notifier>,
    interval: Duration,
    max_attempts: u32,
    in_flight: Arc<AtomicBool>,
    progress: Arc<watch::Sender<JobProgress>>,
}

impl BulkSender {
    pub fn new(
        client: ApiClient,
        notifier: Arc<dyn Notifier>,
        interval: Duration,
        max_attempts: u32,
    ) -> Self {
        let (tx, _) = watch::channel(JobProgress::idle());
        Self {
            client,
            notifier,
            interval,
            max_attempts,
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

    /// Send to the leads the distribution selects and wait for the
    /// queue to drain.
    ///
    /// The unsent total is refreshed once the loop ends, whether it
    /// completed or ran out of attempts; only completion is reported as
    /// success. A second call while one is running fails with
    /// [`ClientError::JobInFlight`] and leaves the running job's progress alone.
    pub async fn send(
        &self,
        ctx: &mut SendContext,
        attachments: Vec<Attachment>,
    ) -> ClientResult<SendReport> {
        let _guard = InFlight::acquire(&self.in_flight).map_err(|e| {
            self.notifier.error(&e.to_string());
            e
        })?;

        match self.run(ctx, attachments).await {
            Ok(report) => Ok(report),
            Err(e) => {
                self.notifier.error(&e.to_string());
                if !self.progress.borrow().status.is_terminal() {
                    self.progress.send_replace(JobProgress::failed());
                }
                Err(e)
            }
        }
    }

    async fn run(&self, ctx: &mut SendContext, attachments: Vec<Attachment>) -> ClientResult<SendReport> {
        let template_id = ctx
            .distribution
            .primary_template()
            .ok_or_else(|| ClientError::Validation("Please select a template".to_string()))?
            .to_string();
        if ctx.selected_accounts.is_empty() {
            return Err(ClientError::Validation(
                "Please select at least one email account".to_string(),
            ));
        }
        if ctx.distribution.emails_to_send() == 0 {
            return Err(ClientError::Validation(
                "Please choose how many emails to send".to_string(),
            ));
        }

        let leads = self.client.unsent_leads(ALLOCATION_PAGE).await?;
        let lead_ids = allocate(&leads, &ctx.distribution)?;
        let requested = lead_ids.len() as u64;

        self.progress.send_replace(JobProgress::starting(requested));
        tracing::info!(
            template_id = %template_id,
            emails = requested,
            accounts = ctx.selected_accounts.len(),
            attachments = attachments.len(),
            "Queueing bulk send"
        );

        let request = SendEmailsRequest {
            template_id,
            lead_ids,
            attachments,
            email_account_ids: Some(ctx.selected_accounts.clone()),
        };
        let response = self.client.send_emails(&request).await?;
        if !response.is_queued() {
            return Err(ClientError::RequestFailed {
                status: 200,
                message: response
                    .message
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| "Failed to send emails".to_string()),
            });
        }

        self.progress.send_modify(|p| {
            p.advance(JobStatus::InProgress);
        });

        let source = Arc::new(SentSinceBaseline::new(self.client.clone(), ctx.total_leads));
        let handle = job::spawn(
            source,
            self.progress.clone(),
            PollConfig::bulk_send(self.interval, self.max_attempts),
        );
        let outcome = match handle.finish().await {
            PollOutcome::Failed { error, .. } => return Err(error),
            other => other,
        };

        let remaining = match self.client.unsent_lead_count().await {
            Ok(count) => {
                ctx.set_total_leads(count);
                Some(count)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not refresh unsent lead count");
                None
            }
        };

        match outcome {
            PollOutcome::Complete(progress) => {
                self.notifier
                    .success(&format!("Successfully sent {} emails", requested));
                Ok(SendReport {
                    requested,
                    progress,
                    remaining,
                })
            }
            PollOutcome::TimedOut { attempts, .. } => Err(ClientError::PollTimeout { attempts }),
            PollOutcome::Failed { error, .. } => Err(error),
            PollOutcome::Cancelled(progress) => Ok(SendReport {
                requested,
                progress,
                remaining,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{drain, ChannelNotifier, Level, Notification};
    use crate::test_support::MockApi;
    use axum::http::StatusCode as AxumStatus;
    use serde_json::{json, Value};

    fn leads() -> Vec<Value> {
        vec![
            json!({"id": "l1", "email": "a@shop.io"}),
            json!({"id": "l2", "email": ""}),
            json!({"id": "l3", "email": "c@shop.io"}),
            json!({"id": "l4", "email": "d@shop.io"}),
            json!({"id": "l5"}),
            json!({"id": "l6", "email": "f@shop.io"}),
            json!({"id": "l7", "email": "g@shop.io"}),
        ]
    }

    fn parsed_leads() -> Vec<Lead> {
        leads()
            .into_iter()
            .map(|v| serde_json::from_value(v).unwrap())
            .collect()
    }

    #[test]
    fn test_allocate_skips_leads_without_email() {
        let mut d = Distribution::new(10, Some("t1"));
        d.add(Some("t2")).unwrap();
        d.set_count(0, 2).unwrap();
        d.set_count(1, 2).unwrap();

        let ids = allocate(&parsed_leads(), &d).unwrap();
        assert_eq!(ids, vec!["l1", "l3", "l4", "l6"]);
    }

    #[test]
    fn test_allocate_errors() {
        let d = Distribution::new(10, Some("t1"));
        let err = allocate(&[], &d).unwrap_err();
        assert_eq!(
            err.to_string(),
            "No leads with valid email addresses available to send"
        );

        let err = allocate(&parsed_leads(), &d).unwrap_err();
        assert_eq!(err.to_string(), "No valid leads selected for sending");
    }

    #[tokio::test]
    async fn test_load_attachment() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("Brochure.PDF");
        std::fs::write(&pdf, b"%PDF-1.4").unwrap();

        let attachment = load_attachment(&pdf).await.unwrap();
        assert_eq!(attachment.filename, "Brochure.PDF");
        assert_eq!(attachment.content, "JVBERi0xLjQ=");

        let txt = dir.path().join("notes.txt");
        std::fs::write(&txt, b"hi").unwrap();
        let err = load_attachment(&txt).await.unwrap_err();
        assert_eq!(err.to_string(), "Only PDF files are allowed");
    }

    #[tokio::test]
    async fn test_load_selects_all_accounts() {
        let api = MockApi::new();
        api.set_counts(&[42]);
        let client = api.client().await;

        let ctx = SendContext::load(&client).await.unwrap();
        assert_eq!(ctx.total_leads, 42);
        assert_eq!(ctx.templates.len(), 2);
        assert_eq!(ctx.selected_accounts, vec!["acc-1", "acc-2"]);
        assert_eq!(ctx.distribution.primary_template(), Some("t1"));
    }

    #[tokio::test]
    async fn test_send_completes_and_refreshes() {
        let api = MockApi::new();
        api.set_counts(&[40, 38, 35]);
        api.set_leads(leads());
        let client = api.client().await;
        let (notifier, mut rx) = ChannelNotifier::new();

        let mut ctx = SendContext::load(&client).await.unwrap();
        ctx.distribution.set_count(0, 3).unwrap();
        ctx.distribution.add(Some("t2")).unwrap();
        ctx.distribution.set_count(1, 2).unwrap();

        let sender = BulkSender::new(client, Arc::new(notifier), Duration::from_millis(5), 60);
        let report = sender.send(&mut ctx, Vec::new()).await.unwrap();

        assert_eq!(report.requested, 5);
        assert_eq!(report.progress.status, JobStatus::Complete);
        assert_eq!(report.remaining, Some(35));
        assert_eq!(ctx.total_leads, 35);

        let bodies = api.bodies("/send-emails");
        assert_eq!(
            bodies,
            vec![json!({
                "template_id": "t1",
                "lead_ids": ["l1", "l3", "l4", "l6", "l7"],
                "email_account_ids": ["acc-1", "acc-2"],
            })]
        );
        assert_eq!(
            drain(&mut rx),
            vec![Notification::new(Level::Success, "Successfully sent 5 emails")]
        );
    }

    #[tokio::test]
    async fn test_send_gives_up_after_attempt_budget() {
        let api = MockApi::new();
        api.set_counts(&[40]);
        api.set_leads(leads());
        let client = api.client().await;
        let (notifier, mut rx) = ChannelNotifier::new();

        let mut ctx = SendContext::load(&client).await.unwrap();
        ctx.distribution.set_count(0, 3).unwrap();

        let sender = BulkSender::new(client, Arc::new(notifier), Duration::from_millis(1), 60);
        let err = sender.send(&mut ctx, Vec::new()).await.unwrap_err();

        assert!(matches!(err, ClientError::PollTimeout { attempts: 60 }));
        // One load, sixty progress checks, one refresh
        assert_eq!(api.count_of("GET /leads/count?sent=false"), 62);
        assert_eq!(sender.progress().status, JobStatus::Error);

        let notes = drain(&mut rx);
        assert!(notes.iter().all(|n| n.level != Level::Success));
        assert_eq!(
            notes,
            vec![Notification::new(
                Level::Error,
                "Gave up waiting for the job after 60 progress checks"
            )]
        );
    }

    #[tokio::test]
    async fn test_auth_failure_while_polling_stops_without_refresh() {
        let api = MockApi::new();
        api.set_counts(&[40]);
        api.set_leads(leads());
        let client = api.client().await;
        let (notifier, mut rx) = ChannelNotifier::new();

        let mut ctx = SendContext::load(&client).await.unwrap();
        ctx.distribution.set_count(0, 3).unwrap();
        api.fail_counts(AxumStatus::UNAUTHORIZED);

        let sender = BulkSender::new(client, Arc::new(notifier), Duration::from_millis(1), 60);
        let err = sender.send(&mut ctx, Vec::new()).await.unwrap_err();

        assert!(matches!(err, ClientError::AuthenticationFailed));
        assert_eq!(api.bodies("/send-emails").len(), 1);
        // The load and the single failed check; no refresh afterwards
        assert_eq!(api.count_of("GET /leads/count?sent=false"), 2);
        assert_eq!(sender.progress().status, JobStatus::Error);
        assert_eq!(ctx.total_leads, 40);
        assert!(!sender.is_running());
        assert_eq!(
            drain(&mut rx),
            vec![Notification::new(
                Level::Error,
                "Authentication failed. Please log in again."
            )]
        );
    }

    #[tokio::test]
    async fn test_rejects_overlapping_send() {
        let api = MockApi::new();
        api.set_counts(&[40, 40, 37]);
        api.set_leads(leads());
        let client = api.client().await;
        let (notifier, mut rx) = ChannelNotifier::new();

        let mut first = SendContext::load(&client).await.unwrap();
        first.distribution.set_count(0, 3).unwrap();
        let mut second = SendContext::load(&client).await.unwrap();
        second.distribution.set_count(0, 2).unwrap();

        let sender = BulkSender::new(client, Arc::new(notifier), Duration::from_millis(5), 60);
        let (a, b) = tokio::join!(
            sender.send(&mut first, Vec::new()),
            sender.send(&mut second, Vec::new())
        );

        assert_eq!(a.unwrap().progress.status, JobStatus::Complete);
        assert!(matches!(b, Err(ClientError::JobInFlight)));
        assert_eq!(api.bodies("/send-emails").len(), 1);
        assert_eq!(sender.progress().status, JobStatus::Complete);
        assert!(!sender.is_running());

        let notes = drain(&mut rx);
        assert_eq!(
            notes,
            vec![
                Notification::new(Level::Error, "A job is already in progress"),
                Notification::new(Level::Success, "Successfully sent 3 emails"),
            ]
        );
    }

    #[tokio::test]
    async fn test_send_not_queued() {
        let api = MockApi::new();
        api.set_counts(&[40]);
        api.set_leads(leads());
        api.set_send_status("rejected");
        let client = api.client().await;
        let (notifier, mut rx) = ChannelNotifier::new();

        let mut ctx = SendContext::load(&client).await.unwrap();
        ctx.distribution.set_count(0, 1).unwrap();

        let sender = BulkSender::new(client, Arc::new(notifier), Duration::from_millis(1), 60);
        let err = sender.send(&mut ctx, Vec::new()).await.unwrap_err();

        assert_eq!(err.to_string(), "No sender capacity left");
        assert_eq!(sender.progress(), JobProgress::failed());
        assert_eq!(api.count_of("GET /leads/count?sent=false"), 1);
        assert_eq!(drain(&mut rx)[0].level, Level::Error);
    }

    #[tokio::test]
    async fn test_send_requires_accounts() {
        let api = MockApi::new();
        api.set_counts(&[40]);
        let client = api.client().await;
        let (notifier, _rx) = ChannelNotifier::new();

        let mut ctx = SendContext::load(&client).await.unwrap();
        ctx.distribution.set_count(0, 1).unwrap();
        ctx.toggle_account("acc-1");
        ctx.toggle_account("acc-2");

        let sender = BulkSender::new(client, Arc::new(notifier), Duration::from_millis(1), 60);
        let err = sender.send(&mut ctx, Vec::new()).await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
        assert!(api.bodies("/send-emails").is_empty());
    }

    #[tokio::test]
    async fn test_reset_account_refetches() {
        let api = MockApi::new();
        api.set_counts(&[1]);
        let client = api.client().await;
        let mut ctx = SendContext::load(&client).await.unwrap();
        assert_eq!(ctx.accounts[0].emails_sent_today, 50);

        ctx.reset_account(&client, "acc-1").await.unwrap();
        assert_eq!(ctx.accounts[0].emails_sent_today, 0);
        assert_eq!(api.count_of("GET /email-accounts"), 2);
    }

    #[tokio::test]
    async fn test_manual_lead_grows_total() {
        let api = MockApi::new();
        api.set_counts(&[4]);
        let client = api.client().await;
        let mut ctx = SendContext::load(&client).await.unwrap();

        let lead = NewLead {
            company_name: "Corner Shop".into(),
            email: "owner@corner.shop".into(),
            ..Default::default()
        };
        let saved = ctx.add_lead(&client, &lead).await.unwrap();
        assert_eq!(saved.id, "manual-1");
        assert_eq!(ctx.total_leads, 5);
        assert_eq!(ctx.distribution.total_leads(), 5);
    }

    #[tokio::test]
    async fn test_create_template_from_prompt() {
        let api = MockApi::new();
        api.set_counts(&[4]);
        let client = api.client().await;
        let mut ctx = SendContext::load(&client).await.unwrap();

        let saved = ctx
            .create_template(&client, "Offer a free tasting")
            .await
            .unwrap();
        assert_eq!(saved.id, "t3");
        assert_eq!(saved.name, "Custom 3");
        assert_eq!(ctx.templates.len(), 3);
    }
}
