//! Outreach REST API Client
//!
//! HTTP client for every endpoint the dashboard reads or writes. Each call
//! carries the session's bearer token; a 401 becomes
//! [`ClientError::AuthenticationFailed`] and any other non-2xx becomes
//! [`ClientError::RequestFailed`] with the server's `detail` when present.

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::dto::*;
use super::error::{ClientError, ClientResult};
use super::session::Session;

/// Outreach API client bound to one session
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    session: Session,
}

impl ApiClient {
    /// Create a new client for the given session
    pub fn new(session: Session, request_timeout: Duration) -> ClientResult<Self> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self { client, session })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Exchange credentials for an access token.
    ///
    /// Runs before a session exists, so it takes the base URL directly.
    pub async fn login(
        base_url: &str,
        request_timeout: Duration,
        username: &str,
        password: &str,
    ) -> ClientResult<LoginResponse> {
        let client = Client::builder().timeout(request_timeout).build()?;
        let url = format!("{}/login", base_url.trim_end_matches('/'));

        let response = client
            .post(&url)
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;

        // A 401 here means bad credentials, not an expired session
        if response.status() == StatusCode::UNAUTHORIZED {
            let message = error_detail(response)
                .await
                .unwrap_or_else(|| "Invalid email or password".to_string());
            return Err(ClientError::RequestFailed {
                status: 401,
                message,
            });
        }

        let response = check_response(response, "Login failed").await?;
        decode(response).await
    }

    // ============================================
    // Leads
    // ============================================

    /// Most recent unsent leads
    pub async fn unsent_leads(&self, limit: u32) -> ClientResult<Vec<Lead>> {
        self.get_json(
            &format!("/leads?limit={}&sent=false", limit),
            "Failed to fetch leads",
        )
        .await
    }

    /// Number of leads that have not been mailed yet
    pub async fn unsent_lead_count(&self) -> ClientResult<u64> {
        let count: LeadCount = self
            .get_json("/leads/count?sent=false", "Failed to fetch lead count")
            .await?;
        Ok(count.count)
    }

    /// Create one lead from the manual entry form
    pub async fn add_lead(&self, lead: &NewLead) -> ClientResult<Lead> {
        lead.validate()?;
        self.post_json("/leads/manual", lead, "Failed to add lead")
            .await
    }

    // ============================================
    // Jobs
    // ============================================

    /// Start a map scrape; `endpoint` is `/scrape-google-maps` or `/scrape-bing-maps`
    pub async fn start_scrape(
        &self,
        endpoint: &str,
        request: &ScrapeRequest,
    ) -> ClientResult<ScrapeStarted> {
        self.post_json(endpoint, request, "Failed to start scraping")
            .await
    }

    /// Queue a bulk send
    pub async fn send_emails(&self, request: &SendEmailsRequest) -> ClientResult<SendEmailsResponse> {
        self.post_json("/send-emails", request, "Failed to send emails")
            .await
    }

    // ============================================
    // Templates
    // ============================================

    pub async fn templates(&self) -> ClientResult<Vec<Template>> {
        self.get_json("/templates", "Failed to load templates").await
    }

    pub async fn create_template(&self, template: &NewTemplate) -> ClientResult<Template> {
        self.post_json("/templates", template, "Failed to create template")
            .await
    }

    /// Ask the API to rewrite a template body; returns the new text
    pub async fn rephrase_email(&self, request: &RephraseRequest) -> ClientResult<String> {
        let value: serde_json::Value = self
            .post_json("/rephrase-email", request, "Rephrasing failed")
            .await?;
        extract_rephrased(value)
    }

    // ============================================
    // Email accounts
    // ============================================

    pub async fn email_accounts(&self) -> ClientResult<Vec<EmailAccount>> {
        self.get_json("/email-accounts", "Failed to load email accounts")
            .await
    }

    pub async fn add_email_account(&self, account: &NewEmailAccount) -> ClientResult<EmailAccount> {
        account.validate()?;
        self.post_json("/email-accounts", account, "Failed to add email account")
            .await
    }

    /// Reset the daily sent counter of one account
    pub async fn reset_email_account(&self, account_id: &str) -> ClientResult<()> {
        let path = format!("/email-accounts/{}/reset", urlencoding::encode(account_id));
        let request = self.client.post(self.session.url(&path));
        self.send(request, &path, "Failed to reset account").await?;
        Ok(())
    }

    // ============================================
    // Replies and analytics
    // ============================================

    pub async fn unread_emails(&self) -> ClientResult<Vec<UnreadEmail>> {
        self.get_json("/unread-emails", "Failed to check for replies")
            .await
    }

    pub async fn daily_stats(&self, days: u32) -> ClientResult<Vec<DailyStat>> {
        self.get_json(
            &format!("/analytics/daily-stats?days={}", days),
            "Failed to fetch daily stats",
        )
        .await
    }

    pub async fn analytics_summary(&self) -> ClientResult<AnalyticsSummary> {
        self.get_json("/analytics/summary", "Failed to fetch summary")
            .await
    }

    // ============================================
    // Plumbing
    // ============================================

    async fn get_json<T: DeserializeOwned>(&self, path: &str, context: &str) -> ClientResult<T> {
        let request = self.client.get(self.session.url(path));
        let response = self.send(request, path, context).await?;
        decode(response).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        context: &str,
    ) -> ClientResult<T> {
        let request = self.client.post(self.session.url(path)).json(body);
        let response = self.send(request, path, context).await?;
        decode(response).await
    }

    async fn send(
        &self,
        request: RequestBuilder,
        path: &str,
        context: &str,
    ) -> ClientResult<Response> {
        let response = request
            .header(reqwest::header::AUTHORIZATION, self.session.bearer())
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(path, error = %e, "Outreach API unreachable");
                ClientError::Network(e)
            })?;

        tracing::debug!(path, status = response.status().as_u16(), "Outreach API response");
        check_response(response, context).await
    }
}

/// Map a response to an error unless it is 2xx
async fn check_response(response: Response, context: &str) -> ClientResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::UNAUTHORIZED {
        return Err(ClientError::AuthenticationFailed);
    }

    let message = error_detail(response)
        .await
        .unwrap_or_else(|| format!("{}: {}", context, status_text(status)));

    Err(ClientError::RequestFailed {
        status: status.as_u16(),
        message,
    })
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<serde_json::Value>,
}

/// The server's `detail` string, if the body carries one
async fn error_detail(response: Response) -> Option<String> {
    let body: ErrorBody = response.json().await.ok()?;
    match body.detail? {
        serde_json::Value::String(detail) if !detail.is_empty() => Some(detail),
        _ => None,
    }
}

fn status_text(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| status.as_u16().to_string())
}

async fn decode<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Pull the rewritten text out of whichever shape the API answers with
fn extract_rephrased(value: serde_json::Value) -> ClientResult<String> {
    match value {
        serde_json::Value::String(text) => Ok(text),
        serde_json::Value::Object(map) => ["rephrased_content", "content", "rephrased"]
            .iter()
            .find_map(|key| map.get(*key).and_then(|v| v.as_str()))
            .map(str::to_string)
            .ok_or_else(|| ClientError::Decode("rephrase response has no content".to_string())),
        other => Err(ClientError::Decode(format!(
            "unexpected rephrase response: {}",
            other
        ))),
    }
}
