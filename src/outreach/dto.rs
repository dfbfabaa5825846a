//! Request/Response DTOs
//!
//! Wire types for the outreach API. Field names match the JSON the API
//! produces and accepts.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::error::{ClientError, ClientResult};

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
});

/// Check an address the way the lead and account forms do
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

// ============================================
// Leads
// ============================================

/// A scraped or manually added business contact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub contact_number: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub owner_name: Option<String>,
    #[serde(default)]
    pub mail_sent: bool,
}

impl Lead {
    /// Leads without a usable address are never sent to
    pub fn has_email(&self) -> bool {
        self.email
            .as_deref()
            .map(|e| !e.trim().is_empty())
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LeadCount {
    pub count: u64,
}

/// Body of `POST /leads/manual`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NewLead {
    pub company_name: String,
    pub contact_number: String,
    pub email: String,
    pub owner_name: String,
}

impl NewLead {
    pub fn validate(&self) -> ClientResult<()> {
        if self.company_name.trim().is_empty() && self.email.trim().is_empty() {
            return Err(ClientError::Validation(
                "Please provide at least a company name or email".to_string(),
            ));
        }
        if !self.email.is_empty() && !is_valid_email(&self.email) {
            return Err(ClientError::Validation(
                "Please enter a valid email address".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================
// Scraping
// ============================================

/// Body of `POST /scrape-google-maps` and `POST /scrape-bing-maps`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScrapeRequest {
    pub query: String,
    pub max_businesses: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScrapeStarted {
    #[serde(default)]
    pub message: String,
}

// ============================================
// Sending
// ============================================

/// A base64-encoded PDF attached to every email of a send
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub filename: String,
    pub content: String,
}

/// Body of `POST /send-emails`
#[derive(Debug, Clone, Serialize)]
pub struct SendEmailsRequest {
    pub template_id: String,
    pub lead_ids: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_account_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendEmailsResponse {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

impl SendEmailsResponse {
    pub fn is_queued(&self) -> bool {
        self.status == "queued"
    }
}

// ============================================
// Templates
// ============================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    pub subject: String,
    pub content: String,
}

/// Body of `POST /templates`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewTemplate {
    pub name: String,
    pub subject: String,
    pub content: String,
}

impl NewTemplate {
    /// Draft a template from a free-text description.
    ///
    /// `existing` is the number of templates already defined; the draft is
    /// named after the next free slot.
    pub fn from_prompt(prompt: &str, existing: usize) -> ClientResult<Self> {
        if prompt.trim().is_empty() {
            return Err(ClientError::Validation(
                "Please describe the template".to_string(),
            ));
        }

        let topic: String = prompt.chars().take(20).collect();
        Ok(Self {
            name: format!("Custom {}", existing + 1),
            subject: format!("Regarding {}", topic),
            content: format!("Hi {{First Name}},\n\n{}\n\nBest,\nYour Team", prompt),
        })
    }
}

/// Body of `POST /rephrase-email`
#[derive(Debug, Clone, Serialize)]
pub struct RephraseRequest {
    pub template_id: String,
    pub content: String,
}

// ============================================
// Email accounts
// ============================================

/// A sender mailbox the API rotates through
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAccount {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub sender_name: Option<String>,
    #[serde(default)]
    pub daily_limit: u32,
    #[serde(default)]
    pub emails_sent_today: u32,
    #[serde(default)]
    pub is_active: bool,
}

/// Body of `POST /email-accounts`
#[derive(Debug, Clone, Default, Serialize)]
pub struct NewEmailAccount {
    pub email: String,
    pub password: String,
    pub sender_name: String,
    pub daily_limit: u32,
}

impl NewEmailAccount {
    pub fn validate(&self) -> ClientResult<()> {
        if self.email.trim().is_empty() || self.password.is_empty() {
            return Err(ClientError::Validation(
                "Email address and app password are required".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================
// Replies and analytics
// ============================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadEmail {
    #[serde(default)]
    pub sender_email: String,
    #[serde(default)]
    pub recipient_email: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub preview: String,
    #[serde(default)]
    pub time: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyStat {
    pub date: String,
    #[serde(default)]
    pub leads: u64,
    #[serde(default)]
    pub emails_sent: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsSummary {
    #[serde(default)]
    pub total_leads: u64,
    #[serde(default)]
    pub total_emails_sent: u64,
    #[serde(default)]
    pub unsent_leads: u64,
}

// ============================================
// Auth
// ============================================

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "bearer".to_string()
}
