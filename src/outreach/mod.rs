//! Outreach API
//!
//! Client side of the lead-generation and outreach REST API.
//!
//! ## Architecture
//!
//! - **Session**: base URL and bearer token, resolved once per process
//! - **ApiClient**: one method per endpoint, error mapping in one place
//! - **DTOs**: wire types for leads, templates, accounts and analytics

mod client;
mod dto;
mod error;
mod session;

pub use client::ApiClient;
pub use dto::{
    is_valid_email, AnalyticsSummary, Attachment, DailyStat, EmailAccount, Lead, LeadCount,
    LoginResponse, NewEmailAccount, NewLead, NewTemplate, RephraseRequest, ScrapeRequest,
    ScrapeStarted, SendEmailsRequest, SendEmailsResponse, Template, UnreadEmail,
};
pub use error::{ClientError, ClientResult};
pub use session::{Session, StoredToken, TokenStore};
