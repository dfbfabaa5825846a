//! Outreach API error types
//!
//! Every failure a dashboard view can hit, from a missing token to a poll
//! loop that ran out of attempts.

use thiserror::Error;

/// Errors that can occur when talking to the outreach API
#[derive(Error, Debug)]
pub enum ClientError {
    /// No bearer token in the environment or the token file
    #[error("No authentication token found. Please log in.")]
    MissingAuthToken,

    /// The API answered 401
    #[error("Authentication failed. Please log in again.")]
    AuthenticationFailed,

    /// Rejected client-side before any request was made
    #[error("{0}")]
    Validation(String),

    /// Any other non-2xx response
    #[error("{message}")]
    RequestFailed { status: u16, message: String },

    /// The request never produced a response
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A poll loop used its whole attempt budget
    #[error("Gave up waiting for the job after {attempts} progress checks")]
    PollTimeout { attempts: u32 },

    /// The trigger already has a job running
    #[error("A job is already in progress")]
    JobInFlight,

    /// Response body did not match the expected shape
    #[error("Unexpected response: {0}")]
    Decode(String),

    /// Local file access (token file, attachments)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// True for errors that a fresh login would fix
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            ClientError::MissingAuthToken | ClientError::AuthenticationFailed
        )
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Decode(err.to_string())
    }
}

/// Result type alias for outreach API operations
pub type ClientResult<T> = Result<T, ClientError>;
