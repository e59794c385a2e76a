//! Error taxonomy for Testing Farm access
//!
//! Fetch-level errors (`Auth`, `NotFound`, `Transient`, `InvalidResponse`)
//! abort a tool call and are reported to the caller as text. `PartialData`
//! only ever appears while gathering artifacts for an analysis and is
//! absorbed there.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FarmError>;

#[derive(Debug, Error)]
pub enum FarmError {
    /// Credential missing or rejected by the API
    #[error("Authentication failed: {0}")]
    Auth(String),
    /// The job id is unknown to the service
    #[error("Job not found: {0}")]
    NotFound(String),
    /// Network failure, timeout or a server-side error worth retrying
    #[error("Transient error: {0}")]
    Transient(String),
    /// An artifact could not be retrieved
    #[error("Artifact unavailable: {0}")]
    PartialData(String),
    /// The service answered with something we could not read
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl FarmError {
    /// Whether calling again later has a reasonable chance of succeeding.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FarmError::Transient(_))
    }

    /// Message shown to the assistant, with a hint on what to do next.
    pub fn user_message(&self) -> String {
        match self {
            FarmError::Auth(reason) => format!(
                "Authentication with Testing Farm failed ({}). \
                 Set TESTING_FARM_API_TOKEN to a valid API token and restart the server.",
                reason
            ),
            FarmError::NotFound(job_id) => format!(
                "Job {} was not found on Testing Farm. Check that the request id is correct.",
                job_id
            ),
            FarmError::Transient(reason) => format!(
                "Testing Farm could not be reached ({}). This is usually temporary, try again in a moment.",
                reason
            ),
            FarmError::PartialData(reason) => format!("Artifact unavailable: {}", reason),
            FarmError::InvalidResponse(reason) => {
                format!("Testing Farm returned an unexpected response: {}", reason)
            }
            FarmError::Config(reason) => format!("Server misconfigured: {}", reason),
        }
    }
}

impl From<reqwest::Error> for FarmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FarmError::Transient(format!("request timed out: {}", err))
        } else if err.is_connect() || err.is_request() {
            FarmError::Transient(format!("connection failed: {}", err))
        } else if err.is_decode() || err.is_body() {
            FarmError::InvalidResponse(err.to_string())
        } else {
            FarmError::Transient(err.to_string())
        }
    }
}
