//! Server Configuration
//!
//! Defines the configuration for the Testing Farm MCP server:
//! - Remote API and artifact locations, credential and timeouts
//! - Failure analysis tuning (markers, context window, fetch limits)
//! - Transport selection (stdio or HTTP/SSE)
//!
//! Values are assembled once by the binary and handed to constructors;
//! nothing in the library reads the process environment.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::FarmError;

pub const DEFAULT_API_URL: &str = "https://api.testing-farm.io/v0.1";
pub const DEFAULT_ARTIFACTS_URL: &str = "https://artifacts.dev.testing-farm.io";

/// Complete server configuration
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    pub farm: FarmConfig,
    pub analysis: AnalysisConfig,
    pub transport: TransportConfig,
}

/// Testing Farm access configuration
#[derive(Clone)]
pub struct FarmConfig {
    /// API base URL, without trailing slash
    pub api_url: String,
    /// Artifact server base URL, without trailing slash
    pub artifacts_url: String,
    /// Bearer token for the API
    pub api_token: Option<String>,
    /// Whole-request timeout
    pub request_timeout: Duration,
    /// TCP connect timeout
    pub connect_timeout: Duration,
}

impl FarmConfig {
    pub fn new(api_url: impl Into<String>, artifacts_url: impl Into<String>) -> Self {
        Self {
            api_url: trim_base(api_url.into()),
            artifacts_url: trim_base(artifacts_url.into()),
            ..Default::default()
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.api_token = token.filter(|t| !t.trim().is_empty());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// URL of a single request on the API
    pub fn request_url(&self, job_id: &str) -> String {
        format!("{}/requests/{}", self.api_url, job_id)
    }

    /// Fallback artifact directory when the job record does not carry one
    pub fn artifacts_dir(&self, job_id: &str) -> String {
        format!("{}/{}", self.artifacts_url, job_id)
    }

    /// Whether the credential may be sent to this URL
    pub fn is_api_url(&self, url: &str) -> bool {
        url.strip_prefix(self.api_url.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with(['/', '?']))
    }
}

impl Default for FarmConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            artifacts_url: DEFAULT_ARTIFACTS_URL.to_string(),
            api_token: None,
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

// Keeps the token out of logs.
impl fmt::Debug for FarmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FarmConfig")
            .field("api_url", &self.api_url)
            .field("artifacts_url", &self.artifacts_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .field("request_timeout", &self.request_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

/// Failure analysis tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Generic abnormal-termination tokens, matched as whole words, case-insensitive
    pub markers: Vec<String>,
    /// Lines of context kept on each side of the marker line
    pub context_lines: usize,
    /// Log names containing one of these are scanned first
    pub priority_log_hints: Vec<String>,
    /// Maximum logs fetched per failed test
    pub max_logs_per_test: usize,
    /// Maximum failed tests whose logs are inspected
    pub max_tests_inspected: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            markers: [
                "error",
                "fatal",
                "traceback",
                "exception",
                "failed",
                "failure",
                "panic",
                "abort",
                "aborted",
                "panicked",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            context_lines: 3,
            priority_log_hints: ["output", "testout", "failures", "error", "console"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_logs_per_test: 4,
            max_tests_inspected: 5,
        }
    }
}

/// How the tool surface is exposed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// JSON-RPC over stdin/stdout for a single client process
    #[default]
    Stdio,
    /// HTTP listener with server-sent events for many clients
    Sse,
}

impl FromStr for TransportMode {
    type Err = FarmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stdio" => Ok(TransportMode::Stdio),
            "sse" | "http" => Ok(TransportMode::Sse),
            other => Err(FarmError::Config(format!(
                "unknown transport '{}', expected 'stdio' or 'sse'",
                other
            ))),
        }
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportMode::Stdio => write!(f, "stdio"),
            TransportMode::Sse => write!(f, "sse"),
        }
    }
}

/// Transport configuration
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub mode: TransportMode,
    /// Listen host for SSE mode
    pub host: String,
    /// Listen port for SSE mode
    pub port: u16,
}

impl TransportConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            mode: TransportMode::Stdio,
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}
