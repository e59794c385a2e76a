//! Testing Farm MCP Server
//!
//! Exposes Testing Farm job status and failure analysis as MCP tools so an
//! AI assistant can answer "why did my CI run fail?" without anyone opening
//! the artifact browser.
//!
//! ## Module Structure
//!
//! - `farm/`: Testing Farm API and artifact access, job record mapping
//! - `analysis/`: failure diagnosis and log scanning
//! - `report`: plain-text rendering of status and analysis
//! - `tools`: the `get_job_status` and `analyze_job` tools
//! - `mcp/`: JSON-RPC dispatch plus stdio and HTTP/SSE transports

/// Server configuration
pub mod config;

/// Error taxonomy shared by every fetch
pub mod error;

/// Testing Farm API client and data model
pub mod farm;

/// Failure analysis
pub mod analysis;

/// Text reports
pub mod report;

/// Tool definitions and dispatch
pub mod tools;

/// MCP protocol and transports
pub mod mcp;

pub use analysis::{
    Analysis, Excerpt, FailedTest, FailureAnalyzer, FailureDiagnosis, LogScanner, StatusSummary,
    Verdict,
};
pub use config::{AnalysisConfig, FarmConfig, ServerConfig, TransportConfig, TransportMode};
pub use error::{FarmError, Result};
pub use farm::{ArtifactSource, FarmClient, JobRecord, JobResult, JobSource, JobState};
pub use mcp::McpHandler;
pub use tools::{FarmTools, ToolCallError, ToolOutput};
