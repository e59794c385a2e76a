//! Tool surface exposed to MCP clients
//!
//! Two read-only tools:
//! - `get_job_status`: state, result, environment and timestamps of a job
//! - `analyze_job`: success summary, progress, or a failure diagnosis
//!
//! Both always produce text. Fetch errors become an error output with an
//! actionable message rather than a protocol failure.

use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::analysis::FailureAnalyzer;
use crate::config::{AnalysisConfig, FarmConfig};
use crate::error::{FarmError, Result};
use crate::farm::{ArtifactSource, FarmClient, JobSource};
use crate::report;

pub const GET_JOB_STATUS: &str = "get_job_status";
pub const ANALYZE_JOB: &str = "analyze_job";

#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Text result of a tool call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub text: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn text(text: String) -> Self {
        Self {
            text,
            is_error: false,
        }
    }

    pub fn error(err: &FarmError) -> Self {
        Self {
            text: format!("Error: {}", err.user_message()),
            is_error: true,
        }
    }
}

/// Problems with the call itself, reported as JSON-RPC errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ToolCallError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
}

pub struct FarmTools {
    jobs: Arc<dyn JobSource>,
    analyzer: FailureAnalyzer,
}

impl FarmTools {
    pub fn new(
        jobs: Arc<dyn JobSource>,
        artifacts: Arc<dyn ArtifactSource>,
        analysis: AnalysisConfig,
    ) -> Result<Self> {
        Ok(Self {
            jobs,
            analyzer: FailureAnalyzer::new(artifacts, analysis)?,
        })
    }

    /// Wire the tools to a live Testing Farm client.
    pub fn connect(farm: FarmConfig, analysis: AnalysisConfig) -> Result<Self> {
        let client = Arc::new(FarmClient::new(farm)?);
        Self::new(client.clone(), client, analysis)
    }

    pub fn definitions() -> Vec<ToolDefinition> {
        let job_id_schema = json!({
            "type": "object",
            "properties": {
                "job_id": {
                    "type": "string",
                    "description": "The request id of the Testing Farm run"
                }
            },
            "required": ["job_id"]
        });

        vec![
            ToolDefinition {
                name: GET_JOB_STATUS,
                description: "Get basic status information for a Testing Farm job: \
                              state, result, environment and timestamps.",
                input_schema: job_id_schema.clone(),
            },
            ToolDefinition {
                name: ANALYZE_JOB,
                description: "Analyze a Testing Farm job: a summary if it passed, \
                              its progress if it is still running, or the failed tests \
                              and the log lines most likely explaining the failure.",
                input_schema: job_id_schema,
            },
        ]
    }

    /// Dispatch a `tools/call` by name.
    pub async fn call(
        &self,
        name: &str,
        arguments: &Value,
    ) -> std::result::Result<ToolOutput, ToolCallError> {
        match name {
            GET_JOB_STATUS => Ok(self.get_job_status(job_id_argument(arguments)?).await),
            ANALYZE_JOB => Ok(self.analyze_job(job_id_argument(arguments)?).await),
            other => Err(ToolCallError::UnknownTool(other.to_string())),
        }
    }

    pub async fn get_job_status(&self, job_id: &str) -> ToolOutput {
        match self.jobs.fetch_job(job_id).await {
            Ok(job) => ToolOutput::text(report::render_status(&job)),
            Err(e) => {
                warn!(
                    job_id = job_id,
                    error = %e,
                    retryable = e.is_retryable(),
                    "Status lookup failed"
                );
                ToolOutput::error(&e)
            }
        }
    }

    pub async fn analyze_job(&self, job_id: &str) -> ToolOutput {
        let job = match self.jobs.fetch_job(job_id).await {
            Ok(job) => job,
            Err(e) => {
                warn!(
                    job_id = job_id,
                    error = %e,
                    retryable = e.is_retryable(),
                    "Analysis aborted, job unavailable"
                );
                return ToolOutput::error(&e);
            }
        };

        info!(job_id = job_id, state = %job.state, "Analyzing job");
        let analysis = self.analyzer.analyze(job).await;
        ToolOutput::text(report::render_analysis(&analysis))
    }
}

fn job_id_argument(arguments: &Value) -> std::result::Result<&str, ToolCallError> {
    match arguments.get("job_id") {
        Some(Value::String(id)) if !id.trim().is_empty() => Ok(id.trim()),
        Some(Value::String(_)) => Err(ToolCallError::InvalidArguments(
            "job_id must not be empty".to_string(),
        )),
        Some(_) => Err(ToolCallError::InvalidArguments(
            "job_id must be a string".to_string(),
        )),
        None => Err(ToolCallError::InvalidArguments(
            "missing required argument job_id".to_string(),
        )),
    }
}
