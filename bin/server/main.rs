//! Testing Farm MCP Server
//!
//! Serves the `get_job_status` and `analyze_job` tools over stdio (default)
//! or HTTP/SSE.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use testing_farm_mcp::{
    config::{DEFAULT_API_URL, DEFAULT_ARTIFACTS_URL},
    mcp, AnalysisConfig, FarmConfig, FarmTools, McpHandler, ServerConfig, TransportConfig,
    TransportMode,
};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "testing-farm-mcp")]
#[command(about = "MCP server for Testing Farm job status and failure analysis")]
struct Args {
    /// Testing Farm API base URL
    #[arg(long, default_value = DEFAULT_API_URL, env = "TESTING_FARM_API_URL")]
    api_url: String,

    /// Artifact server base URL
    #[arg(long, default_value = DEFAULT_ARTIFACTS_URL, env = "TESTING_FARM_ARTIFACTS_URL")]
    artifacts_url: String,

    /// API token
    #[arg(long, env = "TESTING_FARM_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,

    /// Request timeout in seconds
    #[arg(long, default_value = "30", env = "TESTING_FARM_TIMEOUT_SECS")]
    timeout_secs: u64,

    /// Transport: stdio or sse
    #[arg(short, long, default_value = "stdio", env = "MCP_TRANSPORT")]
    transport: TransportMode,

    /// Listen host (sse)
    #[arg(long, default_value = "0.0.0.0", env = "MCP_HOST")]
    host: String,

    /// Listen port (sse)
    #[arg(short, long, default_value = "8000", env = "MCP_PORT")]
    port: u16,

    /// Failure markers, comma-separated
    #[arg(long, env = "TF_LOG_MARKERS", value_delimiter = ',')]
    markers: Vec<String>,

    /// Context lines around the marker line
    #[arg(long, default_value = "3", env = "TF_CONTEXT_LINES")]
    context_lines: usize,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        let farm = FarmConfig::new(self.api_url, self.artifacts_url)
            .with_token(self.api_token)
            .with_timeout(Duration::from_secs(self.timeout_secs));

        let mut analysis = AnalysisConfig {
            context_lines: self.context_lines,
            ..Default::default()
        };
        let markers: Vec<String> = self
            .markers
            .into_iter()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();
        if !markers.is_empty() {
            analysis.markers = markers;
        }

        ServerConfig {
            farm,
            analysis,
            transport: TransportConfig {
                mode: self.transport,
                host: self.host,
                port: self.port,
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // stdout belongs to the protocol in stdio mode
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("testing_farm_mcp=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .init();

    let config = Args::parse().into_config();

    info!("Starting Testing Farm MCP Server");
    info!("  API: {}", config.farm.api_url);
    info!("  Artifacts: {}", config.farm.artifacts_url);
    info!("  Transport: {}", config.transport.mode);
    if config.farm.api_token.is_none() {
        warn!("TESTING_FARM_API_TOKEN is not set, requests needing authentication will fail");
    }

    let tools = FarmTools::connect(config.farm.clone(), config.analysis.clone())?;
    let handler = Arc::new(McpHandler::new(Arc::new(tools)));

    match config.transport.mode {
        TransportMode::Stdio => mcp::run_stdio(handler).await?,
        TransportMode::Sse => mcp::run_sse(handler, &config.transport.bind_addr()).await?,
    }

    Ok(())
}
