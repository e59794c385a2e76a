//! Line-delimited JSON-RPC over stdin/stdout
//!
//! One message per line in each direction. Logs go to stderr so stdout
//! stays a clean protocol stream.

use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info};

use super::handler::McpHandler;

/// Serve a single client until its input closes.
pub async fn serve<R, W>(handler: Arc<McpHandler>, reader: R, mut writer: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(response) = handler.handle_message(line).await {
            let mut out = response.to_string();
            out.push('\n');
            writer.write_all(out.as_bytes()).await?;
            writer.flush().await?;
        }
    }

    debug!("Input closed");
    Ok(())
}

pub async fn run_stdio(handler: Arc<McpHandler>) -> std::io::Result<()> {
    info!("Serving MCP over stdio");
    serve(
        handler,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await
}
