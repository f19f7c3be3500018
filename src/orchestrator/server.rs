//! Stdio request loop.
//!
//! Reads one JSON request per line from stdin and writes one JSON
//! response per line to stdout. Logging goes to stderr, keeping stdout a
//! pure response channel.

use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error, info};

use super::dispatch::DispatchRequest;
use super::SharedState;

/// Line-delimited JSON server over stdio.
pub struct EngineServer {
    state: SharedState,
}

impl EngineServer {
    /// Create a new server
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }

    /// Run the request loop until stdin reaches EOF.
    pub async fn run(&self) -> std::io::Result<()> {
        let stdin = tokio::io::stdin();
        let mut stdout = tokio::io::stdout();
        let mut reader = BufReader::new(stdin);
        let mut line = String::new();

        loop {
            line.clear();
            let bytes_read = reader.read_line(&mut line).await?;

            if bytes_read == 0 {
                info!("EOF received, shutting down");
                break;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            debug!(request = %trimmed, "Received request");

            let response = match serde_json::from_str::<DispatchRequest>(trimmed) {
                Ok(request) => serde_json::to_value(self.state.dispatch(request).await)?,
                Err(e) => {
                    error!(error = %e, "Failed to parse request line");
                    json!({
                        "success": false,
                        "error": {
                            "kind": "validation",
                            "message": format!("invalid request: {}", e),
                            "retryable": false,
                        }
                    })
                }
            };

            let response_json = serde_json::to_string(&response)?;
            debug!(response = %response_json, "Sending response");

            stdout.write_all(response_json.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }

        Ok(())
    }
}
