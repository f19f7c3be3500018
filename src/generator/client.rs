use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use async_trait::async_trait;

use super::types::{GenerateRequest, GenerateResponse};
use super::TextGenerator;
use crate::config::{GeneratorConfig, RequestConfig};
use crate::error::{GeneratorError, GeneratorResult};

/// HTTP client for the text generation API
#[derive(Clone)]
pub struct HttpGenerator {
    client: Client,
    base_url: String,
    api_key: String,
    request_config: RequestConfig,
}

impl HttpGenerator {
    /// Create a new generator client
    pub fn new(config: &GeneratorConfig, request_config: RequestConfig) -> GeneratorResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(GeneratorError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            request_config,
        })
    }

    /// Get the base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Execute a single request (internal)
    async fn execute_request(&self, request: &GenerateRequest) -> GeneratorResult<GenerateResponse> {
        let url = format!("{}/v1/generate", self.base_url);

        debug!(
            model = %request.model,
            messages = request.messages.len(),
            "Calling text generator"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GeneratorError::Timeout {
                        timeout_ms: self.request_config.timeout_ms,
                    }
                } else {
                    GeneratorError::Http(e)
                }
            })?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(GeneratorError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        let generate_response: GenerateResponse =
            response
                .json()
                .await
                .map_err(|e| GeneratorError::InvalidResponse {
                    message: format!("Failed to parse response: {}", e),
                })?;

        Ok(generate_response)
    }
}

/// Transient failures are worth one more attempt; caller bugs are not.
fn is_transient(error: &GeneratorError) -> bool {
    match error {
        GeneratorError::Timeout { .. } | GeneratorError::Http(_) => true,
        GeneratorError::Api { status, .. } => *status == 429 || *status >= 500,
        GeneratorError::Unavailable { .. } => true,
        GeneratorError::InvalidResponse { .. } => false,
    }
}

#[async_trait]
impl TextGenerator for HttpGenerator {
    async fn generate(&self, request: GenerateRequest) -> GeneratorResult<GenerateResponse> {
        let model = request.model.clone();

        let mut last_error = None;
        let mut retries = 0;

        while retries <= self.request_config.max_retries {
            if retries > 0 {
                let delay = Duration::from_millis(
                    self.request_config.retry_delay_ms * (2_u64.pow(retries - 1)),
                );
                warn!(
                    model = %model,
                    retry = retries,
                    delay_ms = delay.as_millis(),
                    "Retrying generator request"
                );
                tokio::time::sleep(delay).await;
            }

            let start = Instant::now();

            match self.execute_request(&request).await {
                Ok(response) => {
                    let latency = start.elapsed();
                    info!(
                        model = %model,
                        latency_ms = latency.as_millis(),
                        "Generator call succeeded"
                    );
                    return Ok(response);
                }
                Err(e) => {
                    let latency = start.elapsed();
                    error!(
                        model = %model,
                        error = %e,
                        latency_ms = latency.as_millis(),
                        retry = retries,
                        "Generator call failed"
                    );
                    if !is_transient(&e) {
                        return Err(e);
                    }
                    last_error = Some(e);
                    retries += 1;
                }
            }
        }

        Err(GeneratorError::Unavailable {
            message: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string()),
            retries,
        })
    }
}
