//! Integration tests for the HTTP generator client
//!
//! Tests HTTP client behavior using wiremock for request/response mocking.

use serde_json::json;
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, ResponseTemplate,
};

use spec_orchestrator::config::{GeneratorConfig, RequestConfig};
use spec_orchestrator::error::GeneratorError;
use spec_orchestrator::generator::{GenerateRequest, HttpGenerator, Message, TextGenerator};

/// Create a test client pointing to the mock server
fn create_test_client(base_url: &str, max_retries: u32) -> HttpGenerator {
    let config = GeneratorConfig {
        api_key: "test-api-key".to_string(),
        base_url: base_url.to_string(),
        model: "openai:gpt-4o-mini".to_string(),
    };

    let request_config = RequestConfig {
        timeout_ms: 5000,
        max_retries,
        retry_delay_ms: 10,
    };

    HttpGenerator::new(&config, request_config).expect("Failed to create client")
}

fn judgment_request() -> GenerateRequest {
    GenerateRequest::new(
        "openai:gpt-4o-mini",
        vec![Message::system("judge"), Message::user("compare values")],
    )
}

#[tokio::test]
async fn test_successful_generate_call() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/generate"))
        .and(header("Authorization", "Bearer test-api-key"))
        .and(header("Content-Type", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "completion": "{\"is_conflict\": false}",
            "usage": {
                "prompt_tokens": 100,
                "completion_tokens": 20,
                "total_tokens": 120
            }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server.uri(), 0);
    let result = client.generate(judgment_request()).await;

    assert!(result.is_ok(), "Generate should succeed: {:?}", result.err());
    let response = result.unwrap();
    assert_eq!(response.completion, "{\"is_conflict\": false}");
    assert_eq!(response.usage.unwrap().total_tokens, Some(120));
}

#[tokio::test]
async fn test_server_error_retries_then_recovers() {
    let mock_server = MockServer::start().await;

    // First attempt fails, retry succeeds.
    Mock::given(method("POST"))
        .and(path("/v1/generate"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "completion": "recovered",
            "usage": null
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server.uri(), 1);
    let result = client.generate(judgment_request()).await;

    assert!(result.is_ok());
    assert_eq!(result.unwrap().completion, "recovered");
}

#[tokio::test]
async fn test_client_error_does_not_retry() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/generate"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server.uri(), 2);
    let result = client.generate(judgment_request()).await;

    match result.unwrap_err() {
        GeneratorError::Api { status, .. } => assert_eq!(status, 401),
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_rate_limit_is_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/generate"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "completion": "after backoff",
            "usage": null
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server.uri(), 1);
    let result = client.generate(judgment_request()).await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn test_exhausted_retries_become_unavailable() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/generate"))
        .respond_with(ResponseTemplate::new(503).set_body_string("down"))
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server.uri(), 1);
    let result = client.generate(judgment_request()).await;

    match result.unwrap_err() {
        GeneratorError::Unavailable { retries, .. } => assert_eq!(retries, 2),
        other => panic!("expected Unavailable, got {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_body_is_invalid_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server.uri(), 1);
    let result = client.generate(judgment_request()).await;

    // Malformed bodies are a contract violation, not a transient fault;
    // no retry happens.
    assert!(matches!(
        result.unwrap_err(),
        GeneratorError::InvalidResponse { .. }
    ));
}
