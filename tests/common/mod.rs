//! Shared helpers for integration tests.

// Each test binary uses a different subset of these helpers.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use spec_orchestrator::config::{
    CategoryConfig, Config, DatabaseConfig, GateConfig, GeneratorConfig, LogFormat, LoggingConfig,
    RequestConfig,
};
use spec_orchestrator::error::{GeneratorError, GeneratorResult};
use spec_orchestrator::generator::{GenerateRequest, GenerateResponse, TextGenerator};
use spec_orchestrator::orchestrator::EngineState;
use spec_orchestrator::storage::SqliteStorage;

/// Create an in-memory storage instance for testing
pub async fn create_test_storage() -> SqliteStorage {
    SqliteStorage::new_in_memory()
        .await
        .expect("Failed to create in-memory storage")
}

/// Configuration with the default category and gate tables.
pub fn test_config() -> Config {
    Config {
        generator: GeneratorConfig {
            api_key: "test_key".to_string(),
            base_url: "http://localhost:9".to_string(),
            model: "openai:gpt-4o-mini".to_string(),
        },
        database: DatabaseConfig {
            path: PathBuf::from(":memory:"),
            max_connections: 1,
        },
        logging: LoggingConfig {
            level: "warn".to_string(),
            format: LogFormat::Pretty,
        },
        request: RequestConfig::default(),
        categories: CategoryConfig::default(),
        gate: GateConfig::default(),
    }
}

/// Configuration with a two-category table sized for easy threshold math:
/// each category caps at 2.0, so one full-confidence fact per category
/// yields an overall score of 50.
pub fn small_config() -> Config {
    let mut config = test_config();
    config.categories = CategoryConfig::from_json(
        r#"[
            {"name": "goals", "weight": 50.0, "cap": 2.0},
            {"name": "requirements", "weight": 50.0, "cap": 2.0}
        ]"#,
    )
    .expect("valid category table");
    config
}

/// Generator stub that replays a fixed queue of completions.
///
/// Panics in `generate` if the queue runs dry, which surfaces as a test
/// failure pointing at an unexpected extra generator call.
pub struct ScriptedGenerator {
    completions: Mutex<VecDeque<String>>,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn new<S: Into<String>>(completions: Vec<S>) -> Self {
        Self {
            completions: Mutex::new(completions.into_iter().map(Into::into).collect()),
            calls: AtomicUsize::new(0),
        }
    }

    /// A generator that must never be called.
    pub fn unused() -> Self {
        Self::new(Vec::<String>::new())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, _request: GenerateRequest) -> GeneratorResult<GenerateResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let completion = self
            .completions
            .lock()
            .expect("script queue poisoned")
            .pop_front();
        match completion {
            Some(completion) => Ok(GenerateResponse {
                completion,
                usage: None,
            }),
            None => panic!("ScriptedGenerator queue exhausted: unexpected generator call"),
        }
    }
}

/// Generator stub that always fails with a transient error.
pub struct FailingGenerator;

#[async_trait]
impl TextGenerator for FailingGenerator {
    async fn generate(&self, _request: GenerateRequest) -> GeneratorResult<GenerateResponse> {
        Err(GeneratorError::Unavailable {
            message: "scripted outage".to_string(),
            retries: 0,
        })
    }
}

/// Wire an engine over in-memory storage and a scripted generator.
pub async fn engine_with(config: Config, generator: Arc<dyn TextGenerator>) -> EngineState {
    let storage = create_test_storage().await;
    EngineState::new(config, storage, generator)
}
