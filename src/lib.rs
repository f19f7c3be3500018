//! # Specification Orchestration Engine
//!
//! An engine that turns free-form project answers into a structured,
//! versioned fact base and gates major lifecycle operations on
//! specification maturity.
//!
//! ## Features
//!
//! - **Capability Dispatch**: A closed `(capability, action)` registry
//!   routing requests to typed handlers
//! - **Fact Intake**: LLM-backed extraction of structured facts from
//!   free-form answers, with append-only version chains
//! - **Conflict Detection**: LLM-judged contradiction screening with a
//!   fail-safe fallback when the judge output is unusable
//! - **Maturity Scoring**: Weighted category coverage driving phase
//!   gates at fixed thresholds
//! - **Quality Gate**: Multi-path cost comparison that blocks
//!   irreversible operations over high-severity coverage gaps
//! - **Question Planning**: Gap-targeted discovery questions
//!
//! ## Architecture
//!
//! ```text
//! Client → stdio loop → Dispatch (registry + gate) → Handlers
//!                                ↓
//!                  Text Generator (HTTP)   SQLite (facts, conflicts)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use spec_orchestrator::{Config, EngineState, EngineServer};
//! use spec_orchestrator::generator::HttpGenerator;
//! use spec_orchestrator::storage::SqliteStorage;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let storage = SqliteStorage::new(&config.database).await?;
//!     let generator = HttpGenerator::new(&config.generator, config.request.clone())?;
//!     let state = Arc::new(EngineState::new(config, storage, Arc::new(generator)));
//!     EngineServer::new(state).run().await?;
//!     Ok(())
//! }
//! ```

/// Configuration management for the engine.
pub mod config;
/// Engine components: intake, conflicts, maturity, gate, lifecycle.
pub mod engine;
/// Error types and result aliases for the application.
pub mod error;
/// Text generator client and response parsing.
pub mod generator;
/// Capability registry, dispatch, and the stdio server.
pub mod orchestrator;
/// System prompts for the text generator.
pub mod prompts;
/// SQLite storage layer for persistence.
pub mod storage;

pub use config::Config;
pub use error::{EngineError, EngineResult};
pub use orchestrator::{EngineServer, EngineState, SharedState};
