//! Text generator collaborator.
//!
//! The engine treats text generation as an opaque external capability:
//! it sends a prompt, expects JSON-shaped text back, and defensively
//! parses whatever arrives. [`HttpGenerator`] is the production client;
//! tests substitute the [`TextGenerator`] trait.

mod client;
mod types;

pub use client::HttpGenerator;
pub use types::{
    ConflictJudgment, ExtractedFacts, GenerateRequest, GenerateResponse, GeneratedQuestion,
    Message, MessageRole, QuestionSet, Usage,
};

use async_trait::async_trait;

use crate::error::GeneratorResult;

/// Opaque prompt-in, text-out collaborator.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate text for the given request.
    async fn generate(&self, request: GenerateRequest) -> GeneratorResult<GenerateResponse>;
}
