use serde::{Deserialize, Serialize};

use crate::storage::{ConflictKind, ConflictSeverity, FactDraft};

/// Message in a generator conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

/// Message role
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl Message {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// Request to the text generation endpoint
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    pub model: String,
    pub messages: Vec<Message>,
    /// Ask the backend for JSON-mode output.
    pub json: bool,
    #[serde(default)]
    pub stream: bool,
}

impl GenerateRequest {
    /// Create a new request with model and messages
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            json: true,
            stream: false,
        }
    }

    /// Request plain-text output instead of JSON mode
    pub fn plain_text(mut self) -> Self {
        self.json = false;
        self
    }
}

/// Response from the text generation endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResponse {
    pub completion: String,
    pub usage: Option<Usage>,
}

/// Token usage information
#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

/// Structured verdict on whether two fact values contradict.
///
/// This is the only non-deterministic branch point in the engine, so the
/// parse is strict: any completion that does not validate against the
/// closed enumerations collapses to the fail-safe verdict (a medium
/// requirements conflict), routing the pair to human review rather than
/// silently auto-merging.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConflictJudgment {
    pub is_conflict: bool,
    pub kind: ConflictKind,
    pub severity: ConflictSeverity,
    #[serde(default)]
    pub explanation: String,
}

impl ConflictJudgment {
    /// Fail-safe verdict used when the generator output cannot be trusted.
    pub fn fail_safe(reason: &str) -> Self {
        Self {
            is_conflict: true,
            kind: ConflictKind::Requirements,
            severity: ConflictSeverity::Medium,
            explanation: format!("unparseable judgment, flagged for review: {}", reason),
        }
    }

    /// Parse a judgment from completion text, falling back to the
    /// fail-safe verdict on any malformed or out-of-enum response.
    pub fn from_completion(completion: &str) -> Self {
        match parse_json_completion::<ConflictJudgment>(completion) {
            Some(judgment) => judgment,
            None => Self::fail_safe(truncate(completion, 120)),
        }
    }
}

/// Facts extracted from a free-form answer.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractedFacts {
    pub facts: Vec<FactDraft>,
}

impl ExtractedFacts {
    /// Parse extracted facts from completion text.
    ///
    /// Returns `None` when the completion is not parseable at all;
    /// a parseable-but-empty fact list is a valid outcome.
    pub fn from_completion(completion: &str) -> Option<Self> {
        let mut extracted = parse_json_completion::<ExtractedFacts>(completion)?;
        for fact in &mut extracted.facts {
            fact.confidence = fact.confidence.clamp(0.0, 1.0);
        }
        Some(extracted)
    }
}

/// A single generated discovery question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedQuestion {
    pub category: String,
    pub question: String,
}

/// Question set returned by the question-generation prompt.
#[derive(Debug, Clone, Deserialize)]
pub struct QuestionSet {
    pub questions: Vec<GeneratedQuestion>,
}

impl QuestionSet {
    /// Parse a question set from completion text; `None` if malformed.
    pub fn from_completion(completion: &str) -> Option<Self> {
        parse_json_completion(completion)
    }
}

/// Try the completion as raw JSON, then as the outermost brace-delimited
/// slice (models like to wrap JSON in prose or code fences).
fn parse_json_completion<T: serde::de::DeserializeOwned>(completion: &str) -> Option<T> {
    let trimmed = completion.trim();
    if let Ok(parsed) = serde_json::from_str::<T>(trimmed) {
        return Some(parsed);
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&trimmed[start..=end]).ok()
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
