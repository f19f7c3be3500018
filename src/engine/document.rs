//! Specification document composition.
//!
//! Renders the recorded facts into a prose specification via the
//! generator. The document is returned to the caller, not persisted;
//! storing rendered artifacts is surrounding-application territory.

use serde::{Deserialize, Serialize};
use tracing::info;

use super::core::EngineCore;
use crate::config::{CategoryConfig, Config};
use crate::error::{EngineError, EngineResult, StorageError};
use crate::generator::{GenerateRequest, Message};
use crate::prompts::DOCUMENT_GENERATION_PROMPT;
use crate::storage::FactStore;

/// Input parameters for document generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateDocumentParams {
    pub project_id: String,
}

/// A generated specification document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentResult {
    pub project_id: String,
    pub document: String,
    pub fact_count: usize,
}

/// Document composition handler
#[derive(Clone)]
pub struct DocumentComposer {
    core: EngineCore,
    categories: CategoryConfig,
    model: String,
}

impl DocumentComposer {
    /// Create a new composer
    pub fn new(core: EngineCore, config: &Config) -> Self {
        Self {
            categories: config.categories.clone(),
            model: config.generator.model.clone(),
            core,
        }
    }

    /// Compose a specification document from a project's live facts.
    pub async fn generate(&self, params: GenerateDocumentParams) -> EngineResult<DocumentResult> {
        if self
            .core
            .storage()
            .get_project(&params.project_id)
            .await?
            .is_none()
        {
            return Err(EngineError::Storage(StorageError::ProjectNotFound {
                project_id: params.project_id.clone(),
            }));
        }

        let facts = self.core.storage().list_live_facts(&params.project_id).await?;

        // Group facts in configuration order so the document sections are
        // stable across runs.
        let mut sections = Vec::new();
        for spec in self.categories.all() {
            let lines: Vec<String> = facts
                .iter()
                .filter(|f| f.category == spec.name)
                .map(|f| format!("- {}: {}", f.key, f.value))
                .collect();
            if !lines.is_empty() {
                sections.push(format!("{}:\n{}", spec.name, lines.join("\n")));
            }
        }

        let user = if sections.is_empty() {
            "No facts recorded yet.".to_string()
        } else {
            format!("Recorded facts by category:\n\n{}", sections.join("\n\n"))
        };

        let request = GenerateRequest::new(
            &self.model,
            vec![
                Message::system(DOCUMENT_GENERATION_PROMPT),
                Message::user(user),
            ],
        )
        .plain_text();

        let response = self.core.generator().generate(request).await?;

        info!(
            project_id = %params.project_id,
            facts = facts.len(),
            chars = response.completion.len(),
            "Specification document generated"
        );

        Ok(DocumentResult {
            project_id: params.project_id,
            document: response.completion,
            fact_count: facts.len(),
        })
    }
}
