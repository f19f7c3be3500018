//! Guided question planning.
//!
//! Targets the categories with the weakest coverage and asks the
//! generator for one question per category. Malformed generator output
//! degrades to a deterministic fallback question per category instead of
//! failing the request.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::core::EngineCore;
use super::maturity::MaturityCalculator;
use crate::config::Config;
use crate::error::{EngineError, EngineResult, StorageError};
use crate::generator::{GenerateRequest, GeneratedQuestion, Message, QuestionSet};
use crate::prompts::QUESTION_GENERATION_PROMPT;
use crate::storage::FactStore;

fn default_count() -> usize {
    3
}

/// Input parameters for question planning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NextQuestionsParams {
    pub project_id: String,
    /// How many categories to target.
    #[serde(default = "default_count")]
    pub count: usize,
}

/// Planned questions for a project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionsResult {
    pub project_id: String,
    pub targeted_categories: Vec<String>,
    pub questions: Vec<GeneratedQuestion>,
}

/// Question planning handler
#[derive(Clone)]
pub struct QuestionPlanner {
    core: EngineCore,
    maturity: MaturityCalculator,
    model: String,
}

impl QuestionPlanner {
    /// Create a new planner
    pub fn new(core: EngineCore, config: &Config) -> Self {
        Self {
            maturity: MaturityCalculator::new(core.storage().clone(), config),
            model: config.generator.model.clone(),
            core,
        }
    }

    /// Plan the next discovery questions for a project.
    pub async fn next(&self, params: NextQuestionsParams) -> EngineResult<QuestionsResult> {
        if params.count == 0 {
            return Err(EngineError::Validation {
                field: "count".to_string(),
                reason: "count must be at least 1".to_string(),
            });
        }

        let facts = self.core.storage().list_live_facts(&params.project_id).await?;
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

        let report = self.maturity.report_from_facts(&facts);

        // Weakest coverage first; weight breaks ties so the important
        // categories surface earlier.
        let targets: Vec<String> = self
            .maturity
            .gaps(&report)
            .into_iter()
            .take(params.count)
            .map(|gap| gap.category)
            .collect();

        if targets.is_empty() {
            return Ok(QuestionsResult {
                project_id: params.project_id,
                targeted_categories: Vec::new(),
                questions: Vec::new(),
            });
        }

        let known: Vec<String> = facts
            .iter()
            .map(|f| format!("- {}/{}: {}", f.category, f.key, f.value))
            .collect();

        let user = format!(
            "Categories needing coverage: {}\n\nKnown facts:\n{}",
            targets.join(", "),
            if known.is_empty() {
                "(none yet)".to_string()
            } else {
                known.join("\n")
            }
        );

        let request = GenerateRequest::new(
            &self.model,
            vec![
                Message::system(QUESTION_GENERATION_PROMPT),
                Message::user(user),
            ],
        );

        let response = self.core.generator().generate(request).await?;

        let questions: Vec<GeneratedQuestion> = match QuestionSet::from_completion(&response.completion) {
            Some(set) if !set.questions.is_empty() => set
                .questions
                .into_iter()
                .filter(|q| targets.contains(&q.category))
                .collect(),
            _ => {
                warn!(
                    project_id = %params.project_id,
                    "Question generation unparseable, using fallback questions"
                );
                targets
                    .iter()
                    .map(|category| GeneratedQuestion {
                        category: category.clone(),
                        question: fallback_question(category),
                    })
                    .collect()
            }
        };

        info!(
            project_id = %params.project_id,
            targets = targets.len(),
            questions = questions.len(),
            "Questions planned"
        );

        Ok(QuestionsResult {
            project_id: params.project_id,
            targeted_categories: targets,
            questions,
        })
    }
}

/// Deterministic per-category question used when the generator output
/// cannot be parsed.
fn fallback_question(category: &str) -> String {
    format!(
        "What should be captured about {} for this project?",
        category.replace('_', " ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_question_is_deterministic() {
        assert_eq!(
            fallback_question("team_structure"),
            "What should be captured about team structure for this project?"
        );
        assert_eq!(fallback_question("security"), fallback_question("security"));
    }
}
