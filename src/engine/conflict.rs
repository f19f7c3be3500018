//! Conflict detection for candidate facts.
//!
//! A candidate is compared against the live fact sharing its identity.
//! Identical values (after normalization) confirm the existing fact;
//! differing values go to the text generator for a structured judgment.
//! The judgment is untrusted output: anything that does not validate
//! against the closed enumerations collapses to a pending medium-severity
//! requirements conflict, so bad generator output can only ever route a
//! fact to human review, never past it.

use tracing::{debug, info, warn};

use super::core::EngineCore;
use crate::config::Config;
use crate::error::EngineResult;
use crate::generator::{ConflictJudgment, GenerateRequest, Message};
use crate::prompts::CONFLICT_JUDGMENT_PROMPT;
use crate::storage::{Conflict, Fact, FactDraft, FactStore};

/// Increment applied to a live fact's confidence when a candidate
/// restates it.
const CONFIRMATION_BOOST: f64 = 0.05;

/// Classification of one candidate fact against the store.
#[derive(Debug, Clone)]
pub enum Finding {
    /// No live fact shares the identity, or the candidate is a
    /// compatible refinement; the write may proceed.
    NoConflict,
    /// The candidate restates the live fact; boost its confidence
    /// in place instead of writing a new version.
    Confirmation {
        fact_id: String,
        boosted_confidence: f64,
    },
    /// The candidate contradicts the live fact.
    Contradiction(Box<Conflict>),
}

/// A finding paired with the live-fact snapshot it was judged against,
/// so callers can re-validate under the write lock.
#[derive(Debug, Clone)]
pub struct Classification {
    pub finding: Finding,
    /// The live fact at snapshot time, if any.
    pub snapshot: Option<Fact>,
}

/// Detects contradictions between candidate and live facts.
#[derive(Clone)]
pub struct ConflictDetector {
    core: EngineCore,
    model: String,
}

impl ConflictDetector {
    /// Create a new detector.
    pub fn new(core: EngineCore, config: &Config) -> Self {
        Self {
            core,
            model: config.generator.model.clone(),
        }
    }

    /// Classify a single candidate against the current live facts.
    ///
    /// Lock-free: callers holding the project write lock must not call
    /// this (the judgment may block on the generator for seconds).
    pub async fn classify(
        &self,
        project_id: &str,
        candidate: &FactDraft,
    ) -> EngineResult<Classification> {
        let live = self
            .core
            .storage()
            .list_live_facts_by_identity(project_id, &candidate.category, &candidate.key)
            .await?;

        let existing = match live.first() {
            // Dominant case: nothing recorded yet for this identity.
            None => {
                return Ok(Classification {
                    finding: Finding::NoConflict,
                    snapshot: None,
                })
            }
            Some(fact) => fact.clone(),
        };

        if live.len() > 1 {
            // The live-identity invariant is violated; newest wins and the
            // rest is a data-integrity problem, not a second conflict.
            warn!(
                project_id = %project_id,
                category = %candidate.category,
                key = %candidate.key,
                live_versions = live.len(),
                "Multiple live facts share one identity; using the newest"
            );
        }

        if normalize(&existing.value) == normalize(&candidate.value) {
            debug!(
                project_id = %project_id,
                fact_id = %existing.id,
                "Candidate confirms existing fact"
            );
            return Ok(Classification {
                finding: Finding::Confirmation {
                    fact_id: existing.id.clone(),
                    boosted_confidence: (existing.confidence + CONFIRMATION_BOOST).min(1.0),
                },
                snapshot: Some(existing),
            });
        }

        let judgment = self.judge(&existing, candidate).await?;

        if !judgment.is_conflict {
            debug!(
                project_id = %project_id,
                fact_id = %existing.id,
                "Candidate judged a refinement, not a conflict"
            );
            return Ok(Classification {
                finding: Finding::NoConflict,
                snapshot: Some(existing),
            });
        }

        info!(
            project_id = %project_id,
            fact_id = %existing.id,
            kind = %judgment.kind,
            severity = %judgment.severity,
            "Contradiction detected"
        );

        let conflict = Conflict::new(
            project_id,
            &existing.id,
            candidate.clone(),
            judgment.kind,
            judgment.severity,
            judgment.explanation,
        );

        Ok(Classification {
            finding: Finding::Contradiction(Box::new(conflict)),
            snapshot: Some(existing),
        })
    }

    /// Classify a batch of candidates and return only the contradictions,
    /// ready to persist. Callers must not write any candidate for which a
    /// conflict is returned.
    pub async fn detect(
        &self,
        project_id: &str,
        candidates: &[FactDraft],
    ) -> EngineResult<Vec<Conflict>> {
        let mut conflicts = Vec::new();
        for candidate in candidates {
            if let Finding::Contradiction(conflict) =
                self.classify(project_id, candidate).await?.finding
            {
                conflicts.push(*conflict);
            }
        }
        Ok(conflicts)
    }

    /// Ask the generator whether the pair contradicts.
    async fn judge(
        &self,
        existing: &Fact,
        candidate: &FactDraft,
    ) -> EngineResult<ConflictJudgment> {
        let user = format!(
            "Attribute: {}/{}\nExisting value: {}\nExisting confidence: {:.2}\nCandidate value: {}\nCandidate confidence: {:.2}",
            existing.category,
            existing.key,
            existing.value,
            existing.confidence,
            candidate.value,
            candidate.confidence,
        );

        let request = GenerateRequest::new(
            &self.model,
            vec![Message::system(CONFLICT_JUDGMENT_PROMPT), Message::user(user)],
        );

        let response = self.core.generator().generate(request).await?;
        Ok(ConflictJudgment::from_completion(&response.completion))
    }
}

/// Case- and whitespace-insensitive comparison form.
pub fn normalize(value: &str) -> String {
    value
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_case_and_whitespace() {
        assert_eq!(normalize("  PostgreSQL  "), "postgresql");
        assert_eq!(normalize("Event   Driven\tArchitecture"), "event driven architecture");
        assert_eq!(normalize("MySQL"), normalize("mysql"));
        assert_ne!(normalize("MySQL"), normalize("PostgreSQL"));
    }
}
