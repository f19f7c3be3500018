//! Fact intake: answer extraction, conflict screening, and serialized
//! writes.
//!
//! Writes follow the read-judge-write pattern: candidates are classified
//! against a lock-free snapshot (the generator may block for seconds),
//! then the per-project lock is taken, the identity is re-validated, and
//! only then is the version appended. A lost race retries the whole cycle
//! once before surfacing `ConcurrentModification`.

use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, warn};

use super::conflict::{ConflictDetector, Finding};
use super::core::EngineCore;
use super::maturity::{MaturityCalculator, MaturityReport};
use crate::config::{CategoryConfig, Config};
use crate::error::{EngineError, EngineResult, StorageError};
use crate::generator::{ExtractedFacts, GenerateRequest, Message};
use crate::prompts::FACT_EXTRACTION_PROMPT;
use crate::storage::{
    Conflict, ConflictResolution, ConflictStatus, Fact, FactDraft, FactStore, SqliteStorage,
};

/// Input parameters for answer submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitAnswerParams {
    pub project_id: String,
    /// Free-form answer text to extract facts from.
    pub answer: String,
}

/// Input parameters for a direct structured fact write
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordFactParams {
    pub project_id: String,
    pub fact: FactDraft,
}

/// Input parameters for listing live facts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListFactsParams {
    pub project_id: String,
}

/// Input parameters for conflict resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveConflictParams {
    pub project_id: String,
    pub conflict_id: String,
    pub resolution: ConflictResolution,
    /// Required when resolution is `merge`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged_value: Option<String>,
}

/// A live fact whose confidence was boosted by a restating candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmedFact {
    pub fact_id: String,
    pub confidence: f64,
}

/// A candidate refused because its identity already has pending conflicts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockedFact {
    pub category: String,
    pub key: String,
    pub conflict_ids: Vec<String>,
}

/// Outcome of an intake call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntakeResult {
    pub project_id: String,
    /// Fact versions written.
    pub recorded: Vec<Fact>,
    /// Existing facts confirmed in place.
    pub confirmed: Vec<ConfirmedFact>,
    /// Newly detected conflicts, persisted as pending.
    pub conflicts: Vec<Conflict>,
    /// Candidates refused due to pre-existing pending conflicts.
    pub blocked: Vec<BlockedFact>,
    /// Fresh maturity snapshot, present when anything was written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maturity: Option<MaturityReport>,
}

/// Outcome of resolving a conflict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveResult {
    pub conflict_id: String,
    pub resolution: ConflictResolution,
    /// The superseding version, when the resolution wrote one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub written: Option<Fact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maturity: Option<MaturityReport>,
}

/// Fact intake handler
#[derive(Clone)]
pub struct FactIntake {
    core: EngineCore,
    detector: ConflictDetector,
    maturity: MaturityCalculator,
    categories: CategoryConfig,
    model: String,
}

impl FactIntake {
    /// Create a new intake handler
    pub fn new(core: EngineCore, config: &Config) -> Self {
        Self {
            detector: ConflictDetector::new(core.clone(), config),
            maturity: MaturityCalculator::new(core.storage().clone(), config),
            categories: config.categories.clone(),
            model: config.generator.model.clone(),
            core,
        }
    }

    fn storage(&self) -> &SqliteStorage {
        self.core.storage()
    }

    /// Extract facts from a free-form answer and admit them.
    pub async fn submit_answer(&self, params: SubmitAnswerParams) -> EngineResult<IntakeResult> {
        let start = Instant::now();

        if params.answer.trim().is_empty() {
            return Err(EngineError::Validation {
                field: "answer".to_string(),
                reason: "answer cannot be empty".to_string(),
            });
        }
        self.require_project(&params.project_id).await?;

        let drafts = self.extract(&params.answer).await?;
        let result = self.ingest(&params.project_id, drafts).await?;

        info!(
            project_id = %params.project_id,
            recorded = result.recorded.len(),
            confirmed = result.confirmed.len(),
            conflicts = result.conflicts.len(),
            blocked = result.blocked.len(),
            latency_ms = start.elapsed().as_millis() as i64,
            "Answer processed"
        );

        Ok(result)
    }

    /// Admit a single caller-structured fact.
    pub async fn record(&self, params: RecordFactParams) -> EngineResult<IntakeResult> {
        self.require_project(&params.project_id).await?;
        self.validate_draft(&params.fact)?;
        self.ingest(&params.project_id, vec![params.fact]).await
    }

    /// List all live facts for a project.
    pub async fn list(&self, params: ListFactsParams) -> EngineResult<Vec<Fact>> {
        self.require_project(&params.project_id).await?;
        Ok(self.storage().list_live_facts(&params.project_id).await?)
    }

    /// Apply an explicit decision to a pending conflict.
    pub async fn resolve_conflict(
        &self,
        params: ResolveConflictParams,
    ) -> EngineResult<ResolveResult> {
        let conflict = self
            .storage()
            .get_conflict(&params.conflict_id)
            .await?
            .ok_or_else(|| StorageError::ConflictNotFound {
                conflict_id: params.conflict_id.clone(),
            })?;

        if conflict.project_id != params.project_id {
            return Err(EngineError::Validation {
                field: "conflict_id".to_string(),
                reason: "conflict does not belong to the given project".to_string(),
            });
        }

        if conflict.status != ConflictStatus::Pending {
            return Err(EngineError::Validation {
                field: "conflict_id".to_string(),
                reason: "conflict is already resolved".to_string(),
            });
        }

        let writes = !matches!(params.resolution, ConflictResolution::KeepOld);

        let draft = match params.resolution {
            ConflictResolution::KeepOld => None,
            ConflictResolution::KeepNew => Some(conflict.candidate.clone()),
            ConflictResolution::Merge => {
                let merged = params.merged_value.clone().ok_or_else(|| {
                    EngineError::Validation {
                        field: "merged_value".to_string(),
                        reason: "merge resolution requires a merged_value".to_string(),
                    }
                })?;
                let mut candidate = conflict.candidate.clone();
                candidate.value = merged;
                candidate.source = "merge".to_string();
                Some(candidate)
            }
        };

        // Other pending conflicts on the same identity keep the write
        // refused even after this one resolves.
        if writes {
            let remaining: Vec<String> = self
                .storage()
                .list_pending_conflicts(&params.project_id)
                .await?
                .into_iter()
                .filter(|c| {
                    c.id != conflict.id
                        && c.candidate.category == conflict.candidate.category
                        && c.candidate.key == conflict.candidate.key
                })
                .map(|c| c.id)
                .collect();
            if !remaining.is_empty() {
                return Err(EngineError::ConflictPending {
                    project_id: params.project_id.clone(),
                    conflict_ids: remaining,
                });
            }
        }

        let lock = self.core.project_lock(&params.project_id);
        let _guard = lock.lock().await;

        // Write before flipping the conflict: a failed append must leave
        // the conflict pending and retriable, never resolved-but-unapplied.
        let written = match draft {
            Some(draft) => {
                let fact = Fact::from_draft(&params.project_id, &draft);
                self.storage().append_fact_version(&fact).await?;
                Some(fact)
            }
            None => None,
        };

        self.storage()
            .resolve_conflict(&conflict.id, params.resolution)
            .await?;

        let maturity = if written.is_some() {
            Some(self.maturity.recompute(&params.project_id).await?)
        } else {
            None
        };

        info!(
            project_id = %params.project_id,
            conflict_id = %conflict.id,
            resolution = %params.resolution,
            wrote_version = written.is_some(),
            "Conflict resolved"
        );

        Ok(ResolveResult {
            conflict_id: conflict.id,
            resolution: params.resolution,
            written,
            maturity,
        })
    }

    /// Admit a batch of drafts: screen each candidate, persist conflicts,
    /// and write the clean ones under the project lock.
    async fn ingest(
        &self,
        project_id: &str,
        drafts: Vec<FactDraft>,
    ) -> EngineResult<IntakeResult> {
        let mut recorded = Vec::new();
        let mut confirmed = Vec::new();
        let mut conflicts = Vec::new();
        let mut blocked = Vec::new();

        for draft in drafts {
            // Re-read per candidate: a conflict persisted for an earlier
            // candidate in this batch blocks later ones with the same
            // identity.
            let pending_ids = self
                .pending_for_identity(project_id, &draft.category, &draft.key)
                .await?;

            if !pending_ids.is_empty() {
                blocked.push(BlockedFact {
                    category: draft.category.clone(),
                    key: draft.key.clone(),
                    conflict_ids: pending_ids,
                });
                continue;
            }

            self.admit(
                project_id,
                draft,
                &mut recorded,
                &mut confirmed,
                &mut conflicts,
                &mut blocked,
            )
            .await?;
        }

        let maturity = if !recorded.is_empty() || !confirmed.is_empty() {
            let lock = self.core.project_lock(project_id);
            let _guard = lock.lock().await;
            Some(self.maturity.recompute(project_id).await?)
        } else {
            None
        };

        Ok(IntakeResult {
            project_id: project_id.to_string(),
            recorded,
            confirmed,
            conflicts,
            blocked,
            maturity,
        })
    }

    /// Read-judge-write cycle for one candidate, retried once on a lost
    /// race.
    async fn admit(
        &self,
        project_id: &str,
        draft: FactDraft,
        recorded: &mut Vec<Fact>,
        confirmed: &mut Vec<ConfirmedFact>,
        conflicts: &mut Vec<Conflict>,
        blocked: &mut Vec<BlockedFact>,
    ) -> EngineResult<()> {
        let mut attempts = 0u32;

        loop {
            // Snapshot and judgment happen lock-free.
            let classification = self.detector.classify(project_id, &draft).await?;

            match classification.finding {
                Finding::Contradiction(conflict) => {
                    self.storage().create_conflict(&conflict).await?;
                    conflicts.push(*conflict);
                    return Ok(());
                }
                Finding::Confirmation {
                    fact_id,
                    boosted_confidence,
                } => {
                    let lock = self.core.project_lock(project_id);
                    let _guard = lock.lock().await;

                    // A conflict may have landed between snapshot and lock.
                    let pending_ids = self
                        .pending_for_identity(project_id, &draft.category, &draft.key)
                        .await?;
                    if !pending_ids.is_empty() {
                        blocked.push(BlockedFact {
                            category: draft.category.clone(),
                            key: draft.key.clone(),
                            conflict_ids: pending_ids,
                        });
                        return Ok(());
                    }

                    match self
                        .storage()
                        .boost_confidence(&fact_id, boosted_confidence)
                        .await
                    {
                        Ok(()) => {
                            confirmed.push(ConfirmedFact {
                                fact_id,
                                confidence: boosted_confidence,
                            });
                            return Ok(());
                        }
                        // The confirmed version was superseded between
                        // snapshot and lock; re-judge against the new state.
                        Err(StorageError::FactNotFound { .. }) if attempts == 0 => {
                            attempts += 1;
                            continue;
                        }
                        Err(StorageError::FactNotFound { .. }) => {
                            return Err(self.race_lost(project_id, &draft));
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
                Finding::NoConflict => {
                    let lock = self.core.project_lock(project_id);
                    let _guard = lock.lock().await;

                    let pending_ids = self
                        .pending_for_identity(project_id, &draft.category, &draft.key)
                        .await?;
                    if !pending_ids.is_empty() {
                        blocked.push(BlockedFact {
                            category: draft.category.clone(),
                            key: draft.key.clone(),
                            conflict_ids: pending_ids,
                        });
                        return Ok(());
                    }

                    let current = self
                        .storage()
                        .get_live_fact(project_id, &draft.category, &draft.key)
                        .await?;

                    let unchanged = match (&classification.snapshot, &current) {
                        (None, None) => true,
                        (Some(snapshot), Some(live)) => snapshot.id == live.id,
                        _ => false,
                    };

                    if unchanged {
                        let fact = Fact::from_draft(project_id, &draft);
                        self.storage().append_fact_version(&fact).await?;
                        recorded.push(fact);
                        return Ok(());
                    }

                    if attempts == 0 {
                        attempts += 1;
                        continue;
                    }
                    return Err(self.race_lost(project_id, &draft));
                }
            }
        }
    }

    /// Ids of pending conflicts whose candidate targets the identity.
    async fn pending_for_identity(
        &self,
        project_id: &str,
        category: &str,
        key: &str,
    ) -> EngineResult<Vec<String>> {
        Ok(self
            .storage()
            .list_pending_conflicts(project_id)
            .await?
            .into_iter()
            .filter(|c| c.candidate.category == category && c.candidate.key == key)
            .map(|c| c.id)
            .collect())
    }

    fn race_lost(&self, project_id: &str, draft: &FactDraft) -> EngineError {
        warn!(
            project_id = %project_id,
            category = %draft.category,
            key = %draft.key,
            "Write race lost twice"
        );
        EngineError::ConcurrentModification {
            project_id: project_id.to_string(),
            category: draft.category.clone(),
            key: draft.key.clone(),
        }
    }

    /// Extract fact drafts from a free-form answer via the generator.
    async fn extract(&self, answer: &str) -> EngineResult<Vec<FactDraft>> {
        let allowed: Vec<&str> = self
            .categories
            .all()
            .iter()
            .map(|c| c.name.as_str())
            .collect();

        let user = format!(
            "Allowed categories: {}\n\nAnswer:\n{}",
            allowed.join(", "),
            answer
        );

        let request = GenerateRequest::new(
            &self.model,
            vec![Message::system(FACT_EXTRACTION_PROMPT), Message::user(user)],
        );

        let response = self.core.generator().generate(request).await?;

        let extracted = ExtractedFacts::from_completion(&response.completion).ok_or_else(|| {
            EngineError::Validation {
                field: "answer".to_string(),
                reason: "fact extraction produced no parseable output".to_string(),
            }
        })?;

        // The extractor is untrusted: silently drop facts outside the
        // closed category set or missing identity fields, keep the rest.
        let mut drafts = Vec::new();
        for draft in extracted.facts {
            if self.validate_draft(&draft).is_ok() {
                drafts.push(draft);
            } else {
                warn!(
                    category = %draft.category,
                    key = %draft.key,
                    "Dropping extracted fact outside the closed category set"
                );
            }
        }

        Ok(drafts)
    }

    /// Strict shape check for a draft (used directly for caller-provided
    /// facts, leniently for extractor output).
    fn validate_draft(&self, draft: &FactDraft) -> EngineResult<()> {
        if draft.key.trim().is_empty() {
            return Err(EngineError::Validation {
                field: "fact.key".to_string(),
                reason: "key cannot be empty".to_string(),
            });
        }
        if draft.value.trim().is_empty() {
            return Err(EngineError::Validation {
                field: "fact.value".to_string(),
                reason: "value cannot be empty".to_string(),
            });
        }
        if !self.categories.contains(&draft.category) {
            return Err(EngineError::Validation {
                field: "fact.category".to_string(),
                reason: format!("unknown category: {}", draft.category),
            });
        }
        Ok(())
    }

    async fn require_project(&self, project_id: &str) -> EngineResult<()> {
        self.storage()
            .get_project(project_id)
            .await?
            .ok_or_else(|| {
                EngineError::Storage(StorageError::ProjectNotFound {
                    project_id: project_id.to_string(),
                })
            })?;
        Ok(())
    }
}
