//! Project lifecycle: creation, status, and gated phase advancement.

use serde::{Deserialize, Serialize};
use tracing::info;

use super::core::EngineCore;
use super::maturity::{MaturityCalculator, MaturityReport, TransitionDecision};
use crate::config::Config;
use crate::error::{EngineError, EngineResult, StorageError};
use crate::storage::{FactStore, Project, ProjectPhase};

/// Input parameters for project creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProjectParams {
    pub name: String,
}

/// Input parameters for a project status query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectStatusParams {
    pub project_id: String,
}

/// Input parameters for phase advancement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancePhaseParams {
    pub project_id: String,
}

/// Current project status with a fresh maturity snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectStatus {
    pub project: Project,
    pub maturity: MaturityReport,
    pub pending_conflicts: usize,
}

/// Outcome of a phase advancement attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvanceResult {
    pub project_id: String,
    pub advanced: bool,
    pub from: ProjectPhase,
    /// The phase entered on success, or the phase that remains current.
    pub phase: ProjectPhase,
    pub decision: TransitionDecision,
}

/// Project lifecycle handler
#[derive(Clone)]
pub struct ProjectManager {
    core: EngineCore,
    maturity: MaturityCalculator,
}

impl ProjectManager {
    /// Create a new project manager
    pub fn new(core: EngineCore, config: &Config) -> Self {
        Self {
            maturity: MaturityCalculator::new(core.storage().clone(), config),
            core,
        }
    }

    /// Create a project in the discovery phase.
    pub async fn create(&self, params: CreateProjectParams) -> EngineResult<Project> {
        if params.name.trim().is_empty() {
            return Err(EngineError::Validation {
                field: "name".to_string(),
                reason: "name cannot be empty".to_string(),
            });
        }

        let project = Project::new(params.name.trim());
        self.core.storage().create_project(&project).await?;

        info!(project_id = %project.id, name = %project.name, "Project created");
        Ok(project)
    }

    /// Current phase, fresh maturity snapshot, and pending conflict count.
    pub async fn status(&self, params: ProjectStatusParams) -> EngineResult<ProjectStatus> {
        let project = self.require_project(&params.project_id).await?;
        let facts = self.core.storage().list_live_facts(&params.project_id).await?;
        let maturity = self.maturity.report_from_facts(&facts);
        let pending_conflicts = self
            .core
            .storage()
            .list_pending_conflicts(&params.project_id)
            .await?
            .len();

        Ok(ProjectStatus {
            project,
            maturity,
            pending_conflicts,
        })
    }

    /// Attempt to advance a project to its next phase.
    ///
    /// The score policy is evaluated against a fresh report, never the
    /// cached score. Any pending conflict refuses advancement outright;
    /// a score below threshold rejects with the missing categories.
    pub async fn advance_phase(&self, params: AdvancePhaseParams) -> EngineResult<AdvanceResult> {
        let project = self.require_project(&params.project_id).await?;

        let Some(next) = project.phase.next() else {
            return Err(EngineError::Validation {
                field: "project_id".to_string(),
                reason: format!("project is already in the final phase ({})", project.phase),
            });
        };

        let pending: Vec<String> = self
            .core
            .storage()
            .list_pending_conflicts(&params.project_id)
            .await?
            .into_iter()
            .map(|c| c.id)
            .collect();
        if !pending.is_empty() {
            return Err(EngineError::ConflictPending {
                project_id: params.project_id.clone(),
                conflict_ids: pending,
            });
        }

        // Phase write and maturity cache update are serialized with the
        // project's fact writes.
        let lock = self.core.project_lock(&params.project_id);
        let _guard = lock.lock().await;

        let report = self.maturity.recompute(&params.project_id).await?;
        let decision = self
            .maturity
            .evaluate_transition(project.phase, &report)
            .ok_or_else(|| EngineError::Internal {
                message: "transition policy missing for non-final phase".to_string(),
            })?;

        if !decision.allowed {
            info!(
                project_id = %params.project_id,
                phase = %project.phase,
                overall = report.overall,
                required = decision.required,
                "Phase advancement rejected below threshold"
            );
            return Ok(AdvanceResult {
                project_id: params.project_id,
                advanced: false,
                from: project.phase,
                phase: project.phase,
                decision,
            });
        }

        self.core
            .storage()
            .update_phase(&params.project_id, next)
            .await?;

        info!(
            project_id = %params.project_id,
            from = %project.phase,
            to = %next,
            overall = report.overall,
            "Phase advanced"
        );

        Ok(AdvanceResult {
            project_id: params.project_id,
            advanced: true,
            from: project.phase,
            phase: next,
            decision,
        })
    }

    async fn require_project(&self, project_id: &str) -> EngineResult<Project> {
        self.core
            .storage()
            .get_project(project_id)
            .await?
            .ok_or_else(|| {
                EngineError::Storage(StorageError::ProjectNotFound {
                    project_id: project_id.to_string(),
                })
            })
    }
}
