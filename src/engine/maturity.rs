//! Maturity scoring and phase-transition policy.
//!
//! The score is a pure function of a project's live facts: each category
//! contributes `min(Σ confidence, cap)` so extra facts saturate instead of
//! gaming the score, and the overall value normalizes against the total cap.
//! The cached score on the project record is a convenience; live facts stay
//! authoritative.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{CategoryConfig, Config};
use crate::error::EngineResult;
use crate::storage::{CategoryCoverage, Fact, FactStore, ProjectPhase, SqliteStorage};

/// Maturity threshold to leave the discovery phase.
pub const ANALYSIS_THRESHOLD: f64 = 60.0;
/// Maturity threshold to leave the analysis phase.
pub const DESIGN_THRESHOLD: f64 = 80.0;
/// Maturity threshold to leave the design phase.
pub const IMPLEMENTATION_THRESHOLD: f64 = 100.0;

/// Full maturity snapshot for a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaturityReport {
    /// Overall score, 0-100.
    pub overall: f64,
    /// Per-category coverage, in configuration order.
    pub by_category: Vec<CategoryCoverage>,
}

impl MaturityReport {
    /// Coverage entry for a category, if configured.
    pub fn category(&self, name: &str) -> Option<&CategoryCoverage> {
        self.by_category.iter().find(|c| c.category == name)
    }
}

/// A category still short of its saturation cap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryGap {
    pub category: String,
    pub weight: f64,
    pub score: f64,
    pub cap: f64,
    /// Fraction of the cap still missing (0.0-1.0).
    pub gap_fraction: f64,
}

/// Outcome of evaluating a phase-transition request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionDecision {
    pub allowed: bool,
    pub required: f64,
    pub overall: f64,
    /// Categories below their cap, largest gap first.
    pub missing: Vec<CategoryGap>,
}

/// Derives maturity scores from live facts.
#[derive(Clone)]
pub struct MaturityCalculator {
    storage: SqliteStorage,
    categories: CategoryConfig,
}

impl MaturityCalculator {
    /// Create a new calculator.
    pub fn new(storage: SqliteStorage, config: &Config) -> Self {
        Self {
            storage,
            categories: config.categories.clone(),
        }
    }

    /// Compute a report from a fact snapshot. Pure: no clock, no I/O,
    /// identical input yields identical output.
    pub fn report_from_facts(&self, facts: &[Fact]) -> MaturityReport {
        let by_category: Vec<CategoryCoverage> = self
            .categories
            .all()
            .iter()
            .map(|spec| {
                let confidences: Vec<f64> = facts
                    .iter()
                    .filter(|f| f.category == spec.name)
                    .map(|f| f.confidence)
                    .collect();

                let fact_count = confidences.len() as u32;
                let confidence_sum: f64 = confidences.iter().sum();
                let avg_confidence = if fact_count == 0 {
                    0.0
                } else {
                    confidence_sum / fact_count as f64
                };

                CategoryCoverage {
                    category: spec.name.clone(),
                    fact_count,
                    avg_confidence,
                    score: confidence_sum.min(spec.cap),
                }
            })
            .collect();

        let total_score: f64 = by_category.iter().map(|c| c.score).sum();
        let total_cap = self.categories.total_cap();

        MaturityReport {
            overall: 100.0 * total_score / total_cap,
            by_category,
        }
    }

    /// Load live facts, compute the report, and persist the cached score.
    pub async fn recompute(&self, project_id: &str) -> EngineResult<MaturityReport> {
        let facts = self.storage.list_live_facts(project_id).await?;
        let report = self.report_from_facts(&facts);

        self.storage
            .update_maturity(project_id, report.overall, &report.by_category)
            .await?;

        debug!(
            project_id = %project_id,
            overall = report.overall,
            facts = facts.len(),
            "Maturity recomputed"
        );

        Ok(report)
    }

    /// Categories short of their cap, largest gap fraction first.
    pub fn gaps(&self, report: &MaturityReport) -> Vec<CategoryGap> {
        let mut gaps: Vec<CategoryGap> = report
            .by_category
            .iter()
            .filter_map(|coverage| {
                let spec = self.categories.get(&coverage.category)?;
                if coverage.score >= spec.cap {
                    return None;
                }
                Some(CategoryGap {
                    category: coverage.category.clone(),
                    weight: spec.weight,
                    score: coverage.score,
                    cap: spec.cap,
                    gap_fraction: 1.0 - coverage.score / spec.cap,
                })
            })
            .collect();

        gaps.sort_by(|a, b| {
            b.gap_fraction
                .partial_cmp(&a.gap_fraction)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(
                    b.weight
                        .partial_cmp(&a.weight)
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
        });
        gaps
    }

    /// Threshold required to leave the given phase, if a next phase exists.
    pub fn required_for(phase: ProjectPhase) -> Option<f64> {
        match phase {
            ProjectPhase::Discovery => Some(ANALYSIS_THRESHOLD),
            ProjectPhase::Analysis => Some(DESIGN_THRESHOLD),
            ProjectPhase::Design => Some(IMPLEMENTATION_THRESHOLD),
            ProjectPhase::Implementation => None,
        }
    }

    /// Evaluate whether a project may leave its current phase. Pending
    /// conflicts are checked separately by the caller; this is the
    /// score-only policy, returning the missing categories on rejection.
    pub fn evaluate_transition(
        &self,
        phase: ProjectPhase,
        report: &MaturityReport,
    ) -> Option<TransitionDecision> {
        let required = Self::required_for(phase)?;
        let allowed = report.overall >= required;

        Some(TransitionDecision {
            allowed,
            required,
            overall: report.overall,
            missing: if allowed {
                Vec::new()
            } else {
                self.gaps(report)
            },
        })
    }
}
