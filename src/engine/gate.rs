//! Quality gate: multi-path cost comparison for major operations.
//!
//! For each configured operation the optimizer prices a small, static set
//! of strategies (direct cost plus projected rework cost for strategies
//! that skip gap-filling) and recommends the cheapest. The gate blocks
//! only when the *current* project state has a high-severity coverage gap
//! and the operation is irreversible; otherwise the comparison is
//! informational.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::maturity::{CategoryGap, MaturityCalculator};
use crate::config::{Config, GateConfig};
use crate::error::EngineResult;
use crate::storage::{FactStore, SqliteStorage};

/// Risk classification for a candidate path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// An ephemeral candidate plan for a major operation. Never persisted;
/// generated fresh per evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPath {
    pub name: String,
    pub steps: Vec<String>,
    /// Sum of declared step costs, in opaque cost units.
    pub direct_cost: f64,
    /// Projected cost of redoing work if gaps are skipped now.
    pub rework_cost: f64,
    pub total_cost: f64,
    pub risk_level: RiskLevel,
}

/// Outcome of a gate evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateResult {
    pub is_blocking: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Viable paths, cheapest first.
    pub paths: Vec<ExecutionPath>,
    /// Name of the cheapest path, if any survived pricing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommended: Option<String>,
    /// High-severity coverage gaps in the current project state.
    pub high_severity_gaps: Vec<CategoryGap>,
}

/// Admission-control gate comparing candidate strategies by total cost.
#[derive(Clone)]
pub struct PathOptimizer {
    storage: SqliteStorage,
    maturity: MaturityCalculator,
    gate: GateConfig,
}

impl PathOptimizer {
    /// Create a new optimizer.
    pub fn new(storage: SqliteStorage, config: &Config) -> Self {
        Self {
            maturity: MaturityCalculator::new(storage.clone(), config),
            storage,
            gate: config.gate.clone(),
        }
    }

    /// Evaluate candidate paths for a major operation on a project.
    pub async fn evaluate(&self, project_id: &str, operation: &str) -> EngineResult<GateResult> {
        let facts = self.storage.list_live_facts(project_id).await?;
        let report = self.maturity.report_from_facts(&facts);
        let missing_pct = (100.0 - report.overall).max(0.0);

        let high_severity_gaps: Vec<CategoryGap> = self
            .maturity
            .gaps(&report)
            .into_iter()
            .filter(|gap| {
                gap.gap_fraction >= self.gate.high_gap_threshold
                    && gap.weight >= self.gate.high_gap_min_weight
            })
            .collect();

        let Some(spec) = self.gate.operations.get(operation) else {
            warn!(operation = %operation, "No strategies configured for operation");
            return Ok(GateResult {
                is_blocking: true,
                reason: Some("NoViablePath".to_string()),
                paths: Vec::new(),
                recommended: None,
                high_severity_gaps,
            });
        };

        let mut paths: Vec<ExecutionPath> = Vec::new();
        for strategy in &spec.strategies {
            // A step without a declared cost cannot be priced; drop the
            // path rather than fabricate a number.
            let costs: Option<Vec<f64>> = strategy.steps.iter().map(|s| s.cost).collect();
            let Some(costs) = costs else {
                warn!(
                    operation = %operation,
                    strategy = %strategy.name,
                    "Dropping path with unpriced step"
                );
                continue;
            };

            let direct_cost: f64 = costs.iter().sum();
            let rework_cost = if strategy.fills_gaps {
                0.0
            } else {
                missing_pct * self.gate.rework_factor
            };

            let risk_level = if rework_cost > direct_cost {
                RiskLevel::High
            } else if rework_cost > 0.0 {
                RiskLevel::Medium
            } else {
                RiskLevel::Low
            };

            paths.push(ExecutionPath {
                name: strategy.name.clone(),
                steps: strategy.steps.iter().map(|s| s.name.clone()).collect(),
                direct_cost,
                rework_cost,
                total_cost: direct_cost + rework_cost,
                risk_level,
            });
        }

        paths.sort_by(|a, b| {
            a.total_cost
                .partial_cmp(&b.total_cost)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        if paths.is_empty() {
            return Ok(GateResult {
                is_blocking: true,
                reason: Some("NoViablePath".to_string()),
                paths,
                recommended: None,
                high_severity_gaps,
            });
        }

        let recommended = paths.first().map(|p| p.name.clone());
        let is_blocking = spec.irreversible && !high_severity_gaps.is_empty();
        let reason = is_blocking.then(|| {
            let categories: Vec<&str> = high_severity_gaps
                .iter()
                .map(|g| g.category.as_str())
                .collect();
            format!(
                "Irreversible operation with high-severity coverage gaps: {}",
                categories.join(", ")
            )
        });

        debug!(
            project_id = %project_id,
            operation = %operation,
            paths = paths.len(),
            blocking = is_blocking,
            recommended = ?recommended,
            "Gate evaluation complete"
        );

        Ok(GateResult {
            is_blocking,
            reason,
            paths,
            recommended,
            high_severity_gaps,
        })
    }
}
