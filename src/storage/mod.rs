//! Storage layer for specification facts, conflicts, and projects.
//!
//! Facts are append-mostly version chains: an update writes a new row and
//! marks the prior one superseded, so history is never destroyed. At most
//! one live (non-superseded) fact exists per `(project_id, category, key)`
//! identity.

mod sqlite;

pub use sqlite::SqliteStorage;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StorageResult;

/// Project lifecycle phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectPhase {
    /// Gathering initial goals and context.
    #[default]
    Discovery,
    /// Requirements analysis.
    Analysis,
    /// Architecture and design decisions.
    Design,
    /// Build-out.
    Implementation,
}

impl ProjectPhase {
    /// The phase that follows this one, if any.
    pub fn next(self) -> Option<ProjectPhase> {
        match self {
            ProjectPhase::Discovery => Some(ProjectPhase::Analysis),
            ProjectPhase::Analysis => Some(ProjectPhase::Design),
            ProjectPhase::Design => Some(ProjectPhase::Implementation),
            ProjectPhase::Implementation => None,
        }
    }
}

impl std::fmt::Display for ProjectPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProjectPhase::Discovery => write!(f, "discovery"),
            ProjectPhase::Analysis => write!(f, "analysis"),
            ProjectPhase::Design => write!(f, "design"),
            ProjectPhase::Implementation => write!(f, "implementation"),
        }
    }
}

impl std::str::FromStr for ProjectPhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "discovery" => Ok(ProjectPhase::Discovery),
            "analysis" => Ok(ProjectPhase::Analysis),
            "design" => Ok(ProjectPhase::Design),
            "implementation" => Ok(ProjectPhase::Implementation),
            _ => Err(format!("Unknown project phase: {}", s)),
        }
    }
}

/// A project under specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Unique project identifier.
    pub id: String,
    /// Human-readable project name.
    pub name: String,
    /// Current lifecycle phase.
    pub phase: ProjectPhase,
    /// Cached maturity score (0-100). Live facts remain authoritative;
    /// this value is reproducible from them at any time.
    pub maturity_score: f64,
    /// When the project was created.
    pub created_at: DateTime<Utc>,
    /// When the project was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Create a new project in the discovery phase.
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            phase: ProjectPhase::Discovery,
            maturity_score: 0.0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A single versioned specification fact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fact {
    /// Unique fact identifier (per version, not per identity).
    pub id: String,
    /// Owning project.
    pub project_id: String,
    /// Category from the closed enumeration.
    pub category: String,
    /// Optional finer-grained grouping inside the category.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_category: Option<String>,
    /// Attribute key; `(project_id, category, key)` is the fact identity.
    pub key: String,
    /// The recorded value.
    pub value: String,
    /// Confidence in the value (0.0-1.0).
    pub confidence: f64,
    /// Where the fact came from (e.g. "answer", "chat", "import").
    pub source: String,
    /// When this version was created.
    pub created_at: DateTime<Utc>,
    /// Back-reference to the version that replaced this one, if any.
    /// A lookup aid only, never an ownership pointer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub superseded_by: Option<String>,
}

impl Fact {
    /// Create a new live fact from a draft.
    pub fn from_draft(project_id: impl Into<String>, draft: &FactDraft) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            project_id: project_id.into(),
            category: draft.category.clone(),
            sub_category: draft.sub_category.clone(),
            key: draft.key.clone(),
            value: draft.value.clone(),
            confidence: draft.confidence.clamp(0.0, 1.0),
            source: draft.source.clone(),
            created_at: Utc::now(),
            superseded_by: None,
        }
    }

    /// Whether this version is the current one for its identity.
    pub fn is_live(&self) -> bool {
        self.superseded_by.is_none()
    }
}

/// A candidate fact not yet admitted to the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FactDraft {
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_category: Option<String>,
    pub key: String,
    pub value: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default = "default_source")]
    pub source: String,
}

fn default_confidence() -> f64 {
    0.8
}

fn default_source() -> String {
    "answer".to_string()
}

impl FactDraft {
    /// Create a draft with the required identity fields.
    pub fn new(
        category: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            category: category.into(),
            sub_category: None,
            key: key.into(),
            value: value.into(),
            confidence: default_confidence(),
            source: default_source(),
        }
    }

    /// Set the confidence (clamped to 0.0-1.0).
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Set the source label.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }
}

/// Domain a conflict belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictKind {
    Technology,
    Requirements,
    Timeline,
    Resources,
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictKind::Technology => write!(f, "technology"),
            ConflictKind::Requirements => write!(f, "requirements"),
            ConflictKind::Timeline => write!(f, "timeline"),
            ConflictKind::Resources => write!(f, "resources"),
        }
    }
}

impl std::str::FromStr for ConflictKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "technology" => Ok(ConflictKind::Technology),
            "requirements" => Ok(ConflictKind::Requirements),
            "timeline" => Ok(ConflictKind::Timeline),
            "resources" => Ok(ConflictKind::Resources),
            _ => Err(format!("Unknown conflict kind: {}", s)),
        }
    }
}

/// How serious a contradiction is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictSeverity {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for ConflictSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictSeverity::Low => write!(f, "low"),
            ConflictSeverity::Medium => write!(f, "medium"),
            ConflictSeverity::High => write!(f, "high"),
        }
    }
}

impl std::str::FromStr for ConflictSeverity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(ConflictSeverity::Low),
            "medium" => Ok(ConflictSeverity::Medium),
            "high" => Ok(ConflictSeverity::High),
            _ => Err(format!("Unknown conflict severity: {}", s)),
        }
    }
}

/// Conflict lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictStatus {
    #[default]
    Pending,
    Resolved,
}

impl std::fmt::Display for ConflictStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictStatus::Pending => write!(f, "pending"),
            ConflictStatus::Resolved => write!(f, "resolved"),
        }
    }
}

impl std::str::FromStr for ConflictStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ConflictStatus::Pending),
            "resolved" => Ok(ConflictStatus::Resolved),
            _ => Err(format!("Unknown conflict status: {}", s)),
        }
    }
}

/// Explicit caller decision on a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    KeepOld,
    KeepNew,
    Merge,
}

impl std::fmt::Display for ConflictResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictResolution::KeepOld => write!(f, "keep_old"),
            ConflictResolution::KeepNew => write!(f, "keep_new"),
            ConflictResolution::Merge => write!(f, "merge"),
        }
    }
}

impl std::str::FromStr for ConflictResolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "keep_old" => Ok(ConflictResolution::KeepOld),
            "keep_new" => Ok(ConflictResolution::KeepNew),
            "merge" => Ok(ConflictResolution::Merge),
            _ => Err(format!("Unknown conflict resolution: {}", s)),
        }
    }
}

/// A detected contradiction between a candidate fact and a live fact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conflict {
    /// Unique conflict identifier.
    pub id: String,
    /// Owning project.
    pub project_id: String,
    /// The live fact the candidate contradicts.
    pub existing_fact_id: String,
    /// The rejected candidate, preserved for resolution.
    pub candidate: FactDraft,
    /// Conflict domain.
    pub kind: ConflictKind,
    /// Severity of the contradiction.
    pub severity: ConflictSeverity,
    /// Lifecycle state.
    pub status: ConflictStatus,
    /// Caller decision, once resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<ConflictResolution>,
    /// Judge's explanation of the contradiction.
    pub explanation: String,
    /// When the conflict was detected.
    pub created_at: DateTime<Utc>,
}

impl Conflict {
    /// Create a new pending conflict.
    pub fn new(
        project_id: impl Into<String>,
        existing_fact_id: impl Into<String>,
        candidate: FactDraft,
        kind: ConflictKind,
        severity: ConflictSeverity,
        explanation: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            project_id: project_id.into(),
            existing_fact_id: existing_fact_id.into(),
            candidate,
            kind,
            severity,
            status: ConflictStatus::Pending,
            resolution: None,
            explanation: explanation.into(),
            created_at: Utc::now(),
        }
    }
}

/// Derived per-category coverage snapshot. Recomputed from live facts,
/// never mutated independently.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryCoverage {
    pub category: String,
    pub fact_count: u32,
    pub avg_confidence: f64,
    pub score: f64,
}

/// Durable keyed storage for facts, conflicts, and project metadata.
///
/// All calls are atomic at the single-record level; multi-record
/// atomicity (supersede-and-create) is handled inside
/// [`FactStore::append_fact_version`] via a transaction. Serializing
/// writes per project is the engine's job, not the store's.
#[async_trait]
pub trait FactStore: Send + Sync {
    /// Create a project record.
    async fn create_project(&self, project: &Project) -> StorageResult<()>;

    /// Fetch a project by id.
    async fn get_project(&self, id: &str) -> StorageResult<Option<Project>>;

    /// Move a project to a new phase.
    async fn update_phase(&self, id: &str, phase: ProjectPhase) -> StorageResult<()>;

    /// Persist the cached maturity score and coverage breakdown.
    async fn update_maturity(
        &self,
        id: &str,
        score: f64,
        by_category: &[CategoryCoverage],
    ) -> StorageResult<()>;

    /// Fetch the live fact for an identity, if any.
    async fn get_live_fact(
        &self,
        project_id: &str,
        category: &str,
        key: &str,
    ) -> StorageResult<Option<Fact>>;

    /// Every live fact sharing an identity, newest first. Normally at
    /// most one row; more indicates a data-integrity problem the caller
    /// tie-breaks.
    async fn list_live_facts_by_identity(
        &self,
        project_id: &str,
        category: &str,
        key: &str,
    ) -> StorageResult<Vec<Fact>>;

    /// All live facts for a project.
    async fn list_live_facts(&self, project_id: &str) -> StorageResult<Vec<Fact>>;

    /// Fetch any fact version by id.
    async fn get_fact(&self, fact_id: &str) -> StorageResult<Option<Fact>>;

    /// Append a new fact version, superseding the prior live version of
    /// the same identity in the same transaction.
    async fn append_fact_version(&self, fact: &Fact) -> StorageResult<()>;

    /// Raise a live fact's confidence in place (confirmation path; no
    /// new version is created).
    async fn boost_confidence(&self, fact_id: &str, confidence: f64) -> StorageResult<()>;

    /// Persist a detected conflict.
    async fn create_conflict(&self, conflict: &Conflict) -> StorageResult<()>;

    /// Fetch a conflict by id.
    async fn get_conflict(&self, id: &str) -> StorageResult<Option<Conflict>>;

    /// All pending conflicts for a project.
    async fn list_pending_conflicts(&self, project_id: &str) -> StorageResult<Vec<Conflict>>;

    /// Mark a conflict resolved with the caller's decision.
    async fn resolve_conflict(
        &self,
        id: &str,
        resolution: ConflictResolution,
    ) -> StorageResult<()>;
}
