//! The orchestration engine core: conflict detection, maturity scoring,
//! the quality gate, and the handlers the dispatcher routes to.

mod conflict;
mod core;
mod document;
mod gate;
mod intake;
mod maturity;
mod phase;
mod questions;

pub use conflict::{normalize, Classification, ConflictDetector, Finding};
pub use core::{EngineCore, ProjectLocks};
pub use document::{DocumentComposer, DocumentResult, GenerateDocumentParams};
pub use gate::{ExecutionPath, GateResult, PathOptimizer, RiskLevel};
pub use intake::{
    BlockedFact, ConfirmedFact, FactIntake, IntakeResult, ListFactsParams, RecordFactParams,
    ResolveConflictParams, ResolveResult, SubmitAnswerParams,
};
pub use maturity::{
    CategoryGap, MaturityCalculator, MaturityReport, TransitionDecision, ANALYSIS_THRESHOLD,
    DESIGN_THRESHOLD, IMPLEMENTATION_THRESHOLD,
};
pub use phase::{
    AdvancePhaseParams, AdvanceResult, CreateProjectParams, ProjectManager, ProjectStatus,
    ProjectStatusParams,
};
pub use questions::{NextQuestionsParams, QuestionPlanner, QuestionsResult};
