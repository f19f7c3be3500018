//! Orchestrator: registry, shared state, and dispatch.

mod dispatch;
mod registry;
mod server;

pub use dispatch::{DispatchRequest, DispatchResponse, ErrorBody};
pub use registry::{RegisteredAction, Registry};
pub use server::EngineServer;

use std::sync::Arc;

use crate::config::Config;
use crate::engine::{
    DocumentComposer, EngineCore, FactIntake, PathOptimizer, ProjectLocks, ProjectManager,
    QuestionPlanner,
};
use crate::generator::TextGenerator;
use crate::storage::SqliteStorage;

/// Shared application state wiring all handlers to one storage backend,
/// one generator, and one per-project lock map.
pub struct EngineState {
    pub config: Config,
    pub registry: Registry,
    pub intake: FactIntake,
    pub questions: QuestionPlanner,
    pub projects: ProjectManager,
    pub composer: DocumentComposer,
    pub gate: PathOptimizer,
    storage: SqliteStorage,
}

impl EngineState {
    /// Wire the engine from its leaf dependencies.
    pub fn new(config: Config, storage: SqliteStorage, generator: Arc<dyn TextGenerator>) -> Self {
        let core = EngineCore::new(storage.clone(), generator, ProjectLocks::new());

        Self {
            registry: Registry::with_defaults(),
            intake: FactIntake::new(core.clone(), &config),
            questions: QuestionPlanner::new(core.clone(), &config),
            projects: ProjectManager::new(core.clone(), &config),
            composer: DocumentComposer::new(core, &config),
            gate: PathOptimizer::new(storage.clone(), &config),
            storage,
            config,
        }
    }

    /// Get a reference to the storage backend.
    pub fn storage(&self) -> &SqliteStorage {
        &self.storage
    }
}

/// Shared state handle passed to the request loop.
pub type SharedState = Arc<EngineState>;
