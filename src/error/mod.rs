use thiserror::Error;

/// Engine-level errors
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Validation failed: {field} - {reason}")]
    Validation { field: String, reason: String },

    #[error("Unknown capability: {capability}")]
    UnknownCapability { capability: String },

    #[error("Unknown action: {capability}.{action}")]
    UnknownAction { capability: String, action: String },

    #[error("Unresolved conflicts pending for project {project_id}: {}", conflict_ids.join(", "))]
    ConflictPending {
        project_id: String,
        conflict_ids: Vec<String>,
    },

    #[error("Operation blocked by quality gate: {reason}")]
    GateBlocked { reason: String },

    #[error("Concurrent modification of {category}/{key} in project {project_id}")]
    ConcurrentModification {
        project_id: String,
        category: String,
        key: String,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Generator error: {0}")]
    Generator(#[from] GeneratorError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Storage layer errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database connection failed: {message}")]
    Connection { message: String },

    #[error("Query failed: {message}")]
    Query { message: String },

    #[error("Project not found: {project_id}")]
    ProjectNotFound { project_id: String },

    #[error("Fact not found: {fact_id}")]
    FactNotFound { fact_id: String },

    #[error("Conflict not found: {conflict_id}")]
    ConflictNotFound { conflict_id: String },

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Text generator errors
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("Generator unavailable: {message} (retries: {retries})")]
    Unavailable { message: String, retries: u32 },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl EngineError {
    /// Stable error kind tag carried on dispatch responses.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Validation { .. } => "validation",
            EngineError::UnknownCapability { .. } => "unknown_capability",
            EngineError::UnknownAction { .. } => "unknown_action",
            EngineError::ConflictPending { .. } => "conflict_pending",
            EngineError::GateBlocked { .. } => "gate_blocked",
            EngineError::ConcurrentModification { .. } => "concurrent_modification",
            EngineError::Storage(_) => "storage",
            EngineError::Generator(_) => "generator",
            EngineError::Config { .. } => "config",
            EngineError::Internal { .. } => "internal",
        }
    }

    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::ConcurrentModification { .. } | EngineError::Generator(_)
        )
    }
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for generator operations
pub type GeneratorResult<T> = Result<T, GeneratorError>;
