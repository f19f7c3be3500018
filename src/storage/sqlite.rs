use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::info;

use super::{
    CategoryCoverage, Conflict, ConflictKind, ConflictResolution, ConflictSeverity,
    ConflictStatus, Fact, FactDraft, FactStore, Project, ProjectPhase,
};
use crate::config::DatabaseConfig;
use crate::error::{StorageError, StorageResult};

/// Static migrator that embeds migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// SQLite-backed fact store implementation
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Create a new SQLite storage instance
    pub async fn new(config: &DatabaseConfig) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Connection {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let database_url = format!("sqlite://{}?mode=rwc", config.path.display());

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Create an in-memory storage instance (tests and throwaway runs)
    pub async fn new_in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Run database migrations using embedded sqlx migrations
    async fn run_migrations(&self) -> StorageResult<()> {
        info!("Running database migrations...");

        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::Migration {
                message: format!("Failed to run migrations: {}", e),
            })?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the underlying pool for advanced queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl FactStore for SqliteStorage {
    async fn create_project(&self, project: &Project) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO projects (id, name, phase, maturity_score, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&project.id)
        .bind(&project.name)
        .bind(project.phase.to_string())
        .bind(project.maturity_score)
        .bind(project.created_at.to_rfc3339())
        .bind(project.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_project(&self, id: &str) -> StorageResult<Option<Project>> {
        let row: Option<ProjectRow> = sqlx::query_as(
            r#"
            SELECT id, name, phase, maturity_score, created_at, updated_at
            FROM projects
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.try_into_project()).transpose()
    }

    async fn update_phase(&self, id: &str, phase: ProjectPhase) -> StorageResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE projects
            SET phase = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(phase.to_string())
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::ProjectNotFound {
                project_id: id.to_string(),
            });
        }

        Ok(())
    }

    async fn update_maturity(
        &self,
        id: &str,
        score: f64,
        by_category: &[CategoryCoverage],
    ) -> StorageResult<()> {
        let breakdown = serde_json::to_string(by_category).map_err(|e| StorageError::Query {
            message: format!("Failed to serialize coverage breakdown: {}", e),
        })?;

        let result = sqlx::query(
            r#"
            UPDATE projects
            SET maturity_score = ?, by_category = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(score)
        .bind(&breakdown)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::ProjectNotFound {
                project_id: id.to_string(),
            });
        }

        Ok(())
    }

    async fn get_live_fact(
        &self,
        project_id: &str,
        category: &str,
        key: &str,
    ) -> StorageResult<Option<Fact>> {
        let row: Option<FactRow> = sqlx::query_as(
            r#"
            SELECT id, project_id, category, sub_category, "key", value, confidence, source, created_at, superseded_by
            FROM facts
            WHERE project_id = ? AND category = ? AND "key" = ? AND superseded_by IS NULL
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(project_id)
        .bind(category)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.try_into_fact()).transpose()
    }

    async fn list_live_facts_by_identity(
        &self,
        project_id: &str,
        category: &str,
        key: &str,
    ) -> StorageResult<Vec<Fact>> {
        let rows: Vec<FactRow> = sqlx::query_as(
            r#"
            SELECT id, project_id, category, sub_category, "key", value, confidence, source, created_at, superseded_by
            FROM facts
            WHERE project_id = ? AND category = ? AND "key" = ? AND superseded_by IS NULL
            ORDER BY created_at DESC
            "#,
        )
        .bind(project_id)
        .bind(category)
        .bind(key)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into_fact()).collect()
    }

    async fn list_live_facts(&self, project_id: &str) -> StorageResult<Vec<Fact>> {
        let rows: Vec<FactRow> = sqlx::query_as(
            r#"
            SELECT id, project_id, category, sub_category, "key", value, confidence, source, created_at, superseded_by
            FROM facts
            WHERE project_id = ? AND superseded_by IS NULL
            ORDER BY created_at ASC
            "#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into_fact()).collect()
    }

    async fn get_fact(&self, fact_id: &str) -> StorageResult<Option<Fact>> {
        let row: Option<FactRow> = sqlx::query_as(
            r#"
            SELECT id, project_id, category, sub_category, "key", value, confidence, source, created_at, superseded_by
            FROM facts
            WHERE id = ?
            "#,
        )
        .bind(fact_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.try_into_fact()).transpose()
    }

    async fn append_fact_version(&self, fact: &Fact) -> StorageResult<()> {
        // Supersede-and-insert must be atomic so no reader ever sees two
        // live versions of one identity.
        let mut tx = self.pool.begin().await?;

        // superseded_by points at a row that only exists at the end of the
        // transaction, so the self-referencing FK must be deferred. The
        // insert also cannot go first: the partial live-identity index
        // would reject two live rows.
        sqlx::query("PRAGMA defer_foreign_keys = ON")
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            UPDATE facts
            SET superseded_by = ?
            WHERE project_id = ? AND category = ? AND "key" = ? AND superseded_by IS NULL
            "#,
        )
        .bind(&fact.id)
        .bind(&fact.project_id)
        .bind(&fact.category)
        .bind(&fact.key)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO facts (id, project_id, category, sub_category, "key", value, confidence, source, created_at, superseded_by)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, NULL)
            "#,
        )
        .bind(&fact.id)
        .bind(&fact.project_id)
        .bind(&fact.category)
        .bind(&fact.sub_category)
        .bind(&fact.key)
        .bind(&fact.value)
        .bind(fact.confidence)
        .bind(&fact.source)
        .bind(fact.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }

    async fn boost_confidence(&self, fact_id: &str, confidence: f64) -> StorageResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE facts
            SET confidence = ?
            WHERE id = ? AND superseded_by IS NULL
            "#,
        )
        .bind(confidence.clamp(0.0, 1.0))
        .bind(fact_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::FactNotFound {
                fact_id: fact_id.to_string(),
            });
        }

        Ok(())
    }

    async fn create_conflict(&self, conflict: &Conflict) -> StorageResult<()> {
        let candidate =
            serde_json::to_string(&conflict.candidate).map_err(|e| StorageError::Query {
                message: format!("Failed to serialize candidate fact: {}", e),
            })?;

        sqlx::query(
            r#"
            INSERT INTO conflicts (id, project_id, existing_fact_id, candidate, kind, severity, status, resolution, explanation, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&conflict.id)
        .bind(&conflict.project_id)
        .bind(&conflict.existing_fact_id)
        .bind(&candidate)
        .bind(conflict.kind.to_string())
        .bind(conflict.severity.to_string())
        .bind(conflict.status.to_string())
        .bind(conflict.resolution.map(|r| r.to_string()))
        .bind(&conflict.explanation)
        .bind(conflict.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_conflict(&self, id: &str) -> StorageResult<Option<Conflict>> {
        let row: Option<ConflictRow> = sqlx::query_as(
            r#"
            SELECT id, project_id, existing_fact_id, candidate, kind, severity, status, resolution, explanation, created_at
            FROM conflicts
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.try_into_conflict()).transpose()
    }

    async fn list_pending_conflicts(&self, project_id: &str) -> StorageResult<Vec<Conflict>> {
        let rows: Vec<ConflictRow> = sqlx::query_as(
            r#"
            SELECT id, project_id, existing_fact_id, candidate, kind, severity, status, resolution, explanation, created_at
            FROM conflicts
            WHERE project_id = ? AND status = 'pending'
            ORDER BY created_at ASC
            "#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into_conflict()).collect()
    }

    async fn resolve_conflict(
        &self,
        id: &str,
        resolution: ConflictResolution,
    ) -> StorageResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE conflicts
            SET status = 'resolved', resolution = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(resolution.to_string())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::ConflictNotFound {
                conflict_id: id.to_string(),
            });
        }

        Ok(())
    }
}

// Internal row types for SQLx mapping
#[derive(sqlx::FromRow)]
struct ProjectRow {
    id: String,
    name: String,
    phase: String,
    maturity_score: f64,
    created_at: String,
    updated_at: String,
}

#[derive(sqlx::FromRow)]
struct FactRow {
    id: String,
    project_id: String,
    category: String,
    sub_category: Option<String>,
    key: String,
    value: String,
    confidence: f64,
    source: String,
    created_at: String,
    superseded_by: Option<String>,
}

#[derive(sqlx::FromRow)]
struct ConflictRow {
    id: String,
    project_id: String,
    existing_fact_id: String,
    candidate: String,
    kind: String,
    severity: String,
    status: String,
    resolution: Option<String>,
    explanation: String,
    created_at: String,
}

fn parse_timestamp(raw: &str, column: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Query {
            message: format!("Corrupt timestamp in {}: {}", column, e),
        })
}

impl ProjectRow {
    fn try_into_project(self) -> StorageResult<Project> {
        Ok(Project {
            phase: self.phase.parse().map_err(|e| StorageError::Query {
                message: format!("Corrupt phase column: {}", e),
            })?,
            created_at: parse_timestamp(&self.created_at, "projects.created_at")?,
            updated_at: parse_timestamp(&self.updated_at, "projects.updated_at")?,
            id: self.id,
            name: self.name,
            maturity_score: self.maturity_score,
        })
    }
}

impl FactRow {
    fn try_into_fact(self) -> StorageResult<Fact> {
        Ok(Fact {
            created_at: parse_timestamp(&self.created_at, "facts.created_at")?,
            id: self.id,
            project_id: self.project_id,
            category: self.category,
            sub_category: self.sub_category,
            key: self.key,
            value: self.value,
            confidence: self.confidence,
            source: self.source,
            superseded_by: self.superseded_by,
        })
    }
}

impl ConflictRow {
    fn try_into_conflict(self) -> StorageResult<Conflict> {
        let candidate: FactDraft =
            serde_json::from_str(&self.candidate).map_err(|e| StorageError::Query {
                message: format!("Corrupt candidate column: {}", e),
            })?;

        let parse = |what: &str, raw: &str| StorageError::Query {
            message: format!("Corrupt {} column: {}", what, raw),
        };

        Ok(Conflict {
            kind: ConflictKind::from_str(&self.kind).map_err(|e| parse("kind", &e))?,
            severity: ConflictSeverity::from_str(&self.severity)
                .map_err(|e| parse("severity", &e))?,
            status: ConflictStatus::from_str(&self.status).map_err(|e| parse("status", &e))?,
            resolution: self
                .resolution
                .as_deref()
                .map(ConflictResolution::from_str)
                .transpose()
                .map_err(|e| parse("resolution", &e))?,
            created_at: parse_timestamp(&self.created_at, "conflicts.created_at")?,
            id: self.id,
            project_id: self.project_id,
            existing_fact_id: self.existing_fact_id,
            candidate,
            explanation: self.explanation,
        })
    }
}
