//! Integration tests for the SQLite storage layer
//!
//! Tests database operations using an in-memory SQLite database.

mod common;

use common::create_test_storage;

use spec_orchestrator::error::StorageError;
use spec_orchestrator::storage::{
    CategoryCoverage, Conflict, ConflictKind, ConflictResolution, ConflictSeverity,
    ConflictStatus, Fact, FactDraft, FactStore, Project, ProjectPhase,
};

#[cfg(test)]
mod project_tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_get_project() {
        let storage = create_test_storage().await;

        let project = Project::new("inventory service");
        storage.create_project(&project).await.unwrap();

        let retrieved = storage.get_project(&project.id).await.unwrap().unwrap();
        assert_eq!(retrieved.id, project.id);
        assert_eq!(retrieved.name, "inventory service");
        assert_eq!(retrieved.phase, ProjectPhase::Discovery);
        assert_eq!(retrieved.maturity_score, 0.0);
    }

    #[tokio::test]
    async fn test_get_nonexistent_project() {
        let storage = create_test_storage().await;
        let result = storage.get_project("nonexistent-id").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_update_phase() {
        let storage = create_test_storage().await;

        let project = Project::new("demo");
        storage.create_project(&project).await.unwrap();

        storage
            .update_phase(&project.id, ProjectPhase::Analysis)
            .await
            .unwrap();

        let retrieved = storage.get_project(&project.id).await.unwrap().unwrap();
        assert_eq!(retrieved.phase, ProjectPhase::Analysis);
    }

    #[tokio::test]
    async fn test_update_phase_missing_project_errors() {
        let storage = create_test_storage().await;

        let err = storage
            .update_phase("missing", ProjectPhase::Analysis)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::ProjectNotFound { .. }));
    }

    #[tokio::test]
    async fn test_update_maturity_caches_score() {
        let storage = create_test_storage().await;

        let project = Project::new("demo");
        storage.create_project(&project).await.unwrap();

        let coverage = vec![CategoryCoverage {
            category: "goals".to_string(),
            fact_count: 2,
            avg_confidence: 0.9,
            score: 1.8,
        }];
        storage
            .update_maturity(&project.id, 42.5, &coverage)
            .await
            .unwrap();

        let retrieved = storage.get_project(&project.id).await.unwrap().unwrap();
        assert_eq!(retrieved.maturity_score, 42.5);
    }
}

#[cfg(test)]
mod fact_tests {
    use super::*;

    async fn seeded_project(storage: &spec_orchestrator::storage::SqliteStorage) -> Project {
        let project = Project::new("demo");
        storage.create_project(&project).await.unwrap();
        project
    }

    #[tokio::test]
    async fn test_append_and_get_live_fact() {
        let storage = create_test_storage().await;
        let project = seeded_project(&storage).await;

        let draft = FactDraft::new("tech_stack", "primary_database", "PostgreSQL");
        let fact = Fact::from_draft(&project.id, &draft);
        storage.append_fact_version(&fact).await.unwrap();

        let live = storage
            .get_live_fact(&project.id, "tech_stack", "primary_database")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(live.id, fact.id);
        assert_eq!(live.value, "PostgreSQL");
        assert!(live.is_live());
    }

    #[tokio::test]
    async fn test_append_supersedes_prior_version() {
        let storage = create_test_storage().await;
        let project = seeded_project(&storage).await;

        let v1 = Fact::from_draft(
            &project.id,
            &FactDraft::new("tech_stack", "primary_database", "MySQL"),
        );
        storage.append_fact_version(&v1).await.unwrap();

        let v2 = Fact::from_draft(
            &project.id,
            &FactDraft::new("tech_stack", "primary_database", "PostgreSQL"),
        );
        storage.append_fact_version(&v2).await.unwrap();

        // Exactly one live fact per identity.
        let live = storage
            .list_live_facts_by_identity(&project.id, "tech_stack", "primary_database")
            .await
            .unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].id, v2.id);

        // The old version survives with a back-reference to its successor.
        let old = storage.get_fact(&v1.id).await.unwrap().unwrap();
        assert!(!old.is_live());
        assert_eq!(old.superseded_by.as_deref(), Some(v2.id.as_str()));
        assert_eq!(old.value, "MySQL");
    }

    #[tokio::test]
    async fn test_version_chain_across_three_writes() {
        let storage = create_test_storage().await;
        let project = seeded_project(&storage).await;

        let values = ["MySQL", "PostgreSQL", "CockroachDB"];
        let mut ids = Vec::new();
        for value in values {
            let fact = Fact::from_draft(
                &project.id,
                &FactDraft::new("tech_stack", "primary_database", value),
            );
            storage.append_fact_version(&fact).await.unwrap();
            ids.push(fact.id);
        }

        for window in ids.windows(2) {
            let prior = storage.get_fact(&window[0]).await.unwrap().unwrap();
            assert_eq!(prior.superseded_by.as_deref(), Some(window[1].as_str()));
        }

        let live = storage
            .get_live_fact(&project.id, "tech_stack", "primary_database")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(live.value, "CockroachDB");
    }

    #[tokio::test]
    async fn test_identities_do_not_interfere() {
        let storage = create_test_storage().await;
        let project = seeded_project(&storage).await;

        let db = Fact::from_draft(
            &project.id,
            &FactDraft::new("tech_stack", "primary_database", "PostgreSQL"),
        );
        let cache = Fact::from_draft(
            &project.id,
            &FactDraft::new("tech_stack", "cache", "Redis"),
        );
        storage.append_fact_version(&db).await.unwrap();
        storage.append_fact_version(&cache).await.unwrap();

        let live = storage.list_live_facts(&project.id).await.unwrap();
        assert_eq!(live.len(), 2);
        assert!(live.iter().all(|f| f.is_live()));
    }

    #[tokio::test]
    async fn test_boost_confidence_in_place() {
        let storage = create_test_storage().await;
        let project = seeded_project(&storage).await;

        let fact = Fact::from_draft(
            &project.id,
            &FactDraft::new("goals", "primary_goal", "ship it").with_confidence(0.8),
        );
        storage.append_fact_version(&fact).await.unwrap();

        storage.boost_confidence(&fact.id, 0.85).await.unwrap();

        let live = storage.get_fact(&fact.id).await.unwrap().unwrap();
        assert_eq!(live.confidence, 0.85);
        // No new version was created.
        let chain = storage
            .list_live_facts_by_identity(&project.id, "goals", "primary_goal")
            .await
            .unwrap();
        assert_eq!(chain.len(), 1);
    }

    #[tokio::test]
    async fn test_boost_confidence_rejects_superseded_version() {
        let storage = create_test_storage().await;
        let project = seeded_project(&storage).await;

        let v1 = Fact::from_draft(
            &project.id,
            &FactDraft::new("goals", "primary_goal", "ship it"),
        );
        storage.append_fact_version(&v1).await.unwrap();
        let v2 = Fact::from_draft(
            &project.id,
            &FactDraft::new("goals", "primary_goal", "ship it well"),
        );
        storage.append_fact_version(&v2).await.unwrap();

        let err = storage.boost_confidence(&v1.id, 0.9).await.unwrap_err();
        assert!(matches!(err, StorageError::FactNotFound { .. }));
    }
}

#[cfg(test)]
mod conflict_tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_resolve_conflict() {
        let storage = create_test_storage().await;
        let project = Project::new("demo");
        storage.create_project(&project).await.unwrap();

        let existing = Fact::from_draft(
            &project.id,
            &FactDraft::new("tech_stack", "primary_database", "PostgreSQL"),
        );
        storage.append_fact_version(&existing).await.unwrap();

        let conflict = Conflict::new(
            &project.id,
            &existing.id,
            FactDraft::new("tech_stack", "primary_database", "MySQL"),
            ConflictKind::Technology,
            ConflictSeverity::High,
            "different databases",
        );
        storage.create_conflict(&conflict).await.unwrap();

        let pending = storage.list_pending_conflicts(&project.id).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].candidate.value, "MySQL");
        assert_eq!(pending[0].kind, ConflictKind::Technology);

        storage
            .resolve_conflict(&conflict.id, ConflictResolution::KeepOld)
            .await
            .unwrap();

        let resolved = storage.get_conflict(&conflict.id).await.unwrap().unwrap();
        assert_eq!(resolved.status, ConflictStatus::Resolved);
        assert_eq!(resolved.resolution, Some(ConflictResolution::KeepOld));
        assert!(storage
            .list_pending_conflicts(&project.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_resolve_missing_conflict_errors() {
        let storage = create_test_storage().await;
        let err = storage
            .resolve_conflict("missing", ConflictResolution::KeepNew)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::ConflictNotFound { .. }));
    }
}
