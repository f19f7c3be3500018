//! Integration tests for serialized writes and race handling.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use common::{create_test_storage, test_config, ScriptedGenerator};

use spec_orchestrator::engine::{CreateProjectParams, RecordFactParams};
use spec_orchestrator::error::EngineError;
use spec_orchestrator::generator::{GenerateRequest, GenerateResponse, TextGenerator};
use spec_orchestrator::orchestrator::EngineState;
use spec_orchestrator::storage::{
    Conflict, ConflictKind, ConflictSeverity, Fact, FactDraft, FactStore, SqliteStorage,
};

/// Generator that rewrites the contested identity while the caller is
/// waiting for its judgment, guaranteeing the snapshot goes stale
/// between read and write.
struct RacingGenerator {
    storage: SqliteStorage,
    project_id: String,
    counter: std::sync::atomic::AtomicUsize,
}

#[async_trait]
impl TextGenerator for RacingGenerator {
    async fn generate(
        &self,
        _request: GenerateRequest,
    ) -> spec_orchestrator::error::GeneratorResult<GenerateResponse> {
        let n = self
            .counter
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let interloper = Fact::from_draft(
            &self.project_id,
            &FactDraft::new("tech_stack", "primary_database", format!("interloper-{n}")),
        );
        self.storage
            .append_fact_version(&interloper)
            .await
            .expect("interloper write failed");

        Ok(GenerateResponse {
            completion: r#"{"is_conflict": false, "kind": "technology", "severity": "low", "explanation": "refinement"}"#.to_string(),
            usage: None,
        })
    }
}

#[tokio::test]
async fn test_stale_snapshot_retries_then_surfaces_concurrent_modification() {
    let storage = create_test_storage().await;

    let project = spec_orchestrator::storage::Project::new("demo");
    storage.create_project(&project).await.unwrap();
    let seed = Fact::from_draft(
        &project.id,
        &FactDraft::new("tech_stack", "primary_database", "MySQL"),
    );
    storage.append_fact_version(&seed).await.unwrap();

    let generator = Arc::new(RacingGenerator {
        storage: storage.clone(),
        project_id: project.id.clone(),
        counter: std::sync::atomic::AtomicUsize::new(0),
    });
    let state = EngineState::new(test_config(), storage, generator.clone());

    let err = state
        .intake
        .record(RecordFactParams {
            project_id: project.id.clone(),
            fact: FactDraft::new("tech_stack", "primary_database", "PostgreSQL"),
        })
        .await
        .unwrap_err();

    match err {
        EngineError::ConcurrentModification { category, key, .. } => {
            assert_eq!(category, "tech_stack");
            assert_eq!(key, "primary_database");
        }
        other => panic!("expected ConcurrentModification, got {other:?}"),
    }

    // One initial attempt plus exactly one retry, each judged once.
    assert_eq!(
        generator.counter.load(std::sync::atomic::Ordering::SeqCst),
        2
    );

    // The losing candidate was never written.
    let live = state
        .storage()
        .get_live_fact(&project.id, "tech_stack", "primary_database")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(live.value, "interloper-1");
}

/// Generator that files a pending conflict for the contested identity
/// while the caller is waiting for its judgment, so the conflict exists
/// only after the lock-free pre-check but before the write lock.
struct ConflictFilingGenerator {
    storage: SqliteStorage,
    project_id: String,
}

#[async_trait]
impl TextGenerator for ConflictFilingGenerator {
    async fn generate(
        &self,
        _request: GenerateRequest,
    ) -> spec_orchestrator::error::GeneratorResult<GenerateResponse> {
        let live = self
            .storage
            .get_live_fact(&self.project_id, "tech_stack", "primary_database")
            .await
            .expect("live fact lookup failed")
            .expect("seed fact missing");
        let conflict = Conflict::new(
            &self.project_id,
            &live.id,
            FactDraft::new("tech_stack", "primary_database", "CockroachDB"),
            ConflictKind::Technology,
            ConflictSeverity::High,
            "filed mid-judgment",
        );
        self.storage
            .create_conflict(&conflict)
            .await
            .expect("conflict write failed");

        Ok(GenerateResponse {
            completion: r#"{"is_conflict": false, "kind": "technology", "severity": "low", "explanation": "refinement"}"#.to_string(),
            usage: None,
        })
    }
}

#[tokio::test]
async fn test_conflict_filed_mid_judgment_blocks_the_write() {
    let storage = create_test_storage().await;

    let project = spec_orchestrator::storage::Project::new("demo");
    storage.create_project(&project).await.unwrap();
    let seed = Fact::from_draft(
        &project.id,
        &FactDraft::new("tech_stack", "primary_database", "MySQL"),
    );
    storage.append_fact_version(&seed).await.unwrap();

    let generator = Arc::new(ConflictFilingGenerator {
        storage: storage.clone(),
        project_id: project.id.clone(),
    });
    let state = EngineState::new(test_config(), storage, generator);

    // The refinement verdict would normally let this supersede, but the
    // conflict filed during judgment must refuse it at the lock.
    let result = state
        .intake
        .record(RecordFactParams {
            project_id: project.id.clone(),
            fact: FactDraft::new("tech_stack", "primary_database", "PostgreSQL"),
        })
        .await
        .unwrap();

    assert!(result.recorded.is_empty());
    assert_eq!(result.blocked.len(), 1);
    assert_eq!(result.blocked[0].key, "primary_database");
    assert_eq!(result.blocked[0].conflict_ids.len(), 1);

    let live = state
        .storage()
        .get_live_fact(&project.id, "tech_stack", "primary_database")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(live.value, "MySQL");
}

#[tokio::test]
async fn test_concurrent_writers_to_one_identity_both_land() {
    // Both writers target a fresh identity. Whichever loses the race
    // re-judges against the winner's fact; the scripted refinement
    // verdict lets it supersede cleanly.
    let judgment = r#"{"is_conflict": false, "kind": "technology", "severity": "low", "explanation": "refinement"}"#;
    let generator = Arc::new(ScriptedGenerator::new(vec![judgment]));
    let state = Arc::new(common::engine_with(test_config(), generator).await);

    let project_id = state
        .projects
        .create(CreateProjectParams {
            name: "demo".to_string(),
        })
        .await
        .unwrap()
        .id;

    let a = tokio::spawn({
        let state = Arc::clone(&state);
        let project_id = project_id.clone();
        async move {
            state
                .intake
                .record(RecordFactParams {
                    project_id,
                    fact: FactDraft::new("tech_stack", "cache", "Redis"),
                })
                .await
        }
    });
    let b = tokio::spawn({
        let state = Arc::clone(&state);
        let project_id = project_id.clone();
        async move {
            state
                .intake
                .record(RecordFactParams {
                    project_id,
                    fact: FactDraft::new("tech_stack", "cache", "Redis 7 with clustering"),
                })
                .await
        }
    });

    let (a, b) = (a.await.unwrap(), b.await.unwrap());
    assert!(a.is_ok(), "first writer failed: {a:?}");
    assert!(b.is_ok(), "second writer failed: {b:?}");

    // Exactly one live fact survives, with the other superseded under it.
    let live = state
        .storage()
        .list_live_facts_by_identity(&project_id, "tech_stack", "cache")
        .await
        .unwrap();
    assert_eq!(live.len(), 1);
}

#[tokio::test]
async fn test_concurrent_writers_to_distinct_identities_never_judge() {
    let state = Arc::new(
        common::engine_with(test_config(), Arc::new(ScriptedGenerator::unused())).await,
    );
    let project_id = state
        .projects
        .create(CreateProjectParams {
            name: "demo".to_string(),
        })
        .await
        .unwrap()
        .id;

    let mut handles = Vec::new();
    for (key, value) in [
        ("primary_database", "PostgreSQL"),
        ("cache", "Redis"),
        ("queue", "NATS"),
        ("search", "Meilisearch"),
    ] {
        let state = Arc::clone(&state);
        let project_id = project_id.clone();
        handles.push(tokio::spawn(async move {
            state
                .intake
                .record(RecordFactParams {
                    project_id,
                    fact: FactDraft::new("tech_stack", key, value),
                })
                .await
        }));
    }

    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }

    let live = state.storage().list_live_facts(&project_id).await.unwrap();
    assert_eq!(live.len(), 4);
}
