//! End-to-end coverage for profile sync against the SQLite store.
//!
//! These tests run the real [`ProfileSyncService`] over
//! [`SqliteUserProfileRepository`] so the unique constraints, the conflict
//! mapping and the retry path are exercised together.

use std::sync::Arc;

use tempfile::TempDir;
use userhub_core::user::ports::UserProfileRepository;
use userhub_core::ProfileSyncService;
use userhub_domain::{AccountError, ProfileAttributes, ProfileIdentity, SyncRequest};
use userhub_infra::database::{DbManager, SqliteUserProfileRepository};

struct DbHarness {
    #[allow(dead_code)]
    temp_dir: TempDir,
    manager: Arc<DbManager>,
    repository: Arc<SqliteUserProfileRepository>,
}

impl DbHarness {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("temporary directory should be created");
        let db_path = temp_dir.path().join("infra-integration.db");

        let manager =
            Arc::new(DbManager::new(&db_path, 8).expect("database manager should initialise"));
        manager.run_migrations().expect("schema migrations should apply");
        let repository = Arc::new(SqliteUserProfileRepository::new(Arc::clone(&manager)));

        Self { temp_dir, manager, repository }
    }

    fn service(&self) -> ProfileSyncService {
        ProfileSyncService::new(self.repository.clone())
    }

    fn row_count(&self) -> i64 {
        let conn = self.manager.get_connection().expect("connection should be available");
        conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .expect("count query should succeed")
    }
}

fn request(email: &str, external_id: Option<&str>, full_name: &str) -> SyncRequest {
    SyncRequest::new(
        ProfileIdentity::new(Some(email.to_string()), external_id.map(str::to_string)),
        ProfileAttributes {
            full_name: Some(full_name.to_string()),
            ..ProfileAttributes::default()
        },
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sign_ups_with_same_email_produce_one_row() {
    let harness = DbHarness::new();
    let service = Arc::new(harness.service());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                service.sync(request("race@example.com", Some("uuid-race"), &format!("n{i}"))).await
            })
        })
        .collect();

    let mut created = 0;
    for handle in handles {
        let outcome = handle.await.expect("task should not panic").expect("sync should succeed");
        assert_eq!(outcome.profile.email, "race@example.com");
        if outcome.created {
            created += 1;
        }
    }

    assert_eq!(created, 1, "exactly one caller creates the row");
    assert_eq!(harness.row_count(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn sync_is_idempotent_against_sqlite() {
    let harness = DbHarness::new();
    let service = harness.service();

    let first = service.sync(request("ana@example.com", Some("uuid-1"), "Ana")).await.unwrap();
    let second = service.sync(request("ana@example.com", Some("uuid-1"), "Ana")).await.unwrap();

    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.profile.id, second.profile.id);
    assert_eq!(first.profile.full_name, second.profile.full_name);
    assert!(second.profile.updated_at >= first.profile.updated_at);
    assert_eq!(harness.row_count(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn email_only_row_is_linked_on_first_provider_sync() {
    let harness = DbHarness::new();
    let service = harness.service();

    let legacy = service.sync(request("ana@example.com", None, "Ana")).await.unwrap();
    assert_eq!(legacy.profile.external_id, None);

    let linked =
        service.sync(request("ana@example.com", Some("uuid-1"), "Ana Lima")).await.unwrap();
    assert!(!linked.created);
    assert_eq!(linked.profile.id, legacy.profile.id);
    assert_eq!(linked.profile.external_id.as_deref(), Some("uuid-1"));

    let stored = harness.repository.get_by_external_id("uuid-1").await.unwrap().unwrap();
    assert_eq!(stored.full_name.as_deref(), Some("Ana Lima"));
}

#[tokio::test(flavor = "multi_thread")]
async fn email_claimed_by_another_identity_is_a_conflict() {
    let harness = DbHarness::new();
    let service = harness.service();

    service.sync(request("ana@example.com", Some("uuid-1"), "Ana")).await.unwrap();
    let err = service.sync(request("ana@example.com", Some("uuid-2"), "Eve")).await.unwrap_err();

    assert!(matches!(err, AccountError::Conflict(_)), "got {err:?}");
    assert_eq!(harness.row_count(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_fields_never_erase_stored_values() {
    let harness = DbHarness::new();
    let service = harness.service();

    service
        .sync(SyncRequest::new(
            ProfileIdentity::by_email("ana@example.com"),
            ProfileAttributes {
                full_name: Some("Ana".into()),
                city: Some("Recife".into()),
                ..ProfileAttributes::default()
            },
        ))
        .await
        .unwrap();

    let outcome = service
        .sync(SyncRequest::new(
            ProfileIdentity::by_email("ana@example.com"),
            ProfileAttributes {
                full_name: Some("".into()),
                country: Some("Brasil".into()),
                ..ProfileAttributes::default()
            },
        ))
        .await
        .unwrap();

    assert_eq!(outcome.profile.full_name.as_deref(), Some("Ana"));
    assert_eq!(outcome.profile.city.as_deref(), Some("Recife"));
    assert_eq!(outcome.profile.country.as_deref(), Some("Brasil"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_merges_of_different_fields_both_survive() {
    let harness = DbHarness::new();
    let service = Arc::new(harness.service());

    for round in 0..50 {
        let email = format!("ana{round}@example.com");
        service.sync(request(&email, None, "Ana")).await.expect("seed row should be created");

        let attributes = [
            ProfileAttributes { city: Some("Recife".into()), ..ProfileAttributes::default() },
            ProfileAttributes { phone: Some("123".into()), ..ProfileAttributes::default() },
        ];
        let handles: Vec<_> = attributes
            .into_iter()
            .map(|attributes| {
                let service = Arc::clone(&service);
                let identity = ProfileIdentity::by_email(email.clone());
                let request = SyncRequest::new(identity, attributes);
                tokio::spawn(async move { service.sync(request).await })
            })
            .collect();
        for handle in handles {
            handle.await.expect("task should not panic").expect("merge should succeed");
        }

        let stored = harness
            .repository
            .get_by_email(&email)
            .await
            .expect("lookup should succeed")
            .expect("row should exist");
        assert_eq!(stored.city.as_deref(), Some("Recife"), "round {round}");
        assert_eq!(stored.phone.as_deref(), Some("123"), "round {round}");
        assert_eq!(stored.full_name.as_deref(), Some("Ana"), "round {round}");
    }
}
