//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p document-store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use document_store::{
    Document, DocumentStore, DocumentStoreError, DocumentStoreExt, OutboxMessage, OutboxQuery,
    PostgresDocumentStore, SaveOptions, Version,
};
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_documents_table.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresDocumentStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE outbox, documents")
        .execute(&pool)
        .await
        .unwrap();

    PostgresDocumentStore::new(pool)
}

fn trip_document(id: &str, status: &str) -> Document {
    Document::new("trips", id, serde_json::json!({"status": status}))
}

fn trip_message(id: &str, event_type: &str) -> OutboxMessage {
    OutboxMessage::new("trips", id, event_type, serde_json::json!({"trip": id}))
}

#[tokio::test]
#[serial]
async fn insert_and_get_document() {
    let store = get_test_store().await;

    let version = store.insert(trip_document("T1", "requested")).await.unwrap();
    assert_eq!(version, Version::first());

    let doc = store.get("trips", "T1").await.unwrap().unwrap();
    assert_eq!(doc.version, Version::first());
    assert_eq!(doc.body["status"], "requested");
}

#[tokio::test]
#[serial]
async fn insert_duplicate_is_rejected() {
    let store = get_test_store().await;
    store.insert(trip_document("T1", "requested")).await.unwrap();

    let result = store.insert(trip_document("T1", "requested")).await;
    assert!(matches!(
        result,
        Err(DocumentStoreError::AlreadyExists { .. })
    ));
}

#[tokio::test]
#[serial]
async fn save_with_matching_version() {
    let store = get_test_store().await;
    store.insert(trip_document("T1", "requested")).await.unwrap();

    let version = store
        .save(
            trip_document("T1", "accepted"),
            SaveOptions::expect_version(Version::first()),
            vec![trip_message("T1", "DriverAssigned")],
        )
        .await
        .unwrap();
    assert_eq!(version, Version::new(2));

    let doc = store.get_required("trips", "T1").await.unwrap();
    assert_eq!(doc.body["status"], "accepted");

    let pending = store.pending_outbox(OutboxQuery::new()).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].event_type, "DriverAssigned");
}

#[tokio::test]
#[serial]
async fn save_with_stale_version_conflicts_and_writes_nothing() {
    let store = get_test_store().await;
    store.insert(trip_document("T1", "requested")).await.unwrap();
    store
        .save(
            trip_document("T1", "accepted"),
            SaveOptions::expect_version(Version::first()),
            vec![],
        )
        .await
        .unwrap();

    let result = store
        .save(
            trip_document("T1", "cancelled"),
            SaveOptions::expect_version(Version::first()),
            vec![trip_message("T1", "Stale")],
        )
        .await;

    match result {
        Err(DocumentStoreError::ConcurrencyConflict {
            expected, actual, ..
        }) => {
            assert_eq!(expected, Version::first());
            assert_eq!(actual, Version::new(2));
        }
        other => panic!("expected conflict, got {other:?}"),
    }

    let doc = store.get_required("trips", "T1").await.unwrap();
    assert_eq!(doc.body["status"], "accepted");
    assert!(
        store
            .pending_outbox(OutboxQuery::new())
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
#[serial]
async fn save_missing_document_is_not_found() {
    let store = get_test_store().await;

    let result = store
        .save(
            trip_document("missing", "accepted"),
            SaveOptions::expect_version(Version::first()),
            vec![],
        )
        .await;
    assert!(matches!(result, Err(DocumentStoreError::NotFound { .. })));
}

#[tokio::test]
#[serial]
async fn mark_published_hides_message() {
    let store = get_test_store().await;
    store.insert(trip_document("T1", "requested")).await.unwrap();

    let message = trip_message("T1", "DriverAssigned");
    let message_id = message.id;
    store
        .save(
            trip_document("T1", "accepted"),
            SaveOptions::new(),
            vec![message],
        )
        .await
        .unwrap();

    store.mark_published(message_id).await.unwrap();
    store.mark_published(message_id).await.unwrap();

    let pending = store.pending_outbox(OutboxQuery::new()).await.unwrap();
    assert!(pending.is_empty());
}

#[tokio::test]
#[serial]
async fn pending_outbox_filters_by_age_and_limit() {
    let store = get_test_store().await;
    store.insert(trip_document("T1", "requested")).await.unwrap();

    store
        .save(
            trip_document("T1", "requested"),
            SaveOptions::new(),
            vec![
                trip_message("T1", "First"),
                trip_message("T1", "Second"),
                trip_message("T1", "Third"),
            ],
        )
        .await
        .unwrap();

    let limited = store
        .pending_outbox(OutboxQuery::new().collection("trips").limit(2))
        .await
        .unwrap();
    assert_eq!(limited.len(), 2);

    let too_old = store
        .pending_outbox(
            OutboxQuery::new().created_before(chrono::Utc::now() - chrono::Duration::hours(1)),
        )
        .await
        .unwrap();
    assert!(too_old.is_empty());
}

#[tokio::test]
#[serial]
async fn concurrent_saves_have_single_winner() {
    let store = get_test_store().await;
    store.insert(trip_document("T1", "requested")).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..5 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .save(
                    Document::new("trips", "T1", serde_json::json!({"writer": i})),
                    SaveOptions::expect_version(Version::first()),
                    vec![],
                )
                .await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);

    let doc = store.get_required("trips", "T1").await.unwrap();
    assert_eq!(doc.version, Version::new(2));
}
