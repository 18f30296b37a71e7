//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use chrono::{Duration, Utc};
use common::{SessionId, TransactionId, UserId};
use domain::{CancelledBy, Money, OAuthCredential, PaymentRecord, PaymentStatus, Session,
    SessionStatus};
use serial_test::serial;
use sqlx::PgPool;
use store::{
    CredentialStore, PaymentStore, PostgresCredentialStore, PostgresPaymentStore,
    PostgresSessionStore, SessionStore,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            // Create a temporary pool just for migrations
            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_booking_tables.sql"
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

/// Get a fresh pool with cleared tables
async fn get_test_pool() -> PgPool {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    // Clear tables for test isolation
    sqlx::query("TRUNCATE TABLE sessions, payments, calendar_credentials")
        .execute(&pool)
        .await
        .unwrap();

    pool
}

fn make_session() -> Session {
    Session::scheduled(
        SessionId::new(),
        UserId::new(),
        UserId::new(),
        Utc::now() + Duration::days(2),
        60,
        "https://meet.example.com/pg",
        "EVT-PG-1",
        TransactionId::new("PIDX-PG-1"),
    )
}

#[tokio::test]
#[serial]
async fn test_session_roundtrip() {
    let store = PostgresSessionStore::new(get_test_pool().await);
    let session = make_session();

    store.insert(&session).await.unwrap();

    let loaded = store.find_by_id(session.id).await.unwrap().unwrap();
    assert_eq!(loaded.id, session.id);
    assert_eq!(loaded.status, SessionStatus::Scheduled);
    assert_eq!(loaded.meeting_link, session.meeting_link);
    assert_eq!(loaded.calendar_event_id.as_deref(), Some("EVT-PG-1"));
    assert_eq!(loaded.transaction_id, session.transaction_id);
}

#[tokio::test]
#[serial]
async fn test_session_update_persists_cancellation() {
    let store = PostgresSessionStore::new(get_test_pool().await);
    let mut session = make_session();
    store.insert(&session).await.unwrap();

    session
        .cancel(
            Some("Schedule conflict".to_string()),
            CancelledBy::Client,
            Utc::now(),
        )
        .unwrap();
    let updated = store.update(&session).await.unwrap().unwrap();
    assert_eq!(updated.status, SessionStatus::Cancelled);

    let loaded = store.find_by_id(session.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, SessionStatus::Cancelled);
    let cancellation = loaded.cancellation.unwrap();
    assert_eq!(cancellation.reason.as_deref(), Some("Schedule conflict"));
    assert_eq!(cancellation.cancelled_by, CancelledBy::Client);
}

#[tokio::test]
#[serial]
async fn test_session_update_missing_returns_none() {
    let store = PostgresSessionStore::new(get_test_pool().await);
    let session = make_session();
    assert!(store.update(&session).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn test_session_delete() {
    let store = PostgresSessionStore::new(get_test_pool().await);
    let session = make_session();
    store.insert(&session).await.unwrap();

    store.delete_by_id(session.id).await.unwrap();
    assert!(store.find_by_id(session.id).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn test_payment_roundtrip_and_status_transitions() {
    let store = PostgresPaymentStore::new(get_test_pool().await);
    let mut record = PaymentRecord::pending(
        TransactionId::new("PIDX-PG-2"),
        UserId::new(),
        UserId::new(),
        Money::from_major(1500),
    );
    store.insert(&record).await.unwrap();

    let loaded = store
        .find_by_transaction(&record.transaction_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded.status, PaymentStatus::Pending);
    assert_eq!(loaded.amount, Money::from_major(1500));

    record
        .mark_paid(serde_json::json!({"status": "Completed"}))
        .unwrap();
    store.update(&record).await.unwrap().unwrap();

    record
        .mark_refunded(serde_json::json!({"status": "Refunded"}))
        .unwrap();
    let updated = store.update(&record).await.unwrap().unwrap();
    assert_eq!(updated.status, PaymentStatus::Refunded);
    assert_eq!(
        updated.provider_response,
        Some(serde_json::json!({"status": "Refunded"}))
    );
}

#[tokio::test]
#[serial]
async fn test_duplicate_transaction_id_rejected() {
    let store = PostgresPaymentStore::new(get_test_pool().await);
    let record = PaymentRecord::pending(
        TransactionId::new("PIDX-PG-3"),
        UserId::new(),
        UserId::new(),
        Money::from_major(900),
    );
    store.insert(&record).await.unwrap();

    let duplicate = PaymentRecord::pending(
        TransactionId::new("PIDX-PG-3"),
        UserId::new(),
        UserId::new(),
        Money::from_major(900),
    );
    assert!(store.insert(&duplicate).await.is_err());
}

#[tokio::test]
#[serial]
async fn test_credential_upsert() {
    let store = PostgresCredentialStore::new(get_test_pool().await);
    let user_id = UserId::new();

    let mut cred = OAuthCredential::new(user_id, "old", "rt", Utc::now() - Duration::minutes(5));
    store.save(&cred).await.unwrap();

    cred.apply_refresh("new", Utc::now() + Duration::hours(1));
    store.save(&cred).await.unwrap();

    let loaded = store.find_by_user(user_id).await.unwrap().unwrap();
    assert_eq!(loaded.access_token, "new");
    assert_eq!(loaded.refresh_token, "rt");
}
