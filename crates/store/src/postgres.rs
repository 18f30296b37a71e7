//! PostgreSQL-backed store implementations.

use async_trait::async_trait;
use common::{PaymentId, SessionId, TransactionId, UserId};
use domain::{
    Cancellation, Money, OAuthCredential, PaymentRecord, PaymentStatus, Session, SessionStatus,
};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::credential::CredentialStore;
use crate::error::{Result, StoreError};
use crate::payment::PaymentStore;
use crate::session::SessionStore;

/// Runs the database migrations for all booking tables.
pub async fn run_migrations(pool: &PgPool) -> std::result::Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../migrations").run(pool).await
}

fn parse_session_status(value: &str) -> Result<SessionStatus> {
    match value {
        "scheduled" => Ok(SessionStatus::Scheduled),
        "completed" => Ok(SessionStatus::Completed),
        "cancelled" => Ok(SessionStatus::Cancelled),
        other => Err(StoreError::InvalidColumn {
            column: "status".to_string(),
            value: other.to_string(),
        }),
    }
}

fn parse_payment_status(value: &str) -> Result<PaymentStatus> {
    match value {
        "pending" => Ok(PaymentStatus::Pending),
        "paid" => Ok(PaymentStatus::Paid),
        "refunded" => Ok(PaymentStatus::Refunded),
        other => Err(StoreError::InvalidColumn {
            column: "status".to_string(),
            value: other.to_string(),
        }),
    }
}

/// PostgreSQL session store.
#[derive(Clone)]
pub struct PostgresSessionStore {
    pool: PgPool,
}

impl PostgresSessionStore {
    /// Creates a new PostgreSQL session store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_session(row: PgRow) -> Result<Session> {
        let cancellation: Option<Cancellation> = row
            .try_get::<Option<serde_json::Value>, _>("cancellation")?
            .map(serde_json::from_value)
            .transpose()?;

        let status: String = row.try_get("status")?;
        let duration: i32 = row.try_get("duration_minutes")?;

        Ok(Session {
            id: SessionId::from_uuid(row.try_get::<Uuid, _>("id")?),
            therapist_id: UserId::from_uuid(row.try_get::<Uuid, _>("therapist_id")?),
            client_id: UserId::from_uuid(row.try_get::<Uuid, _>("client_id")?),
            scheduled_time: row.try_get("scheduled_time")?,
            duration_minutes: duration as u32,
            meeting_link: row.try_get("meeting_link")?,
            calendar_event_id: row.try_get("calendar_event_id")?,
            transaction_id: row
                .try_get::<Option<String>, _>("transaction_id")?
                .map(TransactionId::new),
            status: parse_session_status(&status)?,
            cancellation,
            therapist_notes: row.try_get("therapist_notes")?,
            shared_notes: row.try_get("shared_notes")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl SessionStore for PostgresSessionStore {
    async fn insert(&self, session: &Session) -> Result<()> {
        let cancellation = session
            .cancellation
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO sessions (id, therapist_id, client_id, scheduled_time, duration_minutes,
                                  meeting_link, calendar_event_id, transaction_id, status,
                                  cancellation, therapist_notes, shared_notes, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(session.id.as_uuid())
        .bind(session.therapist_id.as_uuid())
        .bind(session.client_id.as_uuid())
        .bind(session.scheduled_time)
        .bind(session.duration_minutes as i32)
        .bind(&session.meeting_link)
        .bind(&session.calendar_event_id)
        .bind(session.transaction_id.as_ref().map(|t| t.as_str()))
        .bind(session.status.as_str())
        .bind(cancellation)
        .bind(&session.therapist_notes)
        .bind(&session.shared_notes)
        .bind(session.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: SessionId) -> Result<Option<Session>> {
        let row = sqlx::query("SELECT * FROM sessions WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_session).transpose()
    }

    async fn update(&self, session: &Session) -> Result<Option<Session>> {
        let cancellation = session
            .cancellation
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;

        let row = sqlx::query(
            r#"
            UPDATE sessions
            SET scheduled_time = $2, duration_minutes = $3, meeting_link = $4,
                calendar_event_id = $5, status = $6, cancellation = $7,
                therapist_notes = $8, shared_notes = $9
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(session.id.as_uuid())
        .bind(session.scheduled_time)
        .bind(session.duration_minutes as i32)
        .bind(&session.meeting_link)
        .bind(&session.calendar_event_id)
        .bind(session.status.as_str())
        .bind(cancellation)
        .bind(&session.therapist_notes)
        .bind(&session.shared_notes)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_session).transpose()
    }

    async fn delete_by_id(&self, id: SessionId) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// PostgreSQL payment ledger.
#[derive(Clone)]
pub struct PostgresPaymentStore {
    pool: PgPool,
}

impl PostgresPaymentStore {
    /// Creates a new PostgreSQL payment ledger.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_record(row: PgRow) -> Result<PaymentRecord> {
        let status: String = row.try_get("status")?;

        Ok(PaymentRecord {
            id: PaymentId::from_uuid(row.try_get::<Uuid, _>("id")?),
            transaction_id: TransactionId::new(row.try_get::<String, _>("transaction_id")?),
            therapist_id: UserId::from_uuid(row.try_get::<Uuid, _>("therapist_id")?),
            client_id: UserId::from_uuid(row.try_get::<Uuid, _>("client_id")?),
            amount: Money::from_major(row.try_get("amount_major")?),
            status: parse_payment_status(&status)?,
            provider_response: row.try_get("provider_response")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl PaymentStore for PostgresPaymentStore {
    async fn insert(&self, record: &PaymentRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (id, transaction_id, therapist_id, client_id, amount_major,
                                  status, provider_response, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(record.transaction_id.as_str())
        .bind(record.therapist_id.as_uuid())
        .bind(record.client_id.as_uuid())
        .bind(record.amount.major_units())
        .bind(record.status.as_str())
        .bind(&record.provider_response)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_transaction(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Option<PaymentRecord>> {
        let row = sqlx::query("SELECT * FROM payments WHERE transaction_id = $1")
            .bind(transaction_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_record).transpose()
    }

    async fn update(&self, record: &PaymentRecord) -> Result<Option<PaymentRecord>> {
        let row = sqlx::query(
            r#"
            UPDATE payments
            SET status = $2, provider_response = $3
            WHERE transaction_id = $1
            RETURNING *
            "#,
        )
        .bind(record.transaction_id.as_str())
        .bind(record.status.as_str())
        .bind(&record.provider_response)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_record).transpose()
    }
}

/// PostgreSQL credential store.
#[derive(Clone)]
pub struct PostgresCredentialStore {
    pool: PgPool,
}

impl PostgresCredentialStore {
    /// Creates a new PostgreSQL credential store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_credential(row: PgRow) -> Result<OAuthCredential> {
        Ok(OAuthCredential {
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            access_token: row.try_get("access_token")?,
            refresh_token: row.try_get("refresh_token")?,
            expiry_date: row.try_get("expiry_date")?,
        })
    }
}

#[async_trait]
impl CredentialStore for PostgresCredentialStore {
    async fn find_by_user(&self, user_id: UserId) -> Result<Option<OAuthCredential>> {
        let row = sqlx::query("SELECT * FROM calendar_credentials WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_credential).transpose()
    }

    async fn save(&self, credential: &OAuthCredential) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO calendar_credentials (user_id, access_token, refresh_token, expiry_date)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE SET
                access_token = EXCLUDED.access_token,
                refresh_token = EXCLUDED.refresh_token,
                expiry_date = EXCLUDED.expiry_date
            "#,
        )
        .bind(credential.user_id.as_uuid())
        .bind(&credential.access_token)
        .bind(&credential.refresh_token)
        .bind(credential.expiry_date)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
