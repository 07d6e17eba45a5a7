//! PostgreSQL implementation of PaymentRepository.
//!
//! Every state change is a single conditional `UPDATE` whose `WHERE`
//! clause carries the expected prior state; `rows_affected` says whether
//! this caller's write landed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{
    AffiliateId, DomainError, ErrorCode, PaymentId, Timestamp, UserId,
};
use crate::domain::payment::{BillingPeriod, Payment, PaymentKind, PaymentMetadata};
use crate::ports::PaymentRepository;

/// Column list shared by every query that loads a full payment.
pub(super) const PAYMENT_COLUMNS: &str = r#"
    id, checkout_reference, processor_payment_ref, status, kind, plan_id,
    billing_period, credits_amount, amount_minor, currency, owner_id,
    affiliate_id, grant_applied, reverted, metadata, created_at, updated_at,
    completed_at
"#;

pub struct PostgresPaymentRepository {
    pool: PgPool,
}

impl PostgresPaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a payment.
#[derive(Debug, sqlx::FromRow)]
pub(super) struct PaymentRow {
    id: Uuid,
    checkout_reference: Option<String>,
    processor_payment_ref: Option<String>,
    status: String,
    kind: String,
    plan_id: Option<String>,
    billing_period: Option<String>,
    credits_amount: Option<i64>,
    amount_minor: i64,
    currency: String,
    owner_id: Option<String>,
    affiliate_id: Option<String>,
    grant_applied: bool,
    reverted: bool,
    metadata: Json<PaymentMetadata>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = DomainError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let kind = match row.kind.as_str() {
            "subscription" => PaymentKind::Subscription {
                plan_id: row
                    .plan_id
                    .ok_or_else(|| corrupt("plan_id", "missing for subscription"))?,
                billing_period: row
                    .billing_period
                    .as_deref()
                    .unwrap_or("monthly")
                    .parse::<BillingPeriod>()
                    .map_err(|e| corrupt("billing_period", e))?,
            },
            "credits" | "topup" => PaymentKind::Credits {
                credits_amount: row
                    .credits_amount
                    .ok_or_else(|| corrupt("credits_amount", "missing for credits"))?,
            },
            other => return Err(corrupt("kind", format!("unknown kind '{}'", other))),
        };

        Ok(Payment {
            id: PaymentId::from_uuid(row.id),
            checkout_reference: row.checkout_reference,
            processor_payment_ref: row.processor_payment_ref,
            status: row.status.parse().map_err(|e| corrupt("status", e))?,
            kind,
            amount_minor: row.amount_minor,
            currency: row.currency,
            owner: row
                .owner_id
                .map(UserId::new)
                .transpose()
                .map_err(|e| corrupt("owner_id", e))?,
            affiliate_id: row
                .affiliate_id
                .map(AffiliateId::new)
                .transpose()
                .map_err(|e| corrupt("affiliate_id", e))?,
            grant_applied: row.grant_applied,
            reverted: row.reverted,
            metadata: row.metadata.0,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
            completed_at: row.completed_at.map(Timestamp::from_datetime),
        })
    }
}

/// A stored value that no longer decodes into the domain type.
pub(super) fn corrupt(field: &str, err: impl std::fmt::Display) -> DomainError {
    DomainError::new(
        ErrorCode::DatabaseError,
        format!("Invalid {} value in database: {}", field, err),
    )
}

#[async_trait]
impl PaymentRepository for PostgresPaymentRepository {
    async fn create(&self, payment: &Payment) -> Result<(), DomainError> {
        let (plan_id, billing_period, credits_amount) = match &payment.kind {
            PaymentKind::Subscription {
                plan_id,
                billing_period,
            } => (Some(plan_id.as_str()), Some(billing_period.as_str()), None),
            PaymentKind::Credits { credits_amount } => (None, None, Some(*credits_amount)),
        };

        sqlx::query(
            r#"
            INSERT INTO payments (
                id, checkout_reference, processor_payment_ref, status, kind, plan_id,
                billing_period, credits_amount, amount_minor, currency, owner_id,
                affiliate_id, grant_applied, reverted, metadata, created_at, updated_at,
                completed_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            "#,
        )
        .bind(payment.id.as_uuid())
        .bind(&payment.checkout_reference)
        .bind(&payment.processor_payment_ref)
        .bind(payment.status.as_str())
        .bind(payment.kind.as_str())
        .bind(plan_id)
        .bind(billing_period)
        .bind(credits_amount)
        .bind(payment.amount_minor)
        .bind(&payment.currency)
        .bind(payment.owner.as_ref().map(|o| o.as_str()))
        .bind(payment.affiliate_id.as_ref().map(|a| a.as_str()))
        .bind(payment.grant_applied)
        .bind(payment.reverted)
        .bind(Json(&payment.metadata))
        .bind(payment.created_at.as_datetime())
        .bind(payment.updated_at.as_datetime())
        .bind(payment.completed_at.map(|t| *t.as_datetime()))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.constraint() == Some("payments_checkout_reference_key") {
                    return DomainError::validation(
                        "checkout_reference",
                        "checkout reference already in use",
                    );
                }
            }
            DomainError::database("Failed to insert payment", e)
        })?;

        Ok(())
    }

    async fn find_by_id(&self, id: PaymentId) -> Result<Option<Payment>, DomainError> {
        let sql = format!("SELECT {} FROM payments WHERE id = $1", PAYMENT_COLUMNS);
        let row = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::database("Failed to fetch payment", e))?;

        row.map(Payment::try_from).transpose()
    }

    async fn find_by_checkout_reference(
        &self,
        checkout_reference: &str,
    ) -> Result<Option<Payment>, DomainError> {
        let sql = format!(
            "SELECT {} FROM payments WHERE checkout_reference = $1",
            PAYMENT_COLUMNS
        );
        let row = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(checkout_reference)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::database("Failed to fetch payment by checkout", e))?;

        row.map(Payment::try_from).transpose()
    }

    async fn find_pending_by_owner_and_amount(
        &self,
        owner: &UserId,
        amount_minor: i64,
    ) -> Result<Option<Payment>, DomainError> {
        let sql = format!(
            r#"
            SELECT {} FROM payments
            WHERE owner_id = $1 AND status = 'pending' AND amount_minor = $2
            ORDER BY created_at DESC
            LIMIT 1
            "#,
            PAYMENT_COLUMNS
        );
        let row = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(owner.as_str())
            .bind(amount_minor)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::database("Failed to fetch pending payment", e))?;

        row.map(Payment::try_from).transpose()
    }

    async fn find_latest_pending_for_owner(
        &self,
        owner: &UserId,
    ) -> Result<Option<Payment>, DomainError> {
        let sql = format!(
            r#"
            SELECT {} FROM payments
            WHERE owner_id = $1 AND status = 'pending'
            ORDER BY created_at DESC
            LIMIT 1
            "#,
            PAYMENT_COLUMNS
        );
        let row = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(owner.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::database("Failed to fetch pending payment", e))?;

        row.map(Payment::try_from).transpose()
    }

    async fn find_recent_completed_for_owner(
        &self,
        owner: &UserId,
        since: Timestamp,
    ) -> Result<Option<Payment>, DomainError> {
        let sql = format!(
            r#"
            SELECT {} FROM payments
            WHERE owner_id = $1 AND status = 'completed' AND completed_at >= $2
            ORDER BY completed_at DESC
            LIMIT 1
            "#,
            PAYMENT_COLUMNS
        );
        let row = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(owner.as_str())
            .bind(since.as_datetime())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::database("Failed to fetch completed payment", e))?;

        row.map(Payment::try_from).transpose()
    }

    async fn list_pending(&self, limit: u32) -> Result<Vec<Payment>, DomainError> {
        let sql = format!(
            "SELECT {} FROM payments WHERE status = 'pending' ORDER BY created_at ASC LIMIT $1",
            PAYMENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::database("Failed to list pending payments", e))?;

        rows.into_iter().map(Payment::try_from).collect()
    }

    async fn expire_if_pending(&self, id: PaymentId, at: Timestamp) -> Result<bool, DomainError> {
        let mut patch = PaymentMetadata::new();
        patch.record_expiry(at);

        let result = sqlx::query(
            r#"
            UPDATE payments SET
                status = 'expired',
                metadata = metadata || $3,
                updated_at = $2
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id.as_uuid())
        .bind(at.as_datetime())
        .bind(Json(&patch))
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to expire payment", e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn link_owner(
        &self,
        id: PaymentId,
        owner: &UserId,
        at: Timestamp,
    ) -> Result<bool, DomainError> {
        let mut patch = PaymentMetadata::new();
        patch.record_link(at);

        let result = sqlx::query(
            r#"
            UPDATE payments SET
                owner_id = $2,
                metadata = metadata || $4,
                updated_at = $3
            WHERE id = $1 AND owner_id IS NULL
            "#,
        )
        .bind(id.as_uuid())
        .bind(owner.as_str())
        .bind(at.as_datetime())
        .bind(Json(&patch))
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to link payment owner", e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn set_processor_payment_ref(
        &self,
        id: PaymentId,
        processor_payment_ref: &str,
    ) -> Result<(), DomainError> {
        sqlx::query("UPDATE payments SET processor_payment_ref = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(processor_payment_ref)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::database("Failed to record processor payment id", e))?;
        Ok(())
    }
}
