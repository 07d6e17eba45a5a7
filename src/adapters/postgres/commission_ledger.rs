//! PostgreSQL implementation of CommissionLedger.
//!
//! `commissions.payment_id` is UNIQUE; a second insert for the same
//! payment hits `ON CONFLICT DO NOTHING` and affects zero rows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::payment_repository::corrupt;
use crate::domain::foundation::{AffiliateId, CommissionId, DomainError, PaymentId, Timestamp, UserId};
use crate::domain::ledger::Commission;
use crate::ports::{CommissionLedger, RecordOutcome};

pub struct PostgresCommissionLedger {
    pool: PgPool,
}

impl PostgresCommissionLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CommissionRow {
    id: Uuid,
    affiliate_id: String,
    referred_user_id: String,
    payment_id: Uuid,
    payment_amount_minor: i64,
    rate_bps: i32,
    amount_minor: i64,
    currency: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<CommissionRow> for Commission {
    type Error = DomainError;

    fn try_from(row: CommissionRow) -> Result<Self, Self::Error> {
        Ok(Commission {
            id: CommissionId::from_uuid(row.id),
            affiliate_id: AffiliateId::new(row.affiliate_id)
                .map_err(|e| corrupt("affiliate_id", e))?,
            referred_user_id: UserId::new(row.referred_user_id)
                .map_err(|e| corrupt("referred_user_id", e))?,
            payment_id: PaymentId::from_uuid(row.payment_id),
            payment_amount_minor: row.payment_amount_minor,
            rate_bps: u32::try_from(row.rate_bps).map_err(|e| corrupt("rate_bps", e))?,
            amount_minor: row.amount_minor,
            currency: row.currency,
            status: row.status.parse().map_err(|e| corrupt("status", e))?,
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

#[async_trait]
impl CommissionLedger for PostgresCommissionLedger {
    async fn record(&self, commission: &Commission) -> Result<RecordOutcome, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO commissions (
                id, affiliate_id, referred_user_id, payment_id, payment_amount_minor,
                rate_bps, amount_minor, currency, status, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (payment_id) DO NOTHING
            "#,
        )
        .bind(commission.id.as_uuid())
        .bind(commission.affiliate_id.as_str())
        .bind(commission.referred_user_id.as_str())
        .bind(commission.payment_id.as_uuid())
        .bind(commission.payment_amount_minor)
        .bind(commission.rate_bps as i32)
        .bind(commission.amount_minor)
        .bind(&commission.currency)
        .bind(commission.status.as_str())
        .bind(commission.created_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to record commission", e))?;

        if result.rows_affected() == 0 {
            Ok(RecordOutcome::Duplicate)
        } else {
            Ok(RecordOutcome::Recorded)
        }
    }

    async fn find_by_payment(
        &self,
        payment_id: PaymentId,
    ) -> Result<Option<Commission>, DomainError> {
        let row = sqlx::query_as::<_, CommissionRow>(
            r#"
            SELECT id, affiliate_id, referred_user_id, payment_id, payment_amount_minor,
                   rate_bps, amount_minor, currency, status, created_at
            FROM commissions
            WHERE payment_id = $1
            "#,
        )
        .bind(payment_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to fetch commission", e))?;

        row.map(Commission::try_from).transpose()
    }
}
