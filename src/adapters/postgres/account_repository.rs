//! PostgreSQL implementation of AccountRepository, plus the row helpers
//! the activation transaction uses to lock and rewrite an account.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::payment_repository::corrupt;
use crate::domain::account::{Account, UsageCounters};
use crate::domain::foundation::{
    CreditTransactionId, DomainError, PaymentId, Timestamp, UserId,
};
use crate::domain::ledger::CreditTransaction;
use crate::ports::AccountRepository;

pub struct PostgresAccountRepository {
    pool: PgPool,
}

impl PostgresAccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct AccountRow {
    user_id: String,
    plan_id: Option<String>,
    subscription_status: String,
    subscription_expires_at: Option<DateTime<Utc>>,
    analyses_used: i32,
    usage_period_started_at: Option<DateTime<Utc>>,
    credit_balance: i64,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AccountRow> for Account {
    type Error = DomainError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        Ok(Account {
            user_id: UserId::new(row.user_id).map_err(|e| corrupt("user_id", e))?,
            plan_id: row.plan_id,
            subscription_status: row
                .subscription_status
                .parse()
                .map_err(|e| corrupt("subscription_status", e))?,
            subscription_expires_at: row.subscription_expires_at.map(Timestamp::from_datetime),
            usage: UsageCounters {
                analyses_used: row.analyses_used,
                period_started_at: row.usage_period_started_at.map(Timestamp::from_datetime),
            },
            credit_balance: row.credit_balance,
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CreditTransactionRow {
    id: Uuid,
    user_id: String,
    amount: i64,
    balance_after: i64,
    reason: String,
    payment_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFrom<CreditTransactionRow> for CreditTransaction {
    type Error = DomainError;

    fn try_from(row: CreditTransactionRow) -> Result<Self, Self::Error> {
        Ok(CreditTransaction {
            id: CreditTransactionId::from_uuid(row.id),
            user_id: UserId::new(row.user_id).map_err(|e| corrupt("user_id", e))?,
            amount: row.amount,
            balance_after: row.balance_after,
            reason: row.reason.parse().map_err(|e| corrupt("reason", e))?,
            payment_id: row.payment_id.map(PaymentId::from_uuid),
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

const ACCOUNT_COLUMNS: &str = r#"
    user_id, plan_id, subscription_status, subscription_expires_at, analyses_used,
    usage_period_started_at, credit_balance, updated_at
"#;

/// Creates the account if missing, then row-locks it for the rest of the
/// transaction.
pub(super) async fn lock_account(
    conn: &mut PgConnection,
    user_id: &UserId,
    now: Timestamp,
) -> Result<Account, DomainError> {
    sqlx::query(
        r#"
        INSERT INTO accounts (user_id, subscription_status, credit_balance, updated_at)
        VALUES ($1, 'inactive', 0, $2)
        ON CONFLICT (user_id) DO NOTHING
        "#,
    )
    .bind(user_id.as_str())
    .bind(now.as_datetime())
    .execute(&mut *conn)
    .await
    .map_err(|e| DomainError::database("Failed to create account", e))?;

    let sql = format!(
        "SELECT {} FROM accounts WHERE user_id = $1 FOR UPDATE",
        ACCOUNT_COLUMNS
    );
    let row = sqlx::query_as::<_, AccountRow>(&sql)
        .bind(user_id.as_str())
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| DomainError::database("Failed to lock account", e))?;

    Account::try_from(row)
}

/// Locks an existing account without creating one.
pub(super) async fn lock_existing_account(
    conn: &mut PgConnection,
    user_id: &UserId,
) -> Result<Option<Account>, DomainError> {
    let sql = format!(
        "SELECT {} FROM accounts WHERE user_id = $1 FOR UPDATE",
        ACCOUNT_COLUMNS
    );
    let row = sqlx::query_as::<_, AccountRow>(&sql)
        .bind(user_id.as_str())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| DomainError::database("Failed to lock account", e))?;

    row.map(Account::try_from).transpose()
}

pub(super) async fn save_account(
    conn: &mut PgConnection,
    account: &Account,
) -> Result<(), DomainError> {
    sqlx::query(
        r#"
        UPDATE accounts SET
            plan_id = $2,
            subscription_status = $3,
            subscription_expires_at = $4,
            analyses_used = $5,
            usage_period_started_at = $6,
            credit_balance = $7,
            updated_at = $8
        WHERE user_id = $1
        "#,
    )
    .bind(account.user_id.as_str())
    .bind(&account.plan_id)
    .bind(account.subscription_status.as_str())
    .bind(account.subscription_expires_at.map(|t| *t.as_datetime()))
    .bind(account.usage.analyses_used)
    .bind(account.usage.period_started_at.map(|t| *t.as_datetime()))
    .bind(account.credit_balance)
    .bind(account.updated_at.as_datetime())
    .execute(&mut *conn)
    .await
    .map_err(|e| DomainError::database("Failed to update account", e))?;

    Ok(())
}

pub(super) async fn append_credit_transaction(
    conn: &mut PgConnection,
    tx: &CreditTransaction,
) -> Result<(), DomainError> {
    sqlx::query(
        r#"
        INSERT INTO credit_transactions (
            id, user_id, amount, balance_after, reason, payment_id, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(tx.id.as_uuid())
    .bind(tx.user_id.as_str())
    .bind(tx.amount)
    .bind(tx.balance_after)
    .bind(tx.reason.as_str())
    .bind(tx.payment_id.map(|id| *id.as_uuid()))
    .bind(tx.created_at.as_datetime())
    .execute(&mut *conn)
    .await
    .map_err(|e| DomainError::database("Failed to append credit transaction", e))?;

    Ok(())
}

#[async_trait]
impl AccountRepository for PostgresAccountRepository {
    async fn find(&self, user_id: &UserId) -> Result<Option<Account>, DomainError> {
        let sql = format!("SELECT {} FROM accounts WHERE user_id = $1", ACCOUNT_COLUMNS);
        let row = sqlx::query_as::<_, AccountRow>(&sql)
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::database("Failed to fetch account", e))?;

        row.map(Account::try_from).transpose()
    }

    async fn credit_history(&self, user_id: &UserId) -> Result<Vec<CreditTransaction>, DomainError> {
        let rows = sqlx::query_as::<_, CreditTransactionRow>(
            r#"
            SELECT id, user_id, amount, balance_after, reason, payment_id, created_at
            FROM credit_transactions
            WHERE user_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to fetch credit history", e))?;

        rows.into_iter().map(CreditTransaction::try_from).collect()
    }
}
