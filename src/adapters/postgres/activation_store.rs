//! PostgreSQL implementation of ActivationStore.
//!
//! Each method runs in one transaction: the payment status compare-and-swap
//! comes first, and only the caller whose `UPDATE ... WHERE status = 'pending'`
//! touched a row goes on to lock the account, apply the grant, append the
//! ledger entry and write the outbox rows. Any error drops the transaction,
//! which rolls everything back and leaves the payment pending for the next
//! caller.

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use super::account_repository::{
    append_credit_transaction, lock_account, lock_existing_account, save_account,
};
use super::outbox_writer::insert_entry;
use crate::domain::account::Account;
use crate::domain::foundation::{DomainError, EventEnvelope, PaymentId, Timestamp, UserId};
use crate::domain::payment::{PaymentError, PaymentMetadata};
use crate::ports::{
    ActivationCommit, ActivationStore, CompletionOutcome, GrantCommit, GrantOutcome, OutboxEntry,
    OwnedGrant, ReversalCommit, ReversalOutcome,
};

pub struct PostgresActivationStore {
    pool: PgPool,
}

impl PostgresActivationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn payment_exists(conn: &mut PgConnection, id: PaymentId) -> Result<bool, DomainError> {
    let found: Option<(i32,)> = sqlx::query_as("SELECT 1 FROM payments WHERE id = $1")
        .bind(id.as_uuid())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| DomainError::database("Failed to look up payment", e))?;
    Ok(found.is_some())
}

async fn apply_owned_grant(
    conn: &mut PgConnection,
    owned: &OwnedGrant,
    payment_id: PaymentId,
    at: Timestamp,
) -> Result<Account, DomainError> {
    let mut account = lock_account(conn, &owned.user_id, at).await?;
    let ledger_entry = account.apply_grant(&owned.grant, payment_id, at);
    save_account(conn, &account).await?;
    if let Some(entry) = ledger_entry {
        append_credit_transaction(conn, &entry).await?;
    }
    Ok(account)
}

async fn enqueue(conn: &mut PgConnection, events: Vec<EventEnvelope>) -> Result<(), DomainError> {
    for event in events {
        insert_entry(conn, &OutboxEntry::for_event(event)).await?;
    }
    Ok(())
}

#[async_trait]
impl ActivationStore for PostgresActivationStore {
    async fn complete_pending(
        &self,
        commit: ActivationCommit,
    ) -> Result<CompletionOutcome, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::database("Failed to start transaction", e))?;

        let mut patch = PaymentMetadata::new();
        patch.record_activation(commit.method, commit.at);
        if commit.grant.is_some() {
            patch.record_grant(commit.at);
        }

        let result = sqlx::query(
            r#"
            UPDATE payments SET
                status = 'completed',
                grant_applied = $2,
                completed_at = $3,
                updated_at = $3,
                metadata = metadata || $4
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(commit.payment_id.as_uuid())
        .bind(commit.grant.is_some())
        .bind(commit.at.as_datetime())
        .bind(Json(&patch))
        .execute(&mut *tx)
        .await
        .map_err(|e| DomainError::database("Failed to complete payment", e))?;

        if result.rows_affected() == 0 {
            if !payment_exists(&mut *tx, commit.payment_id).await? {
                return Err(PaymentError::NotFound(commit.payment_id).into());
            }
            return Ok(CompletionOutcome::LostRace);
        }

        let account = match &commit.grant {
            Some(owned) => {
                Some(apply_owned_grant(&mut *tx, owned, commit.payment_id, commit.at).await?)
            }
            None => None,
        };
        enqueue(&mut *tx, commit.events).await?;

        tx.commit()
            .await
            .map_err(|e| DomainError::database("Failed to commit activation", e))?;

        Ok(CompletionOutcome::Completed { account })
    }

    async fn apply_deferred_grant(&self, commit: GrantCommit) -> Result<GrantOutcome, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::database("Failed to start transaction", e))?;

        let mut patch = PaymentMetadata::new();
        patch.record_grant(commit.at);

        let result = sqlx::query(
            r#"
            UPDATE payments SET
                grant_applied = TRUE,
                updated_at = $3,
                metadata = metadata || $4
            WHERE id = $1
              AND owner_id = $2
              AND status = 'completed'
              AND grant_applied = FALSE
              AND reverted = FALSE
            "#,
        )
        .bind(commit.payment_id.as_uuid())
        .bind(commit.grant.user_id.as_str())
        .bind(commit.at.as_datetime())
        .bind(Json(&patch))
        .execute(&mut *tx)
        .await
        .map_err(|e| DomainError::database("Failed to mark grant applied", e))?;

        if result.rows_affected() == 0 {
            if !payment_exists(&mut *tx, commit.payment_id).await? {
                return Err(PaymentError::NotFound(commit.payment_id).into());
            }
            return Ok(GrantOutcome::NotApplied);
        }

        let account = apply_owned_grant(&mut *tx, &commit.grant, commit.payment_id, commit.at).await?;
        enqueue(&mut *tx, commit.events).await?;

        tx.commit()
            .await
            .map_err(|e| DomainError::database("Failed to commit deferred grant", e))?;

        Ok(GrantOutcome::Applied(account))
    }

    async fn revert_completed(
        &self,
        commit: ReversalCommit,
    ) -> Result<ReversalOutcome, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::database("Failed to start transaction", e))?;

        let mut patch = PaymentMetadata::new();
        patch.record_reversal(&commit.reason, commit.at);

        let row: Option<(Option<String>, bool)> = sqlx::query_as(
            r#"
            UPDATE payments SET
                status = 'failed',
                reverted = TRUE,
                updated_at = $2,
                metadata = metadata || $3
            WHERE id = $1 AND status = 'completed'
            RETURNING owner_id, grant_applied
            "#,
        )
        .bind(commit.payment_id.as_uuid())
        .bind(commit.at.as_datetime())
        .bind(Json(&patch))
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| DomainError::database("Failed to revert payment", e))?;

        let Some((owner_id, grant_was_applied)) = row else {
            return Ok(ReversalOutcome::NotCompleted);
        };
        let owner = owner_id.map(UserId::new).transpose().map_err(DomainError::from)?;

        let clawback = owner.as_ref().zip(commit.credits_amount);
        if let (Some((user_id, amount)), true) = (clawback, grant_was_applied) {
            if let Some(mut account) = lock_existing_account(&mut *tx, user_id).await? {
                let entry = account.reverse_credits(amount, commit.payment_id, commit.at);
                save_account(&mut *tx, &account).await?;
                append_credit_transaction(&mut *tx, &entry).await?;
            }
        }

        sqlx::query(
            "UPDATE commissions SET status = 'voided' WHERE payment_id = $1 AND status = 'pending'",
        )
        .bind(commit.payment_id.as_uuid())
        .execute(&mut *tx)
        .await
        .map_err(|e| DomainError::database("Failed to void commission", e))?;

        enqueue(&mut *tx, commit.events).await?;

        tx.commit()
            .await
            .map_err(|e| DomainError::database("Failed to commit reversal", e))?;

        Ok(ReversalOutcome::Reverted {
            owner,
            grant_was_applied,
        })
    }
}
