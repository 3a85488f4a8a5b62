use crate::database::error::DatabaseError;
use crate::database::order_repository::OrderStatus;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

/// IPN processing ledger entry, one per gateway tracking id.
#[derive(Debug, Clone, FromRow)]
pub struct IpnLedgerEntry {
    pub tracking_id: String,
    pub processing_state: String,
    pub locked_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub order_status: Option<String>,
    pub retry_count: i32,
    pub last_error: Option<String>,
}

/// Result of an atomic claim. Exactly one of any set of concurrent claims
/// for the same tracking id observes `First`.
#[derive(Debug, Clone)]
pub enum ClaimOutcome {
    First(IpnLedgerEntry),
    Duplicate(IpnLedgerEntry),
}

impl ClaimOutcome {
    pub fn is_first(&self) -> bool {
        matches!(self, ClaimOutcome::First(_))
    }

    pub fn entry(&self) -> &IpnLedgerEntry {
        match self {
            ClaimOutcome::First(entry) | ClaimOutcome::Duplicate(entry) => entry,
        }
    }
}

/// At-most-once gate for webhook processing.
#[async_trait]
pub trait IdempotencyLedger: Send + Sync {
    /// Atomically claim a tracking id. Must be a single database statement;
    /// the upsert's conflict handling is what makes concurrent first
    /// arrivals resolve to exactly one `First`.
    async fn claim(&self, tracking_id: &str) -> Result<ClaimOutcome, DatabaseError>;

    async fn mark_completed(
        &self,
        tracking_id: &str,
        order_status: OrderStatus,
    ) -> Result<(), DatabaseError>;

    async fn mark_failed(&self, tracking_id: &str, error: &str) -> Result<(), DatabaseError>;

    async fn find(&self, tracking_id: &str) -> Result<Option<IpnLedgerEntry>, DatabaseError>;
}

const LEDGER_COLUMNS: &str = "tracking_id, processing_state, locked_at, processed_at, \
     order_status, retry_count, last_error";

/// Postgres-backed ledger.
///
/// A crashed processor leaves its entry in `processing`; any claim arriving
/// after `reclaim_secs` treats such an entry as abandoned and takes over as
/// a fresh first claim, so no entry stays stuck forever.
pub struct IpnLedgerRepository {
    pool: PgPool,
    reclaim_secs: u64,
}

impl IpnLedgerRepository {
    pub fn new(pool: PgPool, reclaim_secs: u64) -> Self {
        Self { pool, reclaim_secs }
    }
}

#[async_trait]
impl IdempotencyLedger for IpnLedgerRepository {
    async fn claim(&self, tracking_id: &str) -> Result<ClaimOutcome, DatabaseError> {
        let entry = sqlx::query_as::<_, IpnLedgerEntry>(&format!(
            "INSERT INTO ipn_ledger (tracking_id, processing_state, locked_at, retry_count) \
             VALUES ($1, 'processing', NOW(), 0) \
             ON CONFLICT (tracking_id) DO UPDATE SET \
                 retry_count = CASE \
                     WHEN ipn_ledger.processing_state = 'processing' \
                          AND ipn_ledger.locked_at < NOW() - make_interval(secs => $2) \
                     THEN 0 \
                     ELSE ipn_ledger.retry_count + 1 \
                 END, \
                 locked_at = CASE \
                     WHEN ipn_ledger.processing_state = 'processing' \
                          AND ipn_ledger.locked_at < NOW() - make_interval(secs => $2) \
                     THEN NOW() \
                     ELSE ipn_ledger.locked_at \
                 END \
             RETURNING {LEDGER_COLUMNS}"
        ))
        .bind(tracking_id)
        .bind(self.reclaim_secs as f64)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        // retry_count is 0 only for the creating statement (or an
        // expired-lock reclaim); every conflicting arrival increments it.
        Ok(if entry.retry_count == 0 {
            ClaimOutcome::First(entry)
        } else {
            ClaimOutcome::Duplicate(entry)
        })
    }

    async fn mark_completed(
        &self,
        tracking_id: &str,
        order_status: OrderStatus,
    ) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            "UPDATE ipn_ledger \
             SET processing_state = 'completed', order_status = $2, processed_at = NOW() \
             WHERE tracking_id = $1",
        )
        .bind(tracking_id)
        .bind(order_status.as_str())
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("IpnLedgerEntry", tracking_id));
        }
        Ok(())
    }

    async fn mark_failed(&self, tracking_id: &str, error: &str) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            "UPDATE ipn_ledger \
             SET processing_state = 'failed', last_error = $2, processed_at = NOW() \
             WHERE tracking_id = $1",
        )
        .bind(tracking_id)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("IpnLedgerEntry", tracking_id));
        }
        Ok(())
    }

    async fn find(&self, tracking_id: &str) -> Result<Option<IpnLedgerEntry>, DatabaseError> {
        sqlx::query_as::<_, IpnLedgerEntry>(&format!(
            "SELECT {LEDGER_COLUMNS} FROM ipn_ledger WHERE tracking_id = $1"
        ))
        .bind(tracking_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(retry_count: i32) -> IpnLedgerEntry {
        IpnLedgerEntry {
            tracking_id: "TRK123456789".to_string(),
            processing_state: "processing".to_string(),
            locked_at: Some(Utc::now()),
            processed_at: None,
            order_status: None,
            retry_count,
            last_error: None,
        }
    }

    #[test]
    fn claim_outcome_classification() {
        assert!(ClaimOutcome::First(entry(0)).is_first());
        assert!(!ClaimOutcome::Duplicate(entry(1)).is_first());
    }

    #[test]
    fn entry_accessor_returns_inner() {
        let outcome = ClaimOutcome::Duplicate(entry(3));
        assert_eq!(outcome.entry().retry_count, 3);
    }
}
