use crate::database::error::DatabaseError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Payment lifecycle state of an order. Owned exclusively by the
/// reconciliation engine after order creation; the admin fulfillment
/// progression lives in a separate column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    PendingPayment,
    Paid,
    PaymentFailed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::PendingPayment => "pending_payment",
            OrderStatus::Paid => "paid",
            OrderStatus::PaymentFailed => "payment_failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending_payment" => Some(OrderStatus::PendingPayment),
            "paid" => Some(OrderStatus::Paid),
            "payment_failed" => Some(OrderStatus::PaymentFailed),
            _ => None,
        }
    }
}

/// Outcome of an atomic conditional transition. `NoOp` means the guard
/// rejected the update (already in the target state, or non-downgradable),
/// which callers use to suppress duplicate side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied,
    NoOp,
}

/// A checkout line item as stored in the order's JSONB column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: Uuid,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
}

/// Order entity
#[derive(Debug, Clone, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub user_id: String,
    pub merchant_reference: String,
    pub tracking_id: Option<String>,
    pub items: serde_json::Value,
    pub amount: Decimal,
    pub currency: String,
    pub address: serde_json::Value,
    pub status: String,
    pub paid: bool,
    pub fulfillment_status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn payment_status(&self) -> OrderStatus {
        OrderStatus::parse(&self.status).unwrap_or(OrderStatus::PendingPayment)
    }
}

/// Fields needed to persist a new order at checkout.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: String,
    pub merchant_reference: String,
    pub items: serde_json::Value,
    pub amount: Decimal,
    pub currency: String,
    pub address: serde_json::Value,
}

const ORDER_COLUMNS: &str = "id, user_id, merchant_reference, tracking_id, items, amount, \
     currency, address, status, paid, fulfillment_status, created_at, updated_at";

/// Persistence seam for orders. The `mark_*` operations are single atomic
/// conditional updates so concurrent reconciliations can never race a
/// read-then-write.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn create(&self, order: NewOrder) -> Result<Order, DatabaseError>;

    async fn set_tracking_id(&self, order_id: Uuid, tracking_id: &str)
        -> Result<(), DatabaseError>;

    async fn find_by_tracking_id(&self, tracking_id: &str) -> Result<Option<Order>, DatabaseError>;

    async fn find_by_merchant_reference(
        &self,
        merchant_reference: &str,
    ) -> Result<Option<Order>, DatabaseError>;

    /// COMPLETED observation: set paid exactly once.
    async fn mark_paid(&self, tracking_id: &str) -> Result<TransitionOutcome, DatabaseError>;

    /// Terminal FAILED/INVALID/REVERSED observation: overwrites even a paid
    /// order (genuine reversal), idempotent when already failed.
    async fn mark_payment_failed(
        &self,
        tracking_id: &str,
    ) -> Result<TransitionOutcome, DatabaseError>;

    /// PENDING or unrecognized observation: only ever touches an unpaid
    /// order (the non-downgrade guard).
    async fn mark_pending(&self, tracking_id: &str) -> Result<TransitionOutcome, DatabaseError>;

    async fn find_all(&self) -> Result<Vec<Order>, DatabaseError>;

    async fn find_by_user(&self, user_id: &str) -> Result<Vec<Order>, DatabaseError>;

    async fn update_fulfillment_status(
        &self,
        order_id: Uuid,
        fulfillment_status: &str,
    ) -> Result<Order, DatabaseError>;
}

/// Postgres-backed order store
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderStore for OrderRepository {
    async fn create(&self, order: NewOrder) -> Result<Order, DatabaseError> {
        sqlx::query_as::<_, Order>(&format!(
            "INSERT INTO orders (user_id, merchant_reference, items, amount, currency, address) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(&order.user_id)
        .bind(&order.merchant_reference)
        .bind(&order.items)
        .bind(order.amount)
        .bind(&order.currency)
        .bind(&order.address)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn set_tracking_id(
        &self,
        order_id: Uuid,
        tracking_id: &str,
    ) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            "UPDATE orders SET tracking_id = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(order_id)
        .bind(tracking_id)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Order", &order_id.to_string()));
        }
        Ok(())
    }

    async fn find_by_tracking_id(&self, tracking_id: &str) -> Result<Option<Order>, DatabaseError> {
        sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE tracking_id = $1"
        ))
        .bind(tracking_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn find_by_merchant_reference(
        &self,
        merchant_reference: &str,
    ) -> Result<Option<Order>, DatabaseError> {
        sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE merchant_reference = $1"
        ))
        .bind(merchant_reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn mark_paid(&self, tracking_id: &str) -> Result<TransitionOutcome, DatabaseError> {
        let result = sqlx::query(
            "UPDATE orders \
             SET status = 'paid', paid = TRUE, updated_at = NOW() \
             WHERE tracking_id = $1 AND paid = FALSE",
        )
        .bind(tracking_id)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(if result.rows_affected() > 0 {
            TransitionOutcome::Applied
        } else {
            TransitionOutcome::NoOp
        })
    }

    async fn mark_payment_failed(
        &self,
        tracking_id: &str,
    ) -> Result<TransitionOutcome, DatabaseError> {
        let result = sqlx::query(
            "UPDATE orders \
             SET status = 'payment_failed', paid = FALSE, updated_at = NOW() \
             WHERE tracking_id = $1 AND status <> 'payment_failed'",
        )
        .bind(tracking_id)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(if result.rows_affected() > 0 {
            TransitionOutcome::Applied
        } else {
            TransitionOutcome::NoOp
        })
    }

    async fn mark_pending(&self, tracking_id: &str) -> Result<TransitionOutcome, DatabaseError> {
        let result = sqlx::query(
            "UPDATE orders \
             SET status = 'pending_payment', updated_at = NOW() \
             WHERE tracking_id = $1 AND paid = FALSE",
        )
        .bind(tracking_id)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(if result.rows_affected() > 0 {
            TransitionOutcome::Applied
        } else {
            TransitionOutcome::NoOp
        })
    }

    async fn find_all(&self) -> Result<Vec<Order>, DatabaseError> {
        sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn find_by_user(&self, user_id: &str) -> Result<Vec<Order>, DatabaseError> {
        sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn update_fulfillment_status(
        &self,
        order_id: Uuid,
        fulfillment_status: &str,
    ) -> Result<Order, DatabaseError> {
        sqlx::query_as::<_, Order>(&format!(
            "UPDATE orders \
             SET fulfillment_status = $2, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(order_id)
        .bind(fulfillment_status)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
