use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::database::order_repository::{Order, OrderStore};
use crate::error::AppError;
use crate::services::checkout::{CheckoutReceipt, CheckoutRequest, CheckoutService};

pub struct OrdersState {
    pub checkout: Arc<CheckoutService>,
    pub orders: Arc<dyn OrderStore>,
}

/// POST /api/orders/checkout
pub async fn place_order(
    State(state): State<Arc<OrdersState>>,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<CheckoutReceipt>, AppError> {
    let receipt = state.checkout.place_order(request).await?;
    Ok(Json(receipt))
}

/// GET /api/orders
pub async fn list_orders(
    State(state): State<Arc<OrdersState>>,
) -> Result<Json<Vec<OrderView>>, AppError> {
    let orders = state.orders.find_all().await?;
    Ok(Json(orders.into_iter().map(OrderView::from).collect()))
}

/// GET /api/orders/user/{user_id}
pub async fn list_user_orders(
    State(state): State<Arc<OrdersState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<OrderView>>, AppError> {
    let orders = state.orders.find_by_user(&user_id).await?;
    Ok(Json(orders.into_iter().map(OrderView::from).collect()))
}

#[derive(Debug, Deserialize)]
pub struct FulfillmentUpdate {
    pub order_id: Uuid,
    pub status: String,
}

const FULFILLMENT_STATUSES: &[&str] = &[
    "order placed",
    "packing",
    "shipped",
    "out for delivery",
    "delivered",
];

/// POST /api/orders/status
///
/// Admin fulfillment progression. Deliberately separate from the payment
/// state machine, which only the reconciliation engine may drive.
pub async fn update_fulfillment(
    State(state): State<Arc<OrdersState>>,
    Json(update): Json<FulfillmentUpdate>,
) -> Result<Json<OrderView>, AppError> {
    let status = update.status.to_lowercase();
    if !FULFILLMENT_STATUSES.contains(&status.as_str()) {
        return Err(AppError::validation(format!(
            "Unknown fulfillment status: {}",
            update.status
        )));
    }

    let order = state
        .orders
        .update_fulfillment_status(update.order_id, &status)
        .await
        .map_err(|e| {
            if e.is_not_found() {
                AppError::not_found("Order", update.order_id.to_string())
            } else {
                AppError::Database(e)
            }
        })?;

    info!(order_id = %order.id, fulfillment_status = %status, "Fulfillment status updated");
    Ok(Json(OrderView::from(order)))
}

/// Client-facing order shape.
#[derive(Debug, serde::Serialize)]
pub struct OrderView {
    pub id: Uuid,
    pub user_id: String,
    pub merchant_reference: String,
    pub tracking_id: Option<String>,
    pub items: serde_json::Value,
    pub amount: rust_decimal::Decimal,
    pub currency: String,
    pub address: serde_json::Value,
    pub status: String,
    pub paid: bool,
    pub fulfillment_status: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<Order> for OrderView {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            user_id: order.user_id,
            merchant_reference: order.merchant_reference,
            tracking_id: order.tracking_id,
            items: order.items,
            amount: order.amount,
            currency: order.currency,
            address: order.address,
            status: order.status,
            paid: order.paid,
            fulfillment_status: order.fulfillment_status,
            created_at: order.created_at,
        }
    }
}
