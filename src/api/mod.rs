pub mod orders;
pub mod payments;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

use orders::OrdersState;
use payments::PaymentsState;

pub fn orders_router(state: Arc<OrdersState>) -> Router {
    Router::new()
        .route("/api/orders/checkout", post(orders::place_order))
        .route("/api/orders", get(orders::list_orders))
        .route("/api/orders/user/{user_id}", get(orders::list_user_orders))
        .route("/api/orders/status", post(orders::update_fulfillment))
        .with_state(state)
}

pub fn payments_router(state: Arc<PaymentsState>) -> Router {
    Router::new()
        .route(
            "/api/payments/ipn",
            get(payments::handle_ipn_get).post(payments::handle_ipn_post),
        )
        .route("/api/payments/callback", get(payments::handle_callback))
        .route("/api/payments/status", get(payments::payment_status))
        .route("/api/payments/verify", post(payments::verify_payment))
        .route(
            "/api/payments/ipn-registration",
            post(payments::register_ipn).get(payments::list_ipns),
        )
        .with_state(state)
}
