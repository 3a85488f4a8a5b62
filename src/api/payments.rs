use axum::{
    extract::{Query, RawQuery, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::PesapalConfig;
use crate::database::order_repository::OrderStore;
use crate::error::AppError;
use crate::gateway::PaymentGateway;
use crate::services::reconciliation::{ReconciliationEngine, WebhookOutcome};

pub struct PaymentsState {
    pub engine: Arc<ReconciliationEngine>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub orders: Arc<dyn OrderStore>,
    pub config: PesapalConfig,
}

/// Notification fields as Pesapal sends them, via query string (GET) or
/// JSON body (POST).
#[derive(Debug, Default, Deserialize)]
pub struct IpnParams {
    #[serde(rename = "OrderTrackingId", alias = "orderTrackingId", default)]
    pub order_tracking_id: Option<String>,
    #[serde(
        rename = "OrderMerchantReference",
        alias = "orderMerchantReference",
        default
    )]
    pub order_merchant_reference: Option<String>,
    #[serde(
        rename = "OrderNotificationType",
        alias = "orderNotificationType",
        default
    )]
    pub order_notification_type: Option<String>,
}

fn signature_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-pesapal-signature")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// GET /api/payments/ipn
///
/// GET-style notifications carry no body; the signature covers the query
/// string itself, so that is what gets verified.
pub async fn handle_ipn_get(
    State(state): State<Arc<PaymentsState>>,
    headers: HeaderMap,
    RawQuery(raw_query): RawQuery,
    Query(params): Query<IpnParams>,
) -> Response {
    let raw = raw_query.unwrap_or_default();
    process_ipn(&state, &headers, params, raw.as_bytes()).await
}

/// POST /api/payments/ipn
pub async fn handle_ipn_post(
    State(state): State<Arc<PaymentsState>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let params: IpnParams = serde_json::from_str(&body).unwrap_or_else(|e| {
        warn!(error = %e, "Unparseable IPN body, acknowledging anyway");
        IpnParams::default()
    });
    process_ipn(&state, &headers, params, body.as_bytes()).await
}

/// The gateway retries any non-200 acknowledgement, so every internal
/// outcome collapses to 200 here and failures are left to logs and the
/// ledger.
async fn process_ipn(
    state: &PaymentsState,
    headers: &HeaderMap,
    params: IpnParams,
    raw_body: &[u8],
) -> Response {
    let Some(tracking_id) = params.order_tracking_id.as_deref() else {
        warn!("IPN without OrderTrackingId");
        return (StatusCode::OK, "IPN received").into_response();
    };

    info!(
        tracking_id = %tracking_id,
        notification_type = params.order_notification_type.as_deref().unwrap_or("-"),
        "Received IPN"
    );

    let signature = signature_header(headers);
    match state
        .engine
        .process_notification(
            tracking_id,
            params.order_merchant_reference.as_deref(),
            raw_body,
            signature.as_deref(),
        )
        .await
    {
        Ok(WebhookOutcome::Reconciled(outcome)) => {
            info!(
                tracking_id = %tracking_id,
                order_status = outcome.order_status.as_str(),
                "IPN reconciled"
            );
        }
        Ok(WebhookOutcome::Duplicate { .. }) => {
            info!(tracking_id = %tracking_id, "IPN duplicate, already claimed");
        }
        Ok(WebhookOutcome::Rejected { reason }) => {
            warn!(tracking_id = %tracking_id, reason = reason, "IPN rejected");
        }
        Err(e) => {
            error!(tracking_id = %tracking_id, error = %e, "IPN processing failed");
        }
    }

    (StatusCode::OK, "IPN received").into_response()
}

#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    #[serde(rename = "OrderTrackingId", alias = "orderTrackingId", default)]
    pub order_tracking_id: Option<String>,
}

/// GET /api/payments/callback
///
/// Browser redirect after the hosted payment page. Reconciles first so the
/// storefront landing page reflects the real outcome, then 303s to it.
/// The browser always lands on the storefront, never on an API error page.
pub async fn handle_callback(
    State(state): State<Arc<PaymentsState>>,
    Query(params): Query<CallbackParams>,
) -> Redirect {
    let Some(tracking_id) = params.order_tracking_id.as_deref() else {
        warn!("Callback without OrderTrackingId");
        return Redirect::to(&format!(
            "{}/payment-failure",
            state.config.frontend_url.trim_end_matches('/')
        ));
    };

    let success = match state.engine.verify_and_update(tracking_id).await {
        Ok(outcome) => {
            info!(
                tracking_id = %tracking_id,
                order_status = outcome.order_status.as_str(),
                "Callback reconciled"
            );
            outcome.order_status == crate::database::order_repository::OrderStatus::Paid
        }
        Err(e) => {
            error!(tracking_id = %tracking_id, error = %e, "Callback verification failed");
            false
        }
    };

    let page = if success {
        "payment-success"
    } else {
        "payment-failure"
    };
    let url = format!(
        "{}/{page}?orderId={tracking_id}",
        state.config.frontend_url.trim_end_matches('/')
    );
    Redirect::to(&url)
}

#[derive(Debug, Deserialize)]
pub struct StatusParams {
    #[serde(rename = "orderTrackingId", alias = "OrderTrackingId")]
    pub order_tracking_id: String,
}

#[derive(Debug, Serialize)]
pub struct PaymentStatusResponse {
    pub tracking_id: String,
    pub gateway_status: String,
    pub order_status: Option<String>,
    pub paid: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
}

/// GET /api/payments/status
///
/// Read-only view combining the gateway's report with our stored order
/// state. Never mutates anything; use the verify endpoint for that.
pub async fn payment_status(
    State(state): State<Arc<PaymentsState>>,
    Query(params): Query<StatusParams>,
) -> Result<Json<PaymentStatusResponse>, AppError> {
    let tracking_id = &params.order_tracking_id;
    let status = state.gateway.query_status(tracking_id).await?;
    let order = state.orders.find_by_tracking_id(tracking_id).await?;

    Ok(Json(PaymentStatusResponse {
        tracking_id: tracking_id.clone(),
        gateway_status: status.description,
        order_status: order
            .as_ref()
            .map(|o| o.payment_status().as_str().to_string()),
        paid: order.as_ref().map(|o| o.paid),
        confirmation_code: status.confirmation_code,
        payment_method: status.payment_method,
    }))
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub tracking_id: String,
    pub gateway_status: String,
    pub order_status: String,
    pub updated: bool,
}

/// POST /api/payments/verify
pub async fn verify_payment(
    State(state): State<Arc<PaymentsState>>,
    Query(params): Query<StatusParams>,
) -> Result<Json<VerifyResponse>, AppError> {
    let outcome = state
        .engine
        .verify_and_update(&params.order_tracking_id)
        .await?;

    Ok(Json(VerifyResponse {
        tracking_id: outcome.tracking_id,
        gateway_status: format!("{:?}", outcome.payment_status),
        order_status: outcome.order_status.as_str().to_string(),
        updated: outcome.transition == crate::database::order_repository::TransitionOutcome::Applied,
    }))
}

/// POST /api/payments/ipn-registration
///
/// One-time ops action; the resulting id goes into `PESAPAL_IPN_ID`, it is
/// never called per order.
pub async fn register_ipn(
    State(state): State<Arc<PaymentsState>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let url = state.config.ipn_url();
    let registration = state.gateway.register_ipn(&url).await?;

    info!(ipn_id = %registration.ipn_id, url = %registration.url, "Registered IPN channel");
    Ok(Json(serde_json::json!({
        "ipn_id": registration.ipn_id,
        "url": registration.url,
    })))
}

/// GET /api/payments/ipn-registration
pub async fn list_ipns(
    State(state): State<Arc<PaymentsState>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let registrations = state.gateway.list_ipns().await?;
    Ok(Json(serde_json::json!({ "registrations": registrations })))
}
