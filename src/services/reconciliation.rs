use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::database::error::DatabaseError;
use crate::database::ledger_repository::IdempotencyLedger;
use crate::database::order_repository::{Order, OrderStatus, OrderStore, TransitionOutcome};
use crate::gateway::{GatewayError, PaymentGateway, PaymentStatus};
use crate::services::checkout::order_recipient;
use crate::services::notification::{NotificationKind, NotificationSink, PaymentNotification};

#[derive(Debug, Error)]
pub enum ReconciliationError {
    #[error("Malformed tracking id")]
    InvalidTrackingId,

    #[error("No order for tracking id {0}")]
    OrderNotFound(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// What a single reconciliation pass observed and did.
#[derive(Debug, Clone)]
pub struct ReconciliationOutcome {
    pub tracking_id: String,
    pub payment_status: PaymentStatus,
    pub order_status: OrderStatus,
    pub transition: TransitionOutcome,
}

/// Disposition of one inbound gateway notification. All three variants are
/// acknowledged to the gateway; `Rejected` and duplicates are normal
/// operation, not errors.
#[derive(Debug)]
pub enum WebhookOutcome {
    Reconciled(ReconciliationOutcome),
    Duplicate { tracking_id: String },
    Rejected { reason: &'static str },
}

/// Structural sanity check before a tracking id is allowed to drive a
/// database claim or an outbound status query.
pub fn valid_tracking_id(tracking_id: &str) -> bool {
    (10..=100).contains(&tracking_id.len())
        && tracking_id.chars().all(|c| c.is_ascii_graphic())
}

/// Drives payment state from the gateway's authoritative status.
///
/// A notification is never trusted for the outcome it implies; it only
/// names a tracking id, and the engine queries the gateway for the real
/// status before touching an order. The ledger gates the webhook path so
/// redelivered notifications collapse to a single processing attempt, and
/// the conditional `mark_*` updates make the transition itself idempotent
/// for the manual verification path that bypasses the ledger.
pub struct ReconciliationEngine {
    gateway: Arc<dyn PaymentGateway>,
    orders: Arc<dyn OrderStore>,
    ledger: Arc<dyn IdempotencyLedger>,
    notifications: Arc<dyn NotificationSink>,
}

impl ReconciliationEngine {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        orders: Arc<dyn OrderStore>,
        ledger: Arc<dyn IdempotencyLedger>,
        notifications: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            gateway,
            orders,
            ledger,
            notifications,
        }
    }

    /// Webhook path. The caller acknowledges the gateway regardless of the
    /// result; errors here are logged and surfaced for observability only.
    pub async fn process_notification(
        &self,
        tracking_id: &str,
        merchant_reference: Option<&str>,
        raw_payload: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookOutcome, ReconciliationError> {
        if !valid_tracking_id(tracking_id) {
            warn!(tracking_id = %tracking_id, "Dropping notification with malformed tracking id");
            return Ok(WebhookOutcome::Rejected {
                reason: "malformed tracking id",
            });
        }

        if !self.gateway.verify_notification(raw_payload, signature) {
            warn!(tracking_id = %tracking_id, "Dropping notification with bad signature");
            return Ok(WebhookOutcome::Rejected {
                reason: "signature verification failed",
            });
        }

        let claim = self.ledger.claim(tracking_id).await?;
        if !claim.is_first() {
            debug!(
                tracking_id = %tracking_id,
                retry_count = claim.entry().retry_count,
                "Duplicate notification, already claimed"
            );
            return Ok(WebhookOutcome::Duplicate {
                tracking_id: tracking_id.to_string(),
            });
        }

        match self.reconcile(tracking_id, merchant_reference).await {
            Ok(outcome) => {
                self.ledger
                    .mark_completed(tracking_id, outcome.order_status)
                    .await?;
                Ok(WebhookOutcome::Reconciled(outcome))
            }
            Err(e) => {
                // Best effort; a crash between claim and here is what the
                // ledger's stale-lock reclaim window exists for.
                if let Err(mark_err) = self.ledger.mark_failed(tracking_id, &e.to_string()).await {
                    error!(
                        tracking_id = %tracking_id,
                        error = %mark_err,
                        "Failed to record ledger failure"
                    );
                }
                Err(e)
            }
        }
    }

    /// Manual verification path (client callback or ops poll). No ledger
    /// gate; the conditional transitions keep repeated calls harmless.
    pub async fn verify_and_update(
        &self,
        tracking_id: &str,
    ) -> Result<ReconciliationOutcome, ReconciliationError> {
        if !valid_tracking_id(tracking_id) {
            return Err(ReconciliationError::InvalidTrackingId);
        }
        self.reconcile(tracking_id, None).await
    }

    async fn reconcile(
        &self,
        tracking_id: &str,
        merchant_reference: Option<&str>,
    ) -> Result<ReconciliationOutcome, ReconciliationError> {
        let order = self.find_order(tracking_id, merchant_reference).await?;
        let status = self.gateway.query_status(tracking_id).await?;

        let (order_status, transition) = match status.status {
            PaymentStatus::Completed => (
                OrderStatus::Paid,
                self.orders.mark_paid(tracking_id).await?,
            ),
            s if s.is_terminal_failure() => (
                OrderStatus::PaymentFailed,
                self.orders.mark_payment_failed(tracking_id).await?,
            ),
            _ => (
                OrderStatus::PendingPayment,
                self.orders.mark_pending(tracking_id).await?,
            ),
        };

        info!(
            tracking_id = %tracking_id,
            order_id = %order.id,
            gateway_status = %status.description,
            order_status = order_status.as_str(),
            transition = ?transition,
            "Reconciled payment status"
        );

        if transition == TransitionOutcome::Applied {
            match order_status {
                OrderStatus::Paid => {
                    self.notify(&order, tracking_id, NotificationKind::PaymentConfirmed)
                        .await;
                }
                OrderStatus::PaymentFailed => {
                    self.notify(&order, tracking_id, NotificationKind::PaymentFailed)
                        .await;
                }
                OrderStatus::PendingPayment => {}
            }
        }

        Ok(ReconciliationOutcome {
            tracking_id: tracking_id.to_string(),
            payment_status: status.status,
            order_status,
            transition,
        })
    }

    async fn find_order(
        &self,
        tracking_id: &str,
        merchant_reference: Option<&str>,
    ) -> Result<Order, ReconciliationError> {
        if let Some(order) = self.orders.find_by_tracking_id(tracking_id).await? {
            return Ok(order);
        }

        // A notification can outrun the checkout transaction that records
        // the tracking id; the merchant reference is the fallback key.
        if let Some(reference) = merchant_reference {
            if let Some(order) = self.orders.find_by_merchant_reference(reference).await? {
                if order.tracking_id.is_none() {
                    self.orders.set_tracking_id(order.id, tracking_id).await?;
                }
                return Ok(order);
            }
        }

        Err(ReconciliationError::OrderNotFound(tracking_id.to_string()))
    }

    /// Notification failures never affect the transition that triggered
    /// them.
    async fn notify(&self, order: &Order, tracking_id: &str, kind: NotificationKind) {
        let notification = PaymentNotification {
            order_id: order.id,
            merchant_reference: order.merchant_reference.clone(),
            tracking_id: tracking_id.to_string(),
            recipient: order_recipient(order),
            amount: order.amount,
            currency: order.currency.clone(),
            kind,
        };

        if let Err(e) = self.notifications.dispatch(notification).await {
            error!(
                order_id = %order.id,
                tracking_id = %tracking_id,
                error = %e,
                "Notification dispatch failed"
            );
        }
    }
}
