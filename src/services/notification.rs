use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Delivery failed: {message}")]
    Delivery { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NotificationKind {
    PaymentConfirmed,
    PaymentFailed,
}

/// Customer-facing payment outcome message.
#[derive(Debug, Clone)]
pub struct PaymentNotification {
    pub order_id: Uuid,
    pub merchant_reference: String,
    pub tracking_id: String,
    pub recipient: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub kind: NotificationKind,
}

/// Best-effort notification dispatch. The reconciliation engine never lets
/// a dispatch failure affect a state transition; implementations must not
/// block on slow delivery.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn dispatch(&self, notification: PaymentNotification) -> Result<(), NotificationError>;
}

/// Email sink backed by a Resend-style HTTP API. Without an API key it
/// degrades to structured logging so the pipeline stays observable in
/// development.
pub struct EmailNotifier {
    client: reqwest::Client,
    api_key: Option<String>,
    from_address: String,
}

impl EmailNotifier {
    pub fn new(api_key: Option<String>, from_address: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            from_address,
        }
    }

    fn subject(notification: &PaymentNotification) -> String {
        match notification.kind {
            NotificationKind::PaymentConfirmed => {
                format!("Payment received for order {}", notification.merchant_reference)
            }
            NotificationKind::PaymentFailed => {
                format!("Payment failed for order {}", notification.merchant_reference)
            }
        }
    }

    fn body(notification: &PaymentNotification) -> String {
        match notification.kind {
            NotificationKind::PaymentConfirmed => format!(
                "We received your payment of {} {} for order {}. Your order is being prepared.",
                notification.amount, notification.currency, notification.merchant_reference
            ),
            NotificationKind::PaymentFailed => format!(
                "Your payment of {} {} for order {} did not complete. Please try checking out again.",
                notification.amount, notification.currency, notification.merchant_reference
            ),
        }
    }
}

#[async_trait]
impl NotificationSink for EmailNotifier {
    async fn dispatch(&self, notification: PaymentNotification) -> Result<(), NotificationError> {
        let Some(recipient) = notification.recipient.clone() else {
            warn!(
                order_id = %notification.order_id,
                "No recipient address on order, skipping email"
            );
            return Ok(());
        };

        let Some(api_key) = self.api_key.clone() else {
            info!(
                order_id = %notification.order_id,
                tracking_id = %notification.tracking_id,
                kind = ?notification.kind,
                recipient = %recipient,
                "Email delivery disabled, logging notification instead"
            );
            return Ok(());
        };

        let payload = serde_json::json!({
            "from": self.from_address,
            "to": [recipient],
            "subject": Self::subject(&notification),
            "text": Self::body(&notification),
        });

        // The actual send is detached: callers get an immediate Ok and the
        // spawned task observes and logs the outcome.
        let client = self.client.clone();
        let order_id = notification.order_id;
        tokio::spawn(async move {
            let result = client
                .post("https://api.resend.com/emails")
                .bearer_auth(api_key)
                .json(&payload)
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => {
                    info!(order_id = %order_id, "Notification email accepted");
                }
                Ok(response) => {
                    error!(
                        order_id = %order_id,
                        status = %response.status(),
                        "Notification email rejected"
                    );
                }
                Err(e) => {
                    error!(order_id = %order_id, error = %e, "Notification email send failed");
                }
            }
        });

        Ok(())
    }
}
