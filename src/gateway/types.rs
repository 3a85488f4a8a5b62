use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Gateway-reported payment status, mapped from the opaque
/// `payment_status_description` token. Anything unrecognized maps to
/// `Unknown` and is treated like a pending echo by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    Completed,
    Failed,
    Invalid,
    Reversed,
    Pending,
    Unknown,
}

impl PaymentStatus {
    pub fn from_description(description: &str) -> Self {
        match description.trim().to_ascii_uppercase().as_str() {
            "COMPLETED" => PaymentStatus::Completed,
            "FAILED" => PaymentStatus::Failed,
            "INVALID" => PaymentStatus::Invalid,
            "REVERSED" => PaymentStatus::Reversed,
            "PENDING" => PaymentStatus::Pending,
            _ => PaymentStatus::Unknown,
        }
    }

    /// Terminal failure statuses are authoritative re-statements and may
    /// overwrite a paid order; pending/unknown never can.
    pub fn is_terminal_failure(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Failed | PaymentStatus::Invalid | PaymentStatus::Reversed
        )
    }
}

/// Billing address block sent with an order submission.
#[derive(Debug, Clone, Serialize)]
pub struct BillingAddress {
    pub email_address: String,
    pub phone_number: String,
    pub country_code: String,
    pub first_name: String,
    pub last_name: String,
    pub line_1: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub zip_code: String,
}

/// Order description posted to the gateway's SubmitOrderRequest endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitOrderRequest {
    /// Merchant reference (our locally unique order correlation key).
    pub id: String,
    pub currency: String,
    pub amount: Decimal,
    pub description: String,
    pub callback_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_id: Option<String>,
    pub billing_address: BillingAddress,
}

/// Successful submission result.
#[derive(Debug, Clone)]
pub struct SubmittedOrder {
    pub tracking_id: String,
    pub redirect_url: String,
}

/// Authoritative status of a submitted order as reported by the gateway.
#[derive(Debug, Clone)]
pub struct TransactionStatus {
    pub tracking_id: String,
    pub status: PaymentStatus,
    /// The gateway's literal status token, kept for logs and ops output.
    pub description: String,
    pub merchant_reference: Option<String>,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub confirmation_code: Option<String>,
    pub payment_method: Option<String>,
}

/// Registered notification channel.
#[derive(Debug, Clone, Serialize)]
pub struct IpnRegistration {
    pub ipn_id: String,
    pub url: String,
}

// Wire-format responses. The gateway reports application-level failures in
// an `error` object alongside HTTP 200, so every field is optional and
// checked at the client.

#[derive(Debug, Deserialize)]
pub struct AuthTokenResponse {
    pub token: Option<String>,
    #[serde(rename = "expiryDate")]
    pub expiry_date: Option<String>,
    pub error: Option<serde_json::Value>,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitOrderResponse {
    pub order_tracking_id: Option<String>,
    pub redirect_url: Option<String>,
    pub merchant_reference: Option<String>,
    pub error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct TransactionStatusResponse {
    pub payment_status_description: Option<String>,
    pub merchant_reference: Option<String>,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub confirmation_code: Option<String>,
    pub payment_method: Option<String>,
    pub error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterIpnResponse {
    pub ipn_id: Option<String>,
    pub url: Option<String>,
    pub error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct IpnListEntry {
    pub ipn_id: Option<String>,
    pub url: Option<String>,
    #[serde(rename = "ipn_notification_type_description", default)]
    pub notification_type: Option<String>,
}
