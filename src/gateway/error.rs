use thiserror::Error;

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Failures talking to the payment gateway, classified per operation so
/// callers can apply the right surfacing policy (bubble to the user on
/// submission, ack-and-log on the webhook path, surface on manual paths).
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Gateway auth failed: {message}")]
    Auth { message: String },

    #[error("Order submission failed: {message}")]
    Submission { message: String },

    #[error("Status query failed for {tracking_id}: {message}")]
    Query {
        tracking_id: String,
        message: String,
    },

    #[error("Gateway network error: {message}")]
    Network { message: String },

    #[error("Gateway rate limit exceeded: {message}")]
    RateLimit { message: String },

    #[error("Invalid gateway response: {message}")]
    InvalidResponse { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },
}

impl GatewayError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::Network { .. } | GatewayError::RateLimit { .. }
        )
    }

    pub fn http_status_code(&self) -> u16 {
        match self {
            GatewayError::Validation { .. } => 400,
            GatewayError::RateLimit { .. } => 429,
            GatewayError::Network { .. } => 503,
            GatewayError::Auth { .. }
            | GatewayError::Submission { .. }
            | GatewayError::Query { .. }
            | GatewayError::InvalidResponse { .. } => 502,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            GatewayError::Auth { .. } => "GATEWAY_AUTH_ERROR",
            GatewayError::Submission { .. } => "GATEWAY_SUBMISSION_ERROR",
            GatewayError::Query { .. } => "GATEWAY_QUERY_ERROR",
            GatewayError::Network { .. } => "GATEWAY_NETWORK_ERROR",
            GatewayError::RateLimit { .. } => "GATEWAY_RATE_LIMIT",
            GatewayError::InvalidResponse { .. } => "GATEWAY_INVALID_RESPONSE",
            GatewayError::Validation { .. } => "VALIDATION_ERROR",
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            GatewayError::Validation { message } => message.clone(),
            GatewayError::Submission { .. } => "Failed to initiate payment".to_string(),
            GatewayError::RateLimit { .. } => {
                "Payment gateway is busy. Please retry shortly".to_string()
            }
            GatewayError::Network { .. } => {
                "Payment gateway is temporarily unavailable".to_string()
            }
            GatewayError::Auth { .. }
            | GatewayError::Query { .. }
            | GatewayError::InvalidResponse { .. } => {
                "Payment gateway returned an error".to_string()
            }
        }
    }
}
