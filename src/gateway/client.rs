use crate::config::PesapalConfig;
use crate::gateway::error::{GatewayError, GatewayResult};
use crate::gateway::http::{verify_hmac_sha256_hex, GatewayHttpClient};
use crate::gateway::token::TokenCache;
use crate::gateway::types::{
    AuthTokenResponse, IpnListEntry, IpnRegistration, PaymentStatus, RegisterIpnResponse,
    SubmitOrderRequest, SubmitOrderResponse, SubmittedOrder, TransactionStatus,
    TransactionStatusResponse,
};
use crate::logging::mask_token;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

/// Outbound payment gateway operations. The reconciliation engine and the
/// checkout service depend on this seam, never on the concrete client.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Returns a valid bearer token, reusing the cached one while unexpired.
    async fn authenticate(&self) -> GatewayResult<String>;

    async fn submit_order(&self, request: SubmitOrderRequest) -> GatewayResult<SubmittedOrder>;

    async fn query_status(&self, tracking_id: &str) -> GatewayResult<TransactionStatus>;

    /// One-time registration of the webhook URL. The resulting id is cached
    /// in configuration, not re-registered per order.
    async fn register_ipn(&self, url: &str) -> GatewayResult<IpnRegistration>;

    async fn list_ipns(&self) -> GatewayResult<Vec<IpnRegistration>>;

    /// Verify a notification signature. True when no secret is configured:
    /// deployments without a shared secret process notifications as-is and
    /// rely on the status re-query for the monetary decision.
    fn verify_notification(&self, payload: &[u8], signature: Option<&str>) -> bool;
}

/// Pesapal v3 API client with transparent token lifecycle management.
pub struct PesapalClient {
    config: PesapalConfig,
    http: GatewayHttpClient,
    token_cache: TokenCache,
}

impl PesapalClient {
    pub fn new(config: PesapalConfig) -> GatewayResult<Self> {
        let http = GatewayHttpClient::new(
            std::time::Duration::from_secs(config.timeout_secs),
            config.max_retries,
        )?;

        Ok(Self {
            config,
            http,
            token_cache: TokenCache::new(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn declared_expiry(&self, response: &AuthTokenResponse, now: DateTime<Utc>) -> DateTime<Utc> {
        response
            .expiry_date
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|parsed| parsed.with_timezone(&Utc))
            .unwrap_or_else(|| now + Duration::seconds(self.config.token_ttl_secs as i64))
    }

    async fn fetch_token(&self) -> GatewayResult<String> {
        let now = Utc::now();
        let payload = serde_json::json!({
            "consumer_key": self.config.consumer_key,
            "consumer_secret": self.config.consumer_secret,
        });

        let response: AuthTokenResponse = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint("/api/Auth/RequestToken"),
                None,
                &[],
                Some(&payload),
            )
            .await
            .map_err(|e| GatewayError::Auth {
                message: e.to_string(),
            })?;

        if let Some(error) = &response.error {
            return Err(GatewayError::Auth {
                message: format!("credentials rejected: {}", error),
            });
        }

        let token = response
            .token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| GatewayError::Auth {
                message: response
                    .message
                    .clone()
                    .unwrap_or_else(|| "token missing from auth response".to_string()),
            })?;

        let expires_at = self.declared_expiry(&response, now);
        self.token_cache.store(
            token.clone(),
            expires_at,
            Duration::seconds(self.config.token_safety_secs as i64),
        );

        info!(
            token = %mask_token(&token),
            expires_at = %expires_at,
            "Gateway token refreshed"
        );
        Ok(token)
    }
}

#[async_trait]
impl PaymentGateway for PesapalClient {
    async fn authenticate(&self) -> GatewayResult<String> {
        if let Some(token) = self.token_cache.get(Utc::now()) {
            debug!("Reusing cached gateway token");
            return Ok(token);
        }
        self.fetch_token().await
    }

    async fn submit_order(&self, request: SubmitOrderRequest) -> GatewayResult<SubmittedOrder> {
        if request.amount <= rust_decimal::Decimal::ZERO {
            return Err(GatewayError::Validation {
                message: "order amount must be positive".to_string(),
            });
        }

        let token = self.authenticate().await?;
        let payload =
            serde_json::to_value(&request).map_err(|e| GatewayError::InvalidResponse {
                message: format!("failed to encode submission payload: {}", e),
            })?;

        let response: SubmitOrderResponse = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint("/api/Transactions/SubmitOrderRequest"),
                Some(&token),
                &[],
                Some(&payload),
            )
            .await
            .map_err(|e| match e {
                GatewayError::Auth { .. } => e,
                other => GatewayError::Submission {
                    message: other.to_string(),
                },
            })?;

        if let Some(error) = &response.error {
            return Err(GatewayError::Submission {
                message: format!("gateway rejected order: {}", error),
            });
        }

        let tracking_id = response.order_tracking_id.clone().filter(|v| !v.is_empty());
        let redirect_url = response.redirect_url.clone().filter(|v| !v.is_empty());

        match (tracking_id, redirect_url) {
            (Some(tracking_id), Some(redirect_url)) => {
                info!(
                    tracking_id = %tracking_id,
                    merchant_reference = %request.id,
                    "Order submitted to gateway"
                );
                Ok(SubmittedOrder {
                    tracking_id,
                    redirect_url,
                })
            }
            _ => Err(GatewayError::Submission {
                message: "submission response missing tracking id or redirect URL".to_string(),
            }),
        }
    }

    async fn query_status(&self, tracking_id: &str) -> GatewayResult<TransactionStatus> {
        let token = self.authenticate().await?;

        let response: TransactionStatusResponse = self
            .http
            .request_json(
                reqwest::Method::GET,
                &self.endpoint("/api/Transactions/GetTransactionStatus"),
                Some(&token),
                &[("orderTrackingId", tracking_id)],
                None,
            )
            .await
            .map_err(|e| match e {
                GatewayError::Auth { .. } => e,
                other => GatewayError::Query {
                    tracking_id: tracking_id.to_string(),
                    message: other.to_string(),
                },
            })?;

        if let Some(error) = &response.error {
            return Err(GatewayError::Query {
                tracking_id: tracking_id.to_string(),
                message: format!("gateway error: {}", error),
            });
        }

        let description = response
            .payment_status_description
            .clone()
            .unwrap_or_default();
        let status = PaymentStatus::from_description(&description);

        debug!(
            tracking_id = %tracking_id,
            status = ?status,
            description = %description,
            "Gateway status queried"
        );

        Ok(TransactionStatus {
            tracking_id: tracking_id.to_string(),
            status,
            description,
            merchant_reference: response.merchant_reference,
            amount: response.amount,
            currency: response.currency,
            confirmation_code: response.confirmation_code,
            payment_method: response.payment_method,
        })
    }

    async fn register_ipn(&self, url: &str) -> GatewayResult<IpnRegistration> {
        let token = self.authenticate().await?;
        let payload = serde_json::json!({
            "url": url,
            "ipn_notification_type": "GET",
        });

        let response: RegisterIpnResponse = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint("/api/URLSetup/RegisterIPN"),
                Some(&token),
                &[],
                Some(&payload),
            )
            .await?;

        if let Some(error) = &response.error {
            return Err(GatewayError::InvalidResponse {
                message: format!("IPN registration rejected: {}", error),
            });
        }

        let ipn_id = response
            .ipn_id
            .clone()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| GatewayError::InvalidResponse {
                message: "IPN registration response missing ipn_id".to_string(),
            })?;

        info!(ipn_id = %ipn_id, url = %url, "IPN URL registered with gateway");
        Ok(IpnRegistration {
            ipn_id,
            url: response.url.unwrap_or_else(|| url.to_string()),
        })
    }

    async fn list_ipns(&self) -> GatewayResult<Vec<IpnRegistration>> {
        let token = self.authenticate().await?;

        let entries: Vec<IpnListEntry> = self
            .http
            .request_json(
                reqwest::Method::GET,
                &self.endpoint("/api/URLSetup/GetIpnList"),
                Some(&token),
                &[],
                None,
            )
            .await?;

        Ok(entries
            .into_iter()
            .filter_map(|entry| match (entry.ipn_id, entry.url) {
                (Some(ipn_id), Some(url)) => Some(IpnRegistration { ipn_id, url }),
                _ => None,
            })
            .collect())
    }

    fn verify_notification(&self, payload: &[u8], signature: Option<&str>) -> bool {
        let Some(secret) = self.config.webhook_secret.as_deref() else {
            return true;
        };

        match signature {
            Some(signature) => verify_hmac_sha256_hex(payload, secret, signature),
            None => {
                warn!("Notification arrived without signature while a secret is configured");
                false
            }
        }
    }
}
