//! Application configuration module
//! Handles environment variable loading, configuration validation, and application settings

use rust_decimal::Decimal;
use std::env;

const PESAPAL_SANDBOX_URL: &str = "https://cybqa.pesapal.com/pesapalv3";
const PESAPAL_LIVE_URL: &str = "https://pay.pesapal.com/v3";

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub pesapal: PesapalConfig,
    pub checkout: CheckoutConfig,
    pub email: EmailConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout: u64,   // seconds
    pub idle_timeout: Option<u64>, // seconds
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log format options
#[derive(Debug, Clone)]
pub enum LogFormat {
    Json,
    Plain,
}

/// Pesapal gateway configuration
#[derive(Debug, Clone)]
pub struct PesapalConfig {
    /// "sandbox" or "live"; selects the base URL unless overridden.
    pub environment: String,
    pub base_url: String,
    pub consumer_key: String,
    pub consumer_secret: String,
    /// Pre-registered notification channel id. Registered once per
    /// deployment via the ops endpoint and cached here, never per order.
    pub ipn_id: Option<String>,
    /// Secret for the x-pesapal-signature header. When unset, notifications
    /// are processed without signature verification.
    pub webhook_secret: Option<String>,
    /// Public URL prefix advertised to the gateway for IPN delivery.
    pub backend_url: String,
    /// Storefront URL the browser is redirected back to after payment.
    pub frontend_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    /// Fallback token lifetime when the gateway response omits an expiry.
    pub token_ttl_secs: u64,
    /// Margin subtracted from the declared token lifetime so a token is
    /// never used right at its expiry boundary.
    pub token_safety_secs: u64,
    /// A ledger entry stuck in `processing` longer than this window is
    /// treated as abandoned and re-claimable.
    pub ledger_reclaim_secs: u64,
}

/// Checkout pricing configuration
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    pub currency: String,
    pub delivery_fee: Decimal,
    /// Allowed gap between the client-submitted total and the
    /// server-computed total (covers front-end rounding).
    pub amount_tolerance: Decimal,
}

/// Outbound email configuration
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// When unset, notifications degrade to structured logs only.
    pub resend_api_key: Option<String>,
    pub from_address: String,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(AppConfig {
            server: ServerConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
            pesapal: PesapalConfig::from_env()?,
            checkout: CheckoutConfig::from_env()?,
            email: EmailConfig::from_env()?,
        })
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.database.validate()?;
        self.logging.validate()?;
        self.pesapal.validate()?;
        self.checkout.validate()?;

        Ok(())
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(ServerConfig {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".to_string()))?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidValue(
                "SERVER_PORT cannot be 0".to_string(),
            ));
        }

        if self.host.is_empty() {
            return Err(ConfigError::InvalidValue(
                "SERVER_HOST cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(DatabaseConfig {
            url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::MissingVariable("DATABASE_URL".to_string()))?,
            max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()))?,
            min_connections: env::var("DB_MIN_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MIN_CONNECTIONS".to_string()))?,
            connection_timeout: env::var("DB_CONNECTION_TIMEOUT")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_CONNECTION_TIMEOUT".to_string()))?,
            idle_timeout: env::var("DB_IDLE_TIMEOUT")
                .ok()
                .and_then(|val| val.parse().ok()),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::InvalidValue("DATABASE_URL".to_string()));
        }

        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()));
        }

        if self.min_connections > self.max_connections {
            return Err(ConfigError::InvalidValue(
                "DB_MIN_CONNECTIONS must be <= DB_MAX_CONNECTIONS".to_string(),
            ));
        }

        Ok(())
    }
}

impl LoggingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "plain".to_string())
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Plain,
            },
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];
        if !valid_levels.contains(&self.level.to_uppercase().as_str()) {
            return Err(ConfigError::InvalidValue("LOG_LEVEL".to_string()));
        }

        Ok(())
    }
}

impl PesapalConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = env::var("PESAPAL_ENV").unwrap_or_else(|_| "sandbox".to_string());
        let base_url = env::var("PESAPAL_BASE_URL").unwrap_or_else(|_| {
            if environment == "live" {
                PESAPAL_LIVE_URL.to_string()
            } else {
                PESAPAL_SANDBOX_URL.to_string()
            }
        });

        Ok(PesapalConfig {
            environment,
            base_url,
            consumer_key: env::var("PESAPAL_CONSUMER_KEY")
                .map_err(|_| ConfigError::MissingVariable("PESAPAL_CONSUMER_KEY".to_string()))?,
            consumer_secret: env::var("PESAPAL_CONSUMER_SECRET")
                .map_err(|_| ConfigError::MissingVariable("PESAPAL_CONSUMER_SECRET".to_string()))?,
            ipn_id: env::var("PESAPAL_IPN_ID").ok().filter(|v| !v.is_empty()),
            webhook_secret: env::var("PESAPAL_WEBHOOK_SECRET")
                .ok()
                .filter(|v| !v.is_empty()),
            backend_url: env::var("BACKEND_URL")
                .map_err(|_| ConfigError::MissingVariable("BACKEND_URL".to_string()))?,
            frontend_url: env::var("FRONTEND_URL")
                .map_err(|_| ConfigError::MissingVariable("FRONTEND_URL".to_string()))?,
            timeout_secs: env::var("PESAPAL_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("PESAPAL_TIMEOUT_SECS".to_string()))?,
            max_retries: env::var("PESAPAL_MAX_RETRIES")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("PESAPAL_MAX_RETRIES".to_string()))?,
            token_ttl_secs: env::var("PESAPAL_TOKEN_TTL_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("PESAPAL_TOKEN_TTL_SECS".to_string()))?,
            token_safety_secs: env::var("PESAPAL_TOKEN_SAFETY_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("PESAPAL_TOKEN_SAFETY_SECS".to_string()))?,
            ledger_reclaim_secs: env::var("PESAPAL_LEDGER_RECLAIM_SECS")
                .unwrap_or_else(|_| "900".to_string())
                .parse()
                .map_err(|_| {
                    ConfigError::InvalidValue("PESAPAL_LEDGER_RECLAIM_SECS".to_string())
                })?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_environments = ["sandbox", "live"];
        if !valid_environments.contains(&self.environment.as_str()) {
            return Err(ConfigError::InvalidValue("PESAPAL_ENV".to_string()));
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "PESAPAL_BASE_URL must be a valid URL".to_string(),
            ));
        }

        if self.consumer_key.is_empty() || self.consumer_secret.is_empty() {
            return Err(ConfigError::InvalidValue(
                "PESAPAL_CONSUMER_KEY and PESAPAL_CONSUMER_SECRET cannot be empty".to_string(),
            ));
        }

        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "PESAPAL_TIMEOUT_SECS".to_string(),
            ));
        }

        if self.token_safety_secs >= self.token_ttl_secs {
            return Err(ConfigError::InvalidValue(
                "PESAPAL_TOKEN_SAFETY_SECS must be < PESAPAL_TOKEN_TTL_SECS".to_string(),
            ));
        }

        Ok(())
    }

    /// Public IPN URL advertised to the gateway at registration time.
    pub fn ipn_url(&self) -> String {
        format!("{}/api/payments/ipn", self.backend_url.trim_end_matches('/'))
    }

    /// Browser-redirect URL passed to the gateway at order submission.
    pub fn callback_url(&self) -> String {
        format!(
            "{}/api/payments/callback",
            self.backend_url.trim_end_matches('/')
        )
    }
}

impl CheckoutConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(CheckoutConfig {
            currency: env::var("CURRENCY").unwrap_or_else(|_| "KES".to_string()),
            delivery_fee: env::var("DELIVERY_FEE")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DELIVERY_FEE".to_string()))?,
            amount_tolerance: env::var("AMOUNT_TOLERANCE")
                .unwrap_or_else(|_| "1".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("AMOUNT_TOLERANCE".to_string()))?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.currency.len() != 3 {
            return Err(ConfigError::InvalidValue(
                "CURRENCY must be a 3-letter code".to_string(),
            ));
        }

        if self.delivery_fee < Decimal::ZERO {
            return Err(ConfigError::InvalidValue("DELIVERY_FEE".to_string()));
        }

        if self.amount_tolerance < Decimal::ZERO {
            return Err(ConfigError::InvalidValue("AMOUNT_TOLERANCE".to_string()));
        }

        Ok(())
    }
}

impl EmailConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(EmailConfig {
            resend_api_key: env::var("RESEND_API_KEY").ok().filter(|v| !v.is_empty()),
            from_address: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "orders@duka.example".to_string()),
        })
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),

    #[error("Invalid value for configuration: {0}")]
    InvalidValue(String),
}
