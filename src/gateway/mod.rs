//! Payment gateway integration: auth-token lifecycle, order submission,
//! status queries, and notification-channel registration.

pub mod client;
pub mod error;
pub mod http;
pub mod token;
pub mod types;

pub use client::{PaymentGateway, PesapalClient};
pub use error::{GatewayError, GatewayResult};
pub use types::{PaymentStatus, SubmittedOrder, TransactionStatus};
