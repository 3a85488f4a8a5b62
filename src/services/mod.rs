pub mod checkout;
pub mod notification;
pub mod reconciliation;

pub use checkout::{CheckoutError, CheckoutRequest, CheckoutService};
pub use notification::{EmailNotifier, NotificationSink};
pub use reconciliation::{ReconciliationEngine, ReconciliationError, WebhookOutcome};
