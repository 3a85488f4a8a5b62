//! E-commerce backend with Pesapal payment reconciliation.
//!
//! Orders are priced server-side at checkout and submitted to the gateway's
//! hosted payment page. Payment state is then driven exclusively by the
//! reconciliation engine, which treats inbound notifications as untrusted
//! triggers and the gateway's transaction-status query as the only source
//! of truth.

pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod gateway;
pub mod health;
pub mod logging;
pub mod services;
