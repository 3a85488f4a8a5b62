use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{CheckoutConfig, PesapalConfig};
use crate::database::error::DatabaseError;
use crate::database::order_repository::{NewOrder, Order, OrderItem, OrderStore};
use crate::database::product_repository::ProductCatalog;
use crate::gateway::types::{BillingAddress, SubmitOrderRequest};
use crate::gateway::{GatewayError, PaymentGateway};

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Order must contain at least one item")]
    EmptyOrder,

    #[error("Invalid item quantity for product {product_id}")]
    InvalidQuantity { product_id: Uuid },

    #[error("Product not found: {product_id}")]
    ProductNotFound { product_id: Uuid },

    #[error("Submitted amount {submitted} does not match computed total {computed}")]
    AmountMismatch { submitted: Decimal, computed: Decimal },

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Line item as submitted by the storefront. Prices are never accepted from
/// the client; only the product id and quantity matter.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutItem {
    pub product_id: Uuid,
    pub quantity: u32,
}

/// Delivery and contact details captured at checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryAddress {
    pub email: String,
    pub phone: String,
    pub first_name: String,
    pub last_name: String,
    pub street: String,
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zipcode: String,
    #[serde(default = "default_country")]
    pub country: String,
}

fn default_country() -> String {
    "KE".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub user_id: String,
    pub items: Vec<CheckoutItem>,
    /// Client-displayed total, cross-checked against the server-side price.
    pub amount: Decimal,
    pub address: DeliveryAddress,
}

/// What the storefront needs to hand the customer over to the gateway's
/// hosted payment page.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutReceipt {
    pub order_id: Uuid,
    pub merchant_reference: String,
    pub tracking_id: String,
    pub redirect_url: String,
}

/// Turns a cart into a pending order and a gateway payment session.
///
/// Totals are always recomputed from the product catalog. The client's
/// amount is only a cross-check, accepted within a small configured
/// tolerance to absorb front-end rounding.
pub struct CheckoutService {
    catalog: Arc<dyn ProductCatalog>,
    orders: Arc<dyn OrderStore>,
    gateway: Arc<dyn PaymentGateway>,
    checkout: CheckoutConfig,
    pesapal: PesapalConfig,
}

impl CheckoutService {
    pub fn new(
        catalog: Arc<dyn ProductCatalog>,
        orders: Arc<dyn OrderStore>,
        gateway: Arc<dyn PaymentGateway>,
        checkout: CheckoutConfig,
        pesapal: PesapalConfig,
    ) -> Self {
        Self {
            catalog,
            orders,
            gateway,
            checkout,
            pesapal,
        }
    }

    /// Price the cart from the catalog and return the resolved line items
    /// plus the order total including the delivery fee.
    async fn price_items(
        &self,
        items: &[CheckoutItem],
    ) -> Result<(Vec<OrderItem>, Decimal), CheckoutError> {
        if items.is_empty() {
            return Err(CheckoutError::EmptyOrder);
        }

        let mut resolved = Vec::with_capacity(items.len());
        let mut subtotal = Decimal::ZERO;

        for item in items {
            if item.quantity == 0 {
                return Err(CheckoutError::InvalidQuantity {
                    product_id: item.product_id,
                });
            }

            let product = self
                .catalog
                .find_by_id(item.product_id)
                .await?
                .ok_or(CheckoutError::ProductNotFound {
                    product_id: item.product_id,
                })?;

            subtotal += product.price * Decimal::from(item.quantity);
            resolved.push(OrderItem {
                product_id: product.id,
                name: product.name,
                unit_price: product.price,
                quantity: item.quantity,
            });
        }

        Ok((resolved, subtotal + self.checkout.delivery_fee))
    }

    pub async fn place_order(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutReceipt, CheckoutError> {
        let (items, total) = self.price_items(&request.items).await?;

        let diff = (request.amount - total).abs();
        if diff > self.checkout.amount_tolerance {
            warn!(
                user_id = %request.user_id,
                submitted = %request.amount,
                computed = %total,
                "Rejected checkout with mismatched amount"
            );
            return Err(CheckoutError::AmountMismatch {
                submitted: request.amount,
                computed: total,
            });
        }
        if !diff.is_zero() {
            warn!(
                user_id = %request.user_id,
                submitted = %request.amount,
                computed = %total,
                "Accepted checkout with rounding difference within tolerance"
            );
        }

        let merchant_reference = Uuid::new_v4().to_string();
        let order = self
            .orders
            .create(NewOrder {
                user_id: request.user_id.clone(),
                merchant_reference: merchant_reference.clone(),
                items: serde_json::json!(items),
                amount: total,
                currency: self.checkout.currency.clone(),
                address: serde_json::json!(request.address),
            })
            .await?;

        let submission = SubmitOrderRequest {
            id: merchant_reference.clone(),
            currency: self.checkout.currency.clone(),
            amount: total,
            description: format!("Order {}", &merchant_reference[..8]),
            callback_url: self.pesapal.callback_url(),
            notification_id: self.pesapal.ipn_id.clone(),
            billing_address: billing_address(&request.address),
        };

        let submitted = self.gateway.submit_order(submission).await?;
        self.orders
            .set_tracking_id(order.id, &submitted.tracking_id)
            .await?;

        info!(
            order_id = %order.id,
            merchant_reference = %merchant_reference,
            tracking_id = %submitted.tracking_id,
            amount = %total,
            "Checkout submitted to gateway"
        );

        Ok(CheckoutReceipt {
            order_id: order.id,
            merchant_reference,
            tracking_id: submitted.tracking_id,
            redirect_url: submitted.redirect_url,
        })
    }
}

fn billing_address(address: &DeliveryAddress) -> BillingAddress {
    BillingAddress {
        email_address: address.email.clone(),
        phone_number: address.phone.clone(),
        country_code: address.country.clone(),
        first_name: address.first_name.clone(),
        last_name: address.last_name.clone(),
        line_1: address.street.clone(),
        city: address.city.clone(),
        state: address.state.clone(),
        postal_code: address.zipcode.clone(),
        zip_code: address.zipcode.clone(),
    }
}

/// Pull the customer's email out of a stored order's address document.
pub fn order_recipient(order: &Order) -> Option<String> {
    order
        .address
        .get("email")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}
