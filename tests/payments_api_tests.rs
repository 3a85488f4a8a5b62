//! Handler-level tests for the payments routes, driven through the router
//! with in-memory collaborators.

#[cfg(test)]
mod payments_api_tests {
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use async_trait::async_trait;
    use chrono::Utc;
    use hmac::{Hmac, Mac};
    use rust_decimal::Decimal;
    use sha2::Sha256;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;
    use uuid::Uuid;

    use duka_backend::api::{self, payments::PaymentsState};
    use duka_backend::config::PesapalConfig;
    use duka_backend::database::error::DatabaseError;
    use duka_backend::database::ledger_repository::{ClaimOutcome, IdempotencyLedger, IpnLedgerEntry};
    use duka_backend::database::order_repository::{
        NewOrder, Order, OrderStatus, OrderStore, TransitionOutcome,
    };
    use duka_backend::gateway::http::verify_hmac_sha256_hex;
    use duka_backend::gateway::types::{IpnRegistration, SubmitOrderRequest};
    use duka_backend::gateway::{
        GatewayError, GatewayResult, PaymentGateway, PaymentStatus, SubmittedOrder, TransactionStatus,
    };
    use duka_backend::services::notification::{
        NotificationError, NotificationSink, PaymentNotification,
    };
    use duka_backend::services::reconciliation::ReconciliationEngine;

    const TRACKING: &str = "TRK-1234-5678";
    const SECRET: &str = "whsec-test";

    struct TestGateway {
        secret: Option<String>,
    }

    #[async_trait]
    impl PaymentGateway for TestGateway {
        async fn authenticate(&self) -> GatewayResult<String> {
            Ok("token".to_string())
        }

        async fn submit_order(&self, _: SubmitOrderRequest) -> GatewayResult<SubmittedOrder> {
            Err(GatewayError::InvalidResponse {
                message: "not used".to_string(),
            })
        }

        async fn query_status(&self, tracking_id: &str) -> GatewayResult<TransactionStatus> {
            Ok(TransactionStatus {
                tracking_id: tracking_id.to_string(),
                status: PaymentStatus::Completed,
                description: "COMPLETED".to_string(),
                merchant_reference: None,
                amount: None,
                currency: None,
                confirmation_code: None,
                payment_method: None,
            })
        }

        async fn register_ipn(&self, _: &str) -> GatewayResult<IpnRegistration> {
            Err(GatewayError::InvalidResponse {
                message: "not used".to_string(),
            })
        }

        async fn list_ipns(&self) -> GatewayResult<Vec<IpnRegistration>> {
            Ok(vec![])
        }

        fn verify_notification(&self, payload: &[u8], signature: Option<&str>) -> bool {
            let Some(secret) = self.secret.as_deref() else {
                return true;
            };
            match signature {
                Some(signature) => verify_hmac_sha256_hex(payload, secret, signature),
                None => false,
            }
        }
    }

    #[derive(Default)]
    struct SingleOrderStore {
        orders: Mutex<HashMap<String, Order>>,
    }

    impl SingleOrderStore {
        fn with_pending(tracking_id: &str) -> Self {
            let store = Self::default();
            store.orders.lock().unwrap().insert(
                tracking_id.to_string(),
                Order {
                    id: Uuid::new_v4(),
                    user_id: "user-1".to_string(),
                    merchant_reference: "mr-1".to_string(),
                    tracking_id: Some(tracking_id.to_string()),
                    items: serde_json::json!([]),
                    amount: Decimal::from(1000),
                    currency: "KES".to_string(),
                    address: serde_json::json!({"email": "customer@example.com"}),
                    status: "pending_payment".to_string(),
                    paid: false,
                    fulfillment_status: "order placed".to_string(),
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                },
            );
            store
        }

        fn is_paid(&self, tracking_id: &str) -> bool {
            self.orders.lock().unwrap()[tracking_id].paid
        }
    }

    #[async_trait]
    impl OrderStore for SingleOrderStore {
        async fn create(&self, order: NewOrder) -> Result<Order, DatabaseError> {
            Err(DatabaseError::not_found("order", &order.merchant_reference))
        }

        async fn set_tracking_id(&self, _: Uuid, _: &str) -> Result<(), DatabaseError> {
            Ok(())
        }

        async fn find_by_tracking_id(&self, tracking_id: &str) -> Result<Option<Order>, DatabaseError> {
            Ok(self.orders.lock().unwrap().get(tracking_id).cloned())
        }

        async fn find_by_merchant_reference(&self, _: &str) -> Result<Option<Order>, DatabaseError> {
            Ok(None)
        }

        async fn mark_paid(&self, tracking_id: &str) -> Result<TransitionOutcome, DatabaseError> {
            let mut orders = self.orders.lock().unwrap();
            match orders.get_mut(tracking_id) {
                Some(order) if !order.paid => {
                    order.paid = true;
                    order.status = "paid".to_string();
                    Ok(TransitionOutcome::Applied)
                }
                _ => Ok(TransitionOutcome::NoOp),
            }
        }

        async fn mark_payment_failed(
            &self,
            _: &str,
        ) -> Result<TransitionOutcome, DatabaseError> {
            Ok(TransitionOutcome::NoOp)
        }

        async fn mark_pending(&self, _: &str) -> Result<TransitionOutcome, DatabaseError> {
            Ok(TransitionOutcome::NoOp)
        }

        async fn find_all(&self) -> Result<Vec<Order>, DatabaseError> {
            Ok(vec![])
        }

        async fn find_by_user(&self, _: &str) -> Result<Vec<Order>, DatabaseError> {
            Ok(vec![])
        }

        async fn update_fulfillment_status(&self, _: Uuid, _: &str) -> Result<Order, DatabaseError> {
            Err(DatabaseError::not_found("order", "unused"))
        }
    }

    #[derive(Default)]
    struct TestLedger {
        entries: Mutex<HashMap<String, IpnLedgerEntry>>,
    }

    #[async_trait]
    impl IdempotencyLedger for TestLedger {
        async fn claim(&self, tracking_id: &str) -> Result<ClaimOutcome, DatabaseError> {
            let mut entries = self.entries.lock().unwrap();
            if let Some(entry) = entries.get_mut(tracking_id) {
                entry.retry_count += 1;
                return Ok(ClaimOutcome::Duplicate(entry.clone()));
            }
            let entry = IpnLedgerEntry {
                tracking_id: tracking_id.to_string(),
                processing_state: "processing".to_string(),
                locked_at: Some(Utc::now()),
                processed_at: None,
                order_status: None,
                retry_count: 0,
                last_error: None,
            };
            entries.insert(tracking_id.to_string(), entry.clone());
            Ok(ClaimOutcome::First(entry))
        }

        async fn mark_completed(&self, tracking_id: &str, _: OrderStatus) -> Result<(), DatabaseError> {
            let mut entries = self.entries.lock().unwrap();
            if let Some(entry) = entries.get_mut(tracking_id) {
                entry.processing_state = "completed".to_string();
            }
            Ok(())
        }

        async fn mark_failed(&self, tracking_id: &str, error: &str) -> Result<(), DatabaseError> {
            let mut entries = self.entries.lock().unwrap();
            if let Some(entry) = entries.get_mut(tracking_id) {
                entry.processing_state = "failed".to_string();
                entry.last_error = Some(error.to_string());
            }
            Ok(())
        }

        async fn find(&self, tracking_id: &str) -> Result<Option<IpnLedgerEntry>, DatabaseError> {
            Ok(self.entries.lock().unwrap().get(tracking_id).cloned())
        }
    }

    #[derive(Default)]
    struct CountingSink {
        sent: AtomicUsize,
    }

    #[async_trait]
    impl NotificationSink for CountingSink {
        async fn dispatch(&self, _: PaymentNotification) -> Result<(), NotificationError> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn pesapal_config(webhook_secret: Option<&str>) -> PesapalConfig {
        PesapalConfig {
            environment: "sandbox".to_string(),
            base_url: "https://cybqa.pesapal.com/pesapalv3".to_string(),
            consumer_key: "key".to_string(),
            consumer_secret: "secret".to_string(),
            ipn_id: Some("ipn-1".to_string()),
            webhook_secret: webhook_secret.map(|s| s.to_string()),
            backend_url: "https://api.duka.example".to_string(),
            frontend_url: "https://duka.example".to_string(),
            timeout_secs: 5,
            max_retries: 1,
            token_ttl_secs: 300,
            token_safety_secs: 60,
            ledger_reclaim_secs: 900,
        }
    }

    fn router(
        webhook_secret: Option<&str>,
        orders: Arc<SingleOrderStore>,
    ) -> axum::Router {
        let gateway: Arc<dyn PaymentGateway> = Arc::new(TestGateway {
            secret: webhook_secret.map(|s| s.to_string()),
        });
        let store: Arc<dyn OrderStore> = orders;
        let engine = Arc::new(ReconciliationEngine::new(
            gateway.clone(),
            store.clone(),
            Arc::new(TestLedger::default()),
            Arc::new(CountingSink::default()),
        ));

        api::payments_router(Arc::new(PaymentsState {
            engine,
            gateway,
            orders: store,
            config: pesapal_config(webhook_secret),
        }))
    }

    fn sign(payload: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }

    #[tokio::test]
    async fn get_ipn_signature_covers_the_query_string() {
        let orders = Arc::new(SingleOrderStore::with_pending(TRACKING));
        let app = router(Some(SECRET), orders.clone());

        let query = format!("OrderTrackingId={TRACKING}");
        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/payments/ipn?{query}"))
                    .header("x-pesapal-signature", sign(query.as_bytes()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(orders.is_paid(TRACKING));
    }

    #[tokio::test]
    async fn get_ipn_with_bad_signature_is_acked_but_not_processed() {
        let orders = Arc::new(SingleOrderStore::with_pending(TRACKING));
        let app = router(Some(SECRET), orders.clone());

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/payments/ipn?OrderTrackingId={TRACKING}"))
                    .header("x-pesapal-signature", "deadbeef")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(!orders.is_paid(TRACKING));
    }

    #[tokio::test]
    async fn get_ipn_without_secret_processes_unsigned_notifications() {
        let orders = Arc::new(SingleOrderStore::with_pending(TRACKING));
        let app = router(None, orders.clone());

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/payments/ipn?OrderTrackingId={TRACKING}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(orders.is_paid(TRACKING));
    }

    #[tokio::test]
    async fn callback_redirects_to_success_page_after_reconciliation() {
        let orders = Arc::new(SingleOrderStore::with_pending(TRACKING));
        let app = router(None, orders.clone());

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/payments/callback?OrderTrackingId={TRACKING}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap();
        assert_eq!(
            location,
            format!("https://duka.example/payment-success?orderId={TRACKING}")
        );
        assert!(orders.is_paid(TRACKING));
    }

    #[tokio::test]
    async fn callback_without_tracking_id_still_lands_on_the_failure_page() {
        let orders = Arc::new(SingleOrderStore::with_pending(TRACKING));
        let app = router(None, orders);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/payments/callback")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap();
        assert_eq!(location, "https://duka.example/payment-failure");
    }
}
