//! Authentication behavior of the gateway client against a local stub of the
//! token endpoint.

#[cfg(test)]
mod gateway_auth_tests {
    use axum::{extract::State, routing::post, Json, Router};
    use chrono::{Duration, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use duka_backend::config::PesapalConfig;
    use duka_backend::gateway::{PaymentGateway, PesapalClient};

    async fn issue_token(State(hits): State<Arc<AtomicUsize>>) -> Json<serde_json::Value> {
        hits.fetch_add(1, Ordering::SeqCst);
        Json(serde_json::json!({
            "token": "tok-1",
            "expiryDate": (Utc::now() + Duration::seconds(300)).to_rfc3339(),
        }))
    }

    /// Binds a throwaway token endpoint and returns its base URL plus the
    /// request counter.
    async fn spawn_token_endpoint() -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route("/api/Auth/RequestToken", post(issue_token))
            .with_state(hits.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{addr}"), hits)
    }

    fn config(base_url: String) -> PesapalConfig {
        PesapalConfig {
            environment: "sandbox".to_string(),
            base_url,
            consumer_key: "key".to_string(),
            consumer_secret: "secret".to_string(),
            ipn_id: None,
            webhook_secret: None,
            backend_url: "https://api.duka.example".to_string(),
            frontend_url: "https://duka.example".to_string(),
            timeout_secs: 5,
            max_retries: 0,
            token_ttl_secs: 300,
            token_safety_secs: 60,
            ledger_reclaim_secs: 900,
        }
    }

    #[tokio::test]
    async fn authenticate_reuses_the_cached_token_within_its_validity() {
        let (base_url, hits) = spawn_token_endpoint().await;
        let client = PesapalClient::new(config(base_url)).unwrap();

        let first = client.authenticate().await.unwrap();
        let second = client.authenticate().await.unwrap();

        assert_eq!(first, "tok-1");
        assert_eq!(second, "tok-1");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
