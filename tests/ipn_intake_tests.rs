#[cfg(test)]
mod ipn_intake_tests {
    use duka_backend::api::payments::IpnParams;
    use duka_backend::config::PesapalConfig;
    use duka_backend::gateway::client::PesapalClient;
    use duka_backend::gateway::http::verify_hmac_sha256_hex;
    use duka_backend::gateway::PaymentGateway;
    use duka_backend::services::reconciliation::valid_tracking_id;

    const PAYLOAD: &[u8] = br#"{"OrderTrackingId":"TRK-1234-5678"}"#;
    const SECRET: &str = "test-secret";
    const SIGNATURE: &str = "5f3f4a8ee6c668caf80900a6e672e8782b751c04d2e2a5d9bd5476e1cdf01d0b";

    fn config(webhook_secret: Option<&str>) -> PesapalConfig {
        PesapalConfig {
            environment: "sandbox".to_string(),
            base_url: "https://cybqa.pesapal.com/pesapalv3".to_string(),
            consumer_key: "key".to_string(),
            consumer_secret: "secret".to_string(),
            ipn_id: Some("ipn-1".to_string()),
            webhook_secret: webhook_secret.map(|s| s.to_string()),
            backend_url: "https://api.duka.example".to_string(),
            frontend_url: "https://duka.example".to_string(),
            timeout_secs: 30,
            max_retries: 2,
            token_ttl_secs: 300,
            token_safety_secs: 60,
            ledger_reclaim_secs: 900,
        }
    }

    #[test]
    fn ipn_params_accept_pesapal_query_casing() {
        let params: IpnParams = serde_json::from_str(
            r#"{"OrderTrackingId":"TRK-1234-5678","OrderMerchantReference":"mr-1","OrderNotificationType":"IPNCHANGE"}"#,
        )
        .unwrap();

        assert_eq!(params.order_tracking_id.as_deref(), Some("TRK-1234-5678"));
        assert_eq!(params.order_merchant_reference.as_deref(), Some("mr-1"));
        assert_eq!(params.order_notification_type.as_deref(), Some("IPNCHANGE"));
    }

    #[test]
    fn ipn_params_accept_camel_case_aliases() {
        let params: IpnParams =
            serde_json::from_str(r#"{"orderTrackingId":"TRK-1234-5678"}"#).unwrap();
        assert_eq!(params.order_tracking_id.as_deref(), Some("TRK-1234-5678"));
    }

    #[test]
    fn ipn_params_tolerate_missing_fields() {
        let params: IpnParams = serde_json::from_str("{}").unwrap();
        assert!(params.order_tracking_id.is_none());
    }

    #[test]
    fn tracking_id_length_and_charset_bounds() {
        assert!(valid_tracking_id("TRK-1234-5678"));
        assert!(!valid_tracking_id(""));
        assert!(!valid_tracking_id("abc"));
        assert!(!valid_tracking_id(&"z".repeat(101)));
        assert!(!valid_tracking_id("TRK 1234 5678"));
    }

    #[test]
    fn hmac_verification_accepts_the_right_signature() {
        assert!(verify_hmac_sha256_hex(PAYLOAD, SECRET, SIGNATURE));
        assert!(!verify_hmac_sha256_hex(PAYLOAD, SECRET, "deadbeef"));
        assert!(!verify_hmac_sha256_hex(PAYLOAD, "other-secret", SIGNATURE));
        assert!(!verify_hmac_sha256_hex(b"tampered", SECRET, SIGNATURE));
    }

    #[test]
    fn notifications_pass_without_a_configured_secret() {
        let client = PesapalClient::new(config(None)).unwrap();
        assert!(client.verify_notification(PAYLOAD, None));
        assert!(client.verify_notification(PAYLOAD, Some("anything")));
    }

    #[test]
    fn configured_secret_requires_a_valid_signature() {
        let client = PesapalClient::new(config(Some(SECRET))).unwrap();
        assert!(client.verify_notification(PAYLOAD, Some(SIGNATURE)));
        assert!(!client.verify_notification(PAYLOAD, None));
        assert!(!client.verify_notification(PAYLOAD, Some("bad")));
    }
}
