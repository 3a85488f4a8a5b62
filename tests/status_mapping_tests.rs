#[cfg(test)]
mod status_mapping_tests {
    use duka_backend::database::order_repository::OrderStatus;
    use duka_backend::gateway::error::GatewayError;
    use duka_backend::gateway::PaymentStatus;

    #[test]
    fn gateway_descriptions_map_to_statuses() {
        let cases = vec![
            ("COMPLETED", PaymentStatus::Completed),
            ("completed", PaymentStatus::Completed),
            ("Completed", PaymentStatus::Completed),
            ("FAILED", PaymentStatus::Failed),
            ("INVALID", PaymentStatus::Invalid),
            ("REVERSED", PaymentStatus::Reversed),
            ("PENDING", PaymentStatus::Pending),
            ("", PaymentStatus::Unknown),
            ("SOMETHING_NEW", PaymentStatus::Unknown),
        ];

        for (description, expected) in cases {
            assert_eq!(
                PaymentStatus::from_description(description),
                expected,
                "description: {description:?}"
            );
        }
    }

    #[test]
    fn only_failed_invalid_reversed_are_terminal_failures() {
        assert!(PaymentStatus::Failed.is_terminal_failure());
        assert!(PaymentStatus::Invalid.is_terminal_failure());
        assert!(PaymentStatus::Reversed.is_terminal_failure());
        assert!(!PaymentStatus::Completed.is_terminal_failure());
        assert!(!PaymentStatus::Pending.is_terminal_failure());
        assert!(!PaymentStatus::Unknown.is_terminal_failure());
    }

    #[test]
    fn order_status_round_trips_through_storage_strings() {
        for status in [
            OrderStatus::PendingPayment,
            OrderStatus::Paid,
            OrderStatus::PaymentFailed,
        ] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("shipped"), None);
    }

    #[test]
    fn submission_errors_hide_gateway_details_from_clients() {
        let err = GatewayError::Submission {
            message: "consumer_key rejected by upstream".to_string(),
        };
        let message = err.user_message();
        assert!(!message.contains("consumer_key"));
        assert!(message.to_lowercase().contains("payment"));
    }

    #[test]
    fn network_and_rate_limit_errors_are_retryable() {
        let network = GatewayError::Network {
            message: "connection reset".to_string(),
        };
        let rate_limited = GatewayError::RateLimit {
            message: "429".to_string(),
        };
        let auth = GatewayError::Auth {
            message: "invalid credentials".to_string(),
        };

        assert!(network.is_retryable());
        assert!(rate_limited.is_retryable());
        assert!(!auth.is_retryable());
    }
}
