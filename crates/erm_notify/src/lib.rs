pub mod guardrails;
pub mod relay;
pub mod webhook;

#[cfg(test)]
mod tests {
    use super::guardrails::{is_deliverable, partition_recipients};
    use super::relay::RelayClient;
    use super::webhook::{delivery_key, gateway_from_config};
    use erm_core::config::NotifyConfig;
    use erm_core::notify::{Address, Message};

    #[test]
    fn relay_endpoint_validation() {
        assert!(RelayClient::new("https://relay.example.org/send", 1000).is_ok());
        assert!(RelayClient::new("http://127.0.0.1:8025", 1000).is_ok());
        assert!(RelayClient::new("http://[::1]:8025/send", 1000).is_ok());
        assert_eq!(
            RelayClient::new("https://relay.example.org/send/", 1000)
                .unwrap()
                .endpoint(),
            "https://relay.example.org/send"
        );

        assert!(RelayClient::new("ftp://relay.example.org", 1000).is_err());
        assert!(RelayClient::new("relay.example.org", 1000).is_err());
        assert!(RelayClient::new("https://", 1000).is_err());
        assert!(RelayClient::new("https:///send", 1000).is_err());
        assert!(RelayClient::new("https://user:pw@relay.example.org", 1000).is_err());
        assert!(RelayClient::new("http://relay.example.org:", 1000).is_err());
        assert!(RelayClient::new("http://relay.example.org:0", 1000).is_err());
        assert!(RelayClient::new("http://relay.example.org:99999", 1000).is_err());
        assert!(RelayClient::new("http://relay.example.org", 0).is_err());
    }

    #[test]
    fn address_shapes() {
        assert!(is_deliverable(&Address::new("ana@fire.example.org")));
        assert!(is_deliverable(&Address::new("+15550100123")));
        assert!(!is_deliverable(&Address::new("ana@localhost")));
        assert!(!is_deliverable(&Address::new("@example.org")));
        assert!(!is_deliverable(&Address::new("ana @example.org")));
        assert!(!is_deliverable(&Address::new("+12")));

        let (ok, bad) = partition_recipients(&[
            Address::new("a@example.org"),
            Address::new("nope"),
            Address::new("b@example.org"),
        ]);
        assert_eq!(ok, vec![Address::new("a@example.org"), Address::new("b@example.org")]);
        assert_eq!(bad, vec![Address::new("nope")]);
    }

    #[test]
    fn missing_config_disables_notifications() {
        let gw = gateway_from_config(None).expect("disabled gateway");
        let report = gw.send(
            &[Address::new("a@example.org")],
            &Message {
                subject: "s".to_string(),
                body: "b".to_string(),
            },
        );
        assert!(!report.sent);
        assert_eq!(report.failed, 1);

        let bad = NotifyConfig {
            endpoint: "mailto:ops@example.org".to_string(),
            timeout_ms: 1000,
            sender: None,
        };
        assert!(gateway_from_config(Some(&bad)).is_err());
    }

    #[test]
    fn delivery_key_is_stable_per_recipient() {
        let msg = Message {
            subject: "Incident #4 assigned".to_string(),
            body: "Flooding on river road".to_string(),
        };
        let a = delivery_key(&Address::new("a@example.org"), &msg);
        assert_eq!(a.len(), 64);
        assert_eq!(a, delivery_key(&Address::new("a@example.org"), &msg));
        assert_ne!(a, delivery_key(&Address::new("b@example.org"), &msg));
    }
}
