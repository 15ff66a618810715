use erm_core::config::NotifyConfig;
use erm_core::error::AppError;
use erm_core::notify::{Address, DeliveryReport, DisabledGateway, Message, NotificationGateway};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::guardrails::partition_recipients;
use crate::relay::RelayClient;

/// Posts one JSON message per recipient to an HTTP relay.
#[derive(Debug, Clone)]
pub struct WebhookGateway {
    client: RelayClient,
    sender: Option<String>,
}

impl WebhookGateway {
    pub fn new(client: RelayClient) -> Self {
        Self {
            client,
            sender: None,
        }
    }

    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    fn deliver(&self, to: &Address, message: &Message) -> Result<(), String> {
        let req = RelayRequest {
            to: to.as_str(),
            from: self.sender.as_deref(),
            subject: &message.subject,
            body: &message.body,
        };
        let payload = serde_json::to_value(req).map_err(|e| format!("encode failed: {e}"))?;

        match ureq::post(self.client.endpoint())
            .timeout(self.client.timeout())
            .set("Idempotency-Key", &delivery_key(to, message))
            .send_json(payload)
        {
            Ok(r) if (200..300).contains(&r.status()) => Ok(()),
            Ok(r) => Err(format!("status={}", r.status())),
            Err(ureq::Error::Status(code, _)) => Err(format!("status={code}")),
            Err(e) => Err(e.to_string()),
        }
    }
}

/// Stable per (recipient, message) so a relay can drop duplicates when a caller retries.
pub fn delivery_key(to: &Address, message: &Message) -> String {
    let mut hasher = Sha256::new();
    hasher.update(to.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(message.subject.as_bytes());
    hasher.update([0u8]);
    hasher.update(message.body.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone, Serialize)]
struct RelayRequest<'a> {
    to: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    from: Option<&'a str>,
    subject: &'a str,
    body: &'a str,
}

impl NotificationGateway for WebhookGateway {
    fn send(&self, recipients: &[Address], message: &Message) -> DeliveryReport {
        if recipients.is_empty() {
            return DeliveryReport::not_sent("no recipients");
        }

        let (deliverable, rejected) = partition_recipients(recipients);
        let mut report = DeliveryReport::default();
        let mut errors = Vec::new();

        for addr in rejected {
            errors.push(format!("{}: malformed address", addr.as_str()));
            report.failed += 1;
            report.failed_addresses.push(addr);
        }

        for addr in deliverable {
            match self.deliver(&addr, message) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    tracing::warn!(recipient = addr.as_str(), error = %e, "relay delivery failed");
                    errors.push(format!("{}: {e}", addr.as_str()));
                    report.failed += 1;
                    report.failed_addresses.push(addr);
                }
            }
        }

        report.sent = report.delivered > 0;
        if !errors.is_empty() {
            report.error = Some(errors.join("; "));
        }
        report
    }
}

/// Build the gateway described by config; no `notify` section means notifications are
/// disabled rather than an error.
pub fn gateway_from_config(
    config: Option<&NotifyConfig>,
) -> Result<Box<dyn NotificationGateway + Send + Sync>, AppError> {
    let Some(cfg) = config else {
        return Ok(Box::new(DisabledGateway));
    };
    let mut gateway = WebhookGateway::new(RelayClient::new(&cfg.endpoint, cfg.timeout_ms)?);
    if let Some(sender) = cfg.sender.as_deref().filter(|s| !s.trim().is_empty()) {
        gateway = gateway.with_sender(sender.trim());
    }
    Ok(Box::new(gateway))
}
