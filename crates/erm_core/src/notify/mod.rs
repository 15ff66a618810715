use serde::{Deserialize, Serialize};

use crate::domain::{IncidentRecord, ReporterRef};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub subject: String,
    pub body: String,
}

/// Per-call delivery outcome. Gateways report failure here instead of returning an error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct DeliveryReport {
    pub sent: bool,
    pub delivered: usize,
    pub failed: usize,
    pub failed_addresses: Vec<Address>,
    pub error: Option<String>,
}

impl DeliveryReport {
    pub fn not_sent(reason: impl Into<String>) -> Self {
        Self {
            error: Some(reason.into()),
            ..Self::default()
        }
    }

    /// One-line description suitable for `email_detail`.
    pub fn summary(&self) -> String {
        match (&self.error, self.sent) {
            (None, true) => format!("Notification delivered to {} recipient(s)", self.delivered),
            (Some(err), true) => format!(
                "Notification delivered to {} recipient(s), {} failed: {err}",
                self.delivered, self.failed
            ),
            (Some(err), false) => format!("Notification not sent: {err}"),
            (None, false) => "Notification not sent".to_string(),
        }
    }
}

pub trait NotificationGateway {
    /// Attempt delivery to every recipient. Must not panic or block the caller's
    /// transaction; all failure is returned as data.
    fn send(&self, recipients: &[Address], message: &Message) -> DeliveryReport;
}

/// Gateway used when no delivery channel is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledGateway;

impl NotificationGateway for DisabledGateway {
    fn send(&self, recipients: &[Address], _message: &Message) -> DeliveryReport {
        DeliveryReport {
            failed: recipients.len(),
            failed_addresses: recipients.to_vec(),
            ..DeliveryReport::not_sent("notifications are disabled")
        }
    }
}

pub fn render_assignment_notice(record: &IncidentRecord, assignee: &str) -> Message {
    let subject = format!(
        "[{}] Incident #{} assigned to {}: {}",
        record.priority.as_str().to_uppercase(),
        record.id,
        assignee,
        record.report_type
    );

    let mut body = String::new();
    body.push_str(&format!("Incident #{} has been assigned to {assignee}.\n\n", record.id));
    body.push_str(&format!("Type: {}\n", record.report_type));
    body.push_str(&format!("Priority: {}\n", record.priority.as_str()));
    body.push_str(&format!("Reporter safety: {}\n", record.reporter_safety.as_str()));
    body.push_str(&format!("Location: {}\n", record.location.text));
    if let Some(addr) = &record.location.resolved_address {
        body.push_str(&format!("Resolved address: {addr}\n"));
    }
    if let ReporterRef::Guest(guest) = &record.reporter {
        body.push_str(&format!("Reporter: {} ({})\n", guest.name, guest.contact));
    }
    body.push_str(&format!("Reported at: {}\n\n", record.reported_at));
    body.push_str(&record.narrative);
    body.push('\n');

    Message { subject, body }
}
