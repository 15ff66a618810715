use serde::{Deserialize, Serialize};
use std::fmt;

pub const INVALID_INPUT: &str = "INVALID_INPUT";
pub const NOT_FOUND: &str = "NOT_FOUND";
pub const NO_ELIGIBLE_MEMBERS: &str = "NO_ELIGIBLE_MEMBERS";
pub const TERMINAL_STATE_VIOLATION: &str = "TERMINAL_STATE_VIOLATION";
pub const CONFLICT: &str = "CONFLICT";

/// Single structured error shape used across the engine and handed to callers.
///
/// `fields` names every offending input field for `INVALID_INPUT`; it stays empty for
/// infrastructure faults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppError {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
    pub retryable: bool,
}

impl AppError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            fields: Vec::new(),
            retryable: false,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn not_found(entity: &str, id: i64) -> Self {
        Self::new(NOT_FOUND, format!("{entity} {id} not found"))
            .with_details(format!("entity={entity}; id={id}"))
    }

    pub fn terminal_state(current: &str) -> Self {
        Self::new(
            TERMINAL_STATE_VIOLATION,
            format!("Incident is {current} and can no longer be changed"),
        )
        .with_details(format!("status={current}"))
    }

    pub fn conflict(incident_id: i64) -> Self {
        Self::new(
            CONFLICT,
            "Incident was modified concurrently; reload and retry",
        )
        .with_details(format!("incident_id={incident_id}"))
        .with_retryable(true)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if !self.fields.is_empty() {
            write!(f, " ({})", self.fields.join(", "))?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}
