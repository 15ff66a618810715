use serde::{Deserialize, Serialize};

use crate::domain::{FieldError, GuestInfo, Priority, ReporterSafety};
use crate::error::{AppError, INVALID_INPUT};

/// Report fields as they arrive from an intake form. Enumerated values are still text here;
/// `validate_submission` turns them into typed values or names what is wrong.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SubmissionPayload {
    pub report_type: String,
    pub narrative: String,
    pub location: String,
    #[serde(default)]
    pub latitude: Option<String>,
    #[serde(default)]
    pub longitude: Option<String>,
    pub priority: String,
    pub reporter_safety: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct GuestSubmissionPayload {
    #[serde(flatten)]
    pub incident: SubmissionPayload,
    pub guest_name: String,
    pub guest_contact: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSubmission {
    pub report_type: String,
    pub narrative: String,
    pub location_text: String,
    pub latitude_raw: Option<String>,
    pub longitude_raw: Option<String>,
    pub priority: Priority,
    pub reporter_safety: ReporterSafety,
}

fn required<'a>(field: &str, value: &'a str, errors: &mut Vec<FieldError>) -> Option<&'a str> {
    let v = value.trim();
    if v.is_empty() {
        errors.push(FieldError::new(field, format!("{field} is required")));
        return None;
    }
    Some(v)
}

fn optional(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn enumerated<T>(
    field: &str,
    value: &str,
    allowed: &[&str],
    parse: fn(&str) -> Option<T>,
    errors: &mut Vec<FieldError>,
) -> Option<T> {
    let v = required(field, value, errors)?;
    let parsed = parse(&v.to_ascii_lowercase());
    if parsed.is_none() {
        errors.push(FieldError::new(
            field,
            format!("{field} must be one of {}; got {v:?}", allowed.join(", ")),
        ));
    }
    parsed
}

/// Check every field and collect all problems at once, so a caller can fix the whole form
/// in one round trip.
pub fn validate_submission(
    payload: &SubmissionPayload,
) -> Result<ValidatedSubmission, Vec<FieldError>> {
    let mut errors = Vec::new();

    let report_type = required("report_type", &payload.report_type, &mut errors);
    let narrative = required("narrative", &payload.narrative, &mut errors);
    let location = required("location", &payload.location, &mut errors);
    let priority = enumerated(
        "priority",
        &payload.priority,
        &["low", "moderate", "high", "critical"],
        Priority::from_str,
        &mut errors,
    );
    let reporter_safety = enumerated(
        "reporter_safety",
        &payload.reporter_safety,
        &["safe", "injured", "unknown"],
        ReporterSafety::from_str,
        &mut errors,
    );

    match (report_type, narrative, location, priority, reporter_safety) {
        (Some(report_type), Some(narrative), Some(location), Some(priority), Some(reporter_safety))
            if errors.is_empty() =>
        {
            Ok(ValidatedSubmission {
                report_type: report_type.to_string(),
                narrative: narrative.to_string(),
                location_text: location.to_string(),
                latitude_raw: optional(&payload.latitude),
                longitude_raw: optional(&payload.longitude),
                priority,
                reporter_safety,
            })
        }
        _ => Err(errors),
    }
}

pub fn validate_guest_submission(
    payload: &GuestSubmissionPayload,
) -> Result<(ValidatedSubmission, GuestInfo), Vec<FieldError>> {
    let incident = validate_submission(&payload.incident);

    let mut errors = match &incident {
        Ok(_) => Vec::new(),
        Err(e) => e.clone(),
    };
    let name = required("guest_name", &payload.guest_name, &mut errors);
    let contact = required("guest_contact", &payload.guest_contact, &mut errors);

    match (incident, name, contact) {
        (Ok(incident), Some(name), Some(contact)) => Ok((
            incident,
            GuestInfo {
                name: name.to_string(),
                contact: contact.to_string(),
            },
        )),
        _ => Err(errors),
    }
}

pub fn invalid_input(errors: &[FieldError]) -> AppError {
    let details = errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ");
    AppError::new(INVALID_INPUT, "Submission has missing or invalid fields")
        .with_details(details)
        .with_fields(errors.iter().map(|e| e.field.clone()))
}
