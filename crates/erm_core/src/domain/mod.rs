use serde::{Deserialize, Serialize};

pub mod roster;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Moderate,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Moderate => "moderate",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::Low),
            "moderate" => Some(Self::Moderate),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReporterSafety {
    Safe,
    Injured,
    Unknown,
}

impl ReporterSafety {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReporterSafety::Safe => "safe",
            ReporterSafety::Injured => "injured",
            ReporterSafety::Unknown => "unknown",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "safe" => Some(Self::Safe),
            "injured" => Some(Self::Injured),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Unvalidated,
    Validated,
    Rejected,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::Unvalidated => "unvalidated",
            ValidationStatus::Validated => "validated",
            ValidationStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "unvalidated" => Some(Self::Unvalidated),
            "validated" => Some(Self::Validated),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// The two outcomes a reviewer may record. `Unvalidated` is never a target.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ValidationDecision {
    Validated,
    Rejected,
}

impl ValidationDecision {
    pub fn as_status(&self) -> ValidationStatus {
        match self {
            ValidationDecision::Validated => ValidationStatus::Validated,
            ValidationDecision::Rejected => ValidationStatus::Rejected,
        }
    }

    /// Lifecycle status that the decision pushes the incident into.
    pub fn implied_status(&self) -> IncidentStatus {
        match self {
            ValidationDecision::Validated => IncidentStatus::InProgress,
            ValidationDecision::Rejected => IncidentStatus::Closed,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    Pending,
    InProgress,
    Resolved,
    Closed,
}

impl IncidentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentStatus::Pending => "pending",
            IncidentStatus::InProgress => "in_progress",
            IncidentStatus::Resolved => "resolved",
            IncidentStatus::Closed => "closed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "resolved" => Some(Self::Resolved),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, IncidentStatus::Resolved | IncidentStatus::Closed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GuestInfo {
    pub name: String,
    pub contact: String,
}

/// Who filed the report. Fixed at intake.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReporterRef {
    User { user_id: i64 },
    Guest(GuestInfo),
}

/// The responder currently holding an incident. Holding one variant excludes the other.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Assignment {
    Team { team_id: i64 },
    Staff { staff_id: i64 },
}

impl Assignment {
    pub fn team_id(&self) -> Option<i64> {
        match self {
            Assignment::Team { team_id } => Some(*team_id),
            Assignment::Staff { .. } => None,
        }
    }

    pub fn staff_id(&self) -> Option<i64> {
        match self {
            Assignment::Staff { staff_id } => Some(*staff_id),
            Assignment::Team { .. } => None,
        }
    }

    /// Rebuild from the two nullable storage columns.
    pub fn from_columns(team_id: Option<i64>, staff_id: Option<i64>) -> Option<Self> {
        match (team_id, staff_id) {
            (Some(team_id), _) => Some(Assignment::Team { team_id }),
            (None, Some(staff_id)) => Some(Assignment::Staff { staff_id }),
            (None, None) => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Assignment::Team { team_id } => format!("team:{team_id}"),
            Assignment::Staff { staff_id } => format!("staff:{staff_id}"),
        }
    }
}

/// Identity recorded against every mutation. Guest-triggered and background events use
/// `System`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Actor {
    User {
        user_id: i64,
    },
    #[default]
    System,
}

impl Actor {
    pub fn kind(&self) -> &'static str {
        match self {
            Actor::User { .. } => "user",
            Actor::System => "system",
        }
    }

    pub fn user_id(&self) -> Option<i64> {
        match self {
            Actor::User { user_id } => Some(*user_id),
            Actor::System => None,
        }
    }

    pub fn from_columns(kind: &str, user_id: Option<i64>) -> Option<Self> {
        match (kind, user_id) {
            ("user", Some(user_id)) => Some(Actor::User { user_id }),
            ("system", _) => Some(Actor::System),
            _ => None,
        }
    }
}

/// Where the incident happened.
///
/// Notes:
/// - `text` is what the reporter typed and is always present.
/// - Coordinates are only kept when both parse and fall in range; otherwise the raw input
///   is preserved in `coordinates_raw` and intake surfaces a warning.
/// - `resolved_address` is optional enrichment and may be a `"lat, lon"` placeholder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Location {
    pub text: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub coordinates_raw: Option<String>,
    pub resolved_address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IncidentRecord {
    pub id: i64,
    pub report_type: String,
    pub narrative: String,
    pub location: Location,
    pub priority: Priority,
    pub reporter_safety: ReporterSafety,
    pub reporter: ReporterRef,
    pub validation_status: ValidationStatus,
    pub validation_notes: Option<String>,
    pub assignment: Option<Assignment>,
    pub status: IncidentStatus,
    pub status_notes: Option<String>,
    pub reported_at: String,
    pub updated_at: String,
    pub version: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationWarning {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
}

impl ValidationWarning {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}
