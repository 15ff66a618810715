//! Reporter-facing intake: payload checks and location enrichment.
//!
//! Persistence lives in [`crate::lifecycle`]; everything here is pure apart from the
//! optional [`Geocoder`] call.

use serde::{Deserialize, Serialize};

use crate::domain::ValidationWarning;

pub mod location;
pub mod payload;

pub use location::{normalize_location, Geocoder};
pub use payload::{
    invalid_input, validate_guest_submission, validate_submission, GuestSubmissionPayload,
    SubmissionPayload, ValidatedSubmission,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IntakeReceipt {
    pub id: i64,
    pub warnings: Vec<ValidationWarning>,
}
