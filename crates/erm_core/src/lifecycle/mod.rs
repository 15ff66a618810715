//! Lifecycle coordinator: every mutating operation on an incident goes through here.
//!
//! Each operation runs in a `BEGIN IMMEDIATE` transaction, so the terminal-state check
//! and the write happen under the database write lock; the row's `version` column is
//! checked again on update. Audit entries and notifications run only after commit, and
//! their failures are reported or logged but never undo the committed change.

use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};

use crate::audit::{self, AuditEntry, AuditSink, NewAuditEntry, SqliteAuditLog};
use crate::db::now_rfc3339_utc;
use crate::domain::{Actor, Assignment, IncidentRecord, IncidentStatus, ValidationDecision};
use crate::error::{AppError, INVALID_INPUT};
use crate::intake::{
    invalid_input, normalize_location, validate_guest_submission, validate_submission, Geocoder,
    GuestSubmissionPayload, IntakeReceipt, SubmissionPayload, ValidatedSubmission,
};
use crate::notify::{render_assignment_notice, DeliveryReport, NotificationGateway};
use crate::repo::{self, NewIncident};
use crate::roster::{RosterProvider, SqliteRoster};

pub mod assignment;
pub mod transition;

pub use assignment::{resolve_target, AssignmentTarget, ResolvedAssignment};
pub use transition::{check_transition, Transition};

/// What happened to the notification that followed an assignment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationSummary {
    pub email_sent: bool,
    pub email_detail: String,
    pub delivery: Option<DeliveryReport>,
}

impl NotificationSummary {
    fn skipped(detail: impl Into<String>) -> Self {
        Self {
            email_sent: false,
            email_detail: detail.into(),
            delivery: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssignmentOutcome {
    pub record: IncidentRecord,
    #[serde(flatten)]
    pub notification: NotificationSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationOutcome {
    pub record: IncidentRecord,
    /// Present only when the call changed the assignment.
    pub notification: Option<NotificationSummary>,
}

fn begin_immediate(conn: &mut Connection) -> Result<Transaction<'_>, AppError> {
    conn.transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|e| {
            AppError::new("DB_TX_FAILED", "Failed to start transaction")
                .with_details(e.to_string())
                .with_retryable(true)
        })
}

fn commit(tx: Transaction<'_>) -> Result<(), AppError> {
    tx.commit().map_err(|e| {
        AppError::new("DB_TX_FAILED", "Failed to commit transaction")
            .with_details(e.to_string())
            .with_retryable(true)
    })
}

fn clean_notes(notes: Option<&str>) -> Option<String> {
    notes
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}

fn describe_assignment(a: Option<Assignment>) -> String {
    a.map(|a| a.describe()).unwrap_or_else(|| "none".to_string())
}

/// Audit detail for an assignment change, written once the notification outcome is known.
fn assignment_detail(
    from: Option<Assignment>,
    to: Option<Assignment>,
    notification: &NotificationSummary,
) -> String {
    format!(
        "assignment={}->{}; email_sent={}; email_detail={}",
        describe_assignment(from),
        describe_assignment(to),
        notification.email_sent,
        notification.email_detail
    )
}

fn next_version(current: &IncidentRecord, now: String) -> IncidentRecord {
    let mut next = current.clone();
    next.version = current.version + 1;
    next.updated_at = now;
    next
}

pub struct LifecycleCoordinator<'a> {
    conn: &'a mut Connection,
    roster: &'a dyn RosterProvider,
    notifier: &'a dyn NotificationGateway,
    audit: &'a dyn AuditSink,
    geocoder: Option<&'a dyn Geocoder>,
}

impl<'a> LifecycleCoordinator<'a> {
    /// Coordinator over a migrated store, reading rosters from and auditing to the same
    /// database.
    pub fn new(conn: &'a mut Connection, notifier: &'a dyn NotificationGateway) -> Self {
        Self {
            conn,
            roster: &SqliteRoster,
            notifier,
            audit: &SqliteAuditLog,
            geocoder: None,
        }
    }

    pub fn with_roster(mut self, roster: &'a dyn RosterProvider) -> Self {
        self.roster = roster;
        self
    }

    pub fn with_audit_sink(mut self, audit: &'a dyn AuditSink) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_geocoder(mut self, geocoder: &'a dyn Geocoder) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    pub fn incident(&self, id: i64) -> Result<IncidentRecord, AppError> {
        repo::get_incident(&*self.conn, id)
    }

    pub fn audit_trail(&self, id: i64) -> Result<Vec<AuditEntry>, AppError> {
        audit::list_audit_entries(&*self.conn, id)
    }

    /// Best effort: a failed append is logged and otherwise ignored.
    fn record(&self, incident_id: i64, actor: Actor, action: &str, detail: String) {
        let created_at = match now_rfc3339_utc() {
            Ok(ts) => ts,
            Err(e) => {
                tracing::warn!(incident_id, action, error = %e, "audit entry dropped");
                return;
            }
        };
        let entry = NewAuditEntry {
            incident_id: Some(incident_id),
            actor,
            action: action.to_string(),
            detail,
            created_at,
        };
        if let Err(e) = self.audit.append(&*self.conn, &entry) {
            tracing::warn!(
                incident_id,
                action,
                code = %e.code,
                error = %e,
                "audit append failed; primary change already committed"
            );
        }
    }

    fn dispatch(
        &self,
        record: &IncidentRecord,
        resolved: &ResolvedAssignment,
    ) -> NotificationSummary {
        if resolved.recipients.is_empty() {
            return NotificationSummary::skipped(format!(
                "No recipient addresses on file for {}",
                resolved.assignee
            ));
        }

        let message = render_assignment_notice(record, &resolved.assignee);
        let report = self.notifier.send(&resolved.recipients, &message);
        if report.sent && report.failed == 0 {
            tracing::info!(
                incident_id = record.id,
                delivered = report.delivered,
                "assignment notification delivered"
            );
        } else {
            tracing::warn!(
                incident_id = record.id,
                delivered = report.delivered,
                failed = report.failed,
                error = report.error.as_deref().unwrap_or(""),
                "assignment notification incomplete"
            );
        }

        NotificationSummary {
            email_sent: report.sent,
            email_detail: report.summary(),
            delivery: Some(report),
        }
    }

    fn prepare_location(
        &self,
        submission: &ValidatedSubmission,
        warnings: &mut Vec<crate::domain::ValidationWarning>,
    ) -> crate::domain::Location {
        normalize_location(
            &submission.location_text,
            submission.latitude_raw.as_deref(),
            submission.longitude_raw.as_deref(),
            self.geocoder,
            warnings,
        )
    }

    /// Intake from an authenticated reporter. `actor` is who filed it, which differs from
    /// `user_id` when staff take a report on someone's behalf.
    pub fn submit(
        &mut self,
        payload: &SubmissionPayload,
        user_id: i64,
        actor: Actor,
    ) -> Result<IntakeReceipt, AppError> {
        let submission = validate_submission(payload).map_err(|e| invalid_input(&e))?;
        let mut warnings = Vec::new();
        let location = self.prepare_location(&submission, &mut warnings);
        let now = now_rfc3339_utc()?;

        let tx = begin_immediate(self.conn)?;
        let id = repo::insert_incident(
            &tx,
            &NewIncident {
                report_type: &submission.report_type,
                narrative: &submission.narrative,
                location: &location,
                priority: submission.priority,
                reporter_safety: submission.reporter_safety,
                reporter_user_id: Some(user_id),
                reported_at: &now,
            },
        )?;
        commit(tx)?;

        tracing::info!(
            incident_id = id,
            user_id,
            priority = submission.priority.as_str(),
            "incident submitted"
        );
        self.record(
            id,
            actor,
            audit::ACTION_SUBMITTED,
            format!(
                "report_type={}; priority={}; reporter=user:{user_id}",
                submission.report_type,
                submission.priority.as_str()
            ),
        );

        Ok(IntakeReceipt { id, warnings })
    }

    /// Intake from an unauthenticated reporter. The incident row and its guest row are
    /// written in one transaction; neither survives without the other.
    pub fn submit_guest(
        &mut self,
        payload: &GuestSubmissionPayload,
    ) -> Result<IntakeReceipt, AppError> {
        let (submission, guest) =
            validate_guest_submission(payload).map_err(|e| invalid_input(&e))?;
        let mut warnings = Vec::new();
        let location = self.prepare_location(&submission, &mut warnings);
        let now = now_rfc3339_utc()?;

        let tx = begin_immediate(self.conn)?;
        let id = repo::insert_incident(
            &tx,
            &NewIncident {
                report_type: &submission.report_type,
                narrative: &submission.narrative,
                location: &location,
                priority: submission.priority,
                reporter_safety: submission.reporter_safety,
                reporter_user_id: None,
                reported_at: &now,
            },
        )?;
        repo::insert_guest_reporter(&tx, id, &guest, &now)?;
        commit(tx)?;

        tracing::info!(
            incident_id = id,
            priority = submission.priority.as_str(),
            "guest incident submitted"
        );
        self.record(
            id,
            Actor::System,
            audit::ACTION_SUBMITTED,
            format!(
                "report_type={}; priority={}; reporter=guest",
                submission.report_type,
                submission.priority.as_str()
            ),
        );

        Ok(IntakeReceipt { id, warnings })
    }

    /// Record a reviewer decision. `validated` moves the incident to `in_progress`,
    /// `rejected` to `closed`. An optional assignment target is resolved first; if it is
    /// ineligible nothing is written. A target alongside `rejected` is refused once the
    /// incident is known to exist and still be open.
    pub fn validate(
        &mut self,
        id: i64,
        decision: ValidationDecision,
        notes: Option<&str>,
        target: Option<AssignmentTarget>,
        actor: Actor,
    ) -> Result<ValidationOutcome, AppError> {
        let roster = self.roster;
        let tx = begin_immediate(self.conn)?;
        let current = repo::get_incident(&tx, id)?;
        transition::ensure_mutable(current.status)?;

        if decision == ValidationDecision::Rejected && target.is_some() {
            return Err(AppError::new(
                INVALID_INPUT,
                "A rejected incident cannot be assigned",
            )
            .with_fields(["assignment_target"]));
        }

        let resolved = match target {
            Some(t) => Some(resolve_target(&tx, roster, t)?),
            None => None,
        };
        let status_change = check_transition(current.status, decision.implied_status())?;

        let notes = clean_notes(notes);
        let validation_changed = current.validation_status != decision.as_status();
        let notes_changed = notes.is_some() && notes != current.validation_notes;
        let next_assignment = resolved.as_ref().map(|r| r.assignment);
        let assignment_changed = next_assignment.is_some() && next_assignment != current.assignment;

        if !validation_changed
            && !notes_changed
            && !assignment_changed
            && status_change == Transition::Unchanged
        {
            tracing::debug!(incident_id = id, "validation resubmitted without changes");
            return Ok(ValidationOutcome {
                record: current,
                notification: None,
            });
        }

        let mut next = next_version(&current, now_rfc3339_utc()?);
        next.validation_status = decision.as_status();
        if notes_changed {
            next.validation_notes = notes;
        }
        if let Transition::Change { to, .. } = status_change {
            next.status = to;
        }
        if assignment_changed {
            next.assignment = next_assignment;
        }
        repo::update_incident(&tx, &next, current.version)?;
        commit(tx)?;

        tracing::info!(
            incident_id = id,
            validation_status = next.validation_status.as_str(),
            status = next.status.as_str(),
            "incident validation recorded"
        );

        if validation_changed {
            let action = match decision {
                ValidationDecision::Validated => audit::ACTION_VALIDATED,
                ValidationDecision::Rejected => audit::ACTION_REJECTED,
            };
            self.record(
                id,
                actor,
                action,
                format!(
                    "validation_status={}->{}; status={}->{}",
                    current.validation_status.as_str(),
                    next.validation_status.as_str(),
                    current.status.as_str(),
                    next.status.as_str()
                ),
            );
        } else if let Transition::Change { from, to } = status_change {
            self.record(
                id,
                actor,
                audit::ACTION_STATUS_CHANGED,
                format!("status={}->{}", from.as_str(), to.as_str()),
            );
        }

        let notification = match (&resolved, assignment_changed) {
            (Some(resolved), true) => {
                let summary = self.dispatch(&next, resolved);
                self.record(
                    id,
                    actor,
                    audit::ACTION_ASSIGNED,
                    assignment_detail(current.assignment, next.assignment, &summary),
                );
                Some(summary)
            }
            _ => None,
        };

        Ok(ValidationOutcome {
            record: next,
            notification,
        })
    }

    pub fn assign_team(
        &mut self,
        id: i64,
        team_id: Option<i64>,
        actor: Actor,
    ) -> Result<AssignmentOutcome, AppError> {
        self.assign(id, team_id.map(AssignmentTarget::Team), actor)
    }

    pub fn assign_staff(
        &mut self,
        id: i64,
        staff_id: Option<i64>,
        actor: Actor,
    ) -> Result<AssignmentOutcome, AppError> {
        self.assign(id, staff_id.map(AssignmentTarget::Staff), actor)
    }

    /// `None` clears. Setting either variant replaces whatever was there in one write.
    fn assign(
        &mut self,
        id: i64,
        target: Option<AssignmentTarget>,
        actor: Actor,
    ) -> Result<AssignmentOutcome, AppError> {
        let roster = self.roster;
        let tx = begin_immediate(self.conn)?;
        let current = repo::get_incident(&tx, id)?;
        transition::ensure_mutable(current.status)?;

        let resolved = match target {
            Some(t) => Some(resolve_target(&tx, roster, t)?),
            None => None,
        };
        let next_assignment = resolved.as_ref().map(|r| r.assignment);

        if next_assignment == current.assignment {
            tracing::debug!(incident_id = id, "assignment unchanged");
            let detail = match next_assignment {
                Some(_) => "Assignment unchanged; no notification sent",
                None => "No assignment to clear; no notification sent",
            };
            return Ok(AssignmentOutcome {
                record: current,
                notification: NotificationSummary::skipped(detail),
            });
        }

        let mut next = next_version(&current, now_rfc3339_utc()?);
        next.assignment = next_assignment;
        repo::update_incident(&tx, &next, current.version)?;
        commit(tx)?;

        tracing::info!(
            incident_id = id,
            assignment = %describe_assignment(next.assignment),
            "incident assignment changed"
        );

        let (action, notification) = match &resolved {
            Some(resolved) => (audit::ACTION_ASSIGNED, self.dispatch(&next, resolved)),
            None => (
                audit::ACTION_UNASSIGNED,
                NotificationSummary::skipped("Assignment cleared; no notification sent"),
            ),
        };
        self.record(
            id,
            actor,
            action,
            assignment_detail(current.assignment, next.assignment, &notification),
        );

        Ok(AssignmentOutcome {
            record: next,
            notification,
        })
    }

    /// Move the incident along the status state machine.
    pub fn update_status(
        &mut self,
        id: i64,
        status: IncidentStatus,
        notes: Option<&str>,
        actor: Actor,
    ) -> Result<IncidentRecord, AppError> {
        let tx = begin_immediate(self.conn)?;
        let current = repo::get_incident(&tx, id)?;

        let (from, to) = match check_transition(current.status, status)? {
            Transition::Unchanged => {
                tracing::debug!(incident_id = id, status = status.as_str(), "status unchanged");
                return Ok(current);
            }
            Transition::Change { from, to } => (from, to),
        };

        let notes = clean_notes(notes);
        let mut next = next_version(&current, now_rfc3339_utc()?);
        next.status = to;
        if notes.is_some() {
            next.status_notes = notes.clone();
        }
        repo::update_incident(&tx, &next, current.version)?;
        commit(tx)?;

        tracing::info!(
            incident_id = id,
            from = from.as_str(),
            to = to.as_str(),
            "incident status changed"
        );

        let mut detail = format!("status={}->{}", from.as_str(), to.as_str());
        if let Some(n) = &notes {
            detail.push_str(&format!("; notes={n}"));
        }
        self.record(id, actor, audit::ACTION_STATUS_CHANGED, detail);

        Ok(next)
    }
}
