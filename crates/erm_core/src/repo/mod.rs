use rusqlite::{params, Connection, OptionalExtension};

use crate::domain::{
    Assignment, GuestInfo, IncidentRecord, IncidentStatus, Location, Priority, ReporterRef,
    ReporterSafety, ValidationStatus,
};
use crate::error::AppError;

const INCIDENT_COLUMNS: &str = r#"
  i.id, i.report_type, i.narrative,
  i.location_text, i.latitude, i.longitude, i.coordinates_raw, i.resolved_address,
  i.priority, i.reporter_safety, i.reporter_user_id, g.name, g.contact,
  i.validation_status, i.validation_notes,
  i.assigned_team_id, i.assigned_staff_id,
  i.status, i.status_notes,
  i.reported_at, i.updated_at, i.version
"#;

/// Row as stored; enumerated columns are decoded afterwards so bad values surface as
/// `DB_DECODE_FAILED` rather than a rusqlite conversion error.
struct IncidentRow {
    id: i64,
    report_type: String,
    narrative: String,
    location_text: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    coordinates_raw: Option<String>,
    resolved_address: Option<String>,
    priority: String,
    reporter_safety: String,
    reporter_user_id: Option<i64>,
    guest_name: Option<String>,
    guest_contact: Option<String>,
    validation_status: String,
    validation_notes: Option<String>,
    assigned_team_id: Option<i64>,
    assigned_staff_id: Option<i64>,
    status: String,
    status_notes: Option<String>,
    reported_at: String,
    updated_at: String,
    version: i64,
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<IncidentRow> {
    Ok(IncidentRow {
        id: row.get(0)?,
        report_type: row.get(1)?,
        narrative: row.get(2)?,
        location_text: row.get(3)?,
        latitude: row.get(4)?,
        longitude: row.get(5)?,
        coordinates_raw: row.get(6)?,
        resolved_address: row.get(7)?,
        priority: row.get(8)?,
        reporter_safety: row.get(9)?,
        reporter_user_id: row.get(10)?,
        guest_name: row.get(11)?,
        guest_contact: row.get(12)?,
        validation_status: row.get(13)?,
        validation_notes: row.get(14)?,
        assigned_team_id: row.get(15)?,
        assigned_staff_id: row.get(16)?,
        status: row.get(17)?,
        status_notes: row.get(18)?,
        reported_at: row.get(19)?,
        updated_at: row.get(20)?,
        version: row.get(21)?,
    })
}

fn decode_failed(id: i64, column: &str, value: &str) -> AppError {
    AppError::new("DB_DECODE_FAILED", format!("Incident {id} has an invalid {column}"))
        .with_details(format!("{column}={value}"))
}

fn decode(row: IncidentRow) -> Result<IncidentRecord, AppError> {
    let id = row.id;
    let priority = Priority::from_str(&row.priority)
        .ok_or_else(|| decode_failed(id, "priority", &row.priority))?;
    let reporter_safety = ReporterSafety::from_str(&row.reporter_safety)
        .ok_or_else(|| decode_failed(id, "reporter_safety", &row.reporter_safety))?;
    let validation_status = ValidationStatus::from_str(&row.validation_status)
        .ok_or_else(|| decode_failed(id, "validation_status", &row.validation_status))?;
    let status = IncidentStatus::from_str(&row.status)
        .ok_or_else(|| decode_failed(id, "status", &row.status))?;

    let reporter = match (row.reporter_user_id, row.guest_name, row.guest_contact) {
        (Some(user_id), None, None) => ReporterRef::User { user_id },
        (None, Some(name), Some(contact)) => ReporterRef::Guest(GuestInfo { name, contact }),
        _ => {
            return Err(AppError::new(
                "DB_DECODE_FAILED",
                format!("Incident {id} must have exactly one reporter"),
            ))
        }
    };

    Ok(IncidentRecord {
        id,
        report_type: row.report_type,
        narrative: row.narrative,
        location: Location {
            text: row.location_text,
            latitude: row.latitude,
            longitude: row.longitude,
            coordinates_raw: row.coordinates_raw,
            resolved_address: row.resolved_address,
        },
        priority,
        reporter_safety,
        reporter,
        validation_status,
        validation_notes: row.validation_notes,
        assignment: Assignment::from_columns(row.assigned_team_id, row.assigned_staff_id),
        status,
        status_notes: row.status_notes,
        reported_at: row.reported_at,
        updated_at: row.updated_at,
        version: row.version,
    })
}

pub fn get_incident(conn: &Connection, id: i64) -> Result<IncidentRecord, AppError> {
    let sql = format!(
        "SELECT {INCIDENT_COLUMNS} FROM incidents i LEFT JOIN guest_reporters g ON g.incident_id = i.id WHERE i.id = ?1"
    );
    let row = conn
        .query_row(&sql, [id], read_row)
        .optional()
        .map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to query incident").with_details(e.to_string())
        })?
        .ok_or_else(|| AppError::not_found("incident", id))?;
    decode(row)
}

pub fn list_incidents(
    conn: &Connection,
    status: Option<IncidentStatus>,
) -> Result<Vec<IncidentRecord>, AppError> {
    let sql = format!(
        "SELECT {INCIDENT_COLUMNS} FROM incidents i LEFT JOIN guest_reporters g ON g.incident_id = i.id \
         WHERE (?1 IS NULL OR i.status = ?1) ORDER BY i.reported_at DESC, i.id DESC"
    );
    let mut stmt = conn.prepare(&sql).map_err(|e| {
        AppError::new("DB_QUERY_FAILED", "Failed to prepare incidents query")
            .with_details(e.to_string())
    })?;

    let rows = stmt
        .query_map([status.map(|s| s.as_str())], read_row)
        .map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to query incidents")
                .with_details(e.to_string())
        })?;

    let mut out = Vec::new();
    for r in rows {
        let row = r.map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to decode incident row")
                .with_details(e.to_string())
        })?;
        out.push(decode(row)?);
    }

    Ok(out)
}

pub fn count_incidents(conn: &Connection) -> Result<i64, AppError> {
    conn.query_row("SELECT COUNT(*) FROM incidents", [], |row| row.get(0))
        .map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to count incidents")
                .with_details(e.to_string())
        })
}

pub(crate) struct NewIncident<'a> {
    pub report_type: &'a str,
    pub narrative: &'a str,
    pub location: &'a Location,
    pub priority: Priority,
    pub reporter_safety: ReporterSafety,
    pub reporter_user_id: Option<i64>,
    pub reported_at: &'a str,
}

pub(crate) fn insert_incident(conn: &Connection, new: &NewIncident<'_>) -> Result<i64, AppError> {
    conn.execute(
        r#"
        INSERT INTO incidents(
          report_type, narrative,
          location_text, latitude, longitude, coordinates_raw, resolved_address,
          priority, reporter_safety, reporter_user_id,
          validation_status, status, reported_at, updated_at, version
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 'unvalidated', 'pending', ?11, ?11, 1)
        "#,
        params![
            new.report_type,
            new.narrative,
            new.location.text,
            new.location.latitude,
            new.location.longitude,
            new.location.coordinates_raw,
            new.location.resolved_address,
            new.priority.as_str(),
            new.reporter_safety.as_str(),
            new.reporter_user_id,
            new.reported_at,
        ],
    )
    .map_err(|e| {
        AppError::new("DB_INSERT_FAILED", "Failed to insert incident").with_details(e.to_string())
    })?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn insert_guest_reporter(
    conn: &Connection,
    incident_id: i64,
    guest: &GuestInfo,
    created_at: &str,
) -> Result<(), AppError> {
    conn.execute(
        "INSERT INTO guest_reporters(incident_id, name, contact, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![incident_id, guest.name, guest.contact, created_at],
    )
    .map_err(|e| {
        AppError::new("DB_INSERT_FAILED", "Failed to insert guest reporter")
            .with_details(e.to_string())
    })?;
    Ok(())
}

/// Persist the mutable columns of `next`, guarded by the version the caller read.
///
/// `next.version` must already be `expected_version + 1`.
pub(crate) fn update_incident(
    conn: &Connection,
    next: &IncidentRecord,
    expected_version: i64,
) -> Result<(), AppError> {
    let assignment = next.assignment;
    let changed = conn
        .execute(
            r#"
            UPDATE incidents SET
              validation_status = ?1,
              validation_notes = ?2,
              assigned_team_id = ?3,
              assigned_staff_id = ?4,
              status = ?5,
              status_notes = ?6,
              updated_at = ?7,
              version = ?8
            WHERE id = ?9 AND version = ?10
            "#,
            params![
                next.validation_status.as_str(),
                next.validation_notes,
                assignment.and_then(|a| a.team_id()),
                assignment.and_then(|a| a.staff_id()),
                next.status.as_str(),
                next.status_notes,
                next.updated_at,
                next.version,
                next.id,
                expected_version,
            ],
        )
        .map_err(|e| {
            AppError::new("DB_UPDATE_FAILED", "Failed to update incident")
                .with_details(e.to_string())
        })?;

    if changed == 0 {
        return Err(AppError::conflict(next.id));
    }
    Ok(())
}
