use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::domain::ValidationWarning;
use crate::error::AppError;
use crate::roster::{upsert_staff, upsert_team, StaffUpsert};

/// Expected headers: `Team,Name,Email,Active,Available`. `Team` and `Email` may be blank;
/// `Active`/`Available` default to true when the column is missing or blank.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RosterImportSummary {
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
    pub warnings: Vec<ValidationWarning>,
}

fn get<'a>(
    row: &'a csv::StringRecord,
    headers: &'a csv::StringRecord,
    header_name: &str,
) -> Option<&'a str> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(header_name))
        .and_then(|idx| row.get(idx))
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

fn parse_flag(raw: Option<&str>) -> Result<bool, String> {
    let Some(s) = raw else { return Ok(true) };
    match s.to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" => Ok(true),
        "false" | "no" | "n" | "0" => Ok(false),
        _ => Err(s.to_string()),
    }
}

/// `(staff_id, team_id)` of the member already holding `email`.
fn find_staff_by_email(
    conn: &Connection,
    email: &str,
) -> Result<Option<(i64, Option<i64>)>, AppError> {
    conn.query_row(
        "SELECT id, team_id FROM staff WHERE lower(email) = lower(?1) ORDER BY id ASC LIMIT 1",
        [email],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()
    .map_err(|e| {
        AppError::new("DB_QUERY_FAILED", "Failed to look up staff by email")
            .with_details(e.to_string())
    })
}

/// Load roster rows in one transaction. Malformed rows are skipped with a warning; rows
/// whose email matches an existing staff member update that member in place. A blank `Team`
/// cell on such a row keeps the member's current team.
pub fn import_roster_csv(
    conn: &mut Connection,
    csv_text: &str,
    imported_at: &str,
) -> Result<RosterImportSummary, AppError> {
    let mut summary = RosterImportSummary {
        inserted: 0,
        updated: 0,
        skipped: 0,
        warnings: Vec::new(),
    };

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(csv_text.as_bytes());

    let headers = rdr
        .headers()
        .map_err(|e| {
            AppError::new("INGEST_ROSTER_CSV_HEADERS_FAILED", "Failed to read roster CSV headers")
                .with_details(e.to_string())
        })?
        .clone();
    if !headers.iter().any(|h| h.trim().eq_ignore_ascii_case("Name")) {
        return Err(AppError::new(
            "INGEST_ROSTER_CSV_MISSING_COLUMN",
            "Roster CSV must have a Name column",
        )
        .with_details(format!("headers={}", headers.iter().collect::<Vec<_>>().join(","))));
    }

    let tx = conn.transaction().map_err(|e| {
        AppError::new("DB_TX_FAILED", "Failed to start roster import transaction")
            .with_details(e.to_string())
    })?;

    for (row_idx, result) in rdr.records().enumerate() {
        let row = match result {
            Ok(r) => r,
            Err(e) => {
                summary.warnings.push(
                    ValidationWarning::new(
                        "INGEST_ROSTER_CSV_PARSE_FAILED",
                        "Failed to parse roster CSV row",
                    )
                    .with_details(format!("row={row_idx}; err={e}")),
                );
                summary.skipped += 1;
                continue;
            }
        };

        let Some(name) = get(&row, &headers, "Name") else {
            summary.warnings.push(
                ValidationWarning::new("INGEST_ROSTER_MISSING_NAME", "Row missing staff name")
                    .with_details(format!("row={row_idx}")),
            );
            summary.skipped += 1;
            continue;
        };

        let flags = (
            parse_flag(get(&row, &headers, "Active")),
            parse_flag(get(&row, &headers, "Available")),
        );
        let (active, available) = match flags {
            (Ok(a), Ok(b)) => (a, b),
            (Err(v), _) | (_, Err(v)) => {
                summary.warnings.push(
                    ValidationWarning::new(
                        "INGEST_ROSTER_FLAG_INVALID",
                        "Active/Available must be true or false",
                    )
                    .with_details(format!("row={row_idx}; value={v}")),
                );
                summary.skipped += 1;
                continue;
            }
        };

        let email = get(&row, &headers, "Email").map(str::to_string);
        let existing = match email.as_deref() {
            Some(e) => find_staff_by_email(&tx, e)?,
            None => None,
        };
        let team_id = match get(&row, &headers, "Team") {
            Some(team) => Some(upsert_team(&tx, team, imported_at)?),
            None => existing.and_then(|(_, team_id)| team_id),
        };

        upsert_staff(
            &tx,
            &StaffUpsert {
                id: existing.map(|(id, _)| id),
                name: name.to_string(),
                email,
                active,
                available,
                team_id,
            },
            imported_at,
        )?;
        if existing.is_some() {
            summary.updated += 1;
        } else {
            summary.inserted += 1;
        }
    }

    tx.commit().map_err(|e| {
        AppError::new("DB_TX_FAILED", "Failed to commit roster import")
            .with_details(e.to_string())
    })?;

    tracing::info!(
        inserted = summary.inserted,
        updated = summary.updated,
        skipped = summary.skipped,
        "roster import finished"
    );
    Ok(summary)
}
