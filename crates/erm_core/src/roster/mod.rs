use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::domain::roster::{StaffMember, Team, TeamRoster};
use crate::error::{AppError, INVALID_INPUT};

/// Read access to team and staff rosters for eligibility checks.
///
/// Lookups receive the connection of the transaction in progress so the check and the
/// assignment write observe the same snapshot.
pub trait RosterProvider {
    fn team_roster(
        &self,
        conn: &Connection,
        team_id: i64,
    ) -> Result<Option<TeamRoster>, AppError>;
    fn staff_member(
        &self,
        conn: &Connection,
        staff_id: i64,
    ) -> Result<Option<StaffMember>, AppError>;
}

/// Roster stored in the same database as incidents.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteRoster;

fn read_staff(row: &rusqlite::Row<'_>) -> rusqlite::Result<StaffMember> {
    Ok(StaffMember {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        active: row.get(3)?,
        available: row.get(4)?,
        team_id: row.get(5)?,
    })
}

impl RosterProvider for SqliteRoster {
    fn team_roster(&self, conn: &Connection, team_id: i64) -> Result<Option<TeamRoster>, AppError> {
        let team = conn
            .query_row(
                "SELECT id, name FROM teams WHERE id = ?1",
                [team_id],
                |row| {
                    Ok(Team {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()
            .map_err(|e| {
                AppError::new("DB_QUERY_FAILED", "Failed to query team").with_details(e.to_string())
            })?;
        let Some(team) = team else {
            return Ok(None);
        };

        let members = list_staff_for_team(conn, team_id)?;
        Ok(Some(TeamRoster { team, members }))
    }

    fn staff_member(
        &self,
        conn: &Connection,
        staff_id: i64,
    ) -> Result<Option<StaffMember>, AppError> {
        conn.query_row(
            "SELECT id, name, email, active, available, team_id FROM staff WHERE id = ?1",
            [staff_id],
            read_staff,
        )
        .optional()
        .map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to query staff member")
                .with_details(e.to_string())
        })
    }
}

pub fn list_staff_for_team(conn: &Connection, team_id: i64) -> Result<Vec<StaffMember>, AppError> {
    let mut stmt = conn
        .prepare(
            "SELECT id, name, email, active, available, team_id FROM staff WHERE team_id = ?1 ORDER BY id ASC",
        )
        .map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to prepare team members query")
                .with_details(e.to_string())
        })?;

    let rows = stmt.query_map([team_id], read_staff).map_err(|e| {
        AppError::new("DB_QUERY_FAILED", "Failed to query team members").with_details(e.to_string())
    })?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r.map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to decode staff row")
                .with_details(e.to_string())
        })?);
    }
    Ok(out)
}

pub fn list_teams(conn: &Connection) -> Result<Vec<Team>, AppError> {
    let mut stmt = conn
        .prepare("SELECT id, name FROM teams ORDER BY name ASC, id ASC")
        .map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to prepare team list query")
                .with_details(e.to_string())
        })?;
    let rows = stmt
        .query_map([], |row| {
            Ok(Team {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })
        .map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to query teams").with_details(e.to_string())
        })?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r.map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to decode team row")
                .with_details(e.to_string())
        })?);
    }
    Ok(out)
}

/// Create a team or return the id of the existing team with the same name.
pub fn upsert_team(conn: &Connection, name: &str, created_at: &str) -> Result<i64, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::new(INVALID_INPUT, "Team name is required").with_fields(["name"]));
    }

    conn.execute(
        "INSERT INTO teams(name, created_at) VALUES (?1, ?2) ON CONFLICT(name) DO NOTHING",
        params![name, created_at],
    )
    .map_err(|e| {
        AppError::new("DB_INSERT_FAILED", "Failed to upsert team").with_details(e.to_string())
    })?;

    conn.query_row("SELECT id FROM teams WHERE name = ?1", [name], |row| row.get(0))
        .map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to read team id").with_details(e.to_string())
        })
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StaffUpsert {
    pub id: Option<i64>,
    pub name: String,
    pub email: Option<String>,
    pub active: bool,
    pub available: bool,
    pub team_id: Option<i64>,
}

pub fn upsert_staff(
    conn: &Connection,
    input: &StaffUpsert,
    created_at: &str,
) -> Result<i64, AppError> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err(AppError::new(INVALID_INPUT, "Staff name is required").with_fields(["name"]));
    }
    let email = input
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty());

    match input.id {
        Some(id) => {
            let changed = conn
                .execute(
                    "UPDATE staff SET name = ?1, email = ?2, active = ?3, available = ?4, team_id = ?5 WHERE id = ?6",
                    params![name, email, input.active, input.available, input.team_id, id],
                )
                .map_err(|e| {
                    AppError::new("DB_UPDATE_FAILED", "Failed to update staff member")
                        .with_details(e.to_string())
                })?;
            if changed == 0 {
                return Err(AppError::not_found("staff", id));
            }
            Ok(id)
        }
        None => {
            conn.execute(
                "INSERT INTO staff(name, email, active, available, team_id, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![name, email, input.active, input.available, input.team_id, created_at],
            )
            .map_err(|e| {
                AppError::new("DB_INSERT_FAILED", "Failed to insert staff member")
                    .with_details(e.to_string())
            })?;
            Ok(conn.last_insert_rowid())
        }
    }
}

/// Flip the duty flags of one staff member; the roster owner calls this, never the
/// lifecycle engine.
pub fn set_staff_flags(
    conn: &Connection,
    staff_id: i64,
    active: bool,
    available: bool,
) -> Result<(), AppError> {
    let changed = conn
        .execute(
            "UPDATE staff SET active = ?1, available = ?2 WHERE id = ?3",
            params![active, available, staff_id],
        )
        .map_err(|e| {
            AppError::new("DB_UPDATE_FAILED", "Failed to update staff flags")
                .with_details(e.to_string())
        })?;
    if changed == 0 {
        return Err(AppError::not_found("staff", staff_id));
    }
    Ok(())
}
