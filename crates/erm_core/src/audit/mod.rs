use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::Actor;
use crate::error::AppError;

pub const ACTION_SUBMITTED: &str = "incident.submitted";
pub const ACTION_VALIDATED: &str = "incident.validated";
pub const ACTION_REJECTED: &str = "incident.rejected";
pub const ACTION_STATUS_CHANGED: &str = "incident.status_changed";
pub const ACTION_ASSIGNED: &str = "incident.assigned";
pub const ACTION_UNASSIGNED: &str = "incident.unassigned";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditEntry {
    pub id: i64,
    pub incident_id: Option<i64>,
    pub actor: Actor,
    pub action: String,
    pub detail: String,
    pub created_at: String, // RFC3339
    pub entry_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewAuditEntry {
    pub incident_id: Option<i64>,
    pub actor: Actor,
    pub action: String,
    pub detail: String,
    pub created_at: String,
}

/// Append-only destination for audit entries. Callers treat any error as non-fatal.
pub trait AuditSink {
    fn append(&self, conn: &Connection, entry: &NewAuditEntry) -> Result<i64, AppError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteAuditLog;

#[derive(Debug, Clone, Serialize)]
struct HashPayload<'a> {
    incident_id: Option<i64>,
    actor_kind: &'a str,
    actor_user_id: Option<i64>,
    action: &'a str,
    detail: &'a str,
    created_at: &'a str,
}

pub fn compute_entry_hash(entry: &NewAuditEntry) -> Result<String, AppError> {
    let payload = HashPayload {
        incident_id: entry.incident_id,
        actor_kind: entry.actor.kind(),
        actor_user_id: entry.actor.user_id(),
        action: entry.action.as_str(),
        detail: entry.detail.as_str(),
        created_at: entry.created_at.as_str(),
    };
    let json = serde_json::to_string(&payload).map_err(|e| {
        AppError::new("AUDIT_HASH_FAILED", "Failed to serialize audit hash payload")
            .with_details(e.to_string())
    })?;
    Ok(hex::encode(Sha256::digest(json.as_bytes())))
}

impl AuditSink for SqliteAuditLog {
    fn append(&self, conn: &Connection, entry: &NewAuditEntry) -> Result<i64, AppError> {
        if entry.action.trim().is_empty() {
            return Err(AppError::new("AUDIT_INVALID", "Audit action tag is required"));
        }
        let entry_hash = compute_entry_hash(entry)?;
        conn.execute(
            r#"
            INSERT INTO audit_entries(
              incident_id, actor_kind, actor_user_id, action, detail, created_at, entry_hash
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                entry.incident_id,
                entry.actor.kind(),
                entry.actor.user_id(),
                entry.action,
                entry.detail,
                entry.created_at,
                entry_hash,
            ],
        )
        .map_err(|e| {
            AppError::new("AUDIT_APPEND_FAILED", "Failed to append audit entry")
                .with_details(e.to_string())
        })?;
        Ok(conn.last_insert_rowid())
    }
}

pub fn list_audit_entries(
    conn: &Connection,
    incident_id: i64,
) -> Result<Vec<AuditEntry>, AppError> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT id, incident_id, actor_kind, actor_user_id, action, detail, created_at, entry_hash
            FROM audit_entries
            WHERE incident_id = ?1
            ORDER BY id ASC
            "#,
        )
        .map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to prepare audit query")
                .with_details(e.to_string())
        })?;

    let rows = stmt
        .query_map([incident_id], |row| {
            let actor_kind: String = row.get(2)?;
            let actor_user_id: Option<i64> = row.get(3)?;
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, Option<i64>>(1)?,
                actor_kind,
                actor_user_id,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
            ))
        })
        .map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to query audit entries")
                .with_details(e.to_string())
        })?;

    let mut out = Vec::new();
    for r in rows {
        let (id, incident_id, actor_kind, actor_user_id, action, detail, created_at, entry_hash) =
            r.map_err(|e| {
                AppError::new("DB_QUERY_FAILED", "Failed to decode audit row")
                    .with_details(e.to_string())
            })?;
        let actor = Actor::from_columns(&actor_kind, actor_user_id).ok_or_else(|| {
            AppError::new("DB_DECODE_FAILED", format!("Audit entry {id} has an invalid actor"))
                .with_details(format!("actor_kind={actor_kind}; actor_user_id={actor_user_id:?}"))
        })?;
        out.push(AuditEntry {
            id,
            incident_id,
            actor,
            action,
            detail,
            created_at,
            entry_hash,
        });
    }
    Ok(out)
}

pub fn count_audit_entries(conn: &Connection, incident_id: i64) -> Result<i64, AppError> {
    conn.query_row(
        "SELECT COUNT(*) FROM audit_entries WHERE incident_id = ?1",
        [incident_id],
        |row| row.get(0),
    )
    .map_err(|e| {
        AppError::new("DB_QUERY_FAILED", "Failed to count audit entries")
            .with_details(e.to_string())
    })
}

/// Recompute the stored hash; `false` means the row no longer matches what was appended.
pub fn verify_audit_entry(entry: &AuditEntry) -> Result<bool, AppError> {
    let recomputed = compute_entry_hash(&NewAuditEntry {
        incident_id: entry.incident_id,
        actor: entry.actor,
        action: entry.action.clone(),
        detail: entry.detail.clone(),
        created_at: entry.created_at.clone(),
    })?;
    Ok(recomputed == entry.entry_hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use pretty_assertions::assert_eq;

    fn entry(action: &str) -> NewAuditEntry {
        NewAuditEntry {
            incident_id: None,
            actor: Actor::User { user_id: 7 },
            action: action.to_string(),
            detail: "status=pending->in_progress".to_string(),
            created_at: "2026-03-01T10:00:00Z".to_string(),
        }
    }

    #[test]
    fn hash_depends_on_every_field() {
        let a = compute_entry_hash(&entry(ACTION_STATUS_CHANGED)).unwrap();
        let mut other = entry(ACTION_STATUS_CHANGED);
        other.actor = Actor::System;
        let b = compute_entry_hash(&other).unwrap();
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn entries_are_append_only() {
        let mut conn = db::open_in_memory().unwrap();
        db::migrate(&mut conn).unwrap();
        let id = SqliteAuditLog.append(&conn, &entry(ACTION_SUBMITTED)).unwrap();

        let upd = conn.execute("UPDATE audit_entries SET detail = 'x' WHERE id = ?1", [id]);
        assert!(upd.is_err());
        let del = conn.execute("DELETE FROM audit_entries WHERE id = ?1", [id]);
        assert!(del.is_err());
    }

    #[test]
    fn blank_action_is_refused() {
        let mut conn = db::open_in_memory().unwrap();
        db::migrate(&mut conn).unwrap();
        let err = SqliteAuditLog.append(&conn, &entry("  ")).unwrap_err();
        assert_eq!(err.code, "AUDIT_INVALID");
    }
}
