use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::AppError;

pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

const MIGRATION_0001: (&str, &str) = (
    "0001_init.sql",
    include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../../migrations/0001_init.sql"
    )),
);

const MIGRATION_0002: (&str, &str) = (
    "0002_audit_entries.sql",
    include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../../migrations/0002_audit_entries.sql"
    )),
);

fn migrations() -> Vec<(&'static str, &'static str)> {
    vec![MIGRATION_0001, MIGRATION_0002]
}

fn configure(conn: &Connection, busy_timeout_ms: u64) -> Result<(), AppError> {
    conn.busy_timeout(Duration::from_millis(busy_timeout_ms))
        .map_err(|e| {
            AppError::new("DB_CONFIGURE_FAILED", "Failed to set SQLite busy timeout")
                .with_details(e.to_string())
        })?;
    conn.execute_batch("PRAGMA foreign_keys = ON;").map_err(|e| {
        AppError::new("DB_CONFIGURE_FAILED", "Failed to enable foreign keys")
            .with_details(e.to_string())
    })
}

pub fn open(path: &Path) -> Result<Connection, AppError> {
    open_with_busy_timeout(path, DEFAULT_BUSY_TIMEOUT_MS)
}

/// Open a file-backed store. Concurrent writers wait up to `busy_timeout_ms` for the
/// write lock instead of failing immediately with `SQLITE_BUSY`.
pub fn open_with_busy_timeout(path: &Path, busy_timeout_ms: u64) -> Result<Connection, AppError> {
    let conn = Connection::open(path).map_err(|e| {
        AppError::new("DB_OPEN_FAILED", "Failed to open SQLite database")
            .with_details(e.to_string())
    })?;
    configure(&conn, busy_timeout_ms)?;
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection, AppError> {
    let conn = Connection::open_in_memory().map_err(|e| {
        AppError::new("DB_OPEN_FAILED", "Failed to open in-memory SQLite database")
            .with_details(e.to_string())
    })?;
    configure(&conn, DEFAULT_BUSY_TIMEOUT_MS)?;
    Ok(conn)
}

pub fn migrate(conn: &mut Connection) -> Result<(), AppError> {
    // Track migrations by name, applying each exactly once, in deterministic order.
    conn.execute_batch(
        r#"
      PRAGMA foreign_keys = ON;
      CREATE TABLE IF NOT EXISTS _migrations (
        name TEXT PRIMARY KEY NOT NULL,
        applied_at TEXT NOT NULL
      );
    "#,
    )
    .map_err(|e| {
        AppError::new(
            "DB_MIGRATIONS_TABLE_FAILED",
            "Failed to ensure migrations table exists",
        )
        .with_details(e.to_string())
    })?;

    let applied: HashSet<String> = {
        let mut stmt = conn.prepare("SELECT name FROM _migrations").map_err(|e| {
            AppError::new(
                "DB_MIGRATIONS_QUERY_FAILED",
                "Failed to query applied migrations",
            )
            .with_details(e.to_string())
        })?;

        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| {
                AppError::new(
                    "DB_MIGRATIONS_QUERY_FAILED",
                    "Failed to read applied migrations",
                )
                .with_details(e.to_string())
            })?;

        let mut set = HashSet::new();
        for r in rows {
            let name = r.map_err(|e| {
                AppError::new(
                    "DB_MIGRATIONS_QUERY_FAILED",
                    "Failed to read applied migration row",
                )
                .with_details(e.to_string())
            })?;
            set.insert(name);
        }
        set
    };

    for (name, sql) in migrations() {
        if applied.contains(name) {
            continue;
        }

        let tx = conn.transaction().map_err(|e| {
            AppError::new("DB_TX_FAILED", "Failed to start migration transaction")
                .with_details(e.to_string())
        })?;

        tx.execute_batch(sql).map_err(|e| {
            AppError::new("DB_MIGRATION_FAILED", format!("Migration {name} failed"))
                .with_details(e.to_string())
        })?;

        tx.execute(
            "INSERT INTO _migrations(name, applied_at) VALUES (?1, strftime('%Y-%m-%dT%H:%M:%fZ','now'))",
            [name],
        )
        .map_err(|e| {
            AppError::new("DB_MIGRATION_FAILED", format!("Failed to record migration {name}"))
                .with_details(e.to_string())
        })?;

        tx.commit().map_err(|e| {
            AppError::new("DB_TX_FAILED", "Failed to commit migration transaction")
                .with_details(e.to_string())
        })?;

        tracing::debug!(migration = name, "applied migration");
    }

    Ok(())
}

pub fn now_rfc3339_utc() -> Result<String, AppError> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(|e| {
            AppError::new("CLOCK_FORMAT_FAILED", "Failed to format time")
                .with_details(e.to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::OptionalExtension;

    #[test]
    fn migrations_create_expected_tables() {
        let mut conn = open_in_memory().expect("open");
        migrate(&mut conn).expect("migrate");

        for table in ["incidents", "guest_reporters", "teams", "staff", "audit_entries"] {
            let name: Option<String> = conn
                .query_row(
                    "SELECT name FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .optional()
                .unwrap();
            assert_eq!(name.as_deref(), Some(table));
        }
    }

    #[test]
    fn migrate_is_idempotent() {
        let mut conn = open_in_memory().expect("open");
        migrate(&mut conn).expect("first");
        migrate(&mut conn).expect("second");
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(n, 2);
    }

    #[test]
    fn storage_rejects_dual_assignment() {
        let mut conn = open_in_memory().expect("open");
        migrate(&mut conn).expect("migrate");
        conn.execute_batch(
            r#"
            INSERT INTO teams(id, name, created_at) VALUES (1, 'Fire', 'x');
            INSERT INTO staff(id, name, created_at) VALUES (1, 'Ana', 'x');
            "#,
        )
        .unwrap();
        let res = conn.execute(
            r#"
            INSERT INTO incidents(
              report_type, narrative, location_text, priority, reporter_safety,
              reporter_user_id, assigned_team_id, assigned_staff_id, reported_at, updated_at
            ) VALUES ('fire', 'n', 'Zone A', 'high', 'safe', 7, 1, 1, 'x', 'x')
            "#,
            [],
        );
        assert!(res.is_err(), "both assignment columns must not be set");
    }
}
