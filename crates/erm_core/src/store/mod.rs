use std::path::Path;

use rusqlite::Connection;

use crate::config::EngineConfig;
use crate::db::DEFAULT_BUSY_TIMEOUT_MS;
use crate::error::AppError;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct StoreMetadata {
    pub db_path: String,
    pub is_empty: bool,
}

fn validate_db_path(path: &Path) -> Result<(), AppError> {
    if path.as_os_str().is_empty() {
        return Err(AppError::new("STORE_INVALID_PATH", "Store DB path is empty"));
    }
    if path.exists() && path.is_dir() {
        return Err(AppError::new(
            "STORE_INVALID_PATH",
            "Store DB path must be a file (not a directory)",
        )
        .with_details(path.display().to_string()));
    }
    Ok(())
}

fn is_empty_conn(conn: &Connection) -> Result<bool, AppError> {
    let mut total = 0i64;
    for table in ["incidents", "teams", "staff"] {
        let n: i64 = conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .map_err(|e| {
                AppError::new(
                    "DB_QUERY_FAILED",
                    format!("Failed to count {table} for store emptiness check"),
                )
                .with_details(e.to_string())
            })?;
        total += n;
    }
    Ok(total == 0)
}

pub fn open_store_connection(db_path: &Path, busy_timeout_ms: u64) -> Result<Connection, AppError> {
    validate_db_path(db_path)?;

    if !db_path.is_file() {
        return Err(AppError::new("STORE_DB_NOT_FOUND", "Store database file not found")
            .with_details(db_path.display().to_string()));
    }

    let mut conn = crate::db::open_with_busy_timeout(db_path, busy_timeout_ms).map_err(|e| {
        let details = e.details.clone().unwrap_or_else(|| e.to_string());
        AppError::new("STORE_OPEN_FAILED", "Failed to open store database").with_details(details)
    })?;

    crate::db::migrate(&mut conn).map_err(|e| {
        let details = e.details.clone().unwrap_or_else(|| e.to_string());
        AppError::new("STORE_MIGRATION_FAILED", "Failed to migrate store database")
            .with_details(details)
    })?;

    Ok(conn)
}

pub fn create_store_connection(
    db_path: &Path,
    busy_timeout_ms: u64,
) -> Result<Connection, AppError> {
    validate_db_path(db_path)?;

    if db_path.exists() {
        return Err(AppError::new("STORE_CREATE_FAILED", "Store DB file already exists")
            .with_details(db_path.display().to_string()));
    }

    let parent = db_path.parent().ok_or_else(|| {
        AppError::new(
            "STORE_INVALID_PATH",
            "Store DB path must have a parent directory",
        )
        .with_details(db_path.display().to_string())
    })?;
    std::fs::create_dir_all(parent).map_err(|e| {
        AppError::new("STORE_CREATE_FAILED", "Failed to create store directory")
            .with_details(format!("path={}; err={}", parent.display(), e))
    })?;

    // Opening a non-existent SQLite path creates the file.
    let mut conn = crate::db::open_with_busy_timeout(db_path, busy_timeout_ms).map_err(|e| {
        let details = e.details.clone().unwrap_or_else(|| e.to_string());
        AppError::new("STORE_CREATE_FAILED", "Failed to create store database")
            .with_details(details)
    })?;

    crate::db::migrate(&mut conn).map_err(|e| {
        let details = e.details.clone().unwrap_or_else(|| e.to_string());
        AppError::new(
            "STORE_MIGRATION_FAILED",
            "Failed to migrate newly created store database",
        )
        .with_details(details)
    })?;

    tracing::info!(path = %db_path.display(), "created incident store");
    Ok(conn)
}

/// Open the configured store, creating it on first use.
pub fn connect(config: &EngineConfig) -> Result<Connection, AppError> {
    config.validate()?;
    if config.db_path.exists() {
        open_store_connection(&config.db_path, config.busy_timeout_ms)
    } else {
        create_store_connection(&config.db_path, config.busy_timeout_ms)
    }
}

pub fn open_store(db_path: &Path) -> Result<StoreMetadata, AppError> {
    let conn = open_store_connection(db_path, DEFAULT_BUSY_TIMEOUT_MS)?;
    let empty = is_empty_conn(&conn)?;
    Ok(StoreMetadata {
        db_path: db_path.to_string_lossy().to_string(),
        is_empty: empty,
    })
}

pub fn create_store(db_path: &Path) -> Result<StoreMetadata, AppError> {
    let conn = create_store_connection(db_path, DEFAULT_BUSY_TIMEOUT_MS)?;
    let empty = is_empty_conn(&conn)?;
    Ok(StoreMetadata {
        db_path: db_path.to_string_lossy().to_string(),
        is_empty: empty,
    })
}

pub fn store_is_empty(db_path: &Path) -> Result<bool, AppError> {
    let conn = open_store_connection(db_path, DEFAULT_BUSY_TIMEOUT_MS)?;
    is_empty_conn(&conn)
}
