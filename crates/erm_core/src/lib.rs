//! Incident lifecycle and assignment engine.
//!
//! Intake, validation, responder assignment and status transitions over a SQLite record
//! store. See [`lifecycle::LifecycleCoordinator`] for the entry point.

pub mod audit;
pub mod config;
pub mod db;
pub mod demo;
pub mod domain;
pub mod error;
pub mod ingest;
pub mod intake;
pub mod lifecycle;
pub mod notify;
pub mod repo;
pub mod roster;
pub mod store;

#[cfg(test)]
mod tests {
    use super::error::AppError;

    #[test]
    fn app_error_is_structured() {
        let err = AppError::new("DB_TEST", "db failed")
            .with_fields(["priority"])
            .with_retryable(false);
        assert_eq!(err.code, "DB_TEST");
        assert_eq!(err.message, "db failed");
        assert_eq!(err.fields, vec!["priority".to_string()]);
        assert_eq!(err.retryable, false);
        assert_eq!(err.to_string(), "[DB_TEST] db failed (priority)");
    }
}
