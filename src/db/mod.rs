pub mod history;
pub mod sqlite;

pub use history::*;
pub use sqlite::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Database file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid stored value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("Database connection lock poisoned")]
    LockPoisoned,
}
