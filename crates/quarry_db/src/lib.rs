//! Durable scan-record store for the Quarry agent.
//!
//! One table, keyed by artifact id, with get-or-create/update
//! semantics that are atomic per record at the SQLite layer. The
//! orchestration core relies on that atomicity instead of taking its
//! own locks; two concurrent agent processes are kept out by the
//! instance lock in the binary, not here.
//!
//! # Usage
//!
//! ```rust,ignore
//! use quarry_db::ScanDb;
//!
//! let db = ScanDb::open("~/.quarry/records.sqlite3").await?;
//! let record = db.get_record(&id).await?;
//! ```

mod error;
mod records;
mod schema;
mod types;

pub use error::{DbError, Result};
pub use types::ScanRecord;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::path::Path;
use tracing::info;

/// Handle to the scan-record store.
#[derive(Clone)]
pub struct ScanDb {
    pool: SqlitePool,
}

impl ScanDb {
    /// Open or create a record store at the given path.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let url = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let db = Self { pool };
        db.ensure_schema().await?;

        info!(path = %path.display(), "Record store opened");
        Ok(db)
    }

    /// In-memory store for tests.
    pub async fn open_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let db = Self { pool };
        db.ensure_schema().await?;
        Ok(db)
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
