pub mod error;
pub mod migrations;
pub mod models;
pub mod queries;

pub use error::StoreError;
pub use models::UserRow;

use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tracing::info;

/// Username/password store backed by a single SQLite file.
///
/// No connection is held between calls: each operation opens its own and
/// drops it before returning, leaving write serialization to SQLite's locking.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the database file and users table if they are missing.
    pub fn initialize(&self) -> Result<(), StoreError> {
        self.with_conn(migrations::run)?;
        info!("Credential store ready at {}", self.path.display());
        Ok(())
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let conn = Connection::open(&self.path)?;
        f(&conn)
    }
}
