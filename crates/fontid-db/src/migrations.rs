use rusqlite::Connection;
use tracing::debug;

use crate::StoreError;

pub fn run(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id             INTEGER PRIMARY KEY AUTOINCREMENT,
            username       TEXT UNIQUE NOT NULL,
            password_hash  TEXT NOT NULL,
            created_at     TEXT NOT NULL,
            plan           TEXT DEFAULT 'Free',
            expiry_date    TEXT
        );
        ",
    )?;

    debug!("users table present");
    Ok(())
}
