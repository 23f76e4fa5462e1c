use chrono::{Duration, SecondsFormat, Utc};
use rusqlite::{Connection, ErrorCode, OptionalExtension};
use tracing::{info, warn};

use crate::models::UserRow;
use crate::{CredentialStore, StoreError};

/// Days a plan stays marked active after a payment. Informational only.
pub const PLAN_PERIOD_DAYS: i64 = 30;

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl CredentialStore {
    // -- Users --

    /// Insert a new user with a freshly salted hash and the default plan.
    ///
    /// Duplicates surface from the UNIQUE constraint at insert time; there is
    /// no lookup beforehand.
    pub fn create_user(&self, username: &str, password: &str) -> Result<(), StoreError> {
        if username.is_empty() || password.is_empty() {
            return Err(StoreError::Validation(
                "Username and password are required.".into(),
            ));
        }

        let password_hash = fontid_crypto::hash_password(password);

        self.with_conn(|conn| {
            match conn.execute(
                "INSERT INTO users (username, password_hash, created_at) VALUES (?1, ?2, ?3)",
                (username, &password_hash, now_iso()),
            ) {
                Ok(_) => {
                    info!("Created user {}", username);
                    Ok(())
                }
                Err(e) if e.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) => {
                    Err(StoreError::DuplicateUser(username.to_string()))
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Check a username/password pair. Every failure, including storage
    /// errors, reads as `false`.
    pub fn authenticate(&self, username: &str, password: &str) -> bool {
        let stored = self.with_conn(|conn| query_password_hash(conn, username));

        match stored {
            Ok(Some(hash)) => fontid_crypto::verify_password(password, &hash),
            Ok(None) => false,
            Err(e) => {
                warn!("Authentication lookup failed: {}", e);
                false
            }
        }
    }

    /// Overwrite the user's plan and push the expiry 30 days out.
    /// The plan name is stored as given.
    pub fn update_plan(&self, username: &str, plan: &str) -> Result<(), StoreError> {
        let expiry = (Utc::now() + Duration::days(PLAN_PERIOD_DAYS))
            .to_rfc3339_opts(SecondsFormat::Micros, true);

        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE users SET plan = ?1, expiry_date = ?2 WHERE username = ?3",
                (plan, &expiry, username),
            )?;
            if updated == 0 {
                warn!("Plan update for unknown user {}", username);
            } else {
                info!("User {} moved to plan {}", username, plan);
            }
            Ok(())
        })
    }

    pub fn get_user(&self, username: &str) -> Result<Option<UserRow>, StoreError> {
        self.with_conn(|conn| query_user_by_username(conn, username))
    }

    pub fn count_users(&self, username: &str) -> Result<i64, StoreError> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM users WHERE username = ?1",
                [username],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }
}

fn query_password_hash(conn: &Connection, username: &str) -> Result<Option<String>, StoreError> {
    let hash = conn
        .query_row(
            "SELECT password_hash FROM users WHERE username = ?1",
            [username],
            |row| row.get(0),
        )
        .optional()?;

    Ok(hash)
}

fn query_user_by_username(conn: &Connection, username: &str) -> Result<Option<UserRow>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, username, password_hash, created_at, plan, expiry_date FROM users WHERE username = ?1",
    )?;

    let row = stmt
        .query_row([username], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                password_hash: row.get(2)?,
                created_at: row.get(3)?,
                plan: row.get(4)?,
                expiry_date: row.get(5)?,
            })
        })
        .optional()?;

    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, CredentialStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("users.db"));
        store.initialize().unwrap();
        (dir, store)
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let (_dir, store) = store();
        store.initialize().unwrap();
        store.initialize().unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn test_create_then_authenticate() {
        let (_dir, store) = store();
        for (user, pass) in [("alice", "pw"), ("bob", "ünïcødé pass"), ("c", "$$$")] {
            store.create_user(user, pass).unwrap();
            assert!(store.authenticate(user, pass));
        }
    }

    #[test]
    fn test_authenticate_failures() {
        let (_dir, store) = store();
        store.create_user("alice", "correct").unwrap();

        assert!(!store.authenticate("alice", "wrong"));
        assert!(!store.authenticate("nobody", "correct"));
    }

    #[test]
    fn test_authenticate_corrupted_hash() {
        let (_dir, store) = store();
        store.create_user("alice", "pw").unwrap();
        store
            .with_conn(|conn| {
                conn.execute(
                    "UPDATE users SET password_hash = 'garbage' WHERE username = 'alice'",
                    [],
                )?;
                Ok(())
            })
            .unwrap();

        assert!(!store.authenticate("alice", "pw"));
    }

    #[test]
    fn test_duplicate_user() {
        let (_dir, store) = store();
        store.create_user("alice", "first").unwrap();

        let err = store.create_user("alice", "second").unwrap_err();
        assert!(err.is_duplicate());
        assert_eq!(store.count_users("alice").unwrap(), 1);
        // original password still wins
        assert!(store.authenticate("alice", "first"));
        assert!(!store.authenticate("alice", "second"));
    }

    #[test]
    fn test_validation() {
        let (_dir, store) = store();
        assert!(matches!(
            store.create_user("", "pw"),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            store.create_user("alice", ""),
            Err(StoreError::Validation(_))
        ));
        assert_eq!(store.count_users("alice").unwrap(), 0);
    }

    #[test]
    fn test_new_user_defaults() {
        let (_dir, store) = store();
        store.create_user("alice", "pw").unwrap();

        let row = store.get_user("alice").unwrap().unwrap();
        assert_eq!(row.plan.as_deref(), Some("Free"));
        assert!(row.expiry_date.is_none());
        assert!(row.password_hash.contains('$'));
        assert_ne!(row.password_hash, "pw");
        assert!(chrono::DateTime::parse_from_rfc3339(&row.created_at).is_ok());
    }

    #[test]
    fn test_update_plan_sets_expiry() {
        let (_dir, store) = store();
        store.create_user("alice", "pw").unwrap();
        store.update_plan("alice", "Premium").unwrap();

        let row = store.get_user("alice").unwrap().unwrap();
        assert_eq!(row.plan.as_deref(), Some("Premium"));

        let expiry = chrono::DateTime::parse_from_rfc3339(row.expiry_date.as_deref().unwrap())
            .unwrap()
            .with_timezone(&Utc);
        let days = (expiry - Utc::now()).num_days();
        assert!((29..=30).contains(&days));
    }

    #[test]
    fn test_update_plan_accepts_any_name() {
        let (_dir, store) = store();
        store.create_user("alice", "pw").unwrap();
        store.update_plan("alice", "Platinum").unwrap();
        assert_eq!(
            store.get_user("alice").unwrap().unwrap().plan.as_deref(),
            Some("Platinum")
        );
    }

    #[test]
    fn test_unwritable_location() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("missing").join("users.db"));
        assert!(matches!(store.initialize(), Err(StoreError::Storage(_))));
        assert!(!store.authenticate("alice", "pw"));
        assert!(matches!(
            store.create_user("alice", "pw"),
            Err(StoreError::Storage(_))
        ));
    }
}
