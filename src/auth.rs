//! Minimal login/registration gate over a local credential table.
//!
//! The session engine only ever sees the resulting [`Identity`] (or its
//! absence, when running with auth disabled); it never inspects credential
//! storage. Passwords are stored as-is: hardening the credential store is an
//! explicit non-goal.

use rusqlite::{params, Connection, OptionalExtension};
use std::error::Error;
use std::fmt;
use std::path::Path;

/// The logged-in user as seen by the rest of the app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
}

#[derive(Debug)]
pub enum RegisterError {
    AlreadyExists,
    MissingField,
    Storage(rusqlite::Error),
}

impl fmt::Display for RegisterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisterError::AlreadyExists => write!(f, "Username already exists."),
            RegisterError::MissingField => write!(f, "Please fill in both fields."),
            RegisterError::Storage(e) => write!(f, "account storage failed: {}", e),
        }
    }
}

impl Error for RegisterError {}

impl From<rusqlite::Error> for RegisterError {
    fn from(e: rusqlite::Error) -> Self {
        RegisterError::Storage(e)
    }
}

#[derive(Debug)]
pub enum LoginError {
    InvalidCredentials,
    MissingField,
    Storage(rusqlite::Error),
}

impl fmt::Display for LoginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoginError::InvalidCredentials => write!(f, "Invalid credentials."),
            LoginError::MissingField => write!(f, "Please enter username and password."),
            LoginError::Storage(e) => write!(f, "account storage failed: {}", e),
        }
    }
}

impl Error for LoginError {}

impl From<rusqlite::Error> for LoginError {
    fn from(e: rusqlite::Error) -> Self {
        LoginError::Storage(e)
    }
}

/// Validates or creates user identities. Swappable so the trainer also runs
/// with no accounts at all (`Option<Box<dyn AuthGate>>` at the app level).
pub trait AuthGate {
    fn register(&self, username: &str, password: &str) -> Result<(), RegisterError>;
    fn login(&self, username: &str, password: &str) -> Result<Identity, LoginError>;
}

/// SQLite-backed credential table.
#[derive(Debug)]
pub struct CredentialStore {
    conn: Connection,
}

impl CredentialStore {
    pub fn open<P: AsRef<Path>>(path: P) -> rusqlite::Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CANTOPEN),
                    Some(format!("Failed to create directory: {}", e)),
                )
            })?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> rusqlite::Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> rusqlite::Result<Self> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                username TEXT PRIMARY KEY,
                password TEXT NOT NULL
            )
            "#,
            [],
        )?;
        Ok(Self { conn })
    }

    /// Whether an account exists, without checking a password. Used to
    /// validate a remembered login against the current table.
    pub fn user_exists(&self, username: &str) -> rusqlite::Result<bool> {
        Ok(self.lookup_password(username.trim())?.is_some())
    }

    fn lookup_password(&self, username: &str) -> rusqlite::Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT password FROM users WHERE username = ?1",
                params![username],
                |row| row.get(0),
            )
            .optional()
    }
}

impl AuthGate for CredentialStore {
    fn register(&self, username: &str, password: &str) -> Result<(), RegisterError> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(RegisterError::MissingField);
        }
        if self.lookup_password(username)?.is_some() {
            return Err(RegisterError::AlreadyExists);
        }
        self.conn.execute(
            "INSERT INTO users (username, password) VALUES (?1, ?2)",
            params![username, password],
        )?;
        Ok(())
    }

    fn login(&self, username: &str, password: &str) -> Result<Identity, LoginError> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(LoginError::MissingField);
        }
        match self.lookup_password(username)? {
            Some(stored) if stored == password => Ok(Identity {
                username: username.to_string(),
            }),
            _ => Err(LoginError::InvalidCredentials),
        }
    }
}
