//! Per-user history of finished sessions, backed by SQLite.
//!
//! Records are append-only; the core never updates or deletes. Writes are
//! fire-and-forget from the session's point of view: a failed insert is
//! surfaced as a notice and the next passage loads regardless.

use chrono::{DateTime, Local, TimeZone, Utc};
use directories::ProjectDirs;
use rusqlite::{params, Connection, Result};
use std::error::Error;
use std::io::Write;
use std::path::{Path, PathBuf};

/// One immutable completed-session result tied to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatRecord {
    pub user: String,
    pub wpm: u16,
    pub accuracy: u16,
    pub timestamp_ms: i64,
}

impl StatRecord {
    pub fn now(user: impl Into<String>, wpm: u16, accuracy: u16) -> Self {
        Self {
            user: user.into(),
            wpm,
            accuracy,
            timestamp_ms: Utc::now().timestamp_millis(),
        }
    }

    pub fn local_time(&self) -> Option<DateTime<Local>> {
        Local.timestamp_millis_opt(self.timestamp_ms).single()
    }
}

/// Database manager for session history.
#[derive(Debug)]
pub struct HistoryDb {
    conn: Connection,
}

impl HistoryDb {
    /// Open (and initialize) the history database at the platform state dir.
    pub fn open_default() -> Result<Self> {
        let db_path = Self::default_db_path().unwrap_or_else(|| PathBuf::from("keyflow.db"));
        Self::open(&db_path)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CANTOPEN),
                    Some(format!("Failed to create directory: {}", e)),
                )
            })?;
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS stats (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user TEXT NOT NULL,
                wpm INTEGER NOT NULL,
                accuracy INTEGER NOT NULL,
                timestamp INTEGER NOT NULL
            )
            "#,
            [],
        )?;

        // Secondary lookup keys for ordered recent-history queries
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_stats_user ON stats(user)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_stats_timestamp ON stats(timestamp)",
            [],
        )?;

        Ok(HistoryDb { conn })
    }

    /// The database file path under $HOME/.local/state/keyflow
    pub fn default_db_path() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            let state_dir = PathBuf::from(home)
                .join(".local")
                .join("state")
                .join("keyflow");
            Some(state_dir.join("history.db"))
        } else if let Some(proj_dirs) = ProjectDirs::from("", "", "keyflow") {
            Some(proj_dirs.data_local_dir().join("history.db"))
        } else {
            None
        }
    }

    /// Append one finished-session record.
    pub fn append(&self, record: &StatRecord) -> Result<()> {
        self.conn.execute(
            "INSERT INTO stats (user, wpm, accuracy, timestamp) VALUES (?1, ?2, ?3, ?4)",
            params![
                record.user,
                record.wpm,
                record.accuracy,
                record.timestamp_ms
            ],
        )?;
        Ok(())
    }

    /// At most `limit` records for `user`, strictly descending by timestamp.
    pub fn recent_for_user(&self, user: &str, limit: usize) -> Result<Vec<StatRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT user, wpm, accuracy, timestamp
            FROM stats
            WHERE user = ?1
            ORDER BY timestamp DESC
            LIMIT ?2
            "#,
        )?;

        let rows = stmt.query_map(params![user, limit as i64], |row| {
            Ok(StatRecord {
                user: row.get(0)?,
                wpm: row.get(1)?,
                accuracy: row.get(2)?,
                timestamp_ms: row.get(3)?,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Dump a user's full history as CSV, oldest first.
    pub fn export_csv<W: Write>(&self, user: &str, writer: W) -> Result<(), Box<dyn Error>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT user, wpm, accuracy, timestamp
            FROM stats
            WHERE user = ?1
            ORDER BY timestamp ASC
            "#,
        )?;

        let rows = stmt.query_map(params![user], |row| {
            Ok(StatRecord {
                user: row.get(0)?,
                wpm: row.get(1)?,
                accuracy: row.get(2)?,
                timestamp_ms: row.get(3)?,
            })
        })?;

        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(["date", "wpm", "accuracy"])?;
        for row in rows {
            let record = row?;
            let date = record
                .local_time()
                .map(|t| t.format("%c").to_string())
                .unwrap_or_default();
            csv_writer.write_record([
                date,
                record.wpm.to_string(),
                record.accuracy.to_string(),
            ])?;
        }
        csv_writer.flush()?;
        Ok(())
    }
}
