use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use time::OffsetDateTime;
use user_records_core::sink::trace_event;
use user_records_core::{ConflictPolicy, EventLog, LogLevel, RecordSink, UpsertOutcome, UserRecord};

const CREATE_SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS Users (
  user_id TEXT PRIMARY KEY,
  first_name TEXT NOT NULL,
  last_name TEXT NOT NULL,
  age INTEGER NOT NULL,
  gender TEXT NOT NULL,
  year_of_birth INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS LogEntries (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  LogLevel TEXT NOT NULL CHECK (LogLevel IN ('INFO','WARNING','ERROR')),
  Message TEXT NOT NULL,
  AdditionalInfo TEXT,
  LoggedAt TEXT NOT NULL
);
";

const INSERT_USER_SQL: &str = r"
INSERT INTO Users (user_id, first_name, last_name, age, gender, year_of_birth)
VALUES (?1, ?2, ?3, ?4, ?5, ?6)
";

const UPDATE_USER_SQL: &str = r"
UPDATE Users
SET first_name = ?1, last_name = ?2, age = ?3, gender = ?4, year_of_birth = ?5
WHERE user_id = ?6
";

const INSERT_LOG_SQL: &str = r"
INSERT INTO LogEntries (LogLevel, Message, AdditionalInfo, LoggedAt)
VALUES (?1, ?2, ?3, ?4)
";

/// One row of the append-only log table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    pub additional_info: Option<String>,
}

/// Relational mirror of the record store, backed by one `SQLite` database.
///
/// Holds only the database location: every operation opens its own
/// connection and releases it before returning.
#[derive(Debug, Clone)]
pub struct SqliteSink {
    db_path: PathBuf,
}

enum InsertError {
    Conflict,
    Other(anyhow::Error),
}

impl SqliteSink {
    #[must_use]
    pub fn new(db_path: PathBuf) -> Self {
        Self { db_path }
    }

    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path).with_context(|| {
            format!("failed to open sqlite database at {}", self.db_path.display())
        })?;
        conn.execute_batch("PRAGMA busy_timeout = 5000;")
            .context("failed to configure sqlite pragmas")?;
        Ok(conn)
    }

    /// Create the `Users` and `LogEntries` tables when they do not exist yet.
    ///
    /// # Errors
    /// Returns an error when the database cannot be opened or the DDL fails.
    pub fn ensure_schema(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute_batch(CREATE_SCHEMA_SQL).context("failed to create sink tables")?;
        Ok(())
    }

    /// Read back the mirrored row for `user_id`.
    ///
    /// # Errors
    /// Returns an error when the database cannot be opened or queried.
    pub fn fetch(&self, user_id: &str) -> Result<Option<UserRecord>> {
        let conn = self.connect()?;
        conn.query_row(
            "SELECT first_name, last_name, CAST(age AS TEXT), gender, CAST(year_of_birth AS TEXT)
             FROM Users WHERE user_id = ?1",
            params![user_id],
            |row| {
                Ok(UserRecord {
                    first_name: row.get(0)?,
                    last_name: row.get(1)?,
                    age: row.get(2)?,
                    gender: row.get(3)?,
                    year_of_birth: row.get(4)?,
                })
            },
        )
        .optional()
        .with_context(|| format!("failed to read user {user_id}"))
    }

    /// All log rows in insertion order.
    ///
    /// # Errors
    /// Returns an error when rows cannot be read or carry an unknown level.
    pub fn log_entries(&self) -> Result<Vec<LogEntry>> {
        let conn = self.connect()?;
        let mut stmt = conn
            .prepare("SELECT LogLevel, Message, AdditionalInfo FROM LogEntries ORDER BY id ASC")?;
        let mut rows = stmt.query([])?;
        let mut entries = Vec::new();

        while let Some(row) = rows.next()? {
            let level_raw: String = row.get(0)?;
            entries.push(LogEntry {
                level: LogLevel::parse(&level_raw)
                    .with_context(|| format!("unknown log level: {level_raw}"))?,
                message: row.get(1)?,
                additional_info: row.get(2)?,
            });
        }

        Ok(entries)
    }

    fn try_insert(conn: &mut Connection, user_id: &str, record: &UserRecord) -> Result<(), InsertError> {
        let tx = conn
            .transaction()
            .context("failed to start transaction")
            .map_err(InsertError::Other)?;
        match tx.execute(
            INSERT_USER_SQL,
            params![
                user_id,
                record.first_name,
                record.last_name,
                record.age,
                record.gender,
                record.year_of_birth
            ],
        ) {
            Ok(_) => {}
            Err(err) if is_key_conflict(&err) => return Err(InsertError::Conflict),
            Err(err) => {
                return Err(InsertError::Other(
                    anyhow::Error::new(err).context("failed to insert user"),
                ))
            }
        }
        tx.commit().context("failed to commit insert").map_err(InsertError::Other)
    }

    fn update(conn: &mut Connection, user_id: &str, record: &UserRecord) -> Result<()> {
        let tx = conn.transaction().context("failed to start transaction")?;
        let changed = tx
            .execute(
                UPDATE_USER_SQL,
                params![
                    record.first_name,
                    record.last_name,
                    record.age,
                    record.gender,
                    record.year_of_birth,
                    user_id
                ],
            )
            .context("failed to update user")?;
        if changed == 0 {
            anyhow::bail!("no row for user {user_id} to update");
        }
        tx.commit().context("failed to commit update")?;
        Ok(())
    }

    fn run_upsert(
        &self,
        user_id: &str,
        record: &UserRecord,
        policy: ConflictPolicy<'_>,
    ) -> Result<UpsertOutcome> {
        let mut conn = self.connect()?;
        match Self::try_insert(&mut conn, user_id, record) {
            Ok(()) => return Ok(UpsertOutcome::Inserted),
            Err(InsertError::Other(err)) => return Err(err),
            Err(InsertError::Conflict) => {
                self.append(LogLevel::Warning, &format!("Record for {user_id} already exists."), None);
            }
        }

        let confirmed = match policy {
            ConflictPolicy::AutoConfirm => true,
            ConflictPolicy::Ask(ask) => {
                ask(user_id).context("failed to read overwrite confirmation")?
            }
        };
        if !confirmed {
            return Ok(UpsertOutcome::SkippedByOperator);
        }

        Self::update(&mut conn, user_id, record)?;
        Ok(UpsertOutcome::Updated)
    }

    fn try_append(&self, level: LogLevel, message: &str, additional_info: Option<&str>) -> Result<()> {
        let mut conn = self.connect()?;
        let tx = conn.transaction().context("failed to start transaction")?;
        tx.execute(INSERT_LOG_SQL, params![level.as_str(), message, additional_info, now_rfc3339()?])
            .context("failed to insert log entry")?;
        tx.commit().context("failed to commit log entry")?;
        Ok(())
    }
}

impl RecordSink for SqliteSink {
    fn upsert(&self, id: &str, record: &UserRecord, policy: ConflictPolicy<'_>) -> UpsertOutcome {
        let outcome = self
            .run_upsert(id, record, policy)
            .unwrap_or_else(|err| UpsertOutcome::Failed(format!("{err:#}")));
        let (message, additional_info) = match &outcome {
            UpsertOutcome::Inserted => (format!("Record for {id} inserted successfully."), None),
            UpsertOutcome::Updated => (format!("Record for {id} updated successfully."), None),
            UpsertOutcome::SkippedByOperator => (format!("Record for {id} was not updated."), None),
            UpsertOutcome::Failed(reason) => (format!("SQL Error: {reason}"), Some(id)),
        };
        self.append(outcome.level(), &message, additional_info);
        outcome
    }
}

impl EventLog for SqliteSink {
    fn append(&self, level: LogLevel, message: &str, additional_info: Option<&str>) {
        trace_event(level, message, additional_info);
        if let Err(err) = self.try_append(level, message, additional_info) {
            tracing::warn!(error = %format!("{err:#}"), "failed to write log entry to sqlite");
        }
    }
}

fn is_key_conflict(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(failure, _) => {
            failure.code == ErrorCode::ConstraintViolation
                && matches!(
                    failure.extended_code,
                    rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                        | rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                )
        }
        _ => false,
    }
}

fn now_rfc3339() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .context("failed to format RFC3339 timestamp")
}
