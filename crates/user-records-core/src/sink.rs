//! Seams to the relational sink and the leveled log collaborator.

use std::io;

use crate::UserRecord;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl LogLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "INFO" => Some(Self::Info),
            "WARNING" => Some(Self::Warning),
            "ERROR" => Some(Self::Error),
            _ => None,
        }
    }
}

/// Fire-and-forget append of leveled messages.
///
/// Implementations must not fail the caller; delivery problems are theirs to
/// report.
pub trait EventLog {
    fn append(&self, level: LogLevel, message: &str, additional_info: Option<&str>);

    fn info(&self, message: &str) {
        self.append(LogLevel::Info, message, None);
    }

    fn warning(&self, message: &str) {
        self.append(LogLevel::Warning, message, None);
    }

    fn error(&self, message: &str) {
        self.append(LogLevel::Error, message, None);
    }
}

/// Emit a log-collaborator event through `tracing` at the matching level.
pub fn trace_event(level: LogLevel, message: &str, additional_info: Option<&str>) {
    let extra = additional_info.unwrap_or_default();
    match level {
        LogLevel::Info => tracing::info!(extra, "{message}"),
        LogLevel::Warning => tracing::warn!(extra, "{message}"),
        LogLevel::Error => tracing::error!(extra, "{message}"),
    }
}

/// How a uniqueness conflict on insert is resolved.
pub enum ConflictPolicy<'a> {
    /// Overwrite the existing row without asking.
    AutoConfirm,
    /// Ask; the callback receives the conflicting id and answers whether to
    /// overwrite.
    Ask(&'a mut dyn FnMut(&str) -> io::Result<bool>),
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    SkippedByOperator,
    Failed(String),
}

impl UpsertOutcome {
    #[must_use]
    pub fn level(&self) -> LogLevel {
        match self {
            Self::Inserted | Self::Updated => LogLevel::Info,
            Self::SkippedByOperator => LogLevel::Warning,
            Self::Failed(_) => LogLevel::Error,
        }
    }
}

/// Insert-or-update target for one record at a time.
///
/// Each call is evaluated in isolation: no state or transaction spans two
/// calls.
pub trait RecordSink {
    fn upsert(&self, id: &str, record: &UserRecord, policy: ConflictPolicy<'_>) -> UpsertOutcome;
}
