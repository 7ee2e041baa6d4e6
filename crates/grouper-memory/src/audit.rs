//! Audit log of every event the router handles.

use grouper_core::error::GrouperError;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

/// An entry to write to the audit log.
pub struct AuditEntry {
    pub conversation_id: String,
    pub sender_id: String,
    pub sender_name: Option<String>,
    /// "text", "action", "decline"...
    pub kind: String,
    pub input_text: String,
    pub output_text: Option<String>,
    pub status: AuditStatus,
    pub reason: Option<String>,
}

/// Status of an audited interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditStatus {
    Ok,
    Error,
    Denied,
}

impl AuditStatus {
    pub const ALL: [AuditStatus; 3] = [Self::Ok, Self::Error, Self::Denied];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
            Self::Denied => "denied",
        }
    }
}

/// Audit logger backed by SQLite.
#[derive(Clone)]
pub struct AuditLogger {
    pool: SqlitePool,
}

impl AuditLogger {
    /// Create a new audit logger sharing the given pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Write an entry to the audit log.
    pub async fn log(&self, entry: &AuditEntry) -> Result<(), GrouperError> {
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            "INSERT INTO audit_log \
             (id, conversation_id, sender_id, sender_name, kind, input_text, output_text, \
              status, reason) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&entry.conversation_id)
        .bind(&entry.sender_id)
        .bind(&entry.sender_name)
        .bind(&entry.kind)
        .bind(&entry.input_text)
        .bind(&entry.output_text)
        .bind(entry.status.as_str())
        .bind(&entry.reason)
        .execute(&self.pool)
        .await
        .map_err(|e| GrouperError::Memory(format!("audit log write failed: {e}")))?;

        debug!(
            "audit: {} {} [{}] {}",
            entry.conversation_id,
            entry.sender_id,
            entry.status.as_str(),
            truncate(&entry.input_text, 80)
        );

        Ok(())
    }

    /// Number of rows with the given status.
    pub async fn count(&self, status: AuditStatus) -> Result<i64, GrouperError> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM audit_log WHERE status = ?")
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| GrouperError::Memory(format!("audit count failed: {e}")))?;
        Ok(n)
    }
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
