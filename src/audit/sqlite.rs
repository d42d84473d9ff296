//! Audit log — SQLite-based event and history storage.
//!
//! Keeps every security event and every credential history entry in a
//! local SQLite database at `<data_dir>/audit.db`.
//!
//! Opening is fallible but optional: callers that cannot open the
//! database fall back to the tracing sink and in-memory history.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{AuditSink, SecurityEvent, Severity};
use crate::errors::AuditError;
use crate::vault::credential::CredentialHistoryEntry;
use crate::vault::history::HistoryStore;

const DB_FILE: &str = "audit.db";

/// A single stored audit event.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub category: String,
    pub action: String,
    pub credential: String,
    pub severity: String,
    pub actor: Option<String>,
    pub description: String,
}

/// SQLite-backed audit log.
///
/// `rusqlite::Connection` is not `Sync`, so it lives behind a mutex; every
/// statement is short and none is held across an `.await`.
pub struct AuditLog {
    conn: Mutex<Connection>,
}

impl AuditLog {
    /// Open (or create) the audit database at `<data_dir>/audit.db`.
    pub fn open(data_dir: &Path) -> Result<Self, AuditError> {
        let db_path = Self::db_path(data_dir);
        let conn = Connection::open(&db_path)
            .map_err(|e| AuditError::Unavailable(format!("{}: {e}", db_path.display())))?;

        // Owner-only: the log names every credential.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            let _ = std::fs::set_permissions(&db_path, perms);
        }

        Self::init(conn)
    }

    /// An in-memory database, gone when dropped.
    pub fn in_memory() -> Result<Self, AuditError> {
        let conn = Connection::open_in_memory().map_err(|e| AuditError::Unavailable(e.to_string()))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, AuditError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS audit_log (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp   TEXT NOT NULL,
                category    TEXT NOT NULL,
                action      TEXT NOT NULL,
                credential  TEXT NOT NULL,
                severity    TEXT NOT NULL,
                actor       TEXT,
                description TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS credential_history (
                seq         INTEGER PRIMARY KEY AUTOINCREMENT,
                id          TEXT NOT NULL,
                credential  TEXT NOT NULL,
                action      TEXT NOT NULL,
                actor       TEXT,
                timestamp   TEXT NOT NULL,
                details     TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS credential_history_by_name
                ON credential_history (credential, seq);",
        )
        .map_err(|e| AuditError::Unavailable(format!("schema: {e}")))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Query recent audit entries.
    ///
    /// - `limit`: maximum number of entries to return (most recent first).
    /// - `since`: if provided, only return entries newer than this timestamp.
    pub fn query(
        &self,
        limit: usize,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<AuditEntry>, AuditError> {
        let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
        let (sql, params): (&str, Vec<Box<dyn rusqlite::types::ToSql>>) = match since {
            Some(ref ts) => (
                "SELECT id, timestamp, category, action, credential, severity, actor, description
                 FROM audit_log
                 WHERE timestamp >= ?1
                 ORDER BY id DESC
                 LIMIT ?2",
                vec![
                    Box::new(ts.to_rfc3339()) as Box<dyn rusqlite::types::ToSql>,
                    Box::new(limit_i64),
                ],
            ),
            None => (
                "SELECT id, timestamp, category, action, credential, severity, actor, description
                 FROM audit_log
                 ORDER BY id DESC
                 LIMIT ?1",
                vec![Box::new(limit_i64) as Box<dyn rusqlite::types::ToSql>],
            ),
        };

        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| AuditError::Unavailable(format!("query prepare: {e}")))?;

        let params_refs: Vec<&dyn rusqlite::types::ToSql> = params.iter().map(|p| &**p).collect();

        let rows = stmt
            .query_map(params_refs.as_slice(), |row| {
                let ts_str: String = row.get(1)?;
                Ok(AuditEntry {
                    id: row.get(0)?,
                    timestamp: parse_time(&ts_str),
                    category: row.get(2)?,
                    action: row.get(3)?,
                    credential: row.get(4)?,
                    severity: row.get(5)?,
                    actor: row.get(6)?,
                    description: row.get(7)?,
                })
            })
            .map_err(|e| AuditError::Unavailable(format!("query exec: {e}")))?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row.map_err(|e| AuditError::Unavailable(format!("row parse: {e}")))?);
        }

        Ok(entries)
    }

    /// Return the path to the audit database (for testing/display).
    pub fn db_path(data_dir: &Path) -> PathBuf {
        data_dir.join(DB_FILE)
    }
}

impl AuditSink for AuditLog {
    fn log_security_event(&self, event: &SecurityEvent) -> Result<(), AuditError> {
        self.conn
            .lock()
            .execute(
                "INSERT INTO audit_log
                    (timestamp, category, action, credential, severity, actor, description)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    event.timestamp.to_rfc3339(),
                    event.category,
                    event.action,
                    event.credential,
                    event.severity.as_str(),
                    event.actor,
                    event.description,
                ],
            )
            .map_err(|e| AuditError::Write(e.to_string()))?;
        Ok(())
    }
}

impl HistoryStore for AuditLog {
    fn append(&self, entry: &CredentialHistoryEntry) -> Result<(), AuditError> {
        let details =
            serde_json::to_string(&entry.details).map_err(|e| AuditError::Write(e.to_string()))?;
        self.conn
            .lock()
            .execute(
                "INSERT INTO credential_history (id, credential, action, actor, timestamp, details)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    entry.id.to_string(),
                    entry.credential,
                    entry.action,
                    entry.actor,
                    entry.timestamp.to_rfc3339(),
                    details,
                ],
            )
            .map_err(|e| AuditError::Write(e.to_string()))?;
        Ok(())
    }

    fn list(&self, credential: &str) -> Result<Vec<CredentialHistoryEntry>, AuditError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, credential, action, actor, timestamp, details
                 FROM credential_history
                 WHERE credential = ?1
                 ORDER BY seq ASC",
            )
            .map_err(|e| AuditError::Unavailable(format!("history prepare: {e}")))?;

        let rows = stmt
            .query_map(params![credential], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })
            .map_err(|e| AuditError::Unavailable(format!("history exec: {e}")))?;

        let mut entries = Vec::new();
        for row in rows {
            let (id, credential, action, actor, timestamp, details) =
                row.map_err(|e| AuditError::Unavailable(format!("row parse: {e}")))?;
            entries.push(CredentialHistoryEntry {
                id: Uuid::parse_str(&id)
                    .map_err(|e| AuditError::Unavailable(format!("history id '{id}': {e}")))?,
                credential,
                action,
                actor,
                timestamp: parse_time(&timestamp),
                details: serde_json::from_str(&details)
                    .map_err(|e| AuditError::Unavailable(format!("history details: {e}")))?,
            });
        }
        Ok(entries)
    }
}

fn parse_time(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}

impl Severity {
    /// Parse the stored severity text; unknown values read as `Info`.
    pub fn from_stored(raw: &str) -> Self {
        match raw {
            "warning" => Severity::Warning,
            "error" => Severity::Error,
            _ => Severity::Info,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{CATEGORY_ACCESS, CATEGORY_OPERATION};
    use tempfile::TempDir;

    fn event(action: &str, credential: &str) -> SecurityEvent {
        SecurityEvent::new(
            CATEGORY_OPERATION,
            credential,
            action,
            Severity::Warning,
            Some("ops"),
            None,
        )
    }

    #[test]
    fn open_creates_database() {
        let dir = TempDir::new().unwrap();
        AuditLog::open(dir.path()).unwrap();
        assert!(dir.path().join("audit.db").exists());
    }

    #[test]
    fn log_and_query_roundtrip() {
        let dir = TempDir::new().unwrap();
        let audit = AuditLog::open(dir.path()).unwrap();

        audit.log_security_event(&event("create_success", "db")).unwrap();
        audit.log_security_event(&event("create_success", "api")).unwrap();
        audit.log_security_event(&event("delete_success", "old")).unwrap();

        let entries = audit.query(10, None).unwrap();
        assert_eq!(entries.len(), 3);

        // Most recent first.
        assert_eq!(entries[0].action, "delete_success");
        assert_eq!(entries[0].credential, "old");
        assert_eq!(entries[0].actor.as_deref(), Some("ops"));
        assert_eq!(Severity::from_stored(&entries[0].severity), Severity::Warning);
        assert_eq!(entries[2].credential, "db");
    }

    #[test]
    fn query_with_limit() {
        let audit = AuditLog::in_memory().unwrap();
        for i in 0..10 {
            audit
                .log_security_event(&event("create_success", &format!("key-{i}")))
                .unwrap();
        }

        let entries = audit.query(3, None).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].credential, "key-9");
    }

    #[test]
    fn query_with_since_filters_old_entries() {
        let audit = AuditLog::in_memory().unwrap();
        audit.log_security_event(&event("create_success", "db")).unwrap();

        let future = Utc::now() + chrono::Duration::hours(1);
        assert!(audit.query(10, Some(future)).unwrap().is_empty());

        let past = Utc::now() - chrono::Duration::hours(1);
        assert_eq!(audit.query(10, Some(past)).unwrap().len(), 1);
    }

    #[test]
    fn access_events_are_stored_with_their_category() {
        let audit = AuditLog::in_memory().unwrap();
        let read = SecurityEvent::new(CATEGORY_ACCESS, "db", "cache_hit", Severity::Info, None, None);
        audit.log_security_event(&read).unwrap();

        let entries = audit.query(1, None).unwrap();
        assert_eq!(entries[0].category, CATEGORY_ACCESS);
        assert_eq!(entries[0].severity, "info");
        assert!(entries[0].actor.is_none());
    }

    #[test]
    fn history_survives_reopen_in_order() {
        let dir = TempDir::new().unwrap();
        {
            let log = AuditLog::open(dir.path()).unwrap();
            log.append(&CredentialHistoryEntry::new("db", "create", Some("ops")))
                .unwrap();
            log.append(
                &CredentialHistoryEntry::new("db", "rotate", None)
                    .with_detail("rotation_reason", "manual"),
            )
            .unwrap();
            log.append(&CredentialHistoryEntry::new("other", "create", None))
                .unwrap();
        }

        let log = AuditLog::open(dir.path()).unwrap();
        let entries = log.list("db").unwrap();
        let actions: Vec<&str> = entries.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(actions, ["create", "rotate"]);
        assert_eq!(entries[0].actor.as_deref(), Some("ops"));
        assert_eq!(entries[1].details["rotation_reason"], "manual");
        assert!(log.list("missing").unwrap().is_empty());
    }
}
