//! SQLite storage for the audit trail.
//!
//! The database sits beside the credential file it describes
//! (`auth.vault` -> `auth.audit.db`), so two stores in one directory
//! keep separate trails.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use super::{Action, Event};
use crate::errors::{CredVaultError, Result};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS credential_changes (
        seq         INTEGER PRIMARY KEY,
        at_ms       INTEGER NOT NULL,
        action      TEXT    NOT NULL,
        subject     TEXT,
        users_after INTEGER NOT NULL,
        note        TEXT
    );
    CREATE INDEX IF NOT EXISTS credential_changes_subject
        ON credential_changes (subject);
";

/// A row read back from the trail.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub seq: i64,
    pub at: DateTime<Utc>,
    /// `None` for action names this build does not know.
    pub action: Option<Action>,
    pub subject: Option<String>,
    pub users_after: usize,
    pub note: Option<String>,
}

/// Which rows [`AuditTrail::recent`] returns.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    /// Maximum number of rows, newest first.
    pub limit: usize,
    /// Only rows recorded at or after this instant.
    pub since: Option<DateTime<Utc>>,
    /// Only rows about this user.
    pub subject: Option<String>,
}

/// Append-only log of committed credential changes.
pub struct AuditTrail {
    conn: Connection,
    path: PathBuf,
}

impl AuditTrail {
    /// Where the trail for `credential_file` lives.
    pub fn path_for(credential_file: &Path) -> PathBuf {
        credential_file.with_extension("audit.db")
    }

    /// Open (creating if needed) the trail for `credential_file`.
    pub fn open(credential_file: &Path) -> Result<Self> {
        let path = Self::path_for(credential_file);
        let conn = Connection::open(&path).map_err(sql_err("open"))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
        }

        conn.execute_batch(SCHEMA).map_err(sql_err("create schema"))?;
        Ok(Self { conn, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record `event` with the current time, returning its sequence number.
    pub fn append(&self, event: &Event) -> Result<i64> {
        let users_after = i64::try_from(event.users_after).unwrap_or(i64::MAX);
        self.conn
            .execute(
                "INSERT INTO credential_changes (at_ms, action, subject, users_after, note)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    Utc::now().timestamp_millis(),
                    event.action.as_str(),
                    event.subject,
                    users_after,
                    event.note,
                ],
            )
            .map_err(sql_err("append"))?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Rows matching `filter`, newest first.
    pub fn recent(&self, filter: &Filter) -> Result<Vec<Recorded>> {
        let since_ms = filter.since.map_or(i64::MIN, |t| t.timestamp_millis());
        let limit = i64::try_from(filter.limit).unwrap_or(i64::MAX);

        let mut stmt = self
            .conn
            .prepare(
                "SELECT seq, at_ms, action, subject, users_after, note
                 FROM credential_changes
                 WHERE at_ms >= ?1 AND (?2 IS NULL OR subject = ?2)
                 ORDER BY seq DESC
                 LIMIT ?3",
            )
            .map_err(sql_err("prepare"))?;

        let rows = stmt
            .query_map(params![since_ms, filter.subject, limit], read_row)
            .map_err(sql_err("query"))?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(sql_err("read row"))
    }
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<Recorded> {
    let at_ms: i64 = row.get(1)?;
    let action: String = row.get(2)?;
    let users_after: i64 = row.get(4)?;
    Ok(Recorded {
        seq: row.get(0)?,
        at: DateTime::from_timestamp_millis(at_ms).unwrap_or_default(),
        action: Action::parse(&action),
        subject: row.get(3)?,
        users_after: usize::try_from(users_after).unwrap_or(0),
        note: row.get(5)?,
    })
}

fn sql_err(context: &'static str) -> impl Fn(rusqlite::Error) -> CredVaultError {
    move |e| CredVaultError::AuditError(format!("{context}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn trail_in(dir: &TempDir) -> AuditTrail {
        AuditTrail::open(&dir.path().join("auth.vault")).unwrap()
    }

    fn all() -> Filter {
        Filter {
            limit: 100,
            ..Filter::default()
        }
    }

    #[test]
    fn trail_sits_beside_the_credential_file() {
        let dir = TempDir::new().unwrap();
        let trail = trail_in(&dir);
        assert_eq!(trail.path(), dir.path().join("auth.audit.db"));
        assert!(trail.path().exists());
    }

    #[test]
    fn appended_events_come_back_newest_first() {
        let dir = TempDir::new().unwrap();
        let trail = trail_in(&dir);

        let first = trail.append(&Event::new(Action::Init, None, 0)).unwrap();
        trail
            .append(
                &Event::new(Action::AddUser, Some("alice"), 1).with_note(Some("role=admin".into())),
            )
            .unwrap();
        let last = trail
            .append(&Event::new(Action::RemoveUser, Some("alice"), 0))
            .unwrap();
        assert!(last > first);

        let rows = trail.recent(&all()).unwrap();
        let actions: Vec<_> = rows.iter().map(|r| r.action).collect();
        assert_eq!(
            actions,
            vec![Some(Action::RemoveUser), Some(Action::AddUser), Some(Action::Init)]
        );
        assert_eq!(rows[1].users_after, 1);
        assert_eq!(rows[1].note.as_deref(), Some("role=admin"));
        assert!(rows[2].subject.is_none());
    }

    #[test]
    fn filter_by_subject_and_limit() {
        let dir = TempDir::new().unwrap();
        let trail = trail_in(&dir);
        for (i, name) in ["a", "b", "a", "c", "a"].into_iter().enumerate() {
            trail
                .append(&Event::new(Action::AddUser, Some(name), i + 1))
                .unwrap();
        }

        let only_a = trail
            .recent(&Filter {
                subject: Some("a".into()),
                ..all()
            })
            .unwrap();
        assert_eq!(only_a.len(), 3);
        assert!(only_a.iter().all(|r| r.subject.as_deref() == Some("a")));

        let two = trail.recent(&Filter { limit: 2, ..all() }).unwrap();
        assert_eq!(two.iter().map(|r| r.users_after).collect::<Vec<_>>(), vec![5, 4]);
    }

    #[test]
    fn filter_by_time() {
        let dir = TempDir::new().unwrap();
        let trail = trail_in(&dir);
        trail.append(&Event::new(Action::RotateKey, None, 2)).unwrap();

        let hour = chrono::TimeDelta::hours(1);
        let past = Filter {
            since: Some(Utc::now() - hour),
            ..all()
        };
        let future = Filter {
            since: Some(Utc::now() + hour),
            ..all()
        };
        assert_eq!(trail.recent(&past).unwrap().len(), 1);
        assert!(trail.recent(&future).unwrap().is_empty());
    }

    #[test]
    fn reopening_keeps_history() {
        let dir = TempDir::new().unwrap();
        trail_in(&dir)
            .append(&Event::new(Action::Init, None, 0))
            .unwrap();
        assert_eq!(trail_in(&dir).recent(&all()).unwrap().len(), 1);
    }

    #[test]
    fn unwritable_location_is_an_error() {
        let result = AuditTrail::open(Path::new("/nonexistent/dir/auth.vault"));
        assert!(matches!(result, Err(CredVaultError::AuditError(_))));
    }

    #[cfg(unix)]
    #[test]
    fn database_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let trail = trail_in(&dir);
        let mode = std::fs::metadata(trail.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
