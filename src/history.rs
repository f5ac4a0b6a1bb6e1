//! history.rs: per-user "already seen" cache backed by a local SQLite file.
//!
//! One row per (user, url). Re-ingesting a known url refreshes the row
//! instead of adding a second one; `clean` evicts rows whose last-seen
//! time is older than the retention window.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use serde::{Deserialize, Serialize};

use crate::error::{Error, InsertError, Result};

pub const DEFAULT_RETENTION_DAYS: i64 = 7;
/// Upper bound on the retention window, roughly a century.
pub const MAX_RETENTION_DAYS: i64 = 36_500;
const SCHEMA_VERSION: i64 = 1;

const SCHEMA_V1: &str = "
CREATE TABLE IF NOT EXISTS history (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id    INTEGER NOT NULL,
    url        TEXT    NOT NULL,
    title      TEXT    NOT NULL DEFAULT '',
    updated_at INTEGER NOT NULL,
    UNIQUE (user_id, url)
);
CREATE INDEX IF NOT EXISTS idx_history_updated_at ON history (updated_at);
";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub user_id: i64,
    pub url: String,
    pub title: String, // denormalized for search
    pub updated_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(
        user_id: i64,
        url: impl Into<String>,
        title: impl Into<String>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            url: url.into(),
            title: title.into(),
            updated_at,
        }
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let ms: i64 = row.get(3)?;
        let updated_at = DateTime::<Utc>::from_timestamp_millis(ms)
            .ok_or(rusqlite::Error::IntegralValueOutOfRange(3, ms))?;
        Ok(Self {
            user_id: row.get(0)?,
            url: row.get(1)?,
            title: row.get(2)?,
            updated_at,
        })
    }
}

/// How long an entry stays live after it was last seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    window: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::days(DEFAULT_RETENTION_DAYS)
    }
}

impl RetentionPolicy {
    /// Clamped to `1..=MAX_RETENTION_DAYS`.
    pub fn days(days: i64) -> Self {
        Self {
            window: Duration::days(days.clamp(1, MAX_RETENTION_DAYS)),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Entries last seen strictly before this instant are evicted.
    /// `None` when the window reaches past the representable range, in
    /// which case nothing is old enough to evict.
    pub fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        now.checked_sub_signed(self.window)
    }

    pub fn is_expired(&self, entry: &HistoryEntry, now: DateTime<Utc>) -> bool {
        self.cutoff(now).is_some_and(|cutoff| entry.updated_at < cutoff)
    }
}

/// Shared handle; clones point at the same connection.
#[derive(Clone)]
pub struct HistoryStore {
    conn: Arc<Mutex<Connection>>,
    policy: RetentionPolicy,
}

impl std::fmt::Debug for HistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryStore")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl HistoryStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(StdDuration::from_secs(5))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        migrate(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            policy: RetentionPolicy::default(),
        })
    }

    pub fn with_retention(mut self, policy: RetentionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn retention(&self) -> RetentionPolicy {
        self.policy
    }

    /// Insert-or-refresh each entry in order. Returns how many were new.
    ///
    /// A known (user, url) gets `updated_at` bumped to the later of the
    /// stored and incoming times, and its title replaced when the incoming
    /// one is non-empty. A storage failure stops the batch; earlier entries
    /// stay committed and the error carries their count.
    pub fn insert(&self, entries: &[HistoryEntry]) -> Result<usize, InsertError> {
        let mut conn = self.conn.lock();
        let mut inserted = 0usize;
        for e in entries {
            match upsert(&mut conn, e) {
                Ok(true) => inserted += 1,
                Ok(false) => {}
                Err(source) => {
                    tracing::warn!(
                        target: "history",
                        inserted,
                        url = %e.url,
                        error = %source,
                        "history insert aborted"
                    );
                    return Err(InsertError { inserted, source });
                }
            }
        }
        tracing::debug!(
            target: "history",
            total = entries.len(),
            inserted,
            refreshed = entries.len() - inserted,
            "history insert"
        );
        Ok(inserted)
    }

    /// All entries of one user, newest first.
    pub fn list(&self, user_id: i64) -> Result<Vec<HistoryEntry>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT user_id, url, title, updated_at FROM history
             WHERE user_id = ?1
             ORDER BY updated_at DESC, id DESC",
        )?;
        let rows = stmt
            .query_map(params![user_id], HistoryEntry::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Case-insensitive substring search over one user's titles, newest
    /// first. Folding uses full Unicode lowercase, so CJK and accented
    /// titles behave. An empty query returns every entry of the user.
    pub fn search_by_title(&self, user_id: i64, query: &str) -> Result<Vec<HistoryEntry>> {
        let all = self.list(user_id)?;
        if query.is_empty() {
            return Ok(all);
        }
        let needle = query.to_lowercase();
        Ok(all
            .into_iter()
            .filter(|e| e.title.to_lowercase().contains(&needle))
            .collect())
    }

    pub fn contains(&self, user_id: i64, url: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let found = conn
            .query_row(
                "SELECT 1 FROM history WHERE user_id = ?1 AND url = ?2",
                params![user_id, url],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// The urls from `urls` this user has not seen yet, input order kept.
    pub fn unseen(&self, user_id: i64, urls: &[String]) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare_cached("SELECT 1 FROM history WHERE user_id = ?1 AND url = ?2")?;
        let mut out = Vec::with_capacity(urls.len());
        for url in urls {
            if !stmt.exists(params![user_id, url])? {
                out.push(url.clone());
            }
        }
        Ok(out)
    }

    /// Global eviction sweep against the current time.
    pub fn clean(&self) -> Result<usize> {
        self.clean_at(Utc::now())
    }

    /// Evict every entry (all users) last seen before `now - retention`.
    pub fn clean_at(&self, now: DateTime<Utc>) -> Result<usize> {
        let Some(cutoff) = self.policy.cutoff(now) else {
            tracing::warn!(
                target: "history",
                now = %now.to_rfc3339(),
                window_days = self.policy.window().num_days(),
                "retention cutoff out of range; nothing evicted"
            );
            return Ok(0);
        };
        let conn = self.conn.lock();
        let evicted = conn.execute(
            "DELETE FROM history WHERE updated_at < ?1",
            params![cutoff.timestamp_millis()],
        )?;
        tracing::info!(target: "history", evicted, cutoff = %cutoff.to_rfc3339(), "history clean");
        Ok(evicted)
    }
}

fn migrate(conn: &Connection) -> Result<()> {
    let current: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if current > SCHEMA_VERSION {
        return Err(Error::UnsupportedSchema {
            found: current,
            supported: SCHEMA_VERSION,
        });
    }
    if current < 1 {
        conn.execute_batch(SCHEMA_V1)?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    }
    Ok(())
}

/// Returns true when a new row was created.
fn upsert(conn: &mut Connection, e: &HistoryEntry) -> Result<bool> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let ts = e.updated_at.timestamp_millis();
    let created = tx.execute(
        "INSERT INTO history (user_id, url, title, updated_at) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (user_id, url) DO NOTHING",
        params![e.user_id, e.url, e.title, ts],
    )? > 0;
    if !created {
        tx.execute(
            "UPDATE history
             SET updated_at = MAX(updated_at, ?3),
                 title = CASE WHEN ?4 = '' THEN title ELSE ?4 END
             WHERE user_id = ?1 AND url = ?2",
            params![e.user_id, e.url, ts, e.title],
        )?;
    }
    tx.commit()?;
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 8, 0, 0).unwrap()
    }

    #[test]
    fn policy_clamps_and_cuts_off() {
        assert_eq!(RetentionPolicy::days(0).window(), Duration::days(1));
        let p = RetentionPolicy::default();
        assert_eq!(p.cutoff(t0()), Some(t0() - Duration::days(7)));

        let fresh = HistoryEntry::new(1, "u", "t", t0() - Duration::days(7));
        let stale = HistoryEntry::new(1, "u", "t", t0() - Duration::days(7) - Duration::seconds(1));
        assert!(!p.is_expired(&fresh, t0()));
        assert!(p.is_expired(&stale, t0()));
    }

    #[test]
    fn huge_retention_is_capped_and_never_panics() {
        assert_eq!(
            RetentionPolicy::days(i64::MAX).window(),
            Duration::days(MAX_RETENTION_DAYS)
        );
        assert_eq!(
            RetentionPolicy::days(200_000_000).window(),
            Duration::days(MAX_RETENTION_DAYS)
        );

        let store = HistoryStore::open_in_memory()
            .unwrap()
            .with_retention(RetentionPolicy::days(200_000_000));
        store.insert(&[HistoryEntry::new(1, "https://x.test/old", "old", t0())]).unwrap();
        assert_eq!(store.clean_at(t0()).unwrap(), 0);
        assert_eq!(store.clean().unwrap(), 0);
        assert_eq!(store.list(1).unwrap().len(), 1);

        // window reaching before the earliest representable instant
        let p = RetentionPolicy::days(MAX_RETENTION_DAYS);
        let early = DateTime::<Utc>::MIN_UTC + Duration::days(10);
        assert_eq!(p.cutoff(early), None);
        assert!(!p.is_expired(&HistoryEntry::new(1, "u", "t", DateTime::<Utc>::MIN_UTC), early));
        let store = HistoryStore::open_in_memory().unwrap().with_retention(p);
        assert_eq!(store.clean_at(early).unwrap(), 0);
    }

    #[test]
    fn migration_is_idempotent_and_versioned() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        let v: i64 = conn
            .query_row("PRAGMA user_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(v, SCHEMA_VERSION);

        conn.pragma_update(None, "user_version", 99).unwrap();
        assert!(matches!(
            migrate(&conn),
            Err(Error::UnsupportedSchema { found: 99, .. })
        ));
    }

    #[test]
    fn storage_failure_reports_rows_committed_before_it() {
        let store = HistoryStore::open_in_memory().unwrap();
        let base = "https://x.test/";
        store
            .insert(&[HistoryEntry::new(1, format!("{base}known"), "known", t0())])
            .unwrap();
        store
            .conn
            .lock()
            .execute_batch(
                "CREATE TRIGGER reject_c BEFORE INSERT ON history
                 WHEN NEW.url = 'https://x.test/c'
                 BEGIN SELECT RAISE(ABORT, 'boom'); END;",
            )
            .unwrap();

        let later = t0() + Duration::hours(1);
        let batch: Vec<_> = ["known", "a", "b", "c", "d"]
            .iter()
            .map(|k| HistoryEntry::new(1, format!("{base}{k}"), *k, later))
            .collect();
        let err = store.insert(&batch).unwrap_err();
        assert_eq!(err.inserted, 2);
        assert!(matches!(err.source, Error::Storage(_)));
        assert!(err.to_string().contains("boom"));

        let rows = store.list(1).unwrap();
        let known = rows.iter().find(|e| e.url.ends_with("known")).unwrap();
        assert_eq!(known.updated_at, later);
        let urls: Vec<_> = rows.into_iter().map(|e| e.url).collect();
        assert_eq!(urls.len(), 3);
        for k in ["known", "a", "b"] {
            assert!(urls.contains(&format!("{base}{k}")));
        }
        assert!(!store.contains(1, &format!("{base}c")).unwrap());
        assert!(!store.contains(1, &format!("{base}d")).unwrap());
    }

    #[test]
    fn refresh_keeps_newer_timestamp_and_title() {
        let store = HistoryStore::open_in_memory().unwrap();
        let url = "https://x.test/1";
        assert_eq!(store.insert(&[HistoryEntry::new(1, url, "first", t0())]).unwrap(), 1);

        // older replay: no bump, empty title keeps the stored one
        let older = HistoryEntry::new(1, url, "", t0() - Duration::days(3));
        assert_eq!(store.insert(&[older]).unwrap(), 0);
        let got = store.list(1).unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].updated_at, t0());
        assert_eq!(got[0].title, "first");

        let newer = HistoryEntry::new(1, url, "second", t0() + Duration::hours(1));
        assert_eq!(store.insert(&[newer]).unwrap(), 0);
        let got = store.list(1).unwrap();
        assert_eq!(got[0].updated_at, t0() + Duration::hours(1));
        assert_eq!(got[0].title, "second");
    }
}
