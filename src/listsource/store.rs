//! Durable pattern store: persistence for learned signatures with indexed
//! queries (§4.3). The wire contract is the operation set and ordering
//! below; the SQLite implementation is one conforming backend.

#![allow(missing_docs)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::errors::Result;

/// Durable-form action classification for a learned signature, matching the
/// load-mapping table in §4.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum SignatureAction {
    LogOnly,
    ScoreOnly,
    Full,
}

impl SignatureAction {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LogOnly => "LogOnly",
            Self::ScoreOnly => "ScoreOnly",
            Self::Full => "Full",
        }
    }

    #[must_use]
    pub fn from_str_lenient(raw: &str) -> Self {
        match raw {
            "Full" => Self::Full,
            "ScoreOnly" => Self::ScoreOnly,
            _ => Self::LogOnly,
        }
    }
}

/// Durable form of a reputation or learning event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnedSignature {
    pub pattern_id: String,
    pub signature_type: String,
    pub pattern: String,
    pub confidence: f64,
    pub occurrences: u64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub action: SignatureAction,
    pub bot_type: Option<String>,
    pub bot_name: Option<String>,
    pub source: Option<String>,
    pub fed_back: bool,
    pub metadata: Option<String>,
}

/// Persistence collaborator for learned signatures.
///
/// Implementors must honor: `upsert` is monotonic on `confidence` (only
/// increases) and `occurrences` (increments by one); `get_by_confidence`
/// orders by `(confidence desc, occurrences desc)`; `cleanup_old` removes
/// rows whose `last_seen < now - max_age` AND `occurrences < 10`. Single
/// writer, concurrent readers.
pub trait PatternStore: Send + Sync {
    fn upsert(&self, signature: &LearnedSignature) -> Result<()>;
    fn get(&self, pattern_id: &str) -> Result<Option<LearnedSignature>>;
    fn get_by_type(&self, signature_type: &str) -> Result<Vec<LearnedSignature>>;
    fn get_by_confidence(&self, min: f64) -> Result<Vec<LearnedSignature>>;
    fn delete(&self, pattern_id: &str) -> Result<()>;
    fn get_pending_feedback(&self, min_occurrences: u64) -> Result<Vec<LearnedSignature>>;
    fn mark_fed_back(&self, pattern_id: &str) -> Result<()>;
    fn cleanup_old(&self, max_age: chrono::Duration) -> Result<u64>;
    fn stats(&self) -> Result<PatternStoreStats>;
}

/// Coarse health/size snapshot of the store.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PatternStoreStats {
    pub total_rows: u64,
    pub pending_feedback: u64,
}

#[cfg(feature = "sqlite")]
mod sqlite_impl {
    use std::path::{Path, PathBuf};

    use rusqlite::{Connection, OpenFlags, params};

    use super::{LearnedSignature, PatternStore, PatternStoreStats, SignatureAction};
    use crate::core::errors::Result;

    /// SQLite-backed [`PatternStore`], WAL mode, prepared statements —
    /// exactly the persistence shape the rest of this codebase's durable
    /// stores use.
    pub struct SqlitePatternStore {
        conn: Connection,
        #[allow(dead_code)]
        path: PathBuf,
    }

    impl SqlitePatternStore {
        pub fn open(path: &Path) -> Result<Self> {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|source| {
                    crate::core::errors::BotShieldError::Runtime {
                        details: format!("creating {}: {source}", parent.display()),
                    }
                })?;
            }
            let conn = Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_WRITE
                    | OpenFlags::SQLITE_OPEN_CREATE
                    | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            apply_pragmas(&conn)?;
            apply_schema(&conn)?;
            Ok(Self {
                conn,
                path: path.to_path_buf(),
            })
        }

        /// In-memory database, for tests.
        pub fn open_in_memory() -> Result<Self> {
            let conn = Connection::open_in_memory()?;
            apply_pragmas(&conn)?;
            apply_schema(&conn)?;
            Ok(Self {
                conn,
                path: PathBuf::from(":memory:"),
            })
        }

        fn row_to_signature(row: &rusqlite::Row<'_>) -> rusqlite::Result<LearnedSignature> {
            let action_raw: String = row.get(6)?;
            Ok(LearnedSignature {
                pattern_id: row.get(0)?,
                signature_type: row.get(1)?,
                pattern: row.get(2)?,
                confidence: row.get(3)?,
                occurrences: row.get(4)?,
                first_seen: row.get(5)?,
                last_seen: row.get(7)?,
                action: SignatureAction::from_str_lenient(&action_raw),
                bot_type: row.get(8)?,
                bot_name: row.get(9)?,
                source: row.get(10)?,
                fed_back: row.get(11)?,
                metadata: row.get(12)?,
            })
        }
    }

    impl PatternStore for SqlitePatternStore {
        fn upsert(&self, signature: &LearnedSignature) -> Result<()> {
            self.conn
                .prepare_cached(
                    "INSERT INTO learned_signatures (
                        pattern_id, signature_type, pattern, confidence, occurrences,
                        first_seen, action, last_seen, bot_type, bot_name, source, fed_back, metadata
                    ) VALUES (?1,?2,?3,?4,1,?5,?6,?5,?7,?8,?9,?10,?11)
                    ON CONFLICT(pattern_id) DO UPDATE SET
                        confidence = MAX(learned_signatures.confidence, excluded.confidence),
                        occurrences = learned_signatures.occurrences + 1,
                        last_seen = excluded.last_seen,
                        action = excluded.action,
                        bot_type = excluded.bot_type,
                        bot_name = excluded.bot_name,
                        metadata = excluded.metadata",
                )?
                .execute(params![
                    signature.pattern_id,
                    signature.signature_type,
                    signature.pattern,
                    signature.confidence,
                    signature.first_seen,
                    signature.action.as_str(),
                    signature.bot_type,
                    signature.bot_name,
                    signature.source,
                    signature.fed_back,
                    signature.metadata,
                ])?;
            Ok(())
        }

        fn get(&self, pattern_id: &str) -> Result<Option<LearnedSignature>> {
            let mut stmt = self.conn.prepare_cached(
                "SELECT pattern_id, signature_type, pattern, confidence, occurrences,
                        first_seen, action, last_seen, bot_type, bot_name, source, fed_back, metadata
                 FROM learned_signatures WHERE pattern_id = ?1",
            )?;
            let mut rows = stmt.query_map(params![pattern_id], Self::row_to_signature)?;
            rows.next().transpose().map_err(Into::into)
        }

        fn get_by_type(&self, signature_type: &str) -> Result<Vec<LearnedSignature>> {
            let mut stmt = self.conn.prepare_cached(
                "SELECT pattern_id, signature_type, pattern, confidence, occurrences,
                        first_seen, action, last_seen, bot_type, bot_name, source, fed_back, metadata
                 FROM learned_signatures WHERE signature_type = ?1",
            )?;
            let rows = stmt
                .query_map(params![signature_type], Self::row_to_signature)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        }

        fn get_by_confidence(&self, min: f64) -> Result<Vec<LearnedSignature>> {
            let mut stmt = self.conn.prepare_cached(
                "SELECT pattern_id, signature_type, pattern, confidence, occurrences,
                        first_seen, action, last_seen, bot_type, bot_name, source, fed_back, metadata
                 FROM learned_signatures WHERE confidence >= ?1
                 ORDER BY confidence DESC, occurrences DESC",
            )?;
            let rows = stmt
                .query_map(params![min], Self::row_to_signature)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        }

        fn delete(&self, pattern_id: &str) -> Result<()> {
            self.conn
                .prepare_cached("DELETE FROM learned_signatures WHERE pattern_id = ?1")?
                .execute(params![pattern_id])?;
            Ok(())
        }

        fn get_pending_feedback(&self, min_occurrences: u64) -> Result<Vec<LearnedSignature>> {
            let mut stmt = self.conn.prepare_cached(
                "SELECT pattern_id, signature_type, pattern, confidence, occurrences,
                        first_seen, action, last_seen, bot_type, bot_name, source, fed_back, metadata
                 FROM learned_signatures WHERE occurrences >= ?1 AND fed_back = 0",
            )?;
            let rows = stmt
                .query_map(params![min_occurrences], Self::row_to_signature)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        }

        fn mark_fed_back(&self, pattern_id: &str) -> Result<()> {
            self.conn
                .prepare_cached("UPDATE learned_signatures SET fed_back = 1 WHERE pattern_id = ?1")?
                .execute(params![pattern_id])?;
            Ok(())
        }

        fn cleanup_old(&self, max_age: chrono::Duration) -> Result<u64> {
            let cutoff = chrono::Utc::now() - max_age;
            let removed = self
                .conn
                .prepare_cached(
                    "DELETE FROM learned_signatures WHERE last_seen < ?1 AND occurrences < 10",
                )?
                .execute(params![cutoff])?;
            Ok(removed as u64)
        }

        fn stats(&self) -> Result<PatternStoreStats> {
            let total_rows: u64 =
                self.conn
                    .query_row("SELECT COUNT(*) FROM learned_signatures", [], |row| row.get(0))?;
            let pending_feedback: u64 = self.conn.query_row(
                "SELECT COUNT(*) FROM learned_signatures WHERE fed_back = 0 AND occurrences >= 3",
                [],
                |row| row.get(0),
            )?;
            Ok(PatternStoreStats {
                total_rows,
                pending_feedback,
            })
        }
    }

    fn apply_pragmas(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -8000;
             PRAGMA temp_store = MEMORY;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(())
    }

    fn apply_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS learned_signatures (
                pattern_id TEXT PRIMARY KEY,
                signature_type TEXT NOT NULL,
                pattern TEXT NOT NULL,
                confidence REAL NOT NULL,
                occurrences INTEGER NOT NULL DEFAULT 1,
                first_seen TEXT NOT NULL,
                last_seen TEXT NOT NULL,
                action TEXT NOT NULL,
                bot_type TEXT,
                bot_name TEXT,
                source TEXT,
                fed_back INTEGER NOT NULL DEFAULT 0,
                metadata TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_signatures_type ON learned_signatures(signature_type);
            CREATE INDEX IF NOT EXISTS idx_signatures_confidence ON learned_signatures(confidence DESC, occurrences DESC);
            CREATE INDEX IF NOT EXISTS idx_signatures_feedback ON learned_signatures(fed_back, occurrences);",
        )?;
        Ok(())
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use chrono::Utc;

        fn sig(id: &str, confidence: f64) -> LearnedSignature {
            let now = Utc::now();
            LearnedSignature {
                pattern_id: id.to_string(),
                signature_type: "UserAgent".to_string(),
                pattern: id.to_string(),
                confidence,
                occurrences: 1,
                first_seen: now,
                last_seen: now,
                action: SignatureAction::Full,
                bot_type: Some("MaliciousBot".to_string()),
                bot_name: None,
                source: None,
                fed_back: false,
                metadata: None,
            }
        }

        #[test]
        fn upsert_is_monotonic_on_confidence_and_increments_occurrences() {
            let store = SqlitePatternStore::open_in_memory().unwrap();
            store.upsert(&sig("ua:1", 0.5)).unwrap();
            store.upsert(&sig("ua:1", 0.3)).unwrap();
            let row = store.get("ua:1").unwrap().unwrap();
            assert!((row.confidence - 0.5).abs() < f64::EPSILON);
            assert_eq!(row.occurrences, 2);
        }

        #[test]
        fn get_by_confidence_orders_desc() {
            let store = SqlitePatternStore::open_in_memory().unwrap();
            store.upsert(&sig("ua:a", 0.6)).unwrap();
            store.upsert(&sig("ua:b", 0.9)).unwrap();
            let rows = store.get_by_confidence(0.5).unwrap();
            assert_eq!(rows[0].pattern_id, "ua:b");
            assert_eq!(rows[1].pattern_id, "ua:a");
        }

        #[test]
        fn cleanup_old_spares_high_occurrence_rows() {
            let store = SqlitePatternStore::open_in_memory().unwrap();
            let mut old_but_frequent = sig("ua:sticky", 0.9);
            old_but_frequent.last_seen = Utc::now() - chrono::Duration::days(400);
            old_but_frequent.occurrences = 50;
            store.upsert(&old_but_frequent).unwrap();
            store.upsert(&old_but_frequent).unwrap();
            let removed = store.cleanup_old(chrono::Duration::days(30)).unwrap();
            assert_eq!(removed, 0);
        }

        #[test]
        fn pending_feedback_excludes_already_fed_back() {
            let store = SqlitePatternStore::open_in_memory().unwrap();
            let mut s = sig("ua:fed", 0.9);
            s.occurrences = 5;
            store.upsert(&s).unwrap();
            store.mark_fed_back("ua:fed").unwrap();
            let pending = store.get_pending_feedback(3).unwrap();
            assert!(pending.is_empty());
        }
    }
}

#[cfg(feature = "sqlite")]
pub use sqlite_impl::SqlitePatternStore;
