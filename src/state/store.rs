use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::{debug, warn};

use crate::state::error::{StoreError, StoreResult};
use crate::state::migrations::BASE_MIGRATION;
use crate::state::{
    ClusterVersionRecord, GithubVersionRecord, Observation, ProgramSlotRecord, RecordKey,
    RecordKind, StoredRecord,
};

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_PAGE_SIZE: usize = 64;

#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// How long a writer waits on another process holding the database lock.
    pub busy_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
        }
    }
}

/// Durable record of which observations already produced a notification.
///
/// The connection sits behind a mutex so one store can be shared between
/// threads through an `Arc`. Separate processes coordinate through SQLite's
/// own locking; every write runs in an `IMMEDIATE` transaction.
pub struct NotificationStore {
    conn: Mutex<Connection>,
}

impl NotificationStore {
    pub fn open(path: &Path, options: &StoreOptions) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(options.busy_timeout)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!("opened {} (journal_mode={mode})", path.display());
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    pub fn migrate(&self) -> StoreResult<()> {
        self.lock().execute_batch(BASE_MIGRATION)?;
        Ok(())
    }

    /// Flushes and releases the underlying connection.
    pub fn close(self) -> StoreResult<()> {
        let conn = self
            .conn
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        conn.close().map_err(|(_, err)| StoreError::from(err))
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // A panic mid-statement leaves no partial state behind: every write
        // is a transaction that rolls back on drop.
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Inserts the observation's key if unseen, otherwise advances
    /// `last_slot` for programs. Returns `true` when the key is new.
    ///
    /// A stored `notified` flag is never touched here. Racing inserts of the
    /// same key are resolved by the `ON CONFLICT` clause on the table's
    /// unique constraint; any other constraint failure surfaces as
    /// `ConstraintViolation`.
    pub fn record_observation(&self, observation: &Observation) -> StoreResult<bool> {
        let mut conn = self.lock();
        upsert_observation(&mut conn, observation).map_err(|err| match err {
            StoreError::StorageUnavailable(err) if StoreError::is_constraint_violation(&err) => {
                warn!("constraint rejected {}: {err}", observation.key());
                StoreError::ConstraintViolation(observation.key())
            }
            other => other,
        })
    }

    /// Absent keys count as not notified.
    pub fn is_notified(&self, key: &RecordKey) -> StoreResult<bool> {
        let conn = self.lock();
        let (sql, first, second) = match key {
            RecordKey::SolanaCluster { version, cluster } => (
                "SELECT notified FROM solana_clusters WHERE version = ?1 AND cluster = ?2",
                version,
                cluster,
            ),
            RecordKey::GithubVersion { name, version } => (
                "SELECT notified FROM github_versions WHERE name = ?1 AND version = ?2",
                name,
                version,
            ),
            RecordKey::Program { name, cluster } => (
                "SELECT notified FROM programs WHERE name = ?1 AND cluster = ?2",
                name,
                cluster,
            ),
        };
        let flag: Option<Option<bool>> = conn
            .query_row(sql, params![first, second], |row| row.get(0))
            .optional()?;
        Ok(flag.flatten().unwrap_or(false))
    }

    /// Sets `notified` for an existing record. Marking twice is a no-op.
    pub fn mark_notified(&self, key: &RecordKey) -> StoreResult<()> {
        let conn = self.lock();
        let (sql, first, second) = match key {
            RecordKey::SolanaCluster { version, cluster } => (
                "UPDATE solana_clusters SET notified = TRUE WHERE version = ?1 AND cluster = ?2",
                version,
                cluster,
            ),
            RecordKey::GithubVersion { name, version } => (
                "UPDATE github_versions SET notified = TRUE WHERE name = ?1 AND version = ?2",
                name,
                version,
            ),
            RecordKey::Program { name, cluster } => (
                "UPDATE programs SET notified = TRUE WHERE name = ?1 AND cluster = ?2",
                name,
                cluster,
            ),
        };
        let changed = conn.execute(sql, params![first, second])?;
        if changed == 0 {
            return Err(StoreError::NotFound(key.clone()));
        }
        Ok(())
    }

    pub fn get(&self, key: &RecordKey) -> StoreResult<Option<StoredRecord>> {
        let conn = self.lock();
        let (sql, first, second) = match key {
            RecordKey::SolanaCluster { version, cluster } => (
                r#"
SELECT rowid, version, cluster, NULL, notified
FROM solana_clusters
WHERE version = ?1 AND cluster = ?2
"#,
                version,
                cluster,
            ),
            RecordKey::GithubVersion { name, version } => (
                r#"
SELECT rowid, name, version, NULL, notified
FROM github_versions
WHERE name = ?1 AND version = ?2
"#,
                name,
                version,
            ),
            RecordKey::Program { name, cluster } => (
                r#"
SELECT rowid, name, cluster, last_slot, notified
FROM programs
WHERE name = ?1 AND cluster = ?2
"#,
                name,
                cluster,
            ),
        };
        let raw = conn
            .query_row(sql, params![first, second], RawRow::from_row)
            .optional()?;
        raw.map(|raw| raw.into_record(key.kind())).transpose()
    }

    /// Every stored record of one kind, in insertion order.
    pub fn list(&self, kind: RecordKind) -> StoreResult<Vec<StoredRecord>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(select_sql(kind, false))?;
        let rows = stmt
            .query_map(params![0i64, i64::MAX], RawRow::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter().map(|raw| raw.into_record(kind)).collect()
    }

    /// Lazily walks the records of `kind` that are not yet notified.
    ///
    /// Pages are fetched on demand and every buffered record is re-read
    /// before it is yielded, so records marked while iterating are skipped.
    /// Call again to start over.
    pub fn pending_unnotified(&self, kind: RecordKind) -> PendingIter<'_> {
        PendingIter {
            store: self,
            kind,
            cursor: 0,
            page: VecDeque::new(),
            page_size: DEFAULT_PAGE_SIZE,
            exhausted: false,
        }
    }

    fn pending_page(
        &self,
        kind: RecordKind,
        after_rowid: i64,
        limit: usize,
    ) -> StoreResult<Vec<(i64, StoredRecord)>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(select_sql(kind, true))?;
        let rows = stmt
            .query_map(
                params![after_rowid, i64::try_from(limit).unwrap_or(i64::MAX)],
                RawRow::from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|raw| {
                let rowid = raw.rowid;
                raw.into_record(kind).map(|record| (rowid, record))
            })
            .collect()
    }
}

fn upsert_observation(conn: &mut Connection, observation: &Observation) -> StoreResult<bool> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let inserted = match observation {
        Observation::SolanaCluster { version, cluster } => {
            tx.execute(
                r#"
INSERT INTO solana_clusters(version, cluster) VALUES (?1, ?2)
ON CONFLICT(version, cluster) DO NOTHING
"#,
                params![version, cluster],
            )? == 1
        }
        Observation::GithubVersion { name, version } => {
            tx.execute(
                r#"
INSERT INTO github_versions(name, version) VALUES (?1, ?2)
ON CONFLICT(name, version) DO NOTHING
"#,
                params![name, version],
            )? == 1
        }
        Observation::ProgramSlot {
            name,
            cluster,
            slot,
        } => {
            let slot = i64::try_from(*slot).map_err(|_| StoreError::CorruptRow {
                table: "programs",
                reason: format!("slot {slot} exceeds INTEGER range"),
            })?;
            let inserted = tx.execute(
                r#"
INSERT INTO programs(name, cluster, last_slot) VALUES (?1, ?2, ?3)
ON CONFLICT(name, cluster) DO NOTHING
"#,
                params![name, cluster, slot],
            )? == 1;
            if !inserted {
                // Older slots are ignored so last_slot only moves forward.
                tx.execute(
                    "UPDATE programs SET last_slot = ?3 WHERE name = ?1 AND cluster = ?2 AND last_slot < ?3",
                    params![name, cluster, slot],
                )?;
            }
            inserted
        }
    };
    tx.commit()?;
    Ok(inserted)
}

fn select_sql(kind: RecordKind, pending_only: bool) -> &'static str {
    match (kind, pending_only) {
        (RecordKind::SolanaCluster, false) => {
            r#"
SELECT rowid, version, cluster, NULL, notified
FROM solana_clusters
WHERE rowid > ?1
ORDER BY rowid
LIMIT ?2
"#
        }
        (RecordKind::SolanaCluster, true) => {
            r#"
SELECT rowid, version, cluster, NULL, notified
FROM solana_clusters
WHERE COALESCE(notified, 0) = 0 AND rowid > ?1
ORDER BY rowid
LIMIT ?2
"#
        }
        (RecordKind::GithubVersion, false) => {
            r#"
SELECT rowid, name, version, NULL, notified
FROM github_versions
WHERE rowid > ?1
ORDER BY rowid
LIMIT ?2
"#
        }
        (RecordKind::GithubVersion, true) => {
            r#"
SELECT rowid, name, version, NULL, notified
FROM github_versions
WHERE COALESCE(notified, 0) = 0 AND rowid > ?1
ORDER BY rowid
LIMIT ?2
"#
        }
        (RecordKind::Program, false) => {
            r#"
SELECT rowid, name, cluster, last_slot, notified
FROM programs
WHERE rowid > ?1
ORDER BY rowid
LIMIT ?2
"#
        }
        (RecordKind::Program, true) => {
            r#"
SELECT rowid, name, cluster, last_slot, notified
FROM programs
WHERE COALESCE(notified, 0) = 0 AND rowid > ?1
ORDER BY rowid
LIMIT ?2
"#
        }
    }
}

/// Uniform row shape shared by all three tables: two key columns, an
/// optional slot and the flag.
struct RawRow {
    rowid: i64,
    first: Option<String>,
    second: Option<String>,
    slot: Option<i64>,
    notified: Option<bool>,
}

impl RawRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            rowid: row.get(0)?,
            first: row.get(1)?,
            second: row.get(2)?,
            slot: row.get(3)?,
            notified: row.get(4)?,
        })
    }

    fn into_record(self, kind: RecordKind) -> StoreResult<StoredRecord> {
        let table = kind.table();
        let missing = |column: &str| StoreError::CorruptRow {
            table,
            reason: format!("NULL {column} at rowid {}", self.rowid),
        };
        let first = self.first.clone().ok_or_else(|| missing("key column 1"))?;
        let second = self.second.clone().ok_or_else(|| missing("key column 2"))?;
        let notified = self.notified.unwrap_or(false);
        let record = match kind {
            RecordKind::SolanaCluster => StoredRecord::SolanaCluster(ClusterVersionRecord {
                version: first,
                cluster: second,
                notified,
            }),
            RecordKind::GithubVersion => StoredRecord::GithubVersion(GithubVersionRecord {
                name: first,
                version: second,
                notified,
            }),
            RecordKind::Program => {
                let raw_slot = self.slot.ok_or_else(|| missing("last_slot"))?;
                let last_slot = u64::try_from(raw_slot).map_err(|_| StoreError::CorruptRow {
                    table,
                    reason: format!("negative last_slot {raw_slot} at rowid {}", self.rowid),
                })?;
                StoredRecord::Program(ProgramSlotRecord {
                    name: first,
                    cluster: second,
                    last_slot,
                    notified,
                })
            }
        };
        Ok(record)
    }
}

pub struct PendingIter<'a> {
    store: &'a NotificationStore,
    kind: RecordKind,
    cursor: i64,
    page: VecDeque<StoredRecord>,
    page_size: usize,
    exhausted: bool,
}

impl PendingIter<'_> {
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }
}

impl Iterator for PendingIter<'_> {
    type Item = StoreResult<StoredRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.page.is_empty() && !self.exhausted {
                match self
                    .store
                    .pending_page(self.kind, self.cursor, self.page_size)
                {
                    Ok(rows) => {
                        if rows.len() < self.page_size {
                            self.exhausted = true;
                        }
                        if let Some((rowid, _)) = rows.last() {
                            self.cursor = *rowid;
                        }
                        self.page.extend(rows.into_iter().map(|(_, record)| record));
                    }
                    Err(err) => {
                        self.exhausted = true;
                        return Some(Err(err));
                    }
                }
            }
            let buffered = self.page.pop_front()?;
            // The page may be stale: another caller can have marked the
            // record since it was fetched.
            match self.store.get(&buffered.key()) {
                Ok(Some(current)) if !current.notified() => return Some(Ok(current)),
                Ok(_) => continue,
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier};
    use std::thread;

    use crate::state::store::{NotificationStore, StoreOptions};
    use crate::state::{Observation, RecordKey, RecordKind, StoreError, StoredRecord};

    fn store() -> NotificationStore {
        NotificationStore::open_in_memory().expect("in-memory store")
    }

    fn cluster(version: &str, cluster: &str) -> Observation {
        Observation::SolanaCluster {
            version: version.to_string(),
            cluster: cluster.to_string(),
        }
    }

    fn tag(name: &str, version: &str) -> Observation {
        Observation::GithubVersion {
            name: name.to_string(),
            version: version.to_string(),
        }
    }

    fn slot(name: &str, cluster: &str, slot: u64) -> Observation {
        Observation::ProgramSlot {
            name: name.to_string(),
            cluster: cluster.to_string(),
            slot,
        }
    }

    fn last_slot(store: &NotificationStore, name: &str, cluster: &str) -> u64 {
        match store.get(&RecordKey::program(name, cluster)).unwrap() {
            Some(StoredRecord::Program(record)) => record.last_slot,
            other => panic!("expected program record, got {other:?}"),
        }
    }

    #[test]
    fn first_observation_is_new_and_repeat_is_not() {
        let s = store();
        assert!(s.record_observation(&cluster("1.14.0", "devnet")).unwrap());
        assert!(!s.record_observation(&cluster("1.14.0", "devnet")).unwrap());
        assert!(s.record_observation(&cluster("1.14.0", "testnet")).unwrap());
        assert_eq!(s.list(RecordKind::SolanaCluster).unwrap().len(), 2);
    }

    #[test]
    fn duplicate_inserts_never_create_duplicate_rows() {
        let s = store();
        for _ in 0..5 {
            s.record_observation(&tag("spl", "v1.0.0")).unwrap();
            s.record_observation(&slot("metaplex", "devnet", 10)).unwrap();
        }
        assert_eq!(s.list(RecordKind::GithubVersion).unwrap().len(), 1);
        assert_eq!(s.list(RecordKind::Program).unwrap().len(), 1);
    }

    #[test]
    fn last_slot_only_moves_forward() {
        let s = store();
        assert!(s.record_observation(&slot("voter", "mainnet", 100)).unwrap());
        assert_eq!(last_slot(&s, "voter", "mainnet"), 100);

        assert!(!s.record_observation(&slot("voter", "mainnet", 90)).unwrap());
        assert_eq!(last_slot(&s, "voter", "mainnet"), 100);

        assert!(!s.record_observation(&slot("voter", "mainnet", 150)).unwrap());
        assert_eq!(last_slot(&s, "voter", "mainnet"), 150);
    }

    #[test]
    fn slot_sequence_is_monotonic() {
        let s = store();
        let mut max_seen = 0;
        for value in [5u64, 3, 9, 9, 1, 12, 11, 40, 2] {
            s.record_observation(&slot("metaplex", "testnet", value)).unwrap();
            max_seen = max_seen.max(value);
            assert_eq!(last_slot(&s, "metaplex", "testnet"), max_seen);
        }
    }

    #[test]
    fn slot_beyond_integer_range_is_rejected() {
        let s = store();
        let err = s
            .record_observation(&slot("metaplex", "devnet", u64::MAX))
            .unwrap_err();
        assert!(matches!(err, StoreError::CorruptRow { .. }));
        assert!(s.get(&RecordKey::program("metaplex", "devnet")).unwrap().is_none());
    }

    #[test]
    fn mark_notified_on_unknown_key_is_not_found() {
        let s = store();
        let err = s
            .mark_notified(&RecordKey::github_version("github", "v1.2.3"))
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn mark_notified_is_idempotent() {
        let s = store();
        let key = RecordKey::github_version("solana", "v1.18.0");
        s.record_observation(&tag("solana", "v1.18.0")).unwrap();
        assert!(!s.is_notified(&key).unwrap());
        s.mark_notified(&key).unwrap();
        s.mark_notified(&key).unwrap();
        assert!(s.is_notified(&key).unwrap());
    }

    #[test]
    fn absent_key_is_not_notified() {
        let s = store();
        assert!(!s
            .is_notified(&RecordKey::solana_cluster("9.9.9", "devnet"))
            .unwrap());
        assert!(s
            .get(&RecordKey::solana_cluster("9.9.9", "devnet"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn reobserving_notified_key_keeps_flag() {
        let s = store();
        let key = RecordKey::program("metaplex", "mainnet-beta");
        s.record_observation(&slot("metaplex", "mainnet-beta", 7)).unwrap();
        s.mark_notified(&key).unwrap();

        s.record_observation(&slot("metaplex", "mainnet-beta", 8)).unwrap();
        s.record_observation(&slot("metaplex", "mainnet-beta", 3)).unwrap();
        assert!(s.is_notified(&key).unwrap());
        assert_eq!(last_slot(&s, "metaplex", "mainnet-beta"), 8);

        s.record_observation(&cluster("1.17.3", "devnet")).unwrap();
        s.mark_notified(&RecordKey::solana_cluster("1.17.3", "devnet"))
            .unwrap();
        s.record_observation(&cluster("1.17.3", "devnet")).unwrap();
        assert!(s
            .is_notified(&RecordKey::solana_cluster("1.17.3", "devnet"))
            .unwrap());
    }

    #[test]
    fn pending_skips_notified_records() {
        let s = store();
        for version in ["v1", "v2", "v3", "v4"] {
            s.record_observation(&tag("spl", version)).unwrap();
        }
        s.mark_notified(&RecordKey::github_version("spl", "v2")).unwrap();

        let pending = s
            .pending_unnotified(RecordKind::GithubVersion)
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        let keys = pending.iter().map(|r| r.key()).collect::<Vec<_>>();
        assert_eq!(keys.len(), 3);
        assert!(!keys.contains(&RecordKey::github_version("spl", "v2")));
        assert!(pending.iter().all(|r| !r.notified()));
    }

    #[test]
    fn pending_reflects_marks_made_between_pages() {
        let s = store();
        for idx in 0..6 {
            s.record_observation(&cluster(&format!("1.{idx}.0"), "devnet"))
                .unwrap();
        }
        let mut iter = s.pending_unnotified(RecordKind::SolanaCluster).with_page_size(2);
        let first = iter.next().unwrap().unwrap();
        assert_eq!(first.key(), RecordKey::solana_cluster("1.0.0", "devnet"));

        // 1.3.0 sits on a page that has not been fetched yet.
        s.mark_notified(&RecordKey::solana_cluster("1.3.0", "devnet"))
            .unwrap();
        let rest = iter.collect::<Result<Vec<_>, _>>().unwrap();
        let versions = rest
            .iter()
            .map(|r| match r {
                StoredRecord::SolanaCluster(r) => r.version.clone(),
                other => panic!("unexpected record {other:?}"),
            })
            .collect::<Vec<_>>();
        assert_eq!(versions, vec!["1.1.0", "1.2.0", "1.4.0", "1.5.0"]);
    }

    #[test]
    fn pending_skips_records_marked_after_their_page_was_fetched() {
        let s = store();
        for version in ["a", "b", "c"] {
            s.record_observation(&tag("n", version)).unwrap();
        }
        let mut iter = s.pending_unnotified(RecordKind::GithubVersion);
        let first = iter.next().unwrap().unwrap();
        assert_eq!(first.key(), RecordKey::github_version("n", "a"));

        // "b" is already buffered on the first page.
        s.mark_notified(&RecordKey::github_version("n", "b")).unwrap();
        let rest = iter.collect::<Result<Vec<_>, _>>().unwrap();
        assert_eq!(
            rest.iter().map(|r| r.key()).collect::<Vec<_>>(),
            vec![RecordKey::github_version("n", "c")]
        );
    }

    #[test]
    fn pending_yields_current_slot_of_buffered_record() {
        let s = store();
        s.record_observation(&slot("metaplex", "devnet", 10)).unwrap();
        s.record_observation(&slot("metaplex", "testnet", 20)).unwrap();
        let mut iter = s.pending_unnotified(RecordKind::Program);
        iter.next().unwrap().unwrap();

        s.record_observation(&slot("metaplex", "testnet", 25)).unwrap();
        match iter.next().unwrap().unwrap() {
            StoredRecord::Program(record) => assert_eq!(record.last_slot, 25),
            other => panic!("unexpected record {other:?}"),
        }
        assert!(iter.next().is_none());
    }

    #[test]
    fn rejected_insert_surfaces_constraint_violation() {
        let s = store();
        s.lock()
            .execute_batch(
                r#"
CREATE TRIGGER reject_yanked BEFORE INSERT ON github_versions
WHEN NEW.version = 'yanked'
BEGIN
    SELECT RAISE(ABORT, 'yanked tags are not tracked');
END;
"#,
            )
            .unwrap();

        let err = s.record_observation(&tag("spl", "yanked")).unwrap_err();
        assert!(matches!(err, StoreError::ConstraintViolation(_)));
        assert!(s
            .get(&RecordKey::github_version("spl", "yanked"))
            .unwrap()
            .is_none());
        assert!(s.record_observation(&tag("spl", "v1.0.0")).unwrap());
    }

    #[test]
    fn pending_is_restartable_and_scoped_by_kind() {
        let s = store();
        s.record_observation(&slot("metaplex", "devnet", 1)).unwrap();
        s.record_observation(&tag("solana", "v1.0.0")).unwrap();

        assert_eq!(s.pending_unnotified(RecordKind::Program).count(), 1);
        s.mark_notified(&RecordKey::program("metaplex", "devnet")).unwrap();
        assert_eq!(s.pending_unnotified(RecordKind::Program).count(), 0);
        assert_eq!(s.pending_unnotified(RecordKind::GithubVersion).count(), 1);
        assert_eq!(s.pending_unnotified(RecordKind::SolanaCluster).count(), 0);
    }

    #[test]
    fn concurrent_inserts_through_shared_store_yield_one_row() {
        let s = Arc::new(store());
        let barrier = Arc::new(Barrier::new(8));
        let handles = (0..8)
            .map(|_| {
                let s = Arc::clone(&s);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    s.record_observation(&cluster("1.14.0", "mainnet-beta")).unwrap()
                })
            })
            .collect::<Vec<_>>();
        let new_count = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|inserted| *inserted)
            .count();
        assert_eq!(new_count, 1);
        assert_eq!(s.list(RecordKind::SolanaCluster).unwrap().len(), 1);
    }

    #[test]
    fn concurrent_inserts_across_connections_yield_one_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("versions.db");
        NotificationStore::open(&path, &StoreOptions::default())
            .unwrap()
            .close()
            .unwrap();

        let barrier = Arc::new(Barrier::new(4));
        let handles = (0..4)
            .map(|_| {
                let path = path.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let s = NotificationStore::open(&path, &StoreOptions::default()).unwrap();
                    barrier.wait();
                    let inserted = s
                        .record_observation(&cluster("1.14.0", "mainnet-beta"))
                        .unwrap();
                    s.close().unwrap();
                    inserted
                })
            })
            .collect::<Vec<_>>();
        let new_count = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|inserted| *inserted)
            .count();
        assert_eq!(new_count, 1);

        let s = NotificationStore::open(&path, &StoreOptions::default()).unwrap();
        assert_eq!(s.list(RecordKind::SolanaCluster).unwrap().len(), 1);
    }

    #[test]
    fn state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("versions.db");
        {
            let s = NotificationStore::open(&path, &StoreOptions::default()).unwrap();
            s.record_observation(&tag("metaplex", "v2.0.0")).unwrap();
            s.mark_notified(&RecordKey::github_version("metaplex", "v2.0.0"))
                .unwrap();
            s.close().unwrap();
        }
        let s = NotificationStore::open(&path, &StoreOptions::default()).unwrap();
        assert!(s
            .is_notified(&RecordKey::github_version("metaplex", "v2.0.0"))
            .unwrap());
        assert!(!s.record_observation(&tag("metaplex", "v2.0.0")).unwrap());
    }
}
