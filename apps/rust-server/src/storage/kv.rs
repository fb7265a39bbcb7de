// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! TTL-bearing key-value entries on top of redb.
//!
//! Each value is stored as `expires_at_ms (u64 BE) | payload`. Expiry is
//! passive: an entry whose deadline is at or before "now" reads as absent
//! and is physically removed only by [`TtlStore::purge_expired`].
//!
//! Multi-key writes go through [`KvBatch`], committed in a single write
//! transaction. A batch may carry expectations (compare-and-set guards);
//! if any expectation fails the transaction is aborted and nothing is
//! visible.

use std::sync::Arc;
use std::time::Duration;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction};

use super::{now_millis, StoreError, StoreResult};

const KV: TableDefinition<&str, &[u8]> = TableDefinition::new("kv");

const HEADER_LEN: usize = 8;

pub(crate) fn create_tables(txn: &WriteTransaction) -> Result<(), redb::TableError> {
    let _ = txn.open_table(KV)?;
    Ok(())
}

// =============================================================================
// Entry Encoding
// =============================================================================

fn deadline(ttl: Duration, now: i64) -> i64 {
    let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
    now.saturating_add(ttl_ms)
}

fn encode_entry(payload: &[u8], expires_at: i64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
    buf.extend_from_slice(&(expires_at.max(0) as u64).to_be_bytes());
    buf.extend_from_slice(payload);
    buf
}

/// Split a stored entry into `(expires_at, payload)`.
fn decode_entry(raw: &[u8]) -> Option<(i64, &[u8])> {
    if raw.len() < HEADER_LEN {
        return None;
    }
    let (header, payload) = raw.split_at(HEADER_LEN);
    let expires_at = u64::from_be_bytes(header.try_into().ok()?);
    Some((i64::try_from(expires_at).unwrap_or(i64::MAX), payload))
}

fn live_payload(raw: &[u8], now: i64) -> Option<Vec<u8>> {
    match decode_entry(raw) {
        Some((expires_at, payload)) if expires_at > now => Some(payload.to_vec()),
        _ => None,
    }
}

fn read_live<T>(table: &T, key: &str, now: i64) -> StoreResult<Option<Vec<u8>>>
where
    T: ReadableTable<&'static str, &'static [u8]>,
{
    Ok(table
        .get(key)?
        .and_then(|guard| live_payload(guard.value(), now)))
}

// =============================================================================
// Batch
// =============================================================================

#[derive(Debug, Clone)]
enum KvOp {
    Set {
        key: String,
        value: Vec<u8>,
        ttl: Duration,
    },
    Delete {
        key: String,
    },
}

/// An all-or-nothing group of writes, optionally guarded by expectations.
#[derive(Debug, Clone, Default)]
pub struct KvBatch {
    expectations: Vec<(String, Vec<u8>)>,
    ops: Vec<KvOp>,
}

impl KvBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `key` to currently hold `value` (and be unexpired).
    pub fn expect(mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.expectations.push((key.into(), value.into()));
        self
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<Vec<u8>>, ttl: Duration) -> Self {
        self.ops.push(KvOp::Set {
            key: key.into(),
            value: value.into(),
            ttl,
        });
        self
    }

    pub fn delete(mut self, key: impl Into<String>) -> Self {
        self.ops.push(KvOp::Delete { key: key.into() });
        self
    }
}

// =============================================================================
// TtlStore
// =============================================================================

/// TTL key-value store sharing the application's redb database.
#[derive(Clone)]
pub struct TtlStore {
    db: Arc<Database>,
}

impl TtlStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Read a live value. Expired entries read as `None`.
    pub fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(KV)?;
        read_live(&table, key, now_millis())
    }

    pub fn set(&self, key: &str, value: &[u8], ttl: Duration) -> StoreResult<()> {
        self.commit(KvBatch::new().set(key, value, ttl))
    }

    /// Apply a batch atomically.
    ///
    /// # Errors
    /// `StoreError::PreconditionFailed` if any expectation does not hold; in
    /// that case the transaction is aborted and no operation is applied.
    pub fn commit(&self, batch: KvBatch) -> StoreResult<()> {
        let now = now_millis();
        let write_txn = self.db.begin_write()?;

        let failed = {
            let mut table = write_txn.open_table(KV)?;

            let mut failed = None;
            for (key, expected) in &batch.expectations {
                let current = read_live(&table, key, now)?;
                if current.as_deref() != Some(expected.as_slice()) {
                    failed = Some(key.clone());
                    break;
                }
            }

            if failed.is_none() {
                for op in &batch.ops {
                    match op {
                        KvOp::Set { key, value, ttl } => {
                            let entry = encode_entry(value, deadline(*ttl, now));
                            table.insert(key.as_str(), entry.as_slice())?;
                        }
                        KvOp::Delete { key } => {
                            table.remove(key.as_str())?;
                        }
                    }
                }
            }
            failed
        };

        if let Some(key) = failed {
            write_txn.abort()?;
            return Err(StoreError::PreconditionFailed(key));
        }

        write_txn.commit()?;
        Ok(())
    }

    /// Physically delete entries whose TTL has lapsed. Returns the count.
    pub fn purge_expired(&self) -> StoreResult<usize> {
        let now = now_millis();
        let write_txn = self.db.begin_write()?;
        let purged = {
            let mut table = write_txn.open_table(KV)?;
            let mut expired = Vec::new();
            for entry in table.iter()? {
                let (key, value) = entry?;
                if live_payload(value.value(), now).is_none() {
                    expired.push(key.value().to_string());
                }
            }
            for key in &expired {
                table.remove(key.as_str())?;
            }
            expired.len()
        };
        write_txn.commit()?;
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_support::temp_database;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn set_and_get_roundtrip() {
        let (db, _dir) = temp_database();
        let kv = TtlStore::new(db);

        kv.set("session:abc", b"payload", HOUR).unwrap();
        assert_eq!(kv.get("session:abc").unwrap(), Some(b"payload".to_vec()));
        assert_eq!(kv.get("session:missing").unwrap(), None);
    }

    #[test]
    fn zero_ttl_entries_read_as_absent() {
        let (db, _dir) = temp_database();
        let kv = TtlStore::new(db);

        kv.set("refresh:old", b"sess", Duration::ZERO).unwrap();
        assert_eq!(kv.get("refresh:old").unwrap(), None);
    }

    #[test]
    fn batch_applies_all_operations() {
        let (db, _dir) = temp_database();
        let kv = TtlStore::new(db);
        kv.set("refresh:old", b"s1", HOUR).unwrap();

        let batch = KvBatch::new()
            .expect("refresh:old", b"s1".to_vec())
            .set("session:s1", b"record".to_vec(), HOUR)
            .set("refresh:new", b"s1".to_vec(), HOUR)
            .delete("refresh:old");
        kv.commit(batch).unwrap();

        assert_eq!(kv.get("session:s1").unwrap(), Some(b"record".to_vec()));
        assert_eq!(kv.get("refresh:new").unwrap(), Some(b"s1".to_vec()));
        assert_eq!(kv.get("refresh:old").unwrap(), None);
    }

    #[test]
    fn failed_expectation_applies_nothing() {
        let (db, _dir) = temp_database();
        let kv = TtlStore::new(db);
        kv.set("refresh:old", b"other-session", HOUR).unwrap();

        let batch = KvBatch::new()
            .expect("refresh:old", b"s1".to_vec())
            .set("refresh:new", b"s1".to_vec(), HOUR)
            .delete("refresh:old");

        let err = kv.commit(batch).unwrap_err();
        assert!(matches!(err, StoreError::PreconditionFailed(key) if key == "refresh:old"));

        assert_eq!(kv.get("refresh:new").unwrap(), None);
        assert_eq!(kv.get("refresh:old").unwrap(), Some(b"other-session".to_vec()));
    }

    #[test]
    fn expectation_on_expired_entry_fails() {
        let (db, _dir) = temp_database();
        let kv = TtlStore::new(db);
        kv.set("refresh:old", b"s1", Duration::ZERO).unwrap();

        let batch = KvBatch::new()
            .expect("refresh:old", b"s1".to_vec())
            .delete("refresh:old");
        assert!(matches!(
            kv.commit(batch),
            Err(StoreError::PreconditionFailed(_))
        ));
    }

    #[test]
    fn purge_removes_only_expired_entries() {
        let (db, _dir) = temp_database();
        let kv = TtlStore::new(db);
        kv.set("live", b"1", HOUR).unwrap();
        kv.set("dead-1", b"2", Duration::ZERO).unwrap();
        kv.set("dead-2", b"3", Duration::ZERO).unwrap();

        assert_eq!(kv.purge_expired().unwrap(), 2);
        assert_eq!(kv.purge_expired().unwrap(), 0);
        assert_eq!(kv.get("live").unwrap(), Some(b"1".to_vec()));
    }

    #[test]
    fn decode_rejects_truncated_entries() {
        assert!(decode_entry(&[0u8; 3]).is_none());
        let encoded = encode_entry(b"x", 42);
        assert_eq!(decode_entry(&encoded), Some((42, b"x".as_slice())));
    }
}
