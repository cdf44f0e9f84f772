//! Store Module
//!
//! The public facade that owns the store file and the index and coordinates
//! the codec, log, expiry and compaction components.
//!
//! ## Responsibilities
//! - Canonicalise keys (text and byte-string keys with equal bytes are one key)
//! - Append-then-index for every mutation, under one lock
//! - Lazy expiry on reads, eager expiry via `cleanup`
//! - Rebuild the index by replaying the log at open time

use std::any::Any;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};

use crate::codec::{self, FromValue, PersistObject, ToValue, TypeRegistry, Value};
use crate::compaction::{CompactionStats, Compactor};
use crate::config::Config;
use crate::error::{Result, StashError};
use crate::expiry;
use crate::index::{IndexEntry, KeyIndex};
use crate::log::{LogRecovery, Record, RecordLog, RecoveryResult, NO_TTL};

/// Log and index, always observed and mutated together
struct StoreState {
    log: RecordLog,
    index: KeyIndex,
}

/// Point-in-time store statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    /// Keys in the index, including expired ones not yet swept
    pub indexed_keys: usize,

    /// Indexed keys that have already expired
    pub expired_keys: usize,

    /// Store file size in bytes
    pub file_size: u64,

    /// Number of registered object types
    pub registered_types: usize,
}

/// An open object store backed by a single file
///
/// ## Concurrency Model: one lock for reads and writes
///
/// - `put` / `delete` / `cleanup` / `compact` hold `state` for the whole
///   append-and-index update (for `compact`, the whole rewrite and swap)
/// - `get` holds the same lock for the index lookup and the record read, so
///   it always sees a log and index that match
/// - Encoding runs before the lock is taken and decoding after it is released
///
/// `Store` is `Sync`; share it across threads behind an `Arc`.
pub struct Store {
    /// Store configuration
    config: Config,

    /// Log + index; `None` once closed
    state: Mutex<Option<StoreState>>,

    /// Factories for user-defined object types
    registry: RwLock<TypeRegistry>,
}

impl Store {
    /// Open or create a store with the given config
    ///
    /// On startup:
    /// 1. Create the parent directory and the file (with header) if missing
    /// 2. Replay the log, discarding a torn final record
    /// 3. Build the index from the replayed records
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut log = RecordLog::open(&config.path)?;
        let mut index = KeyIndex::new();
        let recovery: RecoveryResult =
            LogRecovery::recover(&mut log, |offset, record| index.apply(offset, record))?;

        tracing::info!(
            path = %config.path.display(),
            records = recovery.records_recovered,
            live_keys = index.len(),
            truncated = recovery.was_truncated,
            "store opened"
        );

        Ok(Self {
            config,
            state: Mutex::new(Some(StoreState { log, index })),
            registry: RwLock::new(TypeRegistry::new()),
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config for everything but the file path
    pub fn open_path(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open(Config::new(path))
    }

    /// Register a user-defined object type
    ///
    /// Objects of unregistered types are rejected by `put` with
    /// `UnsupportedType` and cannot be rebuilt by [`Store::get_object`].
    pub fn register<T>(&self)
    where
        T: PersistObject + Send + 'static,
    {
        self.registry.write().register::<T>();
    }

    /// Store `value` under `key`, superseding any previous value
    ///
    /// With `ttl`, the entry expires `ttl` after this call.
    pub fn put<V: ToValue>(
        &self,
        key: impl AsRef<[u8]>,
        value: V,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let key = key.as_ref();
        let value = value.to_value()?;
        let (tag, payload) = codec::encode(&value, &self.registry.read())?;
        let ttl_ms = ttl.map(ttl_to_millis);

        let mut guard = self.state.lock();
        let state = guard.as_mut().ok_or(StashError::Closed)?;

        let created_at = self.config.clock.now_millis();
        let record = Record::put(key.to_vec(), tag.as_byte(), payload, created_at, ttl_ms);

        let offset = state.log.append(&record)?;
        state.index.insert(
            record.key.clone(),
            IndexEntry {
                offset,
                len: record.frame_len() as u32,
                expires_at: record.expires_at(),
            },
        );

        Ok(())
    }

    /// Get the value under `key`
    ///
    /// Returns `Ok(None)` if the key is absent or expired. An expired entry
    /// is left in place for the next `cleanup`.
    pub fn get<T: FromValue>(&self, key: impl AsRef<[u8]>) -> Result<Option<T>> {
        let key = key.as_ref();

        let record = {
            let mut guard = self.state.lock();
            let state = guard.as_mut().ok_or(StashError::Closed)?;

            let entry = match state.index.get(key) {
                Some(entry) => *entry,
                None => return Ok(None),
            };
            if expiry::is_expired(&entry, self.config.clock.now_millis()) {
                return Ok(None);
            }

            state.log.read_at(entry.offset)?
        };

        if record.key != key || record.tombstone {
            return Err(StashError::CorruptRecord(format!(
                "index entry for {:?} points at a foreign record",
                String::from_utf8_lossy(key)
            )));
        }

        let value = codec::decode(record.type_tag, &record.value)?;
        T::from_value(value).map(Some)
    }

    /// Get the value under `key` as a dynamic [`Value`]
    pub fn get_value(&self, key: impl AsRef<[u8]>) -> Result<Option<Value>> {
        self.get::<Value>(key)
    }

    /// Get an object through its registered factory
    ///
    /// The result can be downcast to the concrete registered type.
    pub fn get_object(&self, key: impl AsRef<[u8]>) -> Result<Option<Box<dyn Any + Send>>> {
        match self.get_value(key)? {
            Some(value) => self.registry.read().instantiate(value).map(Some),
            None => Ok(None),
        }
    }

    /// Whether `key` holds a live, unexpired value
    pub fn contains_key(&self, key: impl AsRef<[u8]>) -> Result<bool> {
        let guard = self.state.lock();
        let state = guard.as_ref().ok_or(StashError::Closed)?;
        let now = self.config.clock.now_millis();

        Ok(state
            .index
            .get(key.as_ref())
            .map_or(false, |entry| !expiry::is_expired(entry, now)))
    }

    /// Time left before `key` expires
    ///
    /// `None` if the key is absent, already expired, or has no TTL.
    pub fn ttl(&self, key: impl AsRef<[u8]>) -> Result<Option<Duration>> {
        let guard = self.state.lock();
        let state = guard.as_ref().ok_or(StashError::Closed)?;
        let now = self.config.clock.now_millis();

        Ok(state
            .index
            .get(key.as_ref())
            .filter(|entry| !expiry::is_expired(entry, now))
            .and_then(|entry| expiry::remaining(entry, now)))
    }

    /// Delete `key`
    ///
    /// Appends a tombstone and unindexes the key. Returns `true` if a live
    /// value was deleted; deleting an absent key is a no-op returning `false`.
    pub fn delete(&self, key: impl AsRef<[u8]>) -> Result<bool> {
        let key = key.as_ref();

        let mut guard = self.state.lock();
        let state = guard.as_mut().ok_or(StashError::Closed)?;

        let entry = match state.index.get(key) {
            Some(entry) => *entry,
            None => return Ok(false),
        };

        let now = self.config.clock.now_millis();
        state.log.append(&Record::tombstone(key.to_vec(), now))?;
        state.index.remove(key);

        Ok(!expiry::is_expired(&entry, now))
    }

    /// Purge every expired entry
    ///
    /// Each purged key is unindexed and tombstoned in the log so the deletion
    /// survives a reopen. Returns the number of entries removed by this call.
    pub fn cleanup(&self) -> Result<usize> {
        let mut guard = self.state.lock();
        let state = guard.as_mut().ok_or(StashError::Closed)?;

        let now = self.config.clock.now_millis();
        let expired = expiry::collect_expired(&state.index, now);

        let mut removed = 0;
        for key in expired {
            state.log.append(&Record::tombstone(key.clone(), now))?;
            state.index.remove(&key);
            removed += 1;
        }

        tracing::debug!(removed, remaining = state.index.len(), "cleanup finished");
        Ok(removed)
    }

    /// Rewrite the store file down to its live records
    ///
    /// Writes that arrive while compaction runs wait on the store lock and
    /// land in the new file.
    pub fn compact(&self) -> Result<CompactionStats> {
        let mut guard = self.state.lock();
        let state = guard.as_mut().ok_or(StashError::Closed)?;

        let now = self.config.clock.now_millis();
        let compacted = Compactor::run(&state.index, &mut state.log, now)?;

        state.log = compacted.log;
        state.index = compacted.index;

        let stats = compacted.stats;
        tracing::info!(
            live_records = stats.live_records,
            expired_dropped = stats.expired_dropped,
            bytes_before = stats.bytes_before,
            bytes_after = stats.bytes_after,
            "compaction finished"
        );

        Ok(stats)
    }

    /// Current statistics
    pub fn stats(&self) -> Result<StoreStats> {
        let registered_types = self.registry.read().len();

        let guard = self.state.lock();
        let state = guard.as_ref().ok_or(StashError::Closed)?;
        let now = self.config.clock.now_millis();

        Ok(StoreStats {
            indexed_keys: state.index.len(),
            expired_keys: state
                .index
                .iter()
                .filter(|(_, entry)| expiry::is_expired(entry, now))
                .count(),
            file_size: state.log.len(),
            registered_types,
        })
    }

    /// Number of indexed keys (expired-but-unswept included)
    pub fn len(&self) -> Result<usize> {
        let guard = self.state.lock();
        let state = guard.as_ref().ok_or(StashError::Closed)?;
        Ok(state.index.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Flush and release the store file
    ///
    /// Every later operation fails with `Closed`; closing again is a no-op.
    pub fn close(&self) -> Result<()> {
        let state = self.state.lock().take();

        if let Some(mut state) = state {
            state.log.sync()?;
            tracing::info!(path = %self.config.path.display(), "store closed");
        }

        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().is_none()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get the store file path
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if let Some(state) = self.state.get_mut().as_mut() {
            if let Err(e) = state.log.sync() {
                tracing::warn!(error = %e, "failed to sync store file on drop");
            }
        }
    }
}

/// TTL in millis, kept clear of the "no expiry" sentinel
fn ttl_to_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis())
        .unwrap_or(NO_TTL)
        .min(NO_TTL - 1)
}
