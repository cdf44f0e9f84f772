//! Compactor
//!
//! Rewrites the store file keeping exactly one record per live key.
//!
//! ## Algorithm
//! 1. Walk the index oldest-record-first, skipping entries already expired
//! 2. Copy each live record into `<file>.compact` (no tombstones, no
//!    superseded versions) and build the matching index
//! 3. fsync the new file, open handles on it, then `rename` it over the store
//!    file and fsync the directory
//!
//! The old file is never modified. Any failure before the rename removes the
//! temporary file and leaves the previous file and index in place. Once the
//! rename succeeds the compaction has committed and the new log is returned
//! even if the directory fsync then fails.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, StashError};
use crate::expiry;
use crate::index::{IndexEntry, KeyIndex};
use crate::log::{self, Record, RecordLog, FILE_HEADER_SIZE};

/// Outcome of one compaction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompactionStats {
    /// Records written to the new file
    pub live_records: u64,

    /// Expired entries dropped without a tombstone
    pub expired_dropped: u64,

    /// File size before compaction
    pub bytes_before: u64,

    /// File size after compaction
    pub bytes_after: u64,
}

/// A compacted log ready to replace the store's current one
pub struct Compacted {
    pub log: RecordLog,
    pub index: KeyIndex,
    pub stats: CompactionStats,
}

/// Rewrites a record log down to its live records
pub struct Compactor;

impl Compactor {
    /// Path of the temporary file written next to `path`
    pub fn temp_path(path: &Path) -> PathBuf {
        let mut name = OsString::from(path.as_os_str());
        name.push(".compact");
        PathBuf::from(name)
    }

    /// Compact `log` against `index` as of `now`
    ///
    /// On success the returned log already refers to the renamed file; the
    /// caller swaps it in together with the returned index.
    pub fn run(index: &KeyIndex, log: &mut RecordLog, now: u64) -> Result<Compacted> {
        Self::run_with(index, log, now, sync_parent_dir)
    }

    /// `run` with the directory fsync supplied by the caller
    fn run_with<S>(
        index: &KeyIndex,
        log: &mut RecordLog,
        now: u64,
        sync_dir: S,
    ) -> Result<Compacted>
    where
        S: FnOnce(&Path) -> Result<()>,
    {
        let target = log.path().to_path_buf();
        let temp = Self::temp_path(&target);

        let prepared = Self::prepare(index, log, &temp, now).and_then(|prepared| {
            fs::rename(&temp, &target)?;
            Ok(prepared)
        });

        let (mut new_log, index, stats) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                remove_temp(&temp);
                return Err(e);
            }
        };

        // Committed: the old file is unlinked, so the new log is returned regardless
        if let Err(e) = sync_dir(&target) {
            tracing::warn!(
                path = %target.display(),
                error = %e,
                "compacted file is in place but the directory fsync failed"
            );
        }
        new_log.relocate(target);

        Ok(Compacted {
            log: new_log,
            index,
            stats,
        })
    }

    /// Write and fsync the temporary file, then open handles on it
    fn prepare(
        index: &KeyIndex,
        log: &mut RecordLog,
        temp: &Path,
        now: u64,
    ) -> Result<(RecordLog, KeyIndex, CompactionStats)> {
        let bytes_before = log.len();

        let mut writer = CompactionWriter::new(temp)?;
        let mut expired_dropped = 0u64;

        for (key, entry) in index.entries_by_offset() {
            if expiry::is_expired(entry, now) {
                expired_dropped += 1;
                continue;
            }

            let record = log.read_at(entry.offset)?;
            if record.key != key {
                return Err(StashError::CorruptRecord(format!(
                    "index points at offset {} but the record there has a different key",
                    entry.offset
                )));
            }
            writer.add(&record, entry.expires_at)?;
        }

        let (new_index, live_records, bytes_after) = writer.finish()?;

        // Handles opened now follow the file through the rename
        let new_log = RecordLog::open(temp)?;

        Ok((
            new_log,
            new_index,
            CompactionStats {
                live_records,
                expired_dropped,
                bytes_before,
                bytes_after,
            },
        ))
    }
}

/// Remove a temporary file left by a failed compaction
fn remove_temp(temp: &Path) {
    // Anything other than a regular file was not written by us
    if !temp.is_file() {
        return;
    }

    if let Err(e) = fs::remove_file(temp) {
        tracing::warn!(
            path = %temp.display(),
            error = %e,
            "failed to remove temporary compaction file"
        );
    }
}

// =============================================================================
// Compaction Writer
// =============================================================================

/// Writes live records to a fresh log file and indexes them
struct CompactionWriter {
    writer: BufWriter<File>,
    index: KeyIndex,
    offset: u64,
    records: u64,
}

impl CompactionWriter {
    /// Create the temporary file and write its header
    fn new(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut writer = BufWriter::new(file);
        log::write_header(&mut writer)?;

        Ok(Self {
            writer,
            index: KeyIndex::new(),
            offset: FILE_HEADER_SIZE,
            records: 0,
        })
    }

    /// Copy one live record
    fn add(&mut self, record: &Record, expires_at: Option<u64>) -> Result<()> {
        let frame = record.serialize()?;
        self.writer.write_all(&frame)?;

        self.index.insert(
            record.key.clone(),
            IndexEntry {
                offset: self.offset,
                len: frame.len() as u32,
                expires_at,
            },
        );

        self.offset += frame.len() as u64;
        self.records += 1;
        Ok(())
    }

    /// Flush and fsync; returns the new index, record count and file size
    fn finish(mut self) -> Result<(KeyIndex, u64, u64)> {
        self.writer.flush()?;
        let file = self
            .writer
            .into_inner()
            .map_err(|e| StashError::Io(e.into_error()))?;
        file.sync_all()?;

        Ok((self.index, self.records, self.offset))
    }
}

/// Make a rename in `path`'s directory durable
fn sync_parent_dir(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        let parent = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        File::open(parent)?.sync_all()?;
    }
    #[cfg(not(unix))]
    let _ = path;

    Ok(())
}
