//! Record Log Module
//!
//! The append-only store file: the single durable source of truth.
//!
//! ## Responsibilities
//! - Append records, fsynced before the append returns
//! - CRC32 checksums for corruption detection
//! - Random reads of one record at a known offset
//! - Sequential replay and crash recovery at open time
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ Header (6 bytes)                                            │
//! │   Magic: "STKV" (4) | Version: u16 (2)                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Record 1                                                    │
//! │ ┌──────────┬─────────┬────────────────────────────────────┐ │
//! │ │ Len (4)  │ CRC (4) │ Body                               │ │
//! │ └──────────┴─────────┴────────────────────────────────────┘ │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Record 2 ...                                                │
//! └─────────────────────────────────────────────────────────────┘
//!
//! Body: [KeyLen u32][Key][Tag u8][ValLen u32][Value]
//!       [CreatedAt u64][TTL u64 (u64::MAX = none)][Tombstone u8]
//! ```
//! A record's offset is also its recency: later offsets supersede earlier ones.

mod reader;
mod record;
mod recovery;
mod writer;

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

pub use reader::{LogReader, RecordIter};
pub use record::Record;
pub use recovery::{LogRecovery, RecoveryResult};
pub use writer::LogWriter;

use crate::error::{Result, StashError};

// =============================================================================
// Shared Constants
// =============================================================================

/// Magic bytes identifying a StashKV store file
pub const MAGIC: &[u8; 4] = b"STKV";

/// Current store file format version
pub const FORMAT_VERSION: u16 = 1;

/// File header size: Magic (4) + Version (2)
pub const FILE_HEADER_SIZE: u64 = 6;

/// Frame header size: BodyLen (4) + CRC (4)
pub const FRAME_HEADER_SIZE: usize = 8;

/// Largest body a single record may declare (128 MB)
pub const MAX_RECORD_SIZE: u64 = 128 * 1024 * 1024;

/// TTL sentinel meaning "never expires"
pub const NO_TTL: u64 = u64::MAX;

// =============================================================================
// Record Log
// =============================================================================

/// The store file, opened for appends and positioned reads
pub struct RecordLog {
    path: PathBuf,
    writer: LogWriter,
    reader: LogReader,
}

impl RecordLog {
    /// Open or create the store file
    ///
    /// A missing file, an empty file, or a file cut off inside its header is
    /// (re)initialised with a fresh header. A complete header with the wrong
    /// magic or an unknown version is `CorruptLog`.
    pub fn open(path: &Path) -> Result<Self> {
        ensure_header(path)?;

        let writer = LogWriter::open(path)?;
        let reader = LogReader::open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            writer,
            reader,
        })
    }

    /// Create a fresh, empty log at `path`, replacing any existing file
    pub fn create(path: &Path) -> Result<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        write_header(&mut file)?;
        file.sync_all()?;
        drop(file);

        Self::open(path)
    }

    /// Append a record; returns the offset at which it begins
    ///
    /// The write is on stable storage when this returns.
    pub fn append(&mut self, record: &Record) -> Result<u64> {
        self.writer.append(record)
    }

    /// Read and parse exactly one record at `offset`
    pub fn read_at(&mut self, offset: u64) -> Result<Record> {
        self.reader.read_at(offset, self.writer.len())
    }

    /// Lazily iterate all records in log order
    pub fn replay(&mut self) -> Result<RecordIter<'_>> {
        let end = self.writer.len();
        self.reader.iter_from(FILE_HEADER_SIZE, end)
    }

    /// Drop everything from `len` onwards (torn tail removal)
    pub fn truncate_to(&mut self, len: u64) -> Result<()> {
        self.writer.truncate_to(len)
    }

    /// Force buffered state to disk
    pub fn sync(&mut self) -> Result<()> {
        self.writer.sync()
    }

    /// Current file length in bytes (header included)
    pub fn len(&self) -> u64 {
        self.writer.len()
    }

    /// True when the log holds no records
    pub fn is_empty(&self) -> bool {
        self.writer.len() <= FILE_HEADER_SIZE
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record that the underlying file has been renamed to `path`
    pub(crate) fn relocate(&mut self, path: PathBuf) {
        self.path = path;
    }
}

/// Write the file header at the current position
pub(crate) fn write_header(file: &mut impl Write) -> Result<()> {
    file.write_all(MAGIC)?;
    file.write_all(&FORMAT_VERSION.to_le_bytes())?;
    Ok(())
}

/// Check a header already read from disk
pub(crate) fn validate_header(header: &[u8; FILE_HEADER_SIZE as usize]) -> Result<()> {
    if &header[0..4] != MAGIC {
        return Err(StashError::CorruptLog(format!(
            "invalid magic: expected STKV, got {:?}",
            &header[0..4]
        )));
    }

    let version = u16::from_le_bytes([header[4], header[5]]);
    if version != FORMAT_VERSION {
        return Err(StashError::CorruptLog(format!(
            "unsupported format version: {}",
            version
        )));
    }

    Ok(())
}

fn ensure_header(path: &Path) -> Result<()> {
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(path)?;

    let len = file.metadata()?.len();
    if len < FILE_HEADER_SIZE {
        // Nothing durable can precede a complete header
        if len > 0 {
            tracing::warn!(path = %path.display(), len, "discarding torn file header");
        }
        file.set_len(0)?;
        write_header(&mut file)?;
        file.sync_all()?;
        return Ok(());
    }

    let mut header = [0u8; FILE_HEADER_SIZE as usize];
    file.read_exact(&mut header)?;
    validate_header(&header)
}

/// Open `path` read-only and check its header
pub(crate) fn open_for_scan(path: &Path) -> Result<(File, u64)> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    if len < FILE_HEADER_SIZE {
        return Err(StashError::CorruptLog(format!(
            "file of {} bytes has no complete header",
            len
        )));
    }

    let mut header = [0u8; FILE_HEADER_SIZE as usize];
    file.read_exact(&mut header)?;
    validate_header(&header)?;

    Ok((file, len))
}
