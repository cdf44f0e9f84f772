//! Log Writer
//!
//! Handles appending records to the store file.

use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::{Result, StashError};

use super::Record;

/// Appends records to the end of the store file
pub struct LogWriter {
    /// Write handle, always positioned at `len`
    file: File,

    /// Logical end of the log (next append offset)
    len: u64,

    /// Set when a failed append could not be rolled back; the file may hold
    /// a partial frame at `len` and the cursor position is unknown
    poisoned: bool,
}

impl LogWriter {
    /// Open an existing store file for appending
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = OpenOptions::new().write(true).open(path)?;
        let len = file.seek(SeekFrom::End(0))?;

        Ok(Self {
            file,
            len,
            poisoned: false,
        })
    }

    /// Append a record and fsync it
    ///
    /// Returns the byte offset where the record begins. If the write fails
    /// part-way, the file is cut back to its previous length so later appends
    /// never land behind a half-written frame. If that cut fails too, the
    /// writer refuses every further append until the log is reopened.
    pub fn append(&mut self, record: &Record) -> Result<u64> {
        if self.poisoned {
            return Err(StashError::Io(io::Error::new(
                io::ErrorKind::Other,
                "log writer is unusable after a failed rollback; reopen the store",
            )));
        }

        let frame = record.serialize()?;
        let offset = self.len;

        if let Err(e) = self
            .file
            .write_all(&frame)
            .and_then(|_| self.file.sync_data())
        {
            self.rollback(offset);
            return Err(e.into());
        }

        self.len += frame.len() as u64;
        tracing::trace!(offset, bytes = frame.len(), tombstone = record.tombstone, "appended record");

        Ok(offset)
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Truncate the file to `len` bytes and continue appending from there
    pub fn truncate_to(&mut self, len: u64) -> Result<()> {
        self.file.set_len(len)?;
        self.file.seek(SeekFrom::Start(len))?;
        self.file.sync_all()?;
        self.len = len;
        self.poisoned = false;
        Ok(())
    }

    /// Current length of the log in bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn rollback(&mut self, offset: u64) {
        let restored = self
            .file
            .set_len(offset)
            .and_then(|_| self.file.seek(SeekFrom::Start(offset)).map(|_| ()));

        if let Err(e) = restored {
            self.poisoned = true;
            tracing::error!(offset, error = %e, "failed to roll back partial append");
        }
    }
}
