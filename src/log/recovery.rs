//! Log Recovery
//!
//! Replays the store file at open time and handles a torn final record.

use std::path::Path;

use crate::error::Result;

use super::{open_for_scan, LogReader, Record, RecordLog, FILE_HEADER_SIZE};

/// Handles log replay after a restart or crash
pub struct LogRecovery;

/// Result of a recovery scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of records successfully replayed
    pub records_recovered: u64,

    /// Bytes of the file holding the header and intact records
    pub valid_len: u64,

    /// Whether a torn final record was found (and, on open, removed)
    pub was_truncated: bool,
}

impl LogRecovery {
    /// Replay every record in `log`, in log order, through `visit`
    ///
    /// This will:
    /// 1. Read records sequentially from the header onwards
    /// 2. Stop at a torn final record and truncate the file before it
    /// 3. Fail with `CorruptLog` if damage is followed by intact records
    pub fn recover<F>(log: &mut RecordLog, mut visit: F) -> Result<RecoveryResult>
    where
        F: FnMut(u64, Record),
    {
        let mut records_recovered = 0u64;

        let (valid_len, torn_tail) = {
            let mut records = log.replay()?;
            for item in records.by_ref() {
                let (offset, record) = item?;
                visit(offset, record);
                records_recovered += 1;
            }
            (records.position(), records.torn_tail())
        };

        if let Some(offset) = torn_tail {
            tracing::warn!(
                path = %log.path().display(),
                offset,
                discarded = log.len() - offset,
                "discarding torn record at end of log"
            );
            log.truncate_to(offset)?;
        }

        Ok(RecoveryResult {
            records_recovered,
            valid_len,
            was_truncated: torn_tail.is_some(),
        })
    }

    /// Scan a store file without modifying it
    pub fn verify(path: &Path) -> Result<RecoveryResult> {
        let len = std::fs::metadata(path)?.len();
        if len < FILE_HEADER_SIZE {
            return Ok(RecoveryResult {
                records_recovered: 0,
                valid_len: 0,
                was_truncated: len > 0,
            });
        }

        let (file, len) = open_for_scan(path)?;
        let mut reader = LogReader::from_file(file);

        let mut records = reader.iter_from(FILE_HEADER_SIZE, len)?;
        let mut records_recovered = 0u64;
        for item in records.by_ref() {
            item?;
            records_recovered += 1;
        }

        Ok(RecoveryResult {
            records_recovered,
            valid_len: records.position(),
            was_truncated: records.torn_tail().is_some(),
        })
    }
}
