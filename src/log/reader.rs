//! Log Reader
//!
//! Positioned reads of single records and lazy sequential replay.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{Result, StashError};

use super::{Record, FRAME_HEADER_SIZE, MAX_RECORD_SIZE};

/// Reads records from the store file
pub struct LogReader {
    file: BufReader<File>,
}

impl LogReader {
    /// Open the store file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::from_file(file))
    }

    pub(crate) fn from_file(file: File) -> Self {
        Self {
            file: BufReader::new(file),
        }
    }

    /// Seek to `offset` and parse exactly one record
    ///
    /// `end` is the logical end of the log; a frame reaching past it is
    /// `CorruptRecord`.
    pub fn read_at(&mut self, offset: u64, end: u64) -> Result<Record> {
        self.file.seek(SeekFrom::Start(offset))?;

        match read_frame(&mut self.file, offset, end)? {
            FrameRead::Complete(frame) => Record::deserialize(&frame),
            FrameRead::Incomplete => Err(StashError::CorruptRecord(format!(
                "record at offset {} extends past end of log ({})",
                offset, end
            ))),
        }
    }

    /// Iterate records in `[start, end)` in log order
    pub fn iter_from(&mut self, start: u64, end: u64) -> Result<RecordIter<'_>> {
        self.file.seek(SeekFrom::Start(start))?;

        Ok(RecordIter {
            file: &mut self.file,
            pos: start,
            end,
            torn_tail: None,
            done: false,
        })
    }
}

// =============================================================================
// Replay Iterator
// =============================================================================

/// Lazy iterator over `(offset, record)` pairs
///
/// A damaged record at the very end of the log is a torn write: iteration
/// stops there and [`RecordIter::torn_tail`] reports its offset. A damaged
/// record followed by any intact record yields `CorruptLog`.
pub struct RecordIter<'a> {
    file: &'a mut BufReader<File>,
    pos: u64,
    end: u64,
    torn_tail: Option<u64>,
    done: bool,
}

impl RecordIter<'_> {
    /// Offset where a torn tail begins, once iteration has reached it
    pub fn torn_tail(&self) -> Option<u64> {
        self.torn_tail
    }

    /// Offset just past the last record yielded so far
    pub fn position(&self) -> u64 {
        self.pos
    }

    fn next_record(&mut self) -> Result<Option<(u64, Record)>> {
        if self.pos >= self.end {
            return Ok(None);
        }

        let offset = self.pos;
        let frame = match read_frame(self.file, offset, self.end)? {
            FrameRead::Complete(frame) => frame,
            FrameRead::Incomplete => return self.damaged_at(offset, "incomplete frame"),
        };

        match Record::deserialize(&frame) {
            Ok(record) => {
                self.pos += frame.len() as u64;
                Ok(Some((offset, record)))
            }
            Err(e) => self.damaged_at(offset, &e.to_string()),
        }
    }

    /// Classify damage at `offset` as a torn tail or mid-log corruption
    fn damaged_at(&mut self, offset: u64, reason: &str) -> Result<Option<(u64, Record)>> {
        match find_valid_frame(self.file, offset + 1, self.end)? {
            Some(next) => Err(StashError::CorruptLog(format!(
                "damaged record at offset {} ({}) is followed by a valid record at offset {}",
                offset, reason, next
            ))),
            None => {
                self.torn_tail = Some(offset);
                Ok(None)
            }
        }
    }
}

impl Iterator for RecordIter<'_> {
    type Item = Result<(u64, Record)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let item = self.next_record().transpose();
        if !matches!(item, Some(Ok(_))) {
            self.done = true;
        }
        item
    }
}

// =============================================================================
// Frame Helpers
// =============================================================================

enum FrameRead {
    Complete(Vec<u8>),
    Incomplete,
}

/// Read one frame starting at the current position (`offset`)
fn read_frame(file: &mut BufReader<File>, offset: u64, end: u64) -> Result<FrameRead> {
    let available = end.saturating_sub(offset);
    if available < FRAME_HEADER_SIZE as u64 {
        return Ok(FrameRead::Incomplete);
    }

    let mut header = [0u8; FRAME_HEADER_SIZE];
    file.read_exact(&mut header)?;

    let body_len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as u64;
    if body_len > MAX_RECORD_SIZE || available < FRAME_HEADER_SIZE as u64 + body_len {
        return Ok(FrameRead::Incomplete);
    }

    let mut frame = vec![0u8; FRAME_HEADER_SIZE + body_len as usize];
    frame[..FRAME_HEADER_SIZE].copy_from_slice(&header);
    file.read_exact(&mut frame[FRAME_HEADER_SIZE..])?;

    Ok(FrameRead::Complete(frame))
}

/// Bytes of candidate start positions examined per window
const SCAN_WINDOW: usize = 64 * 1024;

/// Search `[from, end)` for the start of any intact frame
///
/// Only runs when replay hits damage. The region is scanned one window at a
/// time; a candidate frame that runs past its window is checksummed straight
/// from the file, so memory stays bounded however large the region is.
fn find_valid_frame(file: &mut BufReader<File>, from: u64, end: u64) -> Result<Option<u64>> {
    let mut window_start = from;

    while window_start < end {
        // Each window overlaps the next by one frame header
        let window_len = (end - window_start).min((SCAN_WINDOW + FRAME_HEADER_SIZE) as u64);
        let mut window = vec![0u8; window_len as usize];
        file.seek(SeekFrom::Start(window_start))?;
        file.read_exact(&mut window)?;

        let candidates = window.len().min(SCAN_WINDOW);
        for start in 0..candidates {
            let rest = &window[start..];
            if rest.len() < FRAME_HEADER_SIZE {
                return Ok(None);
            }

            let body_len = u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]) as u64;
            let stored_crc = u32::from_le_bytes([rest[4], rest[5], rest[6], rest[7]]);
            let candidate = window_start + start as u64;
            let frame_len = FRAME_HEADER_SIZE as u64 + body_len;
            if body_len > MAX_RECORD_SIZE || candidate + frame_len > end {
                continue;
            }

            let intact = if frame_len <= rest.len() as u64 {
                Record::deserialize(&rest[..frame_len as usize]).is_ok()
            } else {
                frame_intact_on_disk(file, candidate, body_len, stored_crc)?
            };
            if intact {
                return Ok(Some(candidate));
            }
        }

        window_start += candidates as u64;
    }

    Ok(None)
}

/// Check a frame too large for the scan window
///
/// The body is streamed through the CRC first; only a matching checksum
/// pays for reading the whole frame to parse it.
fn frame_intact_on_disk(
    file: &mut BufReader<File>,
    offset: u64,
    body_len: u64,
    stored_crc: u32,
) -> Result<bool> {
    file.seek(SeekFrom::Start(offset + FRAME_HEADER_SIZE as u64))?;

    let mut hasher = crc32fast::Hasher::new();
    let mut chunk = vec![0u8; SCAN_WINDOW];
    let mut remaining = body_len;
    while remaining > 0 {
        let n = remaining.min(SCAN_WINDOW as u64) as usize;
        file.read_exact(&mut chunk[..n])?;
        hasher.update(&chunk[..n]);
        remaining -= n as u64;
    }
    if hasher.finalize() != stored_crc {
        return Ok(false);
    }

    file.seek(SeekFrom::Start(offset))?;
    let mut frame = vec![0u8; FRAME_HEADER_SIZE + body_len as usize];
    file.read_exact(&mut frame)?;
    Ok(Record::deserialize(&frame).is_ok())
}
