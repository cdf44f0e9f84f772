//! In-Memory Index Module
//!
//! Maps each live key to the location of its most recent record.
//!
//! ## Responsibilities
//! - O(1) lookup from key to record offset
//! - Rebuilt by replaying the log at open time (never persisted)
//! - Last-write-wins by log order; tombstones remove keys
//!
//! ## Data Structure Choice
//! A plain `HashMap` owned by the store. The store's single lock serialises
//! every mutation together with its log append, so the table needs no
//! internal synchronisation.

mod table;

pub use table::KeyIndex;

/// Location and expiry of a key's latest live record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// Byte offset of the record's frame in the store file
    pub offset: u64,

    /// Frame length in bytes
    pub len: u32,

    /// Absolute expiry instant (unix millis); `None` never expires
    pub expires_at: Option<u64>,
}
