//! Expiration Manager
//!
//! Decides liveness with respect to time.
//!
//! - Lazy expiry: `get` consults [`is_expired`] and reports an expired key as
//!   absent without touching the index or the log.
//! - Eager expiry: `cleanup` uses [`collect_expired`] to find every expired
//!   key, then tombstones and unindexes each one.
//!
//! Superseded records never reach this module; only the index's current
//! entries are considered.

use std::time::Duration;

use crate::index::{IndexEntry, KeyIndex};

/// Absolute expiry instant for a record created at `created_at` with `ttl_ms`
pub fn expires_at(created_at: u64, ttl_ms: u64) -> u64 {
    created_at.saturating_add(ttl_ms)
}

/// True iff the entry has a TTL and `now >= created_at + ttl`
pub fn is_expired(entry: &IndexEntry, now: u64) -> bool {
    match entry.expires_at {
        Some(deadline) => now >= deadline,
        None => false,
    }
}

/// Time left before the entry expires
///
/// `None` if it never expires; `Some(Duration::ZERO)` once expired.
pub fn remaining(entry: &IndexEntry, now: u64) -> Option<Duration> {
    entry
        .expires_at
        .map(|deadline| Duration::from_millis(deadline.saturating_sub(now)))
}

/// Keys whose current entry has expired as of `now`, oldest record first
pub fn collect_expired(index: &KeyIndex, now: u64) -> Vec<Vec<u8>> {
    index
        .entries_by_offset()
        .into_iter()
        .filter(|(_, entry)| is_expired(entry, now))
        .map(|(key, _)| key.to_vec())
        .collect()
}
