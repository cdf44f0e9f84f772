//! # StashKV
//!
//! An embedded, single-file object store with:
//! - Arbitrary structured values (including registered user types)
//! - Per-entry time-to-live with lazy and eager expiry
//! - An append-only, checksummed record log with crash recovery
//! - Compaction with atomic file replacement
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Embedding Application                   │
//! │        (optionally driving a MaintenanceWorker timer)       │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                        Store Facade                         │
//! │               (one Mutex over log + index)                  │
//! └──────┬──────────────┬──────────────┬──────────────┬─────────┘
//!        │              │              │              │
//!        ▼              ▼              ▼              ▼
//!  ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌────────────┐
//!  │   Codec   │  │ RecordLog │  │ KeyIndex  │  │ Compactor  │
//!  │ (Value +  │  │ (append + │  │ (key ->   │  │ (rewrite + │
//!  │ registry) │  │  replay)  │  │  offset)  │  │  rename)   │
//!  └───────────┘  └───────────┘  └─────┬─────┘  └────────────┘
//!                                      │
//!                                      ▼
//!                               ┌────────────┐
//!                               │   Expiry   │
//!                               │ (TTL math) │
//!                               └────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use std::time::Duration;
//! use stashkv::Store;
//!
//! # fn main() -> stashkv::Result<()> {
//! let store = Store::open_path("./data/stash.db")?;
//! store.put("greeting", "hello", None)?;
//! store.put("session", vec![1i64, 2, 3], Some(Duration::from_secs(30)))?;
//!
//! let greeting: Option<String> = store.get("greeting")?;
//! assert_eq!(greeting.as_deref(), Some("hello"));
//!
//! store.close()?;
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod clock;
pub mod config;
pub mod error;

pub mod codec;
pub mod compaction;
pub mod expiry;
pub mod index;
pub mod log;
pub mod maintenance;
pub mod store;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::{FromValue, PersistObject, ToValue, Value};
pub use compaction::CompactionStats;
pub use config::{Config, ConfigBuilder};
pub use error::{Result, StashError};
pub use maintenance::MaintenanceWorker;
pub use store::{Store, StoreStats};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of StashKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
