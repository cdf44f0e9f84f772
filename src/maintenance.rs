//! Maintenance Worker
//!
//! The store never schedules work on its own. `MaintenanceWorker` is the
//! caller-owned timer that turns the config's interval hints into periodic
//! `cleanup()` and `compact()` calls.
//!
//! ```text
//!   tick(cleanup_interval) ───┐
//!                             ├──► select! ──► store.cleanup() / store.compact()
//!   tick(compaction_interval) ┤
//!                             │
//!   shutdown (bounded(0)) ────┘──► exit
//! ```
//!
//! A missing hint uses a `never()` channel, which disables that job.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};

use crate::error::{Result, StashError};
use crate::store::Store;

/// Handle to a running maintenance thread
///
/// Dropping the handle stops the thread and waits for it.
pub struct MaintenanceWorker {
    shutdown_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl MaintenanceWorker {
    /// Start the worker for `store` using its config's interval hints
    ///
    /// Returns `Ok(None)` when neither hint is set.
    pub fn spawn(store: Arc<Store>) -> Result<Option<Self>> {
        let cleanup_every = store.config().cleanup_interval;
        let compact_every = store.config().compaction_interval;

        if cleanup_every.is_none() && compact_every.is_none() {
            return Ok(None);
        }

        let (shutdown_tx, shutdown_rx) = channel::bounded::<()>(0);

        let handle = thread::Builder::new()
            .name("stashkv-maintenance".to_string())
            .spawn(move || run(store, cleanup_every, compact_every, shutdown_rx))?;

        tracing::info!(
            cleanup_interval = ?cleanup_every,
            compaction_interval = ?compact_every,
            "maintenance worker started"
        );

        Ok(Some(Self {
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }))
    }

    /// Stop the worker and wait for an in-flight pass to finish
    pub fn stop(&mut self) {
        // Dropping the sender disconnects the shutdown channel
        self.shutdown_tx.take();

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("maintenance thread panicked");
            }
        }
    }

    /// Whether the thread is still running
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map_or(false, |handle| !handle.is_finished())
    }
}

impl Drop for MaintenanceWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

enum Job {
    Stop,
    Cleanup,
    Compact,
}

fn ticker(every: Option<Duration>) -> Receiver<std::time::Instant> {
    match every {
        Some(interval) => channel::tick(interval),
        None => channel::never(),
    }
}

fn run(
    store: Arc<Store>,
    cleanup_every: Option<Duration>,
    compact_every: Option<Duration>,
    shutdown_rx: Receiver<()>,
) {
    let cleanup_tick = ticker(cleanup_every);
    let compact_tick = ticker(compact_every);

    loop {
        let job = crossbeam::select! {
            recv(shutdown_rx) -> _ => Job::Stop,
            recv(cleanup_tick) -> _ => Job::Cleanup,
            recv(compact_tick) -> _ => Job::Compact,
        };

        let outcome = match job {
            Job::Stop => break,
            Job::Cleanup => store.cleanup().map(|removed| {
                tracing::debug!(removed, "scheduled cleanup");
            }),
            Job::Compact => store.compact().map(|stats| {
                tracing::debug!(bytes_after = stats.bytes_after, "scheduled compaction");
            }),
        };

        match outcome {
            Ok(()) => {}
            Err(StashError::Closed) => {
                tracing::debug!("store closed, maintenance worker exiting");
                break;
            }
            Err(e) => tracing::warn!(error = %e, "maintenance pass failed"),
        }
    }

    tracing::info!("maintenance worker stopped");
}
