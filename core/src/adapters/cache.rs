//! Short-lived cache for diagnostic command output.
//!
//! The cached value is an immutable snapshot swapped in whole, so a reader
//! never observes a half-written entry. Entries are never invalidated
//! explicitly; they expire by TTL and are recomputed on the next access.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::trace;

use crate::ports::{Clock, SystemClock};

/// Raw diagnostic output and the moment it was captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub raw: String,
    pub captured_at: Instant,
}

/// TTL-bounded cache of a single snapshot.
pub struct DiagnosticCache<C: Clock = SystemClock> {
    clock: C,
    ttl: Duration,
    entry: RwLock<Option<Arc<Snapshot>>>,
}

impl DiagnosticCache<SystemClock> {
    /// Create a cache on the system clock.
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, SystemClock)
    }
}

impl<C: Clock> DiagnosticCache<C> {
    /// Create a cache with an injected clock.
    pub fn with_clock(ttl: Duration, clock: C) -> Self {
        Self {
            clock,
            ttl,
            entry: RwLock::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The current snapshot, if it is still within its TTL.
    pub fn get(&self) -> Option<Arc<Snapshot>> {
        let now = self.clock.now();
        self.entry
            .read()
            .as_ref()
            .filter(|s| now.saturating_duration_since(s.captured_at) < self.ttl)
            .cloned()
    }

    /// Replace the snapshot.
    pub fn store(&self, raw: String) -> Arc<Snapshot> {
        let snapshot = Arc::new(Snapshot {
            raw,
            captured_at: self.clock.now(),
        });
        *self.entry.write() = Some(Arc::clone(&snapshot));
        snapshot
    }

    /// Return the fresh snapshot, or run `fetch` and cache its output.
    ///
    /// Failed fetches are not cached. Concurrent misses may each run `fetch`;
    /// the last one to finish wins.
    pub async fn get_or_refresh<F, Fut, E>(&self, fetch: F) -> Result<Arc<Snapshot>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, E>>,
    {
        if let Some(snapshot) = self.get() {
            trace!("Diagnostic cache hit");
            return Ok(snapshot);
        }

        trace!("Diagnostic cache miss");
        let raw = fetch().await?;
        Ok(self.store(raw))
    }
}
