//! Session state for free-text flows.
//!
//! Pure menu navigation needs no stored state because the input path
//! encodes position. The store only remembers sessions that are waiting for
//! free text (a city name, an area name). Entries are created when such a
//! flow is entered and removed when it resolves.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Free-text flows a session can be waiting in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    Weather,
    StoreLocator,
}

impl FlowKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Weather => "weather",
            Self::StoreLocator => "store_locator",
        }
    }

    /// Feature name shown to users.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Weather => "Weather",
            Self::StoreLocator => "Agro-dealer locator",
        }
    }

    /// Terminal text when the feature is not configured.
    pub fn not_available_text(&self) -> String {
        format!("{} service is not available right now.", self.label())
    }
}

/// Marker that the session's next input is free text for a handler.
///
/// Each install gets a fresh generation, so two installs of the same kind
/// compare unequal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingFlow {
    pub kind: FlowKind,
    generation: u64,
}

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

impl PendingFlow {
    pub fn new(kind: FlowKind) -> Self {
        Self {
            kind,
            generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
        }
    }
}

/// Storage for pending flows keyed by session id.
///
/// `clear` must be idempotent: duplicate deliveries can resolve the same
/// flow twice.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, session_id: &str) -> Option<PendingFlow>;

    async fn set(&self, session_id: &str, flow: PendingFlow);

    async fn clear(&self, session_id: &str);

    /// Remove the entry only if it is still `flow`. A flow installed after
    /// `flow` was read is left in place.
    async fn clear_if(&self, session_id: &str, flow: PendingFlow);
}

#[derive(Debug, Clone, Copy)]
struct SessionEntry {
    flow: PendingFlow,
    installed_at: Instant,
}

/// Process-local store backed by a sharded concurrent map.
///
/// With a TTL, entries older than the TTL read as absent and are dropped by
/// [`InMemorySessionStore::purge_expired`].
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    entries: DashMap<String, SessionEntry>,
    ttl: Option<Duration>,
}

impl InMemorySessionStore {
    /// Store without expiry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose entries expire `ttl` after installation.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: Some(ttl),
        }
    }

    fn is_expired(&self, entry: &SessionEntry) -> bool {
        self.ttl
            .is_some_and(|ttl| entry.installed_at.elapsed() >= ttl)
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        if self.ttl.is_none() {
            return 0;
        }
        let before = self.entries.len();
        self.entries.retain(|_, entry| !self.is_expired(entry));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            tracing::debug!(removed, "Purged expired pending flows");
        }
        removed
    }

    /// Number of sessions currently waiting for free text.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, session_id: &str) -> Option<PendingFlow> {
        let entry = *self.entries.get(session_id)?;
        if self.is_expired(&entry) {
            self.entries
                .remove_if(session_id, |_, current| current.installed_at == entry.installed_at);
            return None;
        }
        Some(entry.flow)
    }

    async fn set(&self, session_id: &str, flow: PendingFlow) {
        self.entries.insert(
            session_id.to_string(),
            SessionEntry {
                flow,
                installed_at: Instant::now(),
            },
        );
    }

    async fn clear(&self, session_id: &str) {
        self.entries.remove(session_id);
    }

    async fn clear_if(&self, session_id: &str, flow: PendingFlow) {
        self.entries
            .remove_if(session_id, |_, entry| entry.flow == flow);
    }
}

// ============================================================================
// Per-session locks
// ============================================================================

/// Table of per-session mutexes.
///
/// Requests for different sessions never share a mutex. A session's entry is
/// removed once no request holds or waits on it.
#[derive(Debug, Default)]
pub struct SessionLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `session_id`.
    pub async fn lock(&self, session_id: &str) -> SessionGuard<'_> {
        let mutex = self
            .locks
            .entry(session_id.to_string())
            .or_default()
            .clone();
        let guard = mutex.lock_owned().await;
        SessionGuard {
            guard: Some(guard),
            locks: self,
            session_id: session_id.to_string(),
        }
    }

    /// Number of sessions with a live lock entry.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Exclusive access to one session; released on drop.
pub struct SessionGuard<'a> {
    guard: Option<OwnedMutexGuard<()>>,
    locks: &'a SessionLocks,
    session_id: String,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        // Release first so the strong count below excludes this guard
        self.guard.take();
        self.locks
            .locks
            .remove_if(&self.session_id, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
