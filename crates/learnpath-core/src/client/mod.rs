//! The sync client: cache store + transport + optimistic mutation controller.
//!
//! [`SyncClient`] is cheap to clone; every clone shares one cache. Reads go
//! through [`SyncClient::subscribe`] or the `load_*` helpers, writes through
//! the `begin_*` dispatchers, each of which applies its optimistic write
//! and returns a [`PendingMutation`] to commit.
//!
//! Background refetches triggered by invalidation are spawned on the ambient
//! tokio runtime. [`SyncClient::settled`] waits for all of them, which is what
//! a short-lived consumer (the CLI, a test) calls before reading the
//! reconciled state.

mod dispatch;
mod mutation;

pub use mutation::{MutationError, MutationKind, MutationOutput, MutationPhase, PendingMutation};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::SyncConfig;
use crate::error::ErrorCode;
use crate::model::{DashboardStats, RoadmapDetail, RoadmapSummary};
use crate::patch::normalize;
use crate::store::{CacheKey, CacheStore, CacheValue, FetchResolution, FetchTicket, QueryView};
use crate::transport::{Transport, TransportError};

/// A query load that produced no data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The fetch was cancelled by an optimistic write and nothing is cached.
    #[error("fetch of {key} was superseded and nothing is cached")]
    Cancelled { key: CacheKey },
}

impl LoadError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Transport(_) => ErrorCode::LoadFailed,
            Self::Cancelled { .. } => ErrorCode::FetchCancelled,
        }
    }
}

#[derive(Clone)]
pub struct SyncClient {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    store: CacheStore,
    config: SyncConfig,
    background: Mutex<Vec<JoinHandle<()>>>,
    submitting: Mutex<HashMap<CacheKey, usize>>,
    in_flight: Mutex<HashMap<CacheKey, InFlight>>,
    next_mutation: AtomicU64,
}

type FetchOutcome = Option<Result<CacheValue, LoadError>>;

/// A running fetch that later callers for the same key can join.
struct InFlight {
    ticket: FetchTicket,
    done: watch::Receiver<FetchOutcome>,
}

enum FetchRole {
    Lead(FetchTicket, watch::Sender<FetchOutcome>),
    Join(watch::Receiver<FetchOutcome>),
}

impl std::fmt::Debug for SyncClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncClient")
            .field("store", &self.inner.store)
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SyncClient {
    pub fn new(transport: Arc<dyn Transport>, config: SyncConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                store: CacheStore::new(),
                config,
                background: Mutex::new(Vec::new()),
                submitting: Mutex::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
                next_mutation: AtomicU64::new(1),
            }),
        }
    }

    #[must_use]
    pub fn store(&self) -> &CacheStore {
        &self.inner.store
    }

    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.inner.transport.as_ref()
    }

    /// Observe `key`. While the receiver lives, invalidating the key
    /// schedules a background refetch.
    pub fn subscribe(&self, key: &CacheKey) -> watch::Receiver<QueryView> {
        self.inner.store.subscribe(key)
    }

    // -----------------------------------------------------------------------
    // Cached reads
    // -----------------------------------------------------------------------

    #[must_use]
    pub fn roadmaps(&self) -> Option<Arc<Vec<RoadmapSummary>>> {
        self.inner
            .store
            .get(&CacheKey::Roadmaps)
            .and_then(CacheValue::into_roadmaps)
    }

    #[must_use]
    pub fn roadmap(&self, roadmap_id: &str) -> Option<Arc<RoadmapDetail>> {
        self.inner
            .store
            .get(&CacheKey::roadmap(roadmap_id))
            .and_then(CacheValue::into_roadmap)
    }

    #[must_use]
    pub fn dashboard(&self) -> Option<Arc<DashboardStats>> {
        self.inner
            .store
            .get(&CacheKey::Dashboard)
            .and_then(CacheValue::into_dashboard)
    }

    // -----------------------------------------------------------------------
    // Loads
    // -----------------------------------------------------------------------

    pub async fn load_roadmaps(&self) -> Result<Arc<Vec<RoadmapSummary>>, LoadError> {
        let key = CacheKey::Roadmaps;
        self.load(&key)
            .await?
            .into_roadmaps()
            .ok_or(LoadError::Cancelled { key })
    }

    pub async fn load_roadmap(&self, roadmap_id: &str) -> Result<Arc<RoadmapDetail>, LoadError> {
        let key = CacheKey::roadmap(roadmap_id);
        self.load(&key)
            .await?
            .into_roadmap()
            .ok_or(LoadError::Cancelled { key })
    }

    pub async fn load_dashboard(&self) -> Result<Arc<DashboardStats>, LoadError> {
        let key = CacheKey::Dashboard;
        self.load(&key)
            .await?
            .into_dashboard()
            .ok_or(LoadError::Cancelled { key })
    }

    /// Cached value when fresh, otherwise a fetch.
    async fn load(&self, key: &CacheKey) -> Result<CacheValue, LoadError> {
        let view = self.inner.store.view(key);
        match view.data {
            Some(value) if !view.is_stale => Ok(value),
            _ => self.fetch(key).await,
        }
    }

    /// Fetch `key` from the server and store the result.
    ///
    /// A call made while another fetch of `key` is in flight joins it and
    /// shares its outcome; only a cancel or an evict starts a fresh request.
    /// If an optimistic write cancels the fetch, the response is discarded
    /// and the current cached value is returned.
    pub async fn fetch(&self, key: &CacheKey) -> Result<CacheValue, LoadError> {
        loop {
            match self.claim_fetch(key) {
                FetchRole::Lead(ticket, done) => {
                    let outcome = self.run_fetch(&ticket).await;
                    done.send_replace(Some(outcome.clone()));
                    let mut in_flight = lock(&self.inner.in_flight);
                    if in_flight.get(key).is_some_and(|f| f.ticket == ticket) {
                        in_flight.remove(key);
                    }
                    return outcome;
                }
                FetchRole::Join(mut done) => {
                    debug!(key = %key, "joined in-flight fetch");
                    // Closed without an outcome: the leader was dropped, so retry.
                    let shared = match done.wait_for(Option::is_some).await {
                        Ok(outcome) => outcome.clone(),
                        Err(_) => None,
                    };
                    if let Some(outcome) = shared {
                        return outcome;
                    }
                }
            }
        }
    }

    fn claim_fetch(&self, key: &CacheKey) -> FetchRole {
        let store = &self.inner.store;
        let mut in_flight = lock(&self.inner.in_flight);
        let joinable = in_flight.get(key).filter(|running| {
            store.is_current(&running.ticket) && running.done.has_changed().is_ok()
        });
        if let Some(running) = joinable {
            return FetchRole::Join(running.done.clone());
        }
        let ticket = store.begin_fetch(key);
        let (tx, rx) = watch::channel(None);
        in_flight.insert(
            key.clone(),
            InFlight {
                ticket: ticket.clone(),
                done: rx,
            },
        );
        FetchRole::Lead(ticket, tx)
    }

    async fn run_fetch(&self, ticket: &FetchTicket) -> Result<CacheValue, LoadError> {
        let store = &self.inner.store;
        let key = ticket.key();
        debug!(key = %key, "fetch started");

        let outcome = match key {
            CacheKey::Roadmaps => self
                .inner
                .transport
                .list_roadmaps()
                .await
                .map(CacheValue::from),
            CacheKey::Roadmap(id) => self
                .inner
                .transport
                .get_roadmap(id)
                .await
                .map(|detail| CacheValue::from(normalize(detail))),
            CacheKey::Dashboard => self
                .inner
                .transport
                .dashboard_stats()
                .await
                .map(CacheValue::from),
        };

        let resolution = store.finish_fetch(
            ticket,
            outcome.as_ref().cloned().map_err(ToString::to_string),
        );
        if resolution == FetchResolution::Discarded {
            debug!(key = %key, "stale fetch discarded");
            return store
                .get(key)
                .ok_or_else(|| LoadError::Cancelled { key: key.clone() });
        }
        debug!(key = %key, ok = outcome.is_ok(), "fetch finished");
        outcome.map_err(LoadError::from)
    }

    // -----------------------------------------------------------------------
    // Invalidation and background refetch
    // -----------------------------------------------------------------------

    /// Mark `key` stale; refetch it in the background if it is observed.
    pub fn invalidate(&self, key: &CacheKey) {
        let observed = self.inner.store.invalidate(key);
        if observed && self.inner.config.refetch_on_settle {
            self.spawn_refetch(key.clone());
        }
    }

    fn spawn_refetch(&self, key: CacheKey) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!(key = %key, "no runtime; key left stale");
            return;
        };
        let client = self.clone();
        let task = handle.spawn(async move {
            if let Err(err) = client.fetch(&key).await {
                warn!(key = %key, error = %err, "background refetch failed");
            }
        });
        let mut background = lock(&self.inner.background);
        background.retain(|h| !h.is_finished());
        background.push(task);
    }

    /// Wait until every background refetch spawned so far has finished.
    pub async fn settled(&self) {
        loop {
            let pending = std::mem::take(&mut *lock(&self.inner.background));
            if pending.is_empty() {
                return;
            }
            for task in pending {
                if let Err(err) = task.await {
                    warn!(error = %err, "background refetch task aborted");
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Submission tracking
    // -----------------------------------------------------------------------

    /// Whether a create mutation targeting `key` is in flight.
    #[must_use]
    pub fn is_submitting(&self, key: &CacheKey) -> bool {
        lock(&self.inner.submitting)
            .get(key)
            .is_some_and(|n| *n > 0)
    }

    pub(crate) fn mark_submitting(&self, key: &CacheKey) {
        *lock(&self.inner.submitting).entry(key.clone()).or_insert(0) += 1;
    }

    pub(crate) fn clear_submitting(&self, key: &CacheKey) {
        let mut submitting = lock(&self.inner.submitting);
        if let Some(n) = submitting.get_mut(key) {
            *n = n.saturating_sub(1);
            if *n == 0 {
                submitting.remove(key);
            }
        }
    }

    pub(crate) fn next_mutation_id(&self) -> u64 {
        self.inner.next_mutation.fetch_add(1, Ordering::Relaxed)
    }
}
