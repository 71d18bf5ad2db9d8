//! Keyed cache store: the single source of truth for rendered data.
//!
//! Each key holds an immutable value (`Arc`-shared, replaced wholesale on
//! every write) plus query bookkeeping: staleness, the last load error, and
//! a fetch generation counter. Readers observe a key through a
//! [`tokio::sync::watch`] channel that is republished on every change.
//!
//! # Fetch generations
//!
//! [`CacheStore::begin_fetch`] bumps the key's generation and hands out a
//! [`FetchTicket`]. [`CacheStore::finish_fetch`] only applies a result whose
//! ticket still matches the in-flight generation. Cancelling a key (before an
//! optimistic write) or starting a newer fetch bumps the generation, so a slow
//! response that resolves afterwards is discarded instead of overwriting
//! newer data. [`CacheStore::is_current`] lets a caller join a fetch that is
//! still live instead of superseding it.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::model::{DashboardStats, RoadmapDetail, RoadmapSummary};

// ---------------------------------------------------------------------------
// Keys and values
// ---------------------------------------------------------------------------

/// Identifies one cached query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CacheKey {
    /// The roadmap list / summary rows.
    Roadmaps,
    /// One roadmap's nested topic/task tree.
    Roadmap(String),
    /// Dashboard statistics.
    Dashboard,
}

impl CacheKey {
    pub fn roadmap(id: impl Into<String>) -> Self {
        Self::Roadmap(id.into())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Roadmaps => f.write_str("roadmaps"),
            Self::Roadmap(id) => write!(f, "roadmap:{id}"),
            Self::Dashboard => f.write_str("dashboard"),
        }
    }
}

/// A cached value. Cloning is cheap; the payload is shared.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheValue {
    Roadmaps(Arc<Vec<RoadmapSummary>>),
    Roadmap(Arc<RoadmapDetail>),
    Dashboard(Arc<DashboardStats>),
}

impl CacheValue {
    #[must_use]
    pub fn as_roadmaps(&self) -> Option<&[RoadmapSummary]> {
        match self {
            Self::Roadmaps(list) => Some(list.as_slice()),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_roadmap(&self) -> Option<&RoadmapDetail> {
        match self {
            Self::Roadmap(detail) => Some(detail),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_dashboard(&self) -> Option<&DashboardStats> {
        match self {
            Self::Dashboard(stats) => Some(stats),
            _ => None,
        }
    }
}

impl CacheValue {
    #[must_use]
    pub fn into_roadmaps(self) -> Option<Arc<Vec<RoadmapSummary>>> {
        match self {
            Self::Roadmaps(list) => Some(list),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_roadmap(self) -> Option<Arc<RoadmapDetail>> {
        match self {
            Self::Roadmap(detail) => Some(detail),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_dashboard(self) -> Option<Arc<DashboardStats>> {
        match self {
            Self::Dashboard(stats) => Some(stats),
            _ => None,
        }
    }
}

impl From<Vec<RoadmapSummary>> for CacheValue {
    fn from(list: Vec<RoadmapSummary>) -> Self {
        Self::Roadmaps(Arc::new(list))
    }
}

impl From<RoadmapDetail> for CacheValue {
    fn from(detail: RoadmapDetail) -> Self {
        Self::Roadmap(Arc::new(detail))
    }
}

impl From<DashboardStats> for CacheValue {
    fn from(stats: DashboardStats) -> Self {
        Self::Dashboard(Arc::new(stats))
    }
}

// ---------------------------------------------------------------------------
// Query views
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchStatus {
    #[default]
    Idle,
    Fetching,
}

/// How a view should be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryState {
    /// No data yet and no error: show a spinner.
    Loading,
    /// No data and the load failed: blocking error for this view.
    Failed(String),
    /// Data is present. A later refetch error, if any, is non-blocking.
    Ready,
}

/// Snapshot of one key as published to subscribers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryView {
    pub data: Option<CacheValue>,
    pub is_stale: bool,
    pub fetch_status: FetchStatus,
    pub error: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl QueryView {
    #[must_use]
    pub fn state(&self) -> QueryState {
        match (&self.data, &self.error) {
            (Some(_), _) => QueryState::Ready,
            (None, Some(err)) => QueryState::Failed(err.clone()),
            (None, None) => QueryState::Loading,
        }
    }
}

/// Proof that a fetch was started for a key at a given generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    key: CacheKey,
    generation: u64,
}

impl FetchTicket {
    #[must_use]
    pub const fn key(&self) -> &CacheKey {
        &self.key
    }
}

/// What [`CacheStore::finish_fetch`] did with a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchResolution {
    Applied,
    /// The ticket was cancelled or superseded; the store was not touched.
    Discarded,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Entry {
    view: QueryView,
    generation: u64,
    in_flight: Option<u64>,
    tx: watch::Sender<QueryView>,
}

impl Entry {
    fn new() -> Self {
        let (tx, _rx) = watch::channel(QueryView::default());
        Self {
            view: QueryView::default(),
            generation: 0,
            in_flight: None,
            tx,
        }
    }

    fn publish(&self) {
        self.tx.send_replace(self.view.clone());
    }
}

/// Keyed store of cached query values. Keys never interfere with each other.
#[derive(Debug, Default)]
pub struct CacheStore {
    entries: Mutex<HashMap<CacheKey, Entry>>,
}

impl CacheStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // Values are replaced wholesale; a poisoned map is still consistent.
    fn entries(&self) -> MutexGuard<'_, HashMap<CacheKey, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Latest value for `key`, if loaded.
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<CacheValue> {
        self.entries().get(key).and_then(|e| e.view.data.clone())
    }

    /// Full query view for `key`; the default (loading) view if unknown.
    #[must_use]
    pub fn view(&self, key: &CacheKey) -> QueryView {
        self.entries()
            .get(key)
            .map(|e| e.view.clone())
            .unwrap_or_default()
    }

    /// Replace the value for `key`.
    pub fn set(&self, key: &CacheKey, value: CacheValue) {
        let mut entries = self.entries();
        let entry = entries.entry(key.clone()).or_insert_with(Entry::new);
        entry.view.data = Some(value);
        entry.view.updated_at = Some(Utc::now());
        entry.publish();
    }

    /// Put a snapshot back exactly as it was, including "not loaded".
    pub fn restore(&self, key: &CacheKey, snapshot: Option<CacheValue>) {
        let mut entries = self.entries();
        if snapshot.is_none() && !entries.contains_key(key) {
            return;
        }
        let entry = entries.entry(key.clone()).or_insert_with(Entry::new);
        if entry.view.data == snapshot {
            return;
        }
        entry.view.data = snapshot;
        entry.view.updated_at = Some(Utc::now());
        entry.publish();
    }

    /// Atomically read the current value, compute a replacement with `f`,
    /// and write it. Returns the previous value (the snapshot).
    ///
    /// When `f` returns `None` the key is left untouched.
    pub fn replace_with<F>(&self, key: &CacheKey, f: F) -> Option<CacheValue>
    where
        F: FnOnce(Option<&CacheValue>) -> Option<CacheValue>,
    {
        let mut entries = self.entries();
        let previous = entries.get(key).and_then(|e| e.view.data.clone());
        if let Some(next) = f(previous.as_ref()) {
            let entry = entries.entry(key.clone()).or_insert_with(Entry::new);
            entry.view.data = Some(next);
            entry.view.updated_at = Some(Utc::now());
            entry.publish();
        }
        previous
    }

    /// Mark `key` stale.
    ///
    /// Returns `true` when the key is currently observed, meaning the caller
    /// should schedule a refetch.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        let mut entries = self.entries();
        let Some(entry) = entries.get_mut(key) else {
            return false;
        };
        entry.view.is_stale = true;
        entry.publish();
        entry.tx.receiver_count() > 0
    }

    /// Abandon any outstanding fetch for `key` so its eventual result is
    /// discarded. Returns `true` if a fetch was in flight.
    pub fn cancel_in_flight(&self, key: &CacheKey) -> bool {
        let mut entries = self.entries();
        let Some(entry) = entries.get_mut(key) else {
            return false;
        };
        if entry.in_flight.is_none() {
            return false;
        }
        entry.generation += 1;
        entry.in_flight = None;
        entry.view.fetch_status = FetchStatus::Idle;
        entry.publish();
        true
    }

    /// Record the start of a fetch for `key`, superseding any older one.
    pub fn begin_fetch(&self, key: &CacheKey) -> FetchTicket {
        let mut entries = self.entries();
        let entry = entries.entry(key.clone()).or_insert_with(Entry::new);
        entry.generation += 1;
        entry.in_flight = Some(entry.generation);
        entry.view.fetch_status = FetchStatus::Fetching;
        entry.publish();
        FetchTicket {
            key: key.clone(),
            generation: entry.generation,
        }
    }

    /// Apply the outcome of a fetch if its ticket is still current.
    ///
    /// A failure keeps any existing data and records the error next to it.
    pub fn finish_fetch(
        &self,
        ticket: &FetchTicket,
        outcome: Result<CacheValue, String>,
    ) -> FetchResolution {
        let mut entries = self.entries();
        let Some(entry) = entries.get_mut(&ticket.key) else {
            return FetchResolution::Discarded;
        };
        if entry.in_flight != Some(ticket.generation) {
            return FetchResolution::Discarded;
        }
        entry.in_flight = None;
        entry.view.fetch_status = FetchStatus::Idle;
        match outcome {
            Ok(value) => {
                entry.view.data = Some(value);
                entry.view.is_stale = false;
                entry.view.error = None;
                entry.view.updated_at = Some(Utc::now());
            }
            Err(message) => entry.view.error = Some(message),
        }
        entry.publish();
        FetchResolution::Applied
    }

    /// Drop the value for `key` and abandon its fetch. Subscribers stay
    /// attached and see an empty view.
    pub fn evict(&self, key: &CacheKey) {
        let mut entries = self.entries();
        if let Some(entry) = entries.get_mut(key) {
            entry.generation += 1;
            entry.in_flight = None;
            entry.view = QueryView::default();
            entry.publish();
        }
    }

    /// Observe `key`. The receiver holds the latest view and is notified on
    /// every change; while it lives the key counts as observed.
    pub fn subscribe(&self, key: &CacheKey) -> watch::Receiver<QueryView> {
        let mut entries = self.entries();
        entries
            .entry(key.clone())
            .or_insert_with(Entry::new)
            .tx
            .subscribe()
    }

    #[must_use]
    pub fn is_observed(&self, key: &CacheKey) -> bool {
        self.entries()
            .get(key)
            .is_some_and(|e| e.tx.receiver_count() > 0)
    }

    /// Whether `ticket` is still the in-flight fetch for its key.
    #[must_use]
    pub fn is_current(&self, ticket: &FetchTicket) -> bool {
        self.entries()
            .get(&ticket.key)
            .is_some_and(|e| e.in_flight == Some(ticket.generation))
    }

    #[must_use]
    pub fn is_fetching(&self, key: &CacheKey) -> bool {
        self.entries()
            .get(key)
            .is_some_and(|e| e.in_flight.is_some())
    }

    /// Every key with an entry, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<CacheKey> {
        let mut keys: Vec<_> = self.entries().keys().cloned().collect();
        keys.sort();
        keys
    }
}
