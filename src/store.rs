//! Per-region forecast cache with loading state and manual reload
//!
//! Each region code owns one entry. The first request for a code starts a
//! background fetch; later requests are served from the entry. `reload`
//! starts a fresh fetch while the previous data stays visible. Every fetch
//! is stamped with the entry's generation and only the newest generation is
//! allowed to write its result back, so a slow superseded response can never
//! overwrite a newer one.
//!
//! Catalog codes are always admitted. Any other code counts against a cache
//! limit; once it is reached the least recently requested settled entry is
//! evicted, and while every such entry is still loading new codes are
//! turned away with [`FetchError::CacheFull`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::api::ForecastSource;
use crate::error::FetchError;
use crate::models::{RegionCode, WeatherReport};

/// Snapshot of one region's cache entry, as handed to the views
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchState {
    pub code: RegionCode,
    pub data: Option<WeatherReport>,
    pub is_loading: bool,
    pub error: Option<FetchError>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct Entry {
    data: Option<WeatherReport>,
    is_loading: bool,
    error: Option<FetchError>,
    updated_at: Option<DateTime<Utc>>,
    generation: u64,
    last_used: u64,
    in_flight: Option<AbortHandle>,
}

impl Entry {
    fn snapshot(&self, code: RegionCode) -> FetchState {
        FetchState {
            code,
            data: self.data.clone(),
            is_loading: self.is_loading,
            error: self.error.clone(),
            updated_at: self.updated_at,
        }
    }
}

type Entries = Arc<Mutex<HashMap<RegionCode, Entry>>>;

/// Shared forecast cache; clones refer to the same entries
#[derive(Clone)]
pub struct ForecastStore {
    source: Arc<dyn ForecastSource>,
    delay: Duration,
    entries: Entries,
    settled_tx: Arc<watch::Sender<u64>>,
    pinned: Arc<HashSet<RegionCode>>,
    max_unpinned: usize,
    clock: Arc<AtomicU64>,
}

impl ForecastStore {
    /// `delay` holds successful results back before they become visible.
    ///
    /// The store starts without a cache limit, see
    /// [`with_cache_limit`](Self::with_cache_limit).
    pub fn new(source: Arc<dyn ForecastSource>, delay: Duration) -> Self {
        let (settled_tx, _) = watch::channel(0);
        Self {
            source,
            delay,
            entries: Arc::new(Mutex::new(HashMap::new())),
            settled_tx: Arc::new(settled_tx),
            pinned: Arc::new(HashSet::new()),
            max_unpinned: usize::MAX,
            clock: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Never evict `pinned` codes; keep at most `max_cached_codes` others
    #[must_use]
    pub fn with_cache_limit<I>(mut self, pinned: I, max_cached_codes: usize) -> Self
    where
        I: IntoIterator<Item = RegionCode>,
    {
        self.pinned = Arc::new(pinned.into_iter().collect());
        self.max_unpinned = max_cached_codes;
        self
    }

    /// Number of codes currently cached
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Current state for `code`, starting the first fetch if nothing is cached.
    ///
    /// Must be called from within a tokio runtime.
    pub fn fetch_weather(&self, code: RegionCode) -> FetchState {
        let mut entries = self.entries.lock();
        let now = self.tick();
        if let Some(entry) = entries.get_mut(&code) {
            debug!(%code, loading = entry.is_loading, "Serving cached forecast state");
            entry.last_used = now;
            return entry.snapshot(code);
        }

        if !self.make_room(&mut entries, code) {
            return rejected(code);
        }
        let entry = entries.entry(code).or_default();
        entry.last_used = now;
        self.start_fetch(code, entry);
        entry.snapshot(code)
    }

    /// Start a new fetch for `code`, keeping whatever data is already cached.
    ///
    /// A fetch still running for the same code is aborted and its result,
    /// should it arrive anyway, is discarded.
    pub fn reload(&self, code: RegionCode) -> FetchState {
        let mut entries = self.entries.lock();
        if !entries.contains_key(&code) && !self.make_room(&mut entries, code) {
            return rejected(code);
        }
        let entry = entries.entry(code).or_default();
        entry.last_used = self.tick();
        if let Some(previous) = entry.in_flight.take() {
            debug!(%code, "Aborting superseded fetch");
            previous.abort();
        }
        self.start_fetch(code, entry);
        entry.snapshot(code)
    }

    /// Peek at `code` without triggering a fetch
    #[must_use]
    pub fn state(&self, code: RegionCode) -> Option<FetchState> {
        self.entries.lock().get(&code).map(|e| e.snapshot(code))
    }

    /// Wait until `code` is no longer loading.
    ///
    /// Returns `None` when the code has never been requested.
    pub async fn settled(&self, code: RegionCode) -> Option<FetchState> {
        let mut settled_rx = self.settled_tx.subscribe();
        loop {
            let state = self.state(code)?;
            if !state.is_loading {
                return Some(state);
            }
            if settled_rx.changed().await.is_err() {
                return Some(state);
            }
        }
    }

    /// [`settled`](Self::settled), giving up after `timeout`
    pub async fn wait_settled(&self, code: RegionCode, timeout: Duration) -> Option<FetchState> {
        match tokio::time::timeout(timeout, self.settled(code)).await {
            Ok(state) => state,
            Err(_) => {
                debug!(%code, "Gave up waiting for forecast after {:?}", timeout);
                self.state(code)
            }
        }
    }

    /// Warm the cache for every code
    pub fn prefetch<I>(&self, codes: I)
    where
        I: IntoIterator<Item = RegionCode>,
    {
        for code in codes {
            self.fetch_weather(code);
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Whether `code` may get a new entry, evicting one if the limit is hit
    fn make_room(&self, entries: &mut HashMap<RegionCode, Entry>, code: RegionCode) -> bool {
        if self.pinned.contains(&code) {
            return true;
        }
        let unpinned = entries
            .keys()
            .filter(|c| !self.pinned.contains(*c))
            .count();
        if unpinned < self.max_unpinned {
            return true;
        }

        let oldest = entries
            .iter()
            .filter(|(c, e)| !self.pinned.contains(*c) && !e.is_loading)
            .min_by_key(|(_, e)| e.last_used)
            .map(|(c, _)| *c);
        match oldest {
            Some(evicted) => {
                entries.remove(&evicted);
                debug!(%code, %evicted, cached = entries.len(), "Evicted forecast to make room");
                true
            }
            None => {
                warn!(%code, limit = self.max_unpinned, "Forecast cache full, every entry is loading");
                false
            }
        }
    }

    fn start_fetch(&self, code: RegionCode, entry: &mut Entry) {
        entry.generation += 1;
        entry.is_loading = true;
        entry.error = None;

        let generation = entry.generation;
        let source = Arc::clone(&self.source);
        let entries = Arc::clone(&self.entries);
        let settled_tx = Arc::clone(&self.settled_tx);
        let delay = self.delay;

        let handle = tokio::spawn(async move {
            let outcome = source.fetch(code).await;
            if outcome.is_ok() && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if complete(&entries, code, generation, outcome) {
                settled_tx.send_modify(|n| *n = n.wrapping_add(1));
            }
        });
        entry.in_flight = Some(handle.abort_handle());
    }
}

/// State handed out for a code that was not admitted to the cache
fn rejected(code: RegionCode) -> FetchState {
    FetchState {
        code,
        data: None,
        is_loading: false,
        error: Some(FetchError::CacheFull),
        updated_at: None,
    }
}

/// Write a finished fetch back; false when a newer fetch owns the entry
fn complete(
    entries: &Entries,
    code: RegionCode,
    generation: u64,
    outcome: Result<WeatherReport, FetchError>,
) -> bool {
    let mut entries = entries.lock();
    let Some(entry) = entries.get_mut(&code) else {
        return false;
    };
    if entry.generation != generation {
        debug!(%code, generation, current = entry.generation, "Discarding stale forecast response");
        return false;
    }

    match outcome {
        Ok(report) => {
            info!(%code, generation, "Forecast cached for {}", report.target_area);
            entry.data = Some(report);
            entry.error = None;
            entry.updated_at = Some(Utc::now());
        }
        Err(err) => {
            warn!(%code, generation, kind = err.kind(), "Forecast fetch failed: {}", err);
            entry.error = Some(err);
        }
    }
    entry.is_loading = false;
    entry.in_flight = None;
    true
}
