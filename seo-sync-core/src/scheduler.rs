//! Source registry and per-source periodic timers.
//!
//! The [`Registry`] exclusively owns two maps: id → [`ContentSource`] and
//! id → armed timer task. A timer task only captures the one source it
//! syncs, never the registry.
//!
//! # Construction modes
//! - [`Registry::new`]: multi-source; every start/stop names an id.
//! - [`Registry::legacy`]: pre-registers one source under
//!   [`DEFAULT_SOURCE_ID`] and lets start/stop omit the id.
//!
//! # Timers
//! Arming a source spawns a task that ticks once per interval (first tick one
//! interval from now) and spawns a `sync()` per tick, plus one immediate
//! `sync()` when armed. Each sync runs as its own task, so stopping a timer
//! never interrupts a sync that is already running. Failed syncs are logged
//! and the timer keeps going.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::contract::{
    ContentApi, FetchMode, FileStore, FirstSyncFallback, SourceConfig, SyncOutcome,
};
use crate::error::SyncError;
use crate::source::ContentSource;

/// Period between scheduled syncs.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Longest accepted period between scheduled syncs.
pub const MAX_SYNC_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Shortest accepted period; a zero period cannot drive a timer.
pub const MIN_SYNC_INTERVAL: Duration = Duration::from_secs(1);

/// Id under which [`Registry::legacy`] registers its single source.
pub const DEFAULT_SOURCE_ID: &str = "default";

/// Per-source outcomes of a [`Registry::sync_all`] run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub sources: Vec<SourceSyncReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceSyncReport {
    pub id: String,
    pub outcome: SyncOutcome,
}

impl SyncReport {
    pub fn all_succeeded(&self) -> bool {
        self.sources.iter().all(|s| s.outcome.success)
    }
}

pub struct Registry {
    sources: HashMap<String, Arc<ContentSource>>,
    timers: HashMap<String, JoinHandle<()>>,
    default_id: Option<String>,
    interval: Duration,
    fallback: FirstSyncFallback,
    api: Arc<dyn ContentApi>,
    store: Arc<dyn FileStore>,
}

impl Registry {
    pub fn new(api: Arc<dyn ContentApi>, store: Arc<dyn FileStore>) -> Self {
        Self {
            sources: HashMap::new(),
            timers: HashMap::new(),
            default_id: None,
            interval: DEFAULT_SYNC_INTERVAL,
            fallback: FirstSyncFallback::default(),
            api,
            store,
        }
    }

    /// Single-source registry whose start/stop calls may omit the id.
    pub fn legacy(
        config: SourceConfig,
        api: Arc<dyn ContentApi>,
        store: Arc<dyn FileStore>,
    ) -> Self {
        let mut registry = Self::new(api, store);
        registry.add_source(DEFAULT_SOURCE_ID, config);
        registry.default_id = Some(DEFAULT_SOURCE_ID.to_string());
        registry
    }

    /// Sets the schedule period, clamped to
    /// [`MIN_SYNC_INTERVAL`]..=[`MAX_SYNC_INTERVAL`].
    pub fn with_interval(mut self, interval: Duration) -> Self {
        let clamped = interval.clamp(MIN_SYNC_INTERVAL, MAX_SYNC_INTERVAL);
        if clamped != interval {
            warn!(
                requested_secs = interval.as_secs(),
                interval_secs = clamped.as_secs(),
                "[SCHEDULER] Sync interval out of range, clamped"
            );
        }
        self.interval = clamped;
        self
    }

    /// Fallback mode for sources registered after this call.
    pub fn with_first_sync_fallback(mut self, fallback: FirstSyncFallback) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn is_legacy(&self) -> bool {
        self.default_id.is_some()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Registers a source, or merges `config` into the existing one with the
    /// same id. An existing source keeps its first-sync state and schedule.
    pub fn add_source(&mut self, id: &str, config: SourceConfig) {
        if let Some(existing) = self.sources.get(id) {
            info!(source_id = %id, "[SCHEDULER] Source already registered, updating config");
            existing.update_config(config.into());
            return;
        }

        info!(source_id = %id, domain = %config.domain, "[SCHEDULER] Registering source");
        let source = ContentSource::new(config, Arc::clone(&self.api), Arc::clone(&self.store))
            .with_first_sync_fallback(self.fallback);
        self.sources.insert(id.to_string(), Arc::new(source));
    }

    /// Stops the source's schedule if armed, then forgets it.
    pub fn remove_source(&mut self, id: &str) {
        self.disarm(id);
        if self.sources.remove(id).is_some() {
            info!(source_id = %id, "[SCHEDULER] Source removed");
        }
    }

    pub fn source(&self, id: &str) -> Option<Arc<ContentSource>> {
        self.sources.get(id).cloned()
    }

    /// Registered ids, sorted.
    pub fn source_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sources.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Ids with an armed schedule, sorted.
    pub fn active_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.timers.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn is_armed(&self, id: &str) -> bool {
        self.timers.contains_key(id)
    }

    fn resolve_id(&self, id: Option<&str>) -> Result<String, SyncError> {
        match (id, &self.default_id) {
            (Some(id), _) => Ok(id.to_string()),
            (None, Some(default)) => Ok(default.clone()),
            (None, None) => Err(SyncError::Configuration(
                "no source id given and no default source registered".to_string(),
            )),
        }
    }

    /// Arms the periodic schedule for a source and kicks off an immediate sync.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self, id: Option<&str>) -> Result<(), SyncError> {
        let id = self.resolve_id(id)?;
        let source = self
            .sources
            .get(&id)
            .cloned()
            .ok_or_else(|| SyncError::Configuration(format!("source '{id}' is not registered")))?;

        if self.timers.contains_key(&id) {
            info!(source_id = %id, "[SCHEDULER] Schedule already armed, nothing to do");
            return Ok(());
        }

        let handle = spawn_timer(id.clone(), Arc::clone(&source), self.interval);
        self.timers.insert(id.clone(), handle);
        info!(
            source_id = %id,
            interval_secs = self.interval.as_secs(),
            "[SCHEDULER] Schedule armed"
        );

        spawn_sync(id, source, "immediate");
        Ok(())
    }

    /// Cancels future ticks for a source. No-op if it is not armed.
    pub fn stop(&mut self, id: Option<&str>) -> Result<(), SyncError> {
        let id = self.resolve_id(id)?;
        self.disarm(&id);
        Ok(())
    }

    fn disarm(&mut self, id: &str) {
        if let Some(handle) = self.timers.remove(id) {
            handle.abort();
            info!(source_id = %id, "[SCHEDULER] Schedule stopped");
        }
    }

    /// Starts every registered source. Already armed sources are left alone.
    pub fn start_all(&mut self) {
        for id in self.source_ids() {
            if let Err(e) = self.start(Some(&id)) {
                error!(source_id = %id, error = %e, "[SCHEDULER][ERROR] Failed to start schedule");
            }
        }
    }

    pub fn stop_all(&mut self) {
        for id in self.active_ids() {
            self.disarm(&id);
        }
    }

    /// Runs one source's sync right away, bypassing its timer.
    pub async fn sync_one(&self, id: &str) -> Result<SyncOutcome, SyncError> {
        let source = self
            .sources
            .get(id)
            .cloned()
            .ok_or_else(|| SyncError::NotFound(id.to_string()))?;
        Ok(source.sync().await)
    }

    /// Syncs every registered source concurrently. Never fails; failures are
    /// logged per source and reported in the returned [`SyncReport`].
    pub async fn sync_all(&self) -> SyncReport {
        let runs = self.sources.iter().map(|(id, source)| {
            let id = id.clone();
            let source = Arc::clone(source);
            async move {
                let outcome = source.sync().await;
                log_outcome(&id, "manual", &outcome);
                SourceSyncReport { id, outcome }
            }
        });
        let mut sources = join_all(runs).await;
        sources.sort_by(|a, b| a.id.cmp(&b.id));
        SyncReport { sources }
    }

    /// Manual fetch of one variant for a registered source, followed by a write.
    pub async fn fetch_and_write(
        &self,
        id: &str,
        mode: FetchMode,
    ) -> Result<SyncOutcome, SyncError> {
        let source = self
            .sources
            .get(id)
            .cloned()
            .ok_or_else(|| SyncError::NotFound(id.to_string()))?;
        source.fetch_and_write(mode).await
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        for (_, handle) in self.timers.drain() {
            handle.abort();
        }
    }
}

fn spawn_timer(id: String, source: Arc<ContentSource>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let start = tokio::time::Instant::now() + period;
        let mut interval = tokio::time::interval_at(start, period);
        loop {
            interval.tick().await;
            spawn_sync(id.clone(), source.clone(), "scheduled");
        }
    })
}

fn spawn_sync(id: String, source: Arc<ContentSource>, trigger: &'static str) {
    tokio::spawn(async move {
        let outcome = source.sync().await;
        log_outcome(&id, trigger, &outcome);
    });
}

fn log_outcome(id: &str, trigger: &str, outcome: &SyncOutcome) {
    if outcome.success {
        info!(
            source_id = %id,
            trigger,
            files_created = outcome.files_created.len(),
            "[SCHEDULER] {}",
            outcome.message
        );
    } else {
        warn!(
            source_id = %id,
            trigger,
            files_created = outcome.files_created.len(),
            errors = ?outcome.errors,
            "[SCHEDULER] Sync finished with errors: {}",
            outcome.message
        );
    }
}
