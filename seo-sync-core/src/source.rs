//! One content source: its configuration and first-sync state machine.
//!
//! A [`ContentSource`] is in one of two states:
//! - **first sync** (initial state, or after [`ContentSource::reset_first_sync`]):
//!   pulls both new and previously published content and merges them,
//! - **subsequent**: pulls only new content.
//!
//! A sync claims first-sync mode when it starts, which moves the source to the
//! subsequent state whether the merged fetch succeeds or the new-only fallback
//! is used. With [`FirstSyncFallback::Disabled`] a failed merged fetch puts the
//! source back in the first-sync state. A reset made while a sync is running
//! applies to the next one.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use futures::future::{join, FutureExt};
use tracing::{error, info, warn};

use crate::contract::{
    ContentApi, ContentBundle, FetchMode, FileStore, FirstSyncFallback, SourceConfig,
    SourceConfigUpdate, SyncOutcome,
};
use crate::error::SyncError;
use crate::write::write_bundle;

pub struct ContentSource {
    config: RwLock<SourceConfig>,
    first_sync: AtomicBool,
    in_flight: AtomicBool,
    fallback: FirstSyncFallback,
    api: Arc<dyn ContentApi>,
    store: Arc<dyn FileStore>,
}

/// Marks a sync as running for as long as it is held.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

type BranchResult = Result<Result<ContentBundle, SyncError>, Box<dyn std::any::Any + Send>>;

impl ContentSource {
    pub fn new(config: SourceConfig, api: Arc<dyn ContentApi>, store: Arc<dyn FileStore>) -> Self {
        Self {
            config: RwLock::new(config),
            first_sync: AtomicBool::new(true),
            in_flight: AtomicBool::new(false),
            fallback: FirstSyncFallback::default(),
            api,
            store,
        }
    }

    pub fn with_first_sync_fallback(mut self, fallback: FirstSyncFallback) -> Self {
        self.fallback = fallback;
        self
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> SourceConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update_config(&self, update: SourceConfigUpdate) {
        let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
        config.apply(update);
        info!(
            domain = %config.domain,
            target_directory = %config.target_directory.display(),
            "[SYNC] Source config updated"
        );
    }

    pub fn is_first_sync_pending(&self) -> bool {
        self.first_sync.load(Ordering::Acquire)
    }

    /// Makes the next [`sync`](Self::sync) pull previously published content again.
    pub fn reset_first_sync(&self) {
        self.first_sync.store(true, Ordering::Release);
    }

    pub fn is_syncing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub async fn fetch_new(&self) -> Result<ContentBundle, SyncError> {
        self.api.fetch_new(&self.config()).await
    }

    pub async fn fetch_previously_published(&self) -> Result<ContentBundle, SyncError> {
        self.api.fetch_previously_published(&self.config()).await
    }

    /// Fetches new and previously published content concurrently and merges them.
    ///
    /// A branch that errors contributes an empty bundle. This only fails when
    /// neither branch ran to completion.
    pub async fn fetch_all(&self) -> Result<ContentBundle, SyncError> {
        self.fetch_all_with(&self.config()).await
    }

    async fn fetch_all_with(&self, config: &SourceConfig) -> Result<ContentBundle, SyncError> {
        let (new, previous) = join(
            AssertUnwindSafe(self.api.fetch_new(config)).catch_unwind(),
            AssertUnwindSafe(self.api.fetch_previously_published(config)).catch_unwind(),
        )
        .await;

        if new.is_err() && previous.is_err() {
            error!(domain = %config.domain, "[FETCH][ERROR] Both content fetches aborted");
            return Err(SyncError::fetch(None, "both content fetches aborted"));
        }

        let new = settle_branch(&config.domain, "new", new);
        let previous = settle_branch(&config.domain, "previously-published", previous);
        let merged = ContentBundle::merge(previous, new);
        info!(
            domain = %config.domain,
            pages = merged.pages.len(),
            "[FETCH] Merged new and previously published content"
        );
        Ok(merged)
    }

    /// Writes a bundle under this source's target directory.
    pub async fn write_bundle(&self, bundle: &ContentBundle) -> SyncOutcome {
        let config = self.config();
        write_bundle(
            self.store.as_ref(),
            &config.domain,
            &config.target_directory,
            bundle,
            Instant::now(),
        )
        .await
    }

    /// Runs one synchronisation and reports the result. Never fails: fetch
    /// problems come back as an unsuccessful [`SyncOutcome`].
    pub async fn sync(&self) -> SyncOutcome {
        let started = Instant::now();
        let config = self.config();

        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            warn!(domain = %config.domain, "[SYNC] Sync already in progress, skipping");
            return SyncOutcome::failed(
                format!("Sync skipped for {}: already in progress", config.domain),
                "sync already in progress".to_string(),
            );
        };

        // Claim first-sync mode up front so a reset made while this sync runs
        // applies to the next one.
        let fetched = if self.first_sync.swap(false, Ordering::AcqRel) {
            info!(domain = %config.domain, "[SYNC] First sync: fetching new and previously published content");
            self.first_fetch(&config).await
        } else {
            info!(domain = %config.domain, "[SYNC] Fetching new content");
            self.api.fetch_new(&config).await
        };

        match fetched {
            Ok(bundle) => {
                write_bundle(
                    self.store.as_ref(),
                    &config.domain,
                    &config.target_directory,
                    &bundle,
                    started,
                )
                .await
            }
            Err(e) => {
                let elapsed_ms = started.elapsed().as_millis();
                error!(domain = %config.domain, error = ?e, "[SYNC][ERROR] Fetch step failed");
                SyncOutcome::failed(
                    format!(
                        "Sync failed for {}: 0 files created, 1 errors in {elapsed_ms}ms",
                        config.domain
                    ),
                    e.to_string(),
                )
            }
        }
    }

    async fn first_fetch(&self, config: &SourceConfig) -> Result<ContentBundle, SyncError> {
        match self.fetch_all_with(config).await {
            Ok(bundle) => Ok(bundle),
            Err(e) => match self.fallback {
                FirstSyncFallback::NewOnly => {
                    warn!(
                        domain = %config.domain,
                        error = %e,
                        "[SYNC] Merged fetch failed, falling back to new content only"
                    );
                    self.api.fetch_new(config).await
                }
                FirstSyncFallback::Disabled => {
                    self.first_sync.store(true, Ordering::Release);
                    Err(e)
                }
            },
        }
    }

    /// Manual fetch of one variant followed by a write. Leaves the first-sync
    /// state alone and propagates fetch errors.
    pub async fn fetch_and_write(&self, mode: FetchMode) -> Result<SyncOutcome, SyncError> {
        let started = Instant::now();
        let config = self.config();
        info!(domain = %config.domain, ?mode, "[SYNC] Manual fetch");

        let bundle = match mode {
            FetchMode::New => self.api.fetch_new(&config).await?,
            FetchMode::Previous => self.api.fetch_previously_published(&config).await?,
            FetchMode::All => self.fetch_all_with(&config).await?,
        };

        Ok(write_bundle(
            self.store.as_ref(),
            &config.domain,
            &config.target_directory,
            &bundle,
            started,
        )
        .await)
    }
}

fn settle_branch(domain: &str, branch: &str, result: BranchResult) -> ContentBundle {
    match result {
        Ok(Ok(bundle)) => bundle,
        Ok(Err(e)) => {
            warn!(domain = %domain, branch, error = %e, "[FETCH] Branch failed, treating as empty");
            ContentBundle::default()
        }
        Err(_) => {
            error!(domain = %domain, branch, "[FETCH][ERROR] Branch aborted, treating as empty");
            ContentBundle::default()
        }
    }
}
