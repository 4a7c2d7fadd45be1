//! Pipeline Orchestrator: sequences listing discovery and follower
//! resolution, merges the results and commits them to the Result Store.
//!
//! `RunStatus` lives in a `watch` channel. Readers take a snapshot of the
//! latest value without waiting on the run, and the busy check plus the move
//! to `running_listing` happen in a single `send_if_modified` call, so two
//! concurrent triggers can never both start a run.
//!
//! Market-data refreshes run outside that gate. They only read the listing
//! and patch prices into whatever snapshot is current when they apply.

use super::merge::{apply_known_handles, canonical_profile};
use crate::cancel::CancellationToken;
use crate::config::PipelineConfig;
use crate::models::{
    CoverageStats, ListingRecord, MergedRecord, RunProgress, RunState, RunStatus, SnapshotOrigin,
};
use crate::network::{Fetcher, HostPacer, ReqwestTransport, Transport};
use crate::resolver::{HandleResolver, ListingResolver};
use crate::store::ResultStore;
use crate::{FollowscanError, Result};
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info, warn};

/// Answer to a trigger request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Accepted { run_id: u64 },
    Busy,
}

struct Inner {
    config: PipelineConfig,
    listing: ListingResolver,
    profiles: HandleResolver,
    store: Arc<ResultStore>,
    status: watch::Sender<RunStatus>,
    run_counter: AtomicU64,
    /// Held while a run is started, while cancelling, and across the last
    /// cancellation check before commit.
    control: Mutex<RunControl>,
}

struct RunControl {
    token: CancellationToken,
    /// The active run passed its last cancellation check and is committing.
    committing: bool,
}

impl RunControl {
    fn idle() -> Self {
        Self {
            token: CancellationToken::new(),
            committing: false,
        }
    }
}

/// Cheap to clone; all clones drive the same state machine.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    /// Build an orchestrator over `transport`. All fetches share one per-host
    /// pacer configured from `config.min_interval`.
    pub fn new(
        config: PipelineConfig,
        transport: Arc<dyn Transport>,
        store: Arc<ResultStore>,
    ) -> Result<Self> {
        config.validate()?;

        let fetcher = Fetcher::new(transport, HostPacer::new(config.min_interval));
        let max_pages = if config.page_param.is_some() {
            config.max_pages
        } else {
            1
        };
        let listing = ListingResolver::new(
            fetcher.clone(),
            config.fetch.clone(),
            &config.social_domains,
        )
        .with_pagination(config.page_param.clone(), max_pages);
        let profiles = HandleResolver::new(fetcher, config.fetch.clone());
        let (status, _) = watch::channel(RunStatus::idle());

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                listing,
                profiles,
                store,
                status,
                run_counter: AtomicU64::new(0),
                control: Mutex::new(RunControl::idle()),
            }),
        })
    }

    /// Orchestrator using the real HTTP transport and a store exporting to
    /// `config.data_dir` when set.
    pub fn with_reqwest(config: PipelineConfig) -> Result<Self> {
        let transport = Arc::new(ReqwestTransport::new()?);
        let store = match &config.data_dir {
            Some(dir) => ResultStore::with_data_dir(dir.clone()),
            None => ResultStore::new(),
        };
        Self::new(config, transport, Arc::new(store))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<ResultStore> {
        &self.inner.store
    }

    /// Latest status. Never waits on a running step.
    pub fn status(&self) -> RunStatus {
        self.inner.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RunStatus> {
        self.inner.status.subscribe()
    }

    /// Start a run in the background unless one is already active.
    ///
    /// A busy trigger changes neither the status nor the store.
    pub async fn trigger(&self) -> TriggerOutcome {
        let Some((run_id, token)) = self.begin().await else {
            info!("Trigger rejected: a run is already active");
            return TriggerOutcome::Busy;
        };

        let _supervisor = self.spawn_supervised(run_id, token);
        TriggerOutcome::Accepted { run_id }
    }

    /// Run the pipeline once and return the final status.
    pub async fn run_to_completion(&self) -> Result<RunStatus> {
        let (run_id, token) = self.begin().await.ok_or(FollowscanError::Busy)?;
        self.spawn_supervised(run_id, token)
            .await
            .map_err(|e| FollowscanError::Other(format!("run {} supervisor failed: {}", run_id, e)))
    }

    /// Request cancellation of the active run.
    ///
    /// Returns `false` when idle or when the run has already begun its
    /// commit; a run reported as cancelling never commits.
    pub async fn cancel(&self) -> bool {
        let control = self.inner.control.lock().await;
        let (active, run_id) = {
            let status = self.inner.status.borrow();
            (status.state.is_active(), status.run_id)
        };
        if !active {
            return false;
        }
        if control.committing {
            info!("Cancellation ignored: run {} is already committing", run_id);
            return false;
        }
        info!("Cancellation requested for run {}", run_id);
        control.token.cancel();
        true
    }

    /// Wait until no run is active and return that status.
    pub async fn wait_until_finished(&self) -> RunStatus {
        let mut rx = self.subscribe();
        let finished = match rx.wait_for(|status| !status.state.is_active()).await {
            Ok(status) => status.clone(),
            Err(_) => self.status(),
        };
        finished
    }

    /// Refresh price and market cap of the current snapshot from the listing
    /// pages alone, keeping all social data. Returns how many records changed.
    ///
    /// Does not take the run gate and leaves `RunStatus` alone.
    pub async fn refresh_market_data(&self) -> Result<usize> {
        let config = &self.inner.config;
        let quotes = self
            .inner
            .listing
            .market_quotes(&config.listing_url, config.limit)
            .await?;
        if quotes.is_empty() {
            warn!("Market refresh found no listing entries");
            return Ok(0);
        }
        self.inner.store.apply_market_quotes(&quotes).await
    }

    /// Trigger a run every `every`, starting now. Busy ticks are skipped.
    pub fn spawn_schedule(&self, every: Duration) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                match this.trigger().await {
                    TriggerOutcome::Accepted { run_id } => info!("Scheduled run {} started", run_id),
                    TriggerOutcome::Busy => warn!("Scheduled run skipped: previous run still active"),
                }
            }
        })
    }

    /// Refresh market data every `every`, first after one interval.
    pub fn spawn_market_refresh(&self, every: Duration) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + every, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                match this.refresh_market_data().await {
                    Ok(0) => info!("Market refresh: no prices changed"),
                    Ok(changed) => info!("Market refresh updated {} records", changed),
                    Err(e) => warn!("Market refresh failed: {}", e),
                }
            }
        })
    }

    /// Run `execute` on its own task. A panic in it ends the run as failed
    /// instead of leaving the status stuck in a running state.
    fn spawn_supervised(&self, run_id: u64, token: CancellationToken) -> JoinHandle<RunStatus> {
        let worker = self.clone();
        let handle = tokio::spawn(async move { worker.execute(run_id, token).await });

        let supervisor = self.clone();
        tokio::spawn(async move {
            match handle.await {
                Ok(status) => status,
                Err(e) => {
                    error!("Run {} task ended abnormally: {}", run_id, e);
                    supervisor.finish(run_id, RunState::Failed, "internal error")
                }
            }
        })
    }

    async fn begin(&self) -> Option<(u64, CancellationToken)> {
        let mut control = self.inner.control.lock().await;

        let mut accepted = None;
        self.inner.status.send_if_modified(|status| {
            if status.state.is_active() {
                return false;
            }
            let run_id = self.inner.run_counter.fetch_add(1, Ordering::SeqCst) + 1;
            *status = RunStatus::started(run_id);
            accepted = Some(run_id);
            true
        });

        let run_id = accepted?;
        let token = CancellationToken::new();
        *control = RunControl {
            token: token.clone(),
            committing: false,
        };
        Some((run_id, token))
    }

    async fn execute(&self, run_id: u64, token: CancellationToken) -> RunStatus {
        info!("Run {} started", run_id);
        let (state, message) = match self.run_stages(run_id, &token).await {
            Ok(summary) => (RunState::Succeeded, summary),
            Err(FollowscanError::Cancelled) => {
                let progress = self.status().progress;
                (
                    RunState::Cancelled,
                    format!(
                        "cancelled after {} of {} records; results unchanged",
                        progress.completed, progress.total
                    ),
                )
            }
            Err(e) => (RunState::Failed, e.to_string()),
        };

        match state {
            RunState::Succeeded => info!("Run {} succeeded: {}", run_id, message),
            RunState::Cancelled => warn!("Run {} {}", run_id, message),
            _ => error!("Run {} failed: {}", run_id, message),
        }
        self.finish(run_id, state, message)
    }

    async fn run_stages(&self, run_id: u64, token: &CancellationToken) -> Result<String> {
        let config = &self.inner.config;

        let listings = self
            .inner
            .listing
            .resolve_listing(&config.listing_url, config.limit)
            .await?;
        if listings.is_empty() {
            return Err(FollowscanError::Other(
                "listing source returned no entries".to_string(),
            ));
        }
        token.check()?;

        let previous = self.inner.store.get().await;
        let listings: Vec<ListingRecord> = apply_known_handles(listings, &previous)
            .into_iter()
            .map(|record| canonical_profile(record, config))
            .collect();

        let total = listings.len();
        self.update(run_id, |status| {
            status.transition(
                RunState::RunningResolution,
                format!("resolving followers for {} projects", total),
            );
            status.progress = RunProgress {
                total,
                ..RunProgress::default()
            };
        });

        let mut merged = Vec::with_capacity(total);
        let mut coverage = CoverageStats::default();
        for listing in listings {
            token.check()?;
            let record = self.resolve_one(listing).await;
            coverage.record(&record.social);
            merged.push(record);

            self.update(run_id, |status| {
                status.progress = RunProgress {
                    total,
                    completed: coverage.total,
                    resolved: coverage.resolved,
                    unresolved: coverage.unresolved,
                    no_handle: coverage.no_handle,
                };
                status.updated_at = Utc::now();
            });
        }
        {
            let mut control = self.inner.control.lock().await;
            token.check()?;
            control.committing = true;
        }

        self.inner.store.commit(merged, SnapshotOrigin::Run).await?;
        Ok(coverage.summary())
    }

    async fn resolve_one(&self, listing: ListingRecord) -> MergedRecord {
        let (Some(handle), Some(profile_url)) = (listing.handle.clone(), listing.profile_url.clone())
        else {
            return MergedRecord::without_handle(listing, Utc::now());
        };

        match self.inner.profiles.resolve_followers(&handle, &profile_url).await {
            Ok(record) => MergedRecord::with_followers(listing, record),
            Err(e) => {
                warn!("@{}: {}", handle, e);
                MergedRecord::unresolved(listing, e.to_string(), Utc::now())
            }
        }
    }

    fn update(&self, run_id: u64, apply: impl FnOnce(&mut RunStatus)) {
        self.inner.status.send_if_modified(|status| {
            if status.run_id != run_id || !status.state.is_active() {
                return false;
            }
            apply(status);
            true
        });
    }

    fn finish(&self, run_id: u64, state: RunState, message: impl Into<String>) -> RunStatus {
        let message = message.into();
        self.update(run_id, |status| status.transition(state, message));
        self.status()
    }
}
