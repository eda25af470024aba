use std::sync::Arc;
use std::time::Duration;

use relay_core::{
    apply_cursor, reconcile, CursorError, Item, ItemId, RebuildReason, ReconcileOptions,
};
use relay_logging::{relay_debug, relay_error, relay_info, relay_warn};
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::time::sleep;

use crate::config::{ConfigError, ConfigProvider, RelaySettings};
use crate::ledger::DeliveryLedger;
use crate::persist::PersistError;
use crate::pipeline::DispatchPipeline;
use crate::queue::PendingQueue;
use crate::sink::EventSink;
use crate::source::{FeedError, FeedSource};
use crate::store::SnapshotStore;
use crate::types::{ItemReport, RelayEvent};

pub const DEFAULT_ENABLED_CHECK_INTERVAL: Duration = Duration::from_secs(5);

/// Why a reconciliation cycle was abandoned. Nothing from an abandoned cycle
/// is committed.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    FeedUnavailable(#[from] FeedError),
    #[error(transparent)]
    UnknownCursor(#[from] CursorError),
    #[error("persistence failure: {0}")]
    Persistence(#[from] PersistError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Commands accepted by [`PollingScheduler::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayCommand {
    /// Queue a manual item for the next iteration.
    Inject(ItemId),
    /// End the current wait and poll immediately.
    PollNow,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleSummary {
    /// Items queued for dispatch this cycle, oldest first.
    pub detected: Vec<Item>,
    pub rebuild: Option<RebuildReason>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationReport {
    pub retried: Vec<ItemReport>,
    pub manual: Vec<ItemReport>,
    pub cycle: CycleSummary,
    pub dispatched: Vec<ItemReport>,
}

#[derive(Debug, Default)]
struct SchedulerState {
    iteration: u64,
    injected: Vec<ItemId>,
}

/// Polls one feed source, reconciles it, and drives the dispatch pipeline.
///
/// All cycles hold the state lock, so at most one reconciliation is ever in
/// flight for this source.
pub struct PollingScheduler {
    source: Arc<dyn FeedSource>,
    store: Arc<dyn SnapshotStore>,
    outbox: PendingQueue,
    processed: Arc<dyn DeliveryLedger>,
    pipeline: DispatchPipeline,
    config: Arc<dyn ConfigProvider>,
    sink: Arc<dyn EventSink>,
    enabled_check_interval: Duration,
    state: Mutex<SchedulerState>,
}

impl PollingScheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: Arc<dyn FeedSource>,
        store: Arc<dyn SnapshotStore>,
        outbox: PendingQueue,
        processed: Arc<dyn DeliveryLedger>,
        pipeline: DispatchPipeline,
        config: Arc<dyn ConfigProvider>,
        sink: Arc<dyn EventSink>,
        enabled_check_interval: Duration,
    ) -> Self {
        Self {
            source,
            store,
            outbox,
            processed,
            pipeline,
            config,
            sink,
            enabled_check_interval,
            state: Mutex::new(SchedulerState::default()),
        }
    }

    pub fn source_id(&self) -> &str {
        self.source.source_id()
    }

    pub fn pipeline(&self) -> &DispatchPipeline {
        &self.pipeline
    }

    pub fn outbox(&self) -> &PendingQueue {
        &self.outbox
    }

    /// Number of committed reconciliation cycles.
    pub async fn iteration(&self) -> u64 {
        self.state.lock().await.iteration
    }

    pub async fn inject(&self, id: impl Into<ItemId>) {
        let id = id.into();
        let mut state = self.state.lock().await;
        if !state.injected.contains(&id) {
            relay_info!("Manual item {} queued", id);
            state.injected.push(id);
        }
    }

    /// Run one reconciliation cycle without dispatching anything.
    pub async fn poll_once(&self) -> Result<CycleSummary, CycleError> {
        let settings = self.config.settings()?;
        let mut state = self.state.lock().await;
        self.reconcile_cycle(&mut state, &settings).await
    }

    /// Retry sweep, manual items, reconciliation, then the outbox.
    ///
    /// The outbox is drained even when reconciliation fails, so items
    /// detected by an earlier cycle are never held back; the cycle error is
    /// returned afterwards.
    pub async fn run_iteration(&self) -> Result<IterationReport, CycleError> {
        let settings = self.config.settings()?;
        let mut state = self.state.lock().await;

        let retried = self.pipeline.retry_pending().await;
        let manual = self.process_manual(&mut state, &settings).await;
        let cycle = self.reconcile_cycle(&mut state, &settings).await;
        let dispatched = self.drain_outbox(settings.settle_delay()).await;

        let cycle = cycle?;
        Ok(IterationReport {
            retried,
            manual,
            cycle,
            dispatched: dispatched?,
        })
    }

    /// Loop until `Shutdown` arrives or every sender is dropped.
    pub async fn run(&self, mut commands: mpsc::UnboundedReceiver<RelayCommand>) {
        relay_info!("[{}] Relay loop started", self.source_id());
        loop {
            let wait = if self.is_enabled() {
                match self.run_iteration().await {
                    Ok(report) => relay_debug!(
                        "[{}] Iteration done: {} detected, {} retried, {} manual",
                        self.source_id(),
                        report.cycle.detected.len(),
                        report.retried.len(),
                        report.manual.len()
                    ),
                    Err(err) => relay_warn!("[{}] Iteration failed: {}", self.source_id(), err),
                }
                self.config
                    .settings()
                    .map(|settings| settings.polling_interval())
                    .unwrap_or(self.enabled_check_interval)
            } else {
                relay_debug!("[{}] Relay disabled; waiting", self.source_id());
                self.enabled_check_interval
            };

            tokio::select! {
                _ = sleep(wait) => {}
                command = commands.recv() => match command {
                    Some(RelayCommand::Inject(id)) => self.inject(id).await,
                    Some(RelayCommand::PollNow) => {}
                    Some(RelayCommand::Shutdown) | None => break,
                },
            }
        }
        relay_info!("[{}] Relay loop stopped", self.source_id());
    }

    fn is_enabled(&self) -> bool {
        match self.config.settings() {
            Ok(settings) => settings.enabled,
            Err(err) => {
                relay_warn!("Settings unavailable, treating relay as disabled: {}", err);
                false
            }
        }
    }

    async fn reconcile_cycle(
        &self,
        state: &mut SchedulerState,
        settings: &RelaySettings,
    ) -> Result<CycleSummary, CycleError> {
        let source_id = self.source.source_id().to_string();
        let live = self.source.fetch_live_feed().await.map_err(|err| {
            relay_warn!("[{}] Live feed unavailable: {}", source_id, err);
            err
        })?;
        let saved = self.store.load()?;

        let options = ReconcileOptions {
            refetch_latest: settings.refetch_latest,
            force_rebuild: state.iteration % settings.refetch_every() == 0,
        };
        let reconciliation = reconcile(&live, &saved, options);
        let candidates = apply_cursor(
            &reconciliation.snapshot,
            reconciliation.newly_appeared,
            settings.start_from(),
        )?;

        let mut detected = Vec::with_capacity(candidates.len());
        for item in candidates {
            if self.processed.has_delivered(&item.id)? {
                relay_debug!("[{}] {} already processed; not re-offered", source_id, item.id);
                continue;
            }
            detected.push(item);
        }

        // Outbox before snapshot: once the snapshot forgets these items as
        // new, the outbox is their only record.
        let added: Vec<&str> = detected
            .iter()
            .filter(|item| !self.outbox.contains(&item.id))
            .map(|item| item.id.as_str())
            .collect();
        self.outbox.enqueue(&detected)?;
        if let Err(err) = self.store.save(reconciliation.snapshot) {
            self.withdraw_from_outbox(&added);
            return Err(err.into());
        }
        state.iteration += 1;

        if let Some(reason) = reconciliation.rebuild {
            self.sink.emit(RelayEvent::SnapshotRebuilt {
                source_id: source_id.clone(),
                reason,
            });
        }
        for item in &detected {
            self.sink.emit(RelayEvent::ItemDetected {
                source_id: source_id.clone(),
                item_id: item.id.clone(),
                title: item.title.clone(),
            });
        }

        Ok(CycleSummary {
            detected,
            rebuild: reconciliation.rebuild,
        })
    }

    /// Undo this cycle's outbox additions after the snapshot failed to commit.
    fn withdraw_from_outbox(&self, ids: &[&str]) {
        for id in ids {
            if let Err(err) = self.outbox.remove(id) {
                relay_error!("Failed to withdraw {} from the outbox: {}", id, err);
            }
        }
    }

    /// Configured items are offered on every iteration and the ledgers keep
    /// that idempotent. Injected items are dropped once no destination failed.
    async fn process_manual(
        &self,
        state: &mut SchedulerState,
        settings: &RelaySettings,
    ) -> Vec<ItemReport> {
        let mut pending: Vec<ItemId> = Vec::new();
        for id in settings.manual_items.iter().chain(state.injected.iter()) {
            if !id.is_empty() && !pending.contains(id) {
                pending.push(id.clone());
            }
        }

        let mut reports = Vec::with_capacity(pending.len());
        for (index, id) in pending.into_iter().enumerate() {
            if index > 0 {
                sleep(settings.settle_delay()).await;
            }
            let item = match self.source.fetch_item(&id).await {
                Ok(item) => item,
                Err(err) => {
                    relay_warn!("Manual item {} could not be resolved: {}", id, err);
                    continue;
                }
            };
            let report = self.pipeline.dispatch(&item).await;
            if !report.has_failures() {
                state.injected.retain(|queued| queued != &id);
            }
            reports.push(report);
        }
        reports
    }

    async fn drain_outbox(&self, settle_delay: Duration) -> Result<Vec<ItemReport>, CycleError> {
        let items = self.outbox.items();
        let mut reports = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            if index > 0 {
                sleep(settle_delay).await;
            }
            let report = self.pipeline.dispatch(item).await;
            // Failed destinations hold the item in their own retry queues,
            // unless writing there failed too.
            if report.has_unrecorded_failures() {
                relay_warn!("{} stays in the outbox; a retry could not be queued", item.id);
            } else {
                self.outbox.remove(&item.id)?;
            }
            reports.push(report);
        }
        Ok(reports)
    }
}
