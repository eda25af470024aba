use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::future::join_all;
use relay_core::{Item, ItemDetail, PolicyVerdict, SkipReason};
use relay_logging::{relay_debug, relay_error, relay_warn};
use tokio::sync::OnceCell;
use tokio::time::sleep;

use crate::config::ConfigProvider;
use crate::destination::Destination;
use crate::ledger::DeliveryLedger;
use crate::publish::publish_with_refresh;
use crate::sink::EventSink;
use crate::source::{DetailFetcher, FeedError};
use crate::types::{DispatchOutcome, ItemReport, RelayEvent};

type SharedDetail = OnceCell<Result<ItemDetail, FeedError>>;

struct Attempt {
    outcome: DispatchOutcome,
    /// Set when a failure could not be written to the retry queue.
    unrecorded: bool,
}

/// Offers items to every destination and records what happened.
///
/// Dispatch errors never escape: each (item, destination) pair ends up as a
/// [`DispatchOutcome`], and failed pairs land in that destination's retry
/// queue.
pub struct DispatchPipeline {
    destinations: Vec<Destination>,
    processed: Arc<dyn DeliveryLedger>,
    details: Arc<dyn DetailFetcher>,
    config: Arc<dyn ConfigProvider>,
    sink: Arc<dyn EventSink>,
}

impl DispatchPipeline {
    pub fn new(
        destinations: Vec<Destination>,
        processed: Arc<dyn DeliveryLedger>,
        details: Arc<dyn DetailFetcher>,
        config: Arc<dyn ConfigProvider>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            destinations,
            processed,
            details,
            config,
            sink,
        }
    }

    pub fn destinations(&self) -> &[Destination] {
        &self.destinations
    }

    pub fn destination(&self, name: &str) -> Option<&Destination> {
        self.destinations.iter().find(|d| d.name() == name)
    }

    /// Offer `item` to all destinations concurrently.
    ///
    /// Item detail is fetched at most once, and only if some destination
    /// gets as far as publishing.
    pub async fn dispatch(&self, item: &Item) -> ItemReport {
        let detail = SharedDetail::new();
        let attempts = join_all(
            self.destinations
                .iter()
                .map(|destination| self.attempt(destination, item, &detail)),
        )
        .await;

        let mut report = ItemReport {
            item_id: item.id.clone(),
            outcomes: Vec::with_capacity(attempts.len()),
            unrecorded: Vec::new(),
        };
        for (destination, attempt) in self.destinations.iter().zip(attempts) {
            if attempt.unrecorded {
                report.unrecorded.push(destination.name().to_string());
            }
            report
                .outcomes
                .push((destination.name().to_string(), attempt.outcome));
        }
        report
    }

    /// Re-offer every queued retry, oldest first within each destination,
    /// pausing for the settle delay between items of one destination.
    pub async fn retry_pending(&self) -> Vec<ItemReport> {
        let settle_delay = match self.config.settings() {
            Ok(settings) => settings.settle_delay(),
            Err(err) => {
                relay_warn!("Settings unavailable, retrying without settle delay: {}", err);
                Duration::ZERO
            }
        };
        let per_destination = join_all(
            self.destinations
                .iter()
                .map(|destination| self.retry_destination(destination, settle_delay)),
        )
        .await;
        per_destination.into_iter().flatten().collect()
    }

    async fn retry_destination(
        &self,
        destination: &Destination,
        settle_delay: Duration,
    ) -> Vec<ItemReport> {
        let queued = destination.retry_queue().items();
        if !queued.is_empty() {
            relay_debug!(
                "[{}] Retrying {} queued item(s)",
                destination.name(),
                queued.len()
            );
        }

        let mut reports = Vec::with_capacity(queued.len());
        for (index, item) in queued.into_iter().enumerate() {
            if index > 0 {
                sleep(settle_delay).await;
            }
            let detail = SharedDetail::new();
            let attempt = self.attempt(destination, &item, &detail).await;
            reports.push(ItemReport {
                item_id: item.id.clone(),
                outcomes: vec![(destination.name().to_string(), attempt.outcome)],
                unrecorded: if attempt.unrecorded {
                    vec![destination.name().to_string()]
                } else {
                    Vec::new()
                },
            });
        }
        reports
    }

    async fn attempt(
        &self,
        destination: &Destination,
        item: &Item,
        detail: &SharedDetail,
    ) -> Attempt {
        let mut outcome = self.resolve(destination, item, detail).await;

        if destination.is_primary()
            && matches!(
                outcome,
                DispatchOutcome::Delivered | DispatchOutcome::Skipped(SkipReason::AlreadyDelivered)
            )
        {
            if let Err(err) = self.processed.mark_delivered(&item.id) {
                outcome = DispatchOutcome::Failed(format!("global ledger write failed: {err}"));
            }
        }

        // Only a delivery settles a queued retry; policy skips may be temporary.
        let queue = destination.retry_queue();
        let mut unrecorded = false;
        match &outcome {
            DispatchOutcome::Failed(_) => {
                if let Err(err) = queue.enqueue(std::slice::from_ref(item)) {
                    relay_error!(
                        "[{}] Failed to queue {} for retry: {}",
                        destination.name(),
                        item.id,
                        err
                    );
                    unrecorded = true;
                }
            }
            DispatchOutcome::Delivered
            | DispatchOutcome::Skipped(SkipReason::AlreadyDelivered) => {
                if let Err(err) = queue.remove(&item.id) {
                    relay_warn!(
                        "[{}] Failed to drop {} from the retry queue: {}",
                        destination.name(),
                        item.id,
                        err
                    );
                }
            }
            DispatchOutcome::Skipped(_) => {}
        }

        self.sink.emit(RelayEvent::Dispatched {
            destination: destination.name().to_string(),
            item_id: item.id.clone(),
            outcome: outcome.clone(),
        });
        Attempt {
            outcome,
            unrecorded,
        }
    }

    async fn resolve(
        &self,
        destination: &Destination,
        item: &Item,
        detail: &SharedDetail,
    ) -> DispatchOutcome {
        let settings = match self.config.settings() {
            Ok(settings) => settings,
            Err(err) => return DispatchOutcome::Failed(format!("configuration unavailable: {err}")),
        };
        let Some(destination_settings) = settings.destination(destination.name()) else {
            return DispatchOutcome::Skipped(SkipReason::Disabled);
        };

        match destination_settings.policy.evaluate(item, Utc::now()) {
            Ok(PolicyVerdict::Eligible) => {}
            Ok(PolicyVerdict::Skip(reason)) => return DispatchOutcome::Skipped(reason),
            Err(err) => return DispatchOutcome::Failed(err.to_string()),
        }

        match destination.ledger().has_delivered(&item.id) {
            Ok(false) => {}
            Ok(true) => return DispatchOutcome::Skipped(SkipReason::AlreadyDelivered),
            Err(err) => return DispatchOutcome::Failed(format!("ledger unavailable: {err}")),
        }

        let detail = detail
            .get_or_init(|| async {
                relay_debug!("Fetching detail for {}", item.id);
                self.details.fetch_item_detail(&item.id).await
            })
            .await;
        let detail = match detail {
            Ok(detail) => detail,
            Err(err) => return DispatchOutcome::Failed(format!("detail fetch failed: {err}")),
        };

        if let Err(err) =
            publish_with_refresh(destination.publisher(), destination.refresher(), item, detail)
                .await
        {
            return DispatchOutcome::Failed(err.to_string());
        }

        match destination.ledger().mark_delivered(&item.id) {
            Ok(()) => DispatchOutcome::Delivered,
            Err(err) => {
                DispatchOutcome::Failed(format!("published but ledger write failed: {err}"))
            }
        }
    }
}
