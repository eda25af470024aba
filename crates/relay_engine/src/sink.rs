use std::sync::mpsc;

use relay_logging::{relay_info, relay_warn};

use crate::types::{DispatchOutcome, RelayEvent};

pub trait EventSink: Send + Sync {
    fn emit(&self, event: RelayEvent);
}

/// Writes every event to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn emit(&self, event: RelayEvent) {
        match event {
            RelayEvent::ItemDetected {
                source_id,
                item_id,
                title,
            } => relay_info!("[{}] New item '{}' ({}) detected", source_id, title, item_id),
            RelayEvent::Dispatched {
                destination,
                item_id,
                outcome: outcome @ DispatchOutcome::Failed(_),
            } => relay_warn!("[{}] Item {} {}", destination, item_id, outcome),
            RelayEvent::Dispatched {
                destination,
                item_id,
                outcome,
            } => relay_info!("[{}] Item {} {}", destination, item_id, outcome),
            RelayEvent::SnapshotRebuilt { source_id, reason } => {
                relay_info!("[{}] Snapshot rebuilt from live feed ({})", source_id, reason)
            }
        }
    }
}

pub struct ChannelEventSink {
    tx: mpsc::Sender<RelayEvent>,
}

impl ChannelEventSink {
    pub fn new(tx: mpsc::Sender<RelayEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: RelayEvent) {
        let _ = self.tx.send(event);
    }
}
