use std::fmt;

use relay_core::{ItemId, RebuildReason, SkipReason};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered,
    Skipped(SkipReason),
    Failed(String),
}

impl DispatchOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, DispatchOutcome::Failed(_))
    }
}

impl fmt::Display for DispatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchOutcome::Delivered => write!(f, "delivered"),
            DispatchOutcome::Skipped(reason) => write!(f, "skipped ({reason})"),
            DispatchOutcome::Failed(message) => write!(f, "failed ({message})"),
        }
    }
}

/// Observation points of the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    ItemDetected {
        source_id: String,
        item_id: ItemId,
        title: String,
    },
    Dispatched {
        destination: String,
        item_id: ItemId,
        outcome: DispatchOutcome,
    },
    SnapshotRebuilt {
        source_id: String,
        reason: RebuildReason,
    },
}

/// Per-destination outcomes for one item, in destination order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemReport {
    pub item_id: ItemId,
    pub outcomes: Vec<(String, DispatchOutcome)>,
    /// Destinations whose failure could not be written to their retry queue.
    pub unrecorded: Vec<String>,
}

impl ItemReport {
    /// True when some failure exists only in this report, so the caller must
    /// keep the item around itself.
    pub fn has_unrecorded_failures(&self) -> bool {
        !self.unrecorded.is_empty()
    }

    pub fn has_failures(&self) -> bool {
        self.outcomes.iter().any(|(_, outcome)| outcome.is_failure())
    }

    pub fn outcome(&self, destination: &str) -> Option<&DispatchOutcome> {
        self.outcomes
            .iter()
            .find(|(name, _)| name == destination)
            .map(|(_, outcome)| outcome)
    }
}
