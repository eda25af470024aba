use std::collections::HashSet;
use std::fmt;

use crate::{FeedSnapshot, Item};

/// Number of most recent items compared positionally when none is configured.
pub const DEFAULT_REFETCH_LATEST: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Size of the overlap window re-verified against the live feed.
    pub refetch_latest: usize,
    /// Rebuild from the live feed regardless of counts (periodic safety net).
    pub force_rebuild: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            refetch_latest: DEFAULT_REFETCH_LATEST,
            force_rebuild: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildReason {
    /// The feed shrank, or kept its size while its newest window changed.
    Deletion,
    /// Forced by the periodic refetch counter.
    Periodic,
    /// The feed grew but the overlap window no longer lines up.
    Drift,
}

impl fmt::Display for RebuildReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RebuildReason::Deletion => write!(f, "deletion"),
            RebuildReason::Periodic => write!(f, "periodic"),
            RebuildReason::Drift => write!(f, "drift"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// Snapshot to persist at the end of the cycle.
    pub snapshot: FeedSnapshot,
    /// Items absent from the saved snapshot, oldest first.
    pub newly_appeared: Vec<Item>,
    /// Set when the snapshot was rebuilt from the live feed.
    pub rebuild: Option<RebuildReason>,
}

/// Diff a live listing (newest first) against the saved snapshot.
pub fn reconcile(live: &[Item], saved: &FeedSnapshot, options: ReconcileOptions) -> Reconciliation {
    let old_count = saved.len();
    let new_count = live.len();
    let window = options.refetch_latest.min(old_count).min(new_count);

    let (snapshot, rebuild) = if options.force_rebuild {
        (FeedSnapshot::from_newest_first(live), Some(RebuildReason::Periodic))
    } else if old_count > new_count {
        (FeedSnapshot::from_newest_first(live), Some(RebuildReason::Deletion))
    } else if old_count == new_count {
        if window_matches(live, saved, 0, window) {
            (saved.clone(), None)
        } else {
            (FeedSnapshot::from_newest_first(live), Some(RebuildReason::Deletion))
        }
    } else {
        let delta = new_count - old_count;
        if window_matches(live, saved, delta, window) {
            (extend(live, saved, delta, options.refetch_latest), None)
        } else {
            (FeedSnapshot::from_newest_first(live), Some(RebuildReason::Drift))
        }
    };

    let newly_appeared = snapshot
        .items()
        .iter()
        .filter(|item| !saved.contains(&item.id))
        .cloned()
        .collect();

    Reconciliation {
        snapshot,
        newly_appeared,
        rebuild,
    }
}

/// `live[offset + i]` must be the `i`-th newest saved item for every `i` in the window.
fn window_matches(live: &[Item], saved: &FeedSnapshot, offset: usize, window: usize) -> bool {
    (0..window).all(|i| match (live.get(offset + i), saved.nth_newest(i)) {
        (Some(fresh), Some(old)) => fresh.id == old.id,
        _ => false,
    })
}

fn extend(
    live: &[Item],
    saved: &FeedSnapshot,
    delta: usize,
    refetch_latest: usize,
) -> FeedSnapshot {
    let head_len = (delta + refetch_latest).min(live.len());
    let overlap = refetch_latest.min(saved.len());
    let retained = &saved.items()[..saved.len() - overlap];

    let head: Vec<Item> = live[..head_len].iter().rev().cloned().collect();
    let head_ids: HashSet<&str> = head.iter().map(|item| item.id.as_str()).collect();

    FeedSnapshot::from_ascending(
        retained
            .iter()
            .filter(|item| !head_ids.contains(item.id.as_str()))
            .cloned()
            .chain(head.iter().cloned()),
    )
}
