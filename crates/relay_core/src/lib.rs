//! Relay core: pure feed reconciliation and dispatch policy logic.
mod cursor;
mod item;
mod policy;
mod reconcile;
mod snapshot;

pub use cursor::{apply_cursor, CursorError};
pub use item::{Item, ItemDetail, ItemId};
pub use policy::{DispatchPolicy, PolicyError, PolicyVerdict, SkipReason};
pub use reconcile::{
    reconcile, RebuildReason, ReconcileOptions, Reconciliation, DEFAULT_REFETCH_LATEST,
};
pub use snapshot::FeedSnapshot;
