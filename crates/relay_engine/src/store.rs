use std::sync::Arc;

use relay_core::FeedSnapshot;
use relay_logging::relay_debug;

use crate::filename::state_file_name;
use crate::persist::{PersistError, StateDir};

/// Durable home of the reconciliation baseline for one feed source.
pub trait SnapshotStore: Send + Sync {
    /// Return the stored snapshot, persisting an empty one on first use.
    fn load(&self) -> Result<FeedSnapshot, PersistError>;

    /// Atomically replace the stored snapshot and hand it back.
    fn save(&self, snapshot: FeedSnapshot) -> Result<FeedSnapshot, PersistError>;
}

pub struct FileSnapshotStore {
    state: Arc<StateDir>,
    filename: String,
}

impl FileSnapshotStore {
    pub fn new(state: Arc<StateDir>, source_id: &str) -> Self {
        Self {
            state,
            filename: state_file_name("snapshot", Some(source_id)),
        }
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn load(&self) -> Result<FeedSnapshot, PersistError> {
        let snapshot = self.state.load_or_init(&self.filename, FeedSnapshot::new)?;
        relay_debug!(
            "Loaded snapshot {} with {} items",
            self.filename,
            snapshot.len()
        );
        Ok(snapshot)
    }

    fn save(&self, snapshot: FeedSnapshot) -> Result<FeedSnapshot, PersistError> {
        self.state.save(&self.filename, &snapshot)?;
        relay_debug!("Saved snapshot {} with {} items", self.filename, snapshot.len());
        Ok(snapshot)
    }
}
