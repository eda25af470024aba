use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};

use relay_logging::relay_debug;
use serde::{Deserialize, Serialize};

use crate::filename::state_file_name;
use crate::persist::{PersistError, StateDir};

/// Durable set of item ids already acted upon by one owner.
pub trait DeliveryLedger: Send + Sync {
    fn has_delivered(&self, id: &str) -> Result<bool, PersistError>;

    /// Idempotent: marking an id twice is a no-op.
    fn mark_delivered(&self, id: &str) -> Result<(), PersistError>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PersistedLedger {
    delivered: BTreeSet<String>,
}

/// Ledger kept in memory and written through to a RON file on every new id.
pub struct FileLedger {
    state: Arc<StateDir>,
    filename: String,
    delivered: Mutex<BTreeSet<String>>,
}

impl FileLedger {
    /// The ledger of one destination.
    pub fn for_destination(state: Arc<StateDir>, destination: &str) -> Result<Self, PersistError> {
        let filename = state_file_name("delivered", Some(destination));
        Self::open(state, filename)
    }

    /// The globally processed ledger.
    pub fn processed(state: Arc<StateDir>) -> Result<Self, PersistError> {
        Self::open(state, state_file_name("processed", None))
    }

    fn open(state: Arc<StateDir>, filename: String) -> Result<Self, PersistError> {
        let persisted: PersistedLedger = state.load_or_init(&filename, PersistedLedger::default)?;
        relay_debug!(
            "Opened ledger {} with {} ids",
            filename,
            persisted.delivered.len()
        );
        Ok(Self {
            state,
            filename,
            delivered: Mutex::new(persisted.delivered),
        })
    }

    pub fn len(&self) -> usize {
        self.delivered.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DeliveryLedger for FileLedger {
    fn has_delivered(&self, id: &str) -> Result<bool, PersistError> {
        let delivered = self.delivered.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(delivered.contains(id))
    }

    fn mark_delivered(&self, id: &str) -> Result<(), PersistError> {
        let mut delivered = self.delivered.lock().unwrap_or_else(PoisonError::into_inner);
        if delivered.contains(id) {
            return Ok(());
        }

        // Commit to disk before the in-memory view changes.
        let mut next = PersistedLedger {
            delivered: delivered.clone(),
        };
        next.delivered.insert(id.to_string());
        self.state.save(&self.filename, &next)?;
        *delivered = next.delivered;
        Ok(())
    }
}
