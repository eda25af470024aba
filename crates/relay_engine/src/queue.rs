use std::sync::{Arc, Mutex, PoisonError};

use relay_core::Item;
use serde::{Deserialize, Serialize};

use crate::filename::state_file_name;
use crate::persist::{PersistError, StateDir};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PersistedQueue {
    items: Vec<Item>,
}

/// Durable FIFO of items awaiting (re)dispatch, unique by id.
///
/// Backs both the per-source outbox and each destination's retry queue.
pub struct PendingQueue {
    state: Arc<StateDir>,
    filename: String,
    items: Mutex<Vec<Item>>,
}

impl PendingQueue {
    pub fn outbox(state: Arc<StateDir>, source_id: &str) -> Result<Self, PersistError> {
        Self::open(state, state_file_name("outbox", Some(source_id)))
    }

    pub fn retry(state: Arc<StateDir>, destination: &str) -> Result<Self, PersistError> {
        Self::open(state, state_file_name("retry", Some(destination)))
    }

    fn open(state: Arc<StateDir>, filename: String) -> Result<Self, PersistError> {
        let persisted: PersistedQueue = state.load_or_init(&filename, PersistedQueue::default)?;
        Ok(Self {
            state,
            filename,
            items: Mutex::new(persisted.items),
        })
    }

    /// Copy of the queued items, oldest first.
    pub fn items(&self) -> Vec<Item> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|item| item.id == id)
    }

    /// Append items not already queued; returns how many were added.
    pub fn enqueue(&self, new_items: &[Item]) -> Result<usize, PersistError> {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = items.clone();
        for item in new_items {
            if !next.iter().any(|queued| queued.id == item.id) {
                next.push(item.clone());
            }
        }
        let added = next.len() - items.len();
        if added == 0 {
            return Ok(0);
        }
        self.state.save(&self.filename, &PersistedQueue { items: next.clone() })?;
        *items = next;
        Ok(added)
    }

    /// Drop `id` from the queue; returns whether it was queued.
    pub fn remove(&self, id: &str) -> Result<bool, PersistError> {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        if !items.iter().any(|item| item.id == id) {
            return Ok(false);
        }
        let next: Vec<Item> = items.iter().filter(|item| item.id != id).cloned().collect();
        self.state.save(&self.filename, &PersistedQueue { items: next.clone() })?;
        *items = next;
        Ok(true)
    }
}
