use std::fmt;
use std::sync::Arc;

use crate::config::DestinationKind;
use crate::ledger::{DeliveryLedger, FileLedger};
use crate::persist::{PersistError, StateDir};
use crate::publish::{CredentialRefresher, Publisher};
use crate::queue::PendingQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationRole {
    /// Deliveries also mark the globally processed ledger.
    Primary,
    Secondary,
}

/// One downstream target with its own ledger and retry queue.
///
/// Built once at startup; its policy is looked up by `name` in the
/// configuration on every dispatch.
pub struct Destination {
    name: String,
    kind: DestinationKind,
    role: DestinationRole,
    publisher: Arc<dyn Publisher>,
    refresher: Option<Arc<dyn CredentialRefresher>>,
    ledger: Arc<dyn DeliveryLedger>,
    retry: PendingQueue,
}

impl Destination {
    pub fn new(
        name: impl Into<String>,
        kind: DestinationKind,
        publisher: Arc<dyn Publisher>,
        ledger: Arc<dyn DeliveryLedger>,
        retry: PendingQueue,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            role: DestinationRole::Secondary,
            publisher,
            refresher: None,
            ledger,
            retry,
        }
    }

    /// Destination backed by its file ledger and retry queue in `state`.
    pub fn open(
        state: Arc<StateDir>,
        name: &str,
        kind: DestinationKind,
        publisher: Arc<dyn Publisher>,
    ) -> Result<Self, PersistError> {
        let ledger = Arc::new(FileLedger::for_destination(state.clone(), name)?);
        let retry = PendingQueue::retry(state, name)?;
        Ok(Self::new(name, kind, publisher, ledger, retry))
    }

    pub fn with_role(mut self, role: DestinationRole) -> Self {
        self.role = role;
        self
    }

    pub fn with_refresher(mut self, refresher: Arc<dyn CredentialRefresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> DestinationKind {
        self.kind
    }

    pub fn is_primary(&self) -> bool {
        self.role == DestinationRole::Primary
    }

    pub fn publisher(&self) -> &dyn Publisher {
        self.publisher.as_ref()
    }

    pub fn refresher(&self) -> Option<&dyn CredentialRefresher> {
        self.refresher.as_deref()
    }

    pub fn ledger(&self) -> &dyn DeliveryLedger {
        self.ledger.as_ref()
    }

    pub fn retry_queue(&self) -> &PendingQueue {
        &self.retry
    }
}

impl fmt::Debug for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Destination")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("role", &self.role)
            .field("pending_retries", &self.retry.len())
            .finish()
    }
}
