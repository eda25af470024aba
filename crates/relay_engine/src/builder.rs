use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use relay_logging::relay_info;
use thiserror::Error;

use crate::config::{ConfigError, ConfigProvider, DestinationKind, DestinationSettings};
use crate::destination::{Destination, DestinationRole};
use crate::ledger::{DeliveryLedger, FileLedger};
use crate::persist::{PersistError, StateDir};
use crate::pipeline::DispatchPipeline;
use crate::publish::{CredentialRefresher, Publisher};
use crate::queue::PendingQueue;
use crate::scheduler::{PollingScheduler, DEFAULT_ENABLED_CHECK_INTERVAL};
use crate::sink::{EventSink, LogEventSink};
use crate::source::{DetailFetcher, FeedSource};
use crate::store::{FileSnapshotStore, SnapshotStore};
use crate::webhook::{WebhookPublisher, WebhookSettings};

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Persistence(#[from] PersistError),
}

/// Assembles a [`PollingScheduler`] from settings and collaborators.
///
/// Destinations are created here, once. Webhook destinations get a
/// [`WebhookPublisher`] unless a publisher was registered for their name;
/// podcast and blog destinations need a publisher registered for their kind
/// or name.
pub struct RelayBuilder {
    state_dir: PathBuf,
    source: Arc<dyn FeedSource>,
    details: Arc<dyn DetailFetcher>,
    config: Arc<dyn ConfigProvider>,
    sink: Arc<dyn EventSink>,
    store: Option<Arc<dyn SnapshotStore>>,
    kind_publishers: HashMap<DestinationKind, Arc<dyn Publisher>>,
    named_publishers: HashMap<String, Arc<dyn Publisher>>,
    refreshers: HashMap<String, Arc<dyn CredentialRefresher>>,
    webhook: WebhookSettings,
    enabled_check_interval: Duration,
}

impl RelayBuilder {
    pub fn new(
        state_dir: impl Into<PathBuf>,
        source: Arc<dyn FeedSource>,
        details: Arc<dyn DetailFetcher>,
        config: Arc<dyn ConfigProvider>,
    ) -> Self {
        Self {
            state_dir: state_dir.into(),
            source,
            details,
            config,
            sink: Arc::new(LogEventSink),
            store: None,
            kind_publishers: HashMap::new(),
            named_publishers: HashMap::new(),
            refreshers: HashMap::new(),
            webhook: WebhookSettings::default(),
            enabled_check_interval: DEFAULT_ENABLED_CHECK_INTERVAL,
        }
    }

    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Replace the file-backed snapshot store.
    pub fn snapshot_store(mut self, store: Arc<dyn SnapshotStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn publisher_for_kind(
        mut self,
        kind: DestinationKind,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        self.kind_publishers.insert(kind, publisher);
        self
    }

    pub fn publisher_for(
        mut self,
        destination: impl Into<String>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        self.named_publishers.insert(destination.into(), publisher);
        self
    }

    pub fn refresher_for(
        mut self,
        destination: impl Into<String>,
        refresher: Arc<dyn CredentialRefresher>,
    ) -> Self {
        self.refreshers.insert(destination.into(), refresher);
        self
    }

    pub fn webhook_settings(mut self, settings: WebhookSettings) -> Self {
        self.webhook = settings;
        self
    }

    pub fn enabled_check_interval(mut self, interval: Duration) -> Self {
        self.enabled_check_interval = interval;
        self
    }

    pub fn build(mut self) -> Result<PollingScheduler, BuildError> {
        let settings = self.config.settings()?;
        validate_destinations(&settings.destinations)?;

        let state = Arc::new(StateDir::open(self.state_dir.clone())?);
        let source_id = self.source.source_id().to_string();

        let mut destinations = Vec::with_capacity(settings.destinations.len());
        for destination_settings in &settings.destinations {
            destinations.push(self.build_destination(state.clone(), destination_settings)?);
        }

        let processed: Arc<dyn DeliveryLedger> = Arc::new(FileLedger::processed(state.clone())?);
        let store = match self.store.take() {
            Some(store) => store,
            None => Arc::new(FileSnapshotStore::new(state.clone(), &source_id)),
        };
        let outbox = PendingQueue::outbox(state.clone(), &source_id)?;

        relay_info!(
            "[{}] Relay built with {} destination(s), state in {:?}",
            source_id,
            destinations.len(),
            state.path()
        );

        let pipeline = DispatchPipeline::new(
            destinations,
            processed.clone(),
            self.details.clone(),
            self.config.clone(),
            self.sink.clone(),
        );
        Ok(PollingScheduler::new(
            self.source,
            store,
            outbox,
            processed,
            pipeline,
            self.config,
            self.sink,
            self.enabled_check_interval,
        ))
    }

    fn build_destination(
        &self,
        state: Arc<StateDir>,
        settings: &DestinationSettings,
    ) -> Result<Destination, BuildError> {
        let publisher = match self.named_publishers.get(&settings.name) {
            Some(publisher) => publisher.clone(),
            None => self.publisher_for_settings(settings)?,
        };

        let role = if settings.primary {
            DestinationRole::Primary
        } else {
            DestinationRole::Secondary
        };
        let mut destination =
            Destination::open(state, &settings.name, settings.kind, publisher)?.with_role(role);
        if let Some(refresher) = self.refreshers.get(&settings.name) {
            destination = destination.with_refresher(refresher.clone());
        }
        Ok(destination)
    }

    fn publisher_for_settings(
        &self,
        settings: &DestinationSettings,
    ) -> Result<Arc<dyn Publisher>, BuildError> {
        if let Some(publisher) = self.kind_publishers.get(&settings.kind) {
            return Ok(publisher.clone());
        }
        match settings.kind {
            DestinationKind::Webhook => {
                if settings.webhook_urls.is_empty() {
                    return Err(invalid(format!(
                        "webhook destination '{}' has no urls",
                        settings.name
                    )));
                }
                let webhook = WebhookSettings {
                    text_max_length: settings.text_max_length,
                    ..self.webhook.clone()
                };
                let publisher = WebhookPublisher::new(&settings.webhook_urls, webhook)
                    .map_err(|err| invalid(format!("destination '{}': {err}", settings.name)))?;
                Ok(Arc::new(publisher))
            }
            kind => Err(invalid(format!(
                "no publisher registered for {kind:?} destination '{}'",
                settings.name
            ))),
        }
    }
}

fn validate_destinations(destinations: &[DestinationSettings]) -> Result<(), BuildError> {
    let mut names = HashSet::new();
    for destination in destinations {
        if destination.name.is_empty() {
            return Err(invalid("destination name must not be empty".to_string()));
        }
        if !names.insert(destination.name.as_str()) {
            return Err(invalid(format!(
                "destination name '{}' is used twice",
                destination.name
            )));
        }
    }

    let primaries = destinations.iter().filter(|d| d.primary).count();
    if primaries > 1 {
        return Err(invalid(format!(
            "{primaries} destinations are marked primary; at most one is allowed"
        )));
    }
    Ok(())
}

fn invalid(message: String) -> BuildError {
    BuildError::Config(ConfigError::Invalid(message))
}
