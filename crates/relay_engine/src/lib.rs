//! Relay engine: durable state, dispatch, and the polling loop.
mod builder;
mod config;
mod destination;
mod filename;
mod handle;
mod ledger;
mod persist;
mod pipeline;
mod publish;
mod queue;
mod scheduler;
mod sink;
mod source;
mod store;
mod types;
mod webhook;

pub use builder::{BuildError, RelayBuilder};
pub use config::{
    ConfigError, ConfigProvider, DestinationKind, DestinationSettings, JsonFileConfig,
    RelaySettings, StaticConfig, DEFAULT_SETTINGS_FILE, SETTINGS_FILE_ENV,
};
pub use destination::{Destination, DestinationRole};
pub use filename::state_file_name;
pub use handle::RelayHandle;
pub use ledger::{DeliveryLedger, FileLedger};
pub use persist::{ensure_state_dir, AtomicFileWriter, PersistError, StateDir};
pub use pipeline::DispatchPipeline;
pub use publish::{publish_with_refresh, CredentialRefresher, PublishError, Publisher};
pub use queue::PendingQueue;
pub use scheduler::{
    CycleError, CycleSummary, IterationReport, PollingScheduler, RelayCommand,
    DEFAULT_ENABLED_CHECK_INTERVAL,
};
pub use sink::{ChannelEventSink, EventSink, LogEventSink};
pub use source::{DetailFetcher, FeedError, FeedSource};
pub use store::{FileSnapshotStore, SnapshotStore};
pub use types::{DispatchOutcome, ItemReport, RelayEvent};
pub use webhook::{clip_text, WebhookPublisher, WebhookSettings};
