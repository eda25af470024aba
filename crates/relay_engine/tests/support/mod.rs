#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use relay_core::{Item, ItemDetail};
use relay_engine::{
    ChannelEventSink, CredentialRefresher, DestinationKind, DestinationSettings, DetailFetcher,
    FeedError, FeedSource, PollingScheduler, PublishError, Publisher, RelayBuilder, RelayEvent,
    RelaySettings, StaticConfig,
};
use tempfile::TempDir;

pub fn init_logging() {
    relay_logging::initialize_for_tests();
}

pub fn item(n: u32) -> Item {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    Item::new(
        format!("item{n}"),
        format!("Episode {n}"),
        base + Duration::minutes(i64::from(n)),
    )
}

/// Live listing for the given chronological ids, newest first.
pub fn feed(ids: &[u32]) -> Vec<Item> {
    ids.iter().rev().map(|n| item(*n)).collect()
}

pub fn ids(items: &[Item]) -> Vec<String> {
    items.iter().map(|item| item.id.clone()).collect()
}

pub struct FakeSource {
    id: String,
    live: Mutex<Result<Vec<Item>, FeedError>>,
    catalog: Mutex<HashMap<String, Item>>,
}

impl FakeSource {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            live: Mutex::new(Ok(Vec::new())),
            catalog: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_live(&self, items: Vec<Item>) {
        for item in &items {
            self.add_item(item.clone());
        }
        *self.live.lock().unwrap() = Ok(items);
    }

    pub fn fail_live(&self) {
        *self.live.lock().unwrap() = Err(FeedError::Unavailable {
            source_id: self.id.clone(),
            message: "upstream timeout".to_string(),
        });
    }

    pub fn add_item(&self, item: Item) {
        self.catalog.lock().unwrap().insert(item.id.clone(), item);
    }
}

#[async_trait]
impl FeedSource for FakeSource {
    fn source_id(&self) -> &str {
        &self.id
    }

    async fn fetch_live_feed(&self) -> Result<Vec<Item>, FeedError> {
        self.live.lock().unwrap().clone()
    }

    async fn fetch_item(&self, id: &str) -> Result<Item, FeedError> {
        self.catalog
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| FeedError::ItemNotFound { id: id.to_string() })
    }
}

#[derive(Default)]
pub struct FakeDetails {
    calls: AtomicUsize,
    fail: AtomicBool,
}

impl FakeDetails {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl DetailFetcher for FakeDetails {
    async fn fetch_item_detail(&self, id: &str) -> Result<ItemDetail, FeedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(FeedError::ItemNotFound { id: id.to_string() });
        }
        Ok(ItemDetail {
            description: format!("Description of {id}"),
            media_locator: Some(format!("https://media.example/{id}.mp4")),
            ..ItemDetail::default()
        })
    }
}

/// Records every publish attempt; configurable failures per item id.
#[derive(Default)]
pub struct RecordingPublisher {
    attempts: Mutex<Vec<String>>,
    delivered: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
    auth_failures: AtomicUsize,
}

impl RecordingPublisher {
    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn delivered(&self) -> Vec<String> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn fail_on(&self, id: &str) {
        self.failing.lock().unwrap().insert(id.to_string());
    }

    pub fn recover(&self, id: &str) {
        self.failing.lock().unwrap().remove(id);
    }

    /// Answer the next `count` publishes with `AuthExpired`.
    pub fn expire_auth(&self, count: usize) {
        self.auth_failures.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, item: &Item, _detail: &ItemDetail) -> Result<(), PublishError> {
        self.attempts.lock().unwrap().push(item.id.clone());
        let expired = self
            .auth_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if expired {
            return Err(PublishError::AuthExpired("token expired".to_string()));
        }
        if self.failing.lock().unwrap().contains(&item.id) {
            return Err(PublishError::Rejected {
                status: 503,
                message: "try later".to_string(),
            });
        }
        self.delivered.lock().unwrap().push(item.id.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct CountingRefresher {
    count: AtomicUsize,
}

impl CountingRefresher {
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialRefresher for CountingRefresher {
    async fn refresh(&self) -> Result<(), PublishError> {
        self.count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn destination(name: &str, primary: bool) -> DestinationSettings {
    let mut settings = DestinationSettings::new(name, DestinationKind::Podcast);
    settings.primary = primary;
    settings
}

/// Settings with no waiting and no periodic rebuild after the first cycle.
pub fn quick_settings(destinations: Vec<DestinationSettings>) -> RelaySettings {
    RelaySettings {
        polling_interval_secs: 0.0,
        settle_delay_secs: 0.0,
        iterations_until_refetch: 1000,
        destinations,
        ..RelaySettings::default()
    }
}

/// Fakes wired around one state directory; `scheduler()` may be called again
/// to simulate a restart.
pub struct Harness {
    pub dir: TempDir,
    pub source: Arc<FakeSource>,
    pub details: Arc<FakeDetails>,
    pub config: Arc<StaticConfig>,
    pub publishers: HashMap<String, Arc<RecordingPublisher>>,
    pub refresher: Arc<CountingRefresher>,
    events_tx: mpsc::Sender<RelayEvent>,
    events_rx: mpsc::Receiver<RelayEvent>,
}

impl Harness {
    pub fn new(destinations: Vec<DestinationSettings>) -> Self {
        init_logging();
        let publishers = destinations
            .iter()
            .map(|d| (d.name.clone(), Arc::new(RecordingPublisher::default())))
            .collect();
        let (events_tx, events_rx) = mpsc::channel();
        Self {
            dir: TempDir::new().unwrap(),
            source: Arc::new(FakeSource::new("channel-1")),
            details: Arc::new(FakeDetails::default()),
            config: Arc::new(StaticConfig::new(quick_settings(destinations))),
            publishers,
            refresher: Arc::new(CountingRefresher::default()),
            events_tx,
            events_rx,
        }
    }

    pub fn publisher(&self, name: &str) -> Arc<RecordingPublisher> {
        self.publishers[name].clone()
    }

    pub fn builder(&self) -> RelayBuilder {
        let mut builder = RelayBuilder::new(
            self.dir.path(),
            self.source.clone(),
            self.details.clone(),
            self.config.clone(),
        )
        .event_sink(Arc::new(ChannelEventSink::new(self.events_tx.clone())));
        for (name, publisher) in &self.publishers {
            builder = builder.publisher_for(name.clone(), publisher.clone());
        }
        builder
    }

    pub fn scheduler(&self) -> PollingScheduler {
        self.builder().build().unwrap()
    }

    pub fn events(&self) -> Vec<RelayEvent> {
        self.events_rx.try_iter().collect()
    }
}
