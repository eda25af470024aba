use async_trait::async_trait;
use relay_core::{Item, ItemDetail};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FeedError {
    #[error("feed '{source_id}' unavailable: {message}")]
    Unavailable { source_id: String, message: String },
    #[error("item '{id}' not found")]
    ItemNotFound { id: String },
}

/// Upstream listing of one channel.
#[async_trait]
pub trait FeedSource: Send + Sync {
    fn source_id(&self) -> &str;

    /// Current listing, newest first. Only listing fields are required.
    async fn fetch_live_feed(&self) -> Result<Vec<Item>, FeedError>;

    /// Look up a single item by id, independent of the listing.
    async fn fetch_item(&self, id: &str) -> Result<Item, FeedError>;
}

#[async_trait]
pub trait DetailFetcher: Send + Sync {
    async fn fetch_item_detail(&self, id: &str) -> Result<ItemDetail, FeedError>;
}
