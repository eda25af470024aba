use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type ItemId = String;

/// One feed entry as observed in the upstream listing.
///
/// Only the cheap listing fields live here; description, media and thumbnail
/// are fetched on demand as [`ItemDetail`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub title: String,
    pub published_at: DateTime<Utc>,
}

impl Item {
    pub fn new(
        id: impl Into<ItemId>,
        title: impl Into<String>,
        published_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            published_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ItemDetail {
    pub description: String,
    pub media_locator: Option<String>,
    pub thumbnail_locator: Option<String>,
    pub duration: Option<Duration>,
}
