use async_trait::async_trait;
use relay_core::{Item, ItemDetail};
use relay_logging::relay_info;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PublishError {
    #[error("credentials expired: {0}")]
    AuthExpired(String),
    #[error("rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("{0}")]
    Other(String),
}

/// Delivers one item to a downstream destination.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, item: &Item, detail: &ItemDetail) -> Result<(), PublishError>;
}

/// Renews the credentials a [`Publisher`] uses.
#[async_trait]
pub trait CredentialRefresher: Send + Sync {
    async fn refresh(&self) -> Result<(), PublishError>;
}

/// Publish once; on `AuthExpired`, refresh and retry exactly once.
pub async fn publish_with_refresh(
    publisher: &dyn Publisher,
    refresher: Option<&dyn CredentialRefresher>,
    item: &Item,
    detail: &ItemDetail,
) -> Result<(), PublishError> {
    match publisher.publish(item, detail).await {
        Err(PublishError::AuthExpired(message)) => {
            let Some(refresher) = refresher else {
                return Err(PublishError::AuthExpired(message));
            };
            relay_info!(
                "Credentials expired while publishing '{}' ({}); refreshing once",
                item.title,
                message
            );
            refresher.refresh().await?;
            publisher.publish(item, detail).await
        }
        other => other,
    }
}
