use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use relay_core::{Item, ItemDetail};
use relay_logging::{relay_debug, relay_info};
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::Serialize;
use url::Url;

use crate::publish::{PublishError, Publisher};

#[derive(Debug, Clone)]
pub struct WebhookSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    /// Descriptions longer than this many characters are clipped.
    pub text_max_length: usize,
}

impl Default for WebhookSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            text_max_length: 100,
        }
    }
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    id: &'a str,
    title: &'a str,
    published_at: String,
    description: String,
    media_url: Option<&'a str>,
    thumbnail_url: Option<&'a str>,
    duration_secs: Option<u64>,
}

/// Posts a JSON announcement to every configured URL.
///
/// The publish succeeds only when every URL answers with a 2xx status.
#[derive(Debug, Clone)]
pub struct WebhookPublisher {
    urls: Vec<Url>,
    client: reqwest::Client,
    text_max_length: usize,
}

impl WebhookPublisher {
    pub fn new(urls: &[String], settings: WebhookSettings) -> Result<Self, PublishError> {
        let urls = urls
            .iter()
            .map(|raw| {
                Url::parse(raw).map_err(|err| {
                    PublishError::Other(format!("invalid webhook url '{raw}': {err}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| PublishError::Transport(err.to_string()))?;

        Ok(Self {
            urls,
            client,
            text_max_length: settings.text_max_length,
        })
    }

    async fn post(&self, url: &Url, body: &[u8]) -> Result<(), PublishError> {
        relay_debug!("Posting webhook to {}", url);
        let response = self
            .client
            .post(url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_vec())
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(PublishError::AuthExpired(format!("{url} answered {status}")));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PublishError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Publisher for WebhookPublisher {
    async fn publish(&self, item: &Item, detail: &ItemDetail) -> Result<(), PublishError> {
        let payload = WebhookPayload {
            id: &item.id,
            title: &item.title,
            published_at: item.published_at.to_rfc3339(),
            description: clip_text(&detail.description, self.text_max_length),
            media_url: detail.media_locator.as_deref(),
            thumbnail_url: detail.thumbnail_locator.as_deref(),
            duration_secs: detail.duration.map(|d| d.as_secs()),
        };
        let body =
            serde_json::to_vec(&payload).map_err(|err| PublishError::Other(err.to_string()))?;

        let results = join_all(self.urls.iter().map(|url| self.post(url, &body))).await;
        if let Some(err) = results.into_iter().find_map(Result::err) {
            return Err(err);
        }

        relay_info!(
            "Sent webhook for '{}' to {} url(s)",
            item.title,
            self.urls.len()
        );
        Ok(())
    }
}

/// Keep the first `max_chars` characters, marking the cut with `...`.
pub fn clip_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut clipped: String = text.chars().take(max_chars).collect();
    clipped.push_str("...");
    clipped
}

fn map_reqwest_error(err: reqwest::Error) -> PublishError {
    if err.is_timeout() {
        return PublishError::Transport(format!("timeout: {err}"));
    }
    PublishError::Transport(err.to_string())
}
