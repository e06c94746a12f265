//! reqwest-backed implementation of [`ContentApi`].

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, error, info};

use crate::contract::{ContentApi, ContentBundle, SourceConfig};
use crate::error::SyncError;

/// Body the API sends with a 404 when there is nothing to publish.
pub const EMPTY_CONTENT_SENTINEL: &str = "No generated pages to publish.";

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
}

/// Talks to the content API over HTTPS.
///
/// Endpoints, relative to `base_url`:
/// - `GET {domain}/content?installId={id}`
/// - `GET {domain}/content/previously-published?installId={id}`
#[derive(Debug, Clone)]
pub struct HttpContentApi {
    client: Client,
    base_url: String,
}

impl HttpContentApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn content_url(&self, domain: &str, suffix: &str) -> String {
        format!("{}/{}/content{}", self.base_url, domain, suffix)
    }

    async fn get_bundle(
        &self,
        url: &str,
        config: &SourceConfig,
    ) -> Result<ContentBundle, SyncError> {
        info!(url = %url, domain = %config.domain, "[FETCH] Requesting content");

        let response = self
            .client
            .get(url)
            .query(&[("installId", config.install_id.as_str())])
            .send()
            .await
            .map_err(|e| {
                error!(error = ?e, url = %url, "[FETCH][ERROR] Request failed");
                SyncError::from(e)
            })?;

        let status = response.status();
        if status.is_success() {
            let bundle = response.json::<ContentBundle>().await.map_err(|e| {
                error!(error = ?e, url = %url, "[FETCH][ERROR] Failed to parse content bundle");
                SyncError::fetch(
                    Some(status.as_u16()),
                    format!("invalid content bundle: {e}"),
                )
            })?;
            debug!(
                url = %url,
                pages = bundle.pages.len(),
                has_sitemap = !bundle.sitemap_xml.is_empty(),
                has_robots = !bundle.robot_txt.is_empty(),
                "[FETCH] Content bundle received"
            );
            return Ok(bundle);
        }

        let text = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<Failed to decode response body>"));

        if is_empty_content_sentinel(status, &text) {
            info!(url = %url, domain = %config.domain, "[FETCH] Nothing new to publish");
            return Ok(ContentBundle::default());
        }

        error!(
            status = %status,
            url = %url,
            "[FETCH][ERROR] Content API returned error. Response body: {text}"
        );
        Err(SyncError::fetch(
            Some(status.as_u16()),
            format!("content API returned {status}: {text}"),
        ))
    }
}

fn is_empty_content_sentinel(status: StatusCode, body: &str) -> bool {
    if status != StatusCode::NOT_FOUND {
        return false;
    }
    matches!(
        serde_json::from_str::<ApiErrorBody>(body),
        Ok(ApiErrorBody { error: Some(msg) }) if msg == EMPTY_CONTENT_SENTINEL
    )
}

#[async_trait]
impl ContentApi for HttpContentApi {
    async fn fetch_new(&self, config: &SourceConfig) -> Result<ContentBundle, SyncError> {
        let url = self.content_url(&config.domain, "");
        self.get_bundle(&url, config).await
    }

    async fn fetch_previously_published(
        &self,
        config: &SourceConfig,
    ) -> Result<ContentBundle, SyncError> {
        let url = self.content_url(&config.domain, "/previously-published");
        self.get_bundle(&url, config).await
    }
}
