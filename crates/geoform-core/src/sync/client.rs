//! HTTP sync client with binary-first encoding.
//!
//! Requests are sent as MessagePack and transparently retried as JSON on
//! any encoding or transport failure. The fallback targets the same
//! endpoint with the same logical payload; callers apply local side
//! effects only after a send succeeds, so the retry can never
//! double-apply them. Version conflicts are terminal and never fall back.

use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::util::{compact_text, is_http_url, normalize_text_option};
use crate::ProjectId;

use super::wire::{
    encode_images_binary, encode_sync_binary, ImageBatchRequest, SyncRequest, SyncResponse,
    MSGPACK_CONTENT_TYPE,
};

/// Transport seam for the uploader; implemented over HTTP in production
/// and by in-memory fakes in tests
#[allow(async_fn_in_trait)]
pub trait SyncApi {
    /// `POST /projects/{id}/data/sync`
    async fn push_changes(
        &self,
        project_id: ProjectId,
        request: &SyncRequest,
    ) -> Result<SyncResponse>;

    /// `POST /projects/images/batch-create`
    async fn push_images(&self, request: &ImageBatchRequest) -> Result<()>;
}

/// HTTP implementation of [`SyncApi`]
#[derive(Clone)]
pub struct HttpSyncClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpSyncClient {
    /// Create a client for the given API base URL
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        Ok(Self {
            base_url,
            client: reqwest::Client::builder().build()?,
        })
    }

    async fn post_preferring_binary(
        &self,
        url: &str,
        binary: std::result::Result<Vec<u8>, rmp_serde::encode::Error>,
        json_body: &impl Serialize,
    ) -> Result<reqwest::Response> {
        match binary {
            Ok(body) => {
                match self
                    .client
                    .post(url)
                    .header(CONTENT_TYPE, MSGPACK_CONTENT_TYPE)
                    .body(body)
                    .send()
                    .await
                {
                    Ok(response) if response.status().is_success() => return Ok(response),
                    Ok(response) => {
                        let status = response.status();
                        let body = response.text().await.unwrap_or_default();
                        if let Some(conflict) = version_conflict(status, &body) {
                            return Err(conflict);
                        }
                        tracing::debug!(
                            "binary request returned HTTP {status}, falling back to JSON"
                        );
                    }
                    Err(error) => {
                        tracing::debug!("binary request failed, falling back to JSON: {error}");
                    }
                }
            }
            Err(error) => {
                tracing::debug!("binary encoding failed, falling back to JSON: {error}");
            }
        }

        let response = self.client.post(url).json(json_body).send().await?;
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if let Some(conflict) = version_conflict(status, &body) {
            return Err(conflict);
        }
        Err(Error::Api(format!(
            "HTTP {}: {}",
            status.as_u16(),
            compact_text(&body)
        )))
    }
}

impl SyncApi for HttpSyncClient {
    async fn push_changes(
        &self,
        project_id: ProjectId,
        request: &SyncRequest,
    ) -> Result<SyncResponse> {
        let url = format!("{}/projects/{project_id}/data/sync", self.base_url);
        let response = self
            .post_preferring_binary(&url, encode_sync_binary(request), request)
            .await?;

        Ok(response.json::<SyncResponse>().await?)
    }

    async fn push_images(&self, request: &ImageBatchRequest) -> Result<()> {
        let url = format!("{}/projects/images/batch-create", self.base_url);
        self.post_preferring_binary(&url, encode_images_binary(request), request)
            .await?;
        Ok(())
    }
}

fn version_conflict(status: StatusCode, body: &str) -> Option<Error> {
    if status == StatusCode::CONFLICT || body.to_lowercase().contains("need to sync") {
        Some(Error::VersionConflict(format!(
            "server rejected project version ({})",
            status.as_u16()
        )))
    } else {
        None
    }
}

fn normalize_base_url(raw: String) -> Result<String> {
    let base_url = normalize_text_option(Some(raw))
        .ok_or_else(|| Error::InvalidInput("API base URL must not be empty".to_string()))?;
    if is_http_url(&base_url) {
        Ok(base_url.trim_end_matches('/').to_string())
    } else {
        Err(Error::InvalidInput(
            "API base URL must include http:// or https://".to_string(),
        ))
    }
}
