// ai
//! ☁️ Google Cloud Storage over the plain JSON API.
//!
//! No SDK, no service-account JWT dance. Hand us an OAuth access token that someone else
//! already minted (`gcloud auth print-access-token`, a metadata server, a sidecar) and we
//! speak HTTP with it.
//!
//! 🧠 Knowledge graph:
//! - bucket check: `GET /storage/v1/b/{bucket}`
//! - diagnostics:  `GET /storage/v1/b?project={project_id}&pageToken=..` until `nextPageToken` is gone
//! - listing:      `GET /storage/v1/b/{bucket}/o?prefix=..&pageToken=..` until `nextPageToken` is gone
//! - download:     `GET /storage/v1/b/{bucket}/o/{object}?alt=media`, copied chunk by chunk
//! - Object names go through URL path-segment encoding, so `a/b.csv` becomes `a%2Fb.csv`. GCS insists.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::warn;

use super::object_storage::{ObjectStorageConfig, PlatformBinding};
use crate::error::AckError;

/// 📋 `[reader.Gcs]`
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct GcsReaderConfig {
    #[serde(flatten)]
    pub storage: ObjectStorageConfig,
    /// 🔑 Pre-minted OAuth2 bearer token.
    pub access_token: String,
    /// 🏷️ Required. Listing buckets when the configured one is missing needs it, and GCS answers 400 without it.
    #[serde(default)]
    pub project_id: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

fn default_endpoint() -> String {
    "https://storage.googleapis.com".to_string()
}

/// 📦 One entry of an objects listing. Only the fields the engine reads.
#[derive(Debug, Deserialize)]
pub(crate) struct GcsObject {
    name: String,
    updated: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectsPage {
    #[serde(default)]
    items: Vec<GcsObject>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BucketEntry {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BucketsPage {
    #[serde(default)]
    items: Vec<BucketEntry>,
    next_page_token: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct GcsClient {
    http: reqwest::Client,
    base: Url,
    token: String,
}

impl GcsClient {
    /// 🔗 `{endpoint}/storage/v1/<segments...>`, each segment percent-encoded on its own.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| {
                AckError::configuration(format!("GCS endpoint '{}' cannot be a base URL", self.base))
            })?
            .pop_if_empty()
            .extend(["storage", "v1"])
            .extend(segments);
        Ok(url)
    }

    async fn get(&self, url: Url) -> Result<reqwest::Response> {
        self.http
            .get(url.clone())
            .bearer_auth(&self.token)
            .send()
            .await
            .with_context(|| format!("💀 GCS request to {} never came back", url))
    }
}

#[derive(Debug, Clone)]
pub(crate) struct GcsBucket {
    client: GcsClient,
    name: String,
}

#[derive(Debug)]
pub(crate) struct GcsBinding {
    config: GcsReaderConfig,
}

impl GcsBinding {
    pub(crate) fn new(config: GcsReaderConfig) -> Self {
        Self { config }
    }
}

/// 🚦 Turn a non-2xx response into the right flavour of failure.
async fn reject(response: reqwest::Response, what: &str) -> anyhow::Error {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return AckError::Authentication {
            platform: "GCS",
            reason: format!("{} returned {}", what, status),
        }
        .into();
    }
    let body = response.text().await.unwrap_or_default();
    anyhow::anyhow!("💀 GCS {} failed with {}: {}", what, status, body)
}

#[async_trait]
impl PlatformBinding for GcsBinding {
    type Client = GcsClient;
    type Bucket = GcsBucket;
    type RawObject = GcsObject;
    type Object = GcsObject;

    fn platform(&self) -> &'static str {
        "GCS"
    }

    async fn create_client(&self) -> Result<GcsClient> {
        if self.config.access_token.trim().is_empty() {
            return Err(AckError::configuration("GCS access_token is empty").into());
        }
        if self.config.project_id.trim().is_empty() {
            return Err(AckError::configuration("GCS project_id is required").into());
        }
        let base = Url::parse(&self.config.endpoint).map_err(|e| {
            AckError::configuration(format!("bad GCS endpoint '{}': {}", self.config.endpoint, e))
        })?;
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(300))
            .build()
            .context("💀 could not build the HTTP client for GCS")?;
        Ok(GcsClient {
            http,
            base,
            token: self.config.access_token.clone(),
        })
    }

    async fn create_bucket(&self, client: &GcsClient, name: &str) -> Result<GcsBucket> {
        let response = client.get(client.url(&["b", name])?).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(GcsBucket {
                client: client.clone(),
                name: name.to_string(),
            });
        }
        if status != StatusCode::NOT_FOUND {
            return Err(reject(response, "bucket lookup").await);
        }

        warn!("🪣 GCS bucket '{}' not found, listing the ones that exist", name);
        let mut available = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut url = client.url(&["b"])?;
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("project", &self.config.project_id);
                if let Some(token) = &page_token {
                    query.append_pair("pageToken", token);
                }
            }
            let response = client.get(url).await?;
            if !response.status().is_success() {
                return Err(reject(response, "bucket listing").await);
            }
            let page: BucketsPage = serde_json::from_slice(&response.bytes().await?)
                .context("💀 GCS bucket listing was not the JSON we were promised")?;
            available.extend(page.items.into_iter().map(|b| b.name));
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Err(AckError::BucketNotFound {
            bucket: name.to_string(),
            available,
        }
        .into())
    }

    async fn list_objects(&self, bucket: &GcsBucket, prefix: &str) -> Result<Vec<GcsObject>> {
        let mut objects = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut url = bucket.client.url(&["b", &bucket.name, "o"])?;
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("prefix", prefix);
                if let Some(token) = &page_token {
                    query.append_pair("pageToken", token);
                }
            }
            let response = bucket.client.get(url).await?;
            if !response.status().is_success() {
                return Err(reject(response, "object listing").await);
            }
            let page: ObjectsPage = serde_json::from_slice(&response.bytes().await?)
                .context("💀 GCS object listing was not the JSON we were promised")?;
            objects.extend(page.items);
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(objects)
    }

    fn get_timestamp(&self, raw: &GcsObject) -> DateTime<Utc> {
        raw.updated
    }

    fn get_key(&self, raw: &GcsObject) -> String {
        raw.name.clone()
    }

    fn to_object(&self, _bucket: &GcsBucket, raw: GcsObject) -> GcsObject {
        raw
    }

    async fn download_object_to_file(
        &self,
        bucket: &GcsBucket,
        object: &GcsObject,
        dest: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<u64> {
        let mut url = bucket.client.url(&["b", &bucket.name, "o", &object.name])?;
        url.query_pairs_mut().append_pair("alt", "media");
        let mut response = bucket.client.get(url).await?;
        if !response.status().is_success() {
            return Err(reject(response, "download").await);
        }
        let mut copied = 0u64;
        while let Some(chunk) = response.chunk().await? {
            dest.write_all(&chunk).await?;
            copied += chunk.len() as u64;
        }
        Ok(copied)
    }
}
