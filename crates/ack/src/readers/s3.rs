// ai
//! 🪣 Amazon S3 (and anything that speaks its dialect: MinIO, R2, LocalStack...).
//!
//! 🎬 *[the bucket is listed. 1,000 keys per page. the continuation token glimmers.]*
//! *["there's more," it whispers. there is always more.]*
//!
//! Credentials come from the default chain (env vars → ~/.aws → IAM role → hope) unless a
//! static key pair is configured. Setting `endpoint_url` switches on path-style addressing,
//! which is what every S3-compatible store on a laptop expects.

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::io::AsyncWrite;
use tracing::{debug, warn};

use super::object_storage::{ObjectStorageConfig, PlatformBinding};
use crate::error::AckError;

/// 📋 `[reader.S3]`
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct S3ReaderConfig {
    #[serde(flatten)]
    pub storage: ObjectStorageConfig,
    /// 🌍 Defaults to us-east-1, the Florida of AWS regions.
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
    /// 🔧 Custom endpoint for S3-compatible stores. Implies path-style addressing.
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl S3ReaderConfig {
    /// 🔑 Both halves of the key pair, or neither. Half a key opens no doors.
    fn static_credentials(&self) -> Result<Option<Credentials>> {
        match (&self.access_key_id, &self.secret_access_key) {
            (Some(id), Some(secret)) => Ok(Some(Credentials::new(
                id.clone(),
                secret.clone(),
                None,
                None,
                "ack-static",
            ))),
            (None, None) => Ok(None),
            _ => Err(AckError::configuration(
                "access_key_id and secret_access_key must be set together (or both left out)",
            )
            .into()),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct S3Bucket {
    client: aws_sdk_s3::Client,
    name: String,
}

#[derive(Debug)]
pub(crate) struct S3Object {
    key: String,
}

#[derive(Debug)]
pub(crate) struct S3Binding {
    config: S3ReaderConfig,
}

impl S3Binding {
    pub(crate) fn new(config: S3ReaderConfig) -> Self {
        Self { config }
    }
}

fn to_utc(dt: &aws_sdk_s3::primitives::DateTime) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(dt.secs(), dt.subsec_nanos()).unwrap_or_default()
}

#[async_trait]
impl PlatformBinding for S3Binding {
    type Client = aws_sdk_s3::Client;
    type Bucket = S3Bucket;
    type RawObject = aws_sdk_s3::types::Object;
    type Object = S3Object;

    fn platform(&self) -> &'static str {
        "S3"
    }

    async fn create_client(&self) -> Result<aws_sdk_s3::Client> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(self.config.region.clone()));
        if let Some(credentials) = self.config.static_credentials()? {
            loader = loader.credentials_provider(credentials);
        }
        let sdk_config = loader.load().await;

        let mut s3_config = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &self.config.endpoint_url {
            debug!("🔧 using custom S3 endpoint {}", endpoint);
            s3_config = s3_config.endpoint_url(endpoint).force_path_style(true);
        }
        Ok(aws_sdk_s3::Client::from_conf(s3_config.build()))
    }

    async fn create_bucket(&self, client: &aws_sdk_s3::Client, name: &str) -> Result<S3Bucket> {
        let head = client.head_bucket().bucket(name).send().await;
        let err = match head {
            Ok(_) => {
                return Ok(S3Bucket {
                    client: client.clone(),
                    name: name.to_string(),
                });
            }
            Err(err) => err,
        };

        match err.raw_response().map(|r| r.status().as_u16()) {
            Some(401) | Some(403) => Err(AckError::Authentication {
                platform: "S3",
                reason: format!("access to bucket '{}' was denied", name),
            }
            .into()),
            Some(404) => {
                warn!("🪣 bucket '{}' not found, listing the ones that exist", name);
                let listing = client
                    .list_buckets()
                    .send()
                    .await
                    .context("💀 bucket lookup failed, and so did listing the alternatives")?;
                let available = listing
                    .buckets()
                    .iter()
                    .filter_map(|b| b.name().map(String::from))
                    .collect();
                Err(AckError::BucketNotFound {
                    bucket: name.to_string(),
                    available,
                }
                .into())
            }
            _ => Err(anyhow::Error::new(err)
                .context(format!("💀 HEAD request for bucket '{}' failed", name))),
        }
    }

    async fn list_objects(&self, bucket: &S3Bucket, prefix: &str) -> Result<Vec<aws_sdk_s3::types::Object>> {
        let mut objects = Vec::new();
        let mut continuation_token: Option<String> = None;
        loop {
            let page = bucket
                .client
                .list_objects_v2()
                .bucket(&bucket.name)
                .prefix(prefix)
                .set_continuation_token(continuation_token.take())
                .send()
                .await
                .with_context(|| {
                    format!("💀 failed to list s3://{}/{}", bucket.name, prefix)
                })?;
            objects.extend(page.contents.unwrap_or_default());
            match page.next_continuation_token {
                Some(token) => continuation_token = Some(token),
                None => break,
            }
        }
        Ok(objects)
    }

    fn get_timestamp(&self, raw: &aws_sdk_s3::types::Object) -> DateTime<Utc> {
        raw.last_modified().map(to_utc).unwrap_or_default()
    }

    fn get_key(&self, raw: &aws_sdk_s3::types::Object) -> String {
        raw.key().unwrap_or_default().to_string()
    }

    fn to_object(&self, _bucket: &S3Bucket, raw: aws_sdk_s3::types::Object) -> S3Object {
        S3Object {
            key: raw.key.unwrap_or_default(),
        }
    }

    async fn download_object_to_file(
        &self,
        bucket: &S3Bucket,
        object: &S3Object,
        dest: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<u64> {
        let response = bucket
            .client
            .get_object()
            .bucket(&bucket.name)
            .key(&object.key)
            .send()
            .await
            .with_context(|| format!("💀 GetObject failed for s3://{}/{}", bucket.name, object.key))?;
        let mut body = response.body.into_async_read();
        let copied = tokio::io::copy(&mut body, dest).await?;
        Ok(copied)
    }
}
