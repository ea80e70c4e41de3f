// ai
//! 🌀 Azure Blob Storage. Containers are buckets, blobs are objects, and everything is paged.
//!
//! Credentials are a connection string, or an account name plus exactly one of an access key
//! or a SAS token. Mixing them is a configuration error, raised before any request goes out.

use anyhow::{Context, Result};
use async_trait::async_trait;
use azure_core::StatusCode;
use azure_core::error::ErrorKind;
use azure_storage::{ConnectionString, StorageCredentials};
use azure_storage_blobs::prelude::{BlobServiceClient, ContainerClient};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::Deserialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::warn;

use super::object_storage::{ObjectStorageConfig, PlatformBinding};
use crate::error::AckError;

/// 📋 `[reader.Azure]`
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AzureReaderConfig {
    #[serde(flatten)]
    pub storage: ObjectStorageConfig,
    #[serde(default)]
    pub connection_string: Option<String>,
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub sas_token: Option<String>,
}

impl AzureReaderConfig {
    /// 🔑 `(account, credentials)` from whichever credential shape was configured.
    fn credentials(&self) -> Result<(String, StorageCredentials)> {
        let bad_shape = |reason: &str| -> anyhow::Error { AckError::configuration(reason).into() };

        if let Some(connection_string) = &self.connection_string {
            if self.account.is_some() || self.access_key.is_some() || self.sas_token.is_some() {
                return Err(bad_shape(
                    "connection_string cannot be combined with account, access_key or sas_token",
                ));
            }
            let parsed = ConnectionString::new(connection_string)
                .map_err(|e| bad_shape(&format!("unparseable Azure connection_string: {}", e)))?;
            let account = parsed
                .account_name
                .ok_or_else(|| bad_shape("Azure connection_string has no AccountName"))?
                .to_string();
            let credentials = parsed
                .storage_credentials()
                .map_err(|e| bad_shape(&format!("no usable credentials in connection_string: {}", e)))?;
            return Ok((account, credentials));
        }

        let account = self
            .account
            .clone()
            .ok_or_else(|| bad_shape("Azure needs either connection_string or account"))?;
        let credentials = match (&self.access_key, &self.sas_token) {
            (Some(key), None) => StorageCredentials::access_key(account.clone(), key.clone()),
            (None, Some(token)) => StorageCredentials::sas_token(token.as_str())
                .map_err(|e| bad_shape(&format!("unparseable Azure sas_token: {}", e)))?,
            _ => {
                return Err(bad_shape(
                    "Azure account needs exactly one of access_key or sas_token",
                ));
            }
        };
        Ok((account, credentials))
    }
}

/// 🔒 401/403 from the service means the credentials were looked at and rejected.
fn is_auth_rejection(err: &azure_core::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::HttpResponse { status, .. }
            if *status == StatusCode::Unauthorized || *status == StatusCode::Forbidden
    )
}

#[derive(Debug, Clone)]
pub(crate) struct AzureObject {
    name: String,
    last_modified: DateTime<Utc>,
}

#[derive(Debug)]
pub(crate) struct AzureBinding {
    config: AzureReaderConfig,
}

impl AzureBinding {
    pub(crate) fn new(config: AzureReaderConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl PlatformBinding for AzureBinding {
    type Client = BlobServiceClient;
    type Bucket = ContainerClient;
    type RawObject = AzureObject;
    type Object = AzureObject;

    fn platform(&self) -> &'static str {
        "Azure"
    }

    async fn create_client(&self) -> Result<BlobServiceClient> {
        let (account, credentials) = self.config.credentials()?;
        Ok(BlobServiceClient::new(account, credentials))
    }

    async fn create_bucket(&self, client: &BlobServiceClient, name: &str) -> Result<ContainerClient> {
        let container = client.container_client(name);
        match container.exists().await {
            Ok(true) => return Ok(container),
            Ok(false) => {}
            Err(err) if is_auth_rejection(&err) => {
                return Err(AckError::Authentication {
                    platform: "Azure",
                    reason: err.to_string(),
                }
                .into());
            }
            Err(err) => {
                return Err(anyhow::Error::new(err)
                    .context(format!("💀 could not check Azure container '{}'", name)));
            }
        }

        warn!("🪣 Azure container '{}' not found, listing the ones that exist", name);
        let mut available = Vec::new();
        let mut pages = client.list_containers().into_stream();
        while let Some(page) = pages.next().await {
            let page = page.context("💀 listing Azure containers failed")?;
            available.extend(page.containers.into_iter().map(|c| c.name));
        }
        Err(AckError::BucketNotFound {
            bucket: name.to_string(),
            available,
        }
        .into())
    }

    async fn list_objects(&self, container: &ContainerClient, prefix: &str) -> Result<Vec<AzureObject>> {
        let mut objects = Vec::new();
        let mut pages = container.list_blobs().prefix(prefix.to_string()).into_stream();
        while let Some(page) = pages.next().await {
            let page = page.with_context(|| {
                format!(
                    "💀 listing Azure container '{}' under '{}' failed",
                    container.container_name(),
                    prefix
                )
            })?;
            for blob in page.blobs.blobs() {
                let modified = blob.properties.last_modified;
                objects.push(AzureObject {
                    name: blob.name.clone(),
                    last_modified: DateTime::<Utc>::from_timestamp(
                        modified.unix_timestamp(),
                        modified.nanosecond(),
                    )
                    .unwrap_or_default(),
                });
            }
        }
        Ok(objects)
    }

    fn get_timestamp(&self, raw: &AzureObject) -> DateTime<Utc> {
        raw.last_modified
    }

    fn get_key(&self, raw: &AzureObject) -> String {
        raw.name.clone()
    }

    fn to_object(&self, _container: &ContainerClient, raw: AzureObject) -> AzureObject {
        raw
    }

    async fn download_object_to_file(
        &self,
        container: &ContainerClient,
        object: &AzureObject,
        dest: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<u64> {
        let blob = container.blob_client(&object.name);
        let mut responses = blob.get().into_stream();
        let mut copied = 0u64;
        while let Some(response) = responses.next().await {
            let mut body = response
                .with_context(|| format!("💀 downloading Azure blob '{}' failed", object.name))?
                .data;
            while let Some(chunk) = body.next().await {
                let chunk = chunk?;
                dest.write_all(&chunk).await?;
                copied += chunk.len() as u64;
            }
        }
        Ok(copied)
    }
}
