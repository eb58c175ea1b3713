use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use s3::bucket::Bucket;
use s3::creds::Credentials as S3Credentials;
use s3::region::Region;
use tracing::debug;

use super::{ClientFactory, ObjectStoreClient, check_declared_size, not_found};
use crate::blob::{BlobRef, ObjectMetadata};
use crate::config::Credentials;
use crate::error::{Result, StorageError};

pub const GCS_INTEROP_ENDPOINT: &str = "https://storage.googleapis.com";

/// Client for the S3-compatible XML interoperability API, authenticated
/// with HMAC keys.
pub struct S3InteropClient {
    region: Region,
    credentials: S3Credentials,
}

impl S3InteropClient {
    pub fn new(endpoint: &str, access_key: &str, secret_key: &str) -> Result<Self> {
        let region = Region::Custom {
            region: "auto".to_string(),
            endpoint: endpoint.to_string(),
        };
        let credentials =
            S3Credentials::new(Some(access_key), Some(secret_key), None, None, None)
                .map_err(StorageError::transport)?;
        Ok(Self {
            region,
            credentials,
        })
    }

    fn bucket(&self, blob: &BlobRef) -> Result<Box<Bucket>> {
        let bucket = Bucket::new(blob.bucket(), self.region.clone(), self.credentials.clone())
            .map_err(StorageError::transport)?;
        Ok(bucket.with_path_style())
    }
}

fn check_status(blob: &BlobRef, op: &str, status: u16) -> Result<()> {
    match status {
        200..=299 => Ok(()),
        404 => Err(not_found(blob)),
        other => Err(StorageError::transport(anyhow::anyhow!(
            "S3 {op} {blob} returned status {other}"
        ))),
    }
}

#[async_trait]
impl ObjectStoreClient for S3InteropClient {
    async fn upload(
        &self,
        blob: &BlobRef,
        data: Bytes,
        size: u64,
        content_type: &str,
    ) -> Result<()> {
        check_declared_size(blob, size, &data)?;
        let response = self
            .bucket(blob)?
            .put_object_with_content_type(blob.name(), &data, content_type)
            .await
            .map_err(StorageError::transport)?;
        check_status(blob, "PUT", response.status_code())?;
        debug!(%blob, bytes = size, "S3 PUT ok");
        Ok(())
    }

    async fn download(&self, blob: &BlobRef, sink: &mut (dyn Write + Send)) -> Result<u64> {
        let response = self
            .bucket(blob)?
            .get_object(blob.name())
            .await
            .map_err(StorageError::transport)?;
        check_status(blob, "GET", response.status_code())?;
        let body = response.bytes();
        sink.write_all(body)?;
        Ok(body.len() as u64)
    }

    async fn delete(&self, blob: &BlobRef) -> Result<()> {
        let response = self
            .bucket(blob)?
            .delete_object(blob.name())
            .await
            .map_err(StorageError::transport)?;
        check_status(blob, "DELETE", response.status_code())
    }

    async fn exists(&self, blob: &BlobRef) -> Result<bool> {
        let (_, status) = self
            .bucket(blob)?
            .head_object(blob.name())
            .await
            .map_err(StorageError::transport)?;
        match check_status(blob, "HEAD", status) {
            Ok(()) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn reload(&self, blob: &BlobRef) -> Result<ObjectMetadata> {
        let (head, status) = self
            .bucket(blob)?
            .head_object(blob.name())
            .await
            .map_err(StorageError::transport)?;
        check_status(blob, "HEAD", status)?;
        let size = head
            .content_length
            .and_then(|len| u64::try_from(len).ok())
            .ok_or_else(|| {
                StorageError::transport(anyhow::anyhow!("S3 HEAD {blob} had no content length"))
            })?;
        Ok(ObjectMetadata {
            size,
            content_type: head.content_type,
        })
    }
}

/// Builds [`S3InteropClient`]s. Only HMAC credentials are usable here.
#[derive(Debug, Clone)]
pub struct S3InteropFactory {
    endpoint: String,
}

impl S3InteropFactory {
    pub fn new(endpoint: Option<&str>) -> Self {
        Self {
            endpoint: endpoint.unwrap_or(GCS_INTEROP_ENDPOINT).to_string(),
        }
    }
}

impl ClientFactory for S3InteropFactory {
    fn connect(
        &self,
        _project: Option<&str>,
        credentials: Option<&Credentials>,
    ) -> Result<Arc<dyn ObjectStoreClient>> {
        match credentials {
            Some(Credentials::Hmac {
                access_key,
                secret_key,
            }) => Ok(Arc::new(S3InteropClient::new(
                &self.endpoint,
                access_key,
                secret_key,
            )?)),
            _ => Err(StorageError::Config(
                "the S3 interoperability client needs HMAC CREDENTIALS".into(),
            )),
        }
    }
}
