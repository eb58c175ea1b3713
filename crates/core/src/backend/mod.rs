pub mod local;
pub mod memory;
pub mod s3;

use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::blob::{BlobRef, ObjectMetadata};
use crate::config::Credentials;
use crate::error::{Result, StorageError};

/// Remote object-store client.
///
/// Every method is one round trip. Implementations report a missing
/// object as [`StorageError::NotFound`] where they can tell it apart.
#[async_trait]
pub trait ObjectStoreClient: Send + Sync {
    /// Uploads `data` as the whole object. `size` is the length the caller
    /// declared; a mismatch is rejected before anything is sent.
    async fn upload(
        &self,
        blob: &BlobRef,
        data: Bytes,
        size: u64,
        content_type: &str,
    ) -> Result<()>;

    /// Writes the object into `sink` and returns the number of bytes written.
    async fn download(&self, blob: &BlobRef, sink: &mut (dyn Write + Send)) -> Result<u64>;

    async fn delete(&self, blob: &BlobRef) -> Result<()>;

    async fn exists(&self, blob: &BlobRef) -> Result<bool>;

    /// Fetches fresh metadata for the object.
    async fn reload(&self, blob: &BlobRef) -> Result<ObjectMetadata>;
}

/// Builds clients from the configured project and credentials.
pub trait ClientFactory: Send + Sync {
    fn connect(
        &self,
        project: Option<&str>,
        credentials: Option<&Credentials>,
    ) -> Result<Arc<dyn ObjectStoreClient>>;
}

impl<F> ClientFactory for F
where
    F: Fn(Option<&str>, Option<&Credentials>) -> Result<Arc<dyn ObjectStoreClient>> + Send + Sync,
{
    fn connect(
        &self,
        project: Option<&str>,
        credentials: Option<&Credentials>,
    ) -> Result<Arc<dyn ObjectStoreClient>> {
        self(project, credentials)
    }
}

/// Shared upload guard: the body must match the declared size.
pub fn check_declared_size(blob: &BlobRef, declared: u64, data: &[u8]) -> Result<()> {
    let actual = data.len() as u64;
    if actual != declared {
        return Err(StorageError::SizeMismatch {
            name: blob.name().to_string(),
            declared,
            actual,
        });
    }
    Ok(())
}

pub fn not_found(blob: &BlobRef) -> StorageError {
    StorageError::NotFound {
        bucket: blob.bucket().to_string(),
        name: blob.name().to_string(),
    }
}
