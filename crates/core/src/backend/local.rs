use std::io::Write;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncReadExt;
use tracing::debug;

use super::{ObjectStoreClient, check_declared_size, not_found};
use crate::blob::{BlobRef, ObjectMetadata};
use crate::content_type;
use crate::error::{Result, StorageError};

const READ_CHUNK: usize = 64 * 1024;

/// Client over a local directory, laid out as `<root>/<bucket>/<name>`.
///
/// Deleting a missing object is a no-op here.
pub struct LocalClient {
    root: PathBuf,
}

impl LocalClient {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            root: path.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full_path(&self, blob: &BlobRef) -> Result<PathBuf> {
        let mut full = self.root.clone();
        for part in [blob.bucket(), blob.name()] {
            let rel = Path::new(part);
            let clean = !part.is_empty()
                && rel
                    .components()
                    .all(|c| matches!(c, Component::Normal(_)));
            if !clean {
                return Err(StorageError::InvalidName(blob.to_string()));
            }
            full.push(rel);
        }
        Ok(full)
    }
}

#[async_trait]
impl ObjectStoreClient for LocalClient {
    async fn upload(
        &self,
        blob: &BlobRef,
        data: Bytes,
        size: u64,
        _content_type: &str,
    ) -> Result<()> {
        check_declared_size(blob, size, &data)?;
        let full = self.full_path(blob)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, &data).await?;
        debug!(path = %full.display(), bytes = size, "wrote object");
        Ok(())
    }

    async fn download(&self, blob: &BlobRef, sink: &mut (dyn Write + Send)) -> Result<u64> {
        let full = self.full_path(blob)?;
        let mut file = match tokio::fs::File::open(&full).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found(blob)),
            Err(e) => return Err(e.into()),
        };
        let mut buf = vec![0u8; READ_CHUNK];
        let mut total = 0u64;
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            sink.write_all(&buf[..n])?;
            total += n as u64;
        }
        Ok(total)
    }

    async fn delete(&self, blob: &BlobRef) -> Result<()> {
        let full = self.full_path(blob)?;
        if full.is_file() {
            tokio::fs::remove_file(&full).await?;
        }
        Ok(())
    }

    async fn exists(&self, blob: &BlobRef) -> Result<bool> {
        let full = self.full_path(blob)?;
        match tokio::fs::metadata(&full).await {
            Ok(m) => Ok(m.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn reload(&self, blob: &BlobRef) -> Result<ObjectMetadata> {
        let full = self.full_path(blob)?;
        let meta = match tokio::fs::metadata(&full).await {
            Ok(m) if m.is_file() => m,
            Ok(_) => return Err(not_found(blob)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found(blob)),
            Err(e) => return Err(e.into()),
        };
        Ok(ObjectMetadata {
            size: meta.len(),
            content_type: content_type::guess_from_name(blob.name()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_client_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let client = LocalClient::new(dir.path());
        let blob = BlobRef::new("media", "test/hello.txt");

        client
            .upload(&blob, Bytes::from_static(b"world"), 5, "text/plain")
            .await
            .unwrap();
        assert!(client.exists(&blob).await.unwrap());
        assert!(dir.path().join("media/test/hello.txt").is_file());

        let mut out = Vec::new();
        client.download(&blob, &mut out).await.unwrap();
        assert_eq!(out, b"world");

        let meta = client.reload(&blob).await.unwrap();
        assert_eq!(meta.size, 5);
        assert_eq!(meta.content_type.as_deref(), Some("text/plain"));

        client.delete(&blob).await.unwrap();
        assert!(!client.exists(&blob).await.unwrap());
        // second delete is a no-op
        client.delete(&blob).await.unwrap();
    }

    #[tokio::test]
    async fn names_cannot_escape_root() {
        let dir = tempfile::tempdir().unwrap();
        let client = LocalClient::new(dir.path());
        for name in ["../outside", "/etc/passwd", "a/../../b", ""] {
            let blob = BlobRef::new("media", name);
            let err = client.exists(&blob).await.unwrap_err();
            assert!(matches!(err, StorageError::InvalidName(_)), "{name}");
        }
    }

    #[tokio::test]
    async fn missing_object_reload_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let client = LocalClient::new(dir.path());
        let err = client
            .reload(&BlobRef::new("media", "missing.bin"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn exists_reports_io_failures() {
        let dir = tempfile::tempdir().unwrap();
        let client = LocalClient::new(dir.path());
        let file = BlobRef::new("media", "a.txt");
        client
            .upload(&file, Bytes::from_static(b"abc"), 3, "text/plain")
            .await
            .unwrap();

        assert!(!client.exists(&BlobRef::new("media", "b.txt")).await.unwrap());
        // a regular file used as a directory is an error, not a missing object
        let err = client
            .exists(&BlobRef::new("media", "a.txt/inner"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Io(_)), "{err:?}");
    }
}
