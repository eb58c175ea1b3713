use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::backend::{ClientFactory, ObjectStoreClient};
use crate::blob::BlobRef;
use crate::config::StorageConfig;
use crate::content_type;
use crate::error::{Result, StorageError};
use crate::file::{FileHandle, StoredFile};
use crate::pool::{ClientPool, Worker, WorkerId};
use crate::spool::SpooledBuffer;

/// In-memory downloads past this size get a warning when spilling is off.
const LARGE_IN_MEMORY_DOWNLOAD: u64 = 64 * 1024 * 1024;

/// Upfront allocation for an upload body. The declared size is untrusted,
/// so the hint is capped and the buffer grows past it as needed.
fn capacity_hint(declared: u64) -> usize {
    usize::try_from(declared.min(LARGE_IN_MEMORY_DOWNLOAD)).unwrap_or(0)
}

/// The contract a host application expects from a pluggable file store.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn open(&self, name: &str, mode: &str) -> Result<StoredFile>;

    /// Stores `content` under `name` and returns the name it was stored as.
    async fn save(&self, name: &str, content: &mut dyn FileHandle) -> Result<String>;

    async fn delete(&self, name: &str) -> Result<()>;

    async fn exists(&self, name: &str) -> Result<bool>;

    async fn size(&self, name: &str) -> Result<u64>;

    fn url(&self, name: &str) -> String;

    fn created_time(&self, _name: &str) -> Result<DateTime<Utc>> {
        Err(StorageError::Unsupported(
            "created_time is not available from this backend".into(),
        ))
    }

    fn modified_time(&self, _name: &str) -> Result<DateTime<Utc>> {
        Err(StorageError::Unsupported(
            "modified_time is not available from this backend".into(),
        ))
    }
}

/// Storage backed by a Google Cloud Storage bucket.
///
/// Objects are read through `open` and written only through `save`.
/// Each operation resolves a fresh [`BlobRef`] and makes one call on the
/// calling worker's client.
pub struct GCloudStorage {
    config: StorageConfig,
    pool: ClientPool,
}

impl GCloudStorage {
    pub fn new(config: StorageConfig, factory: Arc<dyn ClientFactory>) -> Result<Self> {
        config.validate()?;
        if !config.spills_to_disk() {
            debug!(
                bucket = %config.bucket,
                "MAX_MEMORY_SIZE is 0, downloads are held in memory"
            );
        }
        let pool = ClientPool::new(factory, config.project.clone(), config.credentials.clone());
        Ok(Self { config, pool })
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// The calling worker's client, built on first use.
    pub async fn client(&self) -> Result<Arc<dyn ObjectStoreClient>> {
        self.pool.acquire(&Worker::current()).await
    }

    /// Drops the client held for `worker`, e.g. when its thread shuts down.
    pub async fn release_worker(&self, worker: WorkerId) -> bool {
        self.pool.release(worker).await
    }

    pub async fn active_clients(&self) -> usize {
        self.pool.len().await
    }

    fn blob(&self, name: &str) -> BlobRef {
        BlobRef::new(&self.config.bucket, name)
    }
}

fn is_write_mode(mode: &str) -> bool {
    mode.contains(['w', 'a', 'x', '+'])
}

#[async_trait]
impl Storage for GCloudStorage {
    async fn open(&self, name: &str, mode: &str) -> Result<StoredFile> {
        if is_write_mode(mode) {
            return Err(StorageError::Unsupported(format!(
                "opening {name:?} with mode {mode:?}; objects are written with save"
            )));
        }
        let blob = self.blob(name);
        let client = self.client().await?;

        let mut buffer = SpooledBuffer::new(self.config.max_memory_size);
        let size = client.download(&blob, &mut buffer).await?;
        buffer.flush()?;
        buffer.seek(SeekFrom::Start(0))?;

        if !self.config.spills_to_disk() && size > LARGE_IN_MEMORY_DOWNLOAD {
            warn!(%blob, bytes = size, "large download held entirely in memory");
        }
        debug!(%blob, bytes = size, on_disk = buffer.is_on_disk(), "downloaded");
        Ok(StoredFile::new(name, size, buffer))
    }

    async fn save(&self, name: &str, content: &mut dyn FileHandle) -> Result<String> {
        let blob = self.blob(name);
        let content_type =
            content_type::resolve(name, &*content, &self.config.default_content_type);
        let size = content.size();

        content.seek(SeekFrom::Start(0))?;
        let mut data = Vec::with_capacity(capacity_hint(size));
        content.read_to_end(&mut data)?;

        let client = self.client().await?;
        client
            .upload(&blob, Bytes::from(data), size, &content_type)
            .await?;
        info!(%blob, bytes = size, content_type = %content_type, "saved");
        Ok(name.to_string())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let blob = self.blob(name);
        self.client().await?.delete(&blob).await?;
        info!(%blob, "deleted");
        Ok(())
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        let blob = self.blob(name);
        self.client().await?.exists(&blob).await
    }

    async fn size(&self, name: &str) -> Result<u64> {
        let blob = self.blob(name);
        let meta = self.client().await?.reload(&blob).await?;
        Ok(meta.size)
    }

    /// Virtual-hosted-style URL, built locally. The bucket goes in the host
    /// because image proxies and thumbnailers expect that form.
    fn url(&self, name: &str) -> String {
        format!("https://{}.storage.googleapis.com/{name}", self.config.bucket)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::backend::memory::{MemoryFactory, MemoryStore};
    use crate::blob::ObjectMetadata;
    use crate::config::Credentials;
    use crate::file::{ContentFile, FieldFile, UploadedFile};

    fn storage() -> (GCloudStorage, Arc<MemoryFactory>) {
        let factory = Arc::new(MemoryFactory::new(MemoryStore::new()));
        let storage = GCloudStorage::new(StorageConfig::new("media"), factory.clone()).unwrap();
        (storage, factory)
    }

    #[tokio::test]
    async fn save_then_open_roundtrip() {
        let (storage, _) = storage();
        let payload = b"the quick brown fox".to_vec();
        let mut file = ContentFile::new(payload.clone());

        let name = storage.save("docs/fox.txt", &mut file).await.unwrap();
        assert_eq!(name, "docs/fox.txt");

        let mut opened = storage.open("docs/fox.txt", "rb").await.unwrap();
        assert_eq!(opened.name(), "docs/fox.txt");
        assert_eq!(opened.size(), payload.len() as u64);
        let mut out = Vec::new();
        opened.read_to_end(&mut out).unwrap();
        assert_eq!(out, payload);
    }

    #[tokio::test]
    async fn save_rewinds_content_first() {
        let (storage, _) = storage();
        let mut file = ContentFile::new(b"abcdef".to_vec());
        let mut skip = [0u8; 3];
        file.read_exact(&mut skip).unwrap();

        storage.save("letters", &mut file).await.unwrap();
        let mut opened = storage.open("letters", "r").await.unwrap();
        assert_eq!(opened.read_all().unwrap(), b"abcdef");
    }

    #[tokio::test]
    async fn write_modes_are_rejected() {
        let (storage, factory) = storage();
        for mode in ["w", "wb", "w+", "rb+", "a", "ab", "x", "r+"] {
            let err = storage.open("any", mode).await.unwrap_err();
            assert!(err.is_unsupported(), "mode {mode}");
        }
        assert_eq!(factory.connects(), 0);
    }

    #[tokio::test]
    async fn open_missing_is_not_found() {
        let (storage, _) = storage();
        let err = storage.open("missing", "rb").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn exists_and_size_follow_save() {
        let (storage, _) = storage();
        assert!(!storage.exists("a.bin").await.unwrap());

        let mut file = ContentFile::new(vec![0u8; 1234]);
        storage.save("a.bin", &mut file).await.unwrap();
        assert!(storage.exists("a.bin").await.unwrap());
        assert_eq!(storage.size("a.bin").await.unwrap(), 1234);

        storage.delete("a.bin").await.unwrap();
        assert!(!storage.exists("a.bin").await.unwrap());
    }

    #[tokio::test]
    async fn size_of_missing_object_fails() {
        let (storage, _) = storage();
        assert!(storage.size("ghost").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn declared_size_mismatch_surfaces() {
        let (storage, _) = storage();
        let mut file = UploadedFile::new(Cursor::new(b"short".to_vec()), 99, None);
        let err = storage.save("bad", &mut file).await.unwrap_err();
        assert!(matches!(err, StorageError::SizeMismatch { declared: 99, actual: 5, .. }));
    }

    #[tokio::test]
    async fn huge_declared_size_is_a_mismatch() {
        let (storage, factory) = storage();
        let mut file = UploadedFile::new(Cursor::new(b"short".to_vec()), u64::MAX, None);
        let err = storage.save("huge", &mut file).await.unwrap_err();
        assert!(matches!(
            err,
            StorageError::SizeMismatch { declared: u64::MAX, actual: 5, .. }
        ));
        assert!(factory.store().is_empty().await);
    }

    #[tokio::test]
    async fn content_type_resolution_order() {
        let (storage, factory) = storage();
        let store = factory.store().clone();

        let mut png = ContentFile::new(b"x".to_vec()).with_content_type("image/png");
        storage.save("a.txt", &mut png).await.unwrap();
        assert_eq!(
            store.content_type(&BlobRef::new("media", "a.txt")).await.as_deref(),
            Some("image/png")
        );

        let mut nested =
            FieldFile::new(ContentFile::new(b"x".to_vec()).with_content_type("image/gif"));
        storage.save("b.txt", &mut nested).await.unwrap();
        assert_eq!(
            store.content_type(&BlobRef::new("media", "b.txt")).await.as_deref(),
            Some("image/gif")
        );

        let mut json = ContentFile::new(b"{}".to_vec());
        storage.save("a.json", &mut json).await.unwrap();
        assert_eq!(
            store.content_type(&BlobRef::new("media", "a.json")).await.as_deref(),
            Some("application/json")
        );

        let mut plain = ContentFile::new(b"?".to_vec());
        storage.save("noext", &mut plain).await.unwrap();
        assert_eq!(
            store.content_type(&BlobRef::new("media", "noext")).await.as_deref(),
            Some("application/octet-stream")
        );
    }

    #[tokio::test]
    async fn configured_default_content_type_used() {
        let factory = Arc::new(MemoryFactory::new(MemoryStore::new()));
        let config = StorageConfig::new("media").with_default_content_type("text/plain");
        let storage = GCloudStorage::new(config, factory.clone()).unwrap();
        storage
            .save("blob", &mut ContentFile::new(b"?".to_vec()))
            .await
            .unwrap();
        assert_eq!(
            factory
                .store()
                .content_type(&BlobRef::new("media", "blob"))
                .await
                .as_deref(),
            Some("text/plain")
        );
    }

    #[tokio::test]
    async fn opened_file_can_be_saved_again() {
        let (storage, _) = storage();
        storage
            .save("src.bin", &mut ContentFile::new(b"copy me".to_vec()))
            .await
            .unwrap();
        let mut opened = storage.open("src.bin", "rb").await.unwrap();
        storage.save("dst.bin", &mut opened).await.unwrap();
        assert_eq!(
            storage.open("dst.bin", "rb").await.unwrap().read_all().unwrap(),
            b"copy me"
        );
    }

    #[tokio::test]
    async fn spills_to_disk_past_threshold() {
        let factory = Arc::new(MemoryFactory::new(MemoryStore::new()));
        let config = StorageConfig::new("media").with_max_memory_size(8);
        let storage = GCloudStorage::new(config, factory).unwrap();
        storage
            .save("big", &mut ContentFile::new(vec![1u8; 64]))
            .await
            .unwrap();
        storage
            .save("small", &mut ContentFile::new(vec![1u8; 4]))
            .await
            .unwrap();

        let mut big = storage.open("big", "rb").await.unwrap();
        assert!(big.is_on_disk());
        assert_eq!(big.read_all().unwrap(), vec![1u8; 64]);
        assert!(!storage.open("small", "rb").await.unwrap().is_on_disk());
    }

    struct FailingClient;

    #[async_trait]
    impl ObjectStoreClient for FailingClient {
        async fn upload(&self, _: &BlobRef, _: Bytes, _: u64, _: &str) -> Result<()> {
            Err(StorageError::transport(anyhow::anyhow!("offline")))
        }
        async fn download(&self, _: &BlobRef, _: &mut (dyn Write + Send)) -> Result<u64> {
            Err(StorageError::transport(anyhow::anyhow!("offline")))
        }
        async fn delete(&self, _: &BlobRef) -> Result<()> {
            Err(StorageError::transport(anyhow::anyhow!("offline")))
        }
        async fn exists(&self, _: &BlobRef) -> Result<bool> {
            Err(StorageError::transport(anyhow::anyhow!("offline")))
        }
        async fn reload(&self, _: &BlobRef) -> Result<ObjectMetadata> {
            Err(StorageError::transport(anyhow::anyhow!("offline")))
        }
    }

    #[tokio::test]
    async fn url_is_built_locally() {
        let connects = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = connects.clone();
        let factory = move |_: Option<&str>,
                            _: Option<&Credentials>|
              -> Result<Arc<dyn ObjectStoreClient>> {
            counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            Ok(Arc::new(FailingClient))
        };
        let storage = GCloudStorage::new(StorageConfig::new("my-bucket"), Arc::new(factory)).unwrap();

        assert_eq!(
            storage.url("images/cat.png"),
            "https://my-bucket.storage.googleapis.com/images/cat.png"
        );
        assert_eq!(connects.load(std::sync::atomic::Ordering::Relaxed), 0);

        let err = storage.exists("images/cat.png").await.unwrap_err();
        assert!(matches!(err, StorageError::Transport(_)));
        assert_eq!(err.to_string(), "offline");
    }

    #[test]
    fn timestamps_are_unsupported() {
        let (storage, _) = storage();
        assert!(storage.created_time("a").unwrap_err().is_unsupported());
        assert!(storage.modified_time("a").unwrap_err().is_unsupported());
    }

    #[tokio::test]
    async fn one_client_per_worker() {
        let (storage, factory) = storage();
        storage.exists("a").await.unwrap();
        storage.exists("b").await.unwrap();
        let first = storage.client().await.unwrap();
        let second = storage.client().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(factory.connects(), 1);

        assert!(storage.release_worker(WorkerId::current()).await);
        assert_eq!(storage.active_clients().await, 0);
    }

    #[test]
    fn workers_never_share_clients() {
        let (storage, factory) = storage();
        let storage = Arc::new(storage);

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let storage = storage.clone();
                std::thread::spawn(move || {
                    let rt = tokio::runtime::Builder::new_current_thread()
                        .build()
                        .unwrap();
                    rt.block_on(async {
                        storage.exists("x").await.unwrap();
                        let a = storage.client().await.unwrap();
                        let b = storage.client().await.unwrap();
                        assert!(Arc::ptr_eq(&a, &b));
                        a
                    })
                })
            })
            .collect();
        let clients: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(!Arc::ptr_eq(&clients[0], &clients[1]));
        assert_eq!(factory.connects(), 2);
    }

    #[test]
    fn exited_workers_release_their_clients() {
        let (storage, factory) = storage();
        let storage = Arc::new(storage);

        for _ in 0..50 {
            let storage = storage.clone();
            std::thread::spawn(move || {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .build()
                    .unwrap();
                rt.block_on(async { storage.exists("x").await.unwrap() });
            })
            .join()
            .unwrap();
        }
        assert_eq!(factory.connects(), 50);

        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        assert_eq!(rt.block_on(storage.active_clients()), 0);
    }
}
