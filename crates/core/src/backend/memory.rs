use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use super::{ClientFactory, ObjectStoreClient, check_declared_size, not_found};
use crate::blob::{BlobRef, ObjectMetadata};
use crate::config::Credentials;
use crate::error::Result;

#[derive(Debug, Clone)]
struct MemoryObject {
    data: Bytes,
    content_type: String,
}

/// Object store held in process memory. Several clients can share one.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: RwLock<HashMap<BlobRef, MemoryObject>>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    pub async fn content_type(&self, blob: &BlobRef) -> Option<String> {
        self.objects
            .read()
            .await
            .get(blob)
            .map(|o| o.content_type.clone())
    }
}

#[derive(Debug)]
pub struct MemoryClient {
    store: Arc<MemoryStore>,
    requests: AtomicU64,
}

impl MemoryClient {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self {
            store,
            requests: AtomicU64::new(0),
        }
    }

    /// Number of requests this client has served.
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    fn count(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }
}

#[async_trait]
impl ObjectStoreClient for MemoryClient {
    async fn upload(
        &self,
        blob: &BlobRef,
        data: Bytes,
        size: u64,
        content_type: &str,
    ) -> Result<()> {
        self.count();
        check_declared_size(blob, size, &data)?;
        let object = MemoryObject {
            data,
            content_type: content_type.to_string(),
        };
        self.store.objects.write().await.insert(blob.clone(), object);
        Ok(())
    }

    async fn download(&self, blob: &BlobRef, sink: &mut (dyn Write + Send)) -> Result<u64> {
        self.count();
        let data = {
            let objects = self.store.objects.read().await;
            objects.get(blob).ok_or_else(|| not_found(blob))?.data.clone()
        };
        sink.write_all(&data)?;
        Ok(data.len() as u64)
    }

    async fn delete(&self, blob: &BlobRef) -> Result<()> {
        self.count();
        match self.store.objects.write().await.remove(blob) {
            Some(_) => Ok(()),
            None => Err(not_found(blob)),
        }
    }

    async fn exists(&self, blob: &BlobRef) -> Result<bool> {
        self.count();
        Ok(self.store.objects.read().await.contains_key(blob))
    }

    async fn reload(&self, blob: &BlobRef) -> Result<ObjectMetadata> {
        self.count();
        let objects = self.store.objects.read().await;
        let object = objects.get(blob).ok_or_else(|| not_found(blob))?;
        Ok(ObjectMetadata {
            size: object.data.len() as u64,
            content_type: Some(object.content_type.clone()),
        })
    }
}

/// Hands out a fresh [`MemoryClient`] per connect, all backed by one store.
#[derive(Debug, Default)]
pub struct MemoryFactory {
    store: Arc<MemoryStore>,
    connects: AtomicUsize,
}

impl MemoryFactory {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self {
            store,
            connects: AtomicUsize::new(0),
        }
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    /// How many clients have been built so far.
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::Relaxed)
    }
}

impl ClientFactory for MemoryFactory {
    fn connect(
        &self,
        _project: Option<&str>,
        _credentials: Option<&Credentials>,
    ) -> Result<Arc<dyn ObjectStoreClient>> {
        self.connects.fetch_add(1, Ordering::Relaxed);
        Ok(Arc::new(MemoryClient::new(self.store.clone())))
    }
}
