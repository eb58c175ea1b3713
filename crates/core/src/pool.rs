use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

use tokio::sync::RwLock;
use tracing::debug;

use crate::backend::{ClientFactory, ObjectStoreClient};
use crate::config::Credentials;
use crate::error::Result;

thread_local! {
    // Dropped when the thread exits, which invalidates every `Worker` taken on it.
    static LIVENESS: Arc<()> = Arc::new(());
}

/// Identity of the worker a client belongs to: the OS thread issuing
/// the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerId(ThreadId);

impl WorkerId {
    pub fn current() -> Self {
        Self(thread::current().id())
    }
}

/// A worker's identity together with a token that lapses when its
/// thread ends.
#[derive(Debug, Clone)]
pub struct Worker {
    id: WorkerId,
    alive: Weak<()>,
}

impl Worker {
    pub fn current() -> Self {
        Self {
            id: WorkerId::current(),
            alive: LIVENESS.with(Arc::downgrade),
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn is_alive(&self) -> bool {
        self.alive.strong_count() > 0
    }
}

struct Entry {
    worker: Worker,
    client: Arc<dyn ObjectStoreClient>,
}

/// One client per worker, built lazily from a fixed project and
/// credentials. A client is never handed to a worker other than the one
/// it was built for. Entries of workers whose thread has exited are
/// dropped on the next `acquire` or `len`; [`ClientPool::release`] drops
/// one immediately.
pub struct ClientPool {
    factory: Arc<dyn ClientFactory>,
    project: Option<String>,
    credentials: Option<Credentials>,
    clients: RwLock<HashMap<WorkerId, Entry>>,
}

impl ClientPool {
    pub fn new(
        factory: Arc<dyn ClientFactory>,
        project: Option<String>,
        credentials: Option<Credentials>,
    ) -> Self {
        Self {
            factory,
            project,
            credentials,
            clients: RwLock::new(HashMap::new()),
        }
    }

    pub async fn acquire(&self, worker: &Worker) -> Result<Arc<dyn ObjectStoreClient>> {
        if let Some(entry) = self.clients.read().await.get(&worker.id) {
            return Ok(entry.client.clone());
        }

        let mut clients = self.clients.write().await;
        if let Some(entry) = clients.get(&worker.id) {
            return Ok(entry.client.clone());
        }
        let pruned = prune_exited(&mut clients);
        let client = self
            .factory
            .connect(self.project.as_deref(), self.credentials.as_ref())?;
        clients.insert(
            worker.id,
            Entry {
                worker: worker.clone(),
                client: client.clone(),
            },
        );
        debug!(worker = ?worker.id, workers = clients.len(), pruned, "built storage client");
        Ok(client)
    }

    /// Drops the worker's client. Returns whether it had one.
    pub async fn release(&self, worker: WorkerId) -> bool {
        let removed = self.clients.write().await.remove(&worker).is_some();
        if removed {
            debug!(?worker, "released storage client");
        }
        removed
    }

    /// Number of clients held for live workers.
    pub async fn len(&self) -> usize {
        let mut clients = self.clients.write().await;
        prune_exited(&mut clients);
        clients.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn prune_exited(clients: &mut HashMap<WorkerId, Entry>) -> usize {
    let before = clients.len();
    clients.retain(|_, entry| entry.worker.is_alive());
    let pruned = before - clients.len();
    if pruned > 0 {
        debug!(pruned, "dropped clients of exited workers");
    }
    pruned
}
