//! Local-first persistence with best-effort remote mirroring.
//!
//! Every change is written to the local cache before anything else happens;
//! that write is the durability guarantee. When a session is active the full
//! tree is also handed to a background sync worker, which pushes it to the
//! remote store and logs (then forgets) any failure.
//!
//! A generation counter guards against stale remote work. Login and logout
//! bump it; a remote load that finishes under a different generation than it
//! started with is discarded, and queued pushes stamped with an old
//! generation are dropped unsent.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use crate::io::local_store::{LocalStore, StoreError};
use crate::io::remote::{RemoteError, TaskStore};
use crate::model::session::User;
use crate::model::task::{Task, default_tree};

/// Where a loaded tree came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Remote,
    LocalCache,
    DefaultSeed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOutcome {
    pub tasks: Vec<Task>,
    pub source: LoadSource,
}

pub struct PersistenceGateway {
    local: LocalStore,
    remote: Option<Arc<dyn TaskStore>>,
    generation: Arc<AtomicU64>,
    worker: Option<SyncWorker>,
}

impl PersistenceGateway {
    pub fn new(local: LocalStore, remote: Option<Arc<dyn TaskStore>>) -> Self {
        let generation = Arc::new(AtomicU64::new(0));
        let worker = remote
            .as_ref()
            .and_then(|store| SyncWorker::spawn(Arc::clone(store), Arc::clone(&generation)));
        PersistenceGateway {
            local,
            remote,
            generation,
            worker,
        }
    }

    pub fn local(&self) -> &LocalStore {
        &self.local
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Start a new generation; in-flight and queued remote work from the old
    /// one will be ignored. Returns the new generation.
    pub fn invalidate(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Pick the tree to start from: the remote copy if there is a session and
    /// the remote returns something non-empty, else the local cache, else the
    /// default seed tree.
    pub fn load_initial(&self, session: Option<&User>) -> Result<LoadOutcome, StoreError> {
        if let (Some(user), Some(remote)) = (session, &self.remote) {
            let started = self.generation();
            match remote.fetch(user.id) {
                Ok(tasks) if tasks.is_empty() => {
                    debug!(user_id = user.id, "remote tree is empty; using local cache");
                }
                Ok(_) if self.generation() != started => {
                    warn!(
                        user_id = user.id,
                        "session changed during remote load; discarding result"
                    );
                }
                Ok(tasks) => {
                    if let Err(e) = self.local.write_tasks(&tasks) {
                        warn!(error = %e, "could not mirror remote tree into local cache");
                    }
                    info!(user_id = user.id, roots = tasks.len(), "loaded tree from remote");
                    return Ok(LoadOutcome {
                        tasks,
                        source: LoadSource::Remote,
                    });
                }
                Err(e) => {
                    warn!(user_id = user.id, error = %e, "remote load failed; using local cache");
                }
            }
        }
        self.load_local()
    }

    fn load_local(&self) -> Result<LoadOutcome, StoreError> {
        Ok(match self.local.read_tasks()? {
            Some(tasks) => LoadOutcome {
                tasks,
                source: LoadSource::LocalCache,
            },
            None => {
                debug!("no local cache; seeding default tree");
                LoadOutcome {
                    tasks: default_tree(),
                    source: LoadSource::DefaultSeed,
                }
            }
        })
    }

    /// Write `roots` to the local cache, then queue a remote push if there is
    /// a session and something to push. Only the local write can fail.
    pub fn persist(&self, roots: &[Task], session: Option<&User>) -> Result<(), StoreError> {
        self.local.write_tasks(roots)?;
        if let (Some(user), Some(worker)) = (session, &self.worker)
            && !roots.is_empty()
        {
            worker.enqueue(SyncJob {
                generation: self.generation(),
                user_id: user.id,
                tasks: roots.to_vec(),
            });
        }
        Ok(())
    }

    /// Push synchronously, reporting failure to the caller. Returns `Ok(false)`
    /// when no remote store is configured.
    pub fn push_now(&self, roots: &[Task], user: &User) -> Result<bool, RemoteError> {
        let Some(remote) = &self.remote else {
            return Ok(false);
        };
        remote.push(user.id, roots)?;
        info!(user_id = user.id, roots = roots.len(), "pushed tree to remote");
        Ok(true)
    }

    /// Wait for queued pushes to be attempted and stop the worker. Later
    /// calls to [`persist`](Self::persist) only write locally.
    pub fn flush(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.finish();
        }
    }
}

// ---------------------------------------------------------------------------
// Sync worker
// ---------------------------------------------------------------------------

/// One full-tree snapshot waiting to be pushed
struct SyncJob {
    generation: u64,
    user_id: i64,
    tasks: Vec<Task>,
}

/// Background thread draining push requests.
///
/// Policy: only the newest queued snapshot is sent (older ones are
/// superseded), snapshots from an old generation are dropped, and a failed
/// push is logged and dropped without retry.
struct SyncWorker {
    sender: Option<Sender<SyncJob>>,
    handle: Option<JoinHandle<()>>,
}

impl SyncWorker {
    fn spawn(store: Arc<dyn TaskStore>, generation: Arc<AtomicU64>) -> Option<Self> {
        let (sender, receiver) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name("twig-sync".into())
            .spawn(move || run_worker(store.as_ref(), &generation, receiver));
        match spawned {
            Ok(handle) => Some(SyncWorker {
                sender: Some(sender),
                handle: Some(handle),
            }),
            Err(e) => {
                warn!(error = %e, "could not start sync worker; remote sync disabled");
                None
            }
        }
    }

    fn enqueue(&self, job: SyncJob) {
        let sent = self.sender.as_ref().map(|s| s.send(job).is_ok());
        if sent != Some(true) {
            warn!("sync worker has stopped; change kept locally only");
        }
    }

    fn finish(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // Closing the channel lets the worker drain what is queued and exit
        self.sender.take();
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            warn!("sync worker panicked");
        }
    }
}

impl Drop for SyncWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(store: &dyn TaskStore, generation: &AtomicU64, receiver: Receiver<SyncJob>) {
    while let Ok(mut job) = receiver.recv() {
        let mut superseded = 0usize;
        while let Ok(newer) = receiver.try_recv() {
            job = newer;
            superseded += 1;
        }
        if superseded > 0 {
            debug!(superseded, "coalesced queued snapshots");
        }

        let current = generation.load(Ordering::SeqCst);
        if job.generation != current {
            debug!(
                job_generation = job.generation,
                current, "dropping push from a previous session"
            );
            continue;
        }

        match store.push(job.user_id, &job.tasks) {
            Ok(()) => debug!(user_id = job.user_id, roots = job.tasks.len(), "remote sync ok"),
            Err(e) => warn!(
                user_id = job.user_id,
                error = %e,
                "remote sync failed; change kept locally only"
            ),
        }
    }
}
