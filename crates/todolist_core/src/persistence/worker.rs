//! Background thread that owns the key-value store.

use crate::model::snapshot::TodoSnapshot;
use crate::persistence::codec::{decode_items, encode_items, CodecError};
use crate::store::kv_store::{KeyValueStore, StoreError};
use log::{debug, error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const WORKER_THREAD_NAME: &str = "todolist-persistence";

/// Why a load or save did not go through.
#[derive(Debug)]
pub enum PersistenceError {
    Store(StoreError),
    Codec(CodecError),
}

impl Display for PersistenceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "{err}"),
            Self::Codec(err) => write!(f, "{err}"),
        }
    }
}

impl Error for PersistenceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::Codec(err) => Some(err),
        }
    }
}

impl From<StoreError> for PersistenceError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<CodecError> for PersistenceError {
    fn from(value: CodecError) -> Self {
        Self::Codec(value)
    }
}

/// Receives the decoded items of a load, `Ok(None)` when nothing was stored.
///
/// Runs on the worker thread.
pub type LoadCallback = Box<dyn FnOnce(Result<Option<Vec<String>>, PersistenceError>) + Send>;

/// Counters updated by the worker as requests complete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistenceStats {
    pub writes_completed: usize,
    pub writes_failed: usize,
    pub reads_failed: usize,
}

#[derive(Debug, Default)]
struct Counters {
    writes_completed: AtomicUsize,
    writes_failed: AtomicUsize,
    reads_failed: AtomicUsize,
}

impl Counters {
    fn snapshot(&self) -> PersistenceStats {
        PersistenceStats {
            writes_completed: self.writes_completed.load(Ordering::Acquire),
            writes_failed: self.writes_failed.load(Ordering::Acquire),
            reads_failed: self.reads_failed.load(Ordering::Acquire),
        }
    }
}

enum Request {
    Load {
        key: String,
        on_complete: LoadCallback,
    },
    Save {
        key: String,
        snapshot: TodoSnapshot,
    },
    Flush {
        done: Sender<()>,
    },
    Shutdown,
}

/// Single-threaded, FIFO executor for store reads and writes.
///
/// Dropping the worker drains every queued request before the thread exits,
/// so writes issued before the drop still reach the store.
pub struct PersistenceWorker {
    requests: Sender<Request>,
    counters: Arc<Counters>,
    handle: Option<JoinHandle<()>>,
}

impl PersistenceWorker {
    /// Moves `store` onto a new worker thread.
    ///
    /// # Errors
    /// Returns the OS error when the thread cannot be spawned.
    pub fn spawn<S>(store: S) -> std::io::Result<Self>
    where
        S: KeyValueStore + Send + 'static,
    {
        let (requests, inbox) = channel();
        let counters = Arc::new(Counters::default());
        let worker_counters = Arc::clone(&counters);

        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || run(store, inbox, worker_counters))?;

        Ok(Self {
            requests,
            counters,
            handle: Some(handle),
        })
    }

    /// Queues a read of `key`; `on_complete` receives the decoded items.
    ///
    /// Returns `false` when the worker has already stopped.
    pub fn load(&self, key: impl Into<String>, on_complete: LoadCallback) -> bool {
        self.submit(Request::Load {
            key: key.into(),
            on_complete,
        })
    }

    /// Queues a write of `snapshot` under `key` and returns immediately.
    pub fn save(&self, key: impl Into<String>, snapshot: TodoSnapshot) -> bool {
        self.submit(Request::Save {
            key: key.into(),
            snapshot,
        })
    }

    /// Waits until every request queued before this call has finished.
    ///
    /// Returns `false` on timeout or when the worker is gone.
    pub fn flush(&self, timeout: Duration) -> bool {
        let (done, finished) = channel();
        if !self.submit(Request::Flush { done }) {
            return false;
        }
        finished.recv_timeout(timeout).is_ok()
    }

    pub fn stats(&self) -> PersistenceStats {
        self.counters.snapshot()
    }

    /// Drains the queue, stops the thread and returns the final counters.
    pub fn shutdown(mut self) -> PersistenceStats {
        self.stop_and_join();
        self.counters.snapshot()
    }

    fn submit(&self, request: Request) -> bool {
        if self.requests.send(request).is_err() {
            warn!("event=persistence_submit module=persistence status=dropped reason=worker_stopped");
            return false;
        }
        true
    }

    fn stop_and_join(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let _ = self.requests.send(Request::Shutdown);
        if handle.join().is_err() {
            error!("event=persistence_worker module=persistence status=error reason=worker_panicked");
        }
    }
}

impl Drop for PersistenceWorker {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

fn run<S: KeyValueStore>(store: S, inbox: Receiver<Request>, counters: Arc<Counters>) {
    info!("event=persistence_worker module=persistence status=start");

    for request in inbox {
        match request {
            Request::Load { key, on_complete } => {
                let result = load_items(&store, &key);
                if let Err(err) = &result {
                    counters.reads_failed.fetch_add(1, Ordering::AcqRel);
                    error!(
                        "event=todo_load module=persistence status=error key={} error={}",
                        key, err
                    );
                }
                on_complete(result);
            }
            Request::Save { key, snapshot } => match save_items(&store, &key, &snapshot) {
                Ok(()) => {
                    counters.writes_completed.fetch_add(1, Ordering::AcqRel);
                    debug!(
                        "event=todo_persist module=persistence status=ok key={} revision={} items={}",
                        key,
                        snapshot.revision(),
                        snapshot.len()
                    );
                }
                Err(err) => {
                    counters.writes_failed.fetch_add(1, Ordering::AcqRel);
                    error!(
                        "event=todo_persist module=persistence status=error key={} revision={} error={}",
                        key,
                        snapshot.revision(),
                        err
                    );
                }
            },
            Request::Flush { done } => {
                let _ = done.send(());
            }
            Request::Shutdown => break,
        }
    }

    info!("event=persistence_worker module=persistence status=stopped");
}

fn load_items<S: KeyValueStore>(
    store: &S,
    key: &str,
) -> Result<Option<Vec<String>>, PersistenceError> {
    match store.get(key)? {
        Some(blob) => Ok(Some(decode_items(&blob)?)),
        None => Ok(None),
    }
}

fn save_items<S: KeyValueStore>(
    store: &S,
    key: &str,
    snapshot: &TodoSnapshot,
) -> Result<(), PersistenceError> {
    let blob = encode_items(snapshot.items())?;
    store.set(key, &blob)?;
    Ok(())
}
