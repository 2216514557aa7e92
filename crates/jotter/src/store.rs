//! Asynchronous access to the note store.
//!
//! [`NoteStore`] is the seam between the provider and persistence. The
//! production implementation, [`StoreHandle`], owns a [`Storage`] on a
//! dedicated worker thread and talks to it over channels: each request
//! carries a `oneshot` reply, and scans stream records back through a bounded
//! channel that the caller drains as a [`NoteCursor`].

use std::thread;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::note::{NoteId, NoteRecord};
use crate::storage::{Direction, NoteIndex, Storage};

/// Records buffered ahead of a cursor's consumer.
const CURSOR_BUFFER: usize = 32;

/// Asynchronous note persistence.
#[async_trait::async_trait]
pub trait NoteStore: Send + Sync + std::fmt::Debug {
    /// Insert a new record; an existing id is an error.
    async fn add(&self, record: NoteRecord) -> Result<()>;

    /// Insert or replace a whole record.
    async fn put(&self, record: NoteRecord) -> Result<()>;

    /// Look up a record by id.
    async fn get(&self, id: NoteId) -> Result<Option<NoteRecord>>;

    /// Open a cursor over every record in `index` order.
    fn open_cursor(&self, index: NoteIndex, direction: Direction) -> NoteCursor;
}

/// A sequential, resumable iterator over stored records.
#[derive(Debug)]
pub struct NoteCursor {
    rx: mpsc::Receiver<Result<NoteRecord>>,
}

impl NoteCursor {
    /// Create a cursor and the sender that feeds it.
    #[must_use]
    pub fn channel(buffer: usize) -> (mpsc::Sender<Result<NoteRecord>>, Self) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (tx, Self { rx })
    }

    /// Advance to the next record. Returns `None` once the scan is exhausted.
    pub async fn next(&mut self) -> Option<Result<NoteRecord>> {
        self.rx.recv().await
    }
}

enum Request {
    Add {
        record: NoteRecord,
        reply: oneshot::Sender<Result<()>>,
    },
    Put {
        record: NoteRecord,
        reply: oneshot::Sender<Result<()>>,
    },
    Get {
        id: NoteId,
        reply: oneshot::Sender<Result<Option<NoteRecord>>>,
    },
    Scan {
        index: NoteIndex,
        direction: Direction,
        tx: mpsc::Sender<Result<NoteRecord>>,
    },
}

/// Handle to the store worker thread. Cheap to clone; the worker exits once
/// every handle is dropped.
#[derive(Debug, Clone)]
pub struct StoreHandle {
    tx: mpsc::UnboundedSender<Request>,
}

impl StoreHandle {
    /// Move `storage` onto a new worker thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn(storage: Storage) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        thread::Builder::new()
            .name("jotter-store".to_string())
            .spawn(move || run_worker(&storage, rx))?;
        Ok(Self { tx })
    }

    async fn call<T>(
        &self,
        request: impl FnOnce(oneshot::Sender<Result<T>>) -> Request,
    ) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(request(reply))
            .map_err(|_| Error::StoreClosed)?;
        rx.await.map_err(|_| Error::StoreClosed)?
    }
}

#[async_trait::async_trait]
impl NoteStore for StoreHandle {
    async fn add(&self, record: NoteRecord) -> Result<()> {
        self.call(|reply| Request::Add { record, reply }).await
    }

    async fn put(&self, record: NoteRecord) -> Result<()> {
        self.call(|reply| Request::Put { record, reply }).await
    }

    async fn get(&self, id: NoteId) -> Result<Option<NoteRecord>> {
        self.call(|reply| Request::Get { id, reply }).await
    }

    fn open_cursor(&self, index: NoteIndex, direction: Direction) -> NoteCursor {
        let (tx, cursor) = NoteCursor::channel(CURSOR_BUFFER);
        let request = Request::Scan {
            index,
            direction,
            tx: tx.clone(),
        };
        if self.tx.send(request).is_err() {
            let _ = tx.try_send(Err(Error::StoreClosed));
        }
        cursor
    }
}

fn run_worker(storage: &Storage, mut rx: mpsc::UnboundedReceiver<Request>) {
    debug!("Store worker started for {}", storage.path().display());

    while let Some(request) = rx.blocking_recv() {
        match request {
            Request::Add { record, reply } => {
                trace!(note = %record.id, "add");
                let _ = reply.send(storage.add(&record));
            }
            Request::Put { record, reply } => {
                trace!(note = %record.id, "put");
                let _ = reply.send(storage.put(&record));
            }
            Request::Get { id, reply } => {
                let _ = reply.send(storage.get(&id));
            }
            Request::Scan {
                index,
                direction,
                tx,
            } => {
                let result = storage.scan(index, direction, |record| {
                    tx.blocking_send(Ok(record)).is_ok()
                });
                match result {
                    Ok(visited) => trace!(visited, "scan finished"),
                    Err(err) => {
                        warn!("Scan failed: {}", err);
                        let _ = tx.blocking_send(Err(err));
                    }
                }
            }
        }
    }

    debug!("Store worker exiting");
}
