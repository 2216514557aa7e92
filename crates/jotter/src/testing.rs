//! Test doubles shared by the provider and app tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use tokio::sync::watch;

use crate::alert::AlertSink;
use crate::error::{Error, Result};
use crate::note::{NoteId, NoteRecord};
use crate::storage::{Direction, NoteIndex};
use crate::store::{NoteCursor, NoteStore};

/// Alert sink that remembers every message.
#[derive(Debug, Default)]
pub(crate) struct RecordingAlerts {
    messages: Mutex<Vec<String>>,
}

impl RecordingAlerts {
    pub(crate) fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl AlertSink for RecordingAlerts {
    fn alert(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

/// In-memory store with a write gate, failure injection and per-note
/// in-flight accounting.
#[derive(Debug)]
pub(crate) struct ScriptedStore {
    records: Mutex<HashMap<NoteId, NoteRecord>>,
    writes: Mutex<Vec<NoteRecord>>,
    in_flight: Mutex<HashMap<NoteId, usize>>,
    max_in_flight: AtomicUsize,
    gate: watch::Sender<bool>,
    failing_writes: AtomicUsize,
    fail_scan: AtomicBool,
}

impl Default for ScriptedStore {
    fn default() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            records: Mutex::new(HashMap::new()),
            writes: Mutex::new(Vec::new()),
            in_flight: Mutex::new(HashMap::new()),
            max_in_flight: AtomicUsize::new(0),
            gate,
            failing_writes: AtomicUsize::new(0),
            fail_scan: AtomicBool::new(false),
        }
    }
}

impl ScriptedStore {
    pub(crate) fn with_records(records: impl IntoIterator<Item = NoteRecord>) -> Self {
        let store = Self::default();
        store
            .records
            .lock()
            .unwrap()
            .extend(records.into_iter().map(|r| (r.id.clone(), r)));
        store
    }

    /// Hold every write until [`ScriptedStore::open_gate`].
    pub(crate) fn close_gate(&self) {
        self.gate.send_replace(false);
    }

    pub(crate) fn open_gate(&self) {
        self.gate.send_replace(true);
    }

    /// Make the next `count` writes fail.
    pub(crate) fn fail_writes(&self, count: usize) {
        self.failing_writes.store(count, Ordering::SeqCst);
    }

    pub(crate) fn fail_scan(&self, fail: bool) {
        self.fail_scan.store(fail, Ordering::SeqCst);
    }

    /// Every write payload, in the order the writes started.
    pub(crate) fn writes(&self) -> Vec<NoteRecord> {
        self.writes.lock().unwrap().clone()
    }

    pub(crate) fn stored(&self, id: &NoteId) -> Option<NoteRecord> {
        self.records.lock().unwrap().get(id).cloned()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn write(&self, record: NoteRecord, insert_only: bool) -> Result<()> {
        self.writes.lock().unwrap().push(record.clone());
        {
            let mut in_flight = self.in_flight.lock().unwrap();
            let count = in_flight.entry(record.id.clone()).or_default();
            *count += 1;
            self.max_in_flight.fetch_max(*count, Ordering::SeqCst);
        }

        let mut gate = self.gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;
        tokio::task::yield_now().await;

        let fail = self
            .failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        let result = if fail {
            Err(Error::internal("injected write failure"))
        } else {
            let mut records = self.records.lock().unwrap();
            if insert_only && records.contains_key(&record.id) {
                Err(Error::DuplicateNote {
                    id: record.id.clone(),
                })
            } else {
                records.insert(record.id.clone(), record.clone());
                Ok(())
            }
        };

        *self
            .in_flight
            .lock()
            .unwrap()
            .get_mut(&record.id)
            .unwrap() -= 1;
        result
    }
}

#[async_trait::async_trait]
impl NoteStore for ScriptedStore {
    async fn add(&self, record: NoteRecord) -> Result<()> {
        self.write(record, true).await
    }

    async fn put(&self, record: NoteRecord) -> Result<()> {
        self.write(record, false).await
    }

    async fn get(&self, id: NoteId) -> Result<Option<NoteRecord>> {
        Ok(self.stored(&id))
    }

    fn open_cursor(&self, index: NoteIndex, direction: Direction) -> NoteCursor {
        let mut records: Vec<NoteRecord> = self.records.lock().unwrap().values().cloned().collect();
        records.sort_by_key(|r| match index {
            NoteIndex::Modified => r.modified,
            NoteIndex::Created => r.created,
        });
        if direction == Direction::Descending {
            records.reverse();
        }

        let (tx, cursor) = NoteCursor::channel(records.len() + 1);
        if self.fail_scan.load(Ordering::SeqCst) {
            if let Some(first) = records.into_iter().next() {
                let _ = tx.try_send(Ok(first));
            }
            let _ = tx.try_send(Err(Error::internal("injected scan failure")));
        } else {
            for record in records {
                let _ = tx.try_send(Ok(record));
            }
        }
        cursor
    }
}
