//! The notes provider.
//!
//! The provider is the single authority between in-memory [`Note`]s and the
//! [`NoteStore`]. Every title or text change reaches [`NotesProvider`] through
//! [`NoteSink::updated`], which refreshes subscribers and schedules a save.
//!
//! Saves are coalesced per note. A note is in one of four states:
//!
//! | dirty | saving | meaning                                              |
//! |-------|--------|------------------------------------------------------|
//! | no    | no     | idle, nothing pending                                |
//! | yes   | no     | transient; a save starts in the same step            |
//! | no    | yes    | the in-flight write matches the note                 |
//! | yes   | yes    | the note changed during the write; re-save follows   |
//!
//! A change while idle starts a write of the current snapshot. A change while
//! a write is in flight only marks the note dirty. When a write completes, a
//! dirty note immediately starts one more write of its latest state, so at
//! most one write per note is ever in flight and superseded intermediate
//! states are never written.
//!
//! A failed write is alerted and never retried. If the note was dirtied while
//! the failed write was in flight, the follow-up save of the latest state
//! still runs.

use std::sync::{Arc, Weak};

use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, error, info, trace};

use crate::alert::AlertSink;
use crate::error::{Error, Result};
use crate::note::{Note, NoteDraft, NoteEvent, NoteRecord, NoteSink};
use crate::storage::{Direction, NoteIndex};
use crate::store::NoteStore;
use crate::view_model::ViewModel;

/// Alert shown when a background save fails.
pub const SAVE_FAILED: &str = "Failed to save note.";

/// Alert shown when persisting a new note fails.
pub const ADD_FAILED: &str = "Creating new note failed.";

/// Coordinates notes, the view model and the store.
#[derive(Debug)]
pub struct NotesProvider {
    store: Arc<dyn NoteStore>,
    view_model: Arc<ViewModel>,
    alerts: Arc<dyn AlertSink>,
    runtime: Handle,
    in_flight: watch::Sender<usize>,
}

impl NotesProvider {
    /// Create a provider. Must be called from within a tokio runtime; save
    /// completions are spawned onto that runtime.
    ///
    /// # Errors
    ///
    /// Returns an error when called outside a tokio runtime.
    pub fn new(
        store: Arc<dyn NoteStore>,
        view_model: Arc<ViewModel>,
        alerts: Arc<dyn AlertSink>,
    ) -> Result<Arc<Self>> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::internal(format!("notes provider needs a tokio runtime: {e}")))?;
        let (in_flight, _) = watch::channel(0);
        Ok(Arc::new(Self {
            store,
            view_model,
            alerts,
            runtime,
            in_flight,
        }))
    }

    /// The view model this provider feeds.
    #[must_use]
    pub fn view_model(&self) -> &Arc<ViewModel> {
        &self.view_model
    }

    /// Weak handle notes use to report changes.
    #[must_use]
    pub fn sink(self: &Arc<Self>) -> Weak<dyn NoteSink> {
        let sink: Arc<dyn NoteSink> = Arc::clone(self) as Arc<dyn NoteSink>;
        Arc::downgrade(&sink)
    }

    /// A fresh note bound to this provider. Not persisted yet.
    #[must_use]
    pub fn create_note(self: &Arc<Self>, draft: Option<NoteDraft>) -> Arc<Note> {
        Note::new(self.sink(), draft)
    }

    /// A note rebuilt from a stored record, bound to this provider.
    #[must_use]
    pub fn hydrate(self: &Arc<Self>, record: NoteRecord) -> Arc<Note> {
        Note::hydrate(self.sink(), record)
    }

    /// Load every stored note, newest modification first, into the view model.
    ///
    /// Returns the number of notes loaded.
    ///
    /// # Errors
    ///
    /// Returns the first cursor error; notes read before it stay listed.
    pub async fn init(self: &Arc<Self>) -> Result<usize> {
        debug!("Loading notes");
        let mut cursor = self
            .store
            .open_cursor(NoteIndex::Modified, Direction::Descending);

        let mut loaded = 0;
        while let Some(record) = cursor.next().await {
            let record = record?;
            trace!(note = %record.id, title = %record.title, "hydrating");
            self.view_model.add_note(self.hydrate(record));
            loaded += 1;
        }

        info!("Loaded {} notes", loaded);
        Ok(loaded)
    }

    /// Persist a brand-new note, then list it first and make it current.
    ///
    /// # Errors
    ///
    /// Returns the store error after alerting the user. Nothing is retried.
    pub async fn add_note(self: &Arc<Self>, note: &Arc<Note>) -> Result<()> {
        match self.store.add(note.record()).await {
            Ok(()) => {
                debug!(note = %note.id(), "note added");
                self.view_model.insert_front(Arc::clone(note));
                self.view_model.set_current_note(Some(Arc::clone(note)));
                Ok(())
            }
            Err(err) => {
                error!(note = %note.id(), "Creating note failed: {}", err);
                self.alerts.alert(ADD_FAILED);
                Err(err)
            }
        }
    }

    /// Write the note's current state, or mark it dirty when a write is
    /// already in flight.
    pub fn save_note(self: &Arc<Self>, note: &Arc<Note>) {
        match note.schedule_save() {
            Some(record) => self.start_save(note, record),
            None => trace!(note = %note.id(), "save in flight, marked dirty"),
        }
    }

    /// Number of writes currently in flight across all notes.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        *self.in_flight.borrow()
    }

    /// Wait until no write is in flight.
    pub async fn idle(&self) {
        let mut rx = self.in_flight.subscribe();
        let _ = rx.wait_for(|count| *count == 0).await;
    }

    fn start_save(self: &Arc<Self>, note: &Arc<Note>, record: NoteRecord) {
        self.in_flight.send_modify(|count| *count += 1);
        trace!(note = %note.id(), "write started");

        let provider = Arc::clone(self);
        let note = Arc::clone(note);
        self.runtime.spawn(async move {
            let result = provider.store.put(record).await;
            provider.complete_save(&note, result);
            provider
                .in_flight
                .send_modify(|count| *count = count.saturating_sub(1));
        });
    }

    fn complete_save(self: &Arc<Self>, note: &Arc<Note>, result: Result<()>) {
        match result {
            Ok(()) => trace!(note = %note.id(), "write completed"),
            Err(err) => {
                error!(note = %note.id(), "Saving note failed: {}", err);
                self.alerts.alert(SAVE_FAILED);
            }
        }

        if let Some(record) = note.finish_save() {
            debug!(note = %note.id(), "re-saving note updated during the write");
            self.start_save(note, record);
        }
    }
}

impl NoteSink for NotesProvider {
    fn updated(self: Arc<Self>, note: &Arc<Note>) {
        note.emit(NoteEvent::Changed);
        self.save_note(note);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::NoteId;
    use crate::testing::{RecordingAlerts, ScriptedStore};
    use chrono::{Duration, TimeZone, Utc};

    struct Fixture {
        store: Arc<ScriptedStore>,
        alerts: Arc<RecordingAlerts>,
        provider: Arc<NotesProvider>,
    }

    fn fixture_with(store: ScriptedStore) -> Fixture {
        let store = Arc::new(store);
        let alerts = Arc::new(RecordingAlerts::default());
        let provider = NotesProvider::new(
            Arc::clone(&store) as Arc<dyn NoteStore>,
            ViewModel::new(),
            Arc::clone(&alerts) as Arc<dyn AlertSink>,
        )
        .unwrap();
        Fixture {
            store,
            alerts,
            provider,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(ScriptedStore::default())
    }

    fn stored_record(id: &str, minutes: i64) -> NoteRecord {
        let at = Utc.with_ymd_and_hms(2022, 2, 2, 12, 0, 0).unwrap() + Duration::minutes(minutes);
        NoteRecord {
            id: NoteId::from(id),
            title: format!("note {id}"),
            text: String::new(),
            created: at,
            modified: at,
            format: "text".to_string(),
        }
    }

    fn titles(records: &[NoteRecord]) -> Vec<&str> {
        records.iter().map(|r| r.title.as_str()).collect()
    }

    #[test]
    fn test_new_outside_runtime_fails() {
        let result = NotesProvider::new(
            Arc::new(ScriptedStore::default()),
            ViewModel::new(),
            Arc::new(RecordingAlerts::default()),
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_rapid_edits_coalesce_into_two_writes() {
        let f = fixture();
        f.store.close_gate();

        let note = f.provider.create_note(Some(NoteDraft::titled("X")));
        f.provider.save_note(&note);
        note.set_title("Y");
        note.set_title("Z");

        assert!(note.is_saving());
        assert!(note.is_dirty());

        f.store.open_gate();
        f.provider.idle().await;

        assert_eq!(titles(&f.store.writes()), vec!["X", "Z"]);
        assert_eq!(f.store.stored(note.id()).unwrap().title, "Z");
        assert!(!note.is_saving());
        assert!(!note.is_dirty());
    }

    #[tokio::test]
    async fn test_single_edit_writes_once() {
        let f = fixture();
        let note = f.provider.create_note(None);

        note.set_text("hello");
        f.provider.idle().await;

        assert_eq!(f.store.writes().len(), 1);
        assert_eq!(f.store.stored(note.id()).unwrap().text, "hello");
    }

    #[tokio::test]
    async fn test_equal_value_does_not_write() {
        let f = fixture();
        let note = f.provider.create_note(Some(NoteDraft::titled("same")));
        let modified = note.modified();

        note.set_title("same");
        f.provider.idle().await;

        assert!(f.store.writes().is_empty());
        assert_eq!(note.modified(), modified);
    }

    #[tokio::test]
    async fn test_updated_fires_subscribers_before_saving() {
        let f = fixture();
        let note = f.provider.create_note(None);
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        note.subscribe(NoteEvent::Changed, move |id| {
            seen_clone.lock().unwrap().push(id.clone());
        });

        f.store.close_gate();
        note.set_title("one");
        note.set_title("two");

        assert_eq!(seen.lock().unwrap().len(), 2);
        f.store.open_gate();
        f.provider.idle().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_edits_never_overlap_writes() {
        let f = fixture();
        let note = f.provider.create_note(None);

        let mut tasks = Vec::new();
        for worker in 0..4 {
            let note = Arc::clone(&note);
            tasks.push(tokio::spawn(async move {
                for i in 0..50 {
                    note.set_text(format!("worker {worker} edit {i}"));
                    tokio::task::yield_now().await;
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        note.set_title("final title");
        f.provider.idle().await;

        assert_eq!(f.store.max_in_flight(), 1);
        assert_eq!(f.store.stored(note.id()).unwrap(), note.record());
        assert!(!note.is_saving());
    }

    #[tokio::test]
    async fn test_different_notes_save_independently() {
        let f = fixture();
        f.store.close_gate();
        let a = f.provider.create_note(Some(NoteDraft::titled("a")));
        let b = f.provider.create_note(Some(NoteDraft::titled("b")));

        a.set_text("a1");
        b.set_text("b1");
        assert!(a.is_saving());
        assert!(b.is_saving());

        f.store.open_gate();
        f.provider.idle().await;
        assert_eq!(f.store.writes().len(), 2);
    }

    #[tokio::test]
    async fn test_save_failure_alerts_once_without_retry() {
        let f = fixture();
        f.store.fail_writes(1);
        let note = f.provider.create_note(None);

        note.set_title("unsaved");
        f.provider.idle().await;

        assert_eq!(f.alerts.messages(), vec![SAVE_FAILED.to_string()]);
        assert_eq!(f.store.writes().len(), 1);
        assert_eq!(note.title(), "unsaved");
        assert!(!note.is_saving());
        assert!(!note.is_dirty());
        assert!(f.store.stored(note.id()).is_none());
    }

    #[tokio::test]
    async fn test_save_failure_while_dirty_saves_latest_state() {
        let f = fixture();
        f.store.close_gate();
        f.store.fail_writes(1);
        let note = f.provider.create_note(None);

        note.set_title("lost write");
        note.set_title("latest");

        f.store.open_gate();
        f.provider.idle().await;

        assert_eq!(f.alerts.messages(), vec![SAVE_FAILED.to_string()]);
        assert_eq!(titles(&f.store.writes()), vec!["lost write", "latest"]);
        assert_eq!(f.store.stored(note.id()).unwrap().title, "latest");
        assert!(!note.is_dirty());
        assert!(!note.is_saving());
    }

    #[tokio::test]
    async fn test_init_orders_newest_first() {
        let f = fixture_with(ScriptedStore::with_records([
            stored_record("t1", 1),
            stored_record("t2", 2),
        ]));

        let loaded = f.provider.init().await.unwrap();

        assert_eq!(loaded, 2);
        let ids: Vec<String> = f
            .provider
            .view_model()
            .summaries()
            .into_iter()
            .map(|s| s.id.to_string())
            .collect();
        assert_eq!(ids, vec!["t2", "t1"]);
    }

    #[tokio::test]
    async fn test_hydrated_notes_save_through_provider() {
        let f = fixture_with(ScriptedStore::with_records([stored_record("h", 0)]));
        f.provider.init().await.unwrap();

        let note = f.provider.view_model().find(&NoteId::from("h")).unwrap();
        note.set_text("edited after load");
        f.provider.idle().await;

        assert_eq!(f.store.stored(note.id()).unwrap().text, "edited after load");
        assert_eq!(f.store.stored(note.id()).unwrap().created, note.created());
    }

    #[tokio::test]
    async fn test_init_failure_is_returned() {
        let store = ScriptedStore::with_records([stored_record("t1", 1)]);
        store.fail_scan(true);
        let f = fixture_with(store);

        assert!(f.provider.init().await.is_err());
        assert_eq!(f.provider.view_model().len(), 1);
    }

    #[tokio::test]
    async fn test_add_note_lists_first_and_makes_current() {
        let f = fixture_with(ScriptedStore::with_records([stored_record("old", 0)]));
        f.provider.init().await.unwrap();

        let note = f.provider.create_note(Some(NoteDraft::titled("fresh")));
        f.provider.add_note(&note).await.unwrap();

        let vm = f.provider.view_model();
        assert_eq!(vm.summaries()[0].id, *note.id());
        assert_eq!(vm.current_note().unwrap().id(), note.id());
        assert!(f.store.stored(note.id()).is_some());
    }

    #[tokio::test]
    async fn test_add_note_failure_alerts() {
        let f = fixture();
        f.store.fail_writes(1);
        let note = f.provider.create_note(None);

        let result = f.provider.add_note(&note).await;

        assert!(result.is_err());
        assert_eq!(f.alerts.messages(), vec![ADD_FAILED.to_string()]);
        assert!(f.provider.view_model().is_empty());
        assert!(f.provider.view_model().current_note().is_none());
    }

    #[tokio::test]
    async fn test_add_note_duplicate_id_fails() {
        let f = fixture_with(ScriptedStore::with_records([stored_record("taken", 0)]));
        let note = f.provider.hydrate(stored_record("taken", 5));

        let err = f.provider.add_note(&note).await.unwrap_err();
        assert!(err.is_duplicate());
    }

    #[tokio::test]
    async fn test_save_note_while_saving_only_marks_dirty() {
        let f = fixture();
        f.store.close_gate();
        let note = f.provider.create_note(None);

        f.provider.save_note(&note);
        f.provider.save_note(&note);
        assert_eq!(f.provider.in_flight(), 1);
        assert!(note.is_dirty());

        f.store.open_gate();
        f.provider.idle().await;
        assert_eq!(f.store.writes().len(), 2);
        assert_eq!(f.provider.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_list_resorts_after_edit() {
        let f = fixture_with(ScriptedStore::with_records([
            stored_record("a", 1),
            stored_record("b", 2),
        ]));
        f.provider.init().await.unwrap();
        let a = f.provider.view_model().find(&NoteId::from("a")).unwrap();

        a.set_title("bumped");
        f.provider.idle().await;

        let summaries = f.provider.view_model().summaries();
        assert_eq!(summaries[0].title, "bumped");
        assert!(summaries.windows(2).all(|w| w[0].modified >= w[1].modified));
    }
}
