//! List/detail view model.
//!
//! Holds the ordered list of notes shown to the user (newest modification
//! first), the note currently open for editing, and the two-state view mode.
//! Observers follow the list through [`ViewModel::subscribe_list`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::trace;

use crate::note::{Note, NoteEvent, NoteId};

/// Which screen is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    /// The note list.
    #[default]
    List,
    /// A single note open for editing.
    Note,
}

/// Lightweight projection of a note for the list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoteSummary {
    /// Note id.
    pub id: NoteId,
    /// Mirrored title.
    pub title: String,
    /// Mirrored modification time.
    pub modified: DateTime<Utc>,
}

/// A list entry mirroring the displayed fields of its note.
#[derive(Debug)]
struct NoteListItem {
    note: Arc<Note>,
    title: String,
    modified: DateTime<Utc>,
}

impl NoteListItem {
    fn new(note: Arc<Note>) -> Self {
        let title = note.title();
        let modified = note.modified();
        Self {
            note,
            title,
            modified,
        }
    }

    fn refresh(&mut self) {
        self.title = self.note.title();
        self.modified = self.note.modified();
    }

    fn summary(&self) -> NoteSummary {
        NoteSummary {
            id: self.note.id().clone(),
            title: self.title.clone(),
            modified: self.modified,
        }
    }
}

/// View state shared between the provider and the UI.
#[derive(Debug)]
pub struct ViewModel {
    notes: Mutex<Vec<NoteListItem>>,
    current_note: Mutex<Option<Arc<Note>>>,
    current_view: Mutex<View>,
    list_tx: watch::Sender<Vec<NoteSummary>>,
}

impl ViewModel {
    /// Create an empty view model showing the list.
    #[must_use]
    pub fn new() -> Arc<Self> {
        let (list_tx, _) = watch::channel(Vec::new());
        Arc::new(Self {
            notes: Mutex::new(Vec::new()),
            current_note: Mutex::new(None),
            current_view: Mutex::new(View::List),
            list_tx,
        })
    }

    /// Append a note and re-sort the list.
    pub fn add_note(self: &Arc<Self>, note: Arc<Note>) {
        self.watch(&note);
        {
            let mut notes = self.notes();
            notes.push(NoteListItem::new(note));
            sort_items(&mut notes);
        }
        self.publish();
    }

    /// Insert a note at the top of the list without re-sorting.
    pub fn insert_front(self: &Arc<Self>, note: Arc<Note>) {
        self.watch(&note);
        self.notes().insert(0, NoteListItem::new(note));
        self.publish();
    }

    /// Re-read one note's displayed fields and re-sort the list.
    pub fn refresh(&self, id: &NoteId) {
        {
            let mut notes = self.notes();
            if let Some(item) = notes.iter_mut().find(|item| item.note.id() == id) {
                item.refresh();
            }
            sort_items(&mut notes);
        }
        trace!(note = %id, "list refreshed");
        self.publish();
    }

    /// Current list contents, in display order.
    #[must_use]
    pub fn summaries(&self) -> Vec<NoteSummary> {
        self.notes().iter().map(NoteListItem::summary).collect()
    }

    /// Find a listed note by id.
    #[must_use]
    pub fn find(&self, id: &NoteId) -> Option<Arc<Note>> {
        self.notes()
            .iter()
            .find(|item| item.note.id() == id)
            .map(|item| Arc::clone(&item.note))
    }

    /// Number of listed notes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.notes().len()
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.notes().is_empty()
    }

    /// Follow list changes.
    #[must_use]
    pub fn subscribe_list(&self) -> watch::Receiver<Vec<NoteSummary>> {
        self.list_tx.subscribe()
    }

    /// The note open for editing, if any.
    #[must_use]
    pub fn current_note(&self) -> Option<Arc<Note>> {
        self.current_note
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the current note without changing the view.
    pub fn set_current_note(&self, note: Option<Arc<Note>>) {
        *self
            .current_note
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = note;
    }

    /// The active view.
    #[must_use]
    pub fn current_view(&self) -> View {
        *self
            .current_view
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn set_current_view(&self, view: View) {
        *self
            .current_view
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = view;
    }

    /// Open `note` for editing.
    pub fn open_note(&self, note: &Arc<Note>) {
        self.set_current_note(Some(Arc::clone(note)));
        self.set_current_view(View::Note);
    }

    /// Return to the list.
    pub fn close_note(&self) {
        self.set_current_view(View::List);
        self.set_current_note(None);
    }

    /// Feed an edited title into the note.
    pub fn update_title(&self, note: &Arc<Note>, value: impl Into<String>) {
        note.set_title(value);
    }

    /// Feed an edited body into the note.
    pub fn update_text(&self, note: &Arc<Note>, value: impl Into<String>) {
        note.set_text(value);
    }

    fn watch(self: &Arc<Self>, note: &Arc<Note>) {
        let view_model = Arc::downgrade(self);
        note.subscribe(NoteEvent::Changed, move |id| {
            if let Some(view_model) = view_model.upgrade() {
                view_model.refresh(id);
            }
        });
    }

    fn publish(&self) {
        self.list_tx.send_replace(self.summaries());
    }

    fn notes(&self) -> MutexGuard<'_, Vec<NoteListItem>> {
        self.notes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Newest modification first. The sort is stable, so ties keep their order.
fn sort_items(items: &mut [NoteListItem]) {
    items.sort_by(|a, b| b.modified.cmp(&a.modified));
}
