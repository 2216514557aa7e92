//! The note entity.
//!
//! A [`Note`] wraps a [`NoteRecord`] (the persisted memento) together with the
//! transient save state the provider uses to coalesce writes. Field mutations
//! go through explicit setters that bump the modification time and notify the
//! owning [`NoteSink`].

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use tracing::trace;
use uuid::Uuid;

/// Text of a freshly created note.
pub const DEFAULT_TEXT: &str = "New note.";

/// Format tag of a freshly created note.
pub const DEFAULT_FORMAT: &str = "text";

/// Sub-second digits kept on note timestamps; matches what storage persists.
const TIMESTAMP_DIGITS: u16 = 6;

fn current_time() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(TIMESTAMP_DIGITS)
}

/// Opaque note identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the identifier is the empty string.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for NoteId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for NoteId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl AsRef<str> for NoteId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The persisted fields of a note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteRecord {
    /// Unique identifier, never reassigned.
    pub id: NoteId,
    /// Note title.
    pub title: String,
    /// Note body.
    pub text: String,
    /// Creation time.
    pub created: DateTime<Utc>,
    /// Time of the last title or text change.
    pub modified: DateTime<Utc>,
    /// Body format tag.
    pub format: String,
}

/// Partial init data for a note. Supplied fields override the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteDraft {
    /// Identifier to keep; a fresh one is generated when absent or empty.
    pub id: Option<NoteId>,
    /// Initial title.
    pub title: Option<String>,
    /// Initial body.
    pub text: Option<String>,
    /// Creation time.
    pub created: Option<DateTime<Utc>>,
    /// Modification time.
    pub modified: Option<DateTime<Utc>>,
    /// Body format tag.
    pub format: Option<String>,
}

impl NoteDraft {
    /// A draft carrying only a title.
    #[must_use]
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }
}

impl From<NoteRecord> for NoteDraft {
    fn from(record: NoteRecord) -> Self {
        Self {
            id: Some(record.id),
            title: Some(record.title),
            text: Some(record.text),
            created: Some(record.created),
            modified: Some(record.modified),
            format: Some(record.format),
        }
    }
}

/// Events a note emits to its subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoteEvent {
    /// The title or text changed.
    Changed,
}

/// Receiver of note mutations; implemented by the notes provider.
pub trait NoteSink: Send + Sync {
    /// Called synchronously after a note's title or text changed.
    fn updated(self: Arc<Self>, note: &Arc<Note>);
}

type Subscriber = Arc<dyn Fn(&NoteId) + Send + Sync>;

#[derive(Debug)]
struct NoteState {
    record: NoteRecord,
    dirty: bool,
    saving: bool,
}

impl NoteState {
    fn touch(&mut self) {
        self.record.modified = current_time().max(self.record.modified);
    }
}

/// An in-memory note bound to a provider.
pub struct Note {
    id: NoteId,
    created: DateTime<Utc>,
    state: Mutex<NoteState>,
    subscribers: Mutex<Vec<(NoteEvent, Subscriber)>>,
    sink: Weak<dyn NoteSink>,
}

impl Note {
    /// Create a note, filling absent fields with defaults.
    #[must_use]
    pub fn new(sink: Weak<dyn NoteSink>, init: Option<NoteDraft>) -> Arc<Self> {
        let now = current_time();
        let draft = init.unwrap_or_default();
        let record = NoteRecord {
            id: draft
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(NoteId::generate),
            title: draft.title.unwrap_or_else(|| default_title(now)),
            text: draft.text.unwrap_or_else(|| DEFAULT_TEXT.to_string()),
            created: draft.created.unwrap_or(now).trunc_subsecs(TIMESTAMP_DIGITS),
            modified: draft.modified.unwrap_or(now).trunc_subsecs(TIMESTAMP_DIGITS),
            format: draft.format.unwrap_or_else(|| DEFAULT_FORMAT.to_string()),
        };

        Arc::new(Self {
            id: record.id.clone(),
            created: record.created,
            state: Mutex::new(NoteState {
                record,
                dirty: false,
                saving: false,
            }),
            subscribers: Mutex::new(Vec::new()),
            sink,
        })
    }

    /// Rebuild a note from a stored record, keeping its id.
    #[must_use]
    pub fn hydrate(sink: Weak<dyn NoteSink>, record: NoteRecord) -> Arc<Self> {
        Self::new(sink, Some(record.into()))
    }

    /// The note id.
    #[must_use]
    pub fn id(&self) -> &NoteId {
        &self.id
    }

    /// Creation time.
    #[must_use]
    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    /// Time of the last change.
    #[must_use]
    pub fn modified(&self) -> DateTime<Utc> {
        self.state().record.modified
    }

    /// Current title.
    #[must_use]
    pub fn title(&self) -> String {
        self.state().record.title.clone()
    }

    /// Current body.
    #[must_use]
    pub fn text(&self) -> String {
        self.state().record.text.clone()
    }

    /// Body format tag.
    #[must_use]
    pub fn format(&self) -> String {
        self.state().record.format.clone()
    }

    /// Snapshot of the persisted fields.
    #[must_use]
    pub fn record(&self) -> NoteRecord {
        self.state().record.clone()
    }

    /// Whether a change is waiting for a write.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.state().dirty
    }

    /// Whether a write is in flight.
    #[must_use]
    pub fn is_saving(&self) -> bool {
        self.state().saving
    }

    /// Set the title. Equal values are ignored.
    pub fn set_title(self: &Arc<Self>, value: impl Into<String>) {
        let value = value.into();
        {
            let mut state = self.state();
            if state.record.title == value {
                return;
            }
            state.record.title = value;
            state.touch();
        }
        self.notify();
    }

    /// Set the body. Equal values are ignored.
    pub fn set_text(self: &Arc<Self>, value: impl Into<String>) {
        let value = value.into();
        {
            let mut state = self.state();
            if state.record.text == value {
                return;
            }
            state.record.text = value;
            state.touch();
        }
        self.notify();
    }

    /// Register a callback for `event`. Callbacks run in registration order.
    pub fn subscribe<F>(&self, event: NoteEvent, callback: F)
    where
        F: Fn(&NoteId) + Send + Sync + 'static,
    {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((event, Arc::new(callback)));
    }

    /// Invoke every subscriber registered for `event`.
    ///
    /// The subscriber list is not locked while callbacks run, so a callback
    /// may edit this note again.
    pub fn emit(&self, event: NoteEvent) {
        let callbacks: Vec<Subscriber> = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(e, _)| *e == event)
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in callbacks {
            callback(&self.id);
        }
    }

    /// Enter the saving state if no write is in flight and return the
    /// snapshot to write. Otherwise mark the note dirty and return `None`.
    pub(crate) fn schedule_save(&self) -> Option<NoteRecord> {
        let mut state = self.state();
        if state.saving {
            state.dirty = true;
            None
        } else {
            state.saving = true;
            state.dirty = false;
            Some(state.record.clone())
        }
    }

    /// Leave the saving state. If the note changed during the write, start
    /// the next save immediately and return its snapshot.
    pub(crate) fn finish_save(&self) -> Option<NoteRecord> {
        let mut state = self.state();
        state.saving = false;
        if state.dirty {
            state.saving = true;
            state.dirty = false;
            Some(state.record.clone())
        } else {
            None
        }
    }

    fn notify(self: &Arc<Self>) {
        if let Some(sink) = self.sink.upgrade() {
            sink.updated(self);
        } else {
            trace!(note = %self.id, "note has no live provider");
            self.emit(NoteEvent::Changed);
        }
    }

    fn state(&self) -> MutexGuard<'_, NoteState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("Note")
            .field("id", &self.id)
            .field("title", &state.record.title)
            .field("modified", &state.record.modified)
            .field("dirty", &state.dirty)
            .field("saving", &state.saving)
            .finish_non_exhaustive()
    }
}

fn default_title(now: DateTime<Utc>) -> String {
    format!("Note {}", now.format("%a %b %d %Y %H:%M:%S"))
}

/// A sink that is never alive, for notes not bound to any provider.
#[cfg(test)]
pub(crate) fn detached() -> Weak<dyn NoteSink> {
    struct Detached;
    impl NoteSink for Detached {
        fn updated(self: Arc<Self>, _note: &Arc<Note>) {}
    }
    Weak::<Detached>::new()
}
