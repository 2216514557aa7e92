//! Application shell.
//!
//! [`App`] opens the store, builds the view model and provider, and loads the
//! stored notes. It also carries the "add note" action of the UI.

use std::sync::Arc;

use tracing::{error, info};

use crate::alert::AlertSink;
use crate::config::Config;
use crate::error::Result;
use crate::note::{Note, NoteDraft};
use crate::provider::NotesProvider;
use crate::storage::Storage;
use crate::store::{NoteStore, StoreHandle};
use crate::view_model::ViewModel;

/// Alert shown when the note database cannot be opened.
pub const OPEN_FAILED: &str = "Failed to open note storage.";

/// Alert shown when the stored notes cannot be loaded.
pub const INIT_FAILED: &str = "Error while initialization.";

/// A wired-up note application.
#[derive(Debug)]
pub struct App {
    store: Arc<dyn NoteStore>,
    provider: Arc<NotesProvider>,
    alerts: Arc<dyn AlertSink>,
}

impl App {
    /// Open the configured database and load every stored note.
    ///
    /// # Errors
    ///
    /// Returns an error, after alerting, when the database cannot be opened or
    /// its schema is newer than this build understands.
    pub async fn open(config: &Config, alerts: Arc<dyn AlertSink>) -> Result<Self> {
        let path = config.database_path();
        let store = match Storage::open(&path).and_then(StoreHandle::spawn) {
            Ok(store) => store,
            Err(err) => {
                error!("Opening {} failed: {}", path.display(), err);
                alerts.alert(OPEN_FAILED);
                return Err(err);
            }
        };

        Self::with_store(Arc::new(store), alerts).await
    }

    /// Wire the application over an already opened store and load its notes.
    ///
    /// A failed load is alerted but not fatal: notes read before the failure
    /// stay listed and the application remains usable.
    ///
    /// # Errors
    ///
    /// Returns an error when called outside a tokio runtime.
    pub async fn with_store(store: Arc<dyn NoteStore>, alerts: Arc<dyn AlertSink>) -> Result<Self> {
        let view_model = ViewModel::new();
        let provider = NotesProvider::new(Arc::clone(&store), view_model, Arc::clone(&alerts))?;

        if let Err(err) = provider.init().await {
            error!("Loading notes failed: {}", err);
            alerts.alert(INIT_FAILED);
        }

        info!("Application ready");
        Ok(Self {
            store,
            provider,
            alerts,
        })
    }

    /// The view model driving the UI.
    #[must_use]
    pub fn view_model(&self) -> &Arc<ViewModel> {
        self.provider.view_model()
    }

    /// The notes provider.
    #[must_use]
    pub fn provider(&self) -> &Arc<NotesProvider> {
        &self.provider
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn NoteStore> {
        &self.store
    }

    /// The alert sink.
    #[must_use]
    pub fn alerts(&self) -> &Arc<dyn AlertSink> {
        &self.alerts
    }

    /// Create a note, list it, open it for editing and start persisting it.
    pub fn create_note(&self, draft: Option<NoteDraft>) -> Arc<Note> {
        let note = self.provider.create_note(draft);
        let view_model = self.view_model();
        view_model.add_note(Arc::clone(&note));
        view_model.open_note(&note);
        self.provider.save_note(&note);
        note
    }

    /// Wait for every pending write to finish.
    pub async fn settle(&self) {
        self.provider.idle().await;
    }
}
