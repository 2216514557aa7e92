//! `jotter` - a small note-taking app.
//!
//! Notes live in a local SQLite database behind a store worker. The
//! [`NotesProvider`] mediates every change between in-memory [`Note`]s and the
//! store, coalescing saves so each note has at most one write in flight. The
//! [`ViewModel`] keeps the list sorted by modification time, and the
//! [`server`] module serves the browser UI.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod alert;
pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod note;
pub mod provider;
pub mod server;
pub mod storage;
pub mod store;
pub mod view_model;

#[cfg(test)]
mod testing;

pub use alert::{AlertSink, ConsoleAlerts};
pub use app::App;
pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use note::{Note, NoteDraft, NoteId, NoteRecord};
pub use provider::NotesProvider;
pub use storage::{Storage, StorageStats};
pub use store::{NoteStore, StoreHandle};
pub use view_model::{NoteSummary, View, ViewModel};
