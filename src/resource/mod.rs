//! Generic resource management.
//!
//! One [`ResourceManager`] drives list/create/update/delete for a record kind.
//! The four kinds differ only in their [`ResourceKind`] description.

pub mod journal;
pub mod kind;
mod manager;
pub mod note;
pub mod project;
pub mod secret;

pub use journal::{Journal, JournalEntry, JournalForm};
pub use kind::{Messages, OwnerScope, ResourceKind};
pub use manager::{ResourceManager, Snapshot, ViewSnapshot};
pub use note::{Note, NoteForm, Notes};
pub use project::{CodeProject, ProjectFile, ProjectForm, Projects};
pub use secret::{Secret, SecretForm, Secrets};
