use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;

use crate::types::{OwnerId, RecordId};

/// How records of a kind relate to the signed-in identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerScope {
    /// Stored remotely under the active identity's id
    Owned,
    /// Held in process only, never tied to an identity
    LocalOnly,
}

/// User-facing outcome messages for one record kind
#[derive(Debug, Clone, Copy)]
pub struct Messages {
    pub load_failed: &'static str,
    pub missing_fields: &'static str,
    pub created: &'static str,
    pub create_failed: &'static str,
    pub updated: &'static str,
    pub update_failed: &'static str,
    pub deleted: &'static str,
    pub delete_failed: &'static str,
    /// Reported instead of the generic failure when the store rejects a duplicate
    pub duplicate: Option<&'static str>,
}

/// Describes one record kind to the generic resource manager: its shapes,
/// how the edit form maps onto them, and which input is required.
pub trait ResourceKind: Send + Sync + 'static {
    /// Stored record as returned by list queries
    type Record: Clone + Debug + Send + Sync + Serialize + DeserializeOwned + 'static;
    /// Editable form state shared by create and edit mode
    type Form: Clone + Debug + Default + PartialEq + Send + Sync + 'static;
    /// User-supplied fields submitted on create
    type Draft: Clone + Debug + Send + Sync + Serialize + 'static;
    /// Fields written on update
    type Patch: Clone + Debug + Send + Sync + Serialize + 'static;

    /// Short name used in logs and CLI output
    const NAME: &'static str;
    /// Backend table holding this kind
    const TABLE: &'static str;
    const SCOPE: OwnerScope;
    const MESSAGES: Messages;

    fn id(record: &Self::Record) -> &RecordId;

    fn owner(record: &Self::Record) -> Option<&str>;

    fn created_at(record: &Self::Record) -> DateTime<Utc>;

    /// Checks the identifying fields; the error is the message shown to the user
    fn validate(form: &Self::Form) -> Result<(), &'static str>;

    fn draft(form: &Self::Form) -> Self::Draft;

    fn patch(form: &Self::Form) -> Self::Patch;

    /// Form contents for editing an existing record
    fn populate(record: &Self::Record) -> Self::Form;

    /// Builds the stored record for stores that assign ids themselves
    fn materialize(
        id: RecordId,
        owner: Option<OwnerId>,
        draft: Self::Draft,
        now: DateTime<Utc>,
    ) -> Self::Record;

    fn apply_patch(record: &mut Self::Record, patch: Self::Patch, now: DateTime<Utc>);

    /// Value that must be unique among one owner's records, if any
    fn unique_key(_record: &Self::Record) -> Option<&str> {
        None
    }
}

/// True when the trimmed value has content
pub(crate) fn present(value: &str) -> bool {
    !value.trim().is_empty()
}
