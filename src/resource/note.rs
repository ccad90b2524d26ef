use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::kind::{present, Messages, OwnerScope, ResourceKind};
use crate::types::{OwnerId, RecordId};

/// A note kept in process only; it has no owner and is never sent to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: RecordId,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoteForm {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NoteFields {
    pub title: String,
    pub content: String,
}

pub struct Notes;

impl ResourceKind for Notes {
    type Record = Note;
    type Form = NoteForm;
    type Draft = NoteFields;
    type Patch = NoteFields;

    const NAME: &'static str = "notes";
    const TABLE: &'static str = "notes";
    const SCOPE: OwnerScope = OwnerScope::LocalOnly;
    const MESSAGES: Messages = Messages {
        load_failed: "Failed to load notes",
        missing_fields: "Please enter a title",
        created: "Note created successfully!",
        create_failed: "Failed to create note",
        updated: "Note updated!",
        update_failed: "Failed to update note",
        deleted: "Note deleted",
        delete_failed: "Failed to delete note",
        duplicate: None,
    };

    fn id(record: &Note) -> &RecordId {
        &record.id
    }

    fn owner(_record: &Note) -> Option<&str> {
        None
    }

    fn created_at(record: &Note) -> DateTime<Utc> {
        record.created_at
    }

    fn validate(form: &NoteForm) -> Result<(), &'static str> {
        if present(&form.title) {
            Ok(())
        } else {
            Err(Self::MESSAGES.missing_fields)
        }
    }

    fn draft(form: &NoteForm) -> NoteFields {
        NoteFields {
            title: form.title.clone(),
            content: form.content.clone(),
        }
    }

    fn patch(form: &NoteForm) -> NoteFields {
        Self::draft(form)
    }

    fn populate(record: &Note) -> NoteForm {
        NoteForm {
            title: record.title.clone(),
            content: record.content.clone(),
        }
    }

    fn materialize(
        id: RecordId,
        _owner: Option<OwnerId>,
        draft: NoteFields,
        now: DateTime<Utc>,
    ) -> Note {
        Note {
            id,
            title: draft.title,
            content: draft.content,
            created_at: now,
        }
    }

    fn apply_patch(record: &mut Note, patch: NoteFields, _now: DateTime<Utc>) {
        record.title = patch.title;
        record.content = patch.content;
    }
}
