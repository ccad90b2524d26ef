use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::kind::{present, Messages, OwnerScope, ResourceKind};
use crate::types::{OwnerId, RecordId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: RecordId,
    #[serde(rename = "user_id")]
    pub owner_id: OwnerId,
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct JournalForm {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewJournalEntry {
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JournalChanges {
    pub title: String,
    pub content: String,
}

pub struct Journal;

impl ResourceKind for Journal {
    type Record = JournalEntry;
    type Form = JournalForm;
    type Draft = NewJournalEntry;
    type Patch = JournalChanges;

    const NAME: &'static str = "journal";
    const TABLE: &'static str = "journal_entries";
    const SCOPE: OwnerScope = OwnerScope::Owned;
    const MESSAGES: Messages = Messages {
        load_failed: "Failed to load entries",
        missing_fields: "Please enter a title",
        created: "Entry created!",
        create_failed: "Failed to create entry",
        updated: "Entry updated!",
        update_failed: "Failed to update entry",
        deleted: "Entry deleted",
        delete_failed: "Failed to delete entry",
        duplicate: None,
    };

    fn id(record: &JournalEntry) -> &RecordId {
        &record.id
    }

    fn owner(record: &JournalEntry) -> Option<&str> {
        Some(&record.owner_id)
    }

    fn created_at(record: &JournalEntry) -> DateTime<Utc> {
        record.created_at
    }

    fn validate(form: &JournalForm) -> Result<(), &'static str> {
        if present(&form.title) {
            Ok(())
        } else {
            Err(Self::MESSAGES.missing_fields)
        }
    }

    fn draft(form: &JournalForm) -> NewJournalEntry {
        NewJournalEntry {
            title: form.title.clone(),
            content: form.content.clone(),
            tags: Vec::new(),
        }
    }

    fn patch(form: &JournalForm) -> JournalChanges {
        JournalChanges {
            title: form.title.clone(),
            content: form.content.clone(),
        }
    }

    fn populate(record: &JournalEntry) -> JournalForm {
        JournalForm {
            title: record.title.clone(),
            content: record.content.clone(),
        }
    }

    fn materialize(
        id: RecordId,
        owner: Option<OwnerId>,
        draft: NewJournalEntry,
        now: DateTime<Utc>,
    ) -> JournalEntry {
        JournalEntry {
            id,
            owner_id: owner.unwrap_or_default(),
            title: draft.title,
            content: draft.content,
            tags: draft.tags,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply_patch(record: &mut JournalEntry, patch: JournalChanges, now: DateTime<Utc>) {
        record.title = patch.title;
        record.content = patch.content;
        record.updated_at = now;
    }
}

pub(crate) fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
