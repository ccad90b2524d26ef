use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::kind::{present, Messages, OwnerScope, ResourceKind};
use crate::types::{OwnerId, RecordId};

/// A stored key/value secret. `key` is unique per owner.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Secret {
    pub id: RecordId,
    #[serde(rename = "user_id")]
    pub owner_id: OwnerId,
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

// Values never reach logs through Debug
impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secret")
            .field("id", &self.id)
            .field("owner_id", &self.owner_id)
            .field("key", &self.key)
            .field("value", &"[REDACTED]")
            .field("description", &self.description)
            .field("created_at", &self.created_at)
            .finish()
    }
}

#[derive(Clone, Default, PartialEq)]
pub struct SecretForm {
    pub key: String,
    pub value: String,
    pub description: String,
}

impl std::fmt::Debug for SecretForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretForm")
            .field("key", &self.key)
            .field("value", &"[REDACTED]")
            .field("description", &self.description)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SecretFields {
    pub key: String,
    pub value: String,
    pub description: Option<String>,
}

pub struct Secrets;

impl ResourceKind for Secrets {
    type Record = Secret;
    type Form = SecretForm;
    type Draft = SecretFields;
    type Patch = SecretFields;

    const NAME: &'static str = "secrets";
    const TABLE: &'static str = "user_secrets";
    const SCOPE: OwnerScope = OwnerScope::Owned;
    const MESSAGES: Messages = Messages {
        load_failed: "Failed to load secrets",
        missing_fields: "Please enter both key and value",
        created: "Secret created!",
        create_failed: "Failed to create secret",
        updated: "Secret updated!",
        update_failed: "Failed to update secret",
        deleted: "Secret deleted",
        delete_failed: "Failed to delete secret",
        duplicate: Some("A secret with this key already exists"),
    };

    fn id(record: &Secret) -> &RecordId {
        &record.id
    }

    fn owner(record: &Secret) -> Option<&str> {
        Some(&record.owner_id)
    }

    fn created_at(record: &Secret) -> DateTime<Utc> {
        record.created_at
    }

    fn validate(form: &SecretForm) -> Result<(), &'static str> {
        if present(&form.key) && present(&form.value) {
            Ok(())
        } else {
            Err(Self::MESSAGES.missing_fields)
        }
    }

    fn draft(form: &SecretForm) -> SecretFields {
        fields(form)
    }

    fn patch(form: &SecretForm) -> SecretFields {
        fields(form)
    }

    fn populate(record: &Secret) -> SecretForm {
        SecretForm {
            key: record.key.clone(),
            value: record.value.clone(),
            description: record.description.clone().unwrap_or_default(),
        }
    }

    fn materialize(
        id: RecordId,
        owner: Option<OwnerId>,
        draft: SecretFields,
        now: DateTime<Utc>,
    ) -> Secret {
        Secret {
            id,
            owner_id: owner.unwrap_or_default(),
            key: draft.key,
            value: draft.value,
            description: draft.description,
            created_at: now,
        }
    }

    fn apply_patch(record: &mut Secret, patch: SecretFields, _now: DateTime<Utc>) {
        record.key = patch.key;
        record.value = patch.value;
        record.description = patch.description;
    }

    fn unique_key(record: &Secret) -> Option<&str> {
        Some(&record.key)
    }
}

fn fields(form: &SecretForm) -> SecretFields {
    let description = form.description.trim();
    SecretFields {
        key: form.key.clone(),
        value: form.value.clone(),
        description: if description.is_empty() {
            None
        } else {
            Some(form.description.clone())
        },
    }
}
