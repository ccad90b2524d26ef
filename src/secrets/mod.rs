//! Secrets view with the reveal overlay.
//!
//! Values are masked unless their id is in the view's [`RevealSet`].
//! Revealing is purely local: no remote call, no change to the record. The
//! set lives and dies with the view.

mod reveal;

pub use reveal::{mask, RevealSet};

use serde::Serialize;
use std::sync::{Mutex, MutexGuard};

use crate::config::ResourceConfig;
use crate::resource::{ResourceManager, Secret, Secrets};
use crate::types::RecordId;

/// One secret as it should be displayed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecretRow {
    pub id: RecordId,
    pub key: String,
    /// Clear text when revealed, otherwise the mask
    pub value: String,
    pub description: Option<String>,
    pub revealed: bool,
}

pub struct SecretsView {
    manager: ResourceManager<Secrets>,
    reveal: Mutex<RevealSet>,
    mask_length: usize,
}

impl SecretsView {
    pub fn new(manager: ResourceManager<Secrets>, config: &ResourceConfig) -> Self {
        Self {
            manager,
            reveal: Mutex::new(RevealSet::new()),
            mask_length: config.mask_length,
        }
    }

    pub fn manager(&self) -> &ResourceManager<Secrets> {
        &self.manager
    }

    fn reveal(&self) -> MutexGuard<'_, RevealSet> {
        self.reveal
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Show or hide the value of `id`; returns whether it is now shown
    pub fn toggle(&self, id: &RecordId) -> bool {
        self.reveal().toggle(id)
    }

    pub fn is_revealed(&self, id: &RecordId) -> bool {
        self.reveal().is_revealed(id)
    }

    pub fn display_value(&self, secret: &Secret) -> String {
        if self.is_revealed(&secret.id) {
            secret.value.clone()
        } else {
            mask(self.mask_length)
        }
    }

    /// Loaded secrets, newest first, with the overlay applied
    pub fn rows(&self) -> Vec<SecretRow> {
        let reveal = self.reveal();
        self.manager
            .records()
            .into_iter()
            .map(|secret| {
                let revealed = reveal.is_revealed(&secret.id);
                SecretRow {
                    value: if revealed {
                        secret.value
                    } else {
                        mask(self.mask_length)
                    },
                    id: secret.id,
                    key: secret.key,
                    description: secret.description,
                    revealed,
                }
            })
            .collect()
    }
}

impl Drop for SecretsView {
    fn drop(&mut self) {
        self.reveal().clear();
        self.manager.unmount();
    }
}
