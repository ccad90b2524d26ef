use std::sync::{Arc, Mutex, MutexGuard};

use super::kind::{OwnerScope, ResourceKind};
use crate::backend::{MemoryTable, RecordStore};
use crate::config::{ListOrdering, ResourceConfig};
use crate::error::{ClientError, RemoteError};
use crate::notify::SharedNotifier;
use crate::session::SessionContext;
use crate::types::{Operation, OwnerId, RecordId};

/// Point-in-time copy of a view's state
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<R, F> {
    pub records: Vec<R>,
    pub form: F,
    pub editing: Option<RecordId>,
    pub saving: bool,
}

pub type ViewSnapshot<K> = Snapshot<<K as ResourceKind>::Record, <K as ResourceKind>::Form>;

struct ViewState<K: ResourceKind> {
    records: Vec<K::Record>,
    form: K::Form,
    editing: Option<RecordId>,
    saving: bool,
    /// Token of the most recently issued list
    issued: u64,
    /// Bumped on unmount; completions from an older epoch are dropped
    epoch: u64,
}

impl<K: ResourceKind> Default for ViewState<K> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            form: K::Form::default(),
            editing: None,
            saving: false,
            issued: 0,
            epoch: 0,
        }
    }
}

struct Inner<K: ResourceKind> {
    store: Arc<dyn RecordStore<K>>,
    session: Option<SessionContext>,
    notifier: SharedNotifier,
    ordering: ListOrdering,
    state: Mutex<ViewState<K>>,
}

/// View state and operations for one record kind.
///
/// Cloning is cheap and every clone shares the same state, so several
/// operations may be in flight at once. The lock is never held across a
/// remote call.
pub struct ResourceManager<K: ResourceKind> {
    inner: Arc<Inner<K>>,
}

impl<K: ResourceKind> Clone for ResourceManager<K> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: ResourceKind> ResourceManager<K> {
    pub fn new(
        store: Arc<dyn RecordStore<K>>,
        session: Option<SessionContext>,
        notifier: SharedNotifier,
        ordering: ListOrdering,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                session,
                notifier,
                ordering,
                state: Mutex::new(ViewState::default()),
            }),
        }
    }

    /// Manager for a kind stored under the signed-in identity
    pub fn owned(
        store: Arc<dyn RecordStore<K>>,
        session: SessionContext,
        notifier: SharedNotifier,
        config: &ResourceConfig,
    ) -> Self {
        Self::new(store, Some(session), notifier, config.list_ordering)
    }

    /// Manager for a local-only kind backed by a fresh in-process table
    pub fn local(notifier: SharedNotifier) -> Self {
        Self::new(
            Arc::new(MemoryTable::<K>::new()),
            None,
            notifier,
            ListOrdering::LatestIssued,
        )
    }

    fn state(&self) -> MutexGuard<'_, ViewState<K>> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn records(&self) -> Vec<K::Record> {
        self.state().records.clone()
    }

    pub fn find(&self, id: &RecordId) -> Option<K::Record> {
        self.state()
            .records
            .iter()
            .find(|record| K::id(record) == id)
            .cloned()
    }

    pub fn form(&self) -> K::Form {
        self.state().form.clone()
    }

    pub fn editing(&self) -> Option<RecordId> {
        self.state().editing.clone()
    }

    pub fn is_saving(&self) -> bool {
        self.state().saving
    }

    pub fn snapshot(&self) -> ViewSnapshot<K> {
        let state = self.state();
        Snapshot {
            records: state.records.clone(),
            form: state.form.clone(),
            editing: state.editing.clone(),
            saving: state.saving,
        }
    }

    /// Change form fields in place
    pub fn edit_form(&self, f: impl FnOnce(&mut K::Form)) {
        f(&mut self.state().form);
    }

    pub fn set_form(&self, form: K::Form) {
        self.state().form = form;
    }

    /// Enter edit mode for a loaded record, filling the form from it.
    /// Returns false if no such record is loaded.
    pub fn begin_edit(&self, id: &RecordId) -> bool {
        let mut state = self.state();
        let Some(form) = state
            .records
            .iter()
            .find(|record| K::id(record) == id)
            .map(K::populate)
        else {
            return false;
        };
        state.form = form;
        state.editing = Some(id.clone());
        true
    }

    /// Leave edit mode and clear the form; nothing is sent anywhere
    pub fn cancel_edit(&self) {
        let mut state = self.state();
        state.editing = None;
        state.form = K::Form::default();
    }

    /// Tear the view down. Pending completions are ignored from here on.
    pub fn unmount(&self) {
        let mut state = self.state();
        let epoch = state.epoch + 1;
        *state = ViewState {
            issued: state.issued,
            epoch,
            ..ViewState::default()
        };
        tracing::debug!(kind = K::NAME, "view unmounted");
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.state().epoch
    }

    /// Apply `f` to the form only if the view has not been unmounted since `epoch`
    pub(crate) fn edit_form_since(&self, epoch: u64, f: impl FnOnce(&mut K::Form)) -> bool {
        let mut state = self.state();
        if state.epoch != epoch {
            return false;
        }
        f(&mut state.form);
        true
    }

    pub(crate) fn notifier(&self) -> &SharedNotifier {
        &self.inner.notifier
    }

    /// Replace the collection with a fresh query
    pub async fn load(&self) -> Result<(), ClientError> {
        let owner = match self.owner() {
            Ok(owner) => owner,
            Err(err) => return self.fail(err),
        };

        let (token, epoch) = {
            let mut state = self.state();
            state.issued += 1;
            (state.issued, state.epoch)
        };

        let result = self.inner.store.list(owner).await;

        let mut state = self.state();
        if state.epoch != epoch {
            tracing::debug!(kind = K::NAME, token, "list finished after unmount, ignored");
            return Ok(());
        }
        let superseded =
            self.inner.ordering == ListOrdering::LatestIssued && token != state.issued;

        match result {
            Ok(_) | Err(_) if superseded => {
                tracing::debug!(kind = K::NAME, token, latest = state.issued, "stale list ignored");
                Ok(())
            }
            Ok(records) => {
                tracing::debug!(kind = K::NAME, token, count = records.len(), "collection replaced");
                state.records = records;
                Ok(())
            }
            Err(err) => {
                drop(state);
                tracing::warn!(kind = K::NAME, op = %Operation::List, error = %err, "remote call failed");
                self.fail(ClientError::remote(K::MESSAGES.load_failed, err))
            }
        }
    }

    /// Save the form: update the record being edited, otherwise create one
    pub async fn submit(&self) -> Result<(), ClientError> {
        if self.editing().is_some() {
            self.update().await
        } else {
            self.create().await
        }
    }

    async fn create(&self) -> Result<(), ClientError> {
        let (form, epoch) = {
            let state = self.state();
            (state.form.clone(), state.epoch)
        };
        if let Err(message) = K::validate(&form) {
            return self.fail(ClientError::validation(message));
        }
        let owner = match self.owner() {
            Ok(owner) => owner,
            Err(err) => return self.fail(err),
        };

        self.set_saving(epoch, true);
        let result = self.inner.store.insert(owner, K::draft(&form)).await;

        {
            let mut state = self.state();
            if state.epoch != epoch {
                return Ok(());
            }
            state.saving = false;
            if result.is_ok() {
                state.form = K::Form::default();
            }
        }

        match result {
            Ok(record) => {
                tracing::info!(kind = K::NAME, id = %K::id(&record), "record created");
                self.inner.notifier.notify_success(K::MESSAGES.created);
                self.refresh().await;
                Ok(())
            }
            Err(err) => {
                tracing::warn!(kind = K::NAME, op = %Operation::Create, error = %err, "remote call failed");
                self.fail(Self::classify(err, K::MESSAGES.create_failed))
            }
        }
    }

    /// Write the form back to the record being edited
    pub async fn update(&self) -> Result<(), ClientError> {
        let (id, form, epoch) = {
            let state = self.state();
            match &state.editing {
                Some(id) => (id.clone(), state.form.clone(), state.epoch),
                None => return Err(ClientError::NotEditing),
            }
        };
        if let Err(message) = K::validate(&form) {
            return self.fail(ClientError::validation(message));
        }
        let owner = match self.owner() {
            Ok(owner) => owner,
            Err(err) => return self.fail(err),
        };

        self.set_saving(epoch, true);
        let result = self
            .inner
            .store
            .update(owner, id.clone(), K::patch(&form))
            .await;

        {
            let mut state = self.state();
            if state.epoch != epoch {
                return Ok(());
            }
            state.saving = false;
            if result.is_ok() && state.editing.as_ref() == Some(&id) {
                state.editing = None;
                state.form = K::Form::default();
            }
        }

        match result {
            Ok(()) => {
                tracing::info!(kind = K::NAME, %id, "record updated");
                self.inner.notifier.notify_success(K::MESSAGES.updated);
                self.refresh().await;
                Ok(())
            }
            Err(err) => {
                tracing::warn!(kind = K::NAME, op = %Operation::Update, %id, error = %err, "remote call failed");
                self.fail(Self::classify(err, K::MESSAGES.update_failed))
            }
        }
    }

    /// Remove a record immediately
    pub async fn delete(&self, id: &RecordId) -> Result<(), ClientError> {
        let owner = match self.owner() {
            Ok(owner) => owner,
            Err(err) => return self.fail(err),
        };
        let epoch = self.epoch();

        let result = self.inner.store.delete(owner, id.clone()).await;
        if self.epoch() != epoch {
            return Ok(());
        }

        match result {
            Ok(()) => {
                tracing::info!(kind = K::NAME, %id, "record deleted");
                {
                    let mut state = self.state();
                    if state.editing.as_ref() == Some(id) {
                        state.editing = None;
                        state.form = K::Form::default();
                    }
                }
                self.inner.notifier.notify_success(K::MESSAGES.deleted);
                self.refresh().await;
                Ok(())
            }
            Err(err) => {
                tracing::warn!(kind = K::NAME, op = %Operation::Delete, %id, error = %err, "remote call failed");
                self.fail(ClientError::remote(K::MESSAGES.delete_failed, err))
            }
        }
    }

    async fn refresh(&self) {
        // Failures were already reported by load
        if let Err(err) = self.load().await {
            tracing::debug!(kind = K::NAME, error = %err, "refresh after write failed");
        }
    }

    fn owner(&self) -> Result<Option<OwnerId>, ClientError> {
        match K::SCOPE {
            OwnerScope::LocalOnly => Ok(None),
            OwnerScope::Owned => self
                .inner
                .session
                .as_ref()
                .and_then(SessionContext::identity)
                .map(|identity| Some(identity.id))
                .ok_or(ClientError::SignedOut),
        }
    }

    fn set_saving(&self, epoch: u64, saving: bool) {
        let mut state = self.state();
        if state.epoch == epoch {
            state.saving = saving;
        }
    }

    fn classify(err: RemoteError, generic: &'static str) -> ClientError {
        match K::MESSAGES.duplicate {
            Some(message) if err.is_unique_violation() => ClientError::duplicate(message, err),
            _ => ClientError::remote(generic, err),
        }
    }

    fn fail(&self, err: ClientError) -> Result<(), ClientError> {
        self.inner.notifier.notify_failure(&err.to_string());
        Err(err)
    }
}
