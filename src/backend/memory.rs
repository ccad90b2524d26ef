//! In-process collaborators.
//!
//! `MemoryTable` backs the local-only note kind and stands in for remote
//! tables in tests. It applies the same owner scoping, newest-first ordering
//! and uniqueness rule the hosted backend enforces.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use super::{AuthEvent, AuthEvents, AuthProvider, AuthSubscription, FunctionInvoker, RecordStore};
use crate::error::RemoteError;
use crate::resource::ResourceKind;
use crate::session::Identity;
use crate::types::{Operation, OwnerId, RecordId};

struct Row<R> {
    owner: Option<OwnerId>,
    record: R,
}

pub struct MemoryTable<K: ResourceKind> {
    // Newest first
    rows: Mutex<Vec<Row<K::Record>>>,
    failures: Mutex<HashMap<Operation, RemoteError>>,
    calls: AtomicUsize,
}

impl<K: ResourceKind> Default for MemoryTable<K> {
    fn default() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
        }
    }
}

impl<K: ResourceKind> MemoryTable<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call of `op` fail with `err`
    pub fn fail_next(&self, op: Operation, err: RemoteError) {
        lock(&self.failures).insert(op, err);
    }

    /// Number of calls received, including failed ones
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every stored record regardless of owner, newest first
    pub fn records(&self) -> Vec<K::Record> {
        lock(&self.rows).iter().map(|r| r.record.clone()).collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.rows).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn enter(&self, op: Operation) -> Result<(), RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match lock(&self.failures).remove(&op) {
            Some(err) => {
                tracing::debug!(table = K::TABLE, %op, "injected failure");
                Err(err)
            }
            None => Ok(()),
        }
    }

    fn collides(rows: &[Row<K::Record>], owner: &Option<OwnerId>, candidate: &K::Record) -> bool {
        let Some(key) = K::unique_key(candidate) else {
            return false;
        };
        rows.iter().any(|row| {
            row.owner == *owner
                && K::id(&row.record) != K::id(candidate)
                && K::unique_key(&row.record) == Some(key)
        })
    }
}

fn visible(row_owner: &Option<OwnerId>, owner: &Option<OwnerId>) -> bool {
    owner.is_none() || row_owner == owner
}

#[async_trait]
impl<K: ResourceKind> RecordStore<K> for MemoryTable<K> {
    async fn list(&self, owner: Option<OwnerId>) -> Result<Vec<K::Record>, RemoteError> {
        self.enter(Operation::List)?;
        let rows = lock(&self.rows);
        Ok(rows
            .iter()
            .filter(|row| visible(&row.owner, &owner))
            .map(|row| row.record.clone())
            .collect())
    }

    async fn insert(
        &self,
        owner: Option<OwnerId>,
        draft: K::Draft,
    ) -> Result<K::Record, RemoteError> {
        self.enter(Operation::Create)?;
        let record = K::materialize(RecordId::generate(), owner.clone(), draft, Utc::now());

        let mut rows = lock(&self.rows);
        if Self::collides(&rows, &owner, &record) {
            return Err(RemoteError::unique_violation(format!(
                "duplicate key value violates unique constraint on {}",
                K::TABLE
            ))
            .with_status(409));
        }
        rows.insert(
            0,
            Row {
                owner,
                record: record.clone(),
            },
        );
        Ok(record)
    }

    async fn update(
        &self,
        owner: Option<OwnerId>,
        id: RecordId,
        patch: K::Patch,
    ) -> Result<(), RemoteError> {
        self.enter(Operation::Update)?;
        let mut rows = lock(&self.rows);
        let Some(index) = rows
            .iter()
            .position(|row| visible(&row.owner, &owner) && *K::id(&row.record) == id)
        else {
            // Filtered writes that match nothing succeed with zero rows
            tracing::debug!(table = K::TABLE, %id, "update matched no rows");
            return Ok(());
        };

        let mut updated = rows[index].record.clone();
        K::apply_patch(&mut updated, patch, Utc::now());
        if Self::collides(&rows, &rows[index].owner, &updated) {
            return Err(RemoteError::unique_violation(format!(
                "duplicate key value violates unique constraint on {}",
                K::TABLE
            ))
            .with_status(409));
        }
        rows[index].record = updated;
        Ok(())
    }

    async fn delete(&self, owner: Option<OwnerId>, id: RecordId) -> Result<(), RemoteError> {
        self.enter(Operation::Delete)?;
        lock(&self.rows).retain(|row| !(visible(&row.owner, &owner) && *K::id(&row.record) == id));
        Ok(())
    }
}

/// Auth provider whose state is driven by direct calls
#[derive(Default)]
pub struct MemoryAuth {
    user: Mutex<Option<Identity>>,
    resolve_error: Mutex<Option<RemoteError>>,
    events: AuthEvents,
}

impl MemoryAuth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider that already holds a session for `id`
    pub fn signed_in(id: impl Into<String>) -> Self {
        let auth = Self::default();
        *lock(&auth.user) = Some(Identity::new(id));
        auth
    }

    /// Make the next resolution fail
    pub fn fail_resolution(&self, err: RemoteError) {
        *lock(&self.resolve_error) = Some(err);
    }

    pub fn sign_in(&self, id: impl Into<String>) {
        let identity = Identity::new(id);
        *lock(&self.user) = Some(identity.clone());
        self.events.emit(AuthEvent::SignedIn, Some(identity));
    }

    pub fn sign_out(&self) {
        *lock(&self.user) = None;
        self.events.emit(AuthEvent::SignedOut, None);
    }

    pub fn refresh(&self) {
        let user = lock(&self.user).clone();
        self.events.emit(AuthEvent::TokenRefreshed, user);
    }
}

#[async_trait]
impl AuthProvider for MemoryAuth {
    async fn resolve_session(&self) -> Result<Option<Identity>, RemoteError> {
        if let Some(err) = lock(&self.resolve_error).take() {
            return Err(err);
        }
        Ok(lock(&self.user).clone())
    }

    fn subscribe(&self) -> AuthSubscription {
        self.events.subscribe()
    }
}

/// Function runtime answering from a queue of canned replies
#[derive(Default)]
pub struct MemoryFunctions {
    replies: Mutex<VecDeque<Result<Value, RemoteError>>>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl MemoryFunctions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, reply: Result<Value, RemoteError>) {
        lock(&self.replies).push_back(reply);
    }

    /// Every invocation received, in order
    pub fn calls(&self) -> Vec<(String, Value)> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl FunctionInvoker for MemoryFunctions {
    async fn invoke(&self, name: &str, body: Value) -> Result<Value, RemoteError> {
        lock(&self.calls).push((name.to_string(), body));
        lock(&self.replies)
            .pop_front()
            .unwrap_or_else(|| Err(RemoteError::new(format!("no reply queued for {}", name))))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
