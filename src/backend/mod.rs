//! Collaborator contracts consumed by the client core.
//!
//! The core never talks to a backend directly; it goes through these traits.
//! [`rest`] and [`auth`] implement them over HTTP, [`memory`] implements them
//! in process.

pub mod auth;
pub mod memory;
pub mod rest;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::RemoteError;
use crate::resource::ResourceKind;
use crate::session::Identity;
use crate::types::{OwnerId, RecordId};

pub use auth::{InMemorySessionStore, RestAuth, SessionStore, StoredSession};
pub use memory::{MemoryAuth, MemoryFunctions, MemoryTable};
pub use rest::{RestClient, RestTable};

/// What caused a session change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChange {
    pub event: AuthEvent,
    pub user: Option<Identity>,
}

/// Source of authentication state.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Resolve any session that already exists. `Ok(None)` is the normal
    /// anonymous answer, not an error.
    async fn resolve_session(&self) -> Result<Option<Identity>, RemoteError>;

    /// Listen for login, logout and refresh. Dropping the subscription
    /// unsubscribes.
    fn subscribe(&self) -> AuthSubscription;
}

/// Per-kind table access, scoped to an owner when one is given.
#[async_trait]
pub trait RecordStore<K: ResourceKind>: Send + Sync {
    /// All visible records, newest created first
    async fn list(&self, owner: Option<OwnerId>) -> Result<Vec<K::Record>, RemoteError>;

    async fn insert(
        &self,
        owner: Option<OwnerId>,
        draft: K::Draft,
    ) -> Result<K::Record, RemoteError>;

    async fn update(
        &self,
        owner: Option<OwnerId>,
        id: RecordId,
        patch: K::Patch,
    ) -> Result<(), RemoteError>;

    async fn delete(&self, owner: Option<OwnerId>, id: RecordId) -> Result<(), RemoteError>;
}

/// Remote function runtime.
#[async_trait]
pub trait FunctionInvoker: Send + Sync {
    async fn invoke(&self, name: &str, body: Value) -> Result<Value, RemoteError>;
}

/// Broadcast hub shared by auth providers for session-change notifications
#[derive(Debug, Clone)]
pub struct AuthEvents {
    tx: broadcast::Sender<AuthChange>,
}

impl AuthEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    pub fn emit(&self, event: AuthEvent, user: Option<Identity>) {
        tracing::debug!(?event, signed_in = user.is_some(), "auth change");
        // No subscribers is fine
        let _ = self.tx.send(AuthChange { event, user });
    }

    pub fn subscribe(&self) -> AuthSubscription {
        AuthSubscription {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for AuthEvents {
    fn default() -> Self {
        Self::new()
    }
}

/// Live subscription to session changes
#[derive(Debug)]
pub struct AuthSubscription {
    rx: broadcast::Receiver<AuthChange>,
}

impl AuthSubscription {
    /// Next change, or `None` once the provider is gone
    pub async fn next(&mut self) -> Option<AuthChange> {
        loop {
            match self.rx.recv().await {
                Ok(change) => return Some(change),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Later changes still carry the current user
                    tracing::warn!(skipped, "auth subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Most recent change already queued, without waiting
    pub fn latest_pending(&mut self) -> Option<AuthChange> {
        let mut latest = None;
        loop {
            match self.rx.try_recv() {
                Ok(change) => latest = Some(change),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "auth subscriber lagged");
                }
                Err(_) => return latest,
            }
        }
    }
}
