//! Session Manager.
//!
//! The manager is the only writer of [`Session`]. Everything else reads it
//! through a [`SessionContext`], which can be cloned freely and handed to
//! each view that needs owner scoping or gating.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::backend::AuthProvider;

/// The signed-in principal. Only compared and checked for presence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
}

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user: Option<Identity>,
    /// True only while the initial resolution is running
    pub loading: bool,
}

impl Session {
    pub fn resolving() -> Self {
        Self {
            user: None,
            loading: true,
        }
    }

    pub fn anonymous() -> Self {
        Self {
            user: None,
            loading: false,
        }
    }

    pub fn signed_in(identity: Identity) -> Self {
        Self {
            user: Some(identity),
            loading: false,
        }
    }

    pub fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }
}

/// Read-only handle on the current session
#[derive(Debug, Clone)]
pub struct SessionContext {
    rx: watch::Receiver<Session>,
}

impl SessionContext {
    pub fn current(&self) -> Session {
        self.rx.borrow().clone()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.rx.borrow().user.clone()
    }

    /// Wait for the next session change. `None` once the manager is gone.
    pub async fn changed(&mut self) -> Option<Session> {
        match self.rx.changed().await {
            Ok(()) => Some(self.rx.borrow_and_update().clone()),
            Err(_) => None,
        }
    }

    /// Wait until initial resolution has finished
    pub async fn settled(&mut self) -> Session {
        let settled = match self.rx.wait_for(|session| !session.loading).await {
            Ok(session) => Some(session.clone()),
            Err(_) => None,
        };
        settled.unwrap_or_else(|| self.current())
    }
}

pub struct SessionManager {
    tx: Arc<watch::Sender<Session>>,
    task: JoinHandle<()>,
}

impl SessionManager {
    /// Start resolving the existing session in the background, then follow
    /// the provider's change notifications for as long as the manager lives.
    pub fn start(provider: Arc<dyn AuthProvider>) -> Self {
        let (tx, _rx) = watch::channel(Session::resolving());
        let tx = Arc::new(tx);
        let task = tokio::spawn(Self::run(provider, Arc::clone(&tx)));
        Self { tx, task }
    }

    pub fn context(&self) -> SessionContext {
        SessionContext {
            rx: self.tx.subscribe(),
        }
    }

    pub fn current(&self) -> Session {
        self.tx.borrow().clone()
    }

    async fn run(provider: Arc<dyn AuthProvider>, tx: Arc<watch::Sender<Session>>) {
        // Subscribe first so changes during resolution are not lost
        let mut changes = provider.subscribe();
        let resolved = match provider.resolve_session().await {
            Ok(user) => user,
            Err(err) => {
                // An unresolvable session is just an anonymous visitor
                tracing::debug!(error = %err, "session resolution failed, continuing signed out");
                None
            }
        };
        // A change that arrived while resolving is newer than the resolved value
        let user = match changes.latest_pending() {
            Some(change) => change.user,
            None => resolved,
        };
        tracing::info!(signed_in = user.is_some(), "session resolved");
        tx.send_replace(Session { user, loading: false });

        while let Some(change) = changes.next().await {
            tracing::debug!(event = ?change.event, signed_in = change.user.is_some(), "session changed");
            tx.send_replace(Session {
                user: change.user,
                loading: false,
            });
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.task.abort();
    }
}
