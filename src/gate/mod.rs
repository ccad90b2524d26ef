//! Route Gate: admission policy for protected pages.

use serde::Serialize;

use crate::config::AuthConfig;
use crate::session::{Session, SessionContext};

/// Application pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    Dashboard,
    Journal,
    Secrets,
    Code,
    Notes,
    Chat,
    Account,
    SignIn,
    NotFound,
}

impl Route {
    pub fn parse(path: &str) -> Self {
        let trimmed = path.trim();
        let path = if trimmed.len() > 1 {
            trimmed.trim_end_matches('/')
        } else {
            trimmed
        };
        match path {
            "/" | "" => Route::Dashboard,
            "/journal" => Route::Journal,
            "/secrets" => Route::Secrets,
            "/code" => Route::Code,
            "/notes" => Route::Notes,
            "/chat" => Route::Chat,
            "/account" => Route::Account,
            "/auth" => Route::SignIn,
            _ => Route::NotFound,
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Route::Dashboard => "/",
            Route::Journal => "/journal",
            Route::Secrets => "/secrets",
            Route::Code => "/code",
            Route::Notes => "/notes",
            Route::Chat => "/chat",
            Route::Account => "/account",
            Route::SignIn => "/auth",
            Route::NotFound => "*",
        }
    }

    pub fn is_protected(&self) -> bool {
        !matches!(self, Route::SignIn | Route::NotFound)
    }
}

/// Outcome of one navigation attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GateState {
    /// Session still resolving; show a waiting indicator
    Pending,
    /// No session; navigate to `redirect_to`, replacing the history entry
    Denied { redirect_to: String, replace: bool },
    /// Render the requested page
    Admitted,
}

#[derive(Debug, Clone)]
pub struct RouteGate {
    sign_in_path: String,
}

impl RouteGate {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            sign_in_path: config.sign_in_path.clone(),
        }
    }

    pub fn sign_in_path(&self) -> &str {
        &self.sign_in_path
    }

    /// Decision for a protected page under `session`
    pub fn evaluate(&self, session: &Session) -> GateState {
        if session.loading {
            return GateState::Pending;
        }
        match session.user {
            Some(_) => GateState::Admitted,
            None => GateState::Denied {
                redirect_to: self.sign_in_path.clone(),
                replace: true,
            },
        }
    }

    /// Decision for navigating to `route`; public pages are always admitted
    pub fn admit(&self, route: Route, session: &Session) -> GateState {
        if route.is_protected() {
            self.evaluate(session)
        } else {
            GateState::Admitted
        }
    }

    /// Re-evaluate on the next session change. `None` once the session
    /// manager has shut down.
    pub async fn next(&self, ctx: &mut SessionContext) -> Option<GateState> {
        ctx.changed().await.map(|session| self.evaluate(&session))
    }

    /// Wait out `Pending` and return the settled decision
    pub async fn settle(&self, ctx: &mut SessionContext) -> GateState {
        let session = ctx.settled().await;
        self.evaluate(&session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Identity;

    fn gate() -> RouteGate {
        RouteGate::new(&AuthConfig::default())
    }

    #[test]
    fn loading_is_pending_regardless_of_user() {
        let gate = gate();
        assert_eq!(gate.evaluate(&Session::resolving()), GateState::Pending);

        let odd = Session {
            user: Some(Identity::new("u1")),
            loading: true,
        };
        assert_eq!(gate.evaluate(&odd), GateState::Pending);
    }

    #[test]
    fn missing_user_redirects_with_replace() {
        assert_eq!(
            gate().evaluate(&Session::anonymous()),
            GateState::Denied {
                redirect_to: "/auth".to_string(),
                replace: true
            }
        );
    }

    #[test]
    fn present_user_is_admitted() {
        let session = Session::signed_in(Identity::new("u1"));
        assert_eq!(gate().evaluate(&session), GateState::Admitted);
    }

    #[test]
    fn public_routes_skip_the_gate() {
        let gate = gate();
        let anonymous = Session::anonymous();
        assert_eq!(gate.admit(Route::SignIn, &anonymous), GateState::Admitted);
        assert_eq!(gate.admit(Route::NotFound, &anonymous), GateState::Admitted);
        assert!(matches!(gate.admit(Route::Secrets, &anonymous), GateState::Denied { .. }));
    }

    #[test]
    fn route_table() {
        assert_eq!(Route::parse("/"), Route::Dashboard);
        assert_eq!(Route::parse("/journal/"), Route::Journal);
        assert_eq!(Route::parse("/code"), Route::Code);
        assert_eq!(Route::parse("/auth"), Route::SignIn);
        assert_eq!(Route::parse("/nowhere"), Route::NotFound);
        assert_eq!(Route::parse(Route::Notes.path()), Route::Notes);
        assert!(Route::Account.is_protected());
        assert!(!Route::SignIn.is_protected());
    }
}
