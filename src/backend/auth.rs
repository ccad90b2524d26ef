//! Password auth against the hosted backend's `auth/v1` endpoints.

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Mutex;

use super::rest::RestClient;
use super::{AuthEvent, AuthEvents, AuthProvider, AuthSubscription};
use crate::config::AuthConfig;
use crate::error::RemoteError;
use crate::session::Identity;

/// Tokens kept between runs
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredSession {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: String,
    /// Unix seconds
    pub expires_at: i64,
}

impl std::fmt::Debug for StoredSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredSession")
            .field("user_id", &self.user_id)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Persistence for [`StoredSession`]
pub trait SessionStore: Send + Sync {
    fn load(&self) -> anyhow::Result<Option<StoredSession>>;
    fn save(&self, session: &StoredSession) -> anyhow::Result<()>;
    fn clear(&self) -> anyhow::Result<()>;
}

#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    slot: Mutex<Option<StoredSession>>,
}

impl SessionStore for InMemorySessionStore {
    fn load(&self) -> anyhow::Result<Option<StoredSession>> {
        Ok(self.slot.lock().map_err(|_| anyhow::anyhow!("session slot poisoned"))?.clone())
    }

    fn save(&self, session: &StoredSession) -> anyhow::Result<()> {
        *self.slot.lock().map_err(|_| anyhow::anyhow!("session slot poisoned"))? = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> anyhow::Result<()> {
        *self.slot.lock().map_err(|_| anyhow::anyhow!("session slot poisoned"))? = None;
        Ok(())
    }
}

/// Claims read from the access token. The backend verifies the signature;
/// the client only needs subject and expiry.
#[derive(Debug, Deserialize)]
struct AccessClaims {
    sub: String,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: Option<i64>,
    expires_at: Option<i64>,
    user: UserResponse,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: String,
}

pub struct RestAuth {
    client: RestClient,
    store: Box<dyn SessionStore>,
    events: AuthEvents,
    refresh_margin_secs: i64,
}

impl RestAuth {
    pub fn new(client: RestClient, store: Box<dyn SessionStore>, config: &AuthConfig) -> Self {
        Self {
            client,
            store,
            events: AuthEvents::new(),
            refresh_margin_secs: config.refresh_margin_secs,
        }
    }

    /// Exchange email and password for a session
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, RemoteError> {
        let builder = self
            .client
            .request(Method::POST, "auth/v1/token")?
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }));

        let tokens = self.token_request(builder).await?;
        let identity = self.adopt(tokens)?;
        tracing::info!(user = %identity.id, "signed in");
        self.events.emit(AuthEvent::SignedIn, Some(identity.clone()));
        Ok(identity)
    }

    /// End the session locally and on the backend. The local session is
    /// cleared even if the backend call fails.
    pub async fn sign_out(&self) -> Result<(), RemoteError> {
        let remote = match self.client.access_token() {
            Some(_) => match self.client.request(Method::POST, "auth/v1/logout") {
                Ok(builder) => self.client.send(builder).await.map(|_| ()),
                Err(err) => Err(err),
            },
            None => Ok(()),
        };

        self.forget();
        self.events.emit(AuthEvent::SignedOut, None);

        if let Err(err) = &remote {
            tracing::warn!(error = %err, "backend logout failed");
        }
        remote
    }

    /// Trade the stored refresh token for a new access token
    pub async fn refresh(&self) -> Result<Identity, RemoteError> {
        let stored = self
            .load_stored()
            .ok_or_else(|| RemoteError::new("no stored session to refresh"))?;

        let identity = self.refresh_with(&stored.refresh_token).await?;
        self.events.emit(AuthEvent::TokenRefreshed, Some(identity.clone()));
        Ok(identity)
    }

    /// Ask the backend who the current token belongs to
    pub async fn current_user(&self) -> Result<Identity, RemoteError> {
        let builder = self.client.request(Method::GET, "auth/v1/user")?;
        let response = self.client.send(builder).await?;
        let user = response.json::<UserResponse>().await?;
        Ok(Identity::new(user.id))
    }

    async fn refresh_with(&self, refresh_token: &str) -> Result<Identity, RemoteError> {
        let builder = self
            .client
            .request(Method::POST, "auth/v1/token")?
            .query(&[("grant_type", "refresh_token")])
            .json(&json!({ "refresh_token": refresh_token }));

        let tokens = self.token_request(builder).await?;
        let identity = self.adopt(tokens)?;
        tracing::debug!(user = %identity.id, "access token refreshed");
        Ok(identity)
    }

    async fn token_request(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<TokenResponse, RemoteError> {
        let response = self.client.send(builder).await?;
        Ok(response.json::<TokenResponse>().await?)
    }

    fn adopt(&self, tokens: TokenResponse) -> Result<Identity, RemoteError> {
        let now = Utc::now().timestamp();
        let expires_at = tokens
            .expires_at
            .or_else(|| tokens.expires_in.map(|secs| now + secs))
            .or_else(|| read_claims(&tokens.access_token).map(|c| c.exp).ok())
            .unwrap_or(now);

        let stored = StoredSession {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            user_id: tokens.user.id,
            expires_at,
        };
        self.store
            .save(&stored)
            .map_err(|e| RemoteError::new(format!("failed to persist session: {}", e)))?;
        self.client.set_access_token(Some(stored.access_token.clone()));
        Ok(Identity::new(stored.user_id))
    }

    fn load_stored(&self) -> Option<StoredSession> {
        match self.store.load() {
            Ok(stored) => stored,
            Err(err) => {
                tracing::warn!(error = %err, "could not read stored session");
                None
            }
        }
    }

    fn forget(&self) {
        self.client.set_access_token(None);
        if let Err(err) = self.store.clear() {
            tracing::warn!(error = %err, "could not clear stored session");
        }
    }
}

#[async_trait]
impl AuthProvider for RestAuth {
    async fn resolve_session(&self) -> Result<Option<Identity>, RemoteError> {
        let Some(stored) = self.load_stored() else {
            return Ok(None);
        };

        let expires_at = read_claims(&stored.access_token)
            .map(|claims| claims.exp)
            .unwrap_or(stored.expires_at);

        if expires_at - self.refresh_margin_secs <= Utc::now().timestamp() {
            return match self.refresh_with(&stored.refresh_token).await {
                Ok(identity) => Ok(Some(identity)),
                Err(err) => {
                    tracing::debug!(error = %err, "stored session could not be refreshed");
                    self.forget();
                    Err(err)
                }
            };
        }

        self.client.set_access_token(Some(stored.access_token.clone()));
        match self.current_user().await {
            Ok(identity) => Ok(Some(identity)),
            Err(err) if err.status == Some(401) || err.status == Some(403) => {
                self.forget();
                Ok(None)
            }
            Err(err) => {
                self.client.set_access_token(None);
                Err(err)
            }
        }
    }

    fn subscribe(&self) -> AuthSubscription {
        self.events.subscribe()
    }
}

fn read_claims(token: &str) -> Result<AccessClaims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<AccessClaims>(token, &DecodingKey::from_secret(&[]), &validation).map(|data| data.claims)
}
