//! HTTP client for the hosted backend's table and function endpoints.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::{Arc, RwLock};
use url::Url;

use super::{FunctionInvoker, RecordStore};
use crate::config::BackendConfig;
use crate::error::{ErrorBody, RemoteError};
use crate::resource::ResourceKind;
use crate::types::{OwnerId, RecordId};

/// Shared HTTP plumbing: base URL, API key and the current access token.
#[derive(Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base: Url,
    anon_key: String,
    token: Arc<RwLock<Option<String>>>,
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("base", &self.base.as_str())
            .finish_non_exhaustive()
    }
}

impl RestClient {
    pub fn new(config: &BackendConfig) -> Result<Self, RemoteError> {
        // A trailing slash keeps Url::join from dropping the last path segment
        let raw = format!("{}/", config.url.trim_end_matches('/'));
        let base = Url::parse(&raw)
            .map_err(|e| RemoteError::new(format!("invalid backend url '{}': {}", config.url, e)))?;

        Ok(Self {
            http: reqwest::Client::new(),
            base,
            anon_key: config.anon_key.clone(),
            token: Arc::new(RwLock::new(None)),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Bearer token sent with every request; falls back to the anon key
    pub fn set_access_token(&self, token: Option<String>) {
        match self.token.write() {
            Ok(mut guard) => *guard = token,
            Err(poisoned) => *poisoned.into_inner() = token,
        }
    }

    pub fn access_token(&self) -> Option<String> {
        match self.token.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub(crate) fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, RemoteError> {
        let url = self
            .base
            .join(path)
            .map_err(|e| RemoteError::new(format!("invalid request path '{}': {}", path, e)))?;

        let bearer = self.access_token().unwrap_or_else(|| self.anon_key.clone());
        let mut builder = self.http.request(method, url);
        if !self.anon_key.is_empty() {
            builder = builder.header("apikey", &self.anon_key);
        }
        if !bearer.is_empty() {
            builder = builder.bearer_auth(bearer);
        }
        Ok(builder)
    }

    /// Send and turn non-2xx answers into `RemoteError` using the error body
    pub(crate) async fn send(&self, builder: RequestBuilder) -> Result<Response, RemoteError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.json::<ErrorBody>().await.unwrap_or_default();
        Err(body.into_remote(status.as_u16()))
    }

    /// Table accessor for one record kind
    pub fn table<K: ResourceKind>(&self) -> RestTable<K> {
        RestTable {
            client: self.clone(),
            _kind: PhantomData,
        }
    }
}

/// PostgREST-style table endpoint at `rest/v1/<table>`
pub struct RestTable<K: ResourceKind> {
    client: RestClient,
    _kind: PhantomData<fn() -> K>,
}

impl<K: ResourceKind> RestTable<K> {
    fn path() -> String {
        format!("rest/v1/{}", K::TABLE)
    }

    fn scoped(
        builder: RequestBuilder,
        owner: &Option<OwnerId>,
        id: Option<&RecordId>,
    ) -> RequestBuilder {
        let mut filters: Vec<(&str, String)> = Vec::new();
        if let Some(id) = id {
            filters.push(("id", format!("eq.{}", id)));
        }
        if let Some(owner) = owner {
            filters.push(("user_id", format!("eq.{}", owner)));
        }
        builder.query(&filters)
    }
}

#[async_trait]
impl<K: ResourceKind> RecordStore<K> for RestTable<K> {
    async fn list(&self, owner: Option<OwnerId>) -> Result<Vec<K::Record>, RemoteError> {
        let builder = self
            .client
            .request(Method::GET, &Self::path())?
            .query(&[("select", "*"), ("order", "created_at.desc")]);
        let builder = Self::scoped(builder, &owner, None);

        let response = self.client.send(builder).await?;
        let records = response.json::<Vec<K::Record>>().await?;
        tracing::debug!(table = K::TABLE, count = records.len(), "listed records");
        Ok(records)
    }

    async fn insert(
        &self,
        owner: Option<OwnerId>,
        draft: K::Draft,
    ) -> Result<K::Record, RemoteError> {
        let mut body = serde_json::to_value(&draft)
            .map_err(|e| RemoteError::new(format!("failed to encode {} record: {}", K::NAME, e)))?;
        if let (Some(owner), Value::Object(map)) = (&owner, &mut body) {
            map.insert("user_id".to_string(), Value::String(owner.clone()));
        }

        let builder = self
            .client
            .request(Method::POST, &Self::path())?
            .header("Prefer", "return=representation")
            .json(&body);

        let response = self.client.send(builder).await?;
        let mut created = response.json::<Vec<K::Record>>().await?;
        if created.is_empty() {
            return Err(RemoteError::new(format!("insert into {} returned no row", K::TABLE)));
        }
        Ok(created.remove(0))
    }

    async fn update(
        &self,
        owner: Option<OwnerId>,
        id: RecordId,
        patch: K::Patch,
    ) -> Result<(), RemoteError> {
        let builder = self
            .client
            .request(Method::PATCH, &Self::path())?
            .json(&patch);
        let builder = Self::scoped(builder, &owner, Some(&id));

        self.client.send(builder).await?;
        Ok(())
    }

    async fn delete(&self, owner: Option<OwnerId>, id: RecordId) -> Result<(), RemoteError> {
        let builder = self.client.request(Method::DELETE, &Self::path())?;
        let builder = Self::scoped(builder, &owner, Some(&id));

        self.client.send(builder).await?;
        Ok(())
    }
}

#[async_trait]
impl FunctionInvoker for RestClient {
    async fn invoke(&self, name: &str, body: Value) -> Result<Value, RemoteError> {
        let builder = self
            .request(Method::POST, &format!("functions/v1/{}", name))?
            .json(&body);

        let response = self.send(builder).await?;
        Ok(response.json::<Value>().await?)
    }
}
