//! Backend gateway: the only component that talks to the data-owning backend.
//!
//! Every call goes to `{base}/api/admin/...` with the service API key and a JSON
//! content type. Backend envelopes are unwrapped and reshaped into the
//! dashboard shapes from `models` before they leave this module.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;

use crate::models::{
    BackendCount, BackendDeleteResponse, BackendEnvelope, BackendPurchases, BackendUser,
    BackendUsersPage, PaymentQuery, PaymentSyncResponse, PaymentsListing, PokemonSyncResponse,
    Purchase, UserDetail, UserQuery, UsersListing,
};

pub const API_KEY_HEADER: &str = "X-API-Key";

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Backend answered with a non-success status. `from_body` is false when
    /// `message` is a stand-in (`HTTP <status>`, `Request failed`) rather than
    /// the backend's own `error` text.
    #[error("{message}")]
    Upstream {
        status: u16,
        message: String,
        from_body: bool,
    },
    #[error("backend request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid backend url: {0}")]
    InvalidUrl(String),
}

impl GatewayError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::Upstream { status: 404, .. })
    }

    /// The backend's own `error` text, if it sent one.
    pub fn backend_message(&self) -> Option<&str> {
        match self {
            GatewayError::Upstream {
                message,
                from_body: true,
                ..
            } => Some(message),
            _ => None,
        }
    }
}

/// Operations the admin panel needs from the backend.
///
/// Route handlers only see this trait, so tests can swap in an in-memory store.
#[async_trait]
pub trait AdminBackend: Send + Sync {
    async fn list_users(&self, query: &UserQuery) -> Result<UsersListing, GatewayError>;
    async fn get_user(&self, id: &str) -> Result<UserDetail, GatewayError>;
    async fn delete_user(&self, id: &str) -> Result<BackendDeleteResponse, GatewayError>;
    async fn user_count(&self) -> Result<u64, GatewayError>;
    async fn user_purchases(&self, id: &str) -> Result<Vec<Purchase>, GatewayError>;
    async fn list_payments(&self, query: &PaymentQuery) -> Result<PaymentsListing, GatewayError>;
    async fn sync_pokemon(&self, limit: u64, offset: u64)
        -> Result<PokemonSyncResponse, GatewayError>;
    async fn sync_payments(&self) -> Result<PaymentSyncResponse, GatewayError>;
}

/// reqwest-backed gateway.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, api_key: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        let base_url =
            Url::parse(base_url).map_err(|err| GatewayError::InvalidUrl(format!("{base_url}: {err}")))?;
        if base_url.cannot_be_a_base() {
            return Err(GatewayError::InvalidUrl(base_url.to_string()));
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
        })
    }

    /// `{base}/api/admin/<segments...>`, each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| GatewayError::InvalidUrl(self.base_url.to_string()))?;
            path.pop_if_empty().extend(["api", "admin"]).extend(segments);
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header(API_KEY_HEADER, &self.api_key)
            .header(CONTENT_TYPE, "application/json")
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, GatewayError> {
        let response = request.send().await?;
        let status = response.status();
        tracing::debug!(url = %response.url().path(), status = status.as_u16(), "backend response");
        if !status.is_success() {
            let err = upstream_error(response).await;
            tracing::warn!(status = status.as_u16(), error = %err, "backend call failed");
            return Err(err);
        }
        Ok(response.json::<T>().await?)
    }
}

/// Message resolution: the body's `error` string, `HTTP <status>` for JSON
/// without one, `Request failed` when the body is not JSON at all.
async fn upstream_error(response: Response) -> GatewayError {
    let status = response.status().as_u16();
    let (message, from_body) = match response.json::<serde_json::Value>().await {
        Ok(body) => match body
            .get("error")
            .and_then(|value| value.as_str())
            .filter(|value| !value.is_empty())
        {
            Some(error) => (error.to_owned(), true),
            None => (format!("HTTP {status}"), false),
        },
        Err(_) => ("Request failed".to_string(), false),
    };
    GatewayError::Upstream {
        status,
        message,
        from_body,
    }
}

#[async_trait]
impl AdminBackend for HttpBackend {
    async fn list_users(&self, query: &UserQuery) -> Result<UsersListing, GatewayError> {
        let url = self.endpoint(&["users"])?;
        let request = self.request(Method::GET, url).query(&query.to_pairs());
        let envelope: BackendEnvelope<BackendUsersPage> = self.send(request).await?;
        Ok(UsersListing::from(envelope.data))
    }

    async fn get_user(&self, id: &str) -> Result<UserDetail, GatewayError> {
        let url = self.endpoint(&["users", id])?;
        let envelope: BackendEnvelope<BackendUser> = self.send(self.request(Method::GET, url)).await?;
        Ok(UserDetail::from(envelope.data))
    }

    async fn delete_user(&self, id: &str) -> Result<BackendDeleteResponse, GatewayError> {
        let url = self.endpoint(&["users", id])?;
        self.send(self.request(Method::DELETE, url)).await
    }

    async fn user_count(&self) -> Result<u64, GatewayError> {
        let url = self.endpoint(&["users", "count"])?;
        let envelope: BackendEnvelope<BackendCount> = self.send(self.request(Method::GET, url)).await?;
        Ok(envelope.data.total)
    }

    async fn user_purchases(&self, id: &str) -> Result<Vec<Purchase>, GatewayError> {
        let url = self.endpoint(&["users", id, "purchases"])?;
        let body: BackendPurchases = self.send(self.request(Method::GET, url)).await?;
        Ok(body.purchases)
    }

    async fn list_payments(&self, query: &PaymentQuery) -> Result<PaymentsListing, GatewayError> {
        let url = self.endpoint(&["payments"])?;
        let request = self.request(Method::GET, url).query(&query.to_pairs());
        self.send(request).await
    }

    async fn sync_pokemon(
        &self,
        limit: u64,
        offset: u64,
    ) -> Result<PokemonSyncResponse, GatewayError> {
        let url = self.endpoint(&["pokemon", "sync"])?;
        let request = self
            .request(Method::POST, url)
            .json(&json!({ "limit": limit, "offset": offset }));
        self.send(request).await
    }

    async fn sync_payments(&self) -> Result<PaymentSyncResponse, GatewayError> {
        let url = self.endpoint(&["payments", "sync"])?;
        self.send(self.request(Method::POST, url)).await
    }
}
