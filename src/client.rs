//! HTTP client for the admin panel's dashboard-facing routes.
//!
//! Carries the session cookie the way a browser would: captured from the
//! login response, replayed on every request, dropped on logout.

use async_trait::async_trait;
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use thiserror::Error;

use crate::auth::SESSION_COOKIE;
use crate::dashboard::DashboardApi;
use crate::models::{
    DeleteUserResponse, PaymentQuery, PaymentSyncResponse, PaymentsListing, PokemonSyncResponse,
    Purchase, PurchasesListing, UserCount, UserDetail, UserEnvelope, UserQuery, UsersListing,
};
use crate::sync::PokemonBatchSource;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The panel answered with a non-success status; `message` is its `error` text.
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("Failed to connect to server: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid admin panel url: {0}")]
    InvalidUrl(String),
}

impl ClientError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ClientError::Api { status: 401, .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct AdminClient {
    client: Client,
    base_url: Url,
    session: Option<String>,
}

impl AdminClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let base_url =
            Url::parse(base_url).map_err(|err| ClientError::InvalidUrl(format!("{base_url}: {err}")))?;
        Ok(Self {
            client: Client::new(),
            base_url,
            session: None,
        })
    }

    /// Reuse a `name=value` cookie pair saved from an earlier login.
    pub fn with_session(mut self, cookie: impl Into<String>) -> Self {
        let cookie = cookie.into();
        self.session = (!cookie.trim().is_empty()).then_some(cookie);
        self
    }

    pub fn session_cookie(&self) -> Option<&str> {
        self.session.as_deref()
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .push("api")
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.session {
            Some(cookie) => builder.header(COOKIE, cookie),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, ClientError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        Err(api_error(status, response).await)
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ClientError> {
        Ok(self.send(builder).await?.json().await?)
    }

    // --- auth ---

    pub async fn login(&mut self, password: &str) -> Result<(), ClientError> {
        let url = self.endpoint(&["auth", "login"])?;
        let response = self
            .send(self.request(Method::POST, url).json(&json!({ "password": password })))
            .await?;
        self.session = session_cookie_from(&response);
        if self.session.is_none() {
            tracing::warn!("login succeeded but no session cookie was returned");
        }
        Ok(())
    }

    /// `Ok(false)` when the panel rejects the password; other failures are errors.
    pub async fn verify_password(&self, password: &str) -> Result<bool, ClientError> {
        let url = self.endpoint(&["auth", "verify"])?;
        match self
            .send(self.request(Method::POST, url).json(&json!({ "password": password })))
            .await
        {
            Ok(_) => Ok(true),
            Err(err) if err.is_unauthorized() => Ok(false),
            Err(err) => Err(err),
        }
    }

    pub async fn logout(&mut self) -> Result<(), ClientError> {
        let url = self.endpoint(&["auth", "logout"])?;
        let result = self.send(self.request(Method::POST, url)).await;
        self.session = None;
        result.map(|_| ())
    }

    pub async fn check_session(&self) -> Result<bool, ClientError> {
        let url = self.endpoint(&["auth", "check"])?;
        let status: Value = self.send_json(self.request(Method::GET, url)).await?;
        Ok(status
            .get("authenticated")
            .and_then(Value::as_bool)
            .unwrap_or(false))
    }

    // --- users ---

    pub async fn users(&self, query: &UserQuery) -> Result<UsersListing, ClientError> {
        let url = self.endpoint(&["users"])?;
        self.send_json(self.request(Method::GET, url).query(&query.to_pairs()))
            .await
    }

    pub async fn user(&self, id: &str) -> Result<UserDetail, ClientError> {
        let url = self.endpoint(&["users", id])?;
        let envelope: UserEnvelope = self.send_json(self.request(Method::GET, url)).await?;
        Ok(envelope.user)
    }

    pub async fn user_count(&self) -> Result<u64, ClientError> {
        let url = self.endpoint(&["users", "count"])?;
        let count: UserCount = self.send_json(self.request(Method::GET, url)).await?;
        Ok(count.total)
    }

    pub async fn purchases(&self, id: &str) -> Result<Vec<Purchase>, ClientError> {
        let url = self.endpoint(&["users", id, "purchases"])?;
        let listing: PurchasesListing = self.send_json(self.request(Method::GET, url)).await?;
        Ok(listing.purchases)
    }

    pub async fn delete_user(&self, id: &str) -> Result<DeleteUserResponse, ClientError> {
        let url = self.endpoint(&["users", id])?;
        self.send_json(self.request(Method::DELETE, url)).await
    }

    // --- payments and sync ---

    pub async fn payments(&self, query: &PaymentQuery) -> Result<PaymentsListing, ClientError> {
        let url = self.endpoint(&["payments"])?;
        self.send_json(self.request(Method::GET, url).query(&query.to_pairs()))
            .await
    }

    pub async fn sync_pokemon(&self, limit: u64, offset: u64) -> Result<PokemonSyncResponse, ClientError> {
        let url = self.endpoint(&["pokemon", "sync"])?;
        self.send_json(
            self.request(Method::POST, url)
                .json(&json!({ "limit": limit, "offset": offset })),
        )
        .await
    }

    pub async fn sync_payments(&self) -> Result<PaymentSyncResponse, ClientError> {
        let url = self.endpoint(&["payments", "sync"])?;
        self.send_json(self.request(Method::POST, url)).await
    }
}

/// `name=value` of the session cookie in a login response, attributes stripped.
fn session_cookie_from(response: &Response) -> Option<String> {
    let prefix = format!("{SESSION_COOKIE}=");
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter(|value| value.starts_with(&prefix))
        .filter_map(|value| value.split(';').next())
        .map(|pair| pair.trim().to_string())
        .next()
}

async fn api_error(status: StatusCode, response: Response) -> ClientError {
    let message = match response.json::<Value>().await {
        Ok(body) => body
            .get("error")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
        Err(_) => format!("HTTP {}", status.as_u16()),
    };
    ClientError::Api {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl PokemonBatchSource for AdminClient {
    type Error = ClientError;

    async fn sync_batch(&self, limit: u64, offset: u64) -> Result<PokemonSyncResponse, ClientError> {
        self.sync_pokemon(limit, offset).await
    }
}

#[async_trait]
impl DashboardApi for AdminClient {
    async fn check_session(&self) -> Result<bool, ClientError> {
        AdminClient::check_session(self).await
    }

    async fn login(&mut self, password: &str) -> Result<(), ClientError> {
        AdminClient::login(self, password).await
    }

    async fn logout(&mut self) -> Result<(), ClientError> {
        AdminClient::logout(self).await
    }

    async fn verify_password(&self, password: &str) -> Result<bool, ClientError> {
        AdminClient::verify_password(self, password).await
    }

    async fn users(&self, query: &UserQuery) -> Result<UsersListing, ClientError> {
        AdminClient::users(self, query).await
    }

    async fn purchases(&self, id: &str) -> Result<Vec<Purchase>, ClientError> {
        AdminClient::purchases(self, id).await
    }

    async fn delete_user(&self, id: &str) -> Result<DeleteUserResponse, ClientError> {
        AdminClient::delete_user(self, id).await
    }

    async fn payments(&self, query: &PaymentQuery) -> Result<PaymentsListing, ClientError> {
        AdminClient::payments(self, query).await
    }

    async fn sync_payments(&self) -> Result<PaymentSyncResponse, ClientError> {
        AdminClient::sync_payments(self).await
    }
}
