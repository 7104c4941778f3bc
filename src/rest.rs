//! Dashboard-facing REST API (Axum).
//!
//! - `/api/auth/*`: login, verify, logout and session check (no session needed).
//! - Everything else under `/api` sits behind the session middleware and
//!   forwards to the backend gateway.
//! - Failures leave as `{"error": "..."}` with a matching status code.

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, FromRef, Path, Query, Request, State},
    http::{header::HeaderName, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Key, SignedCookieJar};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tower_http::LatencyUnit;
use tracing::Level;

use crate::auth::{is_session_active, SessionGuard};
use crate::backend::{AdminBackend, GatewayError};
use crate::models::{
    AuthStatus, DeleteUserResponse, ErrorBody, HealthStatus, LoginResponse, PasswordRequest,
    PaymentQuery, PaymentSyncResponse, PaymentsListing, PokemonSyncResponse,
    PurchasesListing, SortOrder, UserCount, UserEnvelope, UserQuery, UsersListing,
    VerifyResponse, DEFAULT_PAYMENTS_PAGE_SIZE, DEFAULT_USERS_PAGE_SIZE, DEFAULT_USER_SORT,
    MAX_PAGE_SIZE,
};
use crate::openapi;

pub const DEFAULT_SYNC_LIMIT: u64 = 50;

/// Shared state for REST handlers (cheap to clone; the gateway is Arc-wrapped)
#[derive(Clone)]
pub struct AppState {
    backend: Arc<dyn AdminBackend>,
    guard: SessionGuard,
    key: Key,
}

impl AppState {
    pub fn new(backend: Arc<dyn AdminBackend>, guard: SessionGuard, key: Key) -> Self {
        Self {
            backend,
            guard,
            key,
        }
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.key.clone()
    }
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    valid: Option<bool>,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            valid: None,
        }
    }

    fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Unauthorized")
    }

    fn with_valid(mut self, valid: bool) -> Self {
        self.valid = Some(valid);
        self
    }

    /// 500 carrying the backend's own `error` text, or `fallback` when the
    /// backend sent none (non-JSON body, no `error` field, transport failure).
    fn upstream(err: &GatewayError, fallback: &str) -> Self {
        let message = err.backend_message().unwrap_or(fallback);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message,
            valid: self.valid,
        };
        (self.status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Rejects requests without an active session before any handler runs.
async fn require_session(jar: SignedCookieJar, req: Request, next: Next) -> ApiResult<Response> {
    if !is_session_active(&jar) {
        return Err(ApiError::unauthorized());
    }
    Ok(next.run(req).await)
}

/// Create the Axum router with auth, user, payment and sync endpoints.
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/users", get(list_users_handler))
        .route("/api/users/count", get(user_count_handler))
        .route(
            "/api/users/:id",
            get(get_user_handler).delete(delete_user_handler),
        )
        .route("/api/users/:id/purchases", get(user_purchases_handler))
        .route("/api/payments", get(list_payments_handler))
        .route("/api/payments/sync", post(sync_payments_handler))
        .route("/api/pokemon/sync", post(sync_pokemon_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session));

    Router::new()
        .route("/api/auth/login", post(login_handler))
        .route("/api/auth/verify", post(verify_handler))
        .route("/api/auth/logout", post(logout_handler))
        .route("/api/auth/check", get(check_handler))
        .route("/api/openapi.json", get(openapi_handler))
        .route("/health", get(health_handler))
        .merge(protected)
        .with_state(state)
}

/// Request tracing with an `x-request-id` that is generated when absent and
/// echoed back on the response.
pub fn apply_http_layers(router: Router) -> Router {
    let trace = TraceLayer::new_for_http()
        .make_span_with(|request: &axum::http::Request<_>| {
            let request_id = request
                .headers()
                .get("x-request-id")
                .and_then(|value| value.to_str().ok())
                .unwrap_or("-");
            tracing::info_span!(
                "http.request",
                method = %request.method(),
                path = %request.uri().path(),
                request_id = %request_id
            )
        })
        .on_response(
            DefaultOnResponse::new()
                .level(Level::INFO)
                .latency_unit(LatencyUnit::Millis),
        );

    let request_id_header = HeaderName::from_static("x-request-id");

    router
        .layer(trace)
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
}

// --- Query normalisation ---

/// `max(1, page)`; missing or unparsable input means page 1.
pub fn effective_page(raw: Option<&str>) -> u32 {
    raw.and_then(|value| value.trim().parse::<i64>().ok())
        .unwrap_or(1)
        .clamp(1, i64::from(u32::MAX)) as u32
}

/// `min(max(1, size), 100)`; missing or unparsable input means `default`.
pub fn effective_page_size(raw: Option<&str>, default: u32) -> u32 {
    raw.and_then(|value| value.trim().parse::<i64>().ok())
        .unwrap_or(i64::from(default))
        .clamp(1, i64::from(MAX_PAGE_SIZE)) as u32
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.filter(|value| !value.trim().is_empty())
}

/// Raw query pairs reduced to the first value per key, so `?page=1&page=2`
/// reads as page 1.
fn first_values(pairs: Vec<(String, String)>) -> HashMap<String, String> {
    let mut values = HashMap::new();
    for (key, value) in pairs {
        values.entry(key).or_insert(value);
    }
    values
}

fn query_pairs(
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> ApiResult<HashMap<String, String>> {
    match query {
        Ok(Query(pairs)) => Ok(first_values(pairs)),
        Err(rejection) => {
            tracing::warn!(error = %rejection, "unreadable query string");
            Err(ApiError::new(StatusCode::BAD_REQUEST, "Invalid query string"))
        }
    }
}

/// Raw `/api/users` query. Numbers stay strings so bad input falls back to
/// defaults instead of rejecting the request.
#[derive(Debug, Default)]
pub struct UsersParams {
    pub search: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

impl UsersParams {
    pub fn from_pairs(mut values: HashMap<String, String>) -> Self {
        Self {
            search: values.remove("search"),
            page: values.remove("page"),
            page_size: values.remove("pageSize"),
            sort_by: values.remove("sortBy"),
            sort_order: values.remove("sortOrder"),
        }
    }

    pub fn normalize(self) -> UserQuery {
        UserQuery {
            search: self.search.unwrap_or_default(),
            page: effective_page(self.page.as_deref()),
            page_size: effective_page_size(self.page_size.as_deref(), DEFAULT_USERS_PAGE_SIZE),
            sort_by: non_empty(self.sort_by).unwrap_or_else(|| DEFAULT_USER_SORT.to_string()),
            sort_order: self
                .sort_order
                .as_deref()
                .map(SortOrder::parse_lenient)
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Default)]
pub struct PaymentsParams {
    pub search: Option<String>,
    pub status: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
}

impl PaymentsParams {
    pub fn from_pairs(mut values: HashMap<String, String>) -> Self {
        Self {
            search: values.remove("search"),
            status: values.remove("status"),
            page: values.remove("page"),
            page_size: values.remove("pageSize"),
        }
    }

    pub fn normalize(self) -> PaymentQuery {
        PaymentQuery {
            search: self.search.unwrap_or_default(),
            status: non_empty(self.status).unwrap_or_else(|| "all".to_string()),
            page: effective_page(self.page.as_deref()),
            page_size: effective_page_size(self.page_size.as_deref(), DEFAULT_PAYMENTS_PAGE_SIZE),
        }
    }
}

// --- Auth handlers ---

fn required_password(payload: Option<Json<PasswordRequest>>) -> ApiResult<String> {
    payload
        .and_then(|Json(body)| body.password)
        .filter(|password| !password.is_empty())
        .ok_or_else(|| ApiError::new(StatusCode::BAD_REQUEST, "Password is required"))
}

pub async fn login_handler(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    payload: Option<Json<PasswordRequest>>,
) -> ApiResult<(SignedCookieJar, Json<LoginResponse>)> {
    let password = required_password(payload)?;
    if !state.guard.validate_password(&password) {
        tracing::warn!("admin login rejected");
        return Err(ApiError::new(StatusCode::UNAUTHORIZED, "Invalid password"));
    }

    tracing::info!("admin session established");
    let jar = state.guard.establish_session(jar);
    Ok((jar, Json(LoginResponse { success: true })))
}

/// Re-checks the secret without touching the session (delete confirmation).
pub async fn verify_handler(
    State(state): State<AppState>,
    payload: Option<Json<PasswordRequest>>,
) -> ApiResult<Json<VerifyResponse>> {
    let password = required_password(payload)?;
    if !state.guard.validate_password(&password) {
        return Err(ApiError::new(StatusCode::UNAUTHORIZED, "Invalid password").with_valid(false));
    }
    Ok(Json(VerifyResponse { valid: true }))
}

pub async fn logout_handler(
    State(state): State<AppState>,
    jar: SignedCookieJar,
) -> (SignedCookieJar, Json<LoginResponse>) {
    (state.guard.end_session(jar), Json(LoginResponse { success: true }))
}

pub async fn check_handler(jar: SignedCookieJar) -> Json<AuthStatus> {
    Json(AuthStatus {
        authenticated: is_session_active(&jar),
    })
}

// --- User handlers ---

pub async fn list_users_handler(
    State(state): State<AppState>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> ApiResult<Json<UsersListing>> {
    let query = UsersParams::from_pairs(query_pairs(query)?).normalize();
    state.backend.list_users(&query).await.map(Json).map_err(|err| {
        tracing::error!(error = %err, "failed to fetch users");
        ApiError::upstream(&err, "Failed to fetch users")
    })
}

pub async fn user_count_handler(State(state): State<AppState>) -> ApiResult<Json<UserCount>> {
    let total = state.backend.user_count().await.map_err(|err| {
        tracing::error!(error = %err, "failed to count users");
        ApiError::upstream(&err, "Failed to count users")
    })?;
    Ok(Json(UserCount { total }))
}

pub async fn get_user_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<UserEnvelope>> {
    match state.backend.get_user(&id).await {
        Ok(user) => Ok(Json(UserEnvelope { user })),
        Err(err) if err.is_not_found() => {
            Err(ApiError::new(StatusCode::NOT_FOUND, "User not found"))
        }
        Err(err) => {
            tracing::error!(user_id = %id, error = %err, "failed to fetch user");
            Err(ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch user"))
        }
    }
}

pub async fn delete_user_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteUserResponse>> {
    match state.backend.delete_user(&id).await {
        Ok(result) => {
            tracing::info!(user_id = %id, "user deleted");
            Ok(Json(DeleteUserResponse {
                success: true,
                message: result.message,
            }))
        }
        Err(err) if err.is_not_found() => {
            let message = err.backend_message().unwrap_or("User not found");
            Err(ApiError::new(StatusCode::NOT_FOUND, message))
        }
        Err(err) => {
            tracing::error!(user_id = %id, error = %err, "failed to delete user");
            Err(ApiError::upstream(&err, "Failed to delete user"))
        }
    }
}

pub async fn user_purchases_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<PurchasesListing>> {
    let purchases = state.backend.user_purchases(&id).await.map_err(|err| {
        tracing::error!(user_id = %id, error = %err, "failed to fetch purchase history");
        ApiError::upstream(&err, "Failed to fetch purchase history")
    })?;
    Ok(Json(PurchasesListing { purchases }))
}

// --- Payments and sync ---

pub async fn list_payments_handler(
    State(state): State<AppState>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> ApiResult<Json<PaymentsListing>> {
    let query = PaymentsParams::from_pairs(query_pairs(query)?).normalize();
    state.backend.list_payments(&query).await.map(Json).map_err(|err| {
        tracing::error!(error = %err, "failed to fetch payments");
        ApiError::upstream(&err, "Failed to fetch payments")
    })
}

/// Reads a non-negative integer field that may arrive as a number or a
/// numeric string. Absent or null is `Ok(None)`; anything else is rejected.
fn sync_field(body: &Value, field: &str) -> ApiResult<Option<u64>> {
    let parsed = match body.get(field) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(number)) => number.as_u64(),
        Some(Value::String(text)) => text.trim().parse::<u64>().ok(),
        Some(_) => None,
    };
    parsed
        .map(Some)
        .ok_or_else(|| ApiError::new(StatusCode::BAD_REQUEST, format!("Invalid {field}")))
}

/// One Pokemon sync batch. An empty or non-JSON body, or a zero limit, means
/// 50 from offset 0.
pub async fn sync_pokemon_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<PokemonSyncResponse>> {
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let limit = sync_field(&body, "limit")?
        .filter(|limit| *limit > 0)
        .unwrap_or(DEFAULT_SYNC_LIMIT);
    let offset = sync_field(&body, "offset")?.unwrap_or(0);

    tracing::info!(limit, offset, "pokemon sync batch requested");
    state.backend.sync_pokemon(limit, offset).await.map(Json).map_err(|err| {
        tracing::error!(limit, offset, error = %err, "pokemon sync batch failed");
        ApiError::upstream(&err, "Failed to sync pokemon")
    })
}

pub async fn sync_payments_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<PaymentSyncResponse>> {
    tracing::info!("payment sync requested");
    state.backend.sync_payments().await.map(Json).map_err(|err| {
        tracing::error!(error = %err, "payment sync failed");
        ApiError::upstream(&err, "Sync failed")
    })
}

// --- Misc ---

async fn health_handler() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok".to_string(),
    })
}

async fn openapi_handler() -> Json<utoipa::openapi::OpenApi> {
    Json(openapi::document())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::GatewayError;
    use crate::models::{
        BackendDeleteResponse, GlobalStats, Payment, PokemonSyncBatch, Purchase, UserDetail,
        UserSummary,
    };
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request as HttpRequest};
    use serde_json::{json, Value};
    use std::sync::Mutex;
    use tower::ServiceExt; // For .oneshot() testing

    fn user(id: &str, username: &str) -> UserSummary {
        UserSummary {
            id: id.to_string(),
            username: username.to_string(),
            display_name: None,
            created_at: "2024-01-01T00:00:00Z".to_string(),
            updated_at: "2024-01-01T00:00:00Z".to_string(),
            shields: 0,
            total_shields: 0,
            total_spent: 0.0,
            monthly_spent: 0.0,
            first_purchase_date: None,
            purchase_reset_date: None,
        }
    }

    /// In-memory stand-in for the backend; records what handlers forwarded.
    #[derive(Default)]
    struct FakeBackend {
        users: Mutex<Vec<UserSummary>>,
        user_queries: Mutex<Vec<UserQuery>>,
        payment_queries: Mutex<Vec<PaymentQuery>>,
        sync_calls: Mutex<Vec<(u64, u64)>>,
        payments_down: bool,
    }

    impl FakeBackend {
        fn with_users(users: Vec<UserSummary>) -> Self {
            Self {
                users: Mutex::new(users),
                ..Self::default()
            }
        }
    }

    fn not_found() -> GatewayError {
        GatewayError::Upstream {
            status: 404,
            message: "User not found".to_string(),
            from_body: true,
        }
    }

    #[async_trait]
    impl AdminBackend for FakeBackend {
        async fn list_users(&self, query: &UserQuery) -> Result<UsersListing, GatewayError> {
            self.user_queries.lock().unwrap().push(query.clone());
            let users = self.users.lock().unwrap();
            let matching: Vec<UserSummary> = users
                .iter()
                .filter(|user| user.username.contains(&query.search))
                .cloned()
                .collect();
            let total = matching.len() as u64;
            let start = ((query.page - 1) * query.page_size) as usize;
            let page: Vec<UserSummary> = matching
                .into_iter()
                .skip(start)
                .take(query.page_size as usize)
                .collect();
            Ok(UsersListing {
                users: page,
                total_count: total,
                total_pages: ((total + u64::from(query.page_size) - 1) / u64::from(query.page_size))
                    as u32,
                page: query.page,
                page_size: query.page_size,
                has_next: false,
                has_prev: query.page > 1,
                global_stats: GlobalStats::default(),
            })
        }

        async fn get_user(&self, id: &str) -> Result<UserDetail, GatewayError> {
            let users = self.users.lock().unwrap();
            let found = users.iter().find(|user| user.id == id).ok_or_else(not_found)?;
            Ok(UserDetail {
                id: found.id.clone(),
                username: found.username.clone(),
                display_name: found.display_name.clone(),
                created_at: found.created_at.clone(),
                updated_at: found.updated_at.clone(),
            })
        }

        async fn delete_user(&self, id: &str) -> Result<BackendDeleteResponse, GatewayError> {
            let mut users = self.users.lock().unwrap();
            let before = users.len();
            users.retain(|user| user.id != id);
            if users.len() == before {
                return Err(not_found());
            }
            Ok(BackendDeleteResponse {
                success: true,
                message: "User deleted successfully".to_string(),
                deleted_user_id: Some(id.to_string()),
            })
        }

        async fn user_count(&self) -> Result<u64, GatewayError> {
            Ok(self.users.lock().unwrap().len() as u64)
        }

        async fn user_purchases(&self, _id: &str) -> Result<Vec<Purchase>, GatewayError> {
            Ok(vec![Purchase {
                id: "p1".to_string(),
                quantity: 10,
                amount: 0.0,
                amount_sgd: 9.99,
                currency: Some("SGD".to_string()),
                status: "completed".to_string(),
                created_at: "2024-01-01".to_string(),
                razorpay_order_id: None,
                razorpay_payment_id: Some("pay_123".to_string()),
                shields_purchased: Some(10),
            }])
        }

        async fn list_payments(
            &self,
            query: &PaymentQuery,
        ) -> Result<PaymentsListing, GatewayError> {
            if self.payments_down {
                return Err(GatewayError::Upstream {
                    status: 503,
                    message: "Payments store unavailable".to_string(),
                    from_body: true,
                });
            }
            self.payment_queries.lock().unwrap().push(query.clone());
            Ok(PaymentsListing {
                payments: vec![Payment {
                    id: "pay_1".to_string(),
                    user_id: "1".to_string(),
                    username: "ash".to_string(),
                    quantity: 5,
                    amount_sgd: 4.99,
                    razorpay_order_id: None,
                    razorpay_payment_id: None,
                    status: "completed".to_string(),
                    created_at: "2024-01-01".to_string(),
                }],
                total_count: 1,
                total_pages: 1,
                total_revenue: 4.99,
            })
        }

        async fn sync_pokemon(
            &self,
            limit: u64,
            offset: u64,
        ) -> Result<PokemonSyncResponse, GatewayError> {
            self.sync_calls.lock().unwrap().push((limit, offset));
            Ok(PokemonSyncResponse {
                success: true,
                message: "Synced".to_string(),
                data: Some(PokemonSyncBatch {
                    inserted: limit,
                    updated: 0,
                    total_available: Some(1025),
                }),
            })
        }

        async fn sync_payments(&self) -> Result<PaymentSyncResponse, GatewayError> {
            Err(GatewayError::InvalidUrl("unreachable".to_string()))
        }
    }

    fn app(backend: Arc<FakeBackend>) -> Router {
        create_router(AppState::new(
            backend,
            SessionGuard::new("admin123", false),
            Key::generate(),
        ))
    }

    fn json_request(method: &str, uri: &str, body: Value) -> HttpRequest<Body> {
        HttpRequest::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    fn authed(method: &str, uri: &str, cookie: &str) -> HttpRequest<Body> {
        HttpRequest::builder()
            .method(method)
            .uri(uri)
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .expect("request")
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    /// Logs in and returns the `name=value` pair to send back as a Cookie header.
    async fn login_cookie(app: &Router) -> String {
        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/auth/login", json!({"password": "admin123"})))
            .await
            .expect("login");
        assert_eq!(response.status(), StatusCode::OK);
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .expect("set-cookie");
        set_cookie.split(';').next().expect("cookie pair").to_string()
    }

    #[tokio::test]
    async fn login_with_valid_password_sets_one_session_cookie() {
        let app = app(Arc::new(FakeBackend::default()));
        let response = app
            .oneshot(json_request("POST", "/api/auth/login", json!({"password": "admin123"})))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let cookies: Vec<String> = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|value| value.to_str().unwrap().to_string())
            .collect();
        assert_eq!(cookies.len(), 1);
        let cookie = &cookies[0];
        assert!(cookie.starts_with("admin_authenticated="));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("Max-Age=86400"));
        assert!(!cookie.contains("Secure"));

        assert_eq!(body_json(response).await, json!({"success": true}));
    }

    #[tokio::test]
    async fn login_with_wrong_password_is_unauthorized_without_cookie() {
        let app = app(Arc::new(FakeBackend::default()));
        let response = app
            .oneshot(json_request("POST", "/api/auth/login", json!({"password": "wrong"})))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        assert_eq!(body_json(response).await, json!({"error": "Invalid password"}));
    }

    #[tokio::test]
    async fn login_without_password_is_bad_request() {
        let app = app(Arc::new(FakeBackend::default()));
        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/auth/login", json!({})))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({"error": "Password is required"}));

        let response = app
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri("/api/auth/login")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{invalid"))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn protected_routes_require_session() {
        let app = app(Arc::new(FakeBackend::default()));
        for (method, uri) in [
            ("GET", "/api/users"),
            ("GET", "/api/users/abc/purchases"),
            ("DELETE", "/api/users/abc"),
            ("GET", "/api/payments"),
            ("POST", "/api/pokemon/sync"),
            ("POST", "/api/payments/sync"),
        ] {
            let response = app
                .clone()
                .oneshot(
                    HttpRequest::builder()
                        .method(method)
                        .uri(uri)
                        .body(Body::empty())
                        .expect("request"),
                )
                .await
                .expect("response");
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{method} {uri}");
            assert_eq!(body_json(response).await, json!({"error": "Unauthorized"}));
        }
    }

    #[tokio::test]
    async fn forged_unsigned_cookie_is_rejected() {
        let app = app(Arc::new(FakeBackend::default()));
        let response = app
            .oneshot(authed("GET", "/api/users", "admin_authenticated=true"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn users_query_is_clamped_before_reaching_backend() {
        let backend = Arc::new(FakeBackend::with_users(vec![user("1", "ash")]));
        let app = app(backend.clone());
        let cookie = login_cookie(&app).await;

        let response = app
            .clone()
            .oneshot(authed("GET", "/api/users?page=0&pageSize=500", &cookie))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(authed("GET", "/api/users", &cookie))
            .await
            .expect("response");
        let body = body_json(response).await;
        assert_eq!(body["totalCount"], 1);
        assert_eq!(body["users"][0]["username"], "ash");
        assert!(body["users"][0].get("displayName").is_some());

        let queries = backend.user_queries.lock().unwrap();
        assert_eq!(queries[0].page, 1);
        assert_eq!(queries[0].page_size, 100);
        assert_eq!(queries[1], UserQuery::default());
    }

    #[tokio::test]
    async fn sort_and_search_pass_through() {
        let backend = Arc::new(FakeBackend::default());
        let app = app(backend.clone());
        let cookie = login_cookie(&app).await;

        app.oneshot(authed(
            "GET",
            "/api/users?search=mis&page=3&pageSize=10&sortBy=total_spent&sortOrder=asc",
            &cookie,
        ))
        .await
        .expect("response");

        let queries = backend.user_queries.lock().unwrap();
        assert_eq!(
            queries[0],
            UserQuery {
                search: "mis".to_string(),
                page: 3,
                page_size: 10,
                sort_by: "total_spent".to_string(),
                sort_order: SortOrder::Asc,
            }
        );
    }

    #[tokio::test]
    async fn deleting_missing_user_is_not_found() {
        let app = app(Arc::new(FakeBackend::default()));
        let cookie = login_cookie(&app).await;
        let response = app
            .oneshot(authed("DELETE", "/api/users/abc", &cookie))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await, json!({"error": "User not found"}));
    }

    #[tokio::test]
    async fn deleted_user_is_gone_from_next_listing() {
        let backend = Arc::new(FakeBackend::with_users(vec![
            user("1", "ash"),
            user("2", "misty"),
        ]));
        let app = app(backend);
        let cookie = login_cookie(&app).await;

        let response = app
            .clone()
            .oneshot(authed("DELETE", "/api/users/1", &cookie))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);

        let response = app
            .oneshot(authed("GET", "/api/users", &cookie))
            .await
            .expect("response");
        let body = body_json(response).await;
        let ids: Vec<&str> = body["users"]
            .as_array()
            .unwrap()
            .iter()
            .map(|user| user["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["2"]);
    }

    #[tokio::test]
    async fn get_user_maps_missing_to_not_found() {
        let app = app(Arc::new(FakeBackend::with_users(vec![user("1", "ash")])));
        let cookie = login_cookie(&app).await;

        let response = app
            .clone()
            .oneshot(authed("GET", "/api/users/1", &cookie))
            .await
            .expect("response");
        assert_eq!(body_json(response).await["user"]["username"], "ash");

        let response = app
            .oneshot(authed("GET", "/api/users/nope", &cookie))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await, json!({"error": "User not found"}));
    }

    #[tokio::test]
    async fn count_and_purchases_are_wrapped() {
        let app = app(Arc::new(FakeBackend::with_users(vec![user("1", "ash")])));
        let cookie = login_cookie(&app).await;

        let response = app
            .clone()
            .oneshot(authed("GET", "/api/users/count", &cookie))
            .await
            .expect("response");
        assert_eq!(body_json(response).await, json!({"total": 1}));

        let response = app
            .oneshot(authed("GET", "/api/users/1/purchases", &cookie))
            .await
            .expect("response");
        let body = body_json(response).await;
        assert_eq!(body["purchases"][0]["id"], "p1");
        assert_eq!(body["purchases"][0]["amount_sgd"], 9.99);
    }

    #[tokio::test]
    async fn payments_default_to_fifty_per_page_and_all_statuses() {
        let backend = Arc::new(FakeBackend::default());
        let app = app(backend.clone());
        let cookie = login_cookie(&app).await;

        let response = app
            .oneshot(authed("GET", "/api/payments?page=-4", &cookie))
            .await
            .expect("response");
        let body = body_json(response).await;
        assert_eq!(body["totalRevenue"], 4.99);

        let queries = backend.payment_queries.lock().unwrap();
        assert_eq!(
            queries[0],
            PaymentQuery {
                search: String::new(),
                status: "all".to_string(),
                page: 1,
                page_size: 50,
            }
        );
    }

    #[tokio::test]
    async fn payments_failure_carries_backend_message() {
        let backend = Arc::new(FakeBackend {
            payments_down: true,
            ..FakeBackend::default()
        });
        let app = app(backend);
        let cookie = login_cookie(&app).await;
        let response = app
            .oneshot(authed("GET", "/api/payments", &cookie))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            json!({"error": "Payments store unavailable"})
        );
    }

    #[tokio::test]
    async fn payment_sync_transport_failure_uses_generic_message() {
        let app = app(Arc::new(FakeBackend::default()));
        let cookie = login_cookie(&app).await;
        let response = app
            .oneshot(authed("POST", "/api/payments/sync", &cookie))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await, json!({"error": "Sync failed"}));
    }

    #[tokio::test]
    async fn pokemon_sync_applies_defaults() {
        let backend = Arc::new(FakeBackend::default());
        let app = app(backend.clone());
        let cookie = login_cookie(&app).await;

        let response = app
            .clone()
            .oneshot(authed("POST", "/api/pokemon/sync", &cookie))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["totalAvailable"], 1025);

        let mut request = json_request("POST", "/api/pokemon/sync", json!({"limit": 0, "offset": 100}));
        request
            .headers_mut()
            .insert(header::COOKIE, cookie.parse().unwrap());
        app.oneshot(request).await.expect("response");

        assert_eq!(*backend.sync_calls.lock().unwrap(), vec![(50, 0), (50, 100)]);
    }

    #[tokio::test]
    async fn repeated_query_keys_use_the_first_value() {
        let backend = Arc::new(FakeBackend::default());
        let app = app(backend.clone());
        let cookie = login_cookie(&app).await;

        let response = app
            .clone()
            .oneshot(authed("GET", "/api/users?page=1&page=2&sortOrder=asc&sortOrder=desc", &cookie))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(authed("GET", "/api/payments?status=success&status=failed&page=2&page=9", &cookie))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let users = backend.user_queries.lock().unwrap();
        assert_eq!(users[0].page, 1);
        assert_eq!(users[0].sort_order, SortOrder::Asc);
        let payments = backend.payment_queries.lock().unwrap();
        assert_eq!(payments[0].status, "success");
        assert_eq!(payments[0].page, 2);
    }

    #[tokio::test]
    async fn payment_sync_with_non_json_backend_error_uses_sync_failed() {
        use crate::backend::HttpBackend;
        use std::time::Duration;

        let upstream = Router::new().route(
            "/api/admin/payments/sync",
            post(|| async {
                (
                    StatusCode::BAD_GATEWAY,
                    [(header::CONTENT_TYPE, "text/html")],
                    "<html>Bad Gateway</html>",
                )
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake backend");
        let addr = listener.local_addr().expect("fake backend address");
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, upstream).await;
        });

        let backend = HttpBackend::new(&format!("http://{addr}"), "key", Duration::from_secs(5))
            .expect("backend client");
        let app = create_router(AppState::new(
            Arc::new(backend),
            SessionGuard::new("admin123", false),
            Key::generate(),
        ));
        let cookie = login_cookie(&app).await;
        let response = app
            .oneshot(authed("POST", "/api/payments/sync", &cookie))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await, json!({"error": "Sync failed"}));
        handle.abort();
    }

    fn sync_request(body: Value, cookie: &str) -> HttpRequest<Body> {
        let mut request = json_request("POST", "/api/pokemon/sync", body);
        request
            .headers_mut()
            .insert(header::COOKIE, cookie.parse().unwrap());
        request
    }

    #[tokio::test]
    async fn pokemon_sync_accepts_numeric_strings() {
        let backend = Arc::new(FakeBackend::default());
        let app = app(backend.clone());
        let cookie = login_cookie(&app).await;

        let response = app
            .oneshot(sync_request(json!({"limit": 50, "offset": "100"}), &cookie))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(*backend.sync_calls.lock().unwrap(), vec![(50, 100)]);
    }

    #[tokio::test]
    async fn pokemon_sync_rejects_unusable_fields() {
        let backend = Arc::new(FakeBackend::default());
        let app = app(backend.clone());
        let cookie = login_cookie(&app).await;

        let response = app
            .clone()
            .oneshot(sync_request(json!({"offset": "abc"}), &cookie))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({"error": "Invalid offset"}));

        let response = app
            .oneshot(sync_request(json!({"limit": -5}), &cookie))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({"error": "Invalid limit"}));

        assert!(backend.sync_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn verify_checks_password_without_session() {
        let app = app(Arc::new(FakeBackend::default()));
        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/auth/verify", json!({"password": "admin123"})))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        assert_eq!(body_json(response).await, json!({"valid": true}));

        let response = app
            .oneshot(json_request("POST", "/api/auth/verify", json!({"password": "nope"})))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            body_json(response).await,
            json!({"error": "Invalid password", "valid": false})
        );
    }

    #[tokio::test]
    async fn check_and_logout_follow_the_cookie() {
        let app = app(Arc::new(FakeBackend::default()));

        let response = app
            .clone()
            .oneshot(authed("GET", "/api/auth/check", ""))
            .await
            .expect("response");
        assert_eq!(body_json(response).await, json!({"authenticated": false}));

        let cookie = login_cookie(&app).await;
        let response = app
            .clone()
            .oneshot(authed("GET", "/api/auth/check", &cookie))
            .await
            .expect("response");
        assert_eq!(body_json(response).await, json!({"authenticated": true}));

        let response = app
            .oneshot(authed("POST", "/api/auth/logout", &cookie))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let removal = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .expect("removal cookie")
            .to_string();
        assert!(removal.starts_with("admin_authenticated="));
        assert!(removal.contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn health_and_openapi_are_public() {
        let app = apply_http_layers(app(Arc::new(FakeBackend::default())));
        let response = app
            .clone()
            .oneshot(authed("GET", "/health", ""))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("x-request-id").is_some());

        let response = app
            .oneshot(authed("GET", "/api/openapi.json", ""))
            .await
            .expect("response");
        let doc = body_json(response).await;
        assert!(doc["paths"].get("/api/users").is_some());
        assert!(doc["paths"].get("/api/pokemon/sync").is_some());
    }

    #[test]
    fn page_is_floored_at_one() {
        assert_eq!(effective_page(None), 1);
        assert_eq!(effective_page(Some("0")), 1);
        assert_eq!(effective_page(Some("-3")), 1);
        assert_eq!(effective_page(Some("7")), 7);
        assert_eq!(effective_page(Some("abc")), 1);
    }

    #[test]
    fn page_size_is_clamped_between_one_and_hundred() {
        assert_eq!(effective_page_size(None, 30), 30);
        assert_eq!(effective_page_size(Some("0"), 30), 1);
        assert_eq!(effective_page_size(Some("500"), 30), 100);
        assert_eq!(effective_page_size(Some("100"), 50), 100);
        assert_eq!(effective_page_size(Some("x"), 50), 50);
    }
}
