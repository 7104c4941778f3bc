//! Wire shapes for the admin panel.
//!
//! Two families live here:
//! - `Backend*` structs mirror what the backend's `/api/admin` endpoints return
//!   (snake_case fields, nested `data` envelopes, optional counters).
//! - Dashboard shapes are what our own routes serve to the dashboard client
//!   (camelCase, counters defaulted to zero).
//!
//! Purchases, payments and sync results are passed through unchanged, so the
//! same struct serves both sides for those.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// --- Backend shapes ---

#[derive(Deserialize, Debug, Clone)]
pub struct BackendUser {
    pub id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub shields: Option<i64>,
    pub total_shields_purchased: Option<i64>,
    pub total_spent: Option<f64>,
    pub monthly_spent: Option<f64>,
    pub first_purchase_date: Option<String>,
    pub purchase_reset_date: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct BackendUsersPage {
    pub users: Vec<BackendUser>,
    #[serde(rename = "globalStats")]
    pub global_stats: Option<GlobalStats>,
    #[serde(default)]
    pub pagination: Pagination,
}

/// `{ success, data, error? }` envelope used by the user endpoints.
#[derive(Deserialize, Debug, Clone)]
pub struct BackendEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    pub data: T,
}

#[derive(Deserialize, Debug, Clone)]
pub struct BackendCount {
    pub total: u64,
}

#[derive(Deserialize, Debug, Clone)]
pub struct BackendDeleteResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(rename = "deletedUserId", default)]
    pub deleted_user_id: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct BackendPurchases {
    #[serde(default)]
    pub purchases: Vec<Purchase>,
}

// --- Shared shapes ---

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct Pagination {
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GlobalStats {
    #[serde(default)]
    pub total_shields: i64,
    #[serde(default)]
    pub total_revenue: f64,
}

/// One row of a user's purchase history (backend shape, passed through).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct Purchase {
    pub id: String,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub amount_sgd: f64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub razorpay_order_id: Option<String>,
    #[serde(default)]
    pub razorpay_payment_id: Option<String>,
    #[serde(default)]
    pub shields_purchased: Option<i64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct Payment {
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub amount_sgd: f64,
    #[serde(default)]
    pub razorpay_order_id: Option<String>,
    #[serde(default)]
    pub razorpay_payment_id: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub created_at: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentsListing {
    #[serde(default)]
    pub payments: Vec<Payment>,
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub total_revenue: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PokemonSyncBatch {
    #[serde(default)]
    pub inserted: u64,
    #[serde(default)]
    pub updated: u64,
    #[serde(default)]
    pub total_available: Option<u64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, ToSchema)]
pub struct PokemonSyncResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<PokemonSyncBatch>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSyncReport {
    #[serde(default)]
    pub fetched: u64,
    #[serde(default)]
    pub created: u64,
    #[serde(default)]
    pub updated: u64,
    #[serde(default)]
    pub skipped: u64,
    #[serde(default)]
    pub users_recalculated: u64,
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub errors: Vec<serde_json::Value>,
}

impl PaymentSyncReport {
    /// Human summary shown once a payment sync finishes.
    pub fn summary(&self) -> String {
        let mut text = format!(
            "Sync complete! Fetched: {}, Created: {}, Updated: {}, Skipped: {}, Users recalculated: {}",
            self.fetched, self.created, self.updated, self.skipped, self.users_recalculated
        );
        if !self.errors.is_empty() {
            text.push_str(&format!(", Errors: {}", self.errors.len()));
        }
        text
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, ToSchema)]
pub struct PaymentSyncResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub results: PaymentSyncReport,
}

// --- Dashboard shapes ---

/// A user row as the dashboard renders it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub shields: i64,
    pub total_shields: i64,
    pub total_spent: f64,
    pub monthly_spent: f64,
    pub first_purchase_date: Option<String>,
    pub purchase_reset_date: Option<String>,
}

impl From<BackendUser> for UserSummary {
    fn from(user: BackendUser) -> Self {
        Self {
            id: user.id,
            username: user.username,
            display_name: user.display_name,
            created_at: user.created_at,
            updated_at: user.updated_at,
            shields: user.shields.unwrap_or(0),
            total_shields: user.total_shields_purchased.unwrap_or(0),
            total_spent: user.total_spent.unwrap_or(0.0),
            monthly_spent: user.monthly_spent.unwrap_or(0.0),
            first_purchase_date: user.first_purchase_date,
            purchase_reset_date: user.purchase_reset_date,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserDetail {
    pub id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<BackendUser> for UserDetail {
    fn from(user: BackendUser) -> Self {
        Self {
            id: user.id,
            username: user.username,
            display_name: user.display_name,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UsersListing {
    pub users: Vec<UserSummary>,
    pub total_count: u64,
    pub total_pages: u32,
    pub page: u32,
    pub page_size: u32,
    pub has_next: bool,
    pub has_prev: bool,
    pub global_stats: GlobalStats,
}

impl From<BackendUsersPage> for UsersListing {
    fn from(page: BackendUsersPage) -> Self {
        Self {
            users: page.users.into_iter().map(UserSummary::from).collect(),
            total_count: page.pagination.total,
            total_pages: page.pagination.total_pages,
            page: page.pagination.page,
            page_size: page.pagination.page_size,
            has_next: page.pagination.has_next,
            has_prev: page.pagination.has_prev,
            global_stats: page.global_stats.unwrap_or_default(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct UserEnvelope {
    pub user: UserDetail,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, ToSchema)]
pub struct PurchasesListing {
    pub purchases: Vec<Purchase>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct UserCount {
    pub total: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct DeleteUserResponse {
    pub success: bool,
    pub message: String,
}

// --- Auth payloads ---

/// Body of login and verify requests. `password` is optional so a missing
/// field becomes a 400 with a readable message rather than a rejection.
#[derive(Serialize, Deserialize, Debug, Clone, Default, ToSchema)]
pub struct PasswordRequest {
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct LoginResponse {
    pub success: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct VerifyResponse {
    pub valid: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct AuthStatus {
    pub authenticated: bool,
}

/// Uniform failure body: `{"error": "..."}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, ToSchema)]
pub struct PokemonSyncRequest {
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: Option<u64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct HealthStatus {
    pub status: String,
}

// --- Queries ---

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }

    /// Lenient parse: anything but `asc` sorts descending.
    pub fn parse_lenient(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("asc") {
            SortOrder::Asc
        } else {
            SortOrder::Desc
        }
    }
}

pub const DEFAULT_USERS_PAGE_SIZE: u32 = 30;
pub const DEFAULT_PAYMENTS_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 100;
pub const DEFAULT_USER_SORT: &str = "created_at";

/// User listing parameters, already normalised.
#[derive(Debug, Clone, PartialEq)]
pub struct UserQuery {
    pub search: String,
    pub page: u32,
    pub page_size: u32,
    pub sort_by: String,
    pub sort_order: SortOrder,
}

impl Default for UserQuery {
    fn default() -> Self {
        Self {
            search: String::new(),
            page: 1,
            page_size: DEFAULT_USERS_PAGE_SIZE,
            sort_by: DEFAULT_USER_SORT.to_string(),
            sort_order: SortOrder::Desc,
        }
    }
}

impl UserQuery {
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("search", self.search.clone()),
            ("page", self.page.to_string()),
            ("pageSize", self.page_size.to_string()),
            ("sortBy", self.sort_by.clone()),
            ("sortOrder", self.sort_order.as_str().to_string()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentQuery {
    pub search: String,
    pub status: String,
    pub page: u32,
    pub page_size: u32,
}

impl Default for PaymentQuery {
    fn default() -> Self {
        Self {
            search: String::new(),
            status: "all".to_string(),
            page: 1,
            page_size: DEFAULT_PAYMENTS_PAGE_SIZE,
        }
    }
}

impl PaymentQuery {
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("search", self.search.clone()),
            ("status", self.status.clone()),
            ("page", self.page.to_string()),
            ("pageSize", self.page_size.to_string()),
        ]
    }
}
