//! Dashboard view state.
//!
//! Holds everything the admin dashboard renders (auth state, the current user
//! page, sort and search, the two modals, sync status) and the operations that
//! move it. All data comes from [`DashboardApi`]; nothing here is authoritative,
//! so every mutation ends with a full reload of the user list.
//!
//! [`PaymentsView`] is the payments page: search, status filter and paging over
//! the payment log, with revenue totals.

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::client::ClientError;
use crate::models::{
    DeleteUserResponse, Payment, PaymentQuery, PaymentSyncResponse, PaymentsListing, Purchase,
    SortOrder, UserQuery, UserSummary, UsersListing, DEFAULT_PAYMENTS_PAGE_SIZE,
    DEFAULT_USERS_PAGE_SIZE,
};
use crate::sync::{PokemonBatchSource, PokemonSync, SyncProgress};

pub const POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_SORT_KEY: &str = "total_spent";
pub const DELETE_AGREEMENT: &str = "i agree to delete";
pub const ALL_STATUSES: &str = "all";

/// The dashboard routes the view depends on.
#[async_trait]
pub trait DashboardApi: PokemonBatchSource<Error = ClientError> {
    async fn check_session(&self) -> Result<bool, ClientError>;
    async fn login(&mut self, password: &str) -> Result<(), ClientError>;
    async fn logout(&mut self) -> Result<(), ClientError>;
    async fn verify_password(&self, password: &str) -> Result<bool, ClientError>;
    async fn users(&self, query: &UserQuery) -> Result<UsersListing, ClientError>;
    async fn purchases(&self, id: &str) -> Result<Vec<Purchase>, ClientError>;
    async fn delete_user(&self, id: &str) -> Result<DeleteUserResponse, ClientError>;
    async fn payments(&self, query: &PaymentQuery) -> Result<PaymentsListing, ClientError>;
    async fn sync_payments(&self) -> Result<PaymentSyncResponse, ClientError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewState {
    Loading,
    Unauthenticated { error: Option<String> },
    Authenticated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncStatus {
    #[default]
    Idle,
    Syncing,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SyncState {
    pub status: SyncStatus,
    pub message: String,
}

impl SyncState {
    fn finish(&mut self, status: SyncStatus, message: String) {
        self.status = status;
        self.message = message;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteModal {
    pub user_id: String,
    pub username: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PurchasesModal {
    pub user: UserSummary,
    pub purchases: Vec<Purchase>,
}

pub struct DashboardView<C> {
    api: C,
    state: ViewState,
    listing: Option<UsersListing>,
    load_error: Option<String>,
    search: String,
    page: u32,
    sort_by: String,
    sort_order: SortOrder,
    delete_modal: Option<DeleteModal>,
    purchases_modal: Option<PurchasesModal>,
    pokemon_sync: SyncState,
    payment_sync: SyncState,
}

impl<C: DashboardApi> DashboardView<C> {
    pub fn new(api: C) -> Self {
        Self {
            api,
            state: ViewState::Loading,
            listing: None,
            load_error: None,
            search: String::new(),
            page: 1,
            sort_by: DEFAULT_SORT_KEY.to_string(),
            sort_order: SortOrder::Desc,
            delete_modal: None,
            purchases_modal: None,
            pokemon_sync: SyncState::default(),
            payment_sync: SyncState::default(),
        }
    }

    pub fn api(&self) -> &C {
        &self.api
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn is_authenticated(&self) -> bool {
        self.state == ViewState::Authenticated
    }

    pub fn listing(&self) -> Option<&UsersListing> {
        self.listing.as_ref()
    }

    pub fn users(&self) -> &[UserSummary] {
        self.listing.as_ref().map_or(&[], |listing| listing.users.as_slice())
    }

    pub fn total_pages(&self) -> u32 {
        self.listing.as_ref().map_or(0, |listing| listing.total_pages)
    }

    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn search_text(&self) -> &str {
        &self.search
    }

    pub fn sort(&self) -> (&str, SortOrder) {
        (&self.sort_by, self.sort_order)
    }

    pub fn delete_modal(&self) -> Option<&DeleteModal> {
        self.delete_modal.as_ref()
    }

    pub fn purchases_modal(&self) -> Option<&PurchasesModal> {
        self.purchases_modal.as_ref()
    }

    pub fn pokemon_sync(&self) -> &SyncState {
        &self.pokemon_sync
    }

    pub fn payment_sync(&self) -> &SyncState {
        &self.payment_sync
    }

    pub fn current_query(&self) -> UserQuery {
        UserQuery {
            search: self.search.clone(),
            page: self.page,
            page_size: DEFAULT_USERS_PAGE_SIZE,
            sort_by: self.sort_by.clone(),
            sort_order: self.sort_order,
        }
    }

    // --- auth ---

    /// Resolves `Loading`. An unreachable panel reads as signed out.
    pub async fn check_auth(&mut self) {
        match self.api.check_session().await {
            Ok(true) => {
                self.state = ViewState::Authenticated;
                self.reload().await;
            }
            Ok(false) => self.state = ViewState::Unauthenticated { error: None },
            Err(err) => {
                tracing::warn!(error = %err, "session check failed");
                self.state = ViewState::Unauthenticated { error: None };
            }
        }
    }

    pub async fn login(&mut self, password: &str) {
        match self.api.login(password).await {
            Ok(()) => {
                self.state = ViewState::Authenticated;
                self.reload().await;
            }
            Err(ClientError::Api { message, .. }) => {
                let error = if message.is_empty() {
                    "Login failed".to_string()
                } else {
                    message
                };
                self.state = ViewState::Unauthenticated { error: Some(error) };
            }
            Err(err) => {
                tracing::warn!(error = %err, "login request failed");
                self.state = ViewState::Unauthenticated {
                    error: Some("Failed to connect to server".to_string()),
                };
            }
        }
    }

    pub async fn logout(&mut self) {
        if let Err(err) = self.api.logout().await {
            tracing::warn!(error = %err, "logout request failed");
        }
        self.state = ViewState::Unauthenticated { error: None };
        self.listing = None;
        self.load_error = None;
        self.search.clear();
        self.page = 1;
        self.delete_modal = None;
        self.purchases_modal = None;
    }

    // --- user list ---

    /// Refetch the current page. A 401 signs the view out; other failures keep
    /// the previous page and record the error.
    pub async fn reload(&mut self) {
        let query = self.current_query();
        match self.api.users(&query).await {
            Ok(listing) => {
                self.listing = Some(listing);
                self.load_error = None;
            }
            Err(err) if err.is_unauthorized() => {
                self.state = ViewState::Unauthenticated { error: None };
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to fetch users");
                self.load_error = Some(err.to_string());
            }
        }
    }

    pub async fn search(&mut self, text: &str) {
        self.search = text.to_string();
        self.page = 1;
        self.reload().await;
    }

    /// Returns false (and does nothing) for pages outside `1..=total_pages`.
    pub async fn go_to_page(&mut self, page: u32) -> bool {
        if page < 1 || page > self.total_pages() {
            return false;
        }
        self.page = page;
        self.reload().await;
        true
    }

    pub async fn request_sort(&mut self, key: &str) {
        self.sort_order = if self.sort_by == key && self.sort_order == SortOrder::Asc {
            SortOrder::Desc
        } else {
            SortOrder::Asc
        };
        self.sort_by = key.to_string();
        self.reload().await;
    }

    /// Reload on every tick while signed in; stops on `shutdown` or sign-out.
    /// `on_refresh` sees the view after each reload.
    pub async fn poll<F>(&mut self, period: Duration, shutdown: &CancellationToken, mut on_refresh: F)
    where
        F: FnMut(&Self),
    {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        while self.is_authenticated() {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.reload().await;
                    on_refresh(self);
                }
            }
        }
    }

    // --- purchases modal ---

    pub async fn show_purchases(&mut self, user: UserSummary) {
        let purchases = match self.api.purchases(&user.id).await {
            Ok(purchases) => purchases,
            Err(err) => {
                tracing::warn!(user_id = %user.id, error = %err, "failed to fetch purchases");
                Vec::new()
            }
        };
        self.purchases_modal = Some(PurchasesModal { user, purchases });
    }

    pub fn close_purchases(&mut self) {
        self.purchases_modal = None;
    }

    // --- delete modal ---

    pub fn open_delete(&mut self, user_id: impl Into<String>, username: impl Into<String>) {
        self.delete_modal = Some(DeleteModal {
            user_id: user_id.into(),
            username: username.into(),
            error: None,
        });
    }

    pub fn cancel_delete(&mut self) {
        self.delete_modal = None;
    }

    /// Second confirmation before deletion: the admin password again plus the
    /// typed agreement phrase. Returns true once the user is gone.
    pub async fn confirm_delete(&mut self, password: &str, agreement: &str) -> bool {
        let Some(user_id) = self.delete_modal.as_ref().map(|modal| modal.user_id.clone()) else {
            return false;
        };

        if password.is_empty() {
            return self.reject_delete("Please enter the admin password".to_string());
        }
        if agreement.to_lowercase() != DELETE_AGREEMENT {
            return self.reject_delete("Please type \"I agree to delete\" to confirm".to_string());
        }

        match self.api.verify_password(password).await {
            Ok(true) => {}
            Ok(false) => return self.reject_delete("Invalid admin password".to_string()),
            Err(err) => return self.reject_delete(delete_failure(err)),
        }

        match self.api.delete_user(&user_id).await {
            Ok(_) => {
                tracing::info!(user_id = %user_id, "user deleted from dashboard");
                self.delete_modal = None;
                self.reload().await;
                true
            }
            Err(err) => self.reject_delete(delete_failure(err)),
        }
    }

    fn reject_delete(&mut self, error: String) -> bool {
        if let Some(modal) = self.delete_modal.as_mut() {
            modal.error = Some(error);
        }
        false
    }

    // --- sync ---

    /// Full Pokemon catalog sync. `on_progress` sees each batch label as the
    /// view records it. Exclusive access (`&mut self`) keeps runs from overlapping.
    pub async fn sync_pokemon<F>(&mut self, cancel: &CancellationToken, mut on_progress: F)
    where
        F: FnMut(&SyncProgress) + Send,
    {
        self.pokemon_sync = SyncState {
            status: SyncStatus::Syncing,
            message: "Starting sync...".to_string(),
        };

        let message = &mut self.pokemon_sync.message;
        let result = PokemonSync::default()
            .run(
                &self.api,
                |progress| {
                    *message = progress.to_string();
                    on_progress(progress);
                },
                cancel,
            )
            .await;

        match result {
            Ok(outcome) => self
                .pokemon_sync
                .finish(SyncStatus::Success, outcome.to_string()),
            Err(err) => self
                .pokemon_sync
                .finish(SyncStatus::Error, format!("Sync failed: {err}")),
        }
        self.reload().await;
    }

    pub async fn sync_payments(&mut self) {
        self.payment_sync = SyncState {
            status: SyncStatus::Syncing,
            message: "Syncing payments from Razorpay...".to_string(),
        };

        match self.api.sync_payments().await {
            Ok(response) => {
                self.payment_sync
                    .finish(SyncStatus::Success, response.results.summary());
                self.reload().await;
            }
            Err(err) => self
                .payment_sync
                .finish(SyncStatus::Error, format!("Sync failed: {err}")),
        }
    }
}

pub struct PaymentsView<C> {
    api: C,
    state: ViewState,
    listing: Option<PaymentsListing>,
    load_error: Option<String>,
    search: String,
    status: String,
    page: u32,
}

impl<C: DashboardApi> PaymentsView<C> {
    pub fn new(api: C) -> Self {
        Self {
            api,
            state: ViewState::Loading,
            listing: None,
            load_error: None,
            search: String::new(),
            status: ALL_STATUSES.to_string(),
            page: 1,
        }
    }

    /// Initial filters, applied by the first load.
    pub fn with_search(mut self, text: impl Into<String>) -> Self {
        self.search = text.into();
        self
    }

    pub fn with_status(mut self, status: &str) -> Self {
        self.status = status_filter(status);
        self
    }

    pub fn at_page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    pub fn api(&self) -> &C {
        &self.api
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn is_authenticated(&self) -> bool {
        self.state == ViewState::Authenticated
    }

    pub fn listing(&self) -> Option<&PaymentsListing> {
        self.listing.as_ref()
    }

    pub fn payments(&self) -> &[Payment] {
        self.listing.as_ref().map_or(&[], |listing| listing.payments.as_slice())
    }

    pub fn total_pages(&self) -> u32 {
        self.listing.as_ref().map_or(0, |listing| listing.total_pages)
    }

    pub fn total_count(&self) -> u64 {
        self.listing.as_ref().map_or(0, |listing| listing.total_count)
    }

    pub fn total_revenue(&self) -> f64 {
        self.listing.as_ref().map_or(0.0, |listing| listing.total_revenue)
    }

    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn search_text(&self) -> &str {
        &self.search
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn current_query(&self) -> PaymentQuery {
        PaymentQuery {
            search: self.search.clone(),
            status: self.status.clone(),
            page: self.page,
            page_size: DEFAULT_PAYMENTS_PAGE_SIZE,
        }
    }

    /// Resolves `Loading` and loads the first page when signed in.
    pub async fn check_auth(&mut self) {
        match self.api.check_session().await {
            Ok(true) => {
                self.state = ViewState::Authenticated;
                self.reload().await;
            }
            Ok(false) => self.state = ViewState::Unauthenticated { error: None },
            Err(err) => {
                tracing::warn!(error = %err, "session check failed");
                self.state = ViewState::Unauthenticated { error: None };
            }
        }
    }

    /// Same failure handling as the user list: 401 signs out, anything else
    /// keeps the previous page.
    pub async fn reload(&mut self) {
        let query = self.current_query();
        match self.api.payments(&query).await {
            Ok(listing) => {
                self.listing = Some(listing);
                self.load_error = None;
            }
            Err(err) if err.is_unauthorized() => {
                self.state = ViewState::Unauthenticated { error: None };
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to fetch payments");
                self.load_error = Some(err.to_string());
            }
        }
    }

    pub async fn search(&mut self, text: &str) {
        self.search = text.to_string();
        self.page = 1;
        self.reload().await;
    }

    /// `all` or a payment status such as `success`; blank means `all`.
    pub async fn filter_status(&mut self, status: &str) {
        self.status = status_filter(status);
        self.page = 1;
        self.reload().await;
    }

    /// Returns false (and does nothing) for pages outside `1..=total_pages`.
    pub async fn go_to_page(&mut self, page: u32) -> bool {
        if page < 1 || page > self.total_pages() {
            return false;
        }
        self.page = page;
        self.reload().await;
        true
    }
}

fn status_filter(raw: &str) -> String {
    let status = raw.trim();
    if status.is_empty() {
        ALL_STATUSES.to_string()
    } else {
        status.to_lowercase()
    }
}

fn delete_failure(err: ClientError) -> String {
    match err {
        ClientError::Api { message, .. } if !message.is_empty() => message,
        other => {
            tracing::warn!(error = %other, "delete request failed");
            "Failed to delete user".to_string()
        }
    }
}
