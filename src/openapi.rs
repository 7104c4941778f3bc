#![allow(dead_code)]

use utoipa::OpenApi;

use crate::models::{
    AuthStatus, DeleteUserResponse, ErrorBody, GlobalStats, HealthStatus, LoginResponse,
    PasswordRequest, Payment, PaymentSyncReport, PaymentSyncResponse, PaymentsListing,
    PokemonSyncBatch, PokemonSyncRequest, PokemonSyncResponse, Purchase, PurchasesListing,
    UserCount, UserDetail, UserEnvelope, UserSummary, UsersListing, VerifyResponse,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health_doc,
        openapi_doc,
        auth_login_doc,
        auth_verify_doc,
        auth_logout_doc,
        auth_check_doc,
        users_list_doc,
        users_count_doc,
        users_get_doc,
        users_delete_doc,
        users_purchases_doc,
        payments_list_doc,
        payments_sync_doc,
        pokemon_sync_doc
    ),
    components(
        schemas(
            HealthStatus,
            ErrorBody,
            PasswordRequest,
            LoginResponse,
            VerifyResponse,
            AuthStatus,
            UserSummary,
            UserDetail,
            UserEnvelope,
            UsersListing,
            GlobalStats,
            UserCount,
            DeleteUserResponse,
            Purchase,
            PurchasesListing,
            Payment,
            PaymentsListing,
            PokemonSyncRequest,
            PokemonSyncBatch,
            PokemonSyncResponse,
            PaymentSyncReport,
            PaymentSyncResponse
        )
    ),
    tags(
        (name = "peekachoo-admin", description = "Peekachoo admin panel API")
    )
)]
pub struct AdminPanelDoc;

pub fn document() -> utoipa::openapi::OpenApi {
    AdminPanelDoc::openapi()
}

#[utoipa::path(get, path = "/health", responses((status = 200, body = HealthStatus)))]
fn health_doc() {}

#[utoipa::path(
    get,
    path = "/api/openapi.json",
    responses((status = 200, description = "This document"))
)]
fn openapi_doc() {}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = PasswordRequest,
    responses(
        (status = 200, body = LoginResponse, description = "Sets the session cookie"),
        (status = 400, body = ErrorBody),
        (status = 401, body = ErrorBody)
    )
)]
fn auth_login_doc() {}

#[utoipa::path(
    post,
    path = "/api/auth/verify",
    request_body = PasswordRequest,
    responses(
        (status = 200, body = VerifyResponse),
        (status = 400, body = ErrorBody),
        (status = 401, body = ErrorBody)
    )
)]
fn auth_verify_doc() {}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses((status = 200, body = LoginResponse, description = "Clears the session cookie"))
)]
fn auth_logout_doc() {}

#[utoipa::path(get, path = "/api/auth/check", responses((status = 200, body = AuthStatus)))]
fn auth_check_doc() {}

#[utoipa::path(
    get,
    path = "/api/users",
    params(
        ("search" = Option<String>, Query, description = "Username or display name filter"),
        ("page" = Option<u32>, Query, description = "1-based page, floored at 1"),
        ("pageSize" = Option<u32>, Query, description = "Defaults to 30, capped at 100"),
        ("sortBy" = Option<String>, Query, description = "Defaults to created_at"),
        ("sortOrder" = Option<String>, Query, description = "asc or desc (default)")
    ),
    responses(
        (status = 200, body = UsersListing),
        (status = 400, body = ErrorBody),
        (status = 401, body = ErrorBody),
        (status = 500, body = ErrorBody)
    )
)]
fn users_list_doc() {}

#[utoipa::path(
    get,
    path = "/api/users/count",
    responses((status = 200, body = UserCount), (status = 401, body = ErrorBody))
)]
fn users_count_doc() {}

#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, body = UserEnvelope),
        (status = 404, body = ErrorBody),
        (status = 500, body = ErrorBody)
    )
)]
fn users_get_doc() {}

#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, body = DeleteUserResponse),
        (status = 404, body = ErrorBody),
        (status = 500, body = ErrorBody)
    )
)]
fn users_delete_doc() {}

#[utoipa::path(
    get,
    path = "/api/users/{id}/purchases",
    params(("id" = String, Path, description = "User id")),
    responses((status = 200, body = PurchasesListing), (status = 500, body = ErrorBody))
)]
fn users_purchases_doc() {}

#[utoipa::path(
    get,
    path = "/api/payments",
    params(
        ("search" = Option<String>, Query, description = "Username or payment id filter"),
        ("status" = Option<String>, Query, description = "Payment status, `all` by default"),
        ("page" = Option<u32>, Query, description = "1-based page, floored at 1"),
        ("pageSize" = Option<u32>, Query, description = "Defaults to 50, capped at 100")
    ),
    responses((status = 200, body = PaymentsListing), (status = 500, body = ErrorBody))
)]
fn payments_list_doc() {}

#[utoipa::path(
    post,
    path = "/api/payments/sync",
    responses((status = 200, body = PaymentSyncResponse), (status = 500, body = ErrorBody))
)]
fn payments_sync_doc() {}

#[utoipa::path(
    post,
    path = "/api/pokemon/sync",
    request_body(
        content = PokemonSyncRequest,
        description = "Defaults: limit 50, offset 0. Numeric strings are accepted"
    ),
    responses(
        (status = 200, body = PokemonSyncResponse),
        (status = 400, body = ErrorBody),
        (status = 500, body = ErrorBody)
    )
)]
fn pokemon_sync_doc() {}
