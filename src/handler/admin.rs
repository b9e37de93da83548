use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use crate::{
    domain::account::Account,
    error::{Notice, PortalError},
    handler::{finish, matrimony::ProfileResponse, open_session},
    service::admin::{AccountAction, BulkAction, BulkOutcome},
    state::AppState,
    upstream::accounts::AccountFilter,
};

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AccountQuery {
    pub status: Option<AccountFilter>,
}

#[derive(Deserialize, ToSchema)]
pub struct SuspendRequest {
    pub reason: String,
}

#[derive(Deserialize, ToSchema)]
pub struct BulkRequest {
    pub action: BulkAction,
    pub account_ids: Vec<String>,
}

#[derive(Serialize, ToSchema)]
pub struct AccountActionResponse {
    /// Absent when the account was rejected and removed.
    pub account: Option<Account>,
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/admin/users", get(list_accounts))
        .route(
            "/api/v1/admin/users/:id/actions/:action",
            post(apply_account_action),
        )
        .route("/api/v1/admin/users/:id/suspend", post(suspend_account))
        .route("/api/v1/admin/bulk", post(bulk_accounts))
        .route("/api/v1/admin/matrimony", get(list_profiles))
        .route(
            "/api/v1/admin/matrimony/:id/complete",
            post(mark_completed),
        )
        .route(
            "/api/v1/admin/matrimony/:id/toggle-hidden",
            post(toggle_profile_hidden),
        )
        .route(
            "/api/v1/admin/matrimony/:id",
            axum::routing::delete(delete_profile),
        )
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/users",
    params(AccountQuery),
    responses(
        (status = 200, description = "Accounts", body = [Account]),
        (status = 403, description = "Admins only", body = Notice)
    ),
    tag = "admin"
)]
pub async fn list_accounts(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(query): Query<AccountQuery>,
) -> Result<Json<Vec<Account>>, PortalError> {
    let mut open = open_session(&state, &jar).await?;
    let result = state.admin().list_accounts(&mut open.session, query.status).await;
    finish(open, result).await.map(Json)
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/users/{id}/actions/{action}",
    params(
        ("id" = String, Path, description = "Account id"),
        ("action" = AccountAction, Path, description = "approve, reject, unsuspend, grant_admin or mark_member")
    ),
    responses(
        (status = 200, description = "Action applied", body = AccountActionResponse),
        (status = 403, description = "Admins only", body = Notice)
    ),
    tag = "admin"
)]
pub async fn apply_account_action(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path((id, action)): Path<(String, AccountAction)>,
) -> Result<Json<AccountActionResponse>, PortalError> {
    let mut open = open_session(&state, &jar).await?;
    let result = state.admin().apply(&mut open.session, &id, action).await;
    finish(open, result)
        .await
        .map(|account| Json(AccountActionResponse { account }))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/users/{id}/suspend",
    params(("id" = String, Path, description = "Account id")),
    request_body = SuspendRequest,
    responses(
        (status = 200, description = "Suspended", body = Account),
        (status = 422, description = "Reason missing", body = Notice)
    ),
    tag = "admin"
)]
pub async fn suspend_account(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(id): Path<String>,
    Json(payload): Json<SuspendRequest>,
) -> Result<Json<Account>, PortalError> {
    let mut open = open_session(&state, &jar).await?;
    let result = state
        .admin()
        .suspend(&mut open.session, &id, &payload.reason)
        .await;
    finish(open, result).await.map(Json)
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/bulk",
    request_body = BulkRequest,
    responses(
        (status = 200, description = "Aggregate result", body = BulkOutcome)
    ),
    tag = "admin"
)]
pub async fn bulk_accounts(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(payload): Json<BulkRequest>,
) -> Result<Json<BulkOutcome>, PortalError> {
    let mut open = open_session(&state, &jar).await?;
    let result = state
        .admin()
        .bulk(&mut open.session, &payload.account_ids, payload.action)
        .await;
    finish(open, result).await.map(Json)
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/matrimony",
    responses(
        (status = 200, description = "Every profile, listed or not", body = [ProfileResponse])
    ),
    tag = "admin"
)]
pub async fn list_profiles(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<Json<Vec<ProfileResponse>>, PortalError> {
    let mut open = open_session(&state, &jar).await?;
    let result = state.admin().list_profiles(&mut open.session).await;
    let profiles = finish(open, result).await?;
    Ok(Json(profiles.into_iter().map(ProfileResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/matrimony/{id}/complete",
    params(("id" = String, Path, description = "Profile id")),
    responses(
        (status = 200, description = "Hidden and scheduled for deletion", body = ProfileResponse),
        (status = 409, description = "Profile is not active or hidden", body = Notice)
    ),
    tag = "admin"
)]
pub async fn mark_completed(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(id): Path<String>,
) -> Result<Json<ProfileResponse>, PortalError> {
    let mut open = open_session(&state, &jar).await?;
    let result = state.admin().mark_completed(&mut open.session, &id).await;
    finish(open, result).await.map(|p| Json(p.into()))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/matrimony/{id}/toggle-hidden",
    params(("id" = String, Path, description = "Profile id")),
    responses(
        (status = 200, description = "Visibility flipped", body = ProfileResponse),
        (status = 409, description = "Profile cannot change visibility in its state", body = Notice)
    ),
    tag = "admin"
)]
pub async fn toggle_profile_hidden(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(id): Path<String>,
) -> Result<Json<ProfileResponse>, PortalError> {
    let mut open = open_session(&state, &jar).await?;
    let result = state.admin().toggle_hidden(&mut open.session, &id).await;
    finish(open, result).await.map(|p| Json(p.into()))
}

#[utoipa::path(
    delete,
    path = "/api/v1/admin/matrimony/{id}",
    params(("id" = String, Path, description = "Profile id")),
    responses(
        (status = 204, description = "Deleted")
    ),
    tag = "admin"
)]
pub async fn delete_profile(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(id): Path<String>,
) -> Result<StatusCode, PortalError> {
    let mut open = open_session(&state, &jar).await?;
    let result = state.admin().delete_profile(&mut open.session, &id).await;
    finish(open, result).await.map(|()| StatusCode::NO_CONTENT)
}
