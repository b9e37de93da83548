use axum::{extract::State, routing::get, Json, Router};
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::{
    domain::{account::Account, entitlement::Entitlement, portal::PortalSession},
    error::{Notice, PortalError},
    handler::{finish, open_session},
    state::AppState,
};

#[derive(Serialize, ToSchema)]
pub struct SessionResponse {
    pub account: Account,
    pub entitlement: Entitlement,
    pub owned_profiles: usize,
    pub checkout_busy: bool,
}

impl SessionResponse {
    pub(crate) fn from_session(session: &PortalSession) -> Option<Self> {
        Some(Self {
            account: session.account()?.clone(),
            entitlement: session.entitlement()?,
            owned_profiles: session.owned_profiles().map_or(0, <[_]>::len),
            checkout_busy: session.checkout.is_busy(),
        })
    }
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/me", get(me))
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/api/v1/me",
    responses(
        (status = 200, description = "Current account and entitlements", body = SessionResponse),
        (status = 401, description = "Not signed in or session expired", body = Notice)
    ),
    tag = "session"
)]
pub async fn me(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<Json<SessionResponse>, PortalError> {
    let mut open = open_session(&state, &jar).await?;
    let result = state.auth().refresh(&mut open.session).await.and_then(|()| {
        SessionResponse::from_session(&open.session).ok_or(PortalError::Unauthenticated)
    });
    finish(open, result).await.map(Json)
}
