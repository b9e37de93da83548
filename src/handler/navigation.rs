use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;

use crate::{
    error::{Notice, PortalError},
    handler::{finish, SESSION_COOKIE},
    service::navigation::Navigation,
    state::AppState,
};

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NavigateQuery {
    /// SPA path about to be shown, e.g. `/matrimony/abc`.
    pub path: String,
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/navigate", get(navigate))
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/api/v1/navigate",
    params(NavigateQuery),
    responses(
        (status = 200, description = "Render, redirect or interstitial for the path", body = Navigation),
        (status = 401, description = "Session expired", body = Notice)
    ),
    tag = "navigation"
)]
pub async fn navigate(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(query): Query<NavigateQuery>,
) -> Result<Json<Navigation>, PortalError> {
    let open = match jar.get(SESSION_COOKIE) {
        Some(cookie) => state.sessions().open(cookie.value()).await?,
        None => None,
    };

    let Some(mut open) = open else {
        return state
            .navigation()
            .navigate(None, &query.path)
            .await
            .map(Json);
    };
    let result = state
        .navigation()
        .navigate(Some(&mut open.session), &query.path)
        .await;
    finish(open, result).await.map(Json)
}
