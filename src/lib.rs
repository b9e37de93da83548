pub mod config;
pub mod domain;
pub mod error;
pub mod handler;
pub mod openapi;
pub mod service;
pub mod state;
pub mod upstream;

use axum::Router;
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{openapi::ApiDoc, state::AppState};

/// Every route of the portal API, without transport layers.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(handler::health::routes())
        .merge(handler::auth::routes(state.clone()))
        .merge(handler::session::routes(state.clone()))
        .merge(handler::navigation::routes(state.clone()))
        .merge(handler::matrimony::routes(state.clone()))
        .merge(handler::checkout::routes(state.clone()))
        .merge(handler::admin::routes(state.clone()))
        .merge(handler::gallery::routes(state))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
