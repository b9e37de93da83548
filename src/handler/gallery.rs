use axum::{extract::State, routing::get, Json, Router};
use std::sync::Arc;

use crate::{
    error::{Notice, PortalError},
    state::AppState,
    upstream::gallery::GalleryAlbum,
};

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/gallery", get(list_albums))
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/api/v1/gallery",
    responses(
        (status = 200, description = "Event albums, newest first", body = [GalleryAlbum]),
        (status = 503, description = "Upstream unavailable", body = Notice)
    ),
    tag = "gallery"
)]
pub async fn list_albums(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<GalleryAlbum>>, PortalError> {
    let mut albums = state.gallery().list().await?;
    albums.sort_by(|a, b| b.event_date.cmp(&a.event_date));
    Ok(Json(albums))
}
