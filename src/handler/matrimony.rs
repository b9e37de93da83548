use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::{
    domain::{
        profile::{
            MatrimonyProfile, PaymentStatus, Photo, ProfileChanges, ProfileDetails, ProfileFilter,
            ProfileState,
        },
        wizard::{FieldError, ProfileDraft, WizardStep},
    },
    error::{Notice, PortalError},
    handler::{finish, open_session, SESSION_COOKIE},
    state::AppState,
    upstream::media::SignedUpload,
};

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub id: String,
    pub owner_id: String,
    #[serde(flatten)]
    pub details: ProfileDetails,
    pub photos: Vec<Photo>,
    pub state: ProfileState,
    pub payment: PaymentStatus,
    pub is_hidden: bool,
    pub is_publicly_listed: bool,
    pub scheduled_deletion: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<MatrimonyProfile> for ProfileResponse {
    fn from(profile: MatrimonyProfile) -> Self {
        Self {
            state: profile.state(),
            is_publicly_listed: profile.is_publicly_listed(),
            id: profile.id,
            owner_id: profile.owner_id,
            details: profile.details,
            photos: profile.photos.into(),
            payment: profile.payment,
            is_hidden: profile.is_hidden,
            scheduled_deletion: profile.scheduled_deletion,
            created_at: profile.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileListResponse {
    pub items: Vec<ProfileResponse>,
    pub page: u32,
    pub total_pages: u32,
    pub total: u64,
}

#[derive(Deserialize, ToSchema)]
pub struct DraftCheckRequest {
    /// Step to check; the whole draft when absent.
    pub step: Option<WizardStep>,
    pub draft: ProfileDraft,
}

#[derive(Serialize, ToSchema)]
pub struct DraftCheckResponse {
    pub valid: bool,
    #[schema(value_type = Vec<Object>)]
    pub errors: Vec<FieldError>,
    pub next_step: Option<WizardStep>,
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/matrimony", get(list_profiles).post(create_profile))
        .route(
            "/api/v1/matrimony/:id",
            get(get_profile).patch(update_profile).delete(delete_profile),
        )
        .route("/api/v1/matrimony/:id/toggle-hidden", post(toggle_hidden))
        .route("/api/v1/matrimony/:id/photos", post(add_photo))
        .route(
            "/api/v1/matrimony/:id/photos/:storage_id",
            axum::routing::delete(remove_photo),
        )
        .route(
            "/api/v1/matrimony/:id/photos/:storage_id/primary",
            post(set_primary_photo),
        )
        .route("/api/v1/me/matrimony", get(list_mine))
        .route("/api/v1/matrimony-drafts/check", post(check_draft))
        .route("/api/v1/media/upload-signature", get(upload_signature))
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/api/v1/matrimony",
    params(ProfileFilter),
    responses(
        (status = 200, description = "Publicly listed profiles", body = ProfileListResponse),
        (status = 403, description = "Membership or paid profile required", body = Notice)
    ),
    tag = "matrimony"
)]
pub async fn list_profiles(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(filter): Query<ProfileFilter>,
) -> Result<Json<ProfileListResponse>, PortalError> {
    let mut open = open_session(&state, &jar).await?;
    let result = state.matrimony().list(&mut open.session, &filter).await;
    let page = finish(open, result).await?;
    Ok(Json(ProfileListResponse {
        items: page.items.into_iter().map(ProfileResponse::from).collect(),
        page: page.page,
        total_pages: page.total_pages,
        total: page.total,
    }))
}

#[utoipa::path(
    post,
    path = "/api/v1/matrimony",
    request_body = ProfileDraft,
    responses(
        (status = 201, description = "Submitted; pending payment or active", body = ProfileResponse),
        (status = 403, description = "Not entitled to create a profile", body = Notice),
        (status = 422, description = "Draft incomplete", body = Notice)
    ),
    tag = "matrimony"
)]
pub async fn create_profile(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(draft): Json<ProfileDraft>,
) -> Result<(StatusCode, Json<ProfileResponse>), PortalError> {
    let mut open = open_session(&state, &jar).await?;
    let result = state.matrimony().create(&mut open.session, &draft).await;
    let profile = finish(open, result).await?;
    Ok((StatusCode::CREATED, Json(profile.into())))
}

#[utoipa::path(
    get,
    path = "/api/v1/matrimony/{id}",
    params(("id" = String, Path, description = "Profile id")),
    responses(
        (status = 200, description = "Profile", body = ProfileResponse),
        (status = 404, description = "Not found; go back to the listing", body = Notice),
        (status = 409, description = "Superseded by a newer navigation", body = Notice)
    ),
    tag = "matrimony"
)]
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(id): Path<String>,
) -> Result<Json<ProfileResponse>, PortalError> {
    let Some(cookie) = jar.get(SESSION_COOKIE) else {
        return Err(PortalError::Unauthenticated);
    };
    let profile = state
        .matrimony()
        .view(state.sessions(), cookie.value(), &id)
        .await?;
    Ok(Json(profile.into()))
}

#[utoipa::path(
    patch,
    path = "/api/v1/matrimony/{id}",
    params(("id" = String, Path, description = "Profile id")),
    request_body = ProfileChanges,
    responses(
        (status = 200, description = "Updated", body = ProfileResponse),
        (status = 403, description = "Not the owner; go back to the listing", body = Notice),
        (status = 409, description = "Profile can no longer be edited", body = Notice)
    ),
    tag = "matrimony"
)]
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(id): Path<String>,
    Json(changes): Json<ProfileChanges>,
) -> Result<Json<ProfileResponse>, PortalError> {
    let mut open = open_session(&state, &jar).await?;
    let result = state.matrimony().update(&mut open.session, &id, changes).await;
    finish(open, result).await.map(|p| Json(p.into()))
}

#[utoipa::path(
    delete,
    path = "/api/v1/matrimony/{id}",
    params(("id" = String, Path, description = "Profile id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the owner", body = Notice)
    ),
    tag = "matrimony"
)]
pub async fn delete_profile(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(id): Path<String>,
) -> Result<StatusCode, PortalError> {
    let mut open = open_session(&state, &jar).await?;
    let result = state.matrimony().delete(&mut open.session, &id).await;
    finish(open, result).await.map(|()| StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/v1/matrimony/{id}/toggle-hidden",
    params(("id" = String, Path, description = "Profile id")),
    responses(
        (status = 200, description = "Visibility flipped", body = ProfileResponse),
        (status = 409, description = "Not allowed in the current state", body = Notice)
    ),
    tag = "matrimony"
)]
pub async fn toggle_hidden(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(id): Path<String>,
) -> Result<Json<ProfileResponse>, PortalError> {
    let mut open = open_session(&state, &jar).await?;
    let result = state.matrimony().toggle_hidden(&mut open.session, &id).await;
    finish(open, result).await.map(|p| Json(p.into()))
}

#[utoipa::path(
    post,
    path = "/api/v1/matrimony/{id}/photos",
    params(("id" = String, Path, description = "Profile id")),
    request_body = Photo,
    responses(
        (status = 200, description = "Photo attached", body = ProfileResponse),
        (status = 400, description = "Photo limit reached or duplicate", body = Notice)
    ),
    tag = "matrimony"
)]
pub async fn add_photo(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(id): Path<String>,
    Json(photo): Json<Photo>,
) -> Result<Json<ProfileResponse>, PortalError> {
    let mut open = open_session(&state, &jar).await?;
    let result = state.matrimony().add_photo(&mut open.session, &id, photo).await;
    finish(open, result).await.map(|p| Json(p.into()))
}

#[utoipa::path(
    delete,
    path = "/api/v1/matrimony/{id}/photos/{storage_id}",
    params(
        ("id" = String, Path, description = "Profile id"),
        ("storage_id" = String, Path, description = "Media host id of the photo")
    ),
    responses(
        (status = 200, description = "Photo removed", body = ProfileResponse),
        (status = 422, description = "The last photo cannot be removed", body = Notice)
    ),
    tag = "matrimony"
)]
pub async fn remove_photo(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path((id, storage_id)): Path<(String, String)>,
) -> Result<Json<ProfileResponse>, PortalError> {
    let mut open = open_session(&state, &jar).await?;
    let result = state
        .matrimony()
        .remove_photo(&mut open.session, &id, &storage_id)
        .await;
    finish(open, result).await.map(|p| Json(p.into()))
}

#[utoipa::path(
    post,
    path = "/api/v1/matrimony/{id}/photos/{storage_id}/primary",
    params(
        ("id" = String, Path, description = "Profile id"),
        ("storage_id" = String, Path, description = "Media host id of the photo")
    ),
    responses(
        (status = 200, description = "Primary photo changed", body = ProfileResponse)
    ),
    tag = "matrimony"
)]
pub async fn set_primary_photo(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path((id, storage_id)): Path<(String, String)>,
) -> Result<Json<ProfileResponse>, PortalError> {
    let mut open = open_session(&state, &jar).await?;
    let result = state
        .matrimony()
        .set_primary_photo(&mut open.session, &id, &storage_id)
        .await;
    finish(open, result).await.map(|p| Json(p.into()))
}

#[utoipa::path(
    get,
    path = "/api/v1/me/matrimony",
    responses(
        (status = 200, description = "Profiles owned by the caller", body = [ProfileResponse])
    ),
    tag = "matrimony"
)]
pub async fn list_mine(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<Json<Vec<ProfileResponse>>, PortalError> {
    let mut open = open_session(&state, &jar).await?;
    let result = state.matrimony().list_mine(&mut open.session).await;
    let profiles = finish(open, result).await?;
    Ok(Json(profiles.into_iter().map(ProfileResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/api/v1/matrimony-drafts/check",
    request_body = DraftCheckRequest,
    responses(
        (status = 200, description = "Field errors for the step or whole draft", body = DraftCheckResponse)
    ),
    tag = "matrimony"
)]
pub async fn check_draft(Json(payload): Json<DraftCheckRequest>) -> Json<DraftCheckResponse> {
    let today = Utc::now().date_naive();
    let (errors, next_step) = match payload.step {
        Some(step) => {
            let errors = payload.draft.validate_step(step, today);
            let next = if errors.is_empty() { step.next() } else { Some(step) };
            (errors, next)
        }
        None => (
            payload.draft.validate(today).err().unwrap_or_default(),
            payload.draft.first_incomplete_step(today),
        ),
    };
    Json(DraftCheckResponse {
        valid: errors.is_empty(),
        errors,
        next_step,
    })
}

#[utoipa::path(
    get,
    path = "/api/v1/media/upload-signature",
    responses(
        (status = 200, description = "Signed parameters for a direct photo upload", body = SignedUpload)
    ),
    tag = "media"
)]
pub async fn upload_signature(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<Json<SignedUpload>, PortalError> {
    let mut open = open_session(&state, &jar).await?;
    let result = state.matrimony().upload_signature(&mut open.session).await;
    finish(open, result).await.map(Json)
}
