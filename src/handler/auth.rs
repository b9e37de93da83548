use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::{
    domain::portal::PortalSession,
    error::{Notice, PortalError},
    handler::{cleared_cookie, session::SessionResponse, session_cookie, SESSION_COOKIE},
    state::AppState,
    upstream::auth::Registration,
};

#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct RegisterResponse {
    pub email: String,
    pub otp_required: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub otp: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/auth/register", post(register))
        .route("/api/v1/auth/verify-otp", post(verify_otp))
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/auth/logout", post(logout))
        .route("/api/v1/auth/forgot-password", post(forgot_password))
        .route("/api/v1/auth/reset-password", post(reset_password))
        .with_state(state)
}

/// Stores a freshly signed-in session and hands the browser its cookie.
async fn signed_in(state: &AppState, session: PortalSession) -> Response {
    let session_id = match state.sessions().create(&session).await {
        Ok(session_id) => session_id,
        Err(err) => return PortalError::from(err).into_response(),
    };
    let Some(response) = SessionResponse::from_session(&session) else {
        return PortalError::Internal("signed-in session without account".to_string())
            .into_response();
    };
    let jar = CookieJar::new().add(session_cookie(state, session_id));
    (StatusCode::OK, jar, Json(response)).into_response()
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered, OTP sent", body = RegisterResponse),
        (status = 422, description = "Invalid payload", body = Notice)
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Response {
    let registration = Registration {
        name: payload.name,
        email: payload.email,
        phone: payload.phone,
        password: payload.password,
    };
    let email = registration.email.trim().to_lowercase();
    if let Err(err) = state.auth().register(registration).await {
        return err.into_response();
    }

    let response = RegisterResponse {
        email,
        otp_required: true,
    };
    (StatusCode::CREATED, Json(response)).into_response()
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/verify-otp",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Verified and signed in", body = SessionResponse),
        (status = 400, description = "Wrong or expired code", body = Notice)
    ),
    tag = "auth"
)]
pub async fn verify_otp(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<VerifyOtpRequest>,
) -> Response {
    match state.auth().verify_otp(&payload.email, &payload.otp).await {
        Ok(session) => signed_in(&state, session).await,
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = SessionResponse),
        (status = 400, description = "Invalid credentials", body = Notice),
        (status = 422, description = "Invalid payload", body = Notice)
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Response {
    match state.auth().login(&payload.email, &payload.password).await {
        Ok(session) => signed_in(&state, session).await,
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    responses(
        (status = 204, description = "Logged out"),
        (status = 500, description = "Session delete failed", body = Notice)
    ),
    tag = "auth"
)]
pub async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let Some(cookie) = jar.get(SESSION_COOKIE) else {
        return StatusCode::NO_CONTENT.into_response();
    };
    if let Err(err) = state.sessions().delete(cookie.value()).await {
        return PortalError::from(err).into_response();
    }
    let jar = jar.add(cleared_cookie(&state));
    (StatusCode::NO_CONTENT, jar).into_response()
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 202, description = "Reset email requested"),
        (status = 422, description = "Invalid email", body = Notice)
    ),
    tag = "auth"
)]
pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Response {
    match state.auth().request_password_reset(&payload.email).await {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 204, description = "Password changed"),
        (status = 400, description = "Reset link invalid or expired", body = Notice)
    ),
    tag = "auth"
)]
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Response {
    match state
        .auth()
        .reset_password(&payload.token, &payload.password)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}
