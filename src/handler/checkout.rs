use axum::{extract::State, routing::{get, post}, Json, Router};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::{
    domain::checkout::{PaymentReceipt, PurchaseTarget},
    error::{Notice, PortalError},
    handler::{finish, open_session, session::SessionResponse},
    service::checkout::CheckoutStatus,
    state::AppState,
};

#[derive(Deserialize, ToSchema)]
pub struct GatewayFailureRequest {
    /// Provider's description of the failure, for the logs.
    #[serde(default)]
    pub reason: String,
}

#[derive(Serialize, ToSchema)]
pub struct CheckoutCompleted {
    pub settled: PurchaseTarget,
    pub session: Option<SessionResponse>,
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/checkout", get(status).post(begin))
        .route("/api/v1/checkout/complete", post(complete))
        .route("/api/v1/checkout/cancel", post(cancel))
        .route("/api/v1/checkout/failure", post(gateway_failed))
        .route("/api/v1/checkout/widget-error", post(widget_failed))
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/api/v1/checkout",
    responses(
        (status = 200, description = "Current checkout phase", body = CheckoutStatus)
    ),
    tag = "checkout"
)]
pub async fn status(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<Json<CheckoutStatus>, PortalError> {
    let mut open = open_session(&state, &jar).await?;
    let result = state.checkout().status(&mut open.session).await;
    finish(open, result).await.map(Json)
}

#[utoipa::path(
    post,
    path = "/api/v1/checkout",
    request_body = PurchaseTarget,
    responses(
        (status = 200, description = "Order created; open the gateway widget", body = CheckoutStatus),
        (status = 402, description = "Order could not be created", body = Notice),
        (status = 409, description = "A payment is already in progress or nothing is due", body = Notice)
    ),
    tag = "checkout"
)]
pub async fn begin(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(target): Json<PurchaseTarget>,
) -> Result<Json<CheckoutStatus>, PortalError> {
    let mut open = open_session(&state, &jar).await?;
    let result = state.checkout().begin(&mut open.session, target).await;
    finish(open, result).await.map(Json)
}

#[utoipa::path(
    post,
    path = "/api/v1/checkout/complete",
    request_body = PaymentReceipt,
    responses(
        (status = 200, description = "Payment verified", body = CheckoutCompleted),
        (status = 402, description = "Verification failed", body = Notice),
        (status = 409, description = "No gateway was open for this order", body = Notice)
    ),
    tag = "checkout"
)]
pub async fn complete(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(receipt): Json<PaymentReceipt>,
) -> Result<Json<CheckoutCompleted>, PortalError> {
    let mut open = open_session(&state, &jar).await?;
    let result = state
        .checkout()
        .complete(&mut open.session, receipt)
        .await
        .map(|settled| CheckoutCompleted {
            settled,
            session: SessionResponse::from_session(&open.session),
        });
    finish(open, result).await.map(Json)
}

#[utoipa::path(
    post,
    path = "/api/v1/checkout/cancel",
    responses(
        (status = 200, description = "Gateway dismissed; back to idle", body = CheckoutStatus)
    ),
    tag = "checkout"
)]
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<Json<CheckoutStatus>, PortalError> {
    let mut open = open_session(&state, &jar).await?;
    let result = state.checkout().cancel(&mut open.session).await;
    finish(open, result).await.map(Json)
}

#[utoipa::path(
    post,
    path = "/api/v1/checkout/failure",
    request_body = GatewayFailureRequest,
    responses(
        (status = 200, description = "Failure recorded; status carries the notice", body = CheckoutStatus)
    ),
    tag = "checkout"
)]
pub async fn gateway_failed(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(payload): Json<GatewayFailureRequest>,
) -> Result<Json<CheckoutStatus>, PortalError> {
    let mut open = open_session(&state, &jar).await?;
    let result = state
        .checkout()
        .gateway_failed(&mut open.session, payload.reason)
        .await;
    finish(open, result).await.map(Json)
}

#[utoipa::path(
    post,
    path = "/api/v1/checkout/widget-error",
    responses(
        (status = 200, description = "Widget failure recorded; status carries the notice", body = CheckoutStatus)
    ),
    tag = "checkout"
)]
pub async fn widget_failed(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<Json<CheckoutStatus>, PortalError> {
    let mut open = open_session(&state, &jar).await?;
    let result = state.checkout().widget_failed(&mut open.session).await;
    finish(open, result).await.map(Json)
}
