use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::{
    domain::{
        checkout::{CheckoutError, CheckoutFailure},
        gate::{LOGIN_PATH, MEMBERSHIP_PATH},
        lifecycle::LifecycleError,
        wizard::FieldError,
    },
    service::session::SessionError,
    upstream::UpstreamError,
};

pub const LISTING_PATH: &str = "/matrimony";

/// Every failure a handler can report. Each variant renders as a [`Notice`].
#[derive(Debug, Error)]
pub enum PortalError {
    #[error("please correct the highlighted fields")]
    Validation(Vec<FieldError>),
    #[error("please sign in to continue")]
    Unauthenticated,
    #[error("your session has expired, please sign in again")]
    SessionInvalid,
    #[error("you do not have access to this action")]
    Forbidden,
    #[error("your account is suspended")]
    Suspended,
    #[error("your account is awaiting approval")]
    PendingApproval,
    #[error("a membership or a paid profile is required to browse listings")]
    MembershipRequired,
    #[error("this profile belongs to someone else")]
    NotOwner,
    #[error("the requested item was not found")]
    NotFound { redirect: &'static str },
    #[error("{0}")]
    Lifecycle(LifecycleError),
    #[error("{0}")]
    Checkout(#[from] CheckoutError),
    #[error("{}", .0.message())]
    Payment(CheckoutFailure),
    #[error("{0}")]
    Rejected(String),
    #[error("this view was replaced by a newer request")]
    Superseded,
    #[error("the service is temporarily unavailable, please retry")]
    Unavailable,
    #[error("internal error")]
    Internal(String),
}

#[derive(Serialize, ToSchema)]
pub struct Notice {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    #[schema(value_type = Vec<Object>)]
    pub fields: Vec<FieldError>,
    pub retryable: bool,
}

impl PortalError {
    pub fn code(&self) -> &'static str {
        match self {
            PortalError::Validation(_) => "validation_failed",
            PortalError::Unauthenticated => "unauthenticated",
            PortalError::SessionInvalid => "session_expired",
            PortalError::Forbidden => "access_denied",
            PortalError::Suspended => "account_suspended",
            PortalError::PendingApproval => "awaiting_approval",
            PortalError::MembershipRequired => "membership_required",
            PortalError::NotOwner => "not_owner",
            PortalError::NotFound { .. } => "not_found",
            PortalError::Lifecycle(LifecycleError::Invalid(_)) => "validation_failed",
            PortalError::Lifecycle(LifecycleError::NotEntitled) => "not_entitled",
            PortalError::Lifecycle(LifecycleError::AdminOnly(_)) => "access_denied",
            PortalError::Lifecycle(LifecycleError::Photos(_)) => "invalid_photos",
            PortalError::Lifecycle(LifecycleError::NotAllowed { .. }) => "invalid_transition",
            PortalError::Checkout(CheckoutError::Busy) => "payment_in_progress",
            PortalError::Checkout(CheckoutError::AlreadySettled) => "already_paid",
            PortalError::Checkout(_) => "payment_not_applicable",
            PortalError::Payment(failure) => failure.code(),
            PortalError::Rejected(_) => "rejected",
            PortalError::Superseded => "superseded",
            PortalError::Unavailable => "service_unavailable",
            PortalError::Internal(_) => "internal_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            PortalError::Validation(_) | PortalError::Lifecycle(LifecycleError::Invalid(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            PortalError::Unauthenticated | PortalError::SessionInvalid => StatusCode::UNAUTHORIZED,
            PortalError::Forbidden
            | PortalError::Suspended
            | PortalError::PendingApproval
            | PortalError::MembershipRequired
            | PortalError::NotOwner
            | PortalError::Lifecycle(LifecycleError::NotEntitled)
            | PortalError::Lifecycle(LifecycleError::AdminOnly(_)) => StatusCode::FORBIDDEN,
            PortalError::NotFound { .. } => StatusCode::NOT_FOUND,
            PortalError::Lifecycle(LifecycleError::Photos(_)) | PortalError::Rejected(_) => {
                StatusCode::BAD_REQUEST
            }
            PortalError::Lifecycle(LifecycleError::NotAllowed { .. })
            | PortalError::Checkout(_)
            | PortalError::Superseded => StatusCode::CONFLICT,
            PortalError::Payment(_) => StatusCode::PAYMENT_REQUIRED,
            PortalError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            PortalError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn redirect(&self) -> Option<&'static str> {
        match self {
            PortalError::Unauthenticated | PortalError::SessionInvalid => Some(LOGIN_PATH),
            PortalError::NotOwner => Some(LISTING_PATH),
            PortalError::MembershipRequired => Some(MEMBERSHIP_PATH),
            PortalError::NotFound { redirect } => Some(redirect),
            _ => None,
        }
    }

    fn retryable(&self) -> bool {
        matches!(
            self,
            PortalError::Payment(_)
                | PortalError::Unavailable
                | PortalError::Superseded
                | PortalError::Checkout(CheckoutError::Busy)
        )
    }

    /// Not-found on a profile resource sends the user back to the listing.
    pub fn profile_not_found(err: UpstreamError) -> Self {
        match err {
            UpstreamError::NotFound => PortalError::NotFound {
                redirect: LISTING_PATH,
            },
            other => other.into(),
        }
    }
}

impl From<UpstreamError> for PortalError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::SessionInvalid => PortalError::SessionInvalid,
            UpstreamError::Forbidden => PortalError::Forbidden,
            UpstreamError::NotFound => PortalError::NotFound { redirect: "/" },
            UpstreamError::Rejected(message) => PortalError::Rejected(message),
            UpstreamError::Server(status) => {
                tracing::warn!(status, "upstream server error");
                PortalError::Unavailable
            }
            UpstreamError::Network(message) => {
                tracing::warn!(%message, "upstream unreachable");
                PortalError::Unavailable
            }
            UpstreamError::Decode(message) => PortalError::Internal(message),
        }
    }
}

impl From<LifecycleError> for PortalError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::Invalid(fields) => PortalError::Validation(fields),
            other => PortalError::Lifecycle(other),
        }
    }
}

impl From<SessionError> for PortalError {
    fn from(err: SessionError) -> Self {
        PortalError::Internal(err.to_string())
    }
}

impl IntoResponse for PortalError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let PortalError::Internal(detail) = &self {
            tracing::error!(%detail, "request failed");
        }

        let fields = match &self {
            PortalError::Validation(fields) => fields.clone(),
            _ => Vec::new(),
        };
        let notice = Notice {
            code: self.code().to_string(),
            message: self.to_string(),
            redirect: self.redirect().map(str::to_string),
            fields,
            retryable: self.retryable(),
        };

        let mut response = (status, Json(notice)).into_response();
        if matches!(self, PortalError::SessionInvalid) {
            if let Ok(value) = "sid=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax".parse() {
                response.headers_mut().insert(header::SET_COOKIE, value);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{lifecycle::ProfileAction, profile::ProfileState};

    #[test]
    fn upstream_errors_translate_to_notices() {
        assert!(matches!(
            PortalError::from(UpstreamError::SessionInvalid),
            PortalError::SessionInvalid
        ));
        assert!(matches!(
            PortalError::from(UpstreamError::Server(503)),
            PortalError::Unavailable
        ));
        assert!(matches!(
            PortalError::profile_not_found(UpstreamError::NotFound),
            PortalError::NotFound {
                redirect: LISTING_PATH
            }
        ));
    }

    #[test]
    fn status_and_redirects() {
        let err = PortalError::SessionInvalid;
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.redirect(), Some(LOGIN_PATH));

        let err = PortalError::NotOwner;
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(err.redirect(), Some(LISTING_PATH));

        let err = PortalError::from(LifecycleError::NotAllowed {
            action: ProfileAction::Hide,
            state: ProfileState::PendingPayment,
        });
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.code(), "invalid_transition");

        let err = PortalError::Payment(CheckoutFailure::VerificationFailed);
        assert_eq!(err.code(), "payment_verification_failed");
        assert!(err.retryable());
    }

    #[test]
    fn session_invalid_clears_cookie() {
        let response = PortalError::SessionInvalid.into_response();
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        assert!(cookie.starts_with("sid=;"));
    }
}
