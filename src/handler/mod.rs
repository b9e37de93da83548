pub mod admin;
pub mod auth;
pub mod checkout;
pub mod gallery;
pub mod health;
pub mod matrimony;
pub mod navigation;
pub mod session;

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use cookie::time::Duration;

use crate::{
    error::PortalError,
    service::session::OpenSession,
    state::AppState,
};

pub const SESSION_COOKIE: &str = "sid";

pub(crate) fn session_cookie(state: &AppState, session_id: String) -> Cookie<'static> {
    let values = state.config().values();
    let mut cookie = Cookie::new(SESSION_COOKIE, session_id);
    cookie.set_http_only(true);
    cookie.set_path("/");
    cookie.set_same_site(SameSite::Lax);
    cookie.set_max_age(Duration::seconds(
        i64::try_from(values.session_ttl_seconds).unwrap_or(i64::MAX),
    ));
    if values.cookie_secure {
        cookie.set_secure(true);
    }
    if let Some(domain) = &values.cookie_domain {
        cookie.set_domain(domain.to_string());
    }
    cookie
}

pub(crate) fn cleared_cookie(state: &AppState) -> Cookie<'static> {
    let mut cookie = session_cookie(state, String::new());
    cookie.set_max_age(Duration::seconds(0));
    cookie
}

/// Loads the caller's session under its lock.
pub(crate) async fn open_session(
    state: &AppState,
    jar: &CookieJar,
) -> Result<OpenSession, PortalError> {
    let Some(cookie) = jar.get(SESSION_COOKIE) else {
        return Err(PortalError::Unauthenticated);
    };
    state
        .sessions()
        .open(cookie.value())
        .await?
        .ok_or(PortalError::Unauthenticated)
}

/// Persists whatever the operation changed. A rejected credential ends the
/// session instead.
pub(crate) async fn finish<T>(
    open: OpenSession,
    result: Result<T, PortalError>,
) -> Result<T, PortalError> {
    let stored = match &result {
        Err(PortalError::SessionInvalid) => open.end().await,
        _ => open.save().await,
    };
    match (result, stored) {
        (result, Ok(())) => result,
        (Ok(_), Err(err)) => Err(err.into()),
        (Err(err), Err(store_err)) => {
            tracing::error!(error = %store_err, "session write failed after error");
            Err(err)
        }
    }
}
