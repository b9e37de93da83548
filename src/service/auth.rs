use async_trait::async_trait;
use std::sync::Arc;

use crate::{
    domain::{portal::PortalSession, wizard::FieldError},
    error::PortalError,
    service::refresh_snapshots,
    upstream::{
        auth::{AuthApi, Registration, SignedIn},
        matrimony::MatrimonyApi,
        UpstreamError,
    },
};

const MIN_PASSWORD_LEN: usize = 8;

#[async_trait]
pub trait AuthService: Send + Sync {
    async fn register(&self, registration: Registration) -> Result<(), PortalError>;
    /// Confirms the emailed code and signs the account in.
    async fn verify_otp(&self, email: &str, otp: &str) -> Result<PortalSession, PortalError>;
    async fn login(&self, email: &str, password: &str) -> Result<PortalSession, PortalError>;
    /// Reloads the account and owned-profile snapshots from upstream.
    async fn refresh(&self, session: &mut PortalSession) -> Result<(), PortalError>;
    async fn request_password_reset(&self, email: &str) -> Result<(), PortalError>;
    async fn reset_password(&self, reset_token: &str, password: &str) -> Result<(), PortalError>;
}

pub struct AuthServiceImpl {
    auth_api: Arc<dyn AuthApi>,
    matrimony_api: Arc<dyn MatrimonyApi>,
}

impl AuthServiceImpl {
    pub fn new(auth_api: Arc<dyn AuthApi>, matrimony_api: Arc<dyn MatrimonyApi>) -> Self {
        Self {
            auth_api,
            matrimony_api,
        }
    }

    fn normalize_email(email: &str) -> Result<String, PortalError> {
        let normalized = email.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(PortalError::Validation(vec![FieldError::new("email", "required")]));
        }
        if !normalized.contains('@') {
            return Err(PortalError::Validation(vec![FieldError::new("email", "invalid")]));
        }
        Ok(normalized)
    }

    fn check_password(password: &str) -> Result<(), PortalError> {
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(PortalError::Validation(vec![FieldError::new(
                "password",
                "too_short",
            )]));
        }
        Ok(())
    }

    /// On the sign-in endpoints 401 and 403 describe the credentials, not a session.
    fn sign_in_error(err: UpstreamError) -> PortalError {
        match err {
            UpstreamError::SessionInvalid => {
                PortalError::Rejected("invalid email or password".to_string())
            }
            UpstreamError::Forbidden => {
                PortalError::Rejected("email verification required".to_string())
            }
            other => other.into(),
        }
    }

    async fn start_session(&self, signed_in: SignedIn) -> Result<PortalSession, PortalError> {
        let mut session = PortalSession::signed_in(signed_in.token, signed_in.account);
        refresh_snapshots(
            self.auth_api.as_ref(),
            self.matrimony_api.as_ref(),
            &mut session,
        )
        .await?;
        if let Some(account) = session.account() {
            tracing::info!(account_id = %account.id, "portal session started");
        }
        Ok(session)
    }
}

#[async_trait]
impl AuthService for AuthServiceImpl {
    async fn register(&self, mut registration: Registration) -> Result<(), PortalError> {
        let mut errors = Vec::new();
        if registration.name.trim().is_empty() {
            errors.push(FieldError::new("name", "required"));
        }
        match Self::normalize_email(&registration.email) {
            Ok(email) => registration.email = email,
            Err(PortalError::Validation(mut fields)) => errors.append(&mut fields),
            Err(err) => return Err(err),
        }
        if let Err(PortalError::Validation(mut fields)) = Self::check_password(&registration.password) {
            errors.append(&mut fields);
        }
        if !errors.is_empty() {
            return Err(PortalError::Validation(errors));
        }
        registration.name = registration.name.trim().to_string();
        registration.phone = registration
            .phone
            .map(|phone| phone.trim().to_string())
            .filter(|phone| !phone.is_empty());

        self.auth_api.register(&registration).await?;
        Ok(())
    }

    async fn verify_otp(&self, email: &str, otp: &str) -> Result<PortalSession, PortalError> {
        let email = Self::normalize_email(email)?;
        let otp = otp.trim();
        if otp.is_empty() {
            return Err(PortalError::Validation(vec![FieldError::new("otp", "required")]));
        }
        let signed_in = self
            .auth_api
            .verify_otp(&email, otp)
            .await
            .map_err(Self::sign_in_error)?;
        self.start_session(signed_in).await
    }

    async fn login(&self, email: &str, password: &str) -> Result<PortalSession, PortalError> {
        let email = Self::normalize_email(email)?;
        if password.is_empty() {
            return Err(PortalError::Validation(vec![FieldError::new(
                "password", "required",
            )]));
        }
        let signed_in = self
            .auth_api
            .login(&email, password)
            .await
            .map_err(Self::sign_in_error)?;
        self.start_session(signed_in).await
    }

    async fn refresh(&self, session: &mut PortalSession) -> Result<(), PortalError> {
        refresh_snapshots(
            self.auth_api.as_ref(),
            self.matrimony_api.as_ref(),
            session,
        )
        .await
    }

    async fn request_password_reset(&self, email: &str) -> Result<(), PortalError> {
        let email = Self::normalize_email(email)?;
        match self.auth_api.request_password_reset(&email).await {
            // Unknown addresses look the same as known ones to the caller.
            Ok(()) | Err(UpstreamError::NotFound) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn reset_password(&self, reset_token: &str, password: &str) -> Result<(), PortalError> {
        if reset_token.trim().is_empty() {
            return Err(PortalError::Validation(vec![FieldError::new("token", "required")]));
        }
        Self::check_password(password)?;
        self.auth_api
            .reset_password(reset_token.trim(), password)
            .await
            .map_err(|err| match err {
                UpstreamError::SessionInvalid | UpstreamError::NotFound => {
                    PortalError::Rejected("reset link is invalid or has expired".to_string())
                }
                other => other.into(),
            })
    }
}
