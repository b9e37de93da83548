use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{bearer, send_empty, send_json, UpstreamClient, UpstreamError};
use crate::domain::account::Account;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub password: String,
}

/// Bearer credential and the account it belongs to.
#[derive(Clone, Debug, Deserialize)]
pub struct SignedIn {
    pub token: String,
    #[serde(alias = "user")]
    pub account: Account,
}

#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn register(&self, registration: &Registration) -> Result<(), UpstreamError>;
    async fn verify_otp(&self, email: &str, otp: &str) -> Result<SignedIn, UpstreamError>;
    async fn login(&self, email: &str, password: &str) -> Result<SignedIn, UpstreamError>;
    async fn current_account(&self, token: &str) -> Result<Account, UpstreamError>;
    async fn request_password_reset(&self, email: &str) -> Result<(), UpstreamError>;
    async fn reset_password(&self, reset_token: &str, password: &str) -> Result<(), UpstreamError>;
}

pub struct HttpAuthApi {
    client: Arc<dyn UpstreamClient>,
}

impl HttpAuthApi {
    pub fn new(client: Arc<dyn UpstreamClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn register(&self, registration: &Registration) -> Result<(), UpstreamError> {
        send_empty(
            self.client
                .http()
                .post(self.client.url("/auth/register"))
                .json(registration),
        )
        .await
    }

    async fn verify_otp(&self, email: &str, otp: &str) -> Result<SignedIn, UpstreamError> {
        send_json(
            self.client
                .http()
                .post(self.client.url("/auth/verify-otp"))
                .json(&serde_json::json!({ "email": email, "otp": otp })),
        )
        .await
    }

    async fn login(&self, email: &str, password: &str) -> Result<SignedIn, UpstreamError> {
        send_json(
            self.client
                .http()
                .post(self.client.url("/auth/login"))
                .json(&serde_json::json!({ "email": email, "password": password })),
        )
        .await
    }

    async fn current_account(&self, token: &str) -> Result<Account, UpstreamError> {
        send_json(bearer(
            self.client.http().get(self.client.url("/auth/me")),
            token,
        ))
        .await
    }

    async fn request_password_reset(&self, email: &str) -> Result<(), UpstreamError> {
        send_empty(
            self.client
                .http()
                .post(self.client.url("/auth/forgot-password"))
                .json(&serde_json::json!({ "email": email })),
        )
        .await
    }

    async fn reset_password(&self, reset_token: &str, password: &str) -> Result<(), UpstreamError> {
        send_empty(
            self.client
                .http()
                .post(self.client.url("/auth/reset-password"))
                .json(&serde_json::json!({ "token": reset_token, "password": password })),
        )
        .await
    }
}
