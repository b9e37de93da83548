use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use super::{bearer, send_empty, send_json, UpstreamClient, UpstreamError};
use crate::domain::account::Account;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AccountFilter {
    Pending,
    Approved,
    Suspended,
}

impl AccountFilter {
    fn as_query(self) -> &'static str {
        match self {
            AccountFilter::Pending => "pending",
            AccountFilter::Approved => "approved",
            AccountFilter::Suspended => "suspended",
        }
    }
}

#[async_trait]
pub trait AccountsApi: Send + Sync {
    async fn list(
        &self,
        token: &str,
        filter: Option<AccountFilter>,
    ) -> Result<Vec<Account>, UpstreamError>;
    async fn approve(&self, token: &str, account_id: &str) -> Result<Account, UpstreamError>;
    async fn reject(&self, token: &str, account_id: &str) -> Result<(), UpstreamError>;
    async fn suspend(
        &self,
        token: &str,
        account_id: &str,
        reason: &str,
    ) -> Result<Account, UpstreamError>;
    async fn unsuspend(&self, token: &str, account_id: &str) -> Result<Account, UpstreamError>;
    async fn grant_admin(&self, token: &str, account_id: &str) -> Result<Account, UpstreamError>;
    async fn mark_member(&self, token: &str, account_id: &str) -> Result<Account, UpstreamError>;
}

pub struct HttpAccountsApi {
    client: Arc<dyn UpstreamClient>,
}

impl HttpAccountsApi {
    pub fn new(client: Arc<dyn UpstreamClient>) -> Self {
        Self { client }
    }

    fn action_url(&self, account_id: &str, action: &str) -> String {
        self.client.url(&format!(
            "/admin/users/{}/{}",
            urlencoding::encode(account_id),
            action
        ))
    }

    async fn patch_account(
        &self,
        token: &str,
        account_id: &str,
        action: &str,
        body: serde_json::Value,
    ) -> Result<Account, UpstreamError> {
        send_json(bearer(
            self.client
                .http()
                .patch(self.action_url(account_id, action))
                .json(&body),
            token,
        ))
        .await
    }
}

#[async_trait]
impl AccountsApi for HttpAccountsApi {
    async fn list(
        &self,
        token: &str,
        filter: Option<AccountFilter>,
    ) -> Result<Vec<Account>, UpstreamError> {
        let mut url = self.client.url("/admin/users");
        if let Some(filter) = filter {
            url.push_str("?status=");
            url.push_str(filter.as_query());
        }
        send_json(bearer(self.client.http().get(url), token)).await
    }

    async fn approve(&self, token: &str, account_id: &str) -> Result<Account, UpstreamError> {
        self.patch_account(token, account_id, "approve", serde_json::json!({}))
            .await
    }

    async fn reject(&self, token: &str, account_id: &str) -> Result<(), UpstreamError> {
        send_empty(bearer(
            self.client
                .http()
                .patch(self.action_url(account_id, "reject")),
            token,
        ))
        .await
    }

    async fn suspend(
        &self,
        token: &str,
        account_id: &str,
        reason: &str,
    ) -> Result<Account, UpstreamError> {
        self.patch_account(
            token,
            account_id,
            "suspend",
            serde_json::json!({ "reason": reason }),
        )
        .await
    }

    async fn unsuspend(&self, token: &str, account_id: &str) -> Result<Account, UpstreamError> {
        self.patch_account(token, account_id, "unsuspend", serde_json::json!({}))
            .await
    }

    async fn grant_admin(&self, token: &str, account_id: &str) -> Result<Account, UpstreamError> {
        self.patch_account(token, account_id, "make-admin", serde_json::json!({}))
            .await
    }

    async fn mark_member(&self, token: &str, account_id: &str) -> Result<Account, UpstreamError> {
        self.patch_account(token, account_id, "mark-member", serde_json::json!({}))
            .await
    }
}
