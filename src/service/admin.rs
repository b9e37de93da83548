use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::{
    domain::{
        account::Account,
        gate::Requirement,
        lifecycle::{ensure_allowed, transition, Actor, ProfileAction, ProfileEvent},
        portal::PortalSession,
        profile::MatrimonyProfile,
        wizard::FieldError,
    },
    error::PortalError,
    service::{authorize, credential, ensure_fresh},
    upstream::{
        accounts::{AccountFilter, AccountsApi},
        auth::AuthApi,
        matrimony::MatrimonyApi,
        UpstreamError,
    },
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AccountAction {
    Approve,
    Reject,
    Unsuspend,
    GrantAdmin,
    MarkMember,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BulkAction {
    Approve,
    Reject,
}

/// One aggregate notice for a bulk action; individual failures are not itemized.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct BulkOutcome {
    pub succeeded: usize,
    pub failed: usize,
}

#[async_trait]
pub trait AdminService: Send + Sync {
    async fn list_accounts(
        &self,
        session: &mut PortalSession,
        filter: Option<AccountFilter>,
    ) -> Result<Vec<Account>, PortalError>;
    /// `None` when the account no longer exists upstream (rejection).
    async fn apply(
        &self,
        session: &mut PortalSession,
        account_id: &str,
        action: AccountAction,
    ) -> Result<Option<Account>, PortalError>;
    async fn suspend(
        &self,
        session: &mut PortalSession,
        account_id: &str,
        reason: &str,
    ) -> Result<Account, PortalError>;
    async fn bulk(
        &self,
        session: &mut PortalSession,
        account_ids: &[String],
        action: BulkAction,
    ) -> Result<BulkOutcome, PortalError>;
    async fn list_profiles(&self, session: &mut PortalSession)
        -> Result<Vec<MatrimonyProfile>, PortalError>;
    async fn mark_completed(
        &self,
        session: &mut PortalSession,
        profile_id: &str,
    ) -> Result<MatrimonyProfile, PortalError>;
    /// Hide or unhide any profile, whoever owns it.
    async fn toggle_hidden(
        &self,
        session: &mut PortalSession,
        profile_id: &str,
    ) -> Result<MatrimonyProfile, PortalError>;
    async fn delete_profile(&self, session: &mut PortalSession, profile_id: &str)
        -> Result<(), PortalError>;
}

pub struct AdminServiceImpl {
    auth_api: Arc<dyn AuthApi>,
    accounts_api: Arc<dyn AccountsApi>,
    matrimony_api: Arc<dyn MatrimonyApi>,
}

impl AdminServiceImpl {
    pub fn new(
        auth_api: Arc<dyn AuthApi>,
        accounts_api: Arc<dyn AccountsApi>,
        matrimony_api: Arc<dyn MatrimonyApi>,
    ) -> Self {
        Self {
            auth_api,
            accounts_api,
            matrimony_api,
        }
    }

    async fn admin_token(&self, session: &mut PortalSession) -> Result<String, PortalError> {
        ensure_fresh(self.auth_api.as_ref(), self.matrimony_api.as_ref(), session).await?;
        authorize(session, Requirement::ADMIN)?;
        credential(session)
    }

    /// Keeps the admin's own snapshot current when they act on themselves.
    fn patch_self(session: &mut PortalSession, account_id: &str, updated: Option<&Account>) {
        let is_self = session
            .account()
            .is_some_and(|account| account.id == account_id);
        if !is_self {
            return;
        }
        match updated {
            Some(account) => session.set_account(account.clone()),
            None => session.invalidate_account(),
        }
    }

    async fn load_profile(
        &self,
        token: &str,
        profile_id: &str,
    ) -> Result<MatrimonyProfile, PortalError> {
        let record = self
            .matrimony_api
            .get(token, profile_id)
            .await
            .map_err(PortalError::profile_not_found)?;
        Ok(MatrimonyProfile::from(record))
    }
}

#[async_trait]
impl AdminService for AdminServiceImpl {
    async fn list_accounts(
        &self,
        session: &mut PortalSession,
        filter: Option<AccountFilter>,
    ) -> Result<Vec<Account>, PortalError> {
        let token = self.admin_token(session).await?;
        Ok(self.accounts_api.list(&token, filter).await?)
    }

    async fn apply(
        &self,
        session: &mut PortalSession,
        account_id: &str,
        action: AccountAction,
    ) -> Result<Option<Account>, PortalError> {
        let token = self.admin_token(session).await?;
        let updated = match action {
            AccountAction::Approve => Some(self.accounts_api.approve(&token, account_id).await?),
            AccountAction::Reject => {
                self.accounts_api.reject(&token, account_id).await?;
                None
            }
            AccountAction::Unsuspend => Some(self.accounts_api.unsuspend(&token, account_id).await?),
            AccountAction::GrantAdmin => {
                Some(self.accounts_api.grant_admin(&token, account_id).await?)
            }
            AccountAction::MarkMember => {
                Some(self.accounts_api.mark_member(&token, account_id).await?)
            }
        };
        tracing::info!(account_id, ?action, "admin account action applied");
        Self::patch_self(session, account_id, updated.as_ref());
        Ok(updated)
    }

    async fn suspend(
        &self,
        session: &mut PortalSession,
        account_id: &str,
        reason: &str,
    ) -> Result<Account, PortalError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(PortalError::Validation(vec![FieldError::new("reason", "required")]));
        }
        let token = self.admin_token(session).await?;
        let account = self.accounts_api.suspend(&token, account_id, reason).await?;
        tracing::info!(account_id, "account suspended");
        Self::patch_self(session, account_id, Some(&account));
        Ok(account)
    }

    async fn bulk(
        &self,
        session: &mut PortalSession,
        account_ids: &[String],
        action: BulkAction,
    ) -> Result<BulkOutcome, PortalError> {
        let token = self.admin_token(session).await?;
        let mut outcome = BulkOutcome::default();
        for account_id in account_ids {
            let result = match action {
                BulkAction::Approve => self
                    .accounts_api
                    .approve(&token, account_id)
                    .await
                    .map(Some),
                BulkAction::Reject => self
                    .accounts_api
                    .reject(&token, account_id)
                    .await
                    .map(|()| None),
            };
            match result {
                Ok(updated) => {
                    outcome.succeeded += 1;
                    Self::patch_self(session, account_id, updated.as_ref());
                }
                Err(UpstreamError::SessionInvalid) => return Err(PortalError::SessionInvalid),
                Err(err) => {
                    tracing::warn!(%account_id, error = %err, "bulk account action failed");
                    outcome.failed += 1;
                }
            }
        }
        tracing::info!(?action, succeeded = outcome.succeeded, failed = outcome.failed, "bulk account action finished");
        Ok(outcome)
    }

    async fn list_profiles(
        &self,
        session: &mut PortalSession,
    ) -> Result<Vec<MatrimonyProfile>, PortalError> {
        let token = self.admin_token(session).await?;
        let records = self.matrimony_api.admin_list_all(&token).await?;
        Ok(records.into_iter().map(MatrimonyProfile::from).collect())
    }

    async fn mark_completed(
        &self,
        session: &mut PortalSession,
        profile_id: &str,
    ) -> Result<MatrimonyProfile, PortalError> {
        let token = self.admin_token(session).await?;
        let mut profile = self.load_profile(&token, profile_id).await?;
        ensure_allowed(profile.state(), ProfileAction::MarkCompleted)?;

        let scheduled = self
            .matrimony_api
            .admin_mark_completed(&token, profile_id)
            .await
            .map_err(PortalError::profile_not_found)?;
        transition(
            &mut profile,
            Actor::Admin,
            ProfileEvent::MarkCompleted { now: Utc::now() },
        )?;
        // Upstream's clock decides the deletion date.
        profile.scheduled_deletion = Some(scheduled);
        tracing::info!(profile_id, %scheduled, "profile marked completed");

        if session.owned_profile(profile_id).is_some() {
            session.patch_owned_profile(profile.clone());
        }
        Ok(profile)
    }

    async fn toggle_hidden(
        &self,
        session: &mut PortalSession,
        profile_id: &str,
    ) -> Result<MatrimonyProfile, PortalError> {
        let token = self.admin_token(session).await?;
        let mut profile = self.load_profile(&token, profile_id).await?;
        let event = ProfileEvent::toggle_visibility(&profile);
        transition(&mut profile, Actor::Admin, event)?;

        let is_hidden = self
            .matrimony_api
            .toggle_hidden(&token, profile_id)
            .await
            .map_err(PortalError::profile_not_found)?;
        if is_hidden != profile.is_hidden {
            tracing::warn!(profile_id, is_hidden, "upstream visibility differs from admin toggle");
            profile.is_hidden = is_hidden;
        }
        tracing::info!(profile_id, is_hidden, "profile visibility toggled by admin");

        if session.owned_profile(profile_id).is_some() {
            session.patch_owned_profile(profile.clone());
        }
        Ok(profile)
    }

    async fn delete_profile(
        &self,
        session: &mut PortalSession,
        profile_id: &str,
    ) -> Result<(), PortalError> {
        let token = self.admin_token(session).await?;
        self.matrimony_api
            .admin_delete(&token, profile_id)
            .await
            .map_err(PortalError::profile_not_found)?;
        tracing::info!(profile_id, "profile deleted by admin");
        if let Some(mut profile) = session.owned_profile(profile_id).cloned() {
            profile.deleted = true;
            session.patch_owned_profile(profile);
        }
        Ok(())
    }
}
