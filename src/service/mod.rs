pub mod admin;
pub mod auth;
pub mod checkout;
pub mod config;
pub mod matrimony;
pub mod navigation;
pub mod session;

use crate::{
    domain::{
        account::Account,
        entitlement::Entitlement,
        gate::{decide, GateDecision, InterstitialReason, Requirement, LOGIN_PATH, MEMBERSHIP_PATH},
        portal::PortalSession,
        profile::MatrimonyProfile,
    },
    error::PortalError,
    upstream::{auth::AuthApi, matrimony::MatrimonyApi, UpstreamError},
};

/// Bearer credential of a signed-in session.
pub(crate) fn credential(session: &PortalSession) -> Result<String, PortalError> {
    session
        .credential()
        .map(str::to_string)
        .ok_or(PortalError::Unauthenticated)
}

/// Runs the gate for an API operation and turns anything but `Render` into
/// the matching error.
pub(crate) fn authorize(
    session: &PortalSession,
    requirement: Requirement,
) -> Result<Entitlement, PortalError> {
    let viewer = session.viewer();
    match decide(requirement, viewer.as_ref()) {
        GateDecision::Render => Ok(viewer.map(|v| v.entitlement).unwrap_or_default()),
        GateDecision::Interstitial {
            reason: InterstitialReason::Suspended { .. },
        } => Err(PortalError::Suspended),
        GateDecision::Interstitial {
            reason: InterstitialReason::PendingApproval,
        } => Err(PortalError::PendingApproval),
        GateDecision::Redirect { target } => match target.as_str() {
            LOGIN_PATH => Err(PortalError::Unauthenticated),
            MEMBERSHIP_PATH => Err(PortalError::MembershipRequired),
            _ => Err(PortalError::Forbidden),
        },
    }
}

pub(crate) fn signed_in_account(session: &PortalSession) -> Result<Account, PortalError> {
    session.account().cloned().ok_or(PortalError::Unauthenticated)
}

/// Reloads the owned-profile snapshot. Accounts the backend refuses to
/// list for (unapproved, suspended) own nothing as far as the gate cares.
pub(crate) async fn refresh_owned_profiles(
    matrimony: &dyn MatrimonyApi,
    session: &mut PortalSession,
) -> Result<(), PortalError> {
    let token = credential(session)?;
    let profiles = match matrimony.list_mine(&token).await {
        Ok(records) => records.into_iter().map(MatrimonyProfile::from).collect(),
        Err(UpstreamError::Forbidden) => Vec::new(),
        Err(err) => return Err(err.into()),
    };
    session.set_owned_profiles(profiles);
    Ok(())
}

/// Reloads both snapshots the evaluator reads.
pub(crate) async fn refresh_snapshots(
    auth: &dyn AuthApi,
    matrimony: &dyn MatrimonyApi,
    session: &mut PortalSession,
) -> Result<(), PortalError> {
    let token = credential(session)?;
    let account = auth.current_account(&token).await?;
    session.set_account(account);
    refresh_owned_profiles(matrimony, session).await
}

/// Refreshes only what a previous mutation invalidated.
pub(crate) async fn ensure_fresh(
    auth: &dyn AuthApi,
    matrimony: &dyn MatrimonyApi,
    session: &mut PortalSession,
) -> Result<(), PortalError> {
    if session.account().is_none() {
        return refresh_snapshots(auth, matrimony, session).await;
    }
    if session.owned_profiles().is_none() {
        return refresh_owned_profiles(matrimony, session).await;
    }
    Ok(())
}
