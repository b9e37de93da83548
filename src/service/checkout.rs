use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::{
    domain::{
        checkout::{
            ensure_purchasable, CheckoutError, CheckoutFailure, CheckoutPhase, GatewayOutcome, PaymentOrder,
            PaymentReceipt, PurchaseTarget,
        },
        gate::Requirement,
        lifecycle::{transition, Actor, ProfileEvent},
        portal::PortalSession,
    },
    error::PortalError,
    service::{authorize, credential, ensure_fresh, refresh_owned_profiles, signed_in_account},
    upstream::{auth::AuthApi, matrimony::MatrimonyApi, payments::PaymentsApi, UpstreamError},
};

#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct FailureNotice {
    pub code: &'static str,
    pub message: &'static str,
}

impl From<CheckoutFailure> for FailureNotice {
    fn from(failure: CheckoutFailure) -> Self {
        Self {
            code: failure.code(),
            message: failure.message(),
        }
    }
}

/// What the SPA needs to draw the pay control and, while a gateway is
/// pending, reopen the widget.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct CheckoutStatus {
    pub phase: &'static str,
    pub busy: bool,
    pub target: Option<PurchaseTarget>,
    pub order: Option<PaymentOrder>,
    pub gateway_key_id: Option<String>,
    pub last_failure: Option<FailureNotice>,
}

#[async_trait]
pub trait CheckoutService: Send + Sync {
    async fn status(&self, session: &mut PortalSession) -> Result<CheckoutStatus, PortalError>;
    /// Idle -> CreatingOrder -> AwaitingGateway.
    async fn begin(
        &self,
        session: &mut PortalSession,
        target: PurchaseTarget,
    ) -> Result<CheckoutStatus, PortalError>;
    /// Completed exit of the gateway, followed by server-side verification.
    async fn complete(
        &self,
        session: &mut PortalSession,
        receipt: PaymentReceipt,
    ) -> Result<PurchaseTarget, PortalError>;
    async fn cancel(&self, session: &mut PortalSession) -> Result<CheckoutStatus, PortalError>;
    /// The gateway reported a failed payment. The status carries the failure notice.
    async fn gateway_failed(
        &self,
        session: &mut PortalSession,
        reason: String,
    ) -> Result<CheckoutStatus, PortalError>;
    async fn widget_failed(&self, session: &mut PortalSession) -> Result<CheckoutStatus, PortalError>;
}

pub struct CheckoutServiceImpl {
    auth_api: Arc<dyn AuthApi>,
    matrimony_api: Arc<dyn MatrimonyApi>,
    payments_api: Arc<dyn PaymentsApi>,
    gateway_key_id: Option<String>,
    ttl: chrono::Duration,
}

impl CheckoutServiceImpl {
    pub fn new(
        auth_api: Arc<dyn AuthApi>,
        matrimony_api: Arc<dyn MatrimonyApi>,
        payments_api: Arc<dyn PaymentsApi>,
        gateway_key_id: Option<String>,
        ttl_seconds: u64,
    ) -> Self {
        Self {
            auth_api,
            matrimony_api,
            payments_api,
            gateway_key_id,
            ttl: chrono::Duration::seconds(i64::try_from(ttl_seconds).unwrap_or(i64::MAX)),
        }
    }

    fn snapshot(&self, session: &PortalSession) -> CheckoutStatus {
        let checkout = &session.checkout;
        let order = match checkout.phase() {
            CheckoutPhase::AwaitingGateway { order, .. } | CheckoutPhase::Verifying { order, .. } => {
                Some(order.clone())
            }
            _ => None,
        };
        CheckoutStatus {
            phase: checkout.phase().name(),
            busy: checkout.is_busy(),
            target: checkout.phase().target().cloned(),
            order,
            gateway_key_id: self.gateway_key_id.clone(),
            last_failure: checkout.last_failure().map(FailureNotice::from),
        }
    }

    /// Brings the cached snapshots in line with a verified payment.
    async fn settle(&self, session: &mut PortalSession, target: &PurchaseTarget) {
        match target {
            PurchaseTarget::Membership => {
                let Some(token) = session.credential().map(str::to_string) else {
                    return;
                };
                match self.auth_api.current_account(&token).await {
                    Ok(account) => session.set_account(account),
                    Err(err) => {
                        tracing::warn!(error = %err, "account refresh after membership payment failed");
                        session.invalidate_account();
                    }
                }
            }
            PurchaseTarget::Profile { profile_id } => {
                let Some(mut profile) = session.owned_profile(profile_id).cloned() else {
                    session.invalidate_profiles();
                    return;
                };
                match transition(&mut profile, Actor::Owner, ProfileEvent::PaymentVerified) {
                    Ok(()) => session.patch_owned_profile(profile),
                    Err(err) => {
                        tracing::warn!(%profile_id, error = %err, "cached profile out of step with payment");
                        session.invalidate_profiles();
                    }
                }
            }
        }
    }
}

#[async_trait]
impl CheckoutService for CheckoutServiceImpl {
    async fn status(&self, session: &mut PortalSession) -> Result<CheckoutStatus, PortalError> {
        session.checkout.expire_stale(Utc::now(), self.ttl);
        Ok(self.snapshot(session))
    }

    async fn begin(
        &self,
        session: &mut PortalSession,
        target: PurchaseTarget,
    ) -> Result<CheckoutStatus, PortalError> {
        let now = Utc::now();
        session.checkout.expire_stale(now, self.ttl);
        if session.checkout.is_busy() {
            return Err(CheckoutError::Busy.into());
        }

        ensure_fresh(self.auth_api.as_ref(), self.matrimony_api.as_ref(), session).await?;
        authorize(session, Requirement::APPROVED)?;
        let account = signed_in_account(session)?;
        if let PurchaseTarget::Profile { profile_id } = &target {
            if session.owned_profile(profile_id).is_none() {
                refresh_owned_profiles(self.matrimony_api.as_ref(), session).await?;
            }
        }
        let profile = match &target {
            PurchaseTarget::Profile { profile_id } => session.owned_profile(profile_id).cloned(),
            PurchaseTarget::Membership => None,
        };
        ensure_purchasable(&account, &target, profile.as_ref())?;

        let attempt = session.checkout.begin(target.clone(), now)?;
        let token = credential(session)?;
        match self.payments_api.create_order(&token, &target, attempt).await {
            Ok(order) => {
                tracing::info!(%attempt, order_id = %order.order_id, "payment order created");
                session.checkout.order_created(attempt, order)?;
                Ok(self.snapshot(session))
            }
            Err(UpstreamError::SessionInvalid) => {
                session.checkout.order_failed(attempt);
                Err(PortalError::SessionInvalid)
            }
            Err(err) => {
                tracing::warn!(%attempt, error = %err, "payment order rejected");
                session.checkout.order_failed(attempt);
                Err(PortalError::Payment(CheckoutFailure::OrderRejected))
            }
        }
    }

    async fn complete(
        &self,
        session: &mut PortalSession,
        receipt: PaymentReceipt,
    ) -> Result<PurchaseTarget, PortalError> {
        let Some(receipt) = session
            .checkout
            .gateway_exited(GatewayOutcome::Completed(receipt))?
        else {
            return Err(PortalError::Internal("completed exit returned no receipt".to_string()));
        };
        let target = session
            .checkout
            .phase()
            .target()
            .cloned()
            .ok_or_else(|| PortalError::Internal("verifying without a target".to_string()))?;

        let token = credential(session)?;
        let verified = match self.payments_api.verify(&token, &target, &receipt).await {
            Ok(verified) => verified,
            Err(UpstreamError::SessionInvalid) => {
                session.checkout.verification_finished(false)?;
                return Err(PortalError::SessionInvalid);
            }
            Err(err) => {
                tracing::warn!(order_id = %receipt.order_id, error = %err, "payment verification call failed");
                false
            }
        };

        match session.checkout.verification_finished(verified)? {
            Some(settled) => {
                tracing::info!(order_id = %receipt.order_id, "payment verified");
                self.settle(session, &settled).await;
                Ok(settled)
            }
            None => Err(PortalError::Payment(CheckoutFailure::VerificationFailed)),
        }
    }

    async fn cancel(&self, session: &mut PortalSession) -> Result<CheckoutStatus, PortalError> {
        session.checkout.gateway_exited(GatewayOutcome::Cancelled)?;
        Ok(self.snapshot(session))
    }

    async fn gateway_failed(
        &self,
        session: &mut PortalSession,
        reason: String,
    ) -> Result<CheckoutStatus, PortalError> {
        session
            .checkout
            .gateway_exited(GatewayOutcome::Failed { reason })?;
        Ok(self.snapshot(session))
    }

    async fn widget_failed(&self, session: &mut PortalSession) -> Result<CheckoutStatus, PortalError> {
        session.checkout.widget_failed()?;
        Ok(self.snapshot(session))
    }
}
