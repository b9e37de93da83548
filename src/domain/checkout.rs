//! Payment round-trip as an explicit state machine.
//!
//! ```text
//! Idle -> CreatingOrder -> AwaitingGateway -> Verifying -> Idle
//!              |                 |  |             |
//!              +-- failure ------+  +-- cancel ---+--> Idle
//! ```
//!
//! `AwaitingGateway` is the suspend point while the gateway widget is open in
//! the browser. It has three exits: completed, cancelled and failed. Every
//! failure lands back in `Idle` so the same entry point can retry.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{
    account::Account,
    profile::{MatrimonyProfile, ProfileState},
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PurchaseTarget {
    Membership,
    Profile {
        #[serde(rename = "profileId")]
        profile_id: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOrder {
    pub order_id: String,
    /// Minor currency units.
    pub amount: u64,
    pub currency: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    pub order_id: String,
    pub payment_id: String,
    pub signature: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GatewayOutcome {
    Completed(PaymentReceipt),
    Cancelled,
    Failed { reason: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutFailure {
    WidgetLoad,
    OrderRejected,
    PaymentFailed,
    VerificationFailed,
}

impl CheckoutFailure {
    pub fn code(self) -> &'static str {
        match self {
            CheckoutFailure::WidgetLoad => "payment_widget_unavailable",
            CheckoutFailure::OrderRejected => "payment_order_failed",
            CheckoutFailure::PaymentFailed => "payment_failed",
            CheckoutFailure::VerificationFailed => "payment_verification_failed",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            CheckoutFailure::WidgetLoad => {
                "The payment window could not be loaded. Check your connection and try again."
            }
            CheckoutFailure::OrderRejected => {
                "We could not start the payment. Please try again in a moment."
            }
            CheckoutFailure::PaymentFailed => {
                "The payment was not completed by the payment provider. You have not been charged."
            }
            CheckoutFailure::VerificationFailed => {
                "We could not confirm your payment. If money was deducted, contact support before retrying."
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum CheckoutPhase {
    Idle,
    CreatingOrder {
        attempt: Uuid,
        target: PurchaseTarget,
        started_at: DateTime<Utc>,
    },
    AwaitingGateway {
        attempt: Uuid,
        target: PurchaseTarget,
        order: PaymentOrder,
        started_at: DateTime<Utc>,
    },
    Verifying {
        attempt: Uuid,
        target: PurchaseTarget,
        order: PaymentOrder,
        started_at: DateTime<Utc>,
    },
}

impl CheckoutPhase {
    pub fn name(&self) -> &'static str {
        match self {
            CheckoutPhase::Idle => "idle",
            CheckoutPhase::CreatingOrder { .. } => "creating_order",
            CheckoutPhase::AwaitingGateway { .. } => "awaiting_gateway",
            CheckoutPhase::Verifying { .. } => "verifying",
        }
    }

    fn started_at(&self) -> Option<DateTime<Utc>> {
        match self {
            CheckoutPhase::Idle => None,
            CheckoutPhase::CreatingOrder { started_at, .. }
            | CheckoutPhase::AwaitingGateway { started_at, .. }
            | CheckoutPhase::Verifying { started_at, .. } => Some(*started_at),
        }
    }

    pub fn target(&self) -> Option<&PurchaseTarget> {
        match self {
            CheckoutPhase::Idle => None,
            CheckoutPhase::CreatingOrder { target, .. }
            | CheckoutPhase::AwaitingGateway { target, .. }
            | CheckoutPhase::Verifying { target, .. } => Some(target),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CheckoutError {
    #[error("a payment is already in progress")]
    Busy,
    #[error("nothing left to pay for this purchase")]
    AlreadySettled,
    #[error("this purchase is not available for the account")]
    NotApplicable,
    #[error("checkout is {actual}, expected {expected}")]
    OutOfOrder {
        expected: &'static str,
        actual: &'static str,
    },
    #[error("receipt does not belong to the current order")]
    OrderMismatch,
}

/// Checks the purchase target against the caller's cached snapshots before any order exists.
pub fn ensure_purchasable(
    account: &Account,
    target: &PurchaseTarget,
    profile: Option<&MatrimonyProfile>,
) -> Result<(), CheckoutError> {
    if account.is_suspended || !account.is_approved {
        return Err(CheckoutError::NotApplicable);
    }
    match target {
        PurchaseTarget::Membership if account.is_member => Err(CheckoutError::AlreadySettled),
        PurchaseTarget::Membership => Ok(()),
        PurchaseTarget::Profile { profile_id } => {
            let Some(profile) = profile.filter(|p| &p.id == profile_id) else {
                return Err(CheckoutError::NotApplicable);
            };
            if !account.owns(&profile.owner_id) {
                return Err(CheckoutError::NotApplicable);
            }
            if profile.is_paid() {
                return Err(CheckoutError::AlreadySettled);
            }
            match profile.state() {
                ProfileState::PendingPayment => Ok(()),
                _ => Err(CheckoutError::NotApplicable),
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutCoordinator {
    phase: CheckoutPhase,
    last_failure: Option<CheckoutFailure>,
}

impl Default for CheckoutCoordinator {
    fn default() -> Self {
        Self {
            phase: CheckoutPhase::Idle,
            last_failure: None,
        }
    }
}

impl CheckoutCoordinator {
    pub fn phase(&self) -> &CheckoutPhase {
        &self.phase
    }

    pub fn last_failure(&self) -> Option<CheckoutFailure> {
        self.last_failure
    }

    /// The pay control stays disabled while this is true.
    pub fn is_busy(&self) -> bool {
        !matches!(self.phase, CheckoutPhase::Idle)
    }

    /// Drops an attempt that outlived `ttl`; the upstream order simply expires.
    pub fn expire_stale(&mut self, now: DateTime<Utc>, ttl: Duration) -> bool {
        match self.phase.started_at() {
            Some(started_at) if now - started_at > ttl => {
                tracing::info!(phase = self.phase.name(), "abandoning stale checkout");
                self.phase = CheckoutPhase::Idle;
                true
            }
            _ => false,
        }
    }

    pub fn begin(&mut self, target: PurchaseTarget, now: DateTime<Utc>) -> Result<Uuid, CheckoutError> {
        if self.is_busy() {
            return Err(CheckoutError::Busy);
        }
        let attempt = Uuid::new_v4();
        self.phase = CheckoutPhase::CreatingOrder {
            attempt,
            target,
            started_at: now,
        };
        self.last_failure = None;
        Ok(attempt)
    }

    pub fn order_created(&mut self, attempt: Uuid, order: PaymentOrder) -> Result<(), CheckoutError> {
        match &self.phase {
            CheckoutPhase::CreatingOrder {
                attempt: current,
                target,
                started_at,
            } if *current == attempt => {
                self.phase = CheckoutPhase::AwaitingGateway {
                    attempt,
                    target: target.clone(),
                    order,
                    started_at: *started_at,
                };
                Ok(())
            }
            other => Err(CheckoutError::OutOfOrder {
                expected: "creating_order",
                actual: other.name(),
            }),
        }
    }

    pub fn order_failed(&mut self, attempt: Uuid) {
        if matches!(&self.phase, CheckoutPhase::CreatingOrder { attempt: current, .. } if *current == attempt)
        {
            self.fail(CheckoutFailure::OrderRejected);
        }
    }

    /// The browser could not load the gateway script. Valid from any phase
    /// before verification.
    pub fn widget_failed(&mut self) -> Result<(), CheckoutError> {
        match self.phase {
            CheckoutPhase::Verifying { .. } => Err(CheckoutError::OutOfOrder {
                expected: "awaiting_gateway",
                actual: "verifying",
            }),
            _ => {
                self.fail(CheckoutFailure::WidgetLoad);
                Ok(())
            }
        }
    }

    /// Resolves the gateway suspend point. Returns the receipt to verify when
    /// the user completed the payment.
    pub fn gateway_exited(
        &mut self,
        outcome: GatewayOutcome,
    ) -> Result<Option<PaymentReceipt>, CheckoutError> {
        let CheckoutPhase::AwaitingGateway {
            attempt,
            target,
            order,
            started_at,
        } = &self.phase
        else {
            return Err(CheckoutError::OutOfOrder {
                expected: "awaiting_gateway",
                actual: self.phase.name(),
            });
        };

        match outcome {
            GatewayOutcome::Completed(receipt) => {
                if receipt.order_id != order.order_id {
                    return Err(CheckoutError::OrderMismatch);
                }
                self.phase = CheckoutPhase::Verifying {
                    attempt: *attempt,
                    target: target.clone(),
                    order: order.clone(),
                    started_at: *started_at,
                };
                Ok(Some(receipt))
            }
            GatewayOutcome::Cancelled => {
                self.phase = CheckoutPhase::Idle;
                self.last_failure = None;
                Ok(None)
            }
            GatewayOutcome::Failed { reason } => {
                tracing::warn!(order_id = %order.order_id, %reason, "gateway reported payment failure");
                self.fail(CheckoutFailure::PaymentFailed);
                Ok(None)
            }
        }
    }

    /// Ends verification. On success returns the settled target; on failure the
    /// coordinator is idle again and nothing else changes.
    pub fn verification_finished(&mut self, verified: bool) -> Result<Option<PurchaseTarget>, CheckoutError> {
        let CheckoutPhase::Verifying { target, .. } = &self.phase else {
            return Err(CheckoutError::OutOfOrder {
                expected: "verifying",
                actual: self.phase.name(),
            });
        };
        let target = target.clone();
        if verified {
            self.phase = CheckoutPhase::Idle;
            self.last_failure = None;
            Ok(Some(target))
        } else {
            self.fail(CheckoutFailure::VerificationFailed);
            Ok(None)
        }
    }

    fn fail(&mut self, failure: CheckoutFailure) {
        self.phase = CheckoutPhase::Idle;
        self.last_failure = Some(failure);
    }
}
