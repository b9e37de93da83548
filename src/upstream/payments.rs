use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::{bearer, send_json, UpstreamClient, UpstreamError};
use crate::domain::checkout::{PaymentOrder, PaymentReceipt, PurchaseTarget};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PurposeBody<'a> {
    purpose: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    profile_id: Option<&'a str>,
}

impl<'a> From<&'a PurchaseTarget> for PurposeBody<'a> {
    fn from(target: &'a PurchaseTarget) -> Self {
        match target {
            PurchaseTarget::Membership => Self {
                purpose: "membership",
                profile_id: None,
            },
            PurchaseTarget::Profile { profile_id } => Self {
                purpose: "matrimony",
                profile_id: Some(profile_id),
            },
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyBody<'a> {
    #[serde(flatten)]
    purpose: PurposeBody<'a>,
    #[serde(flatten)]
    receipt: &'a PaymentReceipt,
}

#[derive(Deserialize)]
struct VerifyAck {
    verified: bool,
}

#[async_trait]
pub trait PaymentsApi: Send + Sync {
    /// `attempt` is sent as the idempotency key so a retried request cannot
    /// open a second order for the same checkout attempt.
    async fn create_order(
        &self,
        token: &str,
        target: &PurchaseTarget,
        attempt: Uuid,
    ) -> Result<PaymentOrder, UpstreamError>;
    /// `Ok(false)` when the signature did not verify.
    async fn verify(
        &self,
        token: &str,
        target: &PurchaseTarget,
        receipt: &PaymentReceipt,
    ) -> Result<bool, UpstreamError>;
}

pub struct HttpPaymentsApi {
    client: Arc<dyn UpstreamClient>,
}

impl HttpPaymentsApi {
    pub fn new(client: Arc<dyn UpstreamClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PaymentsApi for HttpPaymentsApi {
    async fn create_order(
        &self,
        token: &str,
        target: &PurchaseTarget,
        attempt: Uuid,
    ) -> Result<PaymentOrder, UpstreamError> {
        send_json(bearer(
            self.client
                .http()
                .post(self.client.url("/payments/orders"))
                .header("Idempotency-Key", attempt.to_string())
                .json(&PurposeBody::from(target)),
            token,
        ))
        .await
    }

    async fn verify(
        &self,
        token: &str,
        target: &PurchaseTarget,
        receipt: &PaymentReceipt,
    ) -> Result<bool, UpstreamError> {
        let body = VerifyBody {
            purpose: PurposeBody::from(target),
            receipt,
        };
        let result: Result<VerifyAck, UpstreamError> = send_json(bearer(
            self.client
                .http()
                .post(self.client.url("/payments/verify"))
                .json(&body),
            token,
        ))
        .await;
        match result {
            Ok(ack) => Ok(ack.verified),
            Err(UpstreamError::Rejected(message)) => {
                tracing::warn!(order_id = %receipt.order_id, %message, "payment signature rejected");
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }
}
