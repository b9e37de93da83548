use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{bearer, send_empty, send_json, UpstreamClient, UpstreamError};
use crate::domain::{
    lifecycle::Submission,
    profile::{Photo, ProfileChanges, ProfileDetails, ProfileFilter, ProfilePage, ProfileRecord},
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateProfileBody<'a> {
    #[serde(flatten)]
    details: &'a ProfileDetails,
    photos: &'a [Photo],
    payment_required: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HiddenAck {
    is_hidden: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompletedAck {
    scheduled_deletion: DateTime<Utc>,
}

#[async_trait]
pub trait MatrimonyApi: Send + Sync {
    async fn list(
        &self,
        token: &str,
        filter: &ProfileFilter,
    ) -> Result<ProfilePage<ProfileRecord>, UpstreamError>;
    async fn get(&self, token: &str, profile_id: &str) -> Result<ProfileRecord, UpstreamError>;
    async fn create(&self, token: &str, submission: &Submission) -> Result<ProfileRecord, UpstreamError>;
    async fn update(
        &self,
        token: &str,
        profile_id: &str,
        changes: &ProfileChanges,
    ) -> Result<ProfileRecord, UpstreamError>;
    async fn delete(&self, token: &str, profile_id: &str) -> Result<(), UpstreamError>;
    /// Returns the new hidden flag.
    async fn toggle_hidden(&self, token: &str, profile_id: &str) -> Result<bool, UpstreamError>;
    async fn list_mine(&self, token: &str) -> Result<Vec<ProfileRecord>, UpstreamError>;
    async fn admin_list_all(&self, token: &str) -> Result<Vec<ProfileRecord>, UpstreamError>;
    /// Returns the deletion timestamp upstream scheduled.
    async fn admin_mark_completed(
        &self,
        token: &str,
        profile_id: &str,
    ) -> Result<DateTime<Utc>, UpstreamError>;
    async fn admin_delete(&self, token: &str, profile_id: &str) -> Result<(), UpstreamError>;
}

pub struct HttpMatrimonyApi {
    client: Arc<dyn UpstreamClient>,
}

impl HttpMatrimonyApi {
    pub fn new(client: Arc<dyn UpstreamClient>) -> Self {
        Self { client }
    }

    fn profile_url(&self, prefix: &str, profile_id: &str, suffix: &str) -> String {
        self.client.url(&format!(
            "{}/{}{}",
            prefix,
            urlencoding::encode(profile_id),
            suffix
        ))
    }
}

#[async_trait]
impl MatrimonyApi for HttpMatrimonyApi {
    async fn list(
        &self,
        token: &str,
        filter: &ProfileFilter,
    ) -> Result<ProfilePage<ProfileRecord>, UpstreamError> {
        let query = filter
            .query_pairs()
            .into_iter()
            .map(|(key, value)| format!("{}={}", key, urlencoding::encode(&value)))
            .collect::<Vec<_>>()
            .join("&");
        let url = format!("{}?{}", self.client.url("/matrimony"), query);
        send_json(bearer(self.client.http().get(url), token)).await
    }

    async fn get(&self, token: &str, profile_id: &str) -> Result<ProfileRecord, UpstreamError> {
        send_json(bearer(
            self.client
                .http()
                .get(self.profile_url("/matrimony", profile_id, "")),
            token,
        ))
        .await
    }

    async fn create(&self, token: &str, submission: &Submission) -> Result<ProfileRecord, UpstreamError> {
        let body = CreateProfileBody {
            details: &submission.profile.details,
            photos: submission.profile.photos.as_slice(),
            payment_required: submission.payment_required,
        };
        send_json(bearer(
            self.client
                .http()
                .post(self.client.url("/matrimony"))
                .json(&body),
            token,
        ))
        .await
    }

    async fn update(
        &self,
        token: &str,
        profile_id: &str,
        changes: &ProfileChanges,
    ) -> Result<ProfileRecord, UpstreamError> {
        send_json(bearer(
            self.client
                .http()
                .put(self.profile_url("/matrimony", profile_id, ""))
                .json(changes),
            token,
        ))
        .await
    }

    async fn delete(&self, token: &str, profile_id: &str) -> Result<(), UpstreamError> {
        send_empty(bearer(
            self.client
                .http()
                .delete(self.profile_url("/matrimony", profile_id, "")),
            token,
        ))
        .await
    }

    async fn toggle_hidden(&self, token: &str, profile_id: &str) -> Result<bool, UpstreamError> {
        let ack: HiddenAck = send_json(bearer(
            self.client
                .http()
                .patch(self.profile_url("/matrimony", profile_id, "/toggle-hidden")),
            token,
        ))
        .await?;
        Ok(ack.is_hidden)
    }

    async fn list_mine(&self, token: &str) -> Result<Vec<ProfileRecord>, UpstreamError> {
        send_json(bearer(
            self.client.http().get(self.client.url("/matrimony/mine")),
            token,
        ))
        .await
    }

    async fn admin_list_all(&self, token: &str) -> Result<Vec<ProfileRecord>, UpstreamError> {
        send_json(bearer(
            self.client.http().get(self.client.url("/admin/matrimony")),
            token,
        ))
        .await
    }

    async fn admin_mark_completed(
        &self,
        token: &str,
        profile_id: &str,
    ) -> Result<DateTime<Utc>, UpstreamError> {
        let ack: CompletedAck = send_json(bearer(
            self.client
                .http()
                .patch(self.profile_url("/admin/matrimony", profile_id, "/complete")),
            token,
        ))
        .await?;
        Ok(ack.scheduled_deletion)
    }

    async fn admin_delete(&self, token: &str, profile_id: &str) -> Result<(), UpstreamError> {
        send_empty(bearer(
            self.client
                .http()
                .delete(self.profile_url("/admin/matrimony", profile_id, "")),
            token,
        ))
        .await
    }
}
