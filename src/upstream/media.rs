use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use super::{bearer, send_json, UpstreamClient, UpstreamError};

/// Parameters the browser uses to upload straight to the media host.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignedUpload {
    pub signature: String,
    pub timestamp: i64,
    pub api_key: String,
    pub cloud_name: String,
    pub folder: String,
}

#[async_trait]
pub trait MediaApi: Send + Sync {
    async fn signed_upload(&self, token: &str, folder: &str) -> Result<SignedUpload, UpstreamError>;
}

pub struct HttpMediaApi {
    client: Arc<dyn UpstreamClient>,
}

impl HttpMediaApi {
    pub fn new(client: Arc<dyn UpstreamClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MediaApi for HttpMediaApi {
    async fn signed_upload(&self, token: &str, folder: &str) -> Result<SignedUpload, UpstreamError> {
        let url = format!(
            "{}?folder={}",
            self.client.url("/media/upload-signature"),
            urlencoding::encode(folder)
        );
        send_json(bearer(self.client.http().get(url), token)).await
    }
}
