use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use super::{send_json, UpstreamClient, UpstreamError};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GalleryImage {
    pub url: String,
    #[serde(default)]
    pub caption: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GalleryAlbum {
    #[serde(alias = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub event_date: Option<NaiveDate>,
    #[serde(default)]
    pub images: Vec<GalleryImage>,
}

#[async_trait]
pub trait GalleryApi: Send + Sync {
    async fn list(&self) -> Result<Vec<GalleryAlbum>, UpstreamError>;
}

pub struct HttpGalleryApi {
    client: Arc<dyn UpstreamClient>,
}

impl HttpGalleryApi {
    pub fn new(client: Arc<dyn UpstreamClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl GalleryApi for HttpGalleryApi {
    async fn list(&self) -> Result<Vec<GalleryAlbum>, UpstreamError> {
        send_json(self.client.http().get(self.client.url("/gallery"))).await
    }
}
