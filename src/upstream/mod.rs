pub mod accounts;
pub mod auth;
pub mod gallery;
pub mod matrimony;
pub mod media;
pub mod payments;

use std::time::Duration;

use reqwest::{RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("session is no longer valid")]
    SessionInvalid,
    #[error("access denied")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error("rejected: {0}")]
    Rejected(String),
    #[error("upstream server error ({0})")]
    Server(u16),
    #[error("network error: {0}")]
    Network(String),
    #[error("unexpected upstream payload: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            UpstreamError::Decode(err.to_string())
        } else {
            UpstreamError::Network(err.to_string())
        }
    }
}

pub trait UpstreamClient: Send + Sync {
    fn http(&self) -> &reqwest::Client;
    fn url(&self, path: &str) -> String;
}

pub struct HttpUpstreamClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpUpstreamClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| UpstreamError::Network(err.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl UpstreamClient for HttpUpstreamClient {
    fn http(&self) -> &reqwest::Client {
        &self.http
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(alias = "error")]
    message: Option<String>,
}

pub(crate) fn bearer(request: RequestBuilder, token: &str) -> RequestBuilder {
    request.header(reqwest::header::AUTHORIZATION, format!("Bearer {}", token))
}

pub(crate) fn status_error(status: StatusCode, body: &str) -> UpstreamError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|body| body.message)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());

    match status {
        StatusCode::UNAUTHORIZED => UpstreamError::SessionInvalid,
        StatusCode::FORBIDDEN => UpstreamError::Forbidden,
        StatusCode::NOT_FOUND => UpstreamError::NotFound,
        status if status.is_server_error() => UpstreamError::Server(status.as_u16()),
        _ => UpstreamError::Rejected(message),
    }
}

pub(crate) async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, UpstreamError> {
    let res = request.send().await?;
    let status = res.status();
    if status.is_success() {
        return Ok(res.json::<T>().await?);
    }
    let body = res.text().await.unwrap_or_default();
    Err(status_error(status, &body))
}

pub(crate) async fn send_empty(request: RequestBuilder) -> Result<(), UpstreamError> {
    let res = request.send().await?;
    let status = res.status();
    if status.is_success() {
        return Ok(());
    }
    let body = res.text().await.unwrap_or_default();
    Err(status_error(status, &body))
}
