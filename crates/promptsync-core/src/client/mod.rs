//! HTTP client for the sync API.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use crate::sync::{
    DownloadPage, DownloadParams, StatusParams, StatusReport, UploadRequest, UploadSummary,
};
use crate::util::{compact_text, is_http_url, normalize_text_option};
use crate::validation::FieldError;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid client configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Sync HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Sync API error: {message}")]
    Api {
        status: u16,
        message: String,
        details: Vec<FieldError>,
    },
    #[error("Invalid sync API payload: {0}")]
    InvalidPayload(String),
}

impl ClientError {
    /// HTTP status of an API rejection
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Bearer-authenticated client for `/v1/sync/*`
#[derive(Clone)]
pub struct SyncClient {
    base_url: String,
    token: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for SyncClient {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SyncClient")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl SyncClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> ClientResult<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        let token = normalize_text_option(Some(token.into())).ok_or_else(|| {
            ClientError::InvalidConfiguration("access token must not be empty".to_string())
        })?;
        Ok(Self {
            base_url,
            token,
            client: reqwest::Client::builder().build()?,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn upload(&self, request: &UploadRequest) -> ClientResult<UploadSummary> {
        let response = self
            .client
            .post(self.url("/v1/sync/upload"))
            .bearer_auth(&self.token)
            .header("Accept", "application/json")
            .json(request)
            .send()
            .await?;
        read_envelope(response).await
    }

    pub async fn download(&self, params: &DownloadParams) -> ClientResult<DownloadPage> {
        let response = self
            .client
            .get(self.url("/v1/sync/download"))
            .bearer_auth(&self.token)
            .header("Accept", "application/json")
            .query(params)
            .send()
            .await?;
        read_envelope(response).await
    }

    pub async fn status(&self, params: &StatusParams) -> ClientResult<StatusReport> {
        let response = self
            .client
            .get(self.url("/v1/sync/status"))
            .bearer_auth(&self.token)
            .header("Accept", "application/json")
            .query(params)
            .send()
            .await?;
        read_envelope(response).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

/// `{ success, data | error, details }` wrapper used by every route
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
    #[serde(default)]
    details: Vec<FieldError>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
    #[serde(default)]
    details: Vec<FieldError>,
}

async fn read_envelope<T: DeserializeOwned>(response: reqwest::Response) -> ClientResult<T> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(parse_api_error(status, &body));
    }
    decode_envelope(status, &body)
}

fn decode_envelope<T: DeserializeOwned>(status: StatusCode, body: &str) -> ClientResult<T> {
    let envelope: ApiEnvelope<T> = serde_json::from_str(body)
        .map_err(|error| ClientError::InvalidPayload(error.to_string()))?;
    if !envelope.success {
        return Err(ClientError::Api {
            status: status.as_u16(),
            message: envelope
                .error
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
            details: envelope.details,
        });
    }
    envelope
        .data
        .ok_or_else(|| ClientError::InvalidPayload("response did not include data".to_string()))
}

fn parse_api_error(status: StatusCode, body: &str) -> ClientError {
    let code = status.as_u16();
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return ClientError::Api {
                status: code,
                message: format!("{} ({code})", message.trim()),
                details: payload.details,
            };
        }
    }

    let trimmed = compact_text(body);
    let message = if trimmed.is_empty() {
        format!("HTTP {code}")
    } else {
        format!("{trimmed} ({code})")
    };
    ClientError::Api {
        status: code,
        message,
        details: Vec::new(),
    }
}

fn normalize_base_url(raw: String) -> ClientResult<String> {
    let base_url = normalize_text_option(Some(raw)).ok_or_else(|| {
        ClientError::InvalidConfiguration("API URL must not be empty".to_string())
    })?;
    if is_http_url(&base_url) {
        Ok(base_url.trim_end_matches('/').to_string())
    } else {
        Err(ClientError::InvalidConfiguration(
            "API URL must include http:// or https://".to_string(),
        ))
    }
}
