use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::types::{
    AnalyzeResponse, CurrentFrameResponse, FramesResponse, HealthResponse, StateResponse,
    VerifyRequest, VerifyResponse,
};
use crate::error::{ClientError, Operation};

/// The backend surface the workflow consumes. One request, one response,
/// no retries; every failure collapses into a [`ClientError`].
#[async_trait]
pub trait AssessmentBackend: Send + Sync + 'static {
    async fn fetch_state(&self) -> Result<StateResponse, ClientError>;

    async fn analyze_next(&self) -> Result<AnalyzeResponse, ClientError>;

    async fn submit_verification(&self, request: VerifyRequest) -> Result<VerifyResponse, ClientError>;

    async fn health(&self) -> Result<HealthResponse, ClientError> {
        Err(ClientError::Unsupported { op: Operation::Health })
    }

    async fn list_frames(&self) -> Result<FramesResponse, ClientError> {
        Err(ClientError::Unsupported { op: Operation::ListFrames })
    }

    async fn current_frame(&self) -> Result<CurrentFrameResponse, ClientError> {
        Err(ClientError::Unsupported { op: Operation::CurrentFrame })
    }
}

#[derive(Clone)]
pub struct AssessmentClient {
    client: Client,
    base_url: String,
}

impl AssessmentClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            // No request timeout: the transport default applies.
            client: Client::builder()
                .user_agent(concat!("riskwatch/", env!("CARGO_PKG_VERSION")))
                .build()
                .unwrap_or_default(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of a frame image served by the backend. Never fetched here.
    pub fn frame_url(&self, filename: &str) -> Option<String> {
        frame_url(&self.base_url, filename)
    }

    async fn get<T: DeserializeOwned>(&self, op: Operation, path: &str) -> Result<T, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ClientError::Transport { op, reason: e.to_string() })?;
        decode(op, response).await
    }
}

pub fn frame_url(base_url: &str, filename: &str) -> Option<String> {
    if filename.is_empty() {
        return None;
    }
    Some(format!("{}/static/{}", base_url.trim_end_matches('/'), filename))
}

async fn decode<T: DeserializeOwned>(op: Operation, response: Response) -> Result<T, ClientError> {
    if !response.status().is_success() {
        return Err(ClientError::Status { op, status: response.status().as_u16() });
    }
    response
        .json::<T>()
        .await
        .map_err(|e| ClientError::Decode { op, reason: e.to_string() })
}

#[async_trait]
impl AssessmentBackend for AssessmentClient {
    async fn fetch_state(&self) -> Result<StateResponse, ClientError> {
        self.get(Operation::FetchState, "/state").await
    }

    async fn analyze_next(&self) -> Result<AnalyzeResponse, ClientError> {
        let op = Operation::Analyze;
        let url = format!("{}/analyze", self.base_url);
        debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| ClientError::Transport { op, reason: e.to_string() })?;
        decode(op, response).await
    }

    async fn submit_verification(&self, request: VerifyRequest) -> Result<VerifyResponse, ClientError> {
        let op = Operation::Verify;
        let url = format!("{}/verify", self.base_url);
        debug!("POST {} decision={}", url, request.decision);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ClientError::Transport { op, reason: e.to_string() })?;
        decode(op, response).await
    }

    async fn health(&self) -> Result<HealthResponse, ClientError> {
        self.get(Operation::Health, "/health").await
    }

    async fn list_frames(&self) -> Result<FramesResponse, ClientError> {
        self.get(Operation::ListFrames, "/frames").await
    }

    async fn current_frame(&self) -> Result<CurrentFrameResponse, ClientError> {
        self.get(Operation::CurrentFrame, "/current-frame").await
    }
}
