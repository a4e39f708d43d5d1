//! HTTP client (reqwest) tới admission API và inference server của ML node.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::infra::service_traits::{CompletionSender, NodeClient, NodeClientFactory, ServiceError};
use crate::node_manager::OnboardingState;

pub const INFERENCE_UP_PATH: &str = "/api/v1/inference/up";
pub const HEALTH_PATH: &str = "/health";
pub const NODE_STATE_PATH: &str = "/api/v1/state";

#[derive(Debug, Serialize)]
struct InferenceUpRequest<'a> {
    model: &'a str,
    args: &'a [String],
}

#[derive(Debug, Serialize)]
struct NodeStateRequest<'a> {
    state: OnboardingState,
    reason: &'a str,
}

fn build_client(timeout: Duration) -> Result<reqwest::Client, ServiceError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ServiceError::InternalError(format!("Cannot build HTTP client: {}", e)))
}

fn map_transport_error(e: reqwest::Error) -> ServiceError {
    if e.is_timeout() {
        ServiceError::TimeoutError(e.to_string())
    } else if e.is_connect() {
        ServiceError::ConnectionError(e.to_string())
    } else {
        ServiceError::ProtocolError(e.to_string())
    }
}

/// Chuyển response ngoài 2xx thành lỗi kèm status và body
async fn ensure_success(response: reqwest::Response) -> Result<(), ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(ServiceError::ProtocolError(format!("status {}: {}", status.as_u16(), body.trim())))
}

/// Client cho một node cụ thể
#[derive(Debug, Clone)]
pub struct HttpNodeClient {
    http: reqwest::Client,
    poc_url: String,
    inference_url: String,
}

impl HttpNodeClient {
    pub fn new(poc_url: &str, inference_url: &str, timeout: Duration) -> Result<Self, ServiceError> {
        Ok(Self::with_client(build_client(timeout)?, poc_url, inference_url))
    }

    pub fn with_client(http: reqwest::Client, poc_url: &str, inference_url: &str) -> Self {
        Self {
            http,
            poc_url: poc_url.trim_end_matches('/').to_string(),
            inference_url: inference_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn poc_url(&self) -> &str {
        &self.poc_url
    }

    pub fn inference_url(&self) -> &str {
        &self.inference_url
    }
}

#[async_trait]
impl NodeClient for HttpNodeClient {
    async fn inference_up(&self, model_id: &str, args: &[String]) -> Result<(), ServiceError> {
        debug!("[HttpNodeClient] inference up {} at {}", model_id, self.poc_url);
        let response = self
            .http
            .post(format!("{}{}", self.poc_url, INFERENCE_UP_PATH))
            .json(&InferenceUpRequest { model: model_id, args })
            .send()
            .await
            .map_err(map_transport_error)?;
        ensure_success(response).await
    }

    async fn inference_health(&self) -> Result<bool, ServiceError> {
        let response = self
            .http
            .get(format!("{}{}", self.inference_url, HEALTH_PATH))
            .send()
            .await
            .map_err(map_transport_error)?;
        Ok(response.status().is_success())
    }

    async fn set_node_state(&self, state: OnboardingState, reason: &str) -> Result<(), ServiceError> {
        debug!("[HttpNodeClient] set state {} at {}", state, self.poc_url);
        let response = self
            .http
            .post(format!("{}{}", self.poc_url, NODE_STATE_PATH))
            .json(&NodeStateRequest { state, reason })
            .send()
            .await
            .map_err(map_transport_error)?;
        ensure_success(response).await
    }
}

/// Factory dùng chung một reqwest connection pool cho mọi node
#[derive(Debug, Clone)]
pub struct HttpNodeClientFactory {
    http: reqwest::Client,
}

impl HttpNodeClientFactory {
    pub fn new(timeout: Duration) -> Result<Self, ServiceError> {
        Ok(Self {
            http: build_client(timeout)?,
        })
    }
}

impl NodeClientFactory for HttpNodeClientFactory {
    fn create(&self, poc_url: &str, inference_url: &str) -> Arc<dyn NodeClient> {
        Arc::new(HttpNodeClient::with_client(self.http.clone(), poc_url, inference_url))
    }
}

/// Gửi sample chat-completion bằng reqwest
#[derive(Debug, Clone)]
pub struct HttpCompletionSender {
    http: reqwest::Client,
}

impl HttpCompletionSender {
    pub fn new(timeout: Duration) -> Result<Self, ServiceError> {
        Ok(Self {
            http: build_client(timeout)?,
        })
    }
}

#[async_trait]
impl CompletionSender for HttpCompletionSender {
    async fn post_json(&self, url: &str, body: Vec<u8>) -> Result<u16, ServiceError> {
        let response = self
            .http
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(map_transport_error)?;
        Ok(response.status().as_u16())
    }
}
