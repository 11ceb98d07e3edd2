//! HTTP client for the AI chat proxy

use std::time::Duration;

use reqwest::Client;
use tokio_util::sync::CancellationToken;

use super::error::TutorError;
use super::models::{ChatRequest, ChatResponse, HealthResponse};
use crate::config::ApiConfig;

/// AI tutor client
pub struct TutorClient {
    /// HTTP client
    client: Client,
    /// Backend base URL without trailing slash
    base_url: String,
}

impl TutorClient {
    /// Chat endpoint path
    const CHAT_PATH: &'static str = "/api/ai/chat";
    /// Health endpoint path
    const HEALTH_PATH: &'static str = "/api/ai/health";

    /// Create a client for the configured backend
    pub fn new(api: &ApiConfig) -> Result<Self, TutorError> {
        let base_url = api.base_url.as_deref().ok_or(TutorError::Offline)?;
        let client = Client::builder().timeout(Duration::from_millis(api.timeout_ms)).build()?;

        Ok(Self { client, base_url: base_url.trim_end_matches('/').to_string() })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Ask the tutor a question
    ///
    /// Gives up with [`TutorError::Cancelled`] as soon as the token is cancelled,
    /// so a caller that goes away never receives a late answer.
    pub async fn chat(
        &self,
        request: ChatRequest,
        cancel_token: CancellationToken,
    ) -> Result<String, TutorError> {
        if request.message.trim().is_empty() {
            return Err(TutorError::EmptyMessage);
        }

        tracing::debug!(model = %request.model, provider = request.provider.as_str(), "Sending chat request");

        let send = async {
            let response = self.client.post(self.url(Self::CHAT_PATH)).json(&request).send().await?;
            let status = response.status().as_u16();
            let body = response.text().await?;
            Ok::<_, TutorError>((status, body))
        };

        let (status, body) = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                tracing::debug!("Chat request cancelled");
                return Err(TutorError::Cancelled);
            }
            result = send => result?,
        };

        interpret_chat(status, &body)
    }

    /// Check that the proxy is up
    pub async fn health(&self) -> Result<(), TutorError> {
        let response = self.client.get(self.url(Self::HEALTH_PATH)).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        interpret_health(status, &body)
    }
}

/// Turn a health check reply into success or an error
fn interpret_health(status: u16, body: &str) -> Result<(), TutorError> {
    if !(200..300).contains(&status) {
        let message = serde_json::from_str::<HealthResponse>(body)
            .ok()
            .and_then(|h| h.error)
            .unwrap_or_else(|| body.to_string());
        return Err(TutorError::ApiError { status, message });
    }

    let health: HealthResponse = serde_json::from_str(body)?;
    match (health.success, health.error) {
        (Some(false), error) | (_, error @ Some(_)) => {
            Err(TutorError::ServiceError(error.unwrap_or_else(|| "unhealthy".to_string())))
        }
        _ => Ok(()),
    }
}

/// Turn a chat proxy reply into the answer text or an error
fn interpret_chat(status: u16, body: &str) -> Result<String, TutorError> {
    if !(200..300).contains(&status) {
        let message = serde_json::from_str::<ChatResponse>(body)
            .ok()
            .and_then(|r| r.error)
            .unwrap_or_else(|| body.to_string());
        tracing::warn!(status, %message, "Chat proxy returned an error");
        return Err(TutorError::ApiError { status, message });
    }

    let reply: ChatResponse = serde_json::from_str(body)?;
    if reply.success == Some(false) || reply.error.is_some() {
        return Err(TutorError::ServiceError(reply.error.unwrap_or_default()));
    }

    match reply.response {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(TutorError::EmptyResponse),
    }
}
