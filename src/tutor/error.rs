//! Error types for the AI tutor integration

use thiserror::Error;

/// Errors that can occur when talking to the AI chat proxy
#[derive(Debug, Error)]
pub enum TutorError {
    /// No backend in this environment
    #[error("AI tutor unavailable: no backend configured")]
    Offline,

    /// Nothing to ask
    #[error("Message is empty")]
    EmptyMessage,

    /// HTTP request failed (includes timeouts)
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    /// Proxy returned an error status
    #[error("API error ({status}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the proxy
        message: String,
    },

    /// Proxy answered but reported a failure
    #[error("AI service error: {0}")]
    ServiceError(String),

    /// Proxy answered without any text
    #[error("AI service returned an empty response")]
    EmptyResponse,

    /// Request was abandoned by the caller
    #[error("Request cancelled")]
    Cancelled,

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl TutorError {
    /// Check if asking again may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TutorError::RequestError(_)
                | TutorError::Cancelled
                | TutorError::EmptyResponse
                | TutorError::ApiError { status: 500..=599, .. }
        )
    }

    /// Message to show inline in the chat panel
    pub fn inline_message(&self) -> String {
        match self {
            TutorError::Offline => "当前为离线模式，AI助教不可用。".to_string(),
            TutorError::EmptyMessage => "请输入问题内容。".to_string(),
            TutorError::EmptyResponse => "抱歉，我没能生成有效回复。".to_string(),
            TutorError::Cancelled => "请求已取消。".to_string(),
            other => format!("在线API调用失败：{}。请检查后端服务是否启动。", other),
        }
    }
}
