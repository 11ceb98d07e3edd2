//! Data models for the AI chat proxy

use serde::{Deserialize, Serialize};

use crate::annotation::Annotation;
use crate::article::Article;

/// Upstream model family the proxy forwards to
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// DeepSeek models
    #[default]
    Deepseek,
    /// Qwen models
    Qwen,
}

impl Provider {
    /// Provider serving a model name
    pub fn for_model(model: &str) -> Self {
        if model.to_lowercase().contains("qwen") { Self::Qwen } else { Self::Deepseek }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deepseek => "deepseek",
            Self::Qwen => "qwen",
        }
    }
}

/// Request body for `POST /api/ai/chat`
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ChatRequest {
    /// The student's message
    pub message: String,
    /// Model name
    pub model: String,
    /// Provider derived from the model name
    pub provider: Provider,
}

impl ChatRequest {
    /// Create a request, deriving the provider from the model name
    pub fn new(message: impl Into<String>, model: impl Into<String>) -> Self {
        let model = model.into();
        Self { message: message.into(), provider: Provider::for_model(&model), model }
    }
}

/// Response body of `POST /api/ai/chat`
///
/// The proxy answers `{success, response}` on success and `{error}` (with or
/// without `success: false`) on failure.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ChatResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
}

/// Response body of `GET /api/ai/health`
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Question asking the tutor to explain an annotated passage
pub fn explain_prompt(article: &Article, annotation: &Annotation) -> String {
    format!(
        "我在阅读《{}》时用{}（{}）标记了这段文字：\n「{}」\n请从{}的角度帮我讲解这段文字。",
        article.title(),
        annotation.tool.label(),
        annotation.color.label(),
        annotation.text,
        annotation.analysis_mode.label()
    )
}
