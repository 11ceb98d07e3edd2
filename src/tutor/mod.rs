//! AI tutor integration
//!
//! Client for the backend's AI chat proxy, which forwards a student's
//! question to a DeepSeek or Qwen model and returns the answer.

pub mod client;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use client::TutorClient;
pub use error::TutorError;
pub use models::{ChatRequest, ChatResponse, Provider, explain_prompt};
