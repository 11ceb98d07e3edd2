//! Yuwen - reading annotations for Chinese reading comprehension
//!
//! Yuwen lets students mark up an article with highlights, underlines,
//! circles, brackets and notes, find structure and rhetoric keywords, and
//! ask an AI tutor about the passages they marked.

pub mod annotation;
pub mod app;
pub mod article;
pub mod config;
pub mod suggest;
pub mod tutor;
pub mod ui;

pub use annotation::AnnotationEngine;
pub use app::Workspace;
pub use article::Article;
pub use config::Config;
