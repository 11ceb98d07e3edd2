//! Reading annotations
//!
//! Readers mark spans of an article with highlight, underline, circle,
//! bracket or note markers. Spans are char offsets over the article text;
//! the marker layout is re-derived from them whenever it is needed.

pub mod engine;
pub mod error;
pub mod export;
pub mod model;
pub mod render;
pub mod storage;

// Re-exports
pub use engine::{
    AnnotationEngine, AnnotationStats, ChangeEvent, ChangeKind, CommitOutcome, IgnoreReason, Mode,
    ModeView, RestoreReport, SubscriptionId, WrapOutcome,
};
pub use error::AnnotationError;
pub use export::{AnnotationExport, EXPORT_VERSION};
pub use model::{
    AnalysisMode, Annotation, AnnotationId, ColorTag, CursorHint, Note, NoteId, Selection, Tool,
};
pub use render::{Node, RenderedDocument};
pub use storage::AnnotationStore;

pub use crate::article::Span;
