//! Annotation data model

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::article::Span;

/// Identifier of an annotation, increasing in creation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotationId(pub u64);

impl fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Identifier of a note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(pub u64);

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Pointer shape shown over the article while a tool is active
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorHint {
    /// Normal reading cursor
    Auto,
    /// Text insertion cursor for span tools
    Text,
    /// Crosshair for word-circling tools
    Crosshair,
}

/// Marker tool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    #[default]
    Highlight,
    Underline,
    Circle,
    Note,
    Bracket,
}

impl Tool {
    pub fn all() -> &'static [Tool] {
        &[Self::Highlight, Self::Underline, Self::Circle, Self::Note, Self::Bracket]
    }

    /// Name used in CSS classes and serialized data
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Highlight => "highlight",
            Self::Underline => "underline",
            Self::Circle => "circle",
            Self::Note => "note",
            Self::Bracket => "bracket",
        }
    }

    /// Label shown in the tool palette
    pub fn label(&self) -> &'static str {
        match self {
            Self::Highlight => "高亮标记",
            Self::Underline => "下划线",
            Self::Circle => "圈词",
            Self::Note => "添加笔记",
            Self::Bracket => "括号",
        }
    }

    pub fn cursor(&self) -> CursorHint {
        match self {
            Self::Highlight | Self::Underline | Self::Note => CursorHint::Text,
            Self::Circle | Self::Bracket => CursorHint::Crosshair,
        }
    }

    /// Parse a tool name (English or palette label)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "highlight" | "高亮" | "高亮标记" => Some(Self::Highlight),
            "underline" | "下划线" => Some(Self::Underline),
            "circle" | "圈词" | "圈圈" => Some(Self::Circle),
            "note" | "笔记" | "添加笔记" => Some(Self::Note),
            "bracket" | "括号" => Some(Self::Bracket),
            _ => None,
        }
    }
}

impl std::str::FromStr for Tool {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| {
            format!("Unknown tool: {}. Options: highlight, underline, circle, note, bracket", s)
        })
    }
}

/// Colour tag of a marker; each colour carries a reading meaning
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorTag {
    #[default]
    Yellow,
    Green,
    Blue,
    Red,
    Purple,
    Orange,
}

impl ColorTag {
    pub fn all() -> &'static [ColorTag] {
        &[Self::Yellow, Self::Green, Self::Blue, Self::Red, Self::Purple, Self::Orange]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yellow => "yellow",
            Self::Green => "green",
            Self::Blue => "blue",
            Self::Red => "red",
            Self::Purple => "purple",
            Self::Orange => "orange",
        }
    }

    /// What the colour marks
    pub fn label(&self) -> &'static str {
        match self {
            Self::Yellow => "重点内容",
            Self::Green => "关键词",
            Self::Blue => "结构词",
            Self::Red => "问题相关",
            Self::Purple => "情感表达",
            Self::Orange => "修辞手法",
        }
    }

    /// Marker colour as `#rrggbb`
    pub fn hex(&self) -> &'static str {
        match self {
            Self::Yellow => "#ffeb3b",
            Self::Green => "#4caf50",
            Self::Blue => "#2196f3",
            Self::Red => "#f44336",
            Self::Purple => "#9c27b0",
            Self::Orange => "#ff9800",
        }
    }

    /// Marker colour as RGB components
    pub fn rgb(&self) -> (u8, u8, u8) {
        let hex = &self.hex()[1..];
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).unwrap_or(0);
        (channel(0), channel(2), channel(4))
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "yellow" | "重点内容" => Some(Self::Yellow),
            "green" | "关键词" => Some(Self::Green),
            "blue" | "结构词" => Some(Self::Blue),
            "red" | "问题相关" => Some(Self::Red),
            "purple" | "情感表达" => Some(Self::Purple),
            "orange" | "修辞手法" => Some(Self::Orange),
            _ => None,
        }
    }
}

impl std::str::FromStr for ColorTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| {
            format!("Unknown color: {}. Options: yellow, green, blue, red, purple, orange", s)
        })
    }
}

/// Reading lens the student is applying while annotating
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    /// Paragraph hierarchy and logical relations
    #[default]
    Structure,
    /// Central idea and main points
    Theme,
    /// Rhetoric and expression techniques
    Language,
    /// Emotional colouring and the author's attitude
    Emotion,
    /// Locating the text a question refers to
    Question,
}

impl AnalysisMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Structure => "structure",
            Self::Theme => "theme",
            Self::Language => "language",
            Self::Emotion => "emotion",
            Self::Question => "question",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Structure => "结构分析",
            Self::Theme => "主题分析",
            Self::Language => "语言分析",
            Self::Emotion => "情感分析",
            Self::Question => "答题定位",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "structure" | "结构分析" => Some(Self::Structure),
            "theme" | "主题分析" => Some(Self::Theme),
            "language" | "语言分析" => Some(Self::Language),
            "emotion" | "情感分析" => Some(Self::Emotion),
            "question" | "答题定位" => Some(Self::Question),
            _ => None,
        }
    }
}

impl std::str::FromStr for AnalysisMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| {
            format!("Unknown analysis mode: {}. Options: structure, theme, language, emotion, question", s)
        })
    }
}

/// A user-created marker over a span of the article
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: AnnotationId,
    pub tool: Tool,
    pub color: ColorTag,
    pub span: Span,
    /// Article text under the span at creation time
    pub text: String,
    #[serde(default)]
    pub analysis_mode: AnalysisMode,
    pub article_id: String,
    pub created_at: DateTime<Utc>,
}

/// Free text attached to a span
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    /// Annotation the note was written on; `None` once detached
    pub annotation_id: Option<AnnotationId>,
    pub span: Span,
    /// Article text the note refers to
    pub quote: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Note {
    pub fn is_detached(&self) -> bool {
        self.annotation_id.is_none()
    }
}

/// A selection reported by the reader, in char offsets
///
/// Unlike a [`Span`] a selection may be collapsed, inverted or out of bounds;
/// the engine validates it before anything is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub anchor: usize,
    pub focus: usize,
}

impl Selection {
    pub fn new(anchor: usize, focus: usize) -> Self {
        Self { anchor, focus }
    }

    /// A click without drag
    pub fn collapsed(at: usize) -> Self {
        Self { anchor: at, focus: at }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    /// The selected range with anchor and focus ordered
    pub fn span(&self) -> Span {
        Span::new(self.anchor.min(self.focus), self.anchor.max(self.focus))
    }
}

impl From<Span> for Selection {
    fn from(span: Span) -> Self {
        Self { anchor: span.start, focus: span.end }
    }
}
