//! Keyword scanning for assisted annotation
//!
//! Finds members of fixed keyword categories in an article's plain text and
//! reports where they are. Nothing here creates annotations; the reader
//! decides what to mark.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::annotation::{AnalysisMode, ColorTag};
use crate::article::{Article, Span};

/// Fixed keyword category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeywordCategory {
    /// Connectives that expose paragraph structure
    Structure,
    /// Markers of simile and metaphor
    Rhetoric,
    /// Words naming emotions
    Emotion,
}

impl KeywordCategory {
    pub fn all() -> &'static [KeywordCategory] {
        &[Self::Structure, Self::Rhetoric, Self::Emotion]
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Structure => "结构词",
            Self::Rhetoric => "修辞手法",
            Self::Emotion => "情感词",
        }
    }

    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Self::Structure => {
                &["首先", "其次", "然后", "最后", "总之", "因此", "所以", "但是", "然而", "不过"]
            }
            Self::Rhetoric => &["像", "如同", "仿佛", "好似", "比作", "犹如"],
            Self::Emotion => &["喜悦", "愤怒", "悲伤", "激动", "感动", "失望", "兴奋", "痛苦"],
        }
    }

    /// Colour a reader would usually mark this category with
    pub fn suggested_color(&self) -> ColorTag {
        match self {
            Self::Structure => ColorTag::Blue,
            Self::Rhetoric => ColorTag::Orange,
            Self::Emotion => ColorTag::Purple,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "structure" | "结构词" | "connective" | "connectives" => Some(Self::Structure),
            "rhetoric" | "修辞手法" | "修辞" => Some(Self::Rhetoric),
            "emotion" | "情感词" | "情感" => Some(Self::Emotion),
            _ => None,
        }
    }

    fn pattern(&self) -> &'static Regex {
        match self {
            Self::Structure => &STRUCTURE_RE,
            Self::Rhetoric => &RHETORIC_RE,
            Self::Emotion => &EMOTION_RE,
        }
    }
}

impl std::str::FromStr for KeywordCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
            .ok_or_else(|| format!("Unknown category: {}. Options: structure, rhetoric, emotion", s))
    }
}

/// Alternation of the keywords, longest first so that leftmost matches are also longest
fn keyword_pattern(keywords: &[&str]) -> Regex {
    let mut sorted: Vec<&str> = keywords.to_vec();
    sorted.sort_by_key(|k| std::cmp::Reverse(k.chars().count()));
    let alternation: Vec<String> = sorted.iter().map(|k| regex::escape(k)).collect();
    Regex::new(&alternation.join("|")).unwrap()
}

static STRUCTURE_RE: Lazy<Regex> =
    Lazy::new(|| keyword_pattern(KeywordCategory::Structure.keywords()));
static RHETORIC_RE: Lazy<Regex> =
    Lazy::new(|| keyword_pattern(KeywordCategory::Rhetoric.keywords()));
static EMOTION_RE: Lazy<Regex> = Lazy::new(|| keyword_pattern(KeywordCategory::Emotion.keywords()));

/// One keyword occurrence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordMatch {
    pub category: KeywordCategory,
    pub keyword: String,
    pub span: Span,
    pub color: ColorTag,
}

/// Every non-overlapping keyword of a category in the article, in text order
pub fn scan(article: &Article, category: KeywordCategory) -> Vec<KeywordMatch> {
    let matches: Vec<KeywordMatch> = category
        .pattern()
        .find_iter(article.content())
        .filter_map(|m| {
            let start = article.byte_to_char(m.start())?;
            let end = article.byte_to_char(m.end())?;
            Some(KeywordMatch {
                category,
                keyword: m.as_str().to_string(),
                span: Span::new(start, end),
                color: category.suggested_color(),
            })
        })
        .collect();

    tracing::debug!(category = category.label(), count = matches.len(), "Keyword scan");
    matches
}

/// A toolbar hint for the current analysis mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    /// What to look for
    pub text: String,
    /// Kind of marking
    pub kind: &'static str,
    pub color: ColorTag,
    /// Category that can be scanned automatically, if any
    pub category: Option<KeywordCategory>,
}

impl Suggestion {
    fn new(
        text: impl Into<String>,
        kind: &'static str,
        color: ColorTag,
        category: Option<KeywordCategory>,
    ) -> Self {
        Self { text: text.into(), kind, color, category }
    }
}

/// Marking hints for an analysis mode
///
/// `question_count` only matters in question mode, where every question gets
/// a hint of its own.
pub fn suggestions_for(mode: AnalysisMode, question_count: usize) -> Vec<Suggestion> {
    use KeywordCategory::*;

    match mode {
        AnalysisMode::Structure => vec![
            Suggestion::new("首先、其次、最后", "结构词", ColorTag::Blue, Some(Structure)),
            Suggestion::new("总之、因此、所以", "总结词", ColorTag::Blue, Some(Structure)),
            Suggestion::new("但是、然而、不过", "转折词", ColorTag::Blue, Some(Structure)),
        ],
        AnalysisMode::Theme => vec![
            Suggestion::new("中心句、主旨句", "主题相关", ColorTag::Yellow, None),
            Suggestion::new("关键词", "核心内容", ColorTag::Green, None),
        ],
        AnalysisMode::Language => vec![
            Suggestion::new("比喻、拟人、排比", "修辞手法", ColorTag::Orange, Some(Rhetoric)),
            Suggestion::new("描写、叙述、议论", "表达方式", ColorTag::Orange, None),
        ],
        AnalysisMode::Emotion => vec![
            Suggestion::new("喜怒哀乐相关词", "情感词", ColorTag::Purple, Some(Emotion)),
            Suggestion::new("语气词、感叹词", "情感表达", ColorTag::Purple, None),
        ],
        AnalysisMode::Question => (1..=question_count)
            .map(|n| Suggestion::new(format!("题目{}相关内容", n), "答题定位", ColorTag::Red, None))
            .collect(),
    }
}
