//! Parsing of selection targets given on the command line

use crate::annotation::Selection;
use crate::article::{Article, Span};

/// A part of the article named on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Char offsets: `12..18`
    Range(Span),
    /// Quoted text, optionally the n-th occurrence (1-based): `明月@2`
    Text { needle: String, occurrence: usize },
}

/// Result of parsing a target
#[derive(Debug, PartialEq, Eq)]
pub enum ParseResult {
    /// Successfully parsed target
    Ok(Target),
    /// Nothing given
    Empty,
    /// Malformed offsets or occurrence
    Invalid(String),
}

/// Parse a target string
pub fn parse_target(input: &str) -> ParseResult {
    let input = input.trim();

    if input.is_empty() {
        return ParseResult::Empty;
    }

    if let Some((start, end)) = input.split_once("..") {
        if is_number(start) && is_number(end) {
            return match (start.parse(), end.parse()) {
                (Ok(start), Ok(end)) if start <= end => {
                    ParseResult::Ok(Target::Range(Span::new(start, end)))
                }
                _ => ParseResult::Invalid(input.to_string()),
            };
        }
    }

    if let Some((needle, occurrence)) = input.rsplit_once('@') {
        if !needle.is_empty() && is_number(occurrence) {
            return match occurrence.parse::<usize>() {
                Ok(n) if n > 0 => {
                    ParseResult::Ok(Target::Text { needle: needle.to_string(), occurrence: n })
                }
                _ => ParseResult::Invalid(input.to_string()),
            };
        }
    }

    ParseResult::Ok(Target::Text { needle: input.to_string(), occurrence: 1 })
}

fn is_number(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

impl Target {
    /// Selection over the article, or `None` if the text does not occur
    ///
    /// Ranges are passed through unchecked; the engine rejects bad ones.
    pub fn resolve(&self, article: &Article) -> Option<Selection> {
        match self {
            Target::Range(span) => Some(Selection::from(*span)),
            Target::Text { needle, occurrence } => {
                let index = occurrence.checked_sub(1)?;
                article.find_all(needle).get(index).copied().map(Selection::from)
            }
        }
    }
}
