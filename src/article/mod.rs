//! Articles being read and annotated
//!
//! An article's plain text is the stable coordinate space for every
//! annotation. Positions are char offsets (Unicode scalar values), never
//! byte offsets, so that a selection over Chinese text maps one-to-one to
//! the characters a reader sees.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Half-open range `[start, end)` of char offsets in an article
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Number of chars covered
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Whether the two spans share at least one char
    pub fn intersects(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Whether `other` lies entirely inside this span
    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// A text document displayed to the reader
#[derive(Debug, Clone)]
pub struct Article {
    id: String,
    title: String,
    content: String,
    /// Byte offset of every char boundary, including the end of the text
    boundaries: Vec<usize>,
}

impl Article {
    /// Create an article from its plain text
    pub fn new(id: impl Into<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        let boundaries =
            content.char_indices().map(|(i, _)| i).chain(std::iter::once(content.len())).collect();
        Self { id: id.into(), title: title.into(), content, boundaries }
    }

    /// Read an article from a UTF-8 text file
    ///
    /// The canonical path is the id, so files with the same name in different
    /// directories never share annotations; the file stem is the title.
    /// Windows line endings are normalized so paragraphs split on `\n` only.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read article from {:?}", path))?;
        let canonical = path
            .canonicalize()
            .with_context(|| format!("Failed to resolve article path {:?}", path))?;
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .with_context(|| format!("Article path has no usable file name: {:?}", path))?;

        Ok(Self::new(canonical.to_string_lossy(), stem, raw.replace("\r\n", "\n")))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// The full plain text
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Length in chars
    pub fn char_len(&self) -> usize {
        self.boundaries.len() - 1
    }

    /// Text covered by a span, `None` if the span is out of bounds or inverted
    pub fn slice(&self, span: Span) -> Option<&str> {
        if span.start > span.end || span.end > self.char_len() {
            return None;
        }
        Some(&self.content[self.boundaries[span.start]..self.boundaries[span.end]])
    }

    /// Char at a char offset
    pub fn char_at(&self, index: usize) -> Option<char> {
        if index >= self.char_len() {
            return None;
        }
        self.content[self.boundaries[index]..].chars().next()
    }

    /// Convert a byte offset on a char boundary into a char offset
    pub fn byte_to_char(&self, byte: usize) -> Option<usize> {
        self.boundaries.binary_search(&byte).ok()
    }

    /// Char ranges of the paragraphs, i.e. the lines between `\n` separators
    ///
    /// Separators belong to no paragraph. An empty article has one empty paragraph.
    pub fn paragraphs(&self) -> Vec<Span> {
        let mut paragraphs = Vec::new();
        let mut start = 0;
        for (index, ch) in self.content.chars().enumerate() {
            if ch == '\n' {
                paragraphs.push(Span::new(start, index));
                start = index + 1;
            }
        }
        paragraphs.push(Span::new(start, self.char_len()));
        paragraphs
    }

    /// First occurrence of `needle`
    pub fn find(&self, needle: &str) -> Option<Span> {
        self.find_all(needle).into_iter().next()
    }

    /// Every non-overlapping occurrence of `needle`, in order
    pub fn find_all(&self, needle: &str) -> Vec<Span> {
        if needle.is_empty() {
            return Vec::new();
        }
        let needle_chars = needle.chars().count();
        self.content
            .match_indices(needle)
            .filter_map(|(byte, _)| self.byte_to_char(byte))
            .map(|start| Span::new(start, start + needle_chars))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn sample() -> Article {
        Article::new("a1", "春", "盼望着，盼望着。\n东风来了，春天的脚步近了。")
    }

    #[test]
    fn char_len_counts_chars_not_bytes() {
        let article = sample();
        assert_eq!(article.char_len(), 22);
        assert!(article.content().len() > article.char_len());
    }

    #[test]
    fn slice_uses_char_offsets() {
        let article = sample();
        assert_eq!(article.slice(Span::new(0, 3)), Some("盼望着"));
        assert_eq!(article.slice(Span::new(9, 11)), Some("东风"));
        assert_eq!(article.slice(Span::new(5, 5)), Some(""));
        assert_eq!(article.slice(Span::new(3, 2)), None);
        assert_eq!(article.slice(Span::new(0, 23)), None);
    }

    #[test]
    fn paragraphs_exclude_separators() {
        let article = sample();
        let paragraphs = article.paragraphs();
        assert_eq!(paragraphs, vec![Span::new(0, 8), Span::new(9, 22)]);
        assert_eq!(article.char_at(8), Some('\n'));
    }

    #[test]
    fn paragraphs_of_empty_lines() {
        let article = Article::new("x", "x", "\n\n");
        assert_eq!(
            article.paragraphs(),
            vec![Span::new(0, 0), Span::new(1, 1), Span::new(2, 2)]
        );
        let empty = Article::new("e", "e", "");
        assert_eq!(empty.paragraphs(), vec![Span::new(0, 0)]);
    }

    #[test]
    fn find_reports_char_spans() {
        let article = sample();
        assert_eq!(article.find("春天"), Some(Span::new(14, 16)));
        assert_eq!(article.find_all("盼望着"), vec![Span::new(0, 3), Span::new(4, 7)]);
        assert_eq!(article.find("秋天"), None);
        assert!(article.find_all("").is_empty());
    }

    #[test]
    fn byte_to_char_rejects_mid_char_offsets() {
        let article = sample();
        assert_eq!(article.byte_to_char(0), Some(0));
        assert_eq!(article.byte_to_char(3), Some(1));
        assert_eq!(article.byte_to_char(1), None);
    }

    #[test]
    fn span_relations() {
        let outer = Span::new(2, 10);
        assert!(outer.contains(&Span::new(2, 10)));
        assert!(outer.contains(&Span::new(4, 6)));
        assert!(!outer.contains(&Span::new(1, 6)));
        assert!(outer.intersects(&Span::new(9, 12)));
        assert!(!outer.intersects(&Span::new(10, 12)));
        assert_eq!(outer.len(), 8);
        assert!(Span::new(3, 3).is_empty());
    }

    #[test]
    fn from_file_uses_path_and_stem_and_normalizes_newlines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("背影.txt");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all("我与父亲不相见已二年余了。\r\n我最不能忘记的是他的背影。".as_bytes()).unwrap();

        let article = Article::from_file(&path).unwrap();
        assert_eq!(article.id(), path.canonicalize().unwrap().to_string_lossy());
        assert_eq!(article.title(), "背影");
        assert_eq!(article.paragraphs().len(), 2);
        assert!(!article.content().contains('\r'));
    }

    #[test]
    fn same_file_name_in_two_directories_gets_two_ids() {
        let dir = TempDir::new().unwrap();
        let mut paths = Vec::new();
        for sub in ["a", "b"] {
            std::fs::create_dir(dir.path().join(sub)).unwrap();
            let path = dir.path().join(sub).join("春.txt");
            std::fs::write(&path, format!("{}的春天", sub)).unwrap();
            paths.push(path);
        }

        let first = Article::from_file(&paths[0]).unwrap();
        let second = Article::from_file(&paths[1]).unwrap();
        assert_ne!(first.id(), second.id());
        assert_eq!(first.title(), second.title());

        let again = Article::from_file(&dir.path().join("a").join("..").join("a").join("春.txt")).unwrap();
        assert_eq!(again.id(), first.id());
    }
}
