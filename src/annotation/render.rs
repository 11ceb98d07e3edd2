//! Marker layout derived from annotation offsets
//!
//! The rendered tree is rebuilt from the article text and the annotation list
//! every time; nothing holds on to rendered nodes. Each paragraph becomes a
//! block. Annotations that nest properly become nested markers. An annotation
//! that crosses a paragraph break or the edge of another marker is carried by
//! several marker fragments with the same id, so its text is never lost or
//! duplicated.

use std::cmp::Reverse;

use super::model::{AnalysisMode, Annotation, AnnotationId, ColorTag, Tool};
use crate::article::{Article, Span};

/// Node of the rendered article
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    Marker {
        id: AnnotationId,
        tool: Tool,
        color: ColorTag,
        analysis_mode: AnalysisMode,
        children: Vec<Node>,
    },
}

impl Node {
    fn collect_text(&self, out: &mut String) {
        match self {
            Node::Text(text) => out.push_str(text),
            Node::Marker { children, .. } => children.iter().for_each(|c| c.collect_text(out)),
        }
    }

    fn visit_markers<'a>(&'a self, f: &mut impl FnMut(&'a Node)) {
        if let Node::Marker { children, .. } = self {
            f(self);
            for child in children {
                child.visit_markers(f);
            }
        }
    }
}

/// An article rendered with its markers, one block per paragraph
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedDocument {
    pub blocks: Vec<Vec<Node>>,
}

impl RenderedDocument {
    /// Plain text of the whole document, paragraphs joined by `\n`
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for (i, block) in self.blocks.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            block.iter().for_each(|node| node.collect_text(&mut out));
        }
        out
    }

    /// Number of marker elements carrying an annotation
    pub fn fragment_count(&self, id: AnnotationId) -> usize {
        let mut count = 0;
        self.for_each_marker(|node| {
            if matches!(node, Node::Marker { id: marker, .. } if *marker == id) {
                count += 1;
            }
        });
        count
    }

    /// Text recoverable from the markers of an annotation, in document order
    pub fn marker_text(&self, id: AnnotationId) -> String {
        let mut out = String::new();
        self.for_each_marker(|node| {
            if matches!(node, Node::Marker { id: marker, .. } if *marker == id) {
                node.collect_text(&mut out);
            }
        });
        out
    }

    /// Distinct annotation ids present as markers, ascending
    pub fn marker_ids(&self) -> Vec<AnnotationId> {
        let mut ids = Vec::new();
        self.for_each_marker(|node| {
            if let Node::Marker { id, .. } = node {
                ids.push(*id);
            }
        });
        ids.sort();
        ids.dedup();
        ids
    }

    /// Total number of marker elements
    pub fn marker_count(&self) -> usize {
        let mut count = 0;
        self.for_each_marker(|_| count += 1);
        count
    }

    fn for_each_marker<'a>(&'a self, mut f: impl FnMut(&'a Node)) {
        for node in self.blocks.iter().flatten() {
            node.visit_markers(&mut f);
        }
    }

    /// HTML with one `<p>` per paragraph and a `<span>` per marker fragment
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for block in &self.blocks {
            out.push_str("<p class=\"paragraph\">");
            block.iter().for_each(|node| write_html(node, &mut out));
            out.push_str("</p>\n");
        }
        out
    }
}

fn write_html(node: &Node, out: &mut String) {
    match node {
        Node::Text(text) => escape_html(text, out),
        Node::Marker { id, tool, color, analysis_mode, children } => {
            out.push_str(&format!(
                "<span class=\"annotation annotation-{} annotation-{}\" data-annotation-id=\"{}\" data-analysis-mode=\"{}\">",
                tool.as_str(),
                color.as_str(),
                id,
                analysis_mode.as_str()
            ));
            children.iter().for_each(|c| write_html(c, out));
            out.push_str("</span>");
        }
    }
}

fn escape_html(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
}

/// Open marker while a paragraph is being built
struct Frame<'a> {
    annotation: Option<&'a Annotation>,
    children: Vec<Node>,
}

/// Append text, merging with a preceding text node
fn push_text(children: &mut Vec<Node>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Node::Text(last)) = children.last_mut() {
        last.push_str(text);
    } else {
        children.push(Node::Text(text.to_string()));
    }
}

fn close_top(stack: &mut Vec<Frame<'_>>) {
    let Some(frame) = stack.pop() else { return };
    let Some(annotation) = frame.annotation else {
        stack.push(frame);
        return;
    };
    let node = Node::Marker {
        id: annotation.id,
        tool: annotation.tool,
        color: annotation.color,
        analysis_mode: annotation.analysis_mode,
        children: frame.children,
    };
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    }
}

fn render_paragraph(article: &Article, paragraph: Span, annotations: &[&Annotation]) -> Vec<Node> {
    let relevant: Vec<&Annotation> =
        annotations.iter().copied().filter(|a| a.span.intersects(&paragraph)).collect();

    let mut cuts = vec![paragraph.start, paragraph.end];
    for annotation in &relevant {
        for point in [annotation.span.start, annotation.span.end] {
            if point > paragraph.start && point < paragraph.end {
                cuts.push(point);
            }
        }
    }
    cuts.sort_unstable();
    cuts.dedup();

    let mut stack = vec![Frame { annotation: None, children: Vec::new() }];

    for window in cuts.windows(2) {
        let segment = Span::new(window[0], window[1]);
        // Outermost first; the key is fixed per annotation so every segment
        // orders its covering set the same way.
        let mut covering: Vec<&Annotation> =
            relevant.iter().copied().filter(|a| a.span.contains(&segment)).collect();
        covering.sort_by_key(|a| (a.span.start, Reverse(a.span.end), a.id));

        let common = stack[1..]
            .iter()
            .zip(&covering)
            .take_while(|(frame, a)| frame.annotation.map(|f| f.id) == Some(a.id))
            .count();
        while stack.len() > common + 1 {
            close_top(&mut stack);
        }
        for annotation in &covering[common..] {
            stack.push(Frame { annotation: Some(*annotation), children: Vec::new() });
        }

        let text = article.slice(segment).unwrap_or_default();
        if let Some(top) = stack.last_mut() {
            push_text(&mut top.children, text);
        }
    }

    while stack.len() > 1 {
        close_top(&mut stack);
    }
    stack.pop().map(|root| root.children).unwrap_or_default()
}

/// Render an article with its annotations
pub fn render<'a>(
    article: &Article,
    annotations: impl IntoIterator<Item = &'a Annotation>,
) -> RenderedDocument {
    let annotations: Vec<&Annotation> =
        annotations.into_iter().filter(|a| !a.span.is_empty()).collect();
    let blocks = article
        .paragraphs()
        .into_iter()
        .map(|paragraph| render_paragraph(article, paragraph, &annotations))
        .collect();
    RenderedDocument { blocks }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn annotation(id: u64, start: usize, end: usize) -> Annotation {
        Annotation {
            id: AnnotationId(id),
            tool: Tool::Highlight,
            color: ColorTag::Yellow,
            span: Span::new(start, end),
            text: String::new(),
            analysis_mode: AnalysisMode::Structure,
            article_id: "t".into(),
            created_at: Utc::now(),
        }
    }

    fn marker(id: u64, children: Vec<Node>) -> Node {
        Node::Marker {
            id: AnnotationId(id),
            tool: Tool::Highlight,
            color: ColorTag::Yellow,
            analysis_mode: AnalysisMode::Structure,
            children,
        }
    }

    fn text(s: &str) -> Node {
        Node::Text(s.to_string())
    }

    #[test]
    fn no_annotations_renders_plain_paragraphs() {
        let article = Article::new("t", "t", "第一段\n第二段");
        let doc = render(&article, std::iter::empty());
        assert_eq!(doc.blocks, vec![vec![text("第一段")], vec![text("第二段")]]);
        assert_eq!(doc.text_content(), article.content());
    }

    #[test]
    fn single_annotation_wraps_exact_text() {
        let article = Article::new("t", "t", "这是重点内容。");
        let annotations = [annotation(1, 2, 6)];
        let doc = render(&article, &annotations);
        assert_eq!(
            doc.blocks,
            vec![vec![text("这是"), marker(1, vec![text("重点内容")]), text("。")]]
        );
        assert_eq!(doc.fragment_count(AnnotationId(1)), 1);
        assert_eq!(doc.marker_text(AnnotationId(1)), "重点内容");
    }

    #[test]
    fn nested_annotations_nest() {
        let article = Article::new("t", "t", "abcdefgh");
        let annotations = [annotation(1, 1, 7), annotation(2, 3, 5)];
        let doc = render(&article, &annotations);
        assert_eq!(
            doc.blocks,
            vec![vec![
                text("a"),
                marker(1, vec![text("bc"), marker(2, vec![text("de")]), text("fg")]),
                text("h"),
            ]]
        );
        assert_eq!(doc.fragment_count(AnnotationId(1)), 1);
        assert_eq!(doc.fragment_count(AnnotationId(2)), 1);
    }

    #[test]
    fn crossing_annotations_split_the_later_one() {
        let article = Article::new("t", "t", "abcdefgh");
        let annotations = [annotation(1, 0, 5), annotation(2, 3, 8)];
        let doc = render(&article, &annotations);
        assert_eq!(
            doc.blocks,
            vec![vec![
                marker(1, vec![text("abc"), marker(2, vec![text("de")])]),
                marker(2, vec![text("fgh")]),
            ]]
        );
        assert_eq!(doc.fragment_count(AnnotationId(2)), 2);
        assert_eq!(doc.marker_text(AnnotationId(2)), "defgh");
        assert_eq!(doc.text_content(), "abcdefgh");
    }

    #[test]
    fn annotation_across_paragraphs_is_split_per_paragraph() {
        let article = Article::new("t", "t", "春眠不觉晓\n处处闻啼鸟");
        let annotations = [annotation(1, 3, 8)];
        let doc = render(&article, &annotations);
        assert_eq!(doc.fragment_count(AnnotationId(1)), 2);
        assert_eq!(doc.marker_text(AnnotationId(1)), "觉晓处处");
        assert_eq!(doc.text_content(), article.content());
    }

    #[test]
    fn identical_spans_nest_by_id() {
        let article = Article::new("t", "t", "abc");
        let annotations = [annotation(2, 0, 3), annotation(1, 0, 3)];
        let doc = render(&article, &annotations);
        assert_eq!(doc.blocks, vec![vec![marker(1, vec![marker(2, vec![text("abc")])])]]);
    }

    #[test]
    fn marker_ids_are_distinct_and_sorted() {
        let article = Article::new("t", "t", "abcdefgh");
        let annotations = [annotation(3, 0, 5), annotation(1, 3, 8)];
        let doc = render(&article, &annotations);
        assert_eq!(doc.marker_ids(), vec![AnnotationId(1), AnnotationId(3)]);
    }

    #[test]
    fn html_escapes_text_and_tags_markers() {
        let article = Article::new("t", "t", "a<b>&c");
        let annotations = [annotation(4, 1, 4)];
        let html = render(&article, &annotations).to_html();
        assert_eq!(
            html,
            "<p class=\"paragraph\">a<span class=\"annotation annotation-highlight annotation-yellow\" data-annotation-id=\"4\" data-analysis-mode=\"structure\">&lt;b&gt;</span>&amp;c</p>\n"
        );
    }
}
