//! Terminal output for annotated articles

use crossterm::style::{Attribute, Color, ContentStyle};

use crate::annotation::{AnnotationEngine, ColorTag, Node, RenderedDocument, Tool};

/// How annotated text is written to the terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStyle {
    /// ANSI colours and attributes
    Styled,
    /// Plain text with `[text]{id}` around each marker fragment
    Plain,
}

fn rgb(color: ColorTag) -> Color {
    let (r, g, b) = color.rgb();
    Color::Rgb { r, g, b }
}

/// Add a marker's look on top of the style of its surroundings
fn marker_style(mut style: ContentStyle, tool: Tool, color: ColorTag) -> ContentStyle {
    match tool {
        Tool::Highlight => {
            style.background_color = Some(rgb(color));
            style.foreground_color = Some(Color::Black);
        }
        Tool::Underline => {
            style.attributes.set(Attribute::Underlined);
            style.underline_color = Some(rgb(color));
        }
        Tool::Circle => {
            style.attributes.set(Attribute::Encircled);
            style.foreground_color = Some(rgb(color));
        }
        Tool::Note => {
            style.attributes.set(Attribute::Underdotted);
            style.attributes.set(Attribute::Italic);
            style.underline_color = Some(rgb(color));
        }
        Tool::Bracket => {
            style.foreground_color = Some(rgb(color));
        }
    }
    style
}

fn write_node(node: &Node, style: ContentStyle, output: OutputStyle, out: &mut String) {
    match (node, output) {
        (Node::Text(text), OutputStyle::Styled) => out.push_str(&style.apply(text).to_string()),
        (Node::Text(text), OutputStyle::Plain) => out.push_str(text),
        (Node::Marker { id, children, .. }, OutputStyle::Plain) => {
            out.push('[');
            children.iter().for_each(|c| write_node(c, style, output, out));
            out.push_str(&format!("]{{{}}}", id));
        }
        (Node::Marker { tool, color, children, .. }, OutputStyle::Styled) => {
            let inner = marker_style(style, *tool, *color);
            if *tool == Tool::Bracket {
                out.push_str(&inner.apply("〔").to_string());
            }
            children.iter().for_each(|c| write_node(c, inner, output, out));
            if *tool == Tool::Bracket {
                out.push_str(&inner.apply("〕").to_string());
            }
        }
    }
}

/// Write a rendered article, one line per paragraph
pub fn format_document(document: &RenderedDocument, output: OutputStyle) -> String {
    let mut out = String::new();
    for block in &document.blocks {
        block.iter().for_each(|node| write_node(node, ContentStyle::new(), output, &mut out));
        out.push('\n');
    }
    out
}

/// Shorten text to `max_chars` chars, marking the cut with an ellipsis
fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let head: String = text.chars().take(max_chars.saturating_sub(1)).collect();
        format!("{}…", head)
    }
}

/// One line per annotation followed by its notes, then detached notes
pub fn format_annotation_list(engine: &AnnotationEngine) -> String {
    let mut out = String::new();

    for annotation in engine.annotations() {
        out.push_str(&format!(
            "#{:<4} {:<9} {:<6} [{}..{}) {}\n",
            annotation.id,
            annotation.tool.as_str(),
            annotation.color.as_str(),
            annotation.span.start,
            annotation.span.end,
            truncate_chars(&annotation.text.replace('\n', " "), 24)
        ));
        for note in engine.notes_for(annotation.id) {
            out.push_str(&format!("       note {}: {}\n", note.id, note.content));
        }
    }

    let detached: Vec<_> = engine.notes().iter().filter(|n| n.is_detached()).collect();
    if !detached.is_empty() {
        out.push_str("detached notes:\n");
        for note in detached {
            out.push_str(&format!(
                "       note {} on 「{}」: {}\n",
                note.id,
                truncate_chars(&note.quote, 16),
                note.content
            ));
        }
    }

    let stats = engine.stats();
    out.push_str(&format!(
        "{} annotations, {} notes, {} colours\n",
        stats.total, stats.notes, stats.distinct_colors
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::Selection;
    use crate::article::Article;
    use crate::config::AnnotationSettings;

    fn engine_with_marks() -> AnnotationEngine {
        let mut engine = AnnotationEngine::new(
            Article::new("t", "t", "春风又绿江南岸\n明月何时照我还"),
            AnnotationSettings::default(),
        );
        engine.enter_annotation_mode(Tool::Highlight, ColorTag::Green);
        engine.commit_selection(Selection::new(3, 4));
        engine.enter_annotation_mode(Tool::Bracket, ColorTag::Blue);
        engine.commit_selection(Selection::new(8, 10));
        engine
    }

    #[test]
    fn plain_output_brackets_fragments() {
        let engine = engine_with_marks();
        let text = format_document(&engine.render(), OutputStyle::Plain);
        assert_eq!(text, "春风又[绿]{1}江南岸\n[明月]{2}何时照我还\n");
    }

    #[test]
    fn styled_output_keeps_text_and_adds_brackets() {
        let engine = engine_with_marks();
        let text = format_document(&engine.render(), OutputStyle::Styled);
        assert!(text.contains('\u{1b}'));
        assert!(text.contains("绿"));
        assert!(text.contains("〔"));
        assert!(text.contains("〕"));
    }

    #[test]
    fn highlight_style_sets_background() {
        let style = marker_style(ContentStyle::new(), Tool::Highlight, ColorTag::Yellow);
        assert_eq!(style.background_color, Some(Color::Rgb { r: 0xff, g: 0xeb, b: 0x3b }));
    }

    #[test]
    fn list_shows_notes_and_detached_notes() {
        let mut engine = engine_with_marks();
        engine.attach_note(crate::annotation::AnnotationId(1), "炼字").unwrap();
        engine.attach_note(crate::annotation::AnnotationId(2), "意象").unwrap();
        engine.remove_annotation(crate::annotation::AnnotationId(2));

        let list = format_annotation_list(&engine);
        assert!(list.contains("#1"));
        assert!(list.contains("note 1: 炼字"));
        assert!(list.contains("detached notes:"));
        assert!(list.contains("「明月」: 意象"));
        assert!(list.ends_with("1 annotations, 2 notes, 1 colours\n"));
    }

    #[test]
    fn truncate_counts_chars() {
        assert_eq!(truncate_chars("春眠不觉晓", 10), "春眠不觉晓");
        assert_eq!(truncate_chars("春眠不觉晓", 3), "春眠…");
    }
}
