//! The annotation engine
//!
//! One engine owns one article. It switches between reading and annotating,
//! turns committed selections into annotation records, and hands out the
//! rendered marker layout, an export snapshot and keyword suggestions. All
//! operations run to completion synchronously.

use chrono::Utc;

use super::error::AnnotationError;
use super::export::{AnnotationExport, EXPORT_VERSION};
use super::model::{
    AnalysisMode, Annotation, AnnotationId, ColorTag, CursorHint, Note, NoteId, Selection, Tool,
};
use super::render::{self, RenderedDocument};
use crate::article::{Article, Span};
use crate::config::{AnnotationSettings, NoteRetention};
use crate::suggest::{self, KeywordCategory, KeywordMatch};

/// Engine state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    /// Selections are passive reading
    #[default]
    Idle,
    /// Selections become annotations made with this tool and colour
    Annotating { tool: Tool, color: ColorTag },
}

/// What the surrounding view should show for the current mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeView {
    pub cursor: CursorHint,
    pub palette_visible: bool,
}

/// How the markers of a new annotation were laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapOutcome {
    /// A single marker surrounds the selected text
    Wrapped,
    /// The selection crosses paragraph or marker boundaries and is carried by
    /// several marker fragments sharing the annotation id
    Split { fragments: usize },
}

/// Why a selection did not produce an annotation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    NotAnnotating,
    Empty,
    OutOfBounds,
    /// Only whitespace was selected
    Blank,
    /// Overlaps an existing annotation while overlap is disabled
    Overlapping,
    EmptyNote,
}

/// Result of committing a selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed { id: AnnotationId, wrap: WrapOutcome },
    Ignored(IgnoreReason),
}

impl CommitOutcome {
    /// Id of the created annotation, if any
    pub fn id(&self) -> Option<AnnotationId> {
        match self {
            Self::Committed { id, .. } => Some(*id),
            Self::Ignored(_) => None,
        }
    }
}

/// What changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added(AnnotationId),
    Removed(AnnotationId),
    Cleared { count: usize },
    NotesChanged,
    ModeChanged(Mode),
}

/// Notification sent to subscribers, carrying the full current state
#[derive(Debug)]
pub struct ChangeEvent<'a> {
    pub kind: ChangeKind,
    pub annotations: &'a [Annotation],
    pub notes: &'a [Note],
}

/// Handle returned by [`AnnotationEngine::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&ChangeEvent<'_>)>;

/// Counts shown in the statistics panel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationStats {
    pub total: usize,
    pub notes: usize,
    pub distinct_colors: usize,
    /// Annotation count per tool, in palette order
    pub by_tool: Vec<(Tool, usize)>,
}

/// Outcome of rebuilding an engine from an export
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub restored_annotations: usize,
    pub restored_notes: usize,
    /// Annotations whose span no longer matches the article text
    pub dropped_annotations: usize,
    pub dropped_notes: usize,
}

/// Annotation engine for one article
pub struct AnnotationEngine {
    article: Article,
    settings: AnnotationSettings,
    mode: Mode,
    analysis_mode: AnalysisMode,
    annotations: Vec<Annotation>,
    notes: Vec<Note>,
    next_annotation_id: u64,
    next_note_id: u64,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription_id: u64,
}

impl std::fmt::Debug for AnnotationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnnotationEngine")
            .field("article", &self.article.id())
            .field("mode", &self.mode)
            .field("annotations", &self.annotations.len())
            .field("notes", &self.notes.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl AnnotationEngine {
    /// Create an idle engine with no annotations
    pub fn new(article: Article, settings: AnnotationSettings) -> Self {
        Self {
            article,
            settings,
            mode: Mode::Idle,
            analysis_mode: AnalysisMode::default(),
            annotations: Vec::new(),
            notes: Vec::new(),
            next_annotation_id: 1,
            next_note_id: 1,
            listeners: Vec::new(),
            next_subscription_id: 1,
        }
    }

    /// Rebuild an engine from an export of the same article
    ///
    /// Records whose span no longer matches the article text are dropped, as
    /// are records whose id leaves no room for a successor id.
    /// Notes pointing at a dropped annotation are kept detached.
    pub fn restore(
        article: Article,
        settings: AnnotationSettings,
        export: AnnotationExport,
    ) -> Result<(Self, RestoreReport), AnnotationError> {
        if export.article_id != article.id() {
            return Err(AnnotationError::ArticleMismatch {
                found: export.article_id,
                expected: article.id().to_string(),
            });
        }

        let mut engine = Self::new(article, settings);
        engine.analysis_mode = export.analysis_mode;
        let mut report = RestoreReport::default();

        for annotation in export.annotations {
            let matches_text = engine.article.slice(annotation.span) == Some(annotation.text.as_str());
            let duplicate = engine.annotations.iter().any(|a| a.id == annotation.id);
            let next_id = annotation.id.0.checked_add(1);
            let Some(next_id) = next_id.filter(|_| {
                !annotation.span.is_empty() && matches_text && !duplicate
            }) else {
                tracing::warn!(id = %annotation.id, "Dropping stale annotation on restore");
                report.dropped_annotations += 1;
                continue;
            };
            engine.next_annotation_id = engine.next_annotation_id.max(next_id);
            engine.annotations.push(annotation);
        }
        engine.annotations.sort_by_key(|a| a.id);

        for mut note in export.notes {
            let valid = engine.article.slice(note.span) == Some(note.quote.as_str())
                && !engine.notes.iter().any(|n| n.id == note.id);
            let Some(next_id) = note.id.0.checked_add(1).filter(|_| valid) else {
                tracing::warn!(id = %note.id, "Dropping stale note on restore");
                report.dropped_notes += 1;
                continue;
            };
            if note.annotation_id.is_some_and(|id| engine.get(id).is_none()) {
                note.annotation_id = None;
            }
            engine.next_note_id = engine.next_note_id.max(next_id);
            engine.notes.push(note);
        }
        engine.notes.sort_by_key(|n| n.id);

        report.restored_annotations = engine.annotations.len();
        report.restored_notes = engine.notes.len();
        tracing::info!(
            article = engine.article.id(),
            annotations = report.restored_annotations,
            notes = report.restored_notes,
            dropped = report.dropped_annotations + report.dropped_notes,
            "Restored annotations"
        );
        Ok((engine, report))
    }

    pub fn article(&self) -> &Article {
        &self.article
    }

    pub fn settings(&self) -> &AnnotationSettings {
        &self.settings
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_annotating(&self) -> bool {
        matches!(self.mode, Mode::Annotating { .. })
    }

    /// Cursor and palette state for the current mode
    pub fn mode_view(&self) -> ModeView {
        match self.mode {
            Mode::Idle => ModeView { cursor: CursorHint::Auto, palette_visible: false },
            Mode::Annotating { tool, .. } => {
                ModeView { cursor: tool.cursor(), palette_visible: true }
            }
        }
    }

    /// Start annotating, or switch tool and colour while annotating
    pub fn enter_annotation_mode(&mut self, tool: Tool, color: ColorTag) {
        let mode = Mode::Annotating { tool, color };
        if self.mode == mode {
            return;
        }
        self.mode = mode;
        tracing::debug!(tool = tool.as_str(), color = color.as_str(), "Annotation mode on");
        self.notify(ChangeKind::ModeChanged(mode));
    }

    /// Start annotating with the configured default tool and colour
    pub fn enter_default_annotation_mode(&mut self) {
        self.enter_annotation_mode(self.settings.default_tool, self.settings.default_color);
    }

    /// Go back to reading
    pub fn exit_annotation_mode(&mut self) {
        if self.mode == Mode::Idle {
            return;
        }
        self.mode = Mode::Idle;
        tracing::debug!("Annotation mode off");
        self.notify(ChangeKind::ModeChanged(Mode::Idle));
    }

    pub fn analysis_mode(&self) -> AnalysisMode {
        self.analysis_mode
    }

    /// Set the reading lens recorded on new annotations
    pub fn set_analysis_mode(&mut self, mode: AnalysisMode) {
        self.analysis_mode = mode;
    }

    /// Turn a finished selection into an annotation with the active tool
    pub fn commit_selection(&mut self, selection: Selection) -> CommitOutcome {
        let Mode::Annotating { tool, color } = self.mode else {
            tracing::debug!("Selection ignored outside annotation mode");
            return CommitOutcome::Ignored(IgnoreReason::NotAnnotating);
        };
        self.commit_with(selection, tool, color)
    }

    /// Mark a selection with the note tool and attach a note to it
    pub fn commit_note(&mut self, selection: Selection, content: &str) -> CommitOutcome {
        let Mode::Annotating { color, .. } = self.mode else {
            return CommitOutcome::Ignored(IgnoreReason::NotAnnotating);
        };
        if content.trim().is_empty() {
            return CommitOutcome::Ignored(IgnoreReason::EmptyNote);
        }

        let outcome = self.commit_with(selection, Tool::Note, color);
        if let Some(id) = outcome.id() {
            if let Err(err) = self.attach_note(id, content) {
                tracing::warn!(%id, %err, "Note not attached to new annotation");
            }
        }
        outcome
    }

    fn commit_with(&mut self, selection: Selection, tool: Tool, color: ColorTag) -> CommitOutcome {
        let span = match self.validate(selection) {
            Ok(span) => span,
            Err(reason) => {
                tracing::debug!(?reason, ?selection, "Selection ignored");
                return CommitOutcome::Ignored(reason);
            }
        };

        if !self.settings.allow_overlap && self.annotations.iter().any(|a| a.span.intersects(&span)) {
            tracing::debug!(?span, "Selection overlaps an existing annotation");
            return CommitOutcome::Ignored(IgnoreReason::Overlapping);
        }

        let Some(text) = self.article.slice(span).map(str::to_string) else {
            return CommitOutcome::Ignored(IgnoreReason::OutOfBounds);
        };

        let id = AnnotationId(self.next_annotation_id);
        self.next_annotation_id += 1;
        self.annotations.push(Annotation {
            id,
            tool,
            color,
            span,
            text,
            analysis_mode: self.analysis_mode,
            article_id: self.article.id().to_string(),
            created_at: Utc::now(),
        });

        let fragments = self.render().fragment_count(id);
        let wrap = if fragments <= 1 {
            WrapOutcome::Wrapped
        } else {
            tracing::warn!(%id, fragments, "Selection crosses element boundaries; marker split");
            WrapOutcome::Split { fragments }
        };

        tracing::debug!(%id, tool = tool.as_str(), ?span, "Annotation created");
        self.notify(ChangeKind::Added(id));
        CommitOutcome::Committed { id, wrap }
    }

    /// Check a selection and trim it to its non-whitespace core
    fn validate(&self, selection: Selection) -> Result<Span, IgnoreReason> {
        if selection.is_collapsed() {
            return Err(IgnoreReason::Empty);
        }
        let span = selection.span();
        if span.end > self.article.char_len() {
            return Err(IgnoreReason::OutOfBounds);
        }

        let is_space = |i: usize| self.article.char_at(i).is_some_and(char::is_whitespace);
        let mut start = span.start;
        let mut end = span.end;
        while start < end && is_space(start) {
            start += 1;
        }
        while end > start && is_space(end - 1) {
            end -= 1;
        }

        if start == end {
            return Err(IgnoreReason::Blank);
        }
        Ok(Span::new(start, end))
    }

    /// Attach a note to an existing annotation
    pub fn attach_note(
        &mut self,
        annotation_id: AnnotationId,
        content: &str,
    ) -> Result<NoteId, AnnotationError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AnnotationError::EmptyNote);
        }
        let annotation =
            self.get(annotation_id).ok_or(AnnotationError::UnknownAnnotation(annotation_id))?;

        let note = Note {
            id: NoteId(self.next_note_id),
            annotation_id: Some(annotation_id),
            span: annotation.span,
            quote: annotation.text.clone(),
            content: content.to_string(),
            created_at: Utc::now(),
        };
        let id = note.id;
        self.next_note_id += 1;
        self.notes.push(note);

        self.notify(ChangeKind::NotesChanged);
        Ok(id)
    }

    /// Delete a note; `false` if it does not exist
    pub fn remove_note(&mut self, note_id: NoteId) -> bool {
        let before = self.notes.len();
        self.notes.retain(|n| n.id != note_id);
        let removed = self.notes.len() < before;
        if removed {
            self.notify(ChangeKind::NotesChanged);
        }
        removed
    }

    /// Delete an annotation; unknown ids are a no-op returning `false`
    pub fn remove_annotation(&mut self, id: AnnotationId) -> bool {
        let Some(index) = self.annotations.iter().position(|a| a.id == id) else {
            tracing::debug!(%id, "Remove of unknown annotation ignored");
            return false;
        };
        self.annotations.remove(index);
        self.release_notes(|annotation_id| annotation_id == id);

        tracing::debug!(%id, "Annotation removed");
        self.notify(ChangeKind::Removed(id));
        true
    }

    /// Delete every annotation and every note, returning how many
    /// annotations were removed
    pub fn clear_all(&mut self) -> usize {
        let count = self.annotations.len();
        self.annotations.clear();
        self.notes.clear();

        tracing::info!(article = self.article.id(), count, "Annotations cleared");
        self.notify(ChangeKind::Cleared { count });
        count
    }

    /// Apply the retention policy to notes of removed annotations
    fn release_notes(&mut self, removed: impl Fn(AnnotationId) -> bool) {
        match self.settings.note_retention {
            NoteRetention::Detach => {
                for note in &mut self.notes {
                    if note.annotation_id.is_some_and(&removed) {
                        note.annotation_id = None;
                    }
                }
            }
            NoteRetention::Cascade => {
                self.notes.retain(|n| !n.annotation_id.is_some_and(&removed));
            }
        }
    }

    /// All annotations in creation order
    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// All notes in creation order
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn get(&self, id: AnnotationId) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.id == id)
    }

    /// Notes attached to an annotation
    pub fn notes_for(&self, id: AnnotationId) -> Vec<&Note> {
        self.notes.iter().filter(|n| n.annotation_id == Some(id)).collect()
    }

    /// Article text under an annotation
    pub fn recoverable_text(&self, id: AnnotationId) -> Option<&str> {
        self.get(id).and_then(|a| self.article.slice(a.span))
    }

    /// Rendered article with its current markers
    pub fn render(&self) -> RenderedDocument {
        render::render(&self.article, &self.annotations)
    }

    /// Snapshot of annotations and notes for persistence or download
    pub fn export_annotations(&self) -> AnnotationExport {
        AnnotationExport {
            version: EXPORT_VERSION,
            article: self.article.title().to_string(),
            article_id: self.article.id().to_string(),
            exported_at: Utc::now(),
            analysis_mode: self.analysis_mode,
            annotations: self.annotations.clone(),
            notes: self.notes.clone(),
        }
    }

    /// Keyword occurrences of a category; creates nothing
    pub fn auto_suggest(&self, category: KeywordCategory) -> Vec<KeywordMatch> {
        suggest::scan(&self.article, category)
    }

    pub fn stats(&self) -> AnnotationStats {
        let mut colors: Vec<ColorTag> = self.annotations.iter().map(|a| a.color).collect();
        colors.sort();
        colors.dedup();

        let by_tool = Tool::all()
            .iter()
            .map(|tool| (*tool, self.annotations.iter().filter(|a| a.tool == *tool).count()))
            .collect();

        AnnotationStats {
            total: self.annotations.len(),
            notes: self.notes.len(),
            distinct_colors: colors.len(),
            by_tool,
        }
    }

    /// Register a change listener
    pub fn subscribe(&mut self, listener: impl FnMut(&ChangeEvent<'_>) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription_id);
        self.next_subscription_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a change listener; `false` if it was not registered
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sub, _)| *sub != id);
        self.listeners.len() < before
    }

    fn notify(&mut self, kind: ChangeKind) {
        let event = ChangeEvent { kind, annotations: &self.annotations, notes: &self.notes };
        for (_, listener) in self.listeners.iter_mut() {
            listener(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    const TEXT: &str = "阅读时要找出文章的重点内容。\n然后，再思考作者的情感。";

    fn engine() -> AnnotationEngine {
        AnnotationEngine::new(Article::new("doc", "练习", TEXT), AnnotationSettings::default())
    }

    fn annotating() -> AnnotationEngine {
        let mut engine = engine();
        engine.enter_annotation_mode(Tool::Highlight, ColorTag::Yellow);
        engine
    }

    fn select(engine: &AnnotationEngine, needle: &str) -> Selection {
        engine.article().find(needle).unwrap().into()
    }

    #[test]
    fn highlight_scenario_wraps_exact_text() {
        let mut engine = annotating();
        let outcome = engine.commit_selection(select(&engine, "重点内容"));

        let CommitOutcome::Committed { id, wrap } = outcome else {
            panic!("expected a committed annotation, got {:?}", outcome);
        };
        assert_eq!(wrap, WrapOutcome::Wrapped);
        assert_eq!(engine.annotations().len(), 1);

        let annotation = engine.get(id).unwrap();
        assert_eq!(annotation.tool, Tool::Highlight);
        assert_eq!(annotation.color, ColorTag::Yellow);
        assert_eq!(annotation.text, "重点内容");

        let rendered = engine.render();
        assert_eq!(rendered.fragment_count(id), 1);
        assert_eq!(rendered.marker_text(id), "重点内容");
        assert!(rendered.to_html().contains("annotation-highlight annotation-yellow"));
    }

    #[test]
    fn empty_click_creates_nothing() {
        let mut engine = annotating();
        let outcome = engine.commit_selection(Selection::collapsed(4));
        assert_eq!(outcome, CommitOutcome::Ignored(IgnoreReason::Empty));
        assert!(engine.annotations().is_empty());
    }

    #[test]
    fn three_annotations_then_clear_restores_text() {
        let mut engine = annotating();
        let before = engine.render().text_content();
        for needle in ["阅读", "重点内容", "作者的情感"] {
            assert!(engine.commit_selection(select(&engine, needle)).id().is_some());
        }
        assert_eq!(engine.annotations().len(), 3);

        assert_eq!(engine.clear_all(), 3);
        assert!(engine.annotations().is_empty());
        let rendered = engine.render();
        assert_eq!(rendered.marker_count(), 0);
        assert_eq!(rendered.text_content(), before);
        assert_eq!(rendered.text_content(), TEXT);
    }

    #[test]
    fn selection_outside_annotation_mode_is_ignored() {
        let mut engine = engine();
        let outcome = engine.commit_selection(Selection::new(0, 2));
        assert_eq!(outcome, CommitOutcome::Ignored(IgnoreReason::NotAnnotating));
    }

    #[test]
    fn out_of_bounds_and_blank_selections_are_ignored() {
        let mut engine = annotating();
        let len = engine.article().char_len();
        assert_eq!(
            engine.commit_selection(Selection::new(len - 1, len + 3)),
            CommitOutcome::Ignored(IgnoreReason::OutOfBounds)
        );

        let mut spaced = AnnotationEngine::new(
            Article::new("s", "s", "甲   乙"),
            AnnotationSettings::default(),
        );
        spaced.enter_annotation_mode(Tool::Underline, ColorTag::Blue);
        assert_eq!(
            spaced.commit_selection(Selection::new(1, 4)),
            CommitOutcome::Ignored(IgnoreReason::Blank)
        );
    }

    #[test]
    fn whitespace_around_selection_is_trimmed() {
        let mut engine =
            AnnotationEngine::new(Article::new("s", "s", "甲  乙丙  丁"), AnnotationSettings::default());
        engine.enter_annotation_mode(Tool::Underline, ColorTag::Blue);
        let id = engine.commit_selection(Selection::new(1, 7)).id().unwrap();
        assert_eq!(engine.get(id).unwrap().span, Span::new(3, 5));
        assert_eq!(engine.get(id).unwrap().text, "乙丙");
    }

    #[test]
    fn backward_selection_is_normalized() {
        let mut engine = annotating();
        let span = engine.article().find("重点内容").unwrap();
        let id = engine.commit_selection(Selection::new(span.end, span.start)).id().unwrap();
        assert_eq!(engine.recoverable_text(id), Some("重点内容"));
    }

    #[test]
    fn selection_across_paragraphs_is_split_not_lost() {
        let mut engine = annotating();
        let start = engine.article().find("内容").unwrap().start;
        let end = engine.article().find("然后").unwrap().end;
        let outcome = engine.commit_selection(Selection::new(start, end));

        let CommitOutcome::Committed { id, wrap } = outcome else {
            panic!("expected a committed annotation, got {:?}", outcome);
        };
        assert_eq!(wrap, WrapOutcome::Split { fragments: 2 });
        assert_eq!(engine.get(id).unwrap().text, "内容。\n然后");
        assert_eq!(engine.render().marker_text(id), "内容。然后");
        assert_eq!(engine.render().text_content(), TEXT);
    }

    #[test]
    fn crossing_an_existing_marker_splits_the_new_one() {
        let mut engine = annotating();
        engine.commit_selection(select(&engine, "文章的重点"));
        let outcome = engine.commit_selection(select(&engine, "重点内容"));
        assert!(matches!(
            outcome,
            CommitOutcome::Committed { wrap: WrapOutcome::Split { fragments: 2 }, .. }
        ));
    }

    #[test]
    fn overlap_can_be_disallowed() {
        let settings = AnnotationSettings { allow_overlap: false, ..AnnotationSettings::default() };
        let mut engine = AnnotationEngine::new(Article::new("doc", "练习", TEXT), settings);
        engine.enter_annotation_mode(Tool::Circle, ColorTag::Red);
        assert!(engine.commit_selection(select(&engine, "文章的重点")).id().is_some());
        assert_eq!(
            engine.commit_selection(select(&engine, "重点内容")),
            CommitOutcome::Ignored(IgnoreReason::Overlapping)
        );
        assert!(engine.commit_selection(select(&engine, "作者")).id().is_some());
    }

    #[test]
    fn ids_increase_in_creation_order() {
        let mut engine = annotating();
        let a = engine.commit_selection(select(&engine, "阅读")).id().unwrap();
        let b = engine.commit_selection(select(&engine, "文章")).id().unwrap();
        engine.remove_annotation(b);
        let c = engine.commit_selection(select(&engine, "作者")).id().unwrap();
        assert!(a < b && b < c);
    }

    #[test]
    fn remove_is_idempotent() {
        let mut engine = annotating();
        let keep = engine.commit_selection(select(&engine, "阅读")).id().unwrap();
        let gone = engine.commit_selection(select(&engine, "重点内容")).id().unwrap();

        assert!(engine.remove_annotation(gone));
        let after_first = engine.annotations().to_vec();
        assert!(!engine.remove_annotation(gone));
        assert_eq!(engine.annotations(), after_first.as_slice());
        assert!(engine.get(keep).is_some());
        assert_eq!(engine.render().marker_ids(), vec![keep]);
    }

    #[test]
    fn mode_transitions_and_view() {
        let mut engine = engine();
        assert_eq!(engine.mode_view(), ModeView { cursor: CursorHint::Auto, palette_visible: false });

        engine.enter_annotation_mode(Tool::Circle, ColorTag::Green);
        assert_eq!(engine.mode(), Mode::Annotating { tool: Tool::Circle, color: ColorTag::Green });
        assert_eq!(
            engine.mode_view(),
            ModeView { cursor: CursorHint::Crosshair, palette_visible: true }
        );

        engine.enter_annotation_mode(Tool::Underline, ColorTag::Green);
        assert_eq!(engine.mode_view().cursor, CursorHint::Text);

        engine.exit_annotation_mode();
        engine.exit_annotation_mode();
        assert_eq!(engine.mode(), Mode::Idle);
    }

    #[test]
    fn default_mode_comes_from_settings() {
        let settings = AnnotationSettings {
            default_tool: Tool::Bracket,
            default_color: ColorTag::Purple,
            ..AnnotationSettings::default()
        };
        let mut engine = AnnotationEngine::new(Article::new("doc", "练习", TEXT), settings);
        engine.enter_default_annotation_mode();
        assert_eq!(engine.mode(), Mode::Annotating { tool: Tool::Bracket, color: ColorTag::Purple });
    }

    #[test]
    fn commit_note_creates_note_tool_annotation_with_note() {
        let mut engine = annotating();
        let id = engine.commit_note(select(&engine, "作者的情感"), "  思乡之情  ").id().unwrap();
        assert_eq!(engine.get(id).unwrap().tool, Tool::Note);
        let notes = engine.notes_for(id);
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].content, "思乡之情");
        assert_eq!(notes[0].quote, "作者的情感");

        assert_eq!(
            engine.commit_note(select(&engine, "阅读"), "   "),
            CommitOutcome::Ignored(IgnoreReason::EmptyNote)
        );
        assert_eq!(engine.annotations().len(), 1);
    }

    #[test]
    fn attach_note_to_unknown_annotation_fails() {
        let mut engine = annotating();
        assert!(matches!(
            engine.attach_note(AnnotationId(99), "x"),
            Err(AnnotationError::UnknownAnnotation(AnnotationId(99)))
        ));
        let id = engine.commit_selection(select(&engine, "阅读")).id().unwrap();
        assert!(matches!(engine.attach_note(id, ""), Err(AnnotationError::EmptyNote)));
    }

    #[test]
    fn detach_retention_keeps_notes() {
        let mut engine = annotating();
        let id = engine.commit_note(select(&engine, "重点内容"), "要点").id().unwrap();
        engine.remove_annotation(id);

        assert_eq!(engine.notes().len(), 1);
        assert!(engine.notes()[0].is_detached());
        assert_eq!(engine.notes()[0].quote, "重点内容");
    }

    #[test]
    fn clear_all_drops_notes_under_default_settings() {
        let mut engine = annotating();
        engine.commit_note(Selection::new(0, 2), "n");
        let id = engine.commit_selection(select(&engine, "重点内容")).id().unwrap();
        engine.remove_annotation(id);
        engine.commit_selection(select(&engine, "作者"));
        engine.attach_note(engine.annotations()[1].id, "人物").unwrap();

        assert_eq!(engine.clear_all(), 2);
        assert!(engine.notes().is_empty());
        let export = engine.export_annotations();
        assert!(export.annotations.is_empty());
        assert!(export.notes.is_empty());
    }

    #[test]
    fn cascade_retention_deletes_notes() {
        let settings =
            AnnotationSettings { note_retention: NoteRetention::Cascade, ..AnnotationSettings::default() };
        let mut engine = AnnotationEngine::new(Article::new("doc", "练习", TEXT), settings);
        engine.enter_annotation_mode(Tool::Highlight, ColorTag::Yellow);

        let first = engine.commit_note(select(&engine, "重点内容"), "要点").id().unwrap();
        engine.commit_note(select(&engine, "作者"), "谁").id().unwrap();
        engine.remove_annotation(first);
        assert_eq!(engine.notes().len(), 1);

        engine.clear_all();
        assert!(engine.notes().is_empty());
    }

    #[test]
    fn remove_note_reports_presence() {
        let mut engine = annotating();
        let id = engine.commit_selection(select(&engine, "阅读")).id().unwrap();
        let note = engine.attach_note(id, "开头").unwrap();
        assert!(engine.remove_note(note));
        assert!(!engine.remove_note(note));
    }

    #[test]
    fn listeners_receive_full_list() {
        let mut engine = annotating();
        let seen: Rc<RefCell<Vec<(ChangeKind, usize)>>> = Rc::default();
        let sink = Rc::clone(&seen);
        let subscription = engine.subscribe(move |event| {
            sink.borrow_mut().push((event.kind, event.annotations.len()));
        });

        let a = engine.commit_selection(select(&engine, "阅读")).id().unwrap();
        let b = engine.commit_selection(select(&engine, "重点内容")).id().unwrap();
        engine.remove_annotation(a);
        engine.remove_annotation(a);
        engine.clear_all();

        assert_eq!(
            *seen.borrow(),
            vec![
                (ChangeKind::Added(a), 1),
                (ChangeKind::Added(b), 2),
                (ChangeKind::Removed(a), 1),
                (ChangeKind::Cleared { count: 1 }, 0),
            ]
        );

        assert!(engine.unsubscribe(subscription));
        assert!(!engine.unsubscribe(subscription));
        engine.commit_selection(select(&engine, "作者"));
        assert_eq!(seen.borrow().len(), 4);
    }

    #[test]
    fn export_is_independent_of_render() {
        let mut engine = annotating();
        engine.set_analysis_mode(AnalysisMode::Emotion);
        let id = engine.commit_note(select(&engine, "作者的情感"), "关注").id().unwrap();

        let export = engine.export_annotations();
        assert_eq!(export.version, EXPORT_VERSION);
        assert_eq!(export.article, "练习");
        assert_eq!(export.analysis_mode, AnalysisMode::Emotion);
        assert_eq!(export.annotations.len(), 1);
        assert_eq!(export.annotations[0].id, id);
        assert_eq!(export.annotations[0].analysis_mode, AnalysisMode::Emotion);
        assert_eq!(export.notes.len(), 1);
    }

    #[test]
    fn restore_round_trips_and_continues_ids() {
        let mut engine = annotating();
        let a = engine.commit_selection(select(&engine, "阅读")).id().unwrap();
        let b = engine.commit_note(select(&engine, "重点内容"), "要点").id().unwrap();
        let export = engine.export_annotations();

        let (mut restored, report) = AnnotationEngine::restore(
            Article::new("doc", "练习", TEXT),
            AnnotationSettings::default(),
            export,
        )
        .unwrap();
        assert_eq!(report.restored_annotations, 2);
        assert_eq!(report.restored_notes, 1);
        assert_eq!(report.dropped_annotations, 0);
        assert_eq!(restored.annotations(), engine.annotations());
        assert_eq!(restored.mode(), Mode::Idle);

        restored.enter_annotation_mode(Tool::Highlight, ColorTag::Yellow);
        let c = restored.commit_selection(Selection::new(0, 1)).id().unwrap();
        assert!(c > a && c > b);
    }

    #[test]
    fn restore_drops_stale_annotations() {
        let mut engine = annotating();
        engine.commit_note(select(&engine, "重点内容"), "要点");
        engine.commit_selection(select(&engine, "阅读"));
        let export = engine.export_annotations();

        let edited = TEXT.replace("重点内容", "主要内容");
        let (restored, report) = AnnotationEngine::restore(
            Article::new("doc", "练习", edited),
            AnnotationSettings::default(),
            export,
        )
        .unwrap();
        assert_eq!(report.dropped_annotations, 1);
        assert_eq!(report.dropped_notes, 1);
        assert_eq!(restored.annotations().len(), 1);
        assert_eq!(restored.annotations()[0].text, "阅读");
    }

    #[test]
    fn restore_drops_records_with_maximal_ids() {
        let mut engine = annotating();
        engine.commit_note(select(&engine, "重点内容"), "要点");
        engine.commit_selection(select(&engine, "阅读"));
        let mut export = engine.export_annotations();
        export.annotations[0].id = AnnotationId(u64::MAX);
        export.notes[0].id = NoteId(u64::MAX);
        let export = AnnotationExport::from_json(&export.to_json().unwrap()).unwrap();

        let (mut restored, report) = AnnotationEngine::restore(
            Article::new("doc", "练习", TEXT),
            AnnotationSettings::default(),
            export,
        )
        .unwrap();
        assert_eq!(report.dropped_annotations, 1);
        assert_eq!(report.dropped_notes, 1);
        assert_eq!(restored.annotations().len(), 1);
        assert!(restored.notes().is_empty());

        restored.enter_annotation_mode(Tool::Underline, ColorTag::Green);
        let next = restored.commit_selection(select(&restored, "作者")).id().unwrap();
        assert_eq!(next, AnnotationId(3));
    }

    #[test]
    fn restore_rejects_other_article() {
        let export = annotating().export_annotations();
        let result = AnnotationEngine::restore(
            Article::new("other", "别的", TEXT),
            AnnotationSettings::default(),
            export,
        );
        assert!(matches!(result, Err(AnnotationError::ArticleMismatch { .. })));
    }

    #[test]
    fn auto_suggest_creates_nothing() {
        let engine = annotating();
        let matches = engine.auto_suggest(KeywordCategory::Structure);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].keyword, "然后");
        assert!(engine.annotations().is_empty());
    }

    #[test]
    fn stats_count_tools_and_colors() {
        let mut engine = annotating();
        engine.commit_selection(select(&engine, "阅读"));
        engine.enter_annotation_mode(Tool::Underline, ColorTag::Blue);
        engine.commit_selection(select(&engine, "文章"));
        engine.commit_note(select(&engine, "作者"), "人物");

        let stats = engine.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.notes, 1);
        assert_eq!(stats.distinct_colors, 2);
        assert_eq!(stats.by_tool[0], (Tool::Highlight, 1));
        assert_eq!(stats.by_tool[1], (Tool::Underline, 1));
        assert_eq!(stats.by_tool[3], (Tool::Note, 1));
    }

    fn selections() -> impl Strategy<Value = Vec<(usize, usize)>> {
        let len = TEXT.chars().count();
        prop::collection::vec((0..=len, 0..=len), 0..12)
    }

    proptest! {
        #[test]
        fn annotate_then_clear_restores_text(picks in selections()) {
            let mut engine = annotating();
            for (anchor, focus) in picks {
                engine.commit_selection(Selection::new(anchor, focus));
                prop_assert_eq!(engine.render().text_content(), TEXT);
            }
            engine.clear_all();
            prop_assert_eq!(engine.render().text_content(), TEXT);
            prop_assert_eq!(engine.render().marker_count(), 0);
        }

        #[test]
        fn successful_commits_export_unique_entries(picks in selections()) {
            let mut engine = annotating();
            let committed = picks
                .into_iter()
                .filter(|(a, f)| engine.commit_selection(Selection::new(*a, *f)).id().is_some())
                .count();
            let export = engine.export_annotations();
            prop_assert_eq!(export.annotations.len(), committed);
            let mut ids: Vec<AnnotationId> = export.annotations.iter().map(|a| a.id).collect();
            ids.dedup();
            prop_assert_eq!(ids.len(), committed);
        }

        #[test]
        fn markers_recover_their_own_text(picks in selections()) {
            let mut engine = annotating();
            for (anchor, focus) in picks {
                engine.commit_selection(Selection::new(anchor, focus));
            }
            let rendered = engine.render();
            for annotation in engine.annotations() {
                let expected: String = annotation.text.chars().filter(|c| *c != '\n').collect();
                prop_assert_eq!(rendered.marker_text(annotation.id), expected);
            }
        }

        #[test]
        fn disjoint_annotation_leaves_earlier_text_alone(split in 1usize..20) {
            let mut engine = annotating();
            let first = engine.commit_selection(Selection::new(0, split)).id();
            let before = first.and_then(|id| engine.recoverable_text(id).map(str::to_string));
            let len = engine.article().char_len();
            engine.commit_selection(Selection::new(split, len));
            if let Some(id) = first {
                prop_assert_eq!(engine.recoverable_text(id).map(str::to_string), before);
                prop_assert_eq!(
                    engine.render().marker_text(id),
                    engine.get(id).map(|a| a.text.replace('\n', "")).unwrap_or_default()
                );
            }
        }
    }
}
