//! Annotation workspace driven by the command line
//!
//! A workspace pairs one article with the annotation store. It restores the
//! saved annotations of the article on open and writes them back on save.

pub mod command;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tokio_util::sync::CancellationToken;

use crate::annotation::{
    AnalysisMode, AnnotationEngine, AnnotationExport, AnnotationId, AnnotationStore, ColorTag,
    CommitOutcome, NoteId, RestoreReport, Selection, Tool,
};
use crate::article::Article;
use crate::config::Config;
use crate::suggest::{KeywordCategory, KeywordMatch};
use crate::tutor::{ChatRequest, TutorClient, explain_prompt};
use crate::ui::{self, OutputStyle};
use command::{ParseResult, parse_target};

/// An article opened for annotation
pub struct Workspace {
    /// Application configuration
    config: Config,

    /// Where the annotation store is read from and written to
    store_path: PathBuf,

    /// Saved annotations of all articles
    store: AnnotationStore,

    /// Engine for the open article
    engine: AnnotationEngine,
}

impl Workspace {
    /// Open an article file, restoring its saved annotations
    pub fn open(config: Config, article_path: &Path, store_path: PathBuf) -> Result<Self> {
        let article = Article::from_file(article_path)?;
        let store = AnnotationStore::load_from(&store_path)?;
        let settings = config.annotation.clone();

        let engine = match store.get(article.id()) {
            Some(export) => {
                let (engine, report) =
                    AnnotationEngine::restore(article, settings, export.clone()).with_context(
                        || format!("Failed to restore annotations from {:?}", store_path),
                    )?;
                log_restore(&report);
                engine
            }
            None => AnnotationEngine::new(article, settings),
        };

        tracing::info!(
            article = engine.article().id(),
            annotations = engine.annotations().len(),
            "Workspace opened"
        );

        Ok(Self { config, store_path, store, engine })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn engine(&self) -> &AnnotationEngine {
        &self.engine
    }

    /// Turn a command line target into a selection over the article
    fn select(&self, target: &str) -> Result<Selection> {
        match parse_target(target) {
            ParseResult::Ok(parsed) => parsed
                .resolve(self.engine.article())
                .with_context(|| format!("Text not found in article: {}", target)),
            ParseResult::Empty => bail!("No text or range given"),
            ParseResult::Invalid(input) => bail!("Invalid target: {}", input),
        }
    }

    /// Annotate a target with a tool and colour
    ///
    /// Falls back to the configured default tool and colour.
    pub fn annotate(
        &mut self,
        target: &str,
        tool: Option<Tool>,
        color: Option<ColorTag>,
        analysis_mode: Option<AnalysisMode>,
    ) -> Result<CommitOutcome> {
        let selection = self.select(target)?;
        let settings = self.engine.settings();
        let tool = tool.unwrap_or(settings.default_tool);
        let color = color.unwrap_or(settings.default_color);

        if let Some(mode) = analysis_mode {
            self.engine.set_analysis_mode(mode);
        }
        self.engine.enter_annotation_mode(tool, color);
        let outcome = self.engine.commit_selection(selection);
        self.engine.exit_annotation_mode();

        Ok(outcome)
    }

    /// Mark a target with the note tool and write a note on it
    pub fn note(
        &mut self,
        target: &str,
        content: &str,
        color: Option<ColorTag>,
    ) -> Result<CommitOutcome> {
        let selection = self.select(target)?;
        let color = color.unwrap_or(self.engine.settings().default_color);

        self.engine.enter_annotation_mode(Tool::Note, color);
        let outcome = self.engine.commit_note(selection, content);
        self.engine.exit_annotation_mode();

        Ok(outcome)
    }

    /// Write a note on an existing annotation
    pub fn attach_note(&mut self, id: AnnotationId, content: &str) -> Result<NoteId> {
        self.engine
            .attach_note(id, content)
            .with_context(|| format!("Failed to add note to annotation {}", id))
    }

    pub fn remove_annotation(&mut self, id: AnnotationId) -> bool {
        self.engine.remove_annotation(id)
    }

    pub fn remove_note(&mut self, id: NoteId) -> bool {
        self.engine.remove_note(id)
    }

    pub fn clear(&mut self) -> usize {
        self.engine.clear_all()
    }

    /// Annotated article for the terminal
    pub fn show(&self, style: OutputStyle) -> String {
        ui::format_document(&self.engine.render(), style)
    }

    /// Annotated article as an HTML fragment
    pub fn show_html(&self) -> String {
        self.engine.render().to_html()
    }

    pub fn list(&self) -> String {
        ui::format_annotation_list(&self.engine)
    }

    /// Write the export document
    ///
    /// `output` may be a file or a directory; the default file name is used
    /// for directories and when no output is given.
    pub fn export_to(&self, output: Option<&Path>) -> Result<PathBuf> {
        let export = self.engine.export_annotations();
        let path = match output {
            Some(path) if path.is_dir() => path.join(export.file_name()),
            Some(path) => path.to_path_buf(),
            None => PathBuf::from(export.file_name()),
        };

        let json = export.to_json().with_context(|| "Failed to serialize annotations")?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write export to {:?}", path))?;

        tracing::info!(path = ?path, annotations = export.annotations.len(), "Annotations exported");
        Ok(path)
    }

    /// Replace the article's annotations with an export document
    ///
    /// An export made from a copy of the article elsewhere is accepted when
    /// the titles match; records whose text differs are dropped on restore.
    pub fn import_from(&mut self, path: &Path) -> Result<RestoreReport> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read export from {:?}", path))?;
        let mut export = AnnotationExport::from_json(&json)
            .with_context(|| format!("Failed to parse export {:?}", path))?;

        let article = self.engine.article();
        if export.article_id != article.id() && export.article == article.title() {
            tracing::debug!(from = %export.article_id, to = article.id(), "Rebinding export to article");
            export.article_id = article.id().to_string();
            for annotation in &mut export.annotations {
                annotation.article_id = article.id().to_string();
            }
        }

        let (engine, report) = AnnotationEngine::restore(
            self.engine.article().clone(),
            self.config.annotation.clone(),
            export,
        )
        .with_context(|| format!("Export {:?} belongs to another article", path))?;

        log_restore(&report);
        self.engine = engine;
        Ok(report)
    }

    /// Keyword occurrences of a category; nothing is annotated
    pub fn suggestions(&self, category: KeywordCategory) -> Vec<KeywordMatch> {
        self.engine.auto_suggest(category)
    }

    /// Highlight every keyword occurrence of a category in its suggested colour
    ///
    /// Returns how many annotations were created.
    pub fn apply_suggestions(&mut self, category: KeywordCategory) -> usize {
        let matches = self.engine.auto_suggest(category);
        let mut created = 0;

        for found in matches {
            self.engine.enter_annotation_mode(Tool::Highlight, found.color);
            if self.engine.commit_selection(Selection::from(found.span)).id().is_some() {
                created += 1;
            }
        }
        self.engine.exit_annotation_mode();

        tracing::info!(category = category.label(), created, "Suggestions applied");
        created
    }

    /// Ask the AI tutor
    ///
    /// With an annotation the question is about that passage and `message`
    /// is appended to it; without one `message` is sent as is.
    pub async fn ask(
        &self,
        message: Option<&str>,
        annotation: Option<AnnotationId>,
        model: Option<&str>,
        cancel_token: CancellationToken,
    ) -> Result<String> {
        let prompt = match annotation {
            Some(id) => {
                let annotation = self
                    .engine
                    .get(id)
                    .with_context(|| format!("No annotation with id {}", id))?;
                let mut prompt = explain_prompt(self.engine.article(), annotation);
                if let Some(extra) = message.map(str::trim).filter(|m| !m.is_empty()) {
                    prompt.push('\n');
                    prompt.push_str(extra);
                }
                prompt
            }
            None => message.unwrap_or_default().to_string(),
        };

        let client = TutorClient::new(&self.config.api)?;
        let model = model.unwrap_or(&self.config.tutor.default_model);
        let answer = client.chat(ChatRequest::new(prompt, model), cancel_token).await?;
        Ok(answer)
    }

    /// Write the article's annotations back to the store
    pub fn save(&mut self) -> Result<()> {
        let article_id = self.engine.article().id().to_string();
        if self.engine.annotations().is_empty() && self.engine.notes().is_empty() {
            self.store.remove(&article_id);
        } else {
            self.store.put(self.engine.export_annotations());
        }
        self.store.save_to(&self.store_path)
    }
}

fn log_restore(report: &RestoreReport) {
    if report.dropped_annotations > 0 || report.dropped_notes > 0 {
        tracing::warn!(
            dropped_annotations = report.dropped_annotations,
            dropped_notes = report.dropped_notes,
            "Article text changed; stale annotations dropped"
        );
    }
    tracing::debug!(
        annotations = report.restored_annotations,
        notes = report.restored_notes,
        "Annotations restored"
    );
}
