use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use yuwen::annotation::{
    AnalysisMode, AnnotationId, AnnotationStore, ColorTag, CommitOutcome, NoteId, Tool,
    WrapOutcome,
};
use yuwen::config::Environment;
use yuwen::suggest::{self, KeywordCategory};
use yuwen::tutor::{TutorClient, TutorError};
use yuwen::ui::OutputStyle;
use yuwen::{Config, Workspace};

#[derive(Parser)]
#[command(name = "yuwen")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Deployment environment (development, production, frontend-only)
    #[arg(long, global = true, default_value = "development")]
    env: Environment,

    /// Annotation store file (defaults to the data directory)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Config file (defaults to the config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mark text in an article
    Annotate {
        /// Article text file
        article: PathBuf,
        /// Text to mark (`明月`, `明月@2` for the second occurrence) or char range (`3..9`)
        target: String,
        #[arg(short, long)]
        tool: Option<Tool>,
        #[arg(short, long)]
        color: Option<ColorTag>,
        /// Analysis mode recorded on the annotation
        #[arg(short, long)]
        mode: Option<AnalysisMode>,
        /// Note to attach to the new annotation
        #[arg(short, long)]
        note: Option<String>,
    },
    /// Write a note on new or existing marked text
    Note {
        article: PathBuf,
        /// Note content
        content: String,
        /// Text or range to mark with the note tool
        #[arg(long, conflicts_with = "on", required_unless_present = "on")]
        at: Option<String>,
        /// Id of an existing annotation
        #[arg(long)]
        on: Option<u64>,
        #[arg(short, long)]
        color: Option<ColorTag>,
    },
    /// List annotations and notes of an article
    List { article: PathBuf },
    /// Remove an annotation, or a note with --note
    Remove {
        article: PathBuf,
        id: u64,
        /// Treat the id as a note id
        #[arg(long)]
        note: bool,
    },
    /// Remove every annotation of an article
    Clear { article: PathBuf },
    /// Print the annotated article
    Show {
        article: PathBuf,
        /// HTML fragment instead of terminal output
        #[arg(long, conflicts_with = "plain")]
        html: bool,
        /// No colours; markers written as [text]{id}
        #[arg(long)]
        plain: bool,
    },
    /// Export annotations to JSON
    Export {
        article: PathBuf,
        /// Output file or directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Replace annotations with an exported JSON file
    Import { article: PathBuf, file: PathBuf },
    /// Find structure, rhetoric or emotion keywords
    Suggest {
        article: PathBuf,
        category: KeywordCategory,
        /// Highlight every match
        #[arg(long)]
        apply: bool,
    },
    /// Show what to look for in an analysis mode
    Hints {
        mode: AnalysisMode,
        /// Number of questions (question mode)
        #[arg(long, default_value_t = 0)]
        questions: usize,
    },
    /// Check that the AI tutor backend is up
    Health,
    /// Ask the AI tutor
    Ask {
        article: PathBuf,
        message: Option<String>,
        /// Ask about this annotation
        #[arg(short, long)]
        annotation: Option<u64>,
        #[arg(long)]
        model: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "yuwen=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => Config::config_path()?,
    };
    let config = Config::load(cli.env, &config_path)?;
    let store_path = match &cli.store {
        Some(path) => path.clone(),
        None => AnnotationStore::store_path()?,
    };
    let open = |article: &Path| Workspace::open(config.clone(), article, store_path.clone());

    match cli.command {
        Commands::Annotate { article, target, tool, color, mode, note } => {
            let mut workspace = open(&article)?;
            let outcome = workspace.annotate(&target, tool, color, mode)?;
            report(outcome);
            if let (Some(id), Some(note)) = (outcome.id(), note) {
                let note_id = workspace.attach_note(id, &note)?;
                println!("Note {} added", note_id);
            }
            workspace.save()?;
        }
        Commands::Note { article, content, at, on, color } => {
            let mut workspace = open(&article)?;
            match (at, on) {
                (_, Some(id)) => {
                    let note_id = workspace.attach_note(AnnotationId(id), &content)?;
                    println!("Note {} added", note_id);
                }
                (Some(target), None) => report(workspace.note(&target, &content, color)?),
                (None, None) => anyhow::bail!("Give --at TEXT or --on ID"),
            }
            workspace.save()?;
        }
        Commands::List { article } => {
            print!("{}", open(&article)?.list());
        }
        Commands::Remove { article, id, note } => {
            let mut workspace = open(&article)?;
            let removed = if note {
                workspace.remove_note(NoteId(id))
            } else {
                workspace.remove_annotation(AnnotationId(id))
            };
            if removed {
                workspace.save()?;
                println!("Removed {}", id);
            } else {
                println!("Nothing with id {}", id);
            }
        }
        Commands::Clear { article } => {
            let mut workspace = open(&article)?;
            let count = workspace.clear();
            workspace.save()?;
            println!("Cleared {} annotations", count);
        }
        Commands::Show { article, html, plain } => {
            let workspace = open(&article)?;
            if html {
                println!("{}", workspace.show_html());
            } else {
                let style = if plain { OutputStyle::Plain } else { OutputStyle::Styled };
                print!("{}", workspace.show(style));
            }
        }
        Commands::Export { article, output } => {
            let path = open(&article)?.export_to(output.as_deref())?;
            println!("Exported to {}", path.display());
        }
        Commands::Import { article, file } => {
            let mut workspace = open(&article)?;
            let restored = workspace.import_from(&file)?;
            workspace.save()?;
            println!(
                "Imported {} annotations and {} notes ({} stale annotations dropped)",
                restored.restored_annotations, restored.restored_notes, restored.dropped_annotations
            );
        }
        Commands::Suggest { article, category, apply } => {
            let mut workspace = open(&article)?;
            for found in workspace.suggestions(category) {
                println!("{:>5}..{:<5} {}", found.span.start, found.span.end, found.keyword);
            }
            if apply {
                let created = workspace.apply_suggestions(category);
                workspace.save()?;
                println!("Highlighted {} {}", created, category.label());
            }
        }
        Commands::Hints { mode, questions } => {
            println!("{}", mode.label());
            for hint in suggest::suggestions_for(mode, questions) {
                println!("  {} - {} ({})", hint.kind, hint.text, hint.color.label());
            }
        }
        Commands::Health => {
            let checked = match TutorClient::new(&config.api) {
                Ok(client) => client.health().await,
                Err(err) => Err(err),
            };
            match checked {
                Ok(()) => println!("AI tutor backend is up ({})", config.environment.as_str()),
                Err(err) => eprintln!("{}", err.inline_message()),
            }
        }
        Commands::Ask { article, message, annotation, model } => {
            let workspace = open(&article)?;
            let token = CancellationToken::new();
            let watcher = token.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    watcher.cancel();
                }
            });

            let answer = workspace
                .ask(message.as_deref(), annotation.map(AnnotationId), model.as_deref(), token)
                .await;
            match answer {
                Ok(text) => println!("{}", text),
                Err(err) => match err.downcast_ref::<TutorError>() {
                    Some(tutor_error) => eprintln!("{}", tutor_error.inline_message()),
                    None => return Err(err),
                },
            }
        }
    }

    Ok(())
}

fn report(outcome: CommitOutcome) {
    match outcome {
        CommitOutcome::Committed { id, wrap: WrapOutcome::Wrapped } => {
            println!("Annotation {} created", id)
        }
        CommitOutcome::Committed { id, wrap: WrapOutcome::Split { fragments } } => {
            println!("Annotation {} created in {} fragments", id, fragments)
        }
        CommitOutcome::Ignored(reason) => println!("Nothing annotated: {:?}", reason),
    }
}
