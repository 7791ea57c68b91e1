//! Redline - AI-assisted manuscript revision.
//!
//! Revises batches of documents with a streaming AI provider and reconciles each
//! revision against its original paragraph by paragraph.

use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use walkdir::WalkDir;

use redline::ai::{provider_from_config, CompletionOptions};
use redline::core::{Config, Document, DocumentRef, FsStore};
use redline::diff::{align_texts, render_text, stats_line, to_plain_text, AlignOptions, MergeSession};
use redline::guidance::{AnalysisIndex, GuidanceBuilder, GuidanceKind};
use redline::pipeline::{
    is_revision_name, AdvanceMode, JobStatus, LiveView, PipelineContext, PipelineStatus,
    RevisionPipeline,
};
use tokio::sync::watch;

/// AI-assisted manuscript revision
#[derive(Parser)]
#[command(name = "redline")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this config file instead of the default locations
    #[arg(long, global = true, env = "REDLINE_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Revise documents with the configured AI provider
    Revise {
        /// Files or directories to revise (directories expand to .md and .txt files)
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Guidance to send (checklist, gaps, both, custom)
        #[arg(short, long)]
        guidance: Option<GuidanceKind>,

        /// Free-text instruction (implies custom guidance)
        #[arg(short, long)]
        instruction: Option<String>,

        /// Analysis file (JSON) with dimension scores and checklists
        #[arg(short, long)]
        analysis: Option<PathBuf>,

        /// Pause for review after each document
        #[arg(short, long)]
        pause: bool,

        /// AI provider override (claude, openai, ollama)
        #[arg(long)]
        provider: Option<String>,

        /// Model override
        #[arg(long)]
        model: Option<String>,

        /// Directory that revisions are stored under
        #[arg(long, default_value = ".")]
        root: PathBuf,

        /// Don't echo streamed text
        #[arg(short, long)]
        quiet: bool,
    },

    /// Compare two documents paragraph by paragraph
    Diff {
        /// Original document
        left: PathBuf,

        /// Revised document
        right: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Disable colours
        #[arg(long)]
        no_color: bool,

        /// Skip word-level spans
        #[arg(long)]
        no_word_diff: bool,

        /// Word-overlap threshold for matching paragraphs
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Merge paragraphs between two documents
    Merge {
        /// Original document
        left: PathBuf,

        /// Revised document
        right: PathBuf,

        /// Replace the original with the whole revision
        #[arg(long, conflicts_with_all = ["reject_all", "accept_right", "accept_left"])]
        accept_all: bool,

        /// Replace the revision with the whole original
        #[arg(long, conflicts_with_all = ["accept_right", "accept_left"])]
        reject_all: bool,

        /// Rows whose revised text goes into the original (comma separated, numbered as `diff` shows them)
        #[arg(long, value_delimiter = ',')]
        accept_right: Vec<usize>,

        /// Rows whose original text goes into the revision (comma separated)
        #[arg(long, value_delimiter = ',')]
        accept_left: Vec<usize>,

        /// Write changed documents back to disk
        #[arg(short, long)]
        write: bool,

        /// Disable colours
        #[arg(long)]
        no_color: bool,
    },

    /// Show or initialise configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration (default)
    Show,

    /// Print the config file locations
    Path,

    /// Write a default global config file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so streamed text on stdout stays clean
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .with(filter)
        .init();

    let _ = dotenvy::dotenv();

    match cli.command {
        Commands::Revise {
            paths,
            guidance,
            instruction,
            analysis,
            pause,
            provider,
            model,
            root,
            quiet,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(provider) = provider {
                config.ai.provider = provider;
            }
            if model.is_some() {
                config.ai.model = model;
            }
            let options = ReviseOptions { guidance, instruction, analysis, pause, root, quiet };
            cmd_revise(&config, &paths, options)?;
        }
        Commands::Diff { left, right, format, no_color, no_word_diff, threshold } => {
            let config = load_config(cli.config.as_deref())?;
            let options = AlignOptions {
                threshold: threshold.unwrap_or(config.diff.threshold),
                word_diff: config.diff.word_diff && !no_word_diff,
            };
            let color = config.diff.color && !no_color && io::stdout().is_terminal();
            cmd_diff(&left, &right, &format, &options, color)?;
        }
        Commands::Merge {
            left,
            right,
            accept_all,
            reject_all,
            accept_right,
            accept_left,
            write,
            no_color,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let actions = MergeActions { accept_all, reject_all, accept_right, accept_left };
            let color = config.diff.color && !no_color && io::stdout().is_terminal();
            cmd_merge(&config, &left, &right, &actions, write, color)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config.as_deref(), action.unwrap_or(ConfigAction::Show))?;
        }
        Commands::Completions { shell } => {
            cmd_completions(shell);
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Config::load(),
    }
}

struct ReviseOptions {
    guidance: Option<GuidanceKind>,
    instruction: Option<String>,
    analysis: Option<PathBuf>,
    pause: bool,
    root: PathBuf,
    quiet: bool,
}

/// Revise documents.
fn cmd_revise(config: &Config, paths: &[PathBuf], options: ReviseOptions) -> Result<()> {
    let documents = collect_documents(&options.root, paths)?;
    if documents.is_empty() {
        anyhow::bail!("No .md or .txt documents found");
    }

    let analysis = match &options.analysis {
        Some(path) => AnalysisIndex::load(path)
            .with_context(|| format!("Failed to load analysis from {}", path.display()))?,
        None => AnalysisIndex::empty(),
    };

    let kind = match (options.guidance, &options.instruction) {
        (Some(kind), _) => kind,
        (None, Some(_)) => GuidanceKind::Custom,
        (None, None) => config.pipeline.guidance,
    };
    let advance_mode = if options.pause { AdvanceMode::Pause } else { config.pipeline.advance_mode };

    let provider = provider_from_config(&config.ai)?;
    let context = PipelineContext::new(provider, Arc::new(FsStore::new(&options.root)))
        .with_analysis(analysis)
        .with_guidance(GuidanceBuilder::new().with_min_gap(config.pipeline.min_gap))
        .with_options(CompletionOptions::from(&config.ai))
        .with_retry(config.pipeline.retry.clone());

    eprintln!("Revising {} document(s) with {} ({} guidance)", documents.len(), config.ai.provider, kind);

    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(run_revision(context, documents, kind, advance_mode, &options));
    // A pending pause prompt may still be blocked on stdin
    rt.shutdown_background();
    result
}

async fn run_revision(
    context: PipelineContext,
    documents: Vec<DocumentRef>,
    kind: GuidanceKind,
    advance_mode: AdvanceMode,
    options: &ReviseOptions,
) -> Result<()> {
    let pipeline = RevisionPipeline::new(context).with_advance_mode(advance_mode);
    let total = documents.len();

    let status_rx = pipeline.subscribe();
    let live_rx = pipeline.subscribe_live();
    let handle = pipeline.start(documents, kind, options.instruction.clone())?;

    watch_pipeline(&pipeline, status_rx, live_rx, options.quiet).await?;
    handle.await?;

    let status = pipeline.status();
    match status.status {
        JobStatus::Complete => {
            eprintln!("Revised {} document(s)", total);
            Ok(())
        }
        JobStatus::Cancelled => {
            eprintln!("Cancelled after {} of {} document(s)", status.current_index, total);
            Ok(())
        }
        _ => anyhow::bail!(status.error_message.unwrap_or_else(|| "Revision failed".to_string())),
    }
}

/// Echo streamed text, answer pause prompts, and cancel on Ctrl-C until the job ends.
async fn watch_pipeline(
    pipeline: &RevisionPipeline,
    mut status_rx: watch::Receiver<PipelineStatus>,
    mut live_rx: watch::Receiver<Option<LiveView>>,
    quiet: bool,
) -> Result<()> {
    let mut echo = Echo::default();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\nCancelling...");
                pipeline.cancel();
            }
            changed = live_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                if !quiet {
                    echo.print(live_rx.borrow_and_update().as_ref())?;
                }
            }
            changed = status_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = status_rx.borrow_and_update().clone();
                if status.status.is_terminal() {
                    break;
                }
                if status.status == JobStatus::Paused {
                    if !quiet {
                        echo.print(pipeline.live_view().as_ref())?;
                    }
                    let answer = tokio::select! {
                        answer = prompt_continue(status.current_index + 1, status.total_files) => answer?,
                        _ = tokio::signal::ctrl_c() => Answer::Stop,
                    };
                    match answer {
                        Answer::Next => {
                            pipeline.resume();
                        }
                        Answer::Auto => pipeline.set_advance_mode(AdvanceMode::Auto),
                        Answer::Stop => {
                            pipeline.cancel();
                        }
                    }
                }
            }
        }
    }

    if !quiet {
        echo.print(pipeline.live_view().as_ref())?;
    }
    Ok(())
}

/// Tracks how much of the live view has been written to stdout.
#[derive(Default)]
struct Echo {
    index: Option<usize>,
    printed: usize,
}

impl Echo {
    fn print(&mut self, view: Option<&LiveView>) -> Result<()> {
        let Some(view) = view else {
            return Ok(());
        };

        if self.index != Some(view.index) {
            if self.index.is_some() {
                println!();
            }
            eprintln!("\n==> {} -> {}", view.source.display_name, view.revised_path.display());
            self.index = Some(view.index);
            self.printed = 0;
        }

        let content = &view.revised.content;
        if let Some(new_text) = content.get(self.printed..) {
            if !new_text.is_empty() {
                let mut stdout = io::stdout().lock();
                stdout.write_all(new_text.as_bytes())?;
                stdout.flush()?;
            }
        }
        self.printed = content.len();
        Ok(())
    }
}

enum Answer {
    Next,
    Auto,
    Stop,
}

async fn prompt_continue(next: usize, total: usize) -> Result<Answer> {
    tokio::task::spawn_blocking(move || -> Result<Answer> {
        eprint!("\n\nContinue with document {} of {}? [Y/n/a(ll)] ", next + 1, total);
        io::stderr().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            return Ok(Answer::Stop);
        }
        Ok(match input.trim().to_lowercase().as_str() {
            "" | "y" | "yes" => Answer::Next,
            "a" | "all" => Answer::Auto,
            _ => Answer::Stop,
        })
    })
    .await?
}

/// Expand files and directories into store-relative document references.
fn collect_documents(root: &Path, paths: &[PathBuf]) -> Result<Vec<DocumentRef>> {
    let mut documents = Vec::new();

    for path in paths {
        if path.is_dir() {
            let found: Vec<PathBuf> = WalkDir::new(path)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file())
                .map(|entry| entry.into_path())
                .filter(|p| is_document(p))
                .collect();
            for file in found {
                documents.push(DocumentRef::new(relative_to(root, &file)?));
            }
        } else if path.is_file() {
            documents.push(DocumentRef::new(relative_to(root, path)?));
        } else {
            anyhow::bail!("No such file or directory: {}", path.display());
        }
    }

    Ok(documents)
}

fn is_document(path: &Path) -> bool {
    let is_text = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("md") || e.eq_ignore_ascii_case("txt"));
    let is_revision = path.file_name().and_then(|n| n.to_str()).is_some_and(is_revision_name);
    is_text && !is_revision
}

/// Path of an existing file relative to `root`.
fn relative_to(root: &Path, path: &Path) -> Result<PathBuf> {
    let root = root.canonicalize().with_context(|| format!("Invalid root {}", root.display()))?;
    let full = path.canonicalize().with_context(|| format!("Invalid path {}", path.display()))?;
    full.strip_prefix(&root)
        .map(Path::to_path_buf)
        .map_err(|_| anyhow::anyhow!("{} is outside {}; use --root", path.display(), root.display()))
}

fn read_plain(path: &Path) -> Result<String> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(to_plain_text(&content))
}

/// Compare two documents.
fn cmd_diff(left: &Path, right: &Path, format: &str, options: &AlignOptions, color: bool) -> Result<()> {
    let alignment = align_texts(&read_plain(left)?, &read_plain(right)?, options);

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&alignment)?),
        "text" => print!("{}", render_text(&alignment, color)),
        other => anyhow::bail!("Unknown format '{}' (expected text or json)", other),
    }
    Ok(())
}

struct MergeActions {
    accept_all: bool,
    reject_all: bool,
    accept_right: Vec<usize>,
    accept_left: Vec<usize>,
}

/// Merge paragraphs between two documents.
fn cmd_merge(
    config: &Config,
    left: &Path,
    right: &Path,
    actions: &MergeActions,
    write: bool,
    color: bool,
) -> Result<()> {
    let options = AlignOptions { threshold: config.diff.threshold, word_diff: config.diff.word_diff };
    let mut session = MergeSession::new(
        Document::new(left.display().to_string(), read_plain(left)?),
        Document::new(right.display().to_string(), read_plain(right)?),
        options,
    )
    .with_max_history(config.diff.max_history);

    if actions.accept_all {
        session.accept_all();
    } else if actions.reject_all {
        session.reject_all();
    } else {
        session.accept_rows(&actions.accept_right, &actions.accept_left)?;
    }

    if !write {
        print!("{}", render_text(session.alignment(), color));
        return Ok(());
    }

    let (left_doc, right_doc) = session.into_documents();
    for (path, doc) in [(left, &left_doc), (right, &right_doc)] {
        if doc.is_dirty {
            std::fs::write(path, &doc.content)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Wrote {}", path.display());
        }
    }

    let stats = align_texts(&left_doc.content, &right_doc.content, &options).stats;
    eprintln!("{}", stats_line(&stats));
    Ok(())
}

/// Show or initialise configuration.
fn cmd_config(path: Option<&Path>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(path)?;
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigAction::Path => {
            let local = PathBuf::from(Config::LOCAL_FILE);
            if local.exists() {
                println!("local:  {}", local.display());
            }
            match Config::global_path() {
                Some(global) => println!("global: {}", global.display()),
                None => println!("global: (no config directory)"),
            }
        }
        ConfigAction::Init { force } => {
            let global = Config::global_path()
                .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
            if global.exists() && !force {
                anyhow::bail!("{} already exists (use --force to overwrite)", global.display());
            }
            let saved = Config::default().save()?;
            println!("Wrote {}", saved.display());
        }
    }
    Ok(())
}

/// Generate shell completions.
fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "redline", &mut io::stdout());
}
