//! narrate - Turn long documents into narrated WAV files with a cloned voice

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use narrator::batch::{BatchOrchestrator, DocumentOutcome, ModelPool, WorkerSettings};
use narrator::config::NarratorConfig;
use narrator::document::collect_jobs;
use narrator::pipeline::{PipelineObserver, PipelineState};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;
use tts_client::ModelBackend;

#[derive(Parser, Debug)]
#[command(name = "narrate")]
#[command(about = "Narrate documents into WAV files, resuming interrupted runs", long_about = None)]
#[command(version)]
#[command(args_conflicts_with_subcommands = true)]
struct Args {
    /// Documents or directories to narrate (.txt, .md, .epub, .docx)
    inputs: Vec<PathBuf>,

    /// Directory for the WAV files (default: next to each document)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Path to voice reference audio for voice cloning
    #[arg(long)]
    voice: Option<PathBuf>,

    /// Language code passed to the model (default from config: tr)
    #[arg(long)]
    language: Option<String>,

    /// Number of model instances, i.e. documents narrated in parallel
    #[arg(long)]
    instances: Option<usize>,

    /// Maximum characters per chunk
    #[arg(long)]
    max_chars: Option<usize>,

    /// Maximum estimated tokens per chunk
    #[arg(long)]
    max_tokens: Option<usize>,

    /// Start fresh, discard stored progress
    #[arg(long)]
    no_resume: bool,

    /// Enable debug output
    #[arg(short, long, default_value_t = false)]
    debug: bool,

    /// Subcommands
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Set default voice reference
    SetVoice {
        /// Path to voice reference audio
        path: PathBuf,
    },
    /// Set default language
    SetLanguage {
        /// Language code (e.g. tr, en)
        code: String,
    },
    /// Set model backend
    SetBackend {
        /// coqui-server or coqui-cli
        backend: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Some(Commands::Config { action }) = &args.command {
        return handle_config_command(action);
    }

    if args.inputs.is_empty() {
        anyhow::bail!("At least one document is required. Run 'narrate --help' for usage.");
    }

    let mut config = NarratorConfig::load().context("Failed to load configuration")?;
    if let Some(language) = &args.language {
        config.language = language.clone();
    }
    if let Some(max_chars) = args.max_chars {
        config.max_chars = max_chars;
    }
    if let Some(max_tokens) = args.max_tokens {
        config.max_tokens = max_tokens;
    }
    if let Some(instances) = args.instances {
        config.model.instances = instances;
    }

    let voice_ref = args.voice.clone().or_else(|| config.voice_ref.clone()).ok_or_else(|| {
        anyhow::anyhow!("No voice reference. Pass --voice or run 'narrate config set-voice <path>'.")
    })?;
    if !voice_ref.exists() {
        anyhow::bail!("Voice reference not found: {}", voice_ref.display());
    }

    let jobs = collect_jobs(&args.inputs, args.output_dir.as_deref())
        .context("Failed to collect documents")?;
    if jobs.is_empty() {
        anyhow::bail!("No supported documents found");
    }

    if args.debug {
        eprintln!("Voice ref: {}", voice_ref.display());
        eprintln!("Language: {}", config.language);
        eprintln!("Chunk bounds: {} chars / {} tokens", config.max_chars, config.max_tokens);
        eprintln!("Data dir: {}", config.data_dir()?.display());
        for job in &jobs {
            eprintln!("  {} -> {} [{}]", job.source.display(), job.output.display(), job.id);
        }
    }

    let ctx = config.pipeline_context()?;
    let pool = ModelPool::from_config(&config.model).context("Speech model is not available")?;
    eprintln!(
        "Narrating {} document(s) with {} {} instance(s)",
        jobs.len(),
        pool.len(),
        backend_name(config.model.backend)
    );

    let settings = WorkerSettings {
        voice_ref,
        language: config.language.clone(),
        resume: !args.no_resume,
    };
    let ui = Arc::new(ProgressUi::new()?);
    let orchestrator = BatchOrchestrator::new(pool, ctx, settings)?.with_observer(ui);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupted, stopping. Completed chunks are kept for the next run.");
            on_interrupt.cancel();
        }
    });

    let outcomes = orchestrator.run(jobs, cancel).await;
    let failed = print_summary(&outcomes);
    if failed > 0 {
        anyhow::bail!("{} of {} document(s) failed", failed, outcomes.len());
    }

    Ok(())
}

/// One progress bar per document.
struct ProgressUi {
    multi: MultiProgress,
    style: ProgressStyle,
    bars: Mutex<HashMap<String, ProgressBar>>,
}

impl ProgressUi {
    fn new() -> Result<Self> {
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} {prefix:24} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")?
            .progress_chars("#>-");
        Ok(Self {
            multi: MultiProgress::new(),
            style,
            bars: Mutex::new(HashMap::new()),
        })
    }

    fn with_bar(&self, document_id: &str, f: impl FnOnce(&ProgressBar)) {
        let bars = self.bars.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(bar) = bars.get(document_id) {
            f(bar);
        }
    }
}

impl PipelineObserver for ProgressUi {
    fn chunks_planned(&self, document_id: &str, total: usize, completed: usize) {
        let bar = self.multi.add(ProgressBar::new(total as u64));
        bar.set_style(self.style.clone());
        bar.set_prefix(document_id.to_string());
        bar.set_position(completed as u64);
        if completed > 0 {
            bar.set_message(format!("resumed at {}", completed));
        }
        self.bars
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(document_id.to_string(), bar);
    }

    fn chunk_completed(&self, document_id: &str, _index: usize, completed: usize, _total: usize) {
        self.with_bar(document_id, |bar| bar.set_position(completed as u64));
    }

    fn state_changed(&self, document_id: &str, state: PipelineState) {
        self.with_bar(document_id, |bar| match state {
            PipelineState::Merging => bar.set_message("merging"),
            PipelineState::Done => bar.finish_with_message("done"),
            PipelineState::Failed => bar.abandon_with_message("failed"),
            _ => {}
        });
    }
}

/// Print one line per document; returns how many failed.
fn print_summary(outcomes: &[DocumentOutcome]) -> usize {
    eprintln!();
    let mut failed = 0;

    for outcome in outcomes {
        match &outcome.result {
            Ok(report) => {
                let oversized = if report.oversized > 0 {
                    format!(", {} oversized", report.oversized)
                } else {
                    String::new()
                };
                eprintln!(
                    "ok      {} -> {} ({} chunks, {} synthesized, {} resumed{}, {:.1}s)",
                    outcome.source.display(),
                    report.output.display(),
                    report.total_chunks,
                    report.synthesized,
                    report.skipped,
                    oversized,
                    report.duration_ms as f64 / 1000.0
                );
            }
            Err(err) => {
                failed += 1;
                eprintln!("failed  {}: {}", outcome.source.display(), err);
            }
        }
    }

    eprintln!("\nCompleted: {}, Failed: {}", outcomes.len() - failed, failed);
    failed
}

fn backend_name(backend: ModelBackend) -> &'static str {
    match backend {
        ModelBackend::CoquiServer => "coqui-server",
        ModelBackend::CoquiCli => "coqui-cli",
    }
}

fn handle_config_command(action: &ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = NarratorConfig::load()?;
            println!("Configuration file: {:?}", NarratorConfig::config_path()?);
            println!();
            if let Some(voice) = &config.voice_ref {
                println!("voice_ref = \"{}\"", voice.display());
            } else {
                println!("voice_ref = (none)");
            }
            println!("language = \"{}\"", config.language);
            println!("max_chars = {}", config.max_chars);
            println!("max_tokens = {}", config.max_tokens);
            println!("sentence_splitter = {:?}", config.sentence_splitter);
            if let Some(path) = &config.tokenizer_path {
                println!("tokenizer_path = \"{}\"", path.display());
            } else {
                println!("tokenizer_path = (word count)");
            }
            println!("data_dir = \"{}\"", config.data_dir()?.display());
            println!();
            println!("[model]");
            println!("backend = \"{}\"", backend_name(config.model.backend));
            println!("base_url = \"{}\"", config.model.base_url);
            if let Some(path) = &config.model.cli_path {
                println!("cli_path = \"{}\"", path.display());
            }
            println!("model_name = \"{}\"", config.model.model_name);
            println!("timeout_secs = {}", config.model.timeout_secs);
            println!("instances = {}", config.model.instances);
        }
        ConfigAction::SetVoice { path } => {
            let mut config = NarratorConfig::load()?;
            config.voice_ref = Some(path.clone());
            config.save()?;
            println!("Default voice reference set to: {}", path.display());
        }
        ConfigAction::SetLanguage { code } => {
            let mut config = NarratorConfig::load()?;
            config.language = code.clone();
            config.save()?;
            println!("Default language set to: {}", config.language);
        }
        ConfigAction::SetBackend { backend } => {
            let mut config = NarratorConfig::load()?;
            config.model.backend = ModelBackend::parse(backend)?;
            config.save()?;
            println!("Model backend set to: {}", backend_name(config.model.backend));
        }
    }
    Ok(())
}
