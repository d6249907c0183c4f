use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context as _;
use audit_application::{PlaybackController, ReviewSession, SpeechCollaborator};
use audit_core::Settings;
use audit_engine::{
    CpalSink, Dispatcher, GeminiClient, GeminiConfig, MutedSpeech, api_key_from_env,
};
use audit_storage::{SnapshotGateway, Storage};
use audit_ui::{Ui, UiContext, UiExit};
use clap::Parser;
use directories::ProjectDirs;
use tracing_subscriber::EnvFilter;

/// Terminal desk for reviewing audit reports with AI commentary.
#[derive(Parser, Debug)]
#[command(name = "audit-review", version)]
struct Args {
    /// Directory holding the database and the log file
    #[arg(long, env = "AUDIT_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Where JSON backups are written for this run
    #[arg(long)]
    export_dir: Option<PathBuf>,

    /// Do not synthesize or play speech
    #[arg(long)]
    no_audio: bool,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:?}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let args = Args::parse();

    let data_dir = match args.data_dir.clone() {
        Some(dir) => dir,
        None => ProjectDirs::from("dev", "audit", "audit-review")
            .context("resolve project dirs")?
            .data_dir()
            .to_path_buf(),
    };
    fs::create_dir_all(&data_dir)
        .with_context(|| format!("create data dir {}", data_dir.display()))?;
    init_logging(&data_dir)?;

    let storage = Storage::open(data_dir.join("audit-review.db"))?;
    let mut settings = storage.load_settings()?;
    let export_dir = resolve_export_dir(&args, &settings)?;
    tracing::info!(data_dir = %data_dir.display(), export_dir = %export_dir.display(), "starting");

    let gateway = SnapshotGateway::new(storage);

    let api_key = api_key_from_env();
    if api_key.is_none() {
        tracing::warn!("no GEMINI_API_KEY or API_KEY in the environment");
    }
    let client = Arc::new(GeminiClient::new(GeminiConfig::from_settings(
        &settings, api_key,
    ))?);

    let mut session = match gateway.load() {
        Some(snapshot) => ReviewSession::from_snapshot(snapshot),
        None => ReviewSession::new(),
    };

    loop {
        let speech: Arc<dyn SpeechCollaborator> = if args.no_audio {
            Arc::new(MutedSpeech)
        } else {
            client.clone()
        };
        let playback = if args.no_audio {
            PlaybackController::silent()
        } else {
            PlaybackController::new(Box::new(CpalSink::new()))
        };

        let ui = Ui::new(UiContext {
            session,
            settings,
            gateway: &gateway,
            dispatcher: Dispatcher::new(client.clone(), speech),
            playback,
            export_dir: export_dir.clone(),
        });
        let outcome = ui.run()?;
        settings = outcome.settings;
        gateway.store().save_settings(&settings)?;

        match outcome.exit {
            UiExit::Quit => {
                gateway.save(&outcome.session.snapshot())?;
                break;
            }
            UiExit::Reset => {
                gateway.reset()?;
                session = ReviewSession::new();
                tracing::info!("all review data reset");
            }
        }
    }

    Ok(())
}

fn resolve_export_dir(args: &Args, settings: &Settings) -> anyhow::Result<PathBuf> {
    if let Some(dir) = args.export_dir.clone() {
        return Ok(dir);
    }
    if let Some(dir) = settings.export_dir.as_deref() {
        return Ok(PathBuf::from(dir));
    }
    std::env::current_dir().context("get cwd")
}

/// The terminal belongs to the UI, so logs go to a file.
fn init_logging(data_dir: &Path) -> anyhow::Result<()> {
    let path = data_dir.join("audit-review.log");
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("open log file {}", path.display()))?;

    let filter = EnvFilter::try_from_env("AUDIT_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|err| anyhow::anyhow!("install tracing subscriber: {err}"))?;
    Ok(())
}
