use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use voxnote::{Config, FileNoteStore, MicBackend, SessionController, SessionState, Speaker};

#[derive(Parser)]
#[command(name = "voxnote", about = "Live voice conversations for your notes")]
struct Cli {
    /// Config file (TOML), without extension
    #[arg(long, default_value = "config/voxnote")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start a live voice session; Ctrl-C ends it
    Live {
        /// Markdown file of notes context to give the assistant
        #[arg(long)]
        context: Option<PathBuf>,
    },
    /// List available microphone devices
    Devices,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            warn!("could not load config '{}' ({e}); using defaults", cli.config);
            Config::default()
        }
    };

    match cli.command {
        Command::Devices => {
            for name in MicBackend::list_devices()? {
                println!("{name}");
            }
            Ok(())
        }
        Command::Live { context } => run_live(config, context).await,
    }
}

async fn run_live(config: Config, context: Option<PathBuf>) -> Result<()> {
    let context_notes = match context {
        Some(path) => tokio::fs::read_to_string(&path).await.unwrap_or_else(|e| {
            warn!("could not read context file {path:?}: {e}");
            String::new()
        }),
        None => String::new(),
    };

    let notes = Arc::new(FileNoteStore::new(&config.notes.drafts_path)?);
    let controller = SessionController::new(config, notes);

    if let Err(e) = controller.start(&context_notes).await {
        // Session errors are user-facing: the mic was refused, or the
        // service could not be reached.
        eprintln!("{e}");
        return Err(e.into());
    }
    info!("session active; press Ctrl-C to stop");

    let mut poll = tokio::time::interval(Duration::from_millis(250));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("stopping session");
                controller.stop().await?;
                break;
            }
            _ = poll.tick() => {
                // The remote side may have ended the session already.
                if controller.state().await == SessionState::Idle {
                    break;
                }
            }
        }
    }

    let entries = controller.transcript_snapshot().await;
    if !entries.is_empty() {
        println!("\n--- transcript ---");
        for entry in entries {
            let who = match entry.speaker {
                Speaker::User => "you",
                Speaker::Model => "assistant",
            };
            println!("{who}: {}", entry.text);
        }
    }
    Ok(())
}
