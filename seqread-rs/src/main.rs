//! seqread-rs: text-to-speech reader daemon.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use seqread::{CommandPlayer, CommandSynthesizer, Config, PlaybackBackend, Scheduler, SocketReceiver};

#[derive(Parser, Debug)]
#[command(name = "seqread-rs", version, about = "Reads messages from a local socket aloud, in order")]
struct Args {
    /// Path to config.yaml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("seqread-rs {} starting", env!("CARGO_PKG_VERSION"));

    let config = Config::load(args.config.as_deref());

    let backend = match PlaybackBackend::select(&config.playback) {
        Ok(backend) => backend,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let receiver = match SocketReceiver::bind(&config.socket) {
        Ok(receiver) => receiver,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    let socket_path = receiver.path().to_path_buf();

    info!(
        "Synthesis command: {} {}",
        config.synthesis.command.display(),
        config.synthesis.args.join(" ")
    );

    let mut scheduler = Scheduler::new(
        &config.scheduler,
        Box::new(receiver),
        Box::new(CommandSynthesizer::new(&config.synthesis)),
        Box::new(CommandPlayer::new(backend)),
    );

    tokio::select! {
        _ = scheduler.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down ({:?})", scheduler.stats());
        }
    }

    if let Err(e) = std::fs::remove_file(&socket_path) {
        warn!("Failed to remove {}: {e}", socket_path.display());
    }
    ExitCode::SUCCESS
}
