//! Gaze keyboard driver
//!
//! Listens for face-mesh landmark frames on UDP, runs the keyboard session at
//! a fixed cadence and hands confirmed keys to a speech program.

use anyhow::{Context, Result};
use clap::Parser;
use log::LevelFilter;
use rayos_gaze_keyboard::speech::{command_voice, log_voice, spawn_speech_worker};
use rayos_gaze_keyboard::vision::{feed_addr_from_env, spawn_feed_task, DEFAULT_FEED_ADDR};
use rayos_gaze_keyboard::{Config, GazeKeyboard, LogFrontend, Session};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "gaze-keyboard", about = "Eye-gaze scanning keyboard")]
struct Cli {
    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// UDP address for the landmark feed (falls back to GAZEKEY_FEED_ADDR)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Driver tick in milliseconds
    #[arg(long, default_value_t = 30)]
    tick_ms: u64,

    /// Print observations to stdout as JSON lines
    #[arg(long)]
    events: bool,

    /// Speech program invoked per utterance, e.g. espeak-ng
    #[arg(long)]
    speak_with: Option<String>,

    /// Print the effective config and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(LevelFilter::Info)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::default(),
    };

    if cli.print_config {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    let listen = match cli.listen.or_else(feed_addr_from_env) {
        Some(addr) => addr,
        None => DEFAULT_FEED_ADDR.parse()?,
    };

    let speech = if config.speech.enabled {
        let worker = match cli.speak_with.clone() {
            Some(program) => {
                log::info!("Speech via {program} at rate {}", config.speech.rate);
                spawn_speech_worker(command_voice(program))
            }
            None => spawn_speech_worker(log_voice),
        };
        let (queue, _handle) = worker.context("starting speech worker")?;
        Some(queue)
    } else {
        log::info!("Speech disabled");
        None
    };

    let session = Session::new(config).context("invalid config")?;
    let mut keyboard = GazeKeyboard::new(session, LogFrontend::new(cli.events))
        .with_tick_interval(Duration::from_millis(cli.tick_ms.max(1)));
    if let Some(queue) = speech {
        keyboard = keyboard.with_speech(queue);
    }

    spawn_feed_task(listen, keyboard.feed_slot(), keyboard.command_sender()).await?;

    log::info!("Press Ctrl+C to exit");

    let (tx, rx) = tokio::sync::mpsc::channel::<()>(1);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal...");
        let _ = tx.blocking_send(());
    })?;

    keyboard.run(rx).await?;

    log::info!("Gaze keyboard shutdown complete");
    Ok(())
}
