//! torrent-control - console front-end for the torrent engine bridge
//!
//! Main entry point for the console application.
//!
//! # Overview
//!
//! This binary wires the library together:
//! - Configuration loading ([`ConfigManager`]: `torrent-control.yaml` + `TORRENT_CONTROL_*`)
//! - Logging infrastructure (daily file rotation + optional stderr output)
//! - The engine bridge ([`ControlBridge`] around a [`MemoryEngine`])
//! - The console controller (renders the registry, runs add-sessions)
//!
//! The application uses two long-lived threads:
//! - **Main thread**: the foreground dispatcher, blocking only on its queue
//! - **Engine thread**: one current-thread tokio runtime running every engine routine
//!
//! A third, detached thread reads stdin and feeds lines into the foreground queue.
//!
//! # Execution Flow
//!
//! 1. Parse the command line
//! 2. Load configuration from the config directory
//! 3. Initialize logging → `<log_dir>/torrent-control.<date>`
//! 4. Start the bridge (engine startup + saved state load)
//! 5. Run the console controller until `quit` or end of input
//! 6. Stop the bridge (engine shutdown + state save)
//! 7. Remember the last download directory in the configuration

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use clap::Parser;
use std::io::{self, BufRead};
use std::thread;
use torrent_control::ui::{ConsoleController, ForegroundMessage, foreground_queue};
use torrent_control::{APP_NAME, BridgeConfig, ConfigManager, ControlBridge, MemoryEngine, VERSION};

#[derive(Parser)]
#[command(name = "torrent-control", version, about = "Console front-end for a BitTorrent engine")]
struct Cli {
    /// Directory holding torrent-control.yaml and, by default, the state file and logs
    #[arg(long, env = "TORRENT_CONTROL_CONFIG_DIR", default_value = ".")]
    config_dir: Utf8PathBuf,

    /// Log at debug level
    #[arg(long)]
    debug: bool,

    /// Only log to the log file, not to stderr
    #[arg(long)]
    no_console_log: bool,
}

/// Main entry point for the console application
///
/// # Returns
///
/// - `Ok(())` if the application ran and exited normally
/// - `Err(_)` if initialization failed or engine state could not be saved
fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_manager = ConfigManager::new(&cli.config_dir)?;
    let mut client_config = config_manager.load_client_config()?;

    let log_dir = config_manager.resolve(&client_config.log_dir);
    let _log_guard = torrent_control::logging::setup_logging_with_console(
        &log_dir,
        APP_NAME,
        cli.debug || client_config.debug,
        !cli.no_console_log,
    )?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let bridge_config = BridgeConfig {
        state_file: config_manager.resolve(&client_config.state_file),
        ..BridgeConfig::from(&client_config)
    };

    let (sender, mut queue) = foreground_queue::<ForegroundMessage>();
    let bridge = ControlBridge::new(MemoryEngine::new(), bridge_config, sender.clone());
    bridge.start().context("Failed to start the torrent engine")?;

    spawn_input_reader(sender)?;

    let mut controller = ConsoleController::new(
        bridge.handle(),
        client_config.download_dir.clone(),
        io::stdout(),
    );
    println!("{} v{} - type `help` for commands", APP_NAME, VERSION);
    let run_result = controller.run(&mut queue);

    tracing::info!("Console closed, shutting down");
    let stop_result = bridge.stop();
    if let Err(e) = &stop_result {
        tracing::error!("Engine shutdown error: {}", e);
    }

    if controller.download_dir() != client_config.download_dir.as_path() {
        client_config.download_dir = controller.download_dir().to_path_buf();
        if let Err(e) = config_manager.save_client_config(&client_config) {
            tracing::warn!("Could not remember download directory: {:#}", e);
        }
    }

    tracing::info!("Application shutdown complete");

    run_result?;
    stop_result.context("Engine state was not saved")?;
    Ok(())
}

/// Forward stdin lines into the foreground queue from a detached thread
fn spawn_input_reader(
    sender: tokio::sync::mpsc::UnboundedSender<ForegroundMessage>,
) -> Result<()> {
    thread::Builder::new()
        .name("console-input".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if sender.send(ForegroundMessage::Input(line)).is_err() {
                    return;
                }
            }
            let _ = sender.send(ForegroundMessage::InputClosed);
        })
        .context("Failed to spawn input thread")?;
    Ok(())
}
