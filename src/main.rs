//! OSC MIDI Companion
//!
//! Bridges the remote app's OSC control messages to a local MIDI output port.

use anyhow::{Context, Result};
use clap::Parser;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use osc_midi_companion::cli;
use osc_midi_companion::config::AppConfig;
use osc_midi_companion::discovery::{self, BroadcastConfig};
use osc_midi_companion::error::CompanionError;
use osc_midi_companion::output::{
    ConsoleOutput, MidiOutput, MidirTargets, OutputEmitter, OutputTargets,
};
use osc_midi_companion::paths;
use osc_midi_companion::server::OscServer;
use osc_midi_companion::translator::Translator;

/// Name of the port created by --virtual-port
const VIRTUAL_PORT_NAME: &str = "OSC MIDI Companion";

/// OSC MIDI Companion - forward remote control messages to a MIDI output port
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: companion.yaml, searched)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// List available MIDI output ports and exit
    #[arg(long)]
    list_ports: bool,

    /// Output port name to search for (overrides midi.output_port)
    #[arg(short, long)]
    port: Option<String>,

    /// Create a virtual output port instead of opening an existing one
    #[arg(long)]
    virtual_port: bool,

    /// UDP port for incoming OSC (overrides network.osc_port)
    #[arg(long)]
    osc_port: Option<u16>,

    /// Log MIDI events instead of sending them
    #[arg(long)]
    dry_run: bool,
}

/// Output opened at startup
enum ActiveOutput {
    Midi(Arc<MidiOutput>),
    Console(Arc<ConsoleOutput>),
}

impl ActiveOutput {
    fn emitter(&self) -> Arc<dyn OutputEmitter> {
        match self {
            ActiveOutput::Midi(output) => output.clone(),
            ActiveOutput::Console(output) => output.clone(),
        }
    }

    fn close(self) {
        match self {
            ActiveOutput::Midi(output) => match Arc::try_unwrap(output) {
                Ok(output) => output.close(),
                Err(output) => warn!("MIDI output '{}' still in use at shutdown", output.name()),
            },
            ActiveOutput::Console(output) => {
                info!("Dry run finished ({} events)", output.sent_count());
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level)?;

    cli::print_banner();

    let location = paths::resolve_config(args.config.as_deref());
    info!("Configuration file: {}", location.path.display());

    let mut config = AppConfig::load_or_default(&location.path).await?;
    if let Some(port) = &args.port {
        config.midi.output_port = port.clone();
    }
    if let Some(osc_port) = args.osc_port {
        config.network.osc_port = osc_port;
    }
    config.validate().context("Invalid configuration")?;
    config.log_summary();

    if args.list_ports {
        let ports = MidirTargets.list()?;
        cli::print_ports(&ports, Some(&config.midi.output_port));
        return Ok(());
    }

    if !discovery::network_available() {
        error!(
            "No network connection detected. \
             Please check your connection and restart the program."
        );
        return Err(CompanionError::NoNetwork.into());
    }

    let output = match open_output(&args, &config)? {
        Some(output) => output,
        None => {
            info!("No MIDI output selected, exiting");
            return Ok(());
        }
    };

    let translator = Arc::new(Mutex::new(Translator::new(&config, output.emitter())));

    let server = OscServer::bind(config.network.osc_port)
        .await
        .with_context(|| format!("Failed to bind OSC port {}", config.network.osc_port))?
        .spawn(translator.clone());

    let broadcast = discovery::start_broadcast(BroadcastConfig::from(&config.network)).await?;

    info!("Ready. Waiting for remote messages.");

    shutdown_signal().await;

    info!("Shutting down...");
    broadcast.stop().await;
    server.stop().await;

    {
        let translator = translator.lock();
        let snapshot = translator.rate_snapshot();
        info!(
            "Output '{}': last measured parameter rate {:.1} msg/s (pass probability {:.2})",
            translator.output_name(),
            snapshot.current_rate,
            snapshot.pass_probability
        );
        let malformed = translator.malformed_count();
        if malformed > 0 {
            info!("Ignored {} malformed messages", malformed);
        }
    }
    drop(translator);
    output.close();

    info!("OSC MIDI Companion shutdown complete");
    Ok(())
}

fn open_output(args: &Args, config: &AppConfig) -> Result<Option<ActiveOutput>> {
    if args.dry_run {
        info!("Dry run: MIDI events will be logged, not sent");
        let output = ConsoleOutput::new("dry-run");
        return Ok(Some(ActiveOutput::Console(Arc::new(output))));
    }

    if args.virtual_port {
        // --port names the virtual port; the configured search pattern does not apply
        let name = args.port.as_deref().unwrap_or(VIRTUAL_PORT_NAME);
        let output = MidiOutput::create_virtual(name)?;
        return Ok(Some(ActiveOutput::Midi(Arc::new(output))));
    }

    let output =
        cli::wait_for_output(&MidirTargets, &config.midi.output_port, cli::prompt_retry)?;

    Ok(output.map(|output| ActiveOutput::Midi(Arc::new(output))))
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
        return;
    }
    info!("Shutdown signal received");
}
