use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tagdump_core::Engine;
use tagdump_transport_pcsc::{PcscDeviceManager, PcscTransport};
use tracing::{debug, info};

mod commands;
mod config;
mod utils;

use commands::*;
use config::Settings;
use utils::reader;

#[derive(Parser)]
#[command(version, about = "Dump, mirror and probe contactless tags through a PC/SC reader")]
struct Cli {
    /// Optional reader name to use (will auto-detect if not specified)
    #[arg(short, long)]
    reader: Option<String>,

    /// MIFARE Classic key tried before the defaults (12 hex characters)
    #[arg(short, long)]
    key: Option<String>,

    /// Extra application identifier to SELECT on IsoDep tags (hex)
    #[arg(short, long)]
    aid: Option<String>,

    /// Seconds to wait for a tag on the selected (or first) reader
    #[arg(short, long)]
    wait: Option<u64>,

    /// Pages to read from Ultralight-family tags
    #[arg(short, long)]
    pages: Option<u16>,

    /// Trace level output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available readers
    List,

    /// Show the tag identifier, technologies and anti-collision data
    Inspect {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Read the tag through its negotiated technology and save a dump record
    Read {
        /// Directory the dump record is written to
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Mirror a saved dump record onto the tag
    Write {
        /// Dump record produced by `read`
        #[arg(required = true)]
        dump: PathBuf,
    },

    /// Run the IsoDep APDU probes
    Probe {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let manager = PcscDeviceManager::new()?;
    let settings = Settings::load(cli.overrides())?;
    debug!(?settings, "Loaded settings");

    match cli.command {
        Commands::List => reader::list_readers(&manager)?,
        Commands::Inspect { json } => {
            inspect_command(connect(&manager, &settings, cli.wait)?, json).await?
        }
        Commands::Read { out } => {
            let engine = connect(&manager, &settings, cli.wait)?;
            let dir = out
                .or_else(|| settings.output_dir.clone())
                .unwrap_or_else(|| PathBuf::from("."));
            read_command(engine, &dir).await?
        }
        Commands::Write { dump } => {
            write_command(connect(&manager, &settings, cli.wait)?, &dump).await?
        }
        Commands::Probe { json } => {
            probe_command(connect(&manager, &settings, cli.wait)?, json).await?
        }
    }

    Ok(())
}

/// Open the selected reader and bind an engine to the tag in its field
fn connect(
    manager: &PcscDeviceManager,
    settings: &Settings,
    wait: Option<u64>,
) -> eyre::Result<Engine<PcscTransport>> {
    let reader = match (&settings.reader, wait) {
        (name, Some(secs)) => reader::wait_for_tag(manager, name.as_deref(), secs)?,
        (Some(name), None) => reader::find_reader_by_name(manager, name)?,
        (None, None) => reader::find_reader_with_tag(manager)?,
    };
    info!("Using reader: {}", reader.name());

    let mut transport = manager.open_reader_with_config(reader.name(), settings.pcsc_config())?;
    let tag = transport.discover()?;
    Ok(Engine::new(transport, tag, settings.engine_config()?))
}

impl Cli {
    /// Values given on the command line, layered over the config file and environment
    fn overrides(&self) -> Settings {
        Settings {
            key: self.key.clone(),
            aid: self.aid.clone(),
            reader: self.reader.clone(),
            ultralight_pages: self.pages,
            ..Settings::default()
        }
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_ansi(true)
        .init();
}
