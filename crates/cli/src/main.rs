//! `gpcard`: manage GlobalPlatform cards over PC/SC

use std::path::PathBuf;

use clap::Parser;
use eyre::WrapErr;
use gpcard_transport_pcsc::PcscTransport;
use tracing::info;
use tracing_subscriber::{EnvFilter, filter::LevelFilter};

mod commands;
mod config;
mod utils;

use commands::*;
use config::{CONFIG_FILE, Config};

#[derive(Parser)]
#[command(version, about = "GlobalPlatform card manager over SCP02")]
struct Cli {
    /// PC/SC reader name
    #[arg(short, long)]
    reader: String,

    /// Configuration file
    #[arg(short, long, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Trace level output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> eyre::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let config = Config::load(&cli.config)?;
    let transport = PcscTransport::connect(&cli.reader)
        .wrap_err_with(|| format!("failed to connect to reader `{}`", cli.reader))?;
    info!(reader = %cli.reader, "Connected");

    match &cli.command {
        Commands::Select { aid } => select_command(transport, aid.as_deref()),
        Commands::Open => open_command(transport, &config),
        Commands::Delete { aid, if_present } => {
            delete_command(transport, &config, aid, *if_present)
        }
        Commands::Install {
            package,
            applet,
            instance,
            params,
        } => install_command(
            transport,
            &config,
            package,
            applet,
            instance.as_deref(),
            params,
        ),
        Commands::Load {
            package,
            files,
            security_domain,
            reload_targets,
            force,
        } => load_command(
            transport,
            &config,
            package,
            files,
            security_domain.as_deref(),
            reload_targets,
            *force,
        ),
        Commands::LoadKeycard { files, force } => {
            load_keycard_command(transport, &config, files, *force)
        }
        Commands::InstallKeycard { ndef, cash } => {
            install_keycard_command(transport, &config, ndef.as_deref(), cash.as_deref())
        }
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::TRACE
    } else {
        tracing::Level::INFO
    };

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(true)
        .init();
}
