mod app;
mod chat;
mod weather;

use anyhow::Result;
use clap::{Parser, Subcommand};
use hubkit::HubConfig;
use std::path::{Path, PathBuf};

/// Hubkit demo - weather and chat modules behind one hub
#[derive(Parser)]
#[command(name = "hubkit-demo")]
#[command(about = "Hubkit demo - weather and chat modules behind one hub")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print effective configuration (JSON) and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate two peers and print every message they receive
    Run,
    /// Validate configuration and exit
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config
        && !Path::new(path).is_file()
    {
        anyhow::bail!("config file does not exist: {}", path.display());
    }

    // defaults -> YAML (if provided) -> env (HUBKIT__*) -> CLI overrides
    let mut config = HubConfig::load(cli.config.as_deref())?;
    if let Some(level) = verbosity(cli.verbose) {
        config.logging.level = level.to_owned();
    }

    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    hubkit::bootstrap::init_logging(&config.logging)?;
    tracing::info!("hubkit demo starting");

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(config).await,
        Commands::Check => check(&config),
    }
}

fn verbosity(count: u8) -> Option<&'static str> {
    match count {
        0 => None,
        1 => Some("info"),
        2 => Some("debug"),
        _ => Some("trace"),
    }
}

async fn run(config: HubConfig) -> Result<()> {
    for delivery in app::run_session(config).await? {
        println!("{}", serde_json::to_string(&delivery)?);
    }
    Ok(())
}

fn check(config: &HubConfig) -> Result<()> {
    tracing::info!("checking configuration");
    app::check_modules(config)?;
    println!("Configuration is valid");
    Ok(())
}
