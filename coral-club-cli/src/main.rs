use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod context;

use commands::{
    AdminCommand, CatalogCommand, ConfigCommand, ConfirmCommand, LogsCommand, ReleaseCommand,
    ReserveCommand, StatusCommand, SweepCommand, TentsCommand, WatchCommand,
};
use config::Config;

#[derive(Parser)]
#[command(name = "coral")]
#[command(version)]
#[command(about = "Front desk and admin CLI for Coral Club tent bookings", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show tent counts and pending reservations
    Status(StatusCommand),

    /// List tents
    Tents(TentsCommand),

    /// List extras available for a reservation
    Catalog(CatalogCommand),

    /// Hold a tent for a customer
    Reserve(ReserveCommand),

    /// Mark a reservation as paid
    Confirm(ConfirmCommand),

    /// Cancel a pending reservation
    Release(ReleaseCommand),

    /// Expire holds whose time is up
    Sweep(SweepCommand),

    /// Admin edits (requires PIN)
    Admin(AdminCommand),

    /// Follow the shared state until Ctrl+C
    Watch(WatchCommand),

    /// Show the audit log
    Logs(LogsCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = Config::load(cli.config)?;

    let command = match cli.command {
        Some(Commands::Config(cmd)) => return cmd.run(&config),
        Some(command) => command,
        None => {
            println!("Use --help to see available commands");
            return Ok(());
        }
    };

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(execute_command(command, &config))
}

async fn execute_command(
    command: Commands,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let replica = context::connect(config).await?;

    match command {
        Commands::Status(cmd) => cmd.execute(&replica).await,
        Commands::Tents(cmd) => cmd.execute(&replica).await,
        Commands::Catalog(cmd) => cmd.execute(&replica).await,
        Commands::Reserve(cmd) => cmd.execute(&replica, config).await,
        Commands::Confirm(cmd) => cmd.execute(&replica).await,
        Commands::Release(cmd) => cmd.execute(&replica).await,
        Commands::Sweep(cmd) => cmd.execute(&replica).await,
        Commands::Admin(cmd) => cmd.execute(&replica, config).await,
        Commands::Watch(cmd) => cmd.execute(&replica).await,
        Commands::Logs(cmd) => cmd.execute(&replica).await,
        Commands::Config(cmd) => cmd.run(config),
    }
}
