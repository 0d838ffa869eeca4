use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "autorevert", version, about = "Auto-revert CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Replay a sequence of timer events and print what happens
    Simulate(commands::simulate::SimulateArgs),
    /// Watch a git repository and revert commits that outlive the countdown
    Watch(commands::watch::WatchArgs),
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("AUTOREVERT_LOG")
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_logging();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Config { action } => commands::config::run(action),
        Commands::Simulate(args) => commands::simulate::run(args),
        Commands::Watch(args) => commands::watch::run(args),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
