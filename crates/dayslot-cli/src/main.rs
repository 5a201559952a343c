use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod common;

#[derive(Parser)]
#[command(name = "dayslot", version, about = "Plan the day in four time windows")]
struct Cli {
    /// More log output on stderr (-v info, -vv debug). RUST_LOG wins.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Item management
    Item {
        #[command(subcommand)]
        action: commands::item::ItemAction,
    },
    /// Roll the day over and reconcile calendar and reminders
    Refresh {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// The current window and what is in it
    Now {
        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// Calendar and reminders files
    Source {
        #[command(subcommand)]
        action: commands::source::SourceAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Print shell completions
    Completions {
        shell: clap_complete::Shell,
    },
}

fn init_tracing(verbose: u8) {
    let fallback = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)))
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Item { action } => commands::item::run(action),
        Commands::Refresh { json } => commands::refresh::run(json),
        Commands::Now { json } => commands::now::run(json),
        Commands::Source { action } => commands::source::run(action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "dayslot", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
