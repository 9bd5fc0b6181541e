use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "adaptload", version, about = "Adaptive resource delivery CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a loading decision
    Decide(commands::decide::DecideArgs),
    /// Print cache headers for a request path
    Headers(commands::headers::HeadersArgs),
    /// Check metric samples against the performance budget
    Budget(commands::budget::BudgetArgs),
    /// Warm URLs with prefetch hints
    Prefetch(commands::prefetch::PrefetchArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("ADAPTLOAD_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_logging();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Decide(args) => commands::decide::run(args),
        Commands::Headers(args) => commands::headers::run(args),
        Commands::Budget(args) => commands::budget::run(args),
        Commands::Prefetch(args) => commands::prefetch::run(args),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
