use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "coursesync", version, about = "Sync LMS course data into a local store")]
struct Cli {
    /// Database file (defaults to coursesync.db in the data directory)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Log sync progress to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pull courses, assignments and modules from the LMS
    Sync(commands::sync::SyncArgs),
    /// LMS token management
    Auth {
        #[command(subcommand)]
        action: commands::auth::AuthAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Calendar events
    Events {
        #[command(subcommand)]
        action: commands::events::EventsAction,
    },
    /// Synced courses and their modules
    Courses {
        #[command(subcommand)]
        action: commands::courses::CoursesAction,
    },
    /// Delete all events, modules and module items for the configured owner
    Wipe,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let ctx = commands::Context { db: cli.db };
    let result = match cli.command {
        Commands::Sync(args) => commands::sync::run(args, &ctx),
        Commands::Auth { action } => commands::auth::run(action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Events { action } => commands::events::run(action, &ctx),
        Commands::Courses { action } => commands::courses::run(action, &ctx),
        Commands::Wipe => commands::wipe::run(&ctx),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
