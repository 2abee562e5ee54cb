mod cmd;
mod logging;

use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "regsync",
    about = "Mirror Mantis regression tickets into a Google Sheets progress tracker",
    version,
    propagate_version = true
)]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(long, global = true, env = "REGSYNC_CONFIG", default_value = "config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web control surface and the periodic scheduler
    Serve {
        /// Port to listen on (0 = OS-assigned)
        #[arg(long, default_value = "5001")]
        port: u16,
        /// Open the control page in a browser
        #[arg(long)]
        open: bool,
    },

    /// Run one synchronization and print the summary
    Run {
        /// Print the summary as JSON
        #[arg(long, short = 'j')]
        json: bool,
    },

    /// Read and modify the configuration file
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let (default_level, log_dir) = match &cli.command {
        Commands::Serve { .. } | Commands::Run { .. } => {
            (tracing::Level::INFO, Some(cmd::log_dir_for(&cli.config)))
        }
        Commands::Config { .. } => (tracing::Level::WARN, None),
    };
    logging::init(default_level, log_dir.as_deref());

    let result = match cli.command {
        Commands::Serve { port, open } => cmd::serve::run(&cli.config, port, open),
        Commands::Run { json } => cmd::run::run(&cli.config, json),
        Commands::Config { subcommand } => cmd::config::run(&cli.config, subcommand),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
