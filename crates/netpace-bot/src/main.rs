//! `bot`: run one paced outreach cycle, or inspect the ledger.

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use netpace::config::DEFAULT_CONFIG_PATH;
use netpace_bot::cli::{start, status};
use netpace_bot::logging::LogOptions;

#[derive(Parser)]
#[command(
    name = "bot",
    about = "Paced, resumable outreach over a headless Chromium session",
    version
)]
struct Cli {
    /// Path to the YAML config file.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log level or filter directive (trace, debug, info, warn, error).
    /// `RUST_LOG` takes precedence.
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in, then search, connect, sweep acceptances and follow up (default).
    Start,

    /// Print today's counters and ledger totals as JSON.
    Status,

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   bot completions bash > ~/.local/share/bash-completion/completions/bot
    ///   bot completions zsh > ~/.zfunc/_bot
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let log = LogOptions {
        level: cli.log_level.clone(),
        json: cli.log_json,
    };

    let result = match cli.command.unwrap_or(Commands::Start) {
        Commands::Start => start::run(&cli.config, &log)
            .await
            .and_then(|report| Ok(serde_json::to_string_pretty(&report)?)),
        Commands::Status => {
            status::run(&cli.config, &log).and_then(|value| Ok(serde_json::to_string_pretty(&value)?))
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "bot", &mut std::io::stdout());
            return;
        }
    };

    match result {
        Ok(output) => println!("{output}"),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    }
}
