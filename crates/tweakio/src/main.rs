// SPDX-FileCopyrightText: 2026 Tweakio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tweakio - A rate-limited, write-behind chat capture pipeline.
//!
//! This is the binary entry point for tweakio.

mod ingest;
mod list;
mod replay;

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::error;
use tweakio_config::model::TweakioConfig;
use tweakio_core::TweakioError;

/// Tweakio - A rate-limited, write-behind chat capture pipeline.
#[derive(Parser, Debug)]
#[command(name = "tweakio", version, about, long_about = None)]
struct Cli {
    /// Config file to use instead of the XDG lookup.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a captured JSONL chat dump through the pipeline into SQLite.
    Ingest {
        /// Capture file, one JSON object per line.
        file: PathBuf,
        /// Cap on chats enumerated (defaults to fetch.max_chats).
        #[arg(long)]
        max_chats: Option<usize>,
        /// Print the run summary as JSON.
        #[arg(long)]
        json: bool,
    },
    /// List stored chats.
    Chats {
        #[arg(long)]
        json: bool,
    },
    /// List stored messages.
    Messages {
        /// Only this chat, in write order.
        #[arg(long)]
        chat: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// Validate and print the effective configuration.
    Config,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load and validate configuration at startup
    let loaded = match &cli.config {
        Some(path) => tweakio_config::load_and_validate_path(path),
        None => tweakio_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            tweakio_config::render_errors(&errors);
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config.log.level);

    match run(cli.command, &config).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Option<Commands>, config: &TweakioConfig) -> Result<ExitCode, TweakioError> {
    match command {
        Some(Commands::Ingest {
            file,
            max_chats,
            json,
        }) => {
            let cancel = tweakio_pipeline::install_signal_handler();
            let summary = ingest::run_ingest(config, &file, max_chats, cancel.clone()).await;
            // Stops the signal listener.
            cancel.cancel();
            let summary = summary?;
            if json {
                let out = serde_json::to_string_pretty(&summary)
                    .map_err(|e| TweakioError::Internal(e.to_string()))?;
                println!("{out}");
            } else {
                println!("{summary}");
            }
            // Partial or dead-lettered runs exit with 2.
            Ok(if summary.is_clean() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            })
        }
        Some(Commands::Chats { json }) => {
            list::run_chats(config, json).await?;
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::Messages { chat, limit, json }) => {
            list::run_messages(config, chat.as_deref(), limit, json).await?;
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::Config) => {
            let out = toml::to_string_pretty(config)
                .map_err(|e| TweakioError::Internal(e.to_string()))?;
            print!("{out}");
            Ok(ExitCode::SUCCESS)
        }
        None => {
            println!("tweakio: use --help for available commands");
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Logs go to stderr so `--json` output stays machine-readable.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("tweakio={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}
