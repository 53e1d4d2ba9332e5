// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # rlswarm Observer Node CLI
//!
//! The `rlswarm` binary runs an observer node next to a training swarm and
//! offers a few operator tools around it.
//!
//! ## Commands
//!
//! - `rlswarm serve [--seed FILE]` - Run discovery, the swarm state poller and the HTTP API
//! - `rlswarm status` - Query a running node's health, progress and peers
//! - `rlswarm config show|validate|generate` - Configuration management
//! - `rlswarm merge --stage N FILE` - Merge per-agent stage outputs into one record

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use rlswarm_cli::commands::{self, ConfigCommand, MergeArgs};
use rlswarm_cli::daemon;
use rlswarm_core::domain::node_config::SwarmNodeManifest;

/// rlswarm observer node
#[derive(Parser)]
#[command(name = "rlswarm")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "RLSWARM_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// HTTP API port (overrides spec.api.port)
    #[arg(long, global = true, env = "RLSWARM_PORT")]
    port: Option<u16>,

    /// Host of a running node, used by `status`
    #[arg(long, global = true, env = "RLSWARM_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "RLSWARM_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format (compact, json)
    #[arg(long, global = true, env = "RLSWARM_LOG_FORMAT")]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the observer node
    #[command(name = "serve")]
    Serve {
        /// JSON file with initial store contents (development runs)
        #[arg(long, value_name = "FILE")]
        seed: Option<PathBuf>,
    },

    /// Show the state of a running node
    #[command(name = "status")]
    Status,

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Merge per-agent outputs of one stage
    #[command(name = "merge")]
    Merge(MergeArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logging settings come from the manifest unless given on the command line.
    let logging = SwarmNodeManifest::logging_settings(cli.config.as_deref());
    init_logging(
        cli.log_level.as_deref().unwrap_or(&logging.level),
        cli.log_format.as_deref().unwrap_or(&logging.format),
    )?;

    match cli.command {
        Some(Commands::Serve { seed }) => {
            let config = SwarmNodeManifest::load_or_default(cli.config)
                .context("Failed to load configuration")?;
            daemon::start_daemon(config, cli.port, seed).await
        }
        Some(Commands::Status) => {
            let port = match cli.port {
                Some(port) => port,
                None => SwarmNodeManifest::load_or_default(cli.config)
                    .map(|manifest| manifest.spec.api.port)
                    .unwrap_or(8000),
            };
            commands::status::handle_command(&cli.host, port).await
        }
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        Some(Commands::Merge(args)) => commands::merge::handle_command(args),
        None => {
            // No command provided - show help
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, format: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if format == "json" {
        builder.json().init();
    } else {
        builder.compact().init();
    }

    Ok(())
}
