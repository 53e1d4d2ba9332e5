// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use rlswarm_core::domain::node_config::SwarmNodeManifest;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate a configuration file with every default spelled out
    Generate {
        /// Output path (default: ./rlswarm-config.yaml)
        #[arg(short, long, default_value = "./rlswarm-config.yaml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths),
        ConfigCommand::Validate { file } => validate(file.or(config_override)),
        ConfigCommand::Generate { output, force } => generate(output, force),
    }
}

fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = SwarmNodeManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. RLSWARM_CONFIG_PATH: {}",
            std::env::var("RLSWARM_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./rlswarm-config.yaml");
        println!("  4. ~/.rlswarm/config.yaml");
        println!("  5. /etc/rlswarm/config.yaml");
        if let Some(found) = SwarmNodeManifest::discover_config() {
            println!("  Discovered: {}", found.display().to_string().green());
        }
        println!();
    }

    let spec = &config.spec;
    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Node:".bold());
    println!("  Name: {}", config.metadata.name);
    println!();

    println!("{}", "Store:".bold());
    if spec.store.initial_peers.is_empty() {
        println!("  Initial peers: {}", "(none)".dimmed());
    } else {
        println!("  Initial peers:");
        for peer in &spec.store.initial_peers {
            println!("    - {}", peer);
        }
    }
    println!(
        "  Listen port: {}",
        spec.store
            .listen_port
            .map(|p| p.to_string())
            .unwrap_or_else(|| "(default)".to_string())
    );
    println!("  Ensure bootstrap success: {}", spec.store.ensure_bootstrap_success);
    println!();

    println!("{}", "Discovery:".bold());
    println!("  Local (mDNS): {}", spec.discovery.enable_local);
    println!("  Service name: {}", spec.discovery.service_name);
    println!("  Cache file: {}", spec.discovery.cache_file);
    println!("  Bootstrap peers: {}", spec.discovery.bootstrap_count);
    println!();

    println!("{}", "Swarm state cache:".bold());
    println!("  Poll interval: {}s", spec.cache.poll_interval_secs);
    println!("  Staleness threshold: {}s", spec.cache.staleness_threshold_secs);
    println!("  Gossip lookback: {} rounds", spec.cache.lookback_rounds);
    println!("  Gossip per key: {}", spec.cache.stage_gossip_limit);
    println!();

    println!("{}", "API:".bold());
    println!("  Listen: {}:{}", spec.api.bind_address, spec.api.port);
    println!(
        "  Metrics: {}",
        if spec.observability.metrics.enabled {
            format!("enabled on :{}", spec.observability.metrics.port)
        } else {
            "disabled".to_string()
        }
    );
    println!();

    Ok(())
}

fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = SwarmNodeManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

fn generate(output: PathBuf, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", output.display());
    }

    SwarmNodeManifest::default()
        .to_yaml_file(&output)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}
