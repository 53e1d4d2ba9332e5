// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `rlswarm status`: summarize a running node through its HTTP API.

use anyhow::Result;
use colored::Colorize;

use crate::daemon::{check_node_status, NodeClient, NodeStatus};

pub async fn handle_command(host: &str, port: u16) -> Result<()> {
    match check_node_status(host, port).await? {
        NodeStatus::Healthy {
            last_polled_seconds_ago,
        } => {
            println!(
                "{} (last poll {}s ago)",
                "✓ Node is healthy".green(),
                last_polled_seconds_ago
            );
        }
        NodeStatus::Unhealthy { detail } => {
            println!("{} {}", "✗ Node is unhealthy:".red(), detail);
        }
        NodeStatus::Unreachable { error } => {
            println!("{} {}", "✗ Node is not reachable:".red(), error);
            return Ok(());
        }
    }

    let client = NodeClient::new(host, port)?;

    let gossip = client.gossip().await?;
    println!();
    println!("{}", "Swarm progress:".bold());
    if gossip.current_round < 0 {
        println!("  Round/stage: {}", "(not observed yet)".dimmed());
    } else {
        println!("  Round {} / stage {}", gossip.current_round, gossip.current_stage);
    }
    println!("  Recent gossip: {} messages", gossip.messages.len());

    let leaderboard = client.leaderboard().await?;
    println!();
    println!("{}", "Leaderboard:".bold());
    if leaderboard.leaders.is_empty() {
        println!("  {}", "(empty)".dimmed());
    }
    for (rank, leader) in leaderboard.leaders.iter().take(5).enumerate() {
        println!("  {}. {} {:.3}", rank + 1, leader.id, leader.score);
    }

    let peers = client.peers().await?;
    println!();
    println!("{}", "Peers:".bold());
    println!(
        "  {} known, {} connected (discovery {})",
        peers.total_count,
        peers.connected_count,
        if peers.discovery_active { "active".green() } else { "inactive".yellow() }
    );

    Ok(())
}
