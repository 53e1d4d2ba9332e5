// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Observer node server and the client side used to inspect it
//!
//! Handles:
//! - Running the node (store client, discovery, poller, HTTP API)
//! - HTTP health checks against a running node
//! - Graceful shutdown

use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

pub mod client;
pub mod server;

pub use client::NodeClient;
pub use server::start_daemon;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeStatus {
    Healthy { last_polled_seconds_ago: i64 },
    Unhealthy { detail: String },
    Unreachable { error: String },
}

/// Probe `/api/healthz` of the node at `host:port`.
pub async fn check_node_status(host: &str, port: u16) -> Result<NodeStatus> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(2000))
        .build()?;

    let health_url = format!("{}/api/healthz", client::base_url(host, port));

    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Healthy {
        last_polled_seconds_ago: i64,
    }

    #[derive(Deserialize)]
    struct Unhealthy {
        detail: String,
    }

    match client.get(&health_url).send().await {
        Ok(resp) if resp.status().is_success() => {
            let body: Healthy = resp.json().await?;
            Ok(NodeStatus::Healthy {
                last_polled_seconds_ago: body.last_polled_seconds_ago,
            })
        }
        Ok(resp) => {
            let status = resp.status();
            let detail = resp
                .json::<Unhealthy>()
                .await
                .map(|body| body.detail)
                .unwrap_or_else(|_| format!("HTTP {}", status));
            Ok(NodeStatus::Unhealthy { detail })
        }
        Err(e) => Ok(NodeStatus::Unreachable {
            error: e.to_string(),
        }),
    }
}
