// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! HTTP client for the read-only API of a running node

use anyhow::{Context, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;

use rlswarm_core::domain::peer::PeerRoster;
use rlswarm_core::presentation::api::{GossipResponse, LeaderboardResponse};

#[derive(Debug, Clone)]
pub struct NodeClient {
    client: Client,
    base_url: String,
}

impl NodeClient {
    pub fn new(host: &str, port: u16) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url(host, port),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn leaderboard(&self) -> Result<LeaderboardResponse> {
        self.get_json("/api/leaderboard").await
    }

    pub async fn gossip(&self) -> Result<GossipResponse> {
        self.get_json("/api/gossip").await
    }

    pub async fn peers(&self) -> Result<PeerRoster> {
        self.get_json("/api/peers").await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .with_context(|| format!("Failed to query {}", path))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("{} returned HTTP {}: {}", path, status, error_text);
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", path))
    }
}

/// `http://host:port`, keeping an explicit scheme if `host` has one.
pub fn base_url(host: &str, port: u16) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        format!("{}:{}", host, port)
    } else {
        format!("http://{}:{}", host, port)
    }
}
