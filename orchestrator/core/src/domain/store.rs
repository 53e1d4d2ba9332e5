// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Distributed Store Contract
//!
//! The replicated key-value layer the swarm publishes into is an external
//! collaborator. This module pins down what rlswarm needs from it and the
//! well-known key namespace shared by the training pipeline, the cache and
//! discovery.
//!
//! | Key | Shape | Written by |
//! |-----|-------|------------|
//! | [`ROUND_STAGE_NUMBER_KEY`] | `[round, stage]` | training pipeline |
//! | [`leaderboard_key`] | `[[node_id, score], ...]` | training pipeline |
//! | [`rewards_key`] | `{node_id: reward}` | training pipeline |
//! | [`outputs_key`] | `{question: [timestamp, output]}` | agents (one sub-key per question) |
//!
//! Implementations live in `crate::infrastructure`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::domain::swarm_state::RoundStage;

pub const ROUND_STAGE_NUMBER_KEY: &str = "rl_swarm_rs";
pub const LEADERBOARD_KEY_SUFFIX: &str = "rl_swarm_leaderboard";
pub const REWARDS_KEY_SUFFIX: &str = "rl_swarm_rewards";
pub const OUTPUTS_KEY_SUFFIX: &str = "rl_swarm_outputs";

/// Port the store is assumed to listen on when it does not report one.
pub const DEFAULT_STORE_PORT: u16 = 30303;

pub fn leaderboard_key(round: i64, stage: i64) -> String {
    format!("{round}_{stage}_{LEADERBOARD_KEY_SUFFIX}")
}

pub fn rewards_key(round: i64, stage: i64) -> String {
    format!("{round}_{stage}_{REWARDS_KEY_SUFFIX}")
}

pub fn outputs_key(node: &str, round: i64, stage: i64) -> String {
    format!("{node}_{round}_{stage}_{OUTPUTS_KEY_SUFFIX}")
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("key {0} not found")]
    NotFound(String),

    #[error("malformed value under key {key}: {reason}")]
    Malformed { key: String, reason: String },

    #[error("store request timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to add peers {addrs:?}: {reason}")]
    PeerRejected { addrs: Vec<String>, reason: String },
}

/// A remote peer as reported by the store's active-peer or routing-table view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotePeer {
    pub peer_id: String,
    #[serde(default)]
    pub addresses: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingBucket {
    #[serde(default)]
    pub peers: Vec<RemotePeer>,
}

/// Client handle to the distributed store.
///
/// Values are last-writer-wins by store timestamp. A key written with sub-keys is
/// returned as a JSON object of `sub_key -> value`.
#[async_trait]
pub trait SwarmStore: Send + Sync {
    /// Read `key`. With `latest`, the store must consult the network for the newest
    /// value instead of answering from a local replica.
    async fn get(&self, key: &str, latest: bool) -> Result<Option<Value>, StoreError>;

    /// Addresses under which the store is reachable from the outside.
    async fn visible_maddrs(&self) -> Result<Vec<String>, StoreError>;

    /// Hand additional reachable addresses to the store's peer layer.
    async fn add_initial_peers(&self, maddrs: &[String]) -> Result<(), StoreError>;

    /// Port the store listens on, if known.
    fn listen_port(&self) -> Option<u16>;

    /// Currently active peers. `None` when the store has no such view.
    async fn active_peers(&self) -> Result<Option<Vec<RemotePeer>>, StoreError> {
        Ok(None)
    }

    /// Routing table buckets. `None` when the store has no such view.
    async fn routing_table(&self) -> Result<Option<Vec<RoutingBucket>>, StoreError> {
        Ok(None)
    }
}

/// Read and decode the swarm-wide round/stage counter.
pub async fn read_round_stage(store: &dyn SwarmStore) -> Result<RoundStage, StoreError> {
    let value = store
        .get(ROUND_STAGE_NUMBER_KEY, true)
        .await?
        .ok_or_else(|| StoreError::NotFound(ROUND_STAGE_NUMBER_KEY.to_string()))?;
    RoundStage::from_value(&value).ok_or_else(|| StoreError::Malformed {
        key: ROUND_STAGE_NUMBER_KEY.to_string(),
        reason: format!("expected [round, stage], got {value}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_namespace() {
        assert_eq!(leaderboard_key(3, 1), "3_1_rl_swarm_leaderboard");
        assert_eq!(rewards_key(0, 2), "0_2_rl_swarm_rewards");
        assert_eq!(outputs_key("QmNode", 25, 0), "QmNode_25_0_rl_swarm_outputs");
    }
}
