// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Swarm State Cache
//!
//! Periodically polls the distributed store and publishes a [`SwarmSnapshot`]
//! (round/stage, leaderboard, gossip feed, poll time) for request handlers.
//!
//! ## Poll cycle
//!
//! 1. Read the round/stage counter. On failure the previous value is kept.
//! 2. Read the leaderboard for that round/stage. Absent key means an empty
//!    leaderboard; a read failure keeps the previous one.
//! 3. Read the rewards map for the node set. Without it the gossip feed is left
//!    as is. Otherwise every `(round, stage, node)` in the lookback window is
//!    read and the newest outputs per key become gossip messages.
//! 4. Stamp the poll time, whatever happened above.
//!
//! Steps 2 and 3 are skipped until a round/stage has been observed.
//!
//! ## Concurrency
//!
//! The next snapshot is assembled without holding any lock and published with
//! one pointer swap, so readers always see a complete snapshot and never wait
//! on the store. A panic inside a cycle is caught; the cycle still stamps the
//! poll time and the loop carries on.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use parking_lot::RwLock;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::health::Health;
use crate::domain::node_config::CacheConfig;
use crate::domain::store::{
    leaderboard_key, outputs_key, read_round_stage, rewards_key, StoreError, SwarmStore,
};
use crate::domain::swarm_state::{
    sort_newest_first, GossipMessage, LeaderboardEntry, RoundStage, SwarmSnapshot,
};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("poll cycle panicked: {0}")]
    Panicked(String),
}

/// Outcome of one poll cycle. Failed steps kept their previous values.
#[derive(Debug, Default)]
pub struct PollReport {
    pub errors: Vec<CacheError>,
}

impl PollReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub poll_interval: Duration,
    pub staleness_threshold: Duration,
    pub lookback_rounds: i64,
    pub stage_gossip_limit: usize,
    pub max_concurrent_reads: usize,
}

impl From<&CacheConfig> for CacheSettings {
    fn from(config: &CacheConfig) -> Self {
        Self {
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            staleness_threshold: Duration::from_secs(config.staleness_threshold_secs),
            lookback_rounds: config.lookback_rounds,
            stage_gossip_limit: config.stage_gossip_limit,
            max_concurrent_reads: config.max_concurrent_reads.max(1),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self::from(&CacheConfig::default())
    }
}

pub struct SwarmStateCache {
    store: Arc<dyn SwarmStore>,
    settings: CacheSettings,
    snapshot: RwLock<Arc<SwarmSnapshot>>,
}

impl SwarmStateCache {
    pub fn new(store: Arc<dyn SwarmStore>, settings: CacheSettings) -> Self {
        Self {
            store,
            settings,
            snapshot: RwLock::new(Arc::new(SwarmSnapshot::default())),
        }
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    /// The most recently published snapshot.
    pub fn snapshot(&self) -> Arc<SwarmSnapshot> {
        self.snapshot.read().clone()
    }

    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        self.snapshot().leaderboard.clone()
    }

    pub fn gossip(&self) -> Vec<GossipMessage> {
        self.snapshot().gossip.clone()
    }

    pub fn gossip_since(&self, since_round: i64) -> Vec<GossipMessage> {
        self.snapshot().gossip_since(since_round)
    }

    pub fn round_stage(&self) -> RoundStage {
        self.snapshot().round_stage
    }

    pub fn last_polled(&self) -> Option<DateTime<Utc>> {
        self.snapshot().last_polled_at
    }

    pub fn health(&self) -> Health {
        self.health_at(Utc::now())
    }

    pub fn health_at(&self, now: DateTime<Utc>) -> Health {
        Health::evaluate(self.last_polled(), now, self.settings.staleness_threshold)
    }

    /// Poll every `poll_interval` until `shutdown` fires.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval = ?self.settings.poll_interval, "Swarm state poller started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.poll_once().await;
                }
            }
        }
        info!("Swarm state poller stopped");
    }

    /// Run one poll cycle and publish the result.
    pub async fn poll_once(&self) -> PollReport {
        let started = Instant::now();
        let previous = self.snapshot();

        let (mut next, report) = match AssertUnwindSafe(self.refresh(&previous))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                error!(reason = %reason, "Swarm state poll cycle panicked");
                let report = PollReport {
                    errors: vec![CacheError::Panicked(reason)],
                };
                ((*previous).clone(), report)
            }
        };

        next.last_polled_at = Some(Utc::now());
        let leaderboard_len = next.leaderboard.len();
        let gossip_len = next.gossip.len();
        *self.snapshot.write() = Arc::new(next);

        metrics::counter!("rlswarm_cache_polls_total").increment(1);
        if !report.is_clean() {
            metrics::counter!("rlswarm_cache_poll_failures_total").increment(report.errors.len() as u64);
        }
        metrics::gauge!("rlswarm_leaderboard_entries").set(leaderboard_len as f64);
        metrics::gauge!("rlswarm_gossip_messages").set(gossip_len as f64);
        metrics::histogram!("rlswarm_cache_poll_duration_seconds").record(started.elapsed().as_secs_f64());

        debug!(
            leaderboard = leaderboard_len,
            gossip = gossip_len,
            failures = report.errors.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Swarm state poll finished"
        );
        report
    }

    async fn refresh(&self, previous: &SwarmSnapshot) -> (SwarmSnapshot, PollReport) {
        let mut next = previous.clone();
        let mut report = PollReport::default();

        match read_round_stage(self.store.as_ref()).await {
            Ok(round_stage) => {
                debug!(round = round_stage.round, stage = round_stage.stage, "Got round/stage");
                next.round_stage = round_stage;
            }
            Err(e) => {
                warn!(error = %e, "Could not get current round or stage, keeping previous");
                report.errors.push(e.into());
            }
        }

        let round_stage = next.round_stage;
        if !round_stage.is_known() {
            debug!("Round/stage never observed, skipping leaderboard and gossip");
            return (next, report);
        }

        match self.fetch_leaderboard(round_stage).await {
            Ok(leaderboard) => next.leaderboard = leaderboard,
            Err(e) => {
                warn!(error = %e, "Could not get leaderboard data, keeping previous");
                report.errors.push(e);
            }
        }

        match self.fetch_gossip(round_stage).await {
            Ok(Some(gossip)) => next.gossip = gossip,
            Ok(None) => debug!(
                round = round_stage.round,
                stage = round_stage.stage,
                "No rewards for current round/stage, gossip unchanged"
            ),
            Err(e) => {
                warn!(error = %e, "Could not get gossip, keeping previous");
                report.errors.push(e);
            }
        }

        (next, report)
    }

    async fn fetch_leaderboard(&self, rs: RoundStage) -> Result<Vec<LeaderboardEntry>, CacheError> {
        let key = leaderboard_key(rs.round, rs.stage);
        let Some(raw) = self.store.get(&key, true).await? else {
            return Ok(Vec::new());
        };
        let Value::Array(rows) = raw else {
            return Err(StoreError::Malformed {
                key,
                reason: "expected a list of [node_id, score]".to_string(),
            }
            .into());
        };

        Ok(rows
            .iter()
            .filter_map(|row| {
                let entry = LeaderboardEntry::from_tuple(row);
                if entry.is_none() {
                    warn!(key = %key, row = %row, "Skipping malformed leaderboard row");
                }
                entry
            })
            .collect())
    }

    /// `None` when there is no rewards map to take the node set from.
    async fn fetch_gossip(&self, rs: RoundStage) -> Result<Option<Vec<GossipMessage>>, CacheError> {
        let key = rewards_key(rs.round, rs.stage);
        let nodes: Vec<String> = match self.store.get(&key, true).await? {
            Some(Value::Object(rewards)) if !rewards.is_empty() => rewards.keys().cloned().collect(),
            _ => return Ok(None),
        };

        let start_round = (rs.round - self.settings.lookback_rounds).max(0);
        let mut targets = Vec::new();
        for round in start_round..=rs.round {
            for stage in 0..=rs.stage {
                for node in &nodes {
                    targets.push((node.clone(), round, stage));
                }
            }
        }

        let batches: Vec<Vec<GossipMessage>> = stream::iter(targets)
            .map(move |(node, round, stage)| async move {
                self.node_gossip(&node, round, stage).await
            })
            .buffer_unordered(self.settings.max_concurrent_reads)
            .collect()
            .await;

        let mut gossip: Vec<GossipMessage> = batches.into_iter().flatten().collect();
        sort_newest_first(&mut gossip);
        Ok(Some(gossip))
    }

    /// Newest outputs one node published for one round/stage.
    async fn node_gossip(&self, node: &str, round: i64, stage: i64) -> Vec<GossipMessage> {
        let key = outputs_key(node, round, stage);
        let outputs = match self.store.get(&key, false).await {
            Ok(Some(Value::Object(outputs))) => outputs,
            Ok(Some(other)) => {
                warn!(key = %key, value = %other, "Skipping outputs that are not a question map");
                return Vec::new();
            }
            Ok(None) => return Vec::new(),
            Err(e) => {
                debug!(key = %key, error = %e, "Failed to read outputs");
                return Vec::new();
            }
        };

        let mut timed: Vec<(f64, &str, &Value)> = outputs
            .iter()
            .filter_map(|(question, entry)| match entry.as_array().map(Vec::as_slice) {
                Some([ts, output, ..]) => ts.as_f64().map(|ts| (ts, question.as_str(), output)),
                _ => {
                    warn!(key = %key, question = %question, "Skipping output without [timestamp, output]");
                    None
                }
            })
            .collect();
        timed.sort_by(|a, b| a.0.total_cmp(&b.0));

        let skip = timed.len().saturating_sub(self.settings.stage_gossip_limit);
        timed[skip..]
            .iter()
            .filter_map(|(ts, question, output)| match output.get("answer") {
                Some(answer) => Some(GossipMessage::new(node, round, stage, question, answer, *ts)),
                None => {
                    debug!(key = %key, question = %question, "Output has no answer");
                    None
                }
            })
            .collect()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
