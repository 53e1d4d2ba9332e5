// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Swarm State
//!
//! Value types derived from the distributed store and published by the
//! swarm state cache:
//!
//! - [`RoundStage`]: the swarm-wide progress counter.
//! - [`LeaderboardEntry`]: one `(node, score)` row.
//! - [`GossipMessage`]: one recent question/answer from a node.
//! - [`SwarmSnapshot`]: everything above plus the poll time, published as a unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Round and stage the swarm is currently in. `-1` means never observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoundStage {
    pub round: i64,
    pub stage: i64,
}

impl RoundStage {
    pub const UNKNOWN: RoundStage = RoundStage { round: -1, stage: -1 };

    pub fn new(round: i64, stage: i64) -> Self {
        Self { round, stage }
    }

    pub fn is_known(&self) -> bool {
        self.round >= 0 && self.stage >= 0
    }

    /// Decode the `[round, stage]` pair stored under the round/stage key.
    pub fn from_value(value: &Value) -> Option<Self> {
        let pair = value.as_array()?;
        match pair.as_slice() {
            [round, stage] => {
                let round = round.as_i64().filter(|r| *r >= 0)?;
                let stage = stage.as_i64().filter(|s| *s >= 0)?;
                Some(Self { round, stage })
            }
            _ => None,
        }
    }
}

impl Default for RoundStage {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

/// One leaderboard row. `values` is reserved for per-round score history and is
/// always empty for now.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub id: String,
    pub score: f64,
    #[serde(default)]
    pub values: Vec<Value>,
}

impl LeaderboardEntry {
    /// Decode one `[node_id, score]` tuple. Non-string ids are rendered as JSON text.
    pub fn from_tuple(value: &Value) -> Option<Self> {
        let tuple = value.as_array()?;
        let (id, score) = match tuple.as_slice() {
            [id, score, ..] => (id, score),
            _ => return None,
        };
        let id = match id {
            Value::String(id) => id.clone(),
            Value::Null => return None,
            other => other.to_string(),
        };
        Some(Self {
            id,
            score: score.as_f64()?,
            values: Vec::new(),
        })
    }
}

/// One recent question/answer published by a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GossipMessage {
    pub id: String,
    pub message: String,
    pub node: String,
    pub timestamp: f64,
    pub round: i64,
    pub stage: i64,
}

impl GossipMessage {
    pub fn new(node: &str, round: i64, stage: i64, question: &str, answer: &Value, timestamp: f64) -> Self {
        let answer = match answer {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        Self {
            id: gossip_id(node, round, stage, question),
            message: format!("{question}...Answer: {answer}"),
            node: node.to_string(),
            timestamp,
            round,
            stage,
        }
    }
}

/// Content-derived message id: identical `(node, round, stage, question)` always map
/// to the same id, so re-reads of the same output do not look like new gossip.
pub fn gossip_id(node: &str, round: i64, stage: i64, question: &str) -> String {
    let digest = Sha256::digest(format!("{node}_{round}_{stage}_{question}").as_bytes());
    hex::encode(&digest[..16])
}

/// Order a feed newest first. Equal timestamps fall back to id order so the feed
/// is stable across polls.
pub fn sort_newest_first(messages: &mut [GossipMessage]) {
    messages.sort_by(|a, b| {
        b.timestamp
            .total_cmp(&a.timestamp)
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Everything the cache serves, published as one unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwarmSnapshot {
    #[serde(flatten)]
    pub round_stage: RoundStage,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub gossip: Vec<GossipMessage>,
    pub last_polled_at: Option<DateTime<Utc>>,
}

impl SwarmSnapshot {
    /// Gossip from `since_round` onwards. Order is preserved.
    pub fn gossip_since(&self, since_round: i64) -> Vec<GossipMessage> {
        self.gossip
            .iter()
            .filter(|message| message.round >= since_round)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_round_stage_decoding() {
        assert_eq!(RoundStage::from_value(&json!([25, 1])), Some(RoundStage::new(25, 1)));
        assert_eq!(RoundStage::from_value(&json!([25])), None);
        assert_eq!(RoundStage::from_value(&json!([-3, 0])), None);
        assert_eq!(RoundStage::from_value(&json!({"round": 1})), None);
        assert!(!RoundStage::default().is_known());
    }

    #[test]
    fn test_leaderboard_tuple_decoding() {
        let entry = LeaderboardEntry::from_tuple(&json!(["node-a", 4.5])).unwrap();
        assert_eq!(entry.id, "node-a");
        assert_eq!(entry.score, 4.5);
        assert!(entry.values.is_empty());

        assert_eq!(LeaderboardEntry::from_tuple(&json!([17, 2])).unwrap().id, "17");
        assert!(LeaderboardEntry::from_tuple(&json!(["node-a"])).is_none());
        assert!(LeaderboardEntry::from_tuple(&json!(["node-a", "high"])).is_none());
    }

    #[test]
    fn test_gossip_id_is_content_derived() {
        let a = gossip_id("n1", 3, 0, "What is 2+2?");
        assert_eq!(a, gossip_id("n1", 3, 0, "What is 2+2?"));
        assert_ne!(a, gossip_id("n1", 3, 1, "What is 2+2?"));
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn test_gossip_message_format() {
        let msg = GossipMessage::new("n1", 2, 1, "What is 2+2?", &json!("4"), 10.0);
        assert_eq!(msg.message, "What is 2+2?...Answer: 4");

        let numeric = GossipMessage::new("n1", 2, 1, "Q", &json!(4), 10.0);
        assert_eq!(numeric.message, "Q...Answer: 4");
    }

    #[test]
    fn test_sort_newest_first() {
        let mut feed = vec![
            GossipMessage::new("n", 0, 0, "a", &json!("x"), 1.0),
            GossipMessage::new("n", 0, 0, "b", &json!("x"), 3.0),
            GossipMessage::new("n", 0, 0, "c", &json!("x"), 2.0),
        ];
        sort_newest_first(&mut feed);
        let stamps: Vec<f64> = feed.iter().map(|m| m.timestamp).collect();
        assert_eq!(stamps, vec![3.0, 2.0, 1.0]);
    }

    #[test]
    fn test_gossip_since_filters_old_rounds() {
        let snapshot = SwarmSnapshot {
            round_stage: RoundStage::new(4, 0),
            gossip: vec![
                GossipMessage::new("n", 4, 0, "new", &json!("x"), 2.0),
                GossipMessage::new("n", 1, 0, "old", &json!("x"), 1.0),
            ],
            ..Default::default()
        };
        let recent = snapshot.gossip_since(3);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].round, 4);
        assert_eq!(snapshot.gossip_since(0).len(), 2);
    }
}
