// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Stage Output Types
//!
//! - [`StageKind`]: which stage a submission belongs to, and therefore which keys
//!   it must carry.
//! - [`MergedStageRecord`]: the canonical reduction across all agents.
//! - [`MalformedOutput`]: why a submission was excluded from the fold.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

/// Placeholder stored for an agent that submitted no stage-1 answer.
pub const STAGE1_PLACEHOLDER: &str = "No answer received...";

/// Placeholder stored for an agent that submitted no stage-2 opinion.
pub const STAGE2_PLACEHOLDER: &str = "No feedback received...";

/// The mergeable stages of a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    /// Agents answer the question and report the answers of their peers.
    Stage1,
    /// Agents critique the stage-1 answers.
    Stage2,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("stage {0} has no mergeable output shape (expected 1 or 2)")]
pub struct UnsupportedStage(pub u32);

impl TryFrom<u32> for StageKind {
    type Error = UnsupportedStage;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(StageKind::Stage1),
            2 => Ok(StageKind::Stage2),
            other => Err(UnsupportedStage(other)),
        }
    }
}

impl StageKind {
    pub fn number(self) -> u32 {
        match self {
            StageKind::Stage1 => 1,
            StageKind::Stage2 => 2,
        }
    }

    /// Top-level keys every submission for this stage must carry.
    pub fn required_keys(self) -> &'static [&'static str] {
        match self {
            StageKind::Stage1 => &["question", "answer", "agent_answers"],
            StageKind::Stage2 => &["question", "answer", "stage2_prompt", "agent_opinion"],
        }
    }

    /// Name of the per-agent contribution map (`agent_id -> contribution`).
    pub fn contribution_field(self) -> &'static str {
        match self {
            StageKind::Stage1 => "agent_answers",
            StageKind::Stage2 => "agent_opinion",
        }
    }

    pub fn placeholder(self) -> &'static str {
        match self {
            StageKind::Stage1 => STAGE1_PLACEHOLDER,
            StageKind::Stage2 => STAGE2_PLACEHOLDER,
        }
    }

    pub fn carries_prompt(self) -> bool {
        matches!(self, StageKind::Stage2)
    }
}

/// Reason a single agent submission was skipped.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MalformedOutput {
    #[error("output is not a mapping")]
    NotAMapping,

    #[error("missing required key `{0}`")]
    MissingKey(&'static str),

    #[error("`{0}` is not a mapping")]
    ContributionNotMapping(&'static str),
}

/// Canonical reduction of every agent's output for one `(round, stage)`.
///
/// # Invariants
///
/// - Every agent id present in the merger input is a key of
///   [`contributions`](Self::contributions), whether or not its own submission was
///   valid. Ids that only appear inside another agent's contribution map are kept too.
/// - `stage2_prompt` is only ever populated for [`StageKind::Stage2`].
#[derive(Debug, Clone, PartialEq)]
pub struct MergedStageRecord {
    pub stage: StageKind,
    pub question: Option<Value>,
    pub answer: Option<Value>,
    pub stage2_prompt: Option<Value>,
    /// Keyed by agent id, in first-seen order.
    pub contributions: Map<String, Value>,
}

impl MergedStageRecord {
    pub fn empty(stage: StageKind) -> Self {
        Self {
            stage,
            question: None,
            answer: None,
            stage2_prompt: None,
            contributions: Map::new(),
        }
    }

    /// JSON shape written back to the store, e.g.
    /// `{"question": .., "answer": .., "agent_answers": {..}}` for stage 1.
    pub fn to_value(&self) -> Value {
        // Serializing a map of JSON values into a Value cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl Serialize for MergedStageRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.stage.carries_prompt() { 4 } else { 3 };
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry("question", &self.question)?;
        map.serialize_entry("answer", &self.answer)?;
        if self.stage.carries_prompt() {
            map.serialize_entry("stage2_prompt", &self.stage2_prompt)?;
        }
        map.serialize_entry(self.stage.contribution_field(), &self.contributions)?;
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stage_kind_from_number() {
        assert_eq!(StageKind::try_from(1).unwrap(), StageKind::Stage1);
        assert_eq!(StageKind::try_from(2).unwrap(), StageKind::Stage2);
        assert_eq!(StageKind::try_from(0), Err(UnsupportedStage(0)));
    }

    #[test]
    fn test_stage2_record_shape() {
        let mut record = MergedStageRecord::empty(StageKind::Stage2);
        record.question = Some(json!("Q"));
        record.stage2_prompt = Some(json!("P"));
        record.contributions.insert("a1".into(), json!("fine"));

        assert_eq!(
            record.to_value(),
            json!({
                "question": "Q",
                "answer": null,
                "stage2_prompt": "P",
                "agent_opinion": {"a1": "fine"},
            })
        );
    }

    #[test]
    fn test_stage1_record_has_no_prompt() {
        let record = MergedStageRecord::empty(StageKind::Stage1);
        let value = record.to_value();
        assert!(value.get("stage2_prompt").is_none());
        assert_eq!(value["agent_answers"], json!({}));
    }
}
