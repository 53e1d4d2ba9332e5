// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Stage Output Merger
//!
//! Folds `agent_id -> raw output` for one `(round, stage)` into a single
//! [`MergedStageRecord`].
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Pure reducer invoked by the training pipeline before it publishes
//!   the canonical stage record.

use serde_json::{Map, Value};
use tracing::warn;

use crate::domain::{MalformedOutput, MergedStageRecord, StageKind};

#[derive(Debug, Clone)]
pub struct StageOutputMerger {
    stage: StageKind,
    log_tag: Option<String>,
}

impl StageOutputMerger {
    pub fn new(stage: StageKind) -> Self {
        Self {
            stage,
            log_tag: None,
        }
    }

    /// Attach a tag (typically the node name) to every warning this merger logs.
    pub fn with_log_tag(mut self, tag: impl Into<String>) -> Self {
        self.log_tag = Some(tag.into());
        self
    }

    pub fn stage(&self) -> StageKind {
        self.stage
    }

    /// Check one submission against the stage's required shape.
    pub fn validate<'v>(&self, output: &'v Value) -> Result<&'v Map<String, Value>, MalformedOutput> {
        let fields = output.as_object().ok_or(MalformedOutput::NotAMapping)?;

        if let Some(missing) = self
            .stage
            .required_keys()
            .iter()
            .find(|key| !fields.contains_key(**key))
        {
            return Err(MalformedOutput::MissingKey(*missing));
        }

        let contribution_field = self.stage.contribution_field();
        match fields.get(contribution_field) {
            Some(Value::Object(_)) => Ok(fields),
            _ => Err(MalformedOutput::ContributionNotMapping(contribution_field)),
        }
    }

    /// Merge every agent's output, in the iteration order of `outputs`.
    ///
    /// Later valid outputs overwrite `question`, `answer` and `stage2_prompt`, and their
    /// contribution maps are unioned into the accumulator (later keys win). Malformed
    /// outputs are skipped with a warning. Every agent id in `outputs` ends up in the
    /// contribution map, with the stage placeholder when nobody reported for it.
    pub fn merge<'a, K, I>(&self, outputs: I) -> MergedStageRecord
    where
        K: AsRef<str> + ?Sized + 'a,
        I: IntoIterator<Item = (&'a K, &'a Value)>,
    {
        let mut merged = MergedStageRecord::empty(self.stage);
        let mut agents = Vec::new();
        let tag = self.log_tag.as_deref().unwrap_or("-");

        for (agent, output) in outputs {
            let agent = agent.as_ref();
            agents.push(agent.to_string());

            let fields = match self.validate(output) {
                Ok(fields) => fields,
                Err(reason) => {
                    warn!(
                        tag,
                        stage = self.stage.number(),
                        agent,
                        %reason,
                        output = %output,
                        "Skipped malformed stage output"
                    );
                    continue;
                }
            };

            merged.question = fields.get("question").cloned();
            merged.answer = fields.get("answer").cloned();
            if self.stage.carries_prompt() {
                merged.stage2_prompt = fields.get("stage2_prompt").cloned();
            }
            if let Some(Value::Object(contributions)) = fields.get(self.stage.contribution_field()) {
                for (contributor, contribution) in contributions {
                    merged
                        .contributions
                        .insert(contributor.clone(), contribution.clone());
                }
            }
        }

        for agent in agents {
            merged
                .contributions
                .entry(agent)
                .or_insert_with(|| Value::String(self.stage.placeholder().to_string()));
        }

        merged
    }
}
