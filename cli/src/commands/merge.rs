// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `rlswarm merge`: run the stage merger over a JSON file of agent outputs.
//!
//! The input is a JSON object `{agent_id: output}`. Agents are merged in file
//! order, so the last valid output in the file decides `question` and `answer`.

use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value;
use std::path::PathBuf;

use rlswarm_swarm::{StageKind, StageOutputMerger};

#[derive(Args)]
pub struct MergeArgs {
    /// Stage the outputs belong to (1 or 2)
    #[arg(long)]
    pub stage: u32,

    /// Tag added to merger warnings
    #[arg(long)]
    pub log_tag: Option<String>,

    /// Emit compact JSON instead of pretty-printed
    #[arg(long)]
    pub compact: bool,

    /// JSON file with per-agent outputs
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

pub fn handle_command(args: MergeArgs) -> Result<()> {
    let rendered = merge_file(&args)?;
    println!("{}", rendered);
    Ok(())
}

/// Merge the file named by `args` and render the canonical record.
pub fn merge_file(args: &MergeArgs) -> Result<String> {
    let stage = StageKind::try_from(args.stage)?;
    let content = std::fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read {:?}", args.file))?;
    let outputs: serde_json::Map<String, Value> = serde_json::from_str(&content)
        .with_context(|| format!("{:?} must hold a JSON object of agent outputs", args.file))?;

    let mut merger = StageOutputMerger::new(stage);
    if let Some(tag) = &args.log_tag {
        merger = merger.with_log_tag(tag.clone());
    }
    let record = merger.merge(&outputs);

    let rendered = if args.compact {
        serde_json::to_string(&record)?
    } else {
        serde_json::to_string_pretty(&record)?
    };
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args_for(file: PathBuf, stage: u32) -> MergeArgs {
        MergeArgs {
            stage,
            log_tag: None,
            compact: true,
            file,
        }
    }

    #[test]
    fn test_merge_file_fills_placeholders() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outputs.json");
        std::fs::write(
            &path,
            r#"{"a1": {"question": "Q", "answer": "A", "agent_answers": {"a1": "x"}}, "a2": "oops"}"#,
        )
        .unwrap();

        let rendered = merge_file(&args_for(path, 1)).unwrap();
        let merged: Value = serde_json::from_str(&rendered).unwrap();

        assert_eq!(
            merged,
            json!({
                "question": "Q",
                "answer": "A",
                "agent_answers": {"a1": "x", "a2": "No answer received..."}
            })
        );
    }

    #[test]
    fn test_unsupported_stage_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outputs.json");
        std::fs::write(&path, "{}").unwrap();

        assert!(merge_file(&args_for(path, 3)).is_err());
    }

    #[test]
    fn test_non_object_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outputs.json");
        std::fs::write(&path, "[1, 2]").unwrap();

        assert!(merge_file(&args_for(path, 2)).is_err());
    }
}
