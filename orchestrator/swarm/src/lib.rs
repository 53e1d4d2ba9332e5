// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `rlswarm-swarm`: Stage Output Merging
//!
//! Reconciles the per-agent outputs that swarm members publish for a single
//! `(round, stage)` into one canonical record that the training pipeline writes
//! back to the distributed store.
//!
//! ## Crate Layout
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | `StageKind`, `MergedStageRecord`, `MalformedOutput` |
//! | [`application`] | Application | `StageOutputMerger` reducer |
//!
//! ## Key Concepts
//!
//! - **Stage 1**: every agent answers the question and reports the answers it saw
//!   from its peers (`agent_answers`).
//! - **Stage 2**: every agent critiques the stage-1 answers (`agent_opinion`) and
//!   forwards the `stage2_prompt` it was given.
//! - **Last writer wins**: `question`, `answer` and `stage2_prompt` come from the last
//!   valid output in input iteration order. There is no timestamp tie-break.
//!
//! The merger is a pure function: no I/O besides `tracing` warnings for skipped
//! submissions.

pub mod domain;
pub mod application;

pub use domain::*;
pub use application::StageOutputMerger;
