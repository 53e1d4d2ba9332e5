// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Stage Output Domain Layer
//!
//! Pure domain types for per-stage agent submissions. No I/O dependencies.
//!
//! | Module | Key Types |
//! |--------|-----------|
//! | [`stage_output`] | `StageKind`, `MergedStageRecord`, `MalformedOutput` |

pub mod stage_output;

pub use stage_output::*;
