// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Presentation Layer (`rlswarm-core`)
//!
//! Read-only HTTP surface over the swarm coordinator. **No business logic lives
//! here**; handlers only read published state from `crate::application`.
//!
//! | Module | Transport | Description |
//! |--------|-----------|-------------|
//! | [`api`] | HTTP (Axum) | Health, leaderboard, gossip and peer roster endpoints |

pub mod api;
