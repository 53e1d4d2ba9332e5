// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain Layer
//!
//! Pure types and the contracts of the external collaborators (distributed
//! store, local-network broadcast).
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Swarm state model, peer model, store key namespace, node configuration

pub mod swarm_state;
pub mod health;
pub mod peer;
pub mod store;
pub mod local_discovery;
pub mod node_config;
