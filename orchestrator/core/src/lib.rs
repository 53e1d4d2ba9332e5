// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `rlswarm-core`
//!
//! Observer-side core of an rlswarm node: finds other swarm members, keeps a
//! near-real-time snapshot of swarm progress and serves it read-only over HTTP.
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | swarm state, peers, store contract, local discovery contract, config |
//! | [`application`] | Application | `PeerDiscovery`, `SwarmStateCache`, `SwarmCoordinator` |
//! | [`infrastructure`] | Infrastructure | in-memory store, mDNS backend, peer cache file |
//! | [`presentation`] | Presentation | Axum router for the read-only API |
//!
//! The distributed store itself is external; everything here talks to it through
//! [`domain::store::SwarmStore`].

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;
