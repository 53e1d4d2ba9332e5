// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod coordinator;
pub mod peer_discovery;
pub mod swarm_cache;

// Re-export services for convenience
pub use coordinator::SwarmCoordinator;
pub use peer_discovery::PeerDiscovery;
pub use swarm_cache::{CacheError, CacheSettings, PollReport, SwarmStateCache};
