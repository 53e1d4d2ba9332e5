// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Infrastructure Adapters
//!
//! Concrete implementations of the contracts defined in the domain layer.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Talk to the distributed store, the local network and the filesystem
//! - **Pattern:** Adapter (Hexagonal Architecture)
//!
//! # Available Implementations
//!
//! - **InMemorySwarmStore** - HashMap-backed [`SwarmStore`](crate::domain::store::SwarmStore)
//!   with sub-keyed values and timestamps, for development runs and tests
//! - **MdnsDiscovery** - multicast DNS [`LocalDiscovery`](crate::domain::local_discovery::LocalDiscovery)
//!   backend (cargo feature `mdns`)
//! - **PeerCacheFile** - line-oriented peer list persisted between runs

pub mod in_memory_store;
#[cfg(feature = "mdns")]
pub mod mdns;
pub mod peer_cache;

pub use in_memory_store::{InMemorySwarmStore, StoreSeed};
pub use peer_cache::PeerCacheFile;

use std::sync::Arc;

use crate::domain::local_discovery::LocalDiscovery;

/// Resolve the local broadcast capability once at startup.
///
/// Returns `None` when the mDNS responder cannot be opened on this host.
#[cfg(feature = "mdns")]
pub fn detect_local_discovery() -> Option<Arc<dyn LocalDiscovery>> {
    match mdns::MdnsDiscovery::open() {
        Ok(backend) => Some(Arc::new(backend)),
        Err(e) => {
            tracing::warn!(error = %e, "mDNS unavailable, local discovery disabled");
            None
        }
    }
}

#[cfg(not(feature = "mdns"))]
pub fn detect_local_discovery() -> Option<Arc<dyn LocalDiscovery>> {
    tracing::info!("Built without mDNS support, local discovery disabled");
    None
}
