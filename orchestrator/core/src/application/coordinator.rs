// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Swarm Coordinator
//!
//! Owns the store handle, the swarm state cache and peer discovery for one
//! observer node, and drives their lifecycle. The HTTP layer, the poller and
//! discovery only ever hold `Arc`s handed out from here.
//!
//! # Architecture
//!
//! - **Layer:** Application
//! - **Purpose:** Wire services together and start/stop them as a unit
//! - **Pattern:** Composition root

use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::application::peer_discovery::PeerDiscovery;
use crate::application::swarm_cache::{CacheSettings, SwarmStateCache};
use crate::domain::local_discovery::LocalDiscovery;
use crate::domain::node_config::SwarmNodeSpec;
use crate::domain::peer::PeerRoster;
use crate::domain::store::SwarmStore;

pub struct SwarmCoordinator {
    store: Arc<dyn SwarmStore>,
    cache: Arc<SwarmStateCache>,
    discovery: Arc<PeerDiscovery>,
    poller: Mutex<Option<Poller>>,
}

/// A running poll loop and the token that stops it.
struct Poller {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

impl SwarmCoordinator {
    pub fn new(
        store: Arc<dyn SwarmStore>,
        cache: Arc<SwarmStateCache>,
        discovery: Arc<PeerDiscovery>,
    ) -> Self {
        Self {
            store,
            cache,
            discovery,
            poller: Mutex::new(None),
        }
    }

    /// Build the cache and discovery services for `spec` around an existing store client.
    pub fn from_config(
        spec: &SwarmNodeSpec,
        store: Arc<dyn SwarmStore>,
        local: Option<Arc<dyn LocalDiscovery>>,
    ) -> Self {
        let cache = Arc::new(SwarmStateCache::new(
            store.clone(),
            CacheSettings::from(&spec.cache),
        ));
        let discovery = Arc::new(PeerDiscovery::new(
            store.clone(),
            local,
            spec.discovery.clone(),
        ));
        Self::new(store, cache, discovery)
    }

    pub fn store(&self) -> &Arc<dyn SwarmStore> {
        &self.store
    }

    pub fn cache(&self) -> &Arc<SwarmStateCache> {
        &self.cache
    }

    pub fn discovery(&self) -> &Arc<PeerDiscovery> {
        &self.discovery
    }

    /// Start peer discovery and the background poller. Calling it again while running is
    /// a no-op; after [`shutdown`](Self::shutdown) it starts a fresh poller.
    pub async fn start(&self) {
        let mut poller = self.poller.lock().await;
        if poller.is_some() {
            return;
        }

        self.discovery.start().await;
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(self.cache.clone().run(cancel.clone()));
        *poller = Some(Poller { handle, cancel });
        info!("Swarm coordinator started");
    }

    /// Stop the poller, then discovery (which persists the peer cache).
    pub async fn shutdown(&self) {
        if let Some(Poller { handle, cancel }) = self.poller.lock().await.take() {
            cancel.cancel();
            if let Err(e) = handle.await {
                warn!(error = %e, "Swarm state poller ended abnormally");
            }
        }
        self.discovery.stop().await;
        info!("Swarm coordinator stopped");
    }

    /// Peer roster for observers.
    ///
    /// Discovery peers are only included while discovery is running. A store
    /// failure yields a roster without store-visible addresses.
    pub async fn peer_roster(&self) -> PeerRoster {
        let discovery_active = self.discovery.is_active();
        let discovered = if discovery_active {
            self.discovery.get_peers().await
        } else {
            Vec::new()
        };

        let visible = match self.store.visible_maddrs().await {
            Ok(visible) => visible,
            Err(e) => {
                warn!(error = %e, "Failed to read visible addresses for peer roster");
                Vec::new()
            }
        };

        PeerRoster::assemble(&discovered, &visible, discovery_active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::node_config::DiscoveryConfig;
    use crate::domain::peer::PeerSource;
    use crate::infrastructure::InMemorySwarmStore;

    fn spec_in(dir: &tempfile::TempDir) -> SwarmNodeSpec {
        SwarmNodeSpec {
            discovery: DiscoveryConfig {
                enable_local: false,
                cache_file: dir.path().join("peers.json").display().to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_roster_before_and_after_start() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemorySwarmStore::new();
        store.set_visible_maddrs(vec![
            "/ip4/10.0.0.1/tcp/1".to_string(),
            "/ip4/10.0.0.2/tcp/1".to_string(),
        ]);
        let coordinator = SwarmCoordinator::from_config(&spec_in(&dir), Arc::new(store), None);

        let idle = coordinator.peer_roster().await;
        assert!(!idle.discovery_active);
        assert_eq!(idle.total_count, 2);
        assert_eq!(idle.peers.last().unwrap().source, PeerSource::Local);

        coordinator.start().await;
        let running = coordinator.peer_roster().await;
        assert!(running.discovery_active);
        assert_eq!(running.total_count, 2);
        assert_eq!(running.peers[0].source, PeerSource::Discovery);
        assert!(running.peers[0].connected);

        coordinator.shutdown().await;
        assert!(dir.path().join("peers.json").exists());
    }

    #[tokio::test]
    async fn test_restart_after_shutdown_polls_again() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemorySwarmStore::new();
        store.put("rl_swarm_rs", serde_json::json!([1, 0]));
        let coordinator = SwarmCoordinator::from_config(&spec_in(&dir), Arc::new(store.clone()), None);

        coordinator.start().await;
        coordinator.shutdown().await;
        let first = coordinator.cache().last_polled();

        store.put("rl_swarm_rs", serde_json::json!([2, 0]));
        coordinator.start().await;
        // The first tick of the new poller fires immediately.
        for _ in 0..50 {
            if coordinator.cache().round_stage().round == 2 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        coordinator.shutdown().await;

        assert_eq!(coordinator.cache().round_stage().round, 2);
        assert_ne!(coordinator.cache().last_polled(), first);
    }
}
