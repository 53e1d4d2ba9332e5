// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Peer Discovery
//!
//! Maintains the set of known peer multiaddrs for bootstrapping store
//! connectivity and answering roster queries.
//!
//! ## Sources
//!
//! | Source | When | Notes |
//! |--------|------|-------|
//! | Peer cache file | construction | best effort, missing or unreadable file is empty |
//! | Local network (mDNS) | while started | optional capability; each hit is also handed to the store |
//! | Store visible addresses | `start`, every `get_peers` | |
//! | Store active peers / routing table | `start`, every `get_peers` | only when the store exposes them |
//!
//! The round/stage, leaderboard and rewards keys are read as a liveness probe
//! only. Node ids carry no addresses, so nothing is derived from them.
//!
//! ## Lifecycle
//!
//! `Stopped -> Started -> Stopped`. `start` while started and `stop` while
//! stopped are no-ops. Local broadcast resources live only in the started
//! state and are released by `stop` even when persisting the cache fails.

use rand::seq::IndexedRandom;
use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::local_discovery::{
    DiscoveryError, LocalDiscovery, ResolvedService, ServiceAdvertisement,
};
use crate::domain::node_config::DiscoveryConfig;
use crate::domain::peer::{looks_like_multiaddr, tcp_multiaddr};
use crate::domain::store::{
    leaderboard_key, read_round_stage, rewards_key, SwarmStore, DEFAULT_STORE_PORT,
};
use crate::infrastructure::peer_cache::PeerCacheFile;

type PeerSet = Arc<parking_lot::RwLock<BTreeSet<String>>>;

struct LocalSession {
    backend: Arc<dyn LocalDiscovery>,
    service_type: String,
    fullname: String,
    cancel: CancellationToken,
    browser: JoinHandle<()>,
}

enum DiscoveryState {
    Stopped,
    Started { local: Option<LocalSession> },
}

pub struct PeerDiscovery {
    store: Arc<dyn SwarmStore>,
    local: Option<Arc<dyn LocalDiscovery>>,
    config: DiscoveryConfig,
    cache: PeerCacheFile,
    discovered: PeerSet,
    state: Mutex<DiscoveryState>,
    active: AtomicBool,
}

impl PeerDiscovery {
    /// Create a stopped discovery service and load the peer cache.
    ///
    /// `local` is the broadcast backend resolved at startup; `None` runs
    /// store-only regardless of `config.enable_local`.
    pub fn new(
        store: Arc<dyn SwarmStore>,
        local: Option<Arc<dyn LocalDiscovery>>,
        config: DiscoveryConfig,
    ) -> Self {
        let cache = PeerCacheFile::from_config_path(&config.cache_file);
        let cached = cache.load_or_empty();
        if !cached.is_empty() {
            info!(count = cached.len(), path = ?cache.path(), "Loaded peers from cache");
        }

        Self {
            store,
            local,
            config,
            cache,
            discovered: Arc::new(parking_lot::RwLock::new(cached)),
            state: Mutex::new(DiscoveryState::Stopped),
            active: AtomicBool::new(false),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Whether a local broadcast session is currently running.
    pub async fn local_active(&self) -> bool {
        matches!(
            &*self.state.lock().await,
            DiscoveryState::Started { local: Some(_) }
        )
    }

    pub async fn start(&self) {
        let mut state = self.state.lock().await;
        if let DiscoveryState::Started { .. } = *state {
            debug!("Peer discovery already started");
            return;
        }

        let local = match (self.config.enable_local, &self.local) {
            (true, Some(backend)) => match self.start_local(backend.clone()).await {
                Ok(session) => {
                    info!(service = %session.fullname, "Local discovery started");
                    Some(session)
                }
                Err(e) => {
                    warn!(error = %e, "Failed to start local discovery");
                    if let Err(e) = backend.shutdown() {
                        debug!(error = %e, "Failed to shut down local discovery");
                    }
                    None
                }
            },
            (true, None) => {
                info!("Local discovery capability not available, running store-only");
                None
            }
            (false, _) => None,
        };

        *state = DiscoveryState::Started { local };
        self.active.store(true, Ordering::Release);
        drop(state);

        self.discover_store_peers().await;

        let count = self.discovered.read().len();
        metrics::gauge!("rlswarm_discovered_peers").set(count as f64);
        info!(peers = count, "Peer discovery started");
    }

    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        let previous = std::mem::replace(&mut *state, DiscoveryState::Stopped);
        let DiscoveryState::Started { local } = previous else {
            debug!("Peer discovery already stopped");
            return;
        };
        self.active.store(false, Ordering::Release);

        if let Some(session) = local {
            stop_local(session);
        }

        let peers = self.discovered.read().clone();
        match self.cache.save(&peers) {
            Ok(()) => info!(count = peers.len(), path = ?self.cache.path(), "Saved peers to cache"),
            Err(e) => warn!(error = %e, "Failed to save peers to cache"),
        }
        info!("Peer discovery stopped");
    }

    /// Refresh from the store, then return every known peer that looks like a
    /// multiaddr. No duplicates.
    pub async fn get_peers(&self) -> Vec<String> {
        self.discover_store_peers().await;
        self.discovered
            .read()
            .iter()
            .filter(|peer| looks_like_multiaddr(peer))
            .cloned()
            .collect()
    }

    /// At most `count` peers for bootstrapping: all of them when there are few
    /// enough, otherwise a uniform random subset.
    pub async fn get_bootstrap_peers(&self, count: usize) -> Vec<String> {
        let peers = self.get_peers().await;
        if peers.len() <= count {
            return peers;
        }
        peers
            .choose_multiple(&mut rand::rng(), count)
            .cloned()
            .collect()
    }

    /// [`get_bootstrap_peers`](Self::get_bootstrap_peers) with the configured count.
    pub async fn bootstrap_peers(&self) -> Vec<String> {
        self.get_bootstrap_peers(self.config.bootstrap_count).await
    }

    async fn discover_store_peers(&self) {
        let visible = match self.store.visible_maddrs().await {
            Ok(visible) => visible,
            Err(e) => {
                warn!(error = %e, "Failed to discover store peers");
                return;
            }
        };
        self.discovered.write().extend(visible);

        match self.store.active_peers().await {
            Ok(Some(active)) => {
                let mut discovered = self.discovered.write();
                for addr in active.into_iter().flat_map(|peer| peer.addresses) {
                    if !addr.is_empty() {
                        debug!(peer = %addr, "Found store active peer");
                        discovered.insert(addr);
                    }
                }
            }
            Ok(None) => {}
            Err(e) => debug!(error = %e, "Failed to get active peers from store"),
        }

        match self.store.routing_table().await {
            Ok(Some(buckets)) => {
                let mut discovered = self.discovered.write();
                for addr in buckets
                    .into_iter()
                    .flat_map(|bucket| bucket.peers)
                    .flat_map(|peer| peer.addresses)
                {
                    if !addr.is_empty() {
                        debug!(peer = %addr, "Found routing table peer");
                        discovered.insert(addr);
                    }
                }
            }
            Ok(None) => {}
            Err(e) => debug!(error = %e, "Failed to get peers from routing table"),
        }

        self.probe_swarm_activity().await;
    }

    async fn probe_swarm_activity(&self) {
        let round_stage = match read_round_stage(self.store.as_ref()).await {
            Ok(rs) => rs,
            Err(e) => {
                debug!(error = %e, "No active swarm found in store");
                return;
            }
        };
        info!(round = round_stage.round, stage = round_stage.stage, "Found active swarm");

        let leaderboard = leaderboard_key(round_stage.round, round_stage.stage);
        match self.store.get(&leaderboard, true).await {
            Ok(Some(serde_json::Value::Array(rows))) => {
                info!(count = rows.len(), "Found peers in leaderboard")
            }
            Ok(_) => {}
            Err(e) => debug!(error = %e, key = %leaderboard, "Failed to read leaderboard"),
        }

        let rewards = rewards_key(round_stage.round, round_stage.stage);
        match self.store.get(&rewards, true).await {
            Ok(Some(serde_json::Value::Object(nodes))) => {
                info!(count = nodes.len(), "Found peers in rewards")
            }
            Ok(_) => {}
            Err(e) => debug!(error = %e, key = %rewards, "Failed to read rewards"),
        }
    }

    async fn start_local(&self, backend: Arc<dyn LocalDiscovery>) -> Result<LocalSession, DiscoveryError> {
        let advertisement = self.advertisement().await;
        backend.register(&advertisement)?;

        let fullname = advertisement.fullname();
        let rx = match backend.browse(&advertisement.service_type) {
            Ok(rx) => rx,
            Err(e) => {
                if let Err(unregister) = backend.unregister(&fullname) {
                    debug!(error = %unregister, "Failed to unregister after browse failure");
                }
                return Err(e);
            }
        };

        let cancel = CancellationToken::new();
        let browser = tokio::spawn(browse_loop(
            rx,
            cancel.clone(),
            fullname.clone(),
            self.discovered.clone(),
            self.store.clone(),
            self.config.browse_timeout(),
        ));

        Ok(LocalSession {
            backend,
            service_type: advertisement.service_type,
            fullname,
            cancel,
            browser,
        })
    }

    async fn advertisement(&self) -> ServiceAdvertisement {
        let host = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| "localhost".to_string());
        let ip = resolve_ipv4(&host, self.config.browse_timeout()).await;

        ServiceAdvertisement {
            service_type: ServiceAdvertisement::service_type_for(&self.config.service_name),
            host_name: format!("{host}.local."),
            instance_name: host,
            ip,
            port: self.store.listen_port().unwrap_or(DEFAULT_STORE_PORT),
        }
    }
}

/// First IPv4 address `host` resolves to, or loopback.
async fn resolve_ipv4(host: &str, limit: Duration) -> IpAddr {
    let lookup = tokio::net::lookup_host((host, 0));
    match tokio::time::timeout(limit, lookup).await {
        Ok(Ok(mut addrs)) => addrs
            .find(|addr| addr.is_ipv4())
            .map(|addr| addr.ip())
            .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST)),
        _ => IpAddr::V4(Ipv4Addr::LOCALHOST),
    }
}

async fn browse_loop(
    mut rx: mpsc::Receiver<ResolvedService>,
    cancel: CancellationToken,
    own_fullname: String,
    discovered: PeerSet,
    store: Arc<dyn SwarmStore>,
    wait_limit: Duration,
) {
    loop {
        let resolved = tokio::select! {
            _ = cancel.cancelled() => break,
            next = tokio::time::timeout(wait_limit, rx.recv()) => match next {
                Ok(Some(resolved)) => resolved,
                Ok(None) => break,
                // Nothing new within the wait limit; keep listening.
                Err(_) => continue,
            },
        };

        if resolved.fullname == own_fullname {
            continue;
        }

        for ip in resolved.addresses.iter().filter(|ip| ip.is_ipv4()) {
            let multiaddr = tcp_multiaddr(*ip, resolved.port);
            if !discovered.write().insert(multiaddr.clone()) {
                continue;
            }
            match store.add_initial_peers(std::slice::from_ref(&multiaddr)).await {
                Ok(()) => info!(peer = %multiaddr, "Discovered local peer"),
                Err(e) => debug!(peer = %multiaddr, error = %e, "Failed to connect to local peer"),
            }
        }
        metrics::gauge!("rlswarm_discovered_peers").set(discovered.read().len() as f64);
    }
    debug!("Local browse loop finished");
}

fn stop_local(session: LocalSession) {
    session.cancel.cancel();
    session.browser.abort();

    if let Err(e) = session.backend.unregister(&session.fullname) {
        debug!(error = %e, "Failed to unregister local service");
    }
    if let Err(e) = session.backend.stop_browse(&session.service_type) {
        debug!(error = %e, "Failed to stop local browse");
    }
    if let Err(e) = session.backend.shutdown() {
        debug!(error = %e, "Failed to shut down local discovery");
    }
    info!("Local discovery stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::store::RemotePeer;
    use crate::infrastructure::InMemorySwarmStore;

    fn config_in(dir: &tempfile::TempDir) -> DiscoveryConfig {
        DiscoveryConfig {
            enable_local: false,
            cache_file: dir.path().join("peers.json").display().to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_get_peers_filters_and_dedupes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("peers.json"),
            "/ip4/10.0.0.9/tcp/1\nnot-a-maddr\n",
        )
        .unwrap();

        let store = InMemorySwarmStore::new();
        store.set_visible_maddrs(vec!["/ip4/10.0.0.1/tcp/1".to_string()]);
        store.set_active_peers(Some(vec![RemotePeer {
            peer_id: "QmA".to_string(),
            addresses: vec!["/ip4/10.0.0.9/tcp/1".to_string(), String::new()],
        }]));

        let discovery = PeerDiscovery::new(Arc::new(store), None, config_in(&dir));
        let peers = discovery.get_peers().await;

        assert_eq!(peers, vec!["/ip4/10.0.0.1/tcp/1", "/ip4/10.0.0.9/tcp/1"]);
    }

    #[tokio::test]
    async fn test_bootstrap_peers_is_bounded_subset() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemorySwarmStore::new();
        store.set_visible_maddrs((1..=8).map(|i| format!("/ip4/10.0.0.{i}/tcp/1")).collect());
        let discovery = PeerDiscovery::new(Arc::new(store), None, config_in(&dir));

        let all = discovery.get_peers().await;
        let picked = discovery.get_bootstrap_peers(3).await;

        assert_eq!(picked.len(), 3);
        let unique: BTreeSet<&String> = picked.iter().collect();
        assert_eq!(unique.len(), 3);
        assert!(picked.iter().all(|p| all.contains(p)));

        assert_eq!(discovery.get_bootstrap_peers(20).await.len(), 8);
    }

    #[tokio::test]
    async fn test_start_stop_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemorySwarmStore::new();
        store.set_visible_maddrs(vec!["/ip4/10.0.0.1/tcp/1".to_string()]);
        let discovery = PeerDiscovery::new(Arc::new(store), None, config_in(&dir));

        discovery.stop().await;
        assert!(!dir.path().join("peers.json").exists());

        discovery.start().await;
        discovery.start().await;
        assert!(discovery.is_active());
        assert!(!discovery.local_active().await);

        discovery.stop().await;
        discovery.stop().await;
        assert!(!discovery.is_active());
        let saved = std::fs::read_to_string(dir.path().join("peers.json")).unwrap();
        assert_eq!(saved, "/ip4/10.0.0.1/tcp/1\n");
    }

    #[tokio::test]
    async fn test_store_failure_does_not_fail_discovery() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemorySwarmStore::new();
        store.set_unavailable(true);
        let discovery = PeerDiscovery::new(Arc::new(store), None, config_in(&dir));

        discovery.start().await;
        assert!(discovery.get_peers().await.is_empty());
        discovery.stop().await;
    }
}
