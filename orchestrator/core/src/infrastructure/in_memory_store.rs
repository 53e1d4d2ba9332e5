// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-Memory Swarm Store
//!
//! Process-local stand-in for the distributed store. Keeps the same observable
//! semantics the rest of the crate relies on:
//!
//! - plain keys hold one value, sub-keyed keys hold one value per sub-key
//! - writes are last-writer-wins by write timestamp
//! - a sub-keyed read returns a JSON object of `sub_key -> value`
//!
//! Used for development runs (`rlswarm serve --seed`) and as the test double in
//! every store-facing test. Reads are recorded so tests can assert exactly which
//! keys a component touched.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

use crate::domain::node_config::StoreConfig;
use crate::domain::peer::{looks_like_multiaddr, tcp_multiaddr};
use crate::domain::store::{RemotePeer, RoutingBucket, StoreError, SwarmStore, DEFAULT_STORE_PORT};

#[derive(Debug, Clone)]
struct Record {
    value: Value,
    written_at: f64,
}

#[derive(Debug, Clone)]
enum Entry {
    Single(Record),
    SubKeyed(BTreeMap<String, Record>),
}

/// Initial contents for an [`InMemorySwarmStore`], read from JSON.
///
/// ```json
/// {
///   "visible_maddrs": ["/ip4/127.0.0.1/tcp/30303"],
///   "values": { "rl_swarm_rs": [3, 0] },
///   "subkeyed": { "QmA_3_0_rl_swarm_outputs": { "What is 2+2?": [1700000000.0, {"answer": "4"}] } }
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreSeed {
    #[serde(default)]
    pub visible_maddrs: Vec<String>,
    #[serde(default)]
    pub values: Map<String, Value>,
    #[serde(default)]
    pub subkeyed: Map<String, Value>,
    #[serde(default)]
    pub active_peers: Option<Vec<RemotePeer>>,
    #[serde(default)]
    pub routing_table: Option<Vec<RoutingBucket>>,
}

impl StoreSeed {
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let seed = serde_json::from_str(&content)?;
        Ok(seed)
    }
}

#[derive(Clone)]
pub struct InMemorySwarmStore {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
    visible: Arc<RwLock<Vec<String>>>,
    initial_peers: Arc<RwLock<Vec<String>>>,
    active_peers: Arc<RwLock<Option<Vec<RemotePeer>>>>,
    routing_table: Arc<RwLock<Option<Vec<RoutingBucket>>>>,
    listen_port: Option<u16>,
    reads: Arc<Mutex<Vec<String>>>,
    failing_keys: Arc<RwLock<HashSet<String>>>,
    unavailable: Arc<RwLock<bool>>,
}

impl InMemorySwarmStore {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            visible: Arc::new(RwLock::new(Vec::new())),
            initial_peers: Arc::new(RwLock::new(Vec::new())),
            active_peers: Arc::new(RwLock::new(None)),
            routing_table: Arc::new(RwLock::new(None)),
            listen_port: None,
            reads: Arc::new(Mutex::new(Vec::new())),
            failing_keys: Arc::new(RwLock::new(HashSet::new())),
            unavailable: Arc::new(RwLock::new(false)),
        }
    }

    /// Build a client from node configuration.
    ///
    /// Initial peers that are not multiaddrs are dropped with a warning. With
    /// `ensure_bootstrap_success`, having peers configured but none usable is an error.
    pub fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let (usable, rejected): (Vec<String>, Vec<String>) = config
            .initial_peers
            .iter()
            .cloned()
            .partition(|addr| looks_like_multiaddr(addr));

        for addr in &rejected {
            warn!(peer = %addr, "Ignoring initial peer that is not a multiaddr");
        }

        if config.ensure_bootstrap_success && usable.is_empty() && !rejected.is_empty() {
            return Err(StoreError::PeerRejected {
                addrs: rejected,
                reason: "no usable bootstrap peer".to_string(),
            });
        }

        let port = config.listen_port.unwrap_or(DEFAULT_STORE_PORT);
        let visible = if config.host_maddrs.is_empty() {
            vec![tcp_multiaddr([127, 0, 0, 1].into(), port)]
        } else {
            config.host_maddrs.clone()
        };

        debug!(
            initial_peers = usable.len(),
            visible = ?visible,
            "In-memory store client ready"
        );

        let mut store = Self::new();
        store.listen_port = config.listen_port;
        *store.visible.write() = visible;
        *store.initial_peers.write() = usable;
        Ok(store)
    }

    pub fn with_listen_port(mut self, port: u16) -> Self {
        self.listen_port = Some(port);
        self
    }

    /// Load seed contents. Sub-keyed seed values must be JSON objects.
    pub fn apply_seed(&self, seed: StoreSeed) -> Result<(), StoreError> {
        let now = now_secs();
        if !seed.visible_maddrs.is_empty() {
            self.set_visible_maddrs(seed.visible_maddrs);
        }
        for (key, value) in seed.values {
            self.put_at(&key, value, now);
        }
        for (key, value) in seed.subkeyed {
            let Value::Object(subkeys) = value else {
                return Err(StoreError::Malformed {
                    key,
                    reason: "sub-keyed seed value must be an object".to_string(),
                });
            };
            for (subkey, value) in subkeys {
                self.put_subkey_at(&key, &subkey, value, now);
            }
        }
        if seed.active_peers.is_some() {
            *self.active_peers.write() = seed.active_peers;
        }
        if seed.routing_table.is_some() {
            *self.routing_table.write() = seed.routing_table;
        }
        Ok(())
    }

    pub fn put(&self, key: &str, value: Value) {
        self.put_at(key, value, now_secs());
    }

    /// Write `value` unless a newer write already exists.
    pub fn put_at(&self, key: &str, value: Value, written_at: f64) {
        let mut entries = self.entries.write();
        if let Some(Entry::Single(existing)) = entries.get(key) {
            if existing.written_at > written_at {
                return;
            }
        }
        entries.insert(key.to_string(), Entry::Single(Record { value, written_at }));
    }

    pub fn put_subkey(&self, key: &str, subkey: &str, value: Value) {
        self.put_subkey_at(key, subkey, value, now_secs());
    }

    /// Write one sub-key. A plain value previously stored under `key` is replaced.
    pub fn put_subkey_at(&self, key: &str, subkey: &str, value: Value, written_at: f64) {
        let mut entries = self.entries.write();
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::SubKeyed(BTreeMap::new()));
        if let Entry::Single(_) = entry {
            *entry = Entry::SubKeyed(BTreeMap::new());
        }
        if let Entry::SubKeyed(subkeys) = entry {
            let superseded = subkeys
                .get(subkey)
                .is_some_and(|existing| existing.written_at > written_at);
            if !superseded {
                subkeys.insert(subkey.to_string(), Record { value, written_at });
            }
        }
    }

    pub fn remove(&self, key: &str) {
        self.entries.write().remove(key);
    }

    pub fn set_visible_maddrs(&self, maddrs: Vec<String>) {
        *self.visible.write() = maddrs;
    }

    pub fn set_active_peers(&self, peers: Option<Vec<RemotePeer>>) {
        *self.active_peers.write() = peers;
    }

    pub fn set_routing_table(&self, buckets: Option<Vec<RoutingBucket>>) {
        *self.routing_table.write() = buckets;
    }

    /// Peers handed to the store so far, in arrival order.
    pub fn initial_peers(&self) -> Vec<String> {
        self.initial_peers.read().clone()
    }

    /// Make every read of `key` fail with [`StoreError::Unavailable`].
    pub fn fail_key(&self, key: &str) {
        self.failing_keys.write().insert(key.to_string());
    }

    pub fn restore_key(&self, key: &str) {
        self.failing_keys.write().remove(key);
    }

    /// Make every store call fail until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.write() = unavailable;
    }

    /// Keys read since the last call, in request order.
    pub fn take_reads(&self) -> Vec<String> {
        std::mem::take(&mut *self.reads.lock())
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if *self.unavailable.read() {
            return Err(StoreError::Unavailable("store is offline".to_string()));
        }
        Ok(())
    }
}

impl Default for InMemorySwarmStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SwarmStore for InMemorySwarmStore {
    async fn get(&self, key: &str, _latest: bool) -> Result<Option<Value>, StoreError> {
        self.reads.lock().push(key.to_string());
        self.check_available()?;
        if self.failing_keys.read().contains(key) {
            return Err(StoreError::Unavailable(format!("read of {key} failed")));
        }

        let entries = self.entries.read();
        let value = entries.get(key).map(|entry| match entry {
            Entry::Single(record) => record.value.clone(),
            Entry::SubKeyed(subkeys) => Value::Object(
                subkeys
                    .iter()
                    .map(|(subkey, record)| (subkey.clone(), record.value.clone()))
                    .collect(),
            ),
        });
        Ok(value)
    }

    async fn visible_maddrs(&self) -> Result<Vec<String>, StoreError> {
        self.check_available()?;
        Ok(self.visible.read().clone())
    }

    async fn add_initial_peers(&self, maddrs: &[String]) -> Result<(), StoreError> {
        self.check_available()?;
        let rejected: Vec<String> = maddrs
            .iter()
            .filter(|addr| !looks_like_multiaddr(addr))
            .cloned()
            .collect();
        if !rejected.is_empty() {
            return Err(StoreError::PeerRejected {
                addrs: rejected,
                reason: "not a multiaddr".to_string(),
            });
        }

        let mut peers = self.initial_peers.write();
        for addr in maddrs {
            if !peers.contains(addr) {
                peers.push(addr.clone());
            }
        }
        Ok(())
    }

    fn listen_port(&self) -> Option<u16> {
        self.listen_port
    }

    async fn active_peers(&self) -> Result<Option<Vec<RemotePeer>>, StoreError> {
        self.check_available()?;
        Ok(self.active_peers.read().clone())
    }

    async fn routing_table(&self) -> Result<Option<Vec<RoutingBucket>>, StoreError> {
        self.check_available()?;
        Ok(self.routing_table.read().clone())
    }
}

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_plain_and_subkeyed_reads() {
        let store = InMemorySwarmStore::new();
        store.put("rl_swarm_rs", json!([3, 1]));
        store.put_subkey("n1_3_1_rl_swarm_outputs", "Q1", json!([1.0, {"answer": "a"}]));
        store.put_subkey("n1_3_1_rl_swarm_outputs", "Q2", json!([2.0, {"answer": "b"}]));

        assert_eq!(store.get("rl_swarm_rs", true).await.unwrap(), Some(json!([3, 1])));
        let outputs = store.get("n1_3_1_rl_swarm_outputs", false).await.unwrap().unwrap();
        assert_eq!(outputs["Q2"], json!([2.0, {"answer": "b"}]));
        assert_eq!(outputs.as_object().unwrap().len(), 2);
        assert_eq!(store.get("missing", false).await.unwrap(), None);

        assert_eq!(
            store.take_reads(),
            vec!["rl_swarm_rs", "n1_3_1_rl_swarm_outputs", "missing"]
        );
        assert!(store.take_reads().is_empty());
    }

    #[tokio::test]
    async fn test_last_writer_wins_by_timestamp() {
        let store = InMemorySwarmStore::new();
        store.put_at("k", json!("new"), 20.0);
        store.put_at("k", json!("old"), 10.0);
        assert_eq!(store.get("k", true).await.unwrap(), Some(json!("new")));

        store.put_subkey_at("s", "q", json!(2), 5.0);
        store.put_subkey_at("s", "q", json!(1), 4.0);
        assert_eq!(store.get("s", true).await.unwrap(), Some(json!({"q": 2})));
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let store = InMemorySwarmStore::new();
        store.put("k", json!(1));
        store.fail_key("k");
        assert!(matches!(store.get("k", true).await, Err(StoreError::Unavailable(_))));
        store.restore_key("k");
        assert!(store.get("k", true).await.is_ok());

        store.set_unavailable(true);
        assert!(store.visible_maddrs().await.is_err());
    }

    #[tokio::test]
    async fn test_connect_filters_initial_peers() {
        let config = StoreConfig {
            initial_peers: vec!["/ip4/10.0.0.1/tcp/30303".to_string(), "bogus".to_string()],
            listen_port: Some(4001),
            ..Default::default()
        };
        let store = InMemorySwarmStore::connect(&config).unwrap();
        assert_eq!(store.initial_peers(), vec!["/ip4/10.0.0.1/tcp/30303"]);
        assert_eq!(store.listen_port(), Some(4001));
        assert_eq!(
            store.visible_maddrs().await.unwrap(),
            vec!["/ip4/127.0.0.1/tcp/4001"]
        );
    }

    #[test]
    fn test_connect_with_ensure_bootstrap_success() {
        let config = StoreConfig {
            initial_peers: vec!["bogus".to_string()],
            ensure_bootstrap_success: true,
            ..Default::default()
        };
        assert!(matches!(
            InMemorySwarmStore::connect(&config),
            Err(StoreError::PeerRejected { .. })
        ));

        let relaxed = StoreConfig {
            ensure_bootstrap_success: false,
            ..config
        };
        assert!(InMemorySwarmStore::connect(&relaxed).is_ok());
    }

    #[tokio::test]
    async fn test_add_initial_peers_rejects_non_multiaddrs() {
        let store = InMemorySwarmStore::new();
        store
            .add_initial_peers(&["/ip4/10.0.0.5/tcp/1".to_string()])
            .await
            .unwrap();
        store
            .add_initial_peers(&["/ip4/10.0.0.5/tcp/1".to_string()])
            .await
            .unwrap();
        assert_eq!(store.initial_peers().len(), 1);
        assert!(store.add_initial_peers(&["10.0.0.5".to_string()]).await.is_err());
    }

    #[tokio::test]
    async fn test_seed() {
        let seed: StoreSeed = serde_json::from_value(json!({
            "visible_maddrs": ["/ip4/1.1.1.1/tcp/1"],
            "values": {"rl_swarm_rs": [2, 0]},
            "subkeyed": {"n_2_0_rl_swarm_outputs": {"Q": [1.0, {"answer": "A"}]}},
            "active_peers": [{"peer_id": "QmX", "addresses": ["/ip4/2.2.2.2/tcp/1"]}]
        }))
        .unwrap();

        let store = InMemorySwarmStore::new();
        store.apply_seed(seed).unwrap();

        assert_eq!(store.visible_maddrs().await.unwrap(), vec!["/ip4/1.1.1.1/tcp/1"]);
        assert_eq!(store.get("rl_swarm_rs", true).await.unwrap(), Some(json!([2, 0])));
        assert!(store.get("n_2_0_rl_swarm_outputs", false).await.unwrap().unwrap()["Q"].is_array());
        assert_eq!(store.active_peers().await.unwrap().unwrap()[0].peer_id, "QmX");
        assert_eq!(store.routing_table().await.unwrap(), None);

        let bad: StoreSeed = serde_json::from_value(json!({"subkeyed": {"k": 1}})).unwrap();
        assert!(store.apply_seed(bad).is_err());
    }
}
