// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Peers
//!
//! Multiaddr helpers and the peer roster served to observers.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::IpAddr;

/// Minimal address-shape filter: a multiaddr is non-empty and starts with `/`.
pub fn looks_like_multiaddr(addr: &str) -> bool {
    addr.starts_with('/')
}

/// `/ip4/<ip>/tcp/<port>` (or `/ip6/...`) for a peer found on the local network.
pub fn tcp_multiaddr(ip: IpAddr, port: u16) -> String {
    match ip {
        IpAddr::V4(v4) => format!("/ip4/{v4}/tcp/{port}"),
        IpAddr::V6(v6) => format!("/ip6/{v6}/tcp/{port}"),
    }
}

/// Where a roster entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerSource {
    /// Found by peer discovery (local broadcast, store introspection or the cache file).
    Discovery,
    /// Reported by the store as one of its visible addresses.
    Connected,
    /// This node.
    #[serde(rename = "self")]
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    pub multiaddr: String,
    pub source: PeerSource,
    pub connected: bool,
}

/// Response body of the peer roster query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRoster {
    pub peers: Vec<Peer>,
    pub discovery_active: bool,
    pub total_count: usize,
    pub connected_count: usize,
}

impl PeerRoster {
    /// Merge discovered and store-visible addresses into one roster.
    ///
    /// The first visible address is this node and is listed once, last, as
    /// [`PeerSource::Local`]. Discovered peers come first; `connected` is set when the
    /// store also lists the address as visible. Remaining visible addresses follow as
    /// [`PeerSource::Connected`]. Every multiaddr appears at most once.
    pub fn assemble(discovered: &[String], visible: &[String], discovery_active: bool) -> Self {
        let self_addr = visible.first();
        let visible_set: HashSet<&str> = visible.iter().map(String::as_str).collect();
        let mut seen: HashSet<&str> = HashSet::new();
        if let Some(addr) = self_addr {
            seen.insert(addr.as_str());
        }

        let mut peers = Vec::new();
        for addr in discovered {
            if seen.insert(addr.as_str()) {
                peers.push(Peer {
                    multiaddr: addr.clone(),
                    source: PeerSource::Discovery,
                    connected: visible_set.contains(addr.as_str()),
                });
            }
        }
        for addr in visible {
            if seen.insert(addr.as_str()) {
                peers.push(Peer {
                    multiaddr: addr.clone(),
                    source: PeerSource::Connected,
                    connected: true,
                });
            }
        }
        if let Some(addr) = self_addr {
            peers.push(Peer {
                multiaddr: addr.clone(),
                source: PeerSource::Local,
                connected: true,
            });
        }

        let connected_count = peers.iter().filter(|p| p.connected).count();
        Self {
            total_count: peers.len(),
            connected_count,
            discovery_active,
            peers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn addrs(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_multiaddr_shape() {
        assert!(looks_like_multiaddr("/ip4/10.0.0.2/tcp/30303"));
        assert!(!looks_like_multiaddr(""));
        assert!(!looks_like_multiaddr("10.0.0.2:30303"));
        assert_eq!(
            tcp_multiaddr(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 7)), 4001),
            "/ip4/192.168.1.7/tcp/4001"
        );
    }

    #[test]
    fn test_roster_merges_sources_without_duplicates() {
        let discovered = addrs(&["/ip4/10.0.0.2/tcp/1", "/ip4/10.0.0.3/tcp/1", "/ip4/10.0.0.1/tcp/1"]);
        let visible = addrs(&["/ip4/10.0.0.1/tcp/1", "/ip4/10.0.0.3/tcp/1", "/ip4/10.0.0.4/tcp/1"]);

        let roster = PeerRoster::assemble(&discovered, &visible, true);

        let summary: Vec<(&str, PeerSource, bool)> = roster
            .peers
            .iter()
            .map(|p| (p.multiaddr.as_str(), p.source, p.connected))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("/ip4/10.0.0.2/tcp/1", PeerSource::Discovery, false),
                ("/ip4/10.0.0.3/tcp/1", PeerSource::Discovery, true),
                ("/ip4/10.0.0.4/tcp/1", PeerSource::Connected, true),
                ("/ip4/10.0.0.1/tcp/1", PeerSource::Local, true),
            ]
        );
        assert_eq!(roster.total_count, 4);
        assert_eq!(roster.connected_count, 3);
        assert!(roster.discovery_active);
    }

    #[test]
    fn test_roster_without_store_addresses() {
        let roster = PeerRoster::assemble(&addrs(&["/ip4/10.0.0.2/tcp/1"]), &[], false);
        assert_eq!(roster.total_count, 1);
        assert_eq!(roster.connected_count, 0);
        assert_eq!(roster.peers[0].source, PeerSource::Discovery);
    }

    #[test]
    fn test_self_source_serializes_as_self() {
        let json = serde_json::to_value(PeerSource::Local).unwrap();
        assert_eq!(json, serde_json::json!("self"));
    }
}
