// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Local Network Discovery Contract
//!
//! Service advertisement and browsing on the local network. The broadcast
//! mechanism is an optional capability: when no backend is available, peer
//! discovery runs store-only.

use std::net::IpAddr;
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("local discovery unavailable: {0}")]
    Unavailable(String),

    #[error("failed to register service {name}: {reason}")]
    Register { name: String, reason: String },

    #[error("failed to browse for {service_type}: {reason}")]
    Browse { service_type: String, reason: String },

    #[error("failed to unregister service {name}: {reason}")]
    Unregister { name: String, reason: String },

    #[error("failed to shut down local discovery: {0}")]
    Shutdown(String),

    #[error("peer cache {path:?}: {source}")]
    CacheIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What this node announces about itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceAdvertisement {
    /// e.g. `_rlswarm._tcp.local.`
    pub service_type: String,
    /// Instance label, the host name.
    pub instance_name: String,
    /// e.g. `myhost.local.`
    pub host_name: String,
    pub ip: IpAddr,
    pub port: u16,
}

impl ServiceAdvertisement {
    pub fn service_type_for(service_name: &str) -> String {
        format!("_{service_name}._tcp.local.")
    }

    pub fn fullname(&self) -> String {
        format!("{}.{}", self.instance_name, self.service_type)
    }
}

/// A same-named service resolved on the local network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedService {
    pub fullname: String,
    pub addresses: Vec<IpAddr>,
    pub port: u16,
}

/// Local broadcast backend (mDNS or equivalent).
///
/// All calls are non-blocking; resolved services are delivered on the channel
/// returned by [`browse`](LocalDiscovery::browse).
pub trait LocalDiscovery: Send + Sync {
    fn register(&self, advertisement: &ServiceAdvertisement) -> Result<(), DiscoveryError>;

    fn browse(&self, service_type: &str) -> Result<mpsc::Receiver<ResolvedService>, DiscoveryError>;

    fn stop_browse(&self, service_type: &str) -> Result<(), DiscoveryError>;

    fn unregister(&self, fullname: &str) -> Result<(), DiscoveryError>;

    /// Release the broadcast handle. A later `register` or `browse` opens a new one.
    fn shutdown(&self) -> Result<(), DiscoveryError>;
}
