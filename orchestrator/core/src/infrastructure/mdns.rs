// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Multicast DNS backend for local network discovery.
//!
//! Wraps an `mdns-sd` responder. The responder runs its own thread; browse
//! results are forwarded onto a tokio channel by a small bridge thread that
//! exits when either side of the bridge goes away.

use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::debug;

use crate::domain::local_discovery::{
    DiscoveryError, LocalDiscovery, ResolvedService, ServiceAdvertisement,
};

const RESOLVED_CHANNEL_CAPACITY: usize = 64;

pub struct MdnsDiscovery {
    daemon: Mutex<Option<ServiceDaemon>>,
}

impl MdnsDiscovery {
    /// Open the responder. Fails when the host has no usable multicast interface.
    pub fn open() -> Result<Self, DiscoveryError> {
        let daemon = ServiceDaemon::new().map_err(|e| DiscoveryError::Unavailable(e.to_string()))?;
        Ok(Self {
            daemon: Mutex::new(Some(daemon)),
        })
    }

    fn handle(&self) -> Result<ServiceDaemon, DiscoveryError> {
        let mut guard = self.daemon.lock();
        if let Some(daemon) = guard.as_ref() {
            return Ok(daemon.clone());
        }
        let daemon = ServiceDaemon::new().map_err(|e| DiscoveryError::Unavailable(e.to_string()))?;
        *guard = Some(daemon.clone());
        Ok(daemon)
    }
}

impl LocalDiscovery for MdnsDiscovery {
    fn register(&self, advertisement: &ServiceAdvertisement) -> Result<(), DiscoveryError> {
        let register_err = |reason: String| DiscoveryError::Register {
            name: advertisement.fullname(),
            reason,
        };

        let ip = advertisement.ip.to_string();
        let info = ServiceInfo::new(
            &advertisement.service_type,
            &advertisement.instance_name,
            &advertisement.host_name,
            ip.as_str(),
            advertisement.port,
            HashMap::<String, String>::new(),
        )
        .map_err(|e| register_err(e.to_string()))?;

        self.handle()?
            .register(info)
            .map_err(|e| register_err(e.to_string()))?;
        debug!(service = %advertisement.fullname(), %ip, port = advertisement.port, "Registered mDNS service");
        Ok(())
    }

    fn browse(&self, service_type: &str) -> Result<mpsc::Receiver<ResolvedService>, DiscoveryError> {
        let browse_err = |reason: String| DiscoveryError::Browse {
            service_type: service_type.to_string(),
            reason,
        };

        let events = self
            .handle()?
            .browse(service_type)
            .map_err(|e| browse_err(e.to_string()))?;
        let (tx, rx) = mpsc::channel(RESOLVED_CHANNEL_CAPACITY);

        std::thread::Builder::new()
            .name("mdns-browse".to_string())
            .spawn(move || {
                while let Ok(event) = events.recv() {
                    match event {
                        ServiceEvent::ServiceResolved(info) => {
                            let resolved = ResolvedService {
                                fullname: info.get_fullname().to_string(),
                                addresses: info.get_addresses().iter().copied().collect(),
                                port: info.get_port(),
                            };
                            if tx.blocking_send(resolved).is_err() {
                                break;
                            }
                        }
                        ServiceEvent::SearchStopped(_) => break,
                        _ => {}
                    }
                }
            })
            .map_err(|e| browse_err(e.to_string()))?;

        Ok(rx)
    }

    fn stop_browse(&self, service_type: &str) -> Result<(), DiscoveryError> {
        self.handle()?
            .stop_browse(service_type)
            .map_err(|e| DiscoveryError::Browse {
                service_type: service_type.to_string(),
                reason: e.to_string(),
            })
    }

    fn unregister(&self, fullname: &str) -> Result<(), DiscoveryError> {
        self.handle()?
            .unregister(fullname)
            .map(|_| ())
            .map_err(|e| DiscoveryError::Unregister {
                name: fullname.to_string(),
                reason: e.to_string(),
            })
    }

    fn shutdown(&self) -> Result<(), DiscoveryError> {
        let Some(daemon) = self.daemon.lock().take() else {
            return Ok(());
        };
        daemon
            .shutdown()
            .map(|_| ())
            .map_err(|e| DiscoveryError::Shutdown(e.to_string()))
    }
}
