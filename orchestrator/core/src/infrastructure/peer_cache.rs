// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Peer cache file: the discovered peer set persisted between runs, one
//! multiaddr per line.

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::domain::local_discovery::DiscoveryError;

#[derive(Debug, Clone)]
pub struct PeerCacheFile {
    path: PathBuf,
}

impl PeerCacheFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Resolve a configured path, expanding a leading `~` to the home directory.
    pub fn from_config_path(raw: &str) -> Self {
        Self::new(expand_home(raw))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the cached peers. A missing file is an empty cache.
    pub fn load(&self) -> Result<BTreeSet<String>, DiscoveryError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = ?self.path, "No peer cache file yet");
                return Ok(BTreeSet::new());
            }
            Err(source) => {
                return Err(DiscoveryError::CacheIo {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Load, degrading any failure to an empty set.
    pub fn load_or_empty(&self) -> BTreeSet<String> {
        self.load().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to read peer cache, starting empty");
            BTreeSet::new()
        })
    }

    /// Overwrite the cache with `peers`, creating the parent directory if needed.
    pub fn save<'a>(&self, peers: impl IntoIterator<Item = &'a String>) -> Result<(), DiscoveryError> {
        let io_err = |source| DiscoveryError::CacheIo {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let mut content = String::new();
        for peer in peers {
            content.push_str(peer);
            content.push('\n');
        }
        std::fs::write(&self.path, content).map_err(io_err)
    }
}

fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PeerCacheFile::new(dir.path().join("peers.json"));
        assert!(cache.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_creates_parent_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PeerCacheFile::new(dir.path().join("nested").join("peers.json"));

        let peers: BTreeSet<String> = ["/ip4/10.0.0.2/tcp/1", "/ip4/10.0.0.3/tcp/1"]
            .into_iter()
            .map(String::from)
            .collect();
        cache.save(&peers).unwrap();

        assert_eq!(cache.load().unwrap(), peers);
    }

    #[test]
    fn test_blank_lines_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("peers.json");
        std::fs::write(&path, "\n/ip4/10.0.0.2/tcp/1\n  \n/ip4/10.0.0.2/tcp/1\n").unwrap();

        let peers = PeerCacheFile::new(path).load().unwrap();
        assert_eq!(peers.len(), 1);
    }

    #[test]
    fn test_unreadable_cache_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be.
        let cache = PeerCacheFile::new(dir.path());
        assert!(cache.load().is_err());
        assert!(cache.load_or_empty().is_empty());
    }

    #[test]
    fn test_tilde_expansion() {
        let cache = PeerCacheFile::from_config_path("~/.rlswarm/peers.json");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(cache.path(), home.join(".rlswarm/peers.json"));
        }
        assert_eq!(PeerCacheFile::from_config_path("/tmp/p").path(), Path::new("/tmp/p"));
    }
}
