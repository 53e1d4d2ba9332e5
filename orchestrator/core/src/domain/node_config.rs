// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Node Configuration Types
//
// Defines the configuration schema for rlswarm observer nodes:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Store client settings (initial peers, bootstrap behaviour)
// - Peer discovery settings (local broadcast, cache file)
// - Swarm state cache timing and gossip bounds
// - HTTP API and observability settings

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const API_VERSION: &str = "rlswarm/v1";
pub const KIND: &str = "SwarmNode";

/// Top-level Kubernetes-style node configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmNodeManifest {
    /// API version (must be "rlswarm/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "SwarmNode")
    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: SwarmNodeSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Human-readable node name, used as log tag and mDNS-independent identifier
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SwarmNodeSpec {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub discovery: DiscoveryConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Store client settings, handed to the client at construction time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Multiaddrs of peers to bootstrap from
    #[serde(default)]
    pub initial_peers: Vec<String>,

    /// Port the store listens on (advertised over local discovery)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listen_port: Option<u16>,

    /// Addresses this node is reachable under
    #[serde(default)]
    pub host_maddrs: Vec<String>,

    /// Fail construction when no initial peer can be used for bootstrapping.
    /// Observer nodes usually run with this off.
    #[serde(default)]
    pub ensure_bootstrap_success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Advertise and browse on the local network (needs the `mdns` feature)
    #[serde(default = "default_true")]
    pub enable_local: bool,

    /// mDNS service name; advertised as `_<name>._tcp.local.`
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Peer cache file, one multiaddr per line. `~` expands to the home directory.
    #[serde(default = "default_cache_file")]
    pub cache_file: String,

    /// Upper bound on each wait for a local discovery result
    #[serde(default = "default_browse_timeout_ms")]
    pub browse_timeout_ms: u64,

    /// Number of peers handed out for bootstrapping
    #[serde(default = "default_bootstrap_count")]
    pub bootstrap_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Health check fails once the last poll is older than this
    #[serde(default = "default_staleness_threshold_secs")]
    pub staleness_threshold_secs: u64,

    /// How many rounds before the current one the gossip feed looks at
    #[serde(default = "default_lookback_rounds")]
    pub lookback_rounds: i64,

    /// Most recent outputs kept per node, round and stage
    #[serde(default = "default_stage_gossip_limit")]
    pub stage_gossip_limit: usize,

    /// Concurrent store reads while assembling gossip
    #[serde(default = "default_max_concurrent_reads")]
    pub max_concurrent_reads: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_api_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: compact or json
    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

fn default_true() -> bool {
    true
}

fn default_service_name() -> String {
    "rlswarm".to_string()
}

fn default_cache_file() -> String {
    "~/.rlswarm/peers.json".to_string()
}

fn default_browse_timeout_ms() -> u64 {
    5_000
}

fn default_bootstrap_count() -> usize {
    3
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_staleness_threshold_secs() -> u64 {
    300
}

fn default_lookback_rounds() -> i64 {
    20
}

fn default_stage_gossip_limit() -> usize {
    20
}

fn default_max_concurrent_reads() -> usize {
    16
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "compact".to_string()
}

fn default_metrics_port() -> u16 {
    9091
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enable_local: default_true(),
            service_name: default_service_name(),
            cache_file: default_cache_file(),
            browse_timeout_ms: default_browse_timeout_ms(),
            bootstrap_count: default_bootstrap_count(),
        }
    }
}

impl DiscoveryConfig {
    pub fn browse_timeout(&self) -> Duration {
        Duration::from_millis(self.browse_timeout_ms)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            staleness_threshold_secs: default_staleness_threshold_secs(),
            lookback_rounds: default_lookback_rounds(),
            stage_gossip_limit: default_stage_gossip_limit(),
            max_concurrent_reads: default_max_concurrent_reads(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_api_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

impl Default for SwarmNodeManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: hostname::get()
                    .ok()
                    .and_then(|h| h.into_string().ok())
                    .unwrap_or_else(|| "rlswarm-node".to_string()),
                labels: None,
            },
            spec: SwarmNodeSpec::default(),
        }
    }
}

impl SwarmNodeManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Paths checked by [`discover_config`](Self::discover_config), in order.
    pub fn candidate_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Ok(path) = std::env::var("RLSWARM_CONFIG_PATH") {
            paths.push(PathBuf::from(path));
        }
        paths.push(PathBuf::from("./rlswarm-config.yaml"));
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".rlswarm").join("config.yaml"));
        }
        paths.push(PathBuf::from("/etc/rlswarm/config.yaml"));
        paths
    }

    /// Discover configuration file using precedence order
    /// 1. RLSWARM_CONFIG_PATH environment variable
    /// 2. ./rlswarm-config.yaml (working directory)
    /// 3. ~/.rlswarm/config.yaml (user home)
    /// 4. /etc/rlswarm/config.yaml (system)
    pub fn discover_config() -> Option<PathBuf> {
        Self::candidate_paths().into_iter().find(|path| path.exists())
    }

    /// Logging section of the manifest [`load_or_default`](Self::load_or_default) would
    /// pick, read without emitting any events so it can run before a subscriber exists.
    /// Unreadable or invalid files yield the defaults.
    pub fn logging_settings(cli_path: Option<&Path>) -> LoggingConfig {
        let path = match cli_path {
            Some(path) => Some(path.to_path_buf()),
            None => Self::discover_config(),
        };
        path.and_then(|path| Self::from_yaml_file(path).ok())
            .map(|config| config.spec.observability.logging)
            .unwrap_or_default()
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        let mut config = match Self::discover_config() {
            Some(config_path) => {
                tracing::info!("Loading configuration from discovered path: {:?}", config_path);
                Self::from_yaml_file(config_path)?
            }
            None => {
                tracing::warn!("No configuration file found in standard locations. Using defaults.");
                Self::default()
            }
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    /// This allows container deployments to override config via env vars
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary variable source.
    ///
    /// - `INITIAL_PEERS`: comma-separated multiaddrs, replaces `spec.store.initial_peers`
    /// - `SWARM_UI_PORT`: API port; unparsable values fall back to 8000
    /// - `RLSWARM_ENABLE_LOCAL_DISCOVERY`: true/false
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(peers) = lookup("INITIAL_PEERS").filter(|v| !v.trim().is_empty()) {
            let peers: Vec<String> = peers
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect();
            tracing::info!(count = peers.len(), "Environment override: INITIAL_PEERS");
            self.spec.store.initial_peers = peers;
        }

        if let Some(port) = lookup("SWARM_UI_PORT") {
            match port.trim().parse::<u16>() {
                Ok(port) => {
                    tracing::info!("Environment override: SWARM_UI_PORT={}", port);
                    self.spec.api.port = port;
                }
                Err(_) => {
                    tracing::warn!("Invalid port {}. Defaulting to {}", port, default_api_port());
                    self.spec.api.port = default_api_port();
                }
            }
        }

        if let Some(val) = lookup("RLSWARM_ENABLE_LOCAL_DISCOVERY") {
            match val.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => self.spec.discovery.enable_local = true,
                "false" | "0" | "no" | "off" => self.spec.discovery.enable_local = false,
                _ => tracing::warn!(
                    "Ignoring invalid RLSWARM_ENABLE_LOCAL_DISCOVERY value: {}",
                    val
                ),
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!("Invalid apiVersion: {} (expected {})", self.api_version, API_VERSION);
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: {} (expected {})", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        for peer in &self.spec.store.initial_peers {
            if !crate::domain::peer::looks_like_multiaddr(peer) {
                anyhow::bail!("Initial peer is not a multiaddr: {}", peer);
            }
        }

        let discovery = &self.spec.discovery;
        if discovery.service_name.is_empty()
            || !discovery
                .service_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            anyhow::bail!(
                "spec.discovery.service_name must be non-empty ASCII letters, digits or '-': {}",
                discovery.service_name
            );
        }
        if discovery.browse_timeout_ms == 0 {
            anyhow::bail!("spec.discovery.browse_timeout_ms must be positive");
        }

        let cache = &self.spec.cache;
        if cache.poll_interval_secs == 0 {
            anyhow::bail!("spec.cache.poll_interval_secs must be positive");
        }
        if cache.staleness_threshold_secs <= cache.poll_interval_secs {
            anyhow::bail!(
                "spec.cache.staleness_threshold_secs ({}) must exceed poll_interval_secs ({})",
                cache.staleness_threshold_secs,
                cache.poll_interval_secs
            );
        }
        if cache.lookback_rounds < 0 {
            anyhow::bail!("spec.cache.lookback_rounds cannot be negative");
        }
        if cache.stage_gossip_limit == 0 || cache.max_concurrent_reads == 0 {
            anyhow::bail!("spec.cache.stage_gossip_limit and max_concurrent_reads must be positive");
        }

        match self.spec.observability.logging.format.as_str() {
            "compact" | "json" => {}
            other => anyhow::bail!("Unknown log format: {} (expected compact or json)", other),
        }

        Ok(())
    }
}
