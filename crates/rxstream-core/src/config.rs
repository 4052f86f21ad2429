//! Configuration system for the RXStream receiver.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $RXSTREAM_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/rxstream/config.toml
//!   3. ~/.config/rxstream/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::wire::{MAX_CHUNKS, MAX_FRAME_BYTES, MAX_UDP_PAYLOAD};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RxConfig {
    pub network: NetworkConfig,
    pub reassembly: ReassemblyConfig,
    pub daemon: DaemonConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Local address to bind the datagram socket to.
    pub bind_addr: String,
    /// UDP port the capture device sends to.
    pub port: u16,
    /// Datagrams buffered between the socket task and the reassembler.
    pub queue_depth: usize,
    /// SO_RCVBUF size in bytes. 0 = OS default.
    pub recv_buffer_bytes: usize,
}

/// Limits applied while reassembling frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReassemblyConfig {
    /// Largest `total_chunks` a chunk may declare.
    pub max_chunks: u16,
    /// Ceiling on accumulated payload bytes for one frame.
    pub max_frame_bytes: usize,
    /// Datagrams longer than this are rejected.
    pub max_datagram_bytes: usize,
    /// Frames that may be in flight at once.
    pub max_in_flight: usize,
    /// Incomplete frames idle for longer than this are evicted.
    pub entry_timeout_ms: u64,
    /// How long the id of a dropped frame keeps rejecting its stragglers.
    /// 0 = not at all. Completed ids are never held back.
    pub resolved_ttl_ms: u64,
    /// Minimum spacing between idle sweeps.
    pub sweep_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Receive statistics are logged this often. 0 = never.
    pub stats_interval_secs: u64,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 5000,
            queue_depth: 1024,
            recv_buffer_bytes: 4 * 1024 * 1024,
        }
    }
}

impl Default for ReassemblyConfig {
    fn default() -> Self {
        Self {
            max_chunks: MAX_CHUNKS,
            max_frame_bytes: MAX_FRAME_BYTES,
            max_datagram_bytes: MAX_UDP_PAYLOAD,
            max_in_flight: 64,
            entry_timeout_ms: 2_000,
            resolved_ttl_ms: 250,
            sweep_interval_ms: 500,
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            stats_interval_secs: 10,
        }
    }
}

impl ReassemblyConfig {
    pub fn entry_timeout(&self) -> Duration {
        Duration::from_millis(self.entry_timeout_ms)
    }

    pub fn resolved_ttl(&self) -> Duration {
        Duration::from_millis(self.resolved_ttl_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("rxstream")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl RxConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            RxConfig::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("RXSTREAM_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&RxConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply RXSTREAM_* overrides. `lookup` resolves a variable name; `load`
    /// passes the process environment. Unparseable values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("RXSTREAM_NETWORK__BIND_ADDR") {
            self.network.bind_addr = v;
        }
        if let Some(p) = lookup("RXSTREAM_NETWORK__PORT").and_then(|v| v.parse().ok()) {
            self.network.port = p;
        }
        if let Some(n) = lookup("RXSTREAM_REASSEMBLY__MAX_CHUNKS").and_then(|v| v.parse().ok()) {
            self.reassembly.max_chunks = n;
        }
        if let Some(n) =
            lookup("RXSTREAM_REASSEMBLY__MAX_FRAME_BYTES").and_then(|v| v.parse().ok())
        {
            self.reassembly.max_frame_bytes = n;
        }
        if let Some(n) =
            lookup("RXSTREAM_REASSEMBLY__ENTRY_TIMEOUT_MS").and_then(|v| v.parse().ok())
        {
            self.reassembly.entry_timeout_ms = n;
        }
        if let Some(n) =
            lookup("RXSTREAM_REASSEMBLY__RESOLVED_TTL_MS").and_then(|v| v.parse().ok())
        {
            self.reassembly.resolved_ttl_ms = n;
        }
    }
}
