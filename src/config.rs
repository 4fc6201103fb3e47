//! Client configuration
//!
//! Built through [`ClientConfigBuilder`]; defaults match the modem emulator
//! setup (port 9200, 2 s reply timeout, 10 ms timeout check).

use std::path::PathBuf;
use std::time::Duration;

use crate::batch::BatchOptions;
use crate::contracts::NodeAddress;
use crate::errors::{DacapError, Result};
use crate::receiver::parse_address;
use crate::session::SessionConfig;

/// Node address implied by the host we connect through
///
/// The emulator hands out `127.0.0.n` / `10.78.1.n`, and `n` is the node's
/// hydroacoustic address. Hosts without a dot map to node 1.
pub fn node_address_from_host(host: &str) -> NodeAddress {
    match host.rfind('.') {
        Some(pos) => parse_address(&host[pos + 1..]),
        None => 1,
    }
}

/// Validated client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    host: String,
    port: u16,
    node_address: NodeAddress,
    timeout_ms: u64,
    tick_interval_ms: u64,
    batch_pause_ms: u64,
    batch_size: usize,
    stats_dir: Option<PathBuf>,
}

impl ClientConfig {
    /// Start building a configuration for `host`
    pub fn builder(host: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder::new(host)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn node_address(&self) -> NodeAddress {
        self.node_address
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Statistics file for this node, when statistics are enabled
    pub fn stats_path(&self) -> Option<PathBuf> {
        self.stats_dir
            .as_ref()
            .map(|dir| dir.join(crate::telemetry::CsvStatsSink::file_name_for(&self.host)))
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::default().with_timeout_ms(self.timeout_ms)
    }

    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions::default()
            .with_poll_interval(self.tick_interval())
            .with_pause(Duration::from_millis(self.batch_pause_ms))
    }
}

/// Builder for [`ClientConfig`]
#[derive(Debug, Clone)]
pub struct ClientConfigBuilder {
    host: String,
    port: u16,
    node_address: Option<NodeAddress>,
    timeout_ms: u64,
    tick_interval_ms: u64,
    batch_pause_ms: u64,
    batch_size: usize,
    stats_dir: Option<PathBuf>,
}

impl ClientConfigBuilder {
    /// Create a builder with defaults
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: crate::DEFAULT_PORT,
            node_address: None,
            timeout_ms: crate::DEFAULT_TIMEOUT_MS,
            tick_interval_ms: crate::DEFAULT_TICK_INTERVAL_MS,
            batch_pause_ms: crate::DEFAULT_BATCH_PAUSE_MS,
            batch_size: crate::BATCH_MESSAGE_COUNT,
            stats_dir: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Override the address derived from the host
    pub fn with_node_address(mut self, address: NodeAddress) -> Self {
        self.node_address = Some(address);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_tick_interval_ms(mut self, tick_interval_ms: u64) -> Self {
        self.tick_interval_ms = tick_interval_ms;
        self
    }

    pub fn with_batch_pause_ms(mut self, batch_pause_ms: u64) -> Self {
        self.batch_pause_ms = batch_pause_ms;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Write `stats_<host>.csv` into `dir`
    pub fn with_stats_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.stats_dir = Some(dir.into());
        self
    }

    pub fn get_node_address(&self) -> NodeAddress {
        self.node_address
            .unwrap_or_else(|| node_address_from_host(&self.host))
    }

    pub fn get_timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    pub fn get_tick_interval_ms(&self) -> u64 {
        self.tick_interval_ms
    }

    /// Validate and build
    ///
    /// # Errors
    /// `Config` for an empty host, port 0, a non-positive node address or a
    /// zero timeout / tick interval.
    pub fn build(self) -> Result<ClientConfig> {
        let node_address = self.get_node_address();
        if self.host.is_empty() {
            return Err(DacapError::Config("host must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(DacapError::Config("port must be non-zero".to_string()));
        }
        if node_address <= 0 {
            return Err(DacapError::Config(format!(
                "node address must be positive, got {}",
                node_address
            )));
        }
        if self.timeout_ms == 0 || self.tick_interval_ms == 0 {
            return Err(DacapError::Config(
                "timeout and tick interval must be non-zero".to_string(),
            ));
        }

        Ok(ClientConfig {
            host: self.host,
            port: self.port,
            node_address,
            timeout_ms: self.timeout_ms,
            tick_interval_ms: self.tick_interval_ms,
            batch_pause_ms: self.batch_pause_ms,
            batch_size: self.batch_size,
            stats_dir: self.stats_dir,
        })
    }
}
