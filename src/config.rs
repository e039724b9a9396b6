//! Runtime configuration for the `rpc-host` demo binary — ambient stack,
//! SPEC_FULL.md §1. Precedence mirrors the host daemon family's own
//! `DaemonConfig`: CLI flag > environment variable > TOML file > built-in
//! default.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

/// Everything a TOML config file may set. All fields optional — a file that
/// sets nothing is valid and just falls through to defaults.
#[derive(Debug, Default, Deserialize)]
pub struct TomlConfig {
    pub bind_addr: Option<String>,
    pub log: Option<String>,
    pub max_connections: Option<usize>,
}

/// Read and parse `<data_dir>/rpc-host.toml`. Missing file or unparsable
/// contents both degrade to `None` with a logged warning rather than a
/// startup failure — a config file is always optional.
pub fn load_toml(data_dir: &Path) -> Option<TomlConfig> {
    let path = data_dir.join("rpc-host.toml");
    let raw = std::fs::read_to_string(&path).ok()?;
    match toml::from_str(&raw) {
        Ok(config) => Some(config),
        Err(err) => {
            warn!(path = %path.display(), err = %err, "ignoring unparsable config file");
            None
        }
    }
}

/// Resolved configuration for one `rpc-host` process.
#[derive(Debug, Clone)]
pub struct HostConfig {
    pub bind_addr: SocketAddr,
    pub log: String,
    pub max_connections: usize,
    pub data_dir: PathBuf,
}

impl HostConfig {
    pub const DEFAULT_BIND_ADDR: &'static str = "127.0.0.1:8787";
    pub const DEFAULT_LOG: &'static str = "info";
    pub const DEFAULT_MAX_CONNECTIONS: usize = 256;

    /// Merge precedence: `cli_*` overrides > `RPC_HOST_*` env vars > the
    /// TOML file under `data_dir` > built-in defaults.
    pub fn resolve(
        data_dir: PathBuf,
        cli_bind_addr: Option<String>,
        cli_log: Option<String>,
    ) -> anyhow::Result<Self> {
        let toml_config = load_toml(&data_dir).unwrap_or_default();

        let bind_addr = cli_bind_addr
            .or_else(|| std::env::var("RPC_HOST_BIND_ADDR").ok())
            .or(toml_config.bind_addr)
            .unwrap_or_else(|| Self::DEFAULT_BIND_ADDR.to_string())
            .parse()?;

        let log = cli_log
            .or_else(|| std::env::var("RPC_HOST_LOG").ok())
            .or(toml_config.log)
            .unwrap_or_else(|| Self::DEFAULT_LOG.to_string());

        let max_connections = std::env::var("RPC_HOST_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .or(toml_config.max_connections)
            .unwrap_or(Self::DEFAULT_MAX_CONNECTIONS);

        Ok(Self {
            bind_addr,
            log,
            max_connections,
            data_dir,
        })
    }
}
