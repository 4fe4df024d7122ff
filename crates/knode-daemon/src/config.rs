//! Configuration: `NodeConfig`, the typed, TOML/env-backed counterpart of
//! the spec's bare `PORT` / `IS_BOOTSTRAP_NODE` / `BOOTSTRAP_PORT` /
//! `BOOTSTRAP_NODE_ID` environment variables.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Complete node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Transport settings.
    #[serde(default)]
    pub transport: TransportConfig,
    /// This node's own main listening port. 0 lets the OS assign one.
    #[serde(default)]
    pub port: u16,
    /// Whether this node is the network's designated bootstrap node.
    #[serde(default)]
    pub is_bootstrap_node: bool,
    /// The bootstrap peer's port, when joining an existing network.
    #[serde(default)]
    pub bootstrap_port: Option<u16>,
    /// The bootstrap peer's node id (40-hex), when joining.
    #[serde(default)]
    pub bootstrap_node_id: Option<String>,
    /// This node's own id (40-hex), fixed by configuration. Left unset, a
    /// fresh random id is generated at startup; the bootstrap node typically
    /// sets this so joining peers can address it by a well-known id.
    #[serde(default)]
    pub self_node_id: Option<String>,
    /// The host this node advertises to peers (part of its public contact).
    #[serde(default = "default_host")]
    pub advertised_host: String,
    /// Log level passed to `tracing-subscriber`'s `EnvFilter`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Transport-layer tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Base of the ephemeral port range used for outbound requests.
    #[serde(default = "default_ephemeral_base")]
    pub ephemeral_base_port: u16,
    /// Size of the ephemeral port pool.
    #[serde(default = "default_ephemeral_pool_size")]
    pub ephemeral_pool_size: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_ephemeral_base() -> u16 {
    20000
}

fn default_ephemeral_pool_size() -> u16 {
    knode_dht::EPHEMERAL_POOL_SIZE
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ephemeral_base_port: default_ephemeral_base(),
            ephemeral_pool_size: default_ephemeral_pool_size(),
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            port: 0,
            is_bootstrap_node: false,
            bootstrap_port: None,
            bootstrap_node_id: None,
            self_node_id: None,
            advertised_host: default_host(),
            log_level: default_log_level(),
        }
    }
}

impl NodeConfig {
    /// Load configuration: an optional TOML file at `KNODE_CONFIG_PATH` (or
    /// `./knode.toml` if unset), then environment-variable overrides.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = match Self::config_path() {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(&path)?;
                toml::from_str(&content)?
            }
            _ => Self::default(),
        };

        if let Ok(port) = std::env::var("PORT") {
            config.port = port.parse()?;
        }
        if let Ok(flag) = std::env::var("IS_BOOTSTRAP_NODE") {
            config.is_bootstrap_node = parse_bool(&flag)?;
        }
        if let Ok(port) = std::env::var("BOOTSTRAP_PORT") {
            config.bootstrap_port = Some(port.parse()?);
        }
        if let Ok(id) = std::env::var("BOOTSTRAP_NODE_ID") {
            config.bootstrap_node_id = Some(id);
        }

        Ok(config)
    }

    fn config_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("KNODE_CONFIG_PATH") {
            return Some(PathBuf::from(path));
        }
        Some(PathBuf::from("knode.toml"))
    }
}

fn parse_bool(s: &str) -> anyhow::Result<bool> {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => Err(anyhow::anyhow!("invalid boolean value: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_a_non_bootstrap_node_with_default_pool() {
        let config = NodeConfig::default();
        assert_eq!(config.port, 0);
        assert!(!config.is_bootstrap_node);
        assert!(config.bootstrap_port.is_none());
        assert_eq!(config.transport.ephemeral_pool_size, knode_dht::EPHEMERAL_POOL_SIZE);
    }

    #[test]
    fn config_roundtrips_through_toml() {
        let config = NodeConfig::default();
        let toml_str = toml::to_string(&config).expect("serialize");
        let _parsed: NodeConfig = toml::from_str(&toml_str).expect("parse");
    }

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert!(parse_bool("true").expect("parse"));
        assert!(parse_bool("1").expect("parse"));
        assert!(!parse_bool("false").expect("parse"));
        assert!(parse_bool("maybe").is_err());
    }
}
