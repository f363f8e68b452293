use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::time::Duration;

use crate::core_types::{Amount, amount_serde};
use crate::eth::Address;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config yaml: {0}")]
    Parse(#[from] serde_yaml::Error),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub enable_tracing: bool,
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub source: SourceChainConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Transfer policy
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct BridgeConfig {
    /// Source blocks the destination light client must have imported past
    /// the lock block before minting.
    pub needed_confirmations: u64,
    /// Per-token override of `needed_confirmations`, keyed by token name.
    pub asset_confirmations: HashMap<String, u64>,
    pub poll_interval_ms: u64,
    /// Attached to every mint for destination storage staking.
    #[serde(with = "amount_serde")]
    pub mint_deposit: Amount,
    pub mint_gas: u64,
    /// Account that receives minted tokens on the destination chain.
    pub destination_account: String,
    /// Source token name, used in messages ("Minting n{token} failed").
    pub token_name: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            needed_confirmations: 10,
            asset_confirmations: HashMap::new(),
            poll_interval_ms: 5500,
            // 600 bytes of contract state at 10^20 yocto per byte
            mint_deposit: 100_000_000_000_000_000_000 * 600,
            mint_gas: 300_000_000_000_000,
            destination_account: String::new(),
            token_name: "ERC20".to_string(),
        }
    }
}

impl BridgeConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Confirmations required for the configured token.
    pub fn confirmations_for(&self, token: &str) -> u64 {
        self.asset_confirmations
            .get(token)
            .copied()
            .unwrap_or(self.needed_confirmations)
    }
}

/// Source chain JSON-RPC endpoint and contracts
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SourceChainConfig {
    pub rpc_url: String,
    /// Unlocked node account used for `eth_sendTransaction`.
    #[serde(default)]
    pub sender: Option<Address>,
    #[serde(default)]
    pub token_address: Address,
    #[serde(default)]
    pub locker_address: Address,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for SourceChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".to_string(),
            sender: None,
            token_address: Address::default(),
            locker_address: Address::default(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: "./data".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load(env: &str) -> Result<Self, ConfigError> {
        let config_path = format!("config/{}.yaml", env);
        Self::from_file(&config_path)
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        Ok(serde_yaml::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_config_deserialize() {
        let yaml = r#"
log_level: "info"
log_dir: "./logs"
log_file: "bridge.log"
use_json: false
rotation: "daily"
enable_tracing: true
bridge:
  needed_confirmations: 25
  asset_confirmations:
    DAI: 40
  poll_interval_ms: 1000
  mint_deposit: "60000000000000000000000"
  mint_gas: 300000000000000
  destination_account: "alice.near"
  token_name: "DAI"
source:
  rpc_url: "http://127.0.0.1:8545"
  sender: "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
  token_address: "0x5fbdb2315678afecb367f032d93f642f64180aa3"
  locker_address: "0xe7f1725e7734ce288f8367e1bb143e90bb3f0512"
storage:
  path: "/tmp/bridge"
"#;

        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.bridge.needed_confirmations, 25);
        assert_eq!(config.bridge.confirmations_for("DAI"), 40);
        assert_eq!(config.bridge.confirmations_for("USDC"), 25);
        assert_eq!(config.bridge.mint_deposit, 60_000_000_000_000_000_000_000);
        assert_eq!(config.bridge.poll_interval(), Duration::from_millis(1000));
        assert!(config.source.sender.is_some());
        assert_eq!(config.source.timeout_secs, 30);
        assert_eq!(config.storage.path, "/tmp/bridge");
    }

    #[test]
    fn test_sections_default_when_missing() {
        let yaml = r#"
log_level: "debug"
log_dir: "./logs"
log_file: "bridge.log"
use_json: true
rotation: "never"
enable_tracing: false
"#;

        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.bridge.needed_confirmations, 10);
        assert_eq!(config.bridge.poll_interval_ms, 5500);
        assert_eq!(config.bridge.mint_deposit, 60_000_000_000_000_000_000_000);
        assert_eq!(config.source.rpc_url, "http://127.0.0.1:8545");
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let yaml = r#"
log_level: "info"
log_dir: "./logs"
log_file: "bridge.log"
use_json: false
rotation: "daily"
enable_tracing: false
bridge:
  needed_confirmations: 3
storage: {}
"#;

        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.bridge.needed_confirmations, 3);
        assert_eq!(config.bridge.poll_interval_ms, 5500);
        assert_eq!(config.bridge.mint_gas, 300_000_000_000_000);
        assert_eq!(config.bridge.token_name, "ERC20");
        assert_eq!(config.storage.path, "./data");
    }

    #[test]
    fn test_missing_file_is_reported() {
        let err = AppConfig::from_file("/nonexistent/bridge.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
