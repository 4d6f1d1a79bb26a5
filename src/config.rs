//! Node configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Data directory (holds the marketplace database)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// HTTP API port
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

/// Wallet login configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Login challenge lifetime in seconds
    #[serde(default = "default_nonce_ttl")]
    pub nonce_ttl_secs: u64,

    /// Session lifetime in seconds
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,

    /// Mirror node base URL override (defaults per network)
    #[serde(default)]
    pub mirror_url: Option<String>,
}

/// Token ledger configuration
///
/// Mutating ledger operations fail with a "not configured" outcome until
/// both operator fields are present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Ledger network name: "mainnet", "testnet", or "previewnet"
    #[serde(default = "default_network")]
    pub network: String,

    /// Treasury/operator account id
    #[serde(default)]
    pub operator_id: Option<String>,

    /// Operator private key
    #[serde(default)]
    pub operator_key: Option<String>,
}

impl LedgerConfig {
    /// Mirror node REST base URL for the configured network.
    pub fn mirror_base_url(&self) -> String {
        match self.network.as_str() {
            "mainnet" => "https://mainnet.mirrornode.hedera.com".to_string(),
            "previewnet" => "https://previewnet.mirrornode.hedera.com".to_string(),
            _ => "https://testnet.mirrornode.hedera.com".to_string(),
        }
    }

    /// Operator account, present only when credentials are complete.
    pub fn operator(&self) -> Option<String> {
        match (&self.operator_id, &self.operator_key) {
            (Some(id), Some(_)) => Some(id.clone()),
            _ => None,
        }
    }
}

// Defaults
fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_http_port() -> u16 {
    3001
}
fn default_nonce_ttl() -> u64 {
    5 * 60
}
fn default_session_ttl() -> u64 {
    24 * 60 * 60
}
fn default_network() -> String {
    "testnet".to_string()
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            nonce_ttl_secs: default_nonce_ttl(),
            session_ttl_secs: default_session_ttl(),
            mirror_url: None,
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            network: default_network(),
            operator_id: None,
            operator_key: None,
        }
    }
}
