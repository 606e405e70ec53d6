//! Configuration types for Tokenlock

use serde::{Deserialize, Serialize};

use crate::errors::Error;

/// JSON-RPC endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Endpoint URL (e.g., "http://127.0.0.1:8545")
    pub url: String,

    /// Deployed registry contract address
    pub registry_address: String,

    /// Upper bound for a single RPC request
    pub request_timeout_secs: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8545".to_string(),
            registry_address: String::new(),
            request_timeout_secs: 30,
        }
    }
}

/// How write calls wait for their transaction to be mined
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmationConfig {
    /// Delay between receipt polls
    pub poll_interval_ms: u64,

    /// Give up waiting after this long
    pub timeout_secs: u64,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1_000,
            timeout_secs: 600,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Registry endpoint settings
    pub rpc: RpcConfig,

    /// Transaction confirmation settings
    pub confirmations: ConfirmationConfig,

    /// Countdown recompute cadence
    pub countdown_tick_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rpc: RpcConfig::default(),
            confirmations: ConfirmationConfig::default(),
            countdown_tick_ms: 1_000,
        }
    }
}

impl AppConfig {
    /// Parse a JSON configuration document; missing fields take defaults
    pub fn from_json_str(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }
}
