//! Configuration of the bridge validator.
//!
//! Configuration is a flat TOML table; every scalar key can be overridden by
//! an environment variable of the same uppercased name. The `logging` table
//! is opaque to everything but the tracing setup.

pub mod loading;
pub mod private_key;

use std::time::Duration;

use alloy_primitives::Address;
use serde::Deserialize;
use url::Url;
use validator::Validate;

pub use crate::loading::{load_config, ConfigError};
pub use crate::private_key::PrivateKeySource;

const DEFAULT_RPC_TIMEOUT_SECONDS: u64 = 180;
const DEFAULT_EVENT_POLL_INTERVAL_SECONDS: u64 = 5;
const DEFAULT_BALANCE_WARN_POLL_INTERVAL_SECONDS: u64 = 60;
/// 10 gwei.
const DEFAULT_GAS_PRICE_WEI: u128 = 10_000_000_000;
/// 0.04 of the home chain's native coin.
const DEFAULT_BALANCE_WARN_THRESHOLD_WEI: u128 = 40_000_000_000_000_000;

#[derive(Clone, Debug, Deserialize, PartialEq, Validate)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    pub home_rpc_url: Url,
    #[serde(default = "default_rpc_timeout")]
    #[validate(range(min = 1))]
    pub home_rpc_timeout: u64,
    pub foreign_rpc_url: Url,
    #[serde(default = "default_rpc_timeout")]
    #[validate(range(min = 1))]
    pub foreign_rpc_timeout: u64,

    pub home_bridge_contract_address: Address,
    pub foreign_bridge_contract_address: Address,
    pub foreign_chain_token_contract_address: Address,

    pub validator_private_key: PrivateKeySource,

    pub home_chain_max_reorg_depth: u64,
    pub foreign_chain_max_reorg_depth: u64,
    #[serde(default)]
    pub home_chain_event_fetch_start_block_number: u64,
    #[serde(default)]
    pub foreign_chain_event_fetch_start_block_number: u64,
    #[serde(default = "default_event_poll_interval")]
    #[validate(range(min = 1))]
    pub home_chain_event_poll_interval: u64,
    #[serde(default = "default_event_poll_interval")]
    #[validate(range(min = 1))]
    pub foreign_chain_event_poll_interval: u64,

    #[serde(default = "default_gas_price")]
    pub home_chain_gas_price: u128,

    #[serde(default = "default_balance_warn_threshold")]
    pub balance_warn_threshold: u128,
    #[serde(default = "default_balance_warn_poll_interval")]
    #[validate(range(min = 1))]
    pub balance_warn_poll_interval: u64,

    /// Consumed by the tracing setup; unknown keys are tolerated.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BridgeConfig {
    pub fn home_rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.home_rpc_timeout)
    }

    pub fn foreign_rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.foreign_rpc_timeout)
    }

    pub fn home_chain_event_poll_interval(&self) -> Duration {
        Duration::from_secs(self.home_chain_event_poll_interval)
    }

    pub fn foreign_chain_event_poll_interval(&self) -> Duration {
        Duration::from_secs(self.foreign_chain_event_poll_interval)
    }

    pub fn balance_warn_poll_interval(&self) -> Duration {
        Duration::from_secs(self.balance_warn_poll_interval)
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// A `tracing_subscriber::EnvFilter` directive, e.g. `"info"` or
    /// `"bridge_confirmation=debug,info"`.
    pub level: Option<String>,
}

fn default_rpc_timeout() -> u64 {
    DEFAULT_RPC_TIMEOUT_SECONDS
}

fn default_event_poll_interval() -> u64 {
    DEFAULT_EVENT_POLL_INTERVAL_SECONDS
}

fn default_gas_price() -> u128 {
    DEFAULT_GAS_PRICE_WEI
}

fn default_balance_warn_threshold() -> u128 {
    DEFAULT_BALANCE_WARN_THRESHOLD_WEI
}

fn default_balance_warn_poll_interval() -> u64 {
    DEFAULT_BALANCE_WARN_POLL_INTERVAL_SECONDS
}
