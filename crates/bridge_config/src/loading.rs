#[cfg(test)]
#[path = "loading_test.rs"]
mod loading_test;

use std::path::{Path, PathBuf};

use thiserror::Error;
use validator::Validate;

use crate::BridgeConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),
    #[error("invalid validator private key: {0}")]
    PrivateKey(String),
    #[error("cannot use keystore {path}: {reason}")]
    Keystore { path: PathBuf, reason: String },
}

/// The scalar keys an environment variable of the same uppercased name may
/// override.
const OVERRIDABLE_KEYS: &[&str] = &[
    "home_rpc_url",
    "home_rpc_timeout",
    "foreign_rpc_url",
    "foreign_rpc_timeout",
    "home_bridge_contract_address",
    "foreign_bridge_contract_address",
    "foreign_chain_token_contract_address",
    "validator_private_key",
    "home_chain_max_reorg_depth",
    "foreign_chain_max_reorg_depth",
    "home_chain_event_fetch_start_block_number",
    "foreign_chain_event_fetch_start_block_number",
    "home_chain_event_poll_interval",
    "foreign_chain_event_poll_interval",
    "home_chain_gas_price",
    "balance_warn_threshold",
    "balance_warn_poll_interval",
];

/// Load the configuration from `path` (or from the environment alone when no
/// path is given), apply environment overrides, and validate.
pub fn load_config(path: Option<&Path>) -> Result<BridgeConfig, ConfigError> {
    load_config_with_lookup(path, |key| std::env::var(key).ok())
}

fn load_config_with_lookup(
    path: Option<&Path>,
    env_lookup: impl Fn(&str) -> Option<String>,
) -> Result<BridgeConfig, ConfigError> {
    let mut table = match path {
        Some(path) => std::fs::read_to_string(path)?.parse::<toml::Table>()?,
        None => toml::Table::new(),
    };
    apply_env_overrides(&mut table, env_lookup);
    let config: BridgeConfig = table.try_into()?;
    config.validate()?;
    Ok(config)
}

fn apply_env_overrides(table: &mut toml::Table, env_lookup: impl Fn(&str) -> Option<String>) {
    for key in OVERRIDABLE_KEYS {
        if let Some(raw_value) = env_lookup(&key.to_uppercase()) {
            table.insert((*key).to_owned(), parse_env_value(&raw_value));
        }
    }
}

/// Environment values are untyped strings; recover TOML integers and booleans,
/// leave everything else (URLs, addresses, keys) as strings.
fn parse_env_value(raw_value: &str) -> toml::Value {
    if let Ok(integer) = raw_value.parse::<i64>() {
        return toml::Value::Integer(integer);
    }
    if let Ok(boolean) = raw_value.parse::<bool>() {
        return toml::Value::Boolean(boolean);
    }
    toml::Value::String(raw_value.to_owned())
}
