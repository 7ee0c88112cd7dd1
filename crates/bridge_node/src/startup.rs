#[cfg(test)]
#[path = "startup_test.rs"]
mod startup_test;

use alloy_primitives::{Address, U256};
use bridge_base_layer::SharedBaseLayerClient;
use bridge_config::BridgeConfig;
use thiserror::Error;
use tracing::debug;

use crate::NodeError;

#[derive(Debug, Error)]
pub enum SetupError {
    #[error(
        "the {name} contract at {address} does not exist or holds no code; check the configured \
         addresses and chain endpoints"
    )]
    ContractMissing { name: &'static str, address: Address },
    #[error(
        "the balance of the validator account {address} on the home chain is only {balance} wei, \
         but at least {threshold} wei are required; either fund the account or configure a lower \
         'balance_warn_threshold'"
    )]
    InsufficientBalance { address: Address, balance: U256, threshold: U256 },
}

/// Verify that every contract the validator relies on is actually deployed.
/// Returns the validator proxy address the home bridge points to.
pub(crate) async fn validate_contracts(
    home_base_layer: &SharedBaseLayerClient,
    foreign_base_layer: &SharedBaseLayerClient,
    config: &BridgeConfig,
) -> Result<Address, NodeError> {
    ensure_deployed(home_base_layer, config.home_bridge_contract_address, "home bridge").await?;
    let validator_proxy_address =
        home_base_layer.validator_proxy_address(config.home_bridge_contract_address).await?;
    // A home bridge pointing at a dead proxy is a serious bridge setup error.
    ensure_deployed(
        home_base_layer,
        validator_proxy_address,
        "validator proxy (pointed to by the home bridge)",
    )
    .await?;
    ensure_deployed(
        foreign_base_layer,
        config.foreign_chain_token_contract_address,
        "foreign token",
    )
    .await?;
    debug!("All bridge contracts are deployed; validator proxy at {validator_proxy_address}");
    Ok(validator_proxy_address)
}

/// Refuse to start with an account that cannot pay for confirmations.
pub(crate) async fn check_validator_balance(
    home_base_layer: &SharedBaseLayerClient,
    validator_address: Address,
    threshold: U256,
) -> Result<(), NodeError> {
    let balance = home_base_layer.balance(validator_address).await?;
    if balance < threshold {
        return Err(SetupError::InsufficientBalance {
            address: validator_address,
            balance,
            threshold,
        }
        .into());
    }
    Ok(())
}

async fn ensure_deployed(
    base_layer: &SharedBaseLayerClient,
    address: Address,
    name: &'static str,
) -> Result<(), NodeError> {
    if !base_layer.has_code(address).await? {
        return Err(SetupError::ContractMissing { name, address }.into());
    }
    Ok(())
}
