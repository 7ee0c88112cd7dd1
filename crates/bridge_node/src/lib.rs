//! Assembly of the bridge validator process.

pub mod startup;
pub mod supervisor;
pub mod trace_util;

use std::sync::Arc;

use bridge_base_layer::ethereum::EthereumBaseLayer;
use bridge_base_layer::BaseLayerError;
use bridge_config::{BridgeConfig, ConfigError};
use bridge_confirmation::{PlannerError, SenderError};
use bridge_watcher::balance_watcher::BalanceWatcherError;
use bridge_watcher::status_watcher::StatusWatcherError;
use bridge_watcher::EventFetcherError;
use thiserror::Error;

pub use crate::startup::SetupError;
pub use crate::supervisor::run_with_base_layers;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Setup(#[from] SetupError),
    #[error(transparent)]
    BaseLayer(#[from] BaseLayerError),
    #[error(transparent)]
    EventFetcher(#[from] EventFetcherError),
    #[error(transparent)]
    StatusWatcher(#[from] StatusWatcherError),
    #[error(transparent)]
    BalanceWatcher(#[from] BalanceWatcherError),
    #[error(transparent)]
    Planner(#[from] PlannerError),
    #[error(transparent)]
    Sender(#[from] SenderError),
    #[error("task panicked: {0}")]
    TaskPanicked(String),
}

/// Run the validator against the chains named in `config` until a stop signal
/// or a fatal error.
pub async fn run(config: BridgeConfig) -> Result<(), NodeError> {
    let signer = config.validator_private_key.resolve()?;
    let home_base_layer =
        EthereumBaseLayer::new(config.home_rpc_url.clone(), config.home_rpc_timeout())?;
    let foreign_base_layer =
        EthereumBaseLayer::new(config.foreign_rpc_url.clone(), config.foreign_rpc_timeout())?;
    run_with_base_layers(config, Arc::new(home_base_layer), Arc::new(foreign_base_layer), signer)
        .await
}
