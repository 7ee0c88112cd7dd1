#[cfg(test)]
#[path = "balance_watcher_test.rs"]
mod balance_watcher_test;

use std::time::Duration;

use alloy_primitives::{Address, U256};
use bridge_base_layer::{BaseLayerError, SharedBaseLayerClient};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum BalanceWatcherError {
    #[error(transparent)]
    BaseLayer(#[from] BaseLayerError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BalanceSignal {
    Low,
    Recovered,
    NoChange,
}

/// One warning per low-balance episode.
#[derive(Debug, Default)]
struct BalanceEpisode {
    warned: bool,
}

impl BalanceEpisode {
    fn observe(&mut self, balance: U256, threshold: U256) -> BalanceSignal {
        if balance < threshold {
            if self.warned {
                return BalanceSignal::NoChange;
            }
            self.warned = true;
            return BalanceSignal::Low;
        }
        if self.warned {
            self.warned = false;
            return BalanceSignal::Recovered;
        }
        BalanceSignal::NoChange
    }
}

/// Watches the validator account balance and warns when it runs low. Purely
/// advisory; never blocks or stops the pipeline.
pub struct ValidatorBalanceWatcher {
    base_layer: SharedBaseLayerClient,
    validator_address: Address,
    poll_interval: Duration,
    balance_warn_threshold: U256,
    cancel: CancellationToken,
    episode: BalanceEpisode,
}

impl ValidatorBalanceWatcher {
    pub fn new(
        base_layer: SharedBaseLayerClient,
        validator_address: Address,
        poll_interval: Duration,
        balance_warn_threshold: U256,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            base_layer,
            validator_address,
            poll_interval,
            balance_warn_threshold,
            cancel,
            episode: BalanceEpisode::default(),
        }
    }

    pub async fn run(mut self) -> Result<(), BalanceWatcherError> {
        loop {
            match self.base_layer.balance(self.validator_address).await {
                Ok(balance) => match self.episode.observe(balance, self.balance_warn_threshold) {
                    BalanceSignal::Low => warn!(
                        "Balance of validator account {} is only {balance} wei, below the \
                         configured threshold of {} wei; top it up to keep confirmations funded",
                        self.validator_address, self.balance_warn_threshold
                    ),
                    BalanceSignal::Recovered => info!(
                        "Balance of validator account {} recovered to {balance} wei",
                        self.validator_address
                    ),
                    BalanceSignal::NoChange => {}
                },
                Err(error) if error.is_transient() => {
                    warn!("Balance check failed, retrying next tick: {error}");
                }
                Err(error) => return Err(error.into()),
            }

            tokio::select! {
                _ = self.cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }
}
