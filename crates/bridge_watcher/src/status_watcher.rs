#[cfg(test)]
#[path = "status_watcher_test.rs"]
mod status_watcher_test;

use std::time::Duration;

use alloy_primitives::Address;
use bridge_base_layer::{BaseLayerError, SharedBaseLayerClient};
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum StatusWatcherError {
    #[error(transparent)]
    BaseLayer(#[from] BaseLayerError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ValidatorStatus {
    Unknown,
    Active,
}

/// Polls validator-set membership and drives the pipeline's activation.
///
/// Joining the set flips the activation signal the planner gates on; leaving
/// it stops the whole process, since a removed validator must not submit
/// further confirmations. The fetchers keep running until then so the home
/// backlog is available the moment activation happens.
pub struct ValidatorStatusWatcher {
    base_layer: SharedBaseLayerClient,
    validator_proxy_address: Address,
    validator_address: Address,
    poll_interval: Duration,
    activation_tx: watch::Sender<bool>,
    cancel: CancellationToken,
    status: ValidatorStatus,
    announced_waiting: bool,
}

impl ValidatorStatusWatcher {
    pub fn new(
        base_layer: SharedBaseLayerClient,
        validator_proxy_address: Address,
        validator_address: Address,
        poll_interval: Duration,
        activation_tx: watch::Sender<bool>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            base_layer,
            validator_proxy_address,
            validator_address,
            poll_interval,
            activation_tx,
            cancel,
            status: ValidatorStatus::Unknown,
            announced_waiting: false,
        }
    }

    pub async fn run(mut self) -> Result<(), StatusWatcherError> {
        loop {
            match self
                .base_layer
                .is_validator(self.validator_proxy_address, self.validator_address)
                .await
            {
                Ok(true) => {
                    if self.status == ValidatorStatus::Unknown {
                        info!(
                            "Account {} is a member of the validator set, starting to validate",
                            self.validator_address
                        );
                        self.status = ValidatorStatus::Active;
                        if self.activation_tx.send(true).is_err() {
                            // The planner is gone; the process is on its way down.
                            return Ok(());
                        }
                    }
                }
                Ok(false) => match self.status {
                    ValidatorStatus::Unknown => {
                        if !self.announced_waiting {
                            info!(
                                "Account {} is not (yet) a member of the validator set, waiting",
                                self.validator_address
                            );
                            self.announced_waiting = true;
                        }
                    }
                    ValidatorStatus::Active => {
                        warn!(
                            "Account {} has been removed from the validator set, stopping",
                            self.validator_address
                        );
                        self.cancel.cancel();
                        return Ok(());
                    }
                },
                Err(error) if error.is_transient() => {
                    warn!("Validator status check failed, retrying next tick: {error}");
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
