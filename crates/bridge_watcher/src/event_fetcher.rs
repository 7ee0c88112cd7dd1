#[cfg(test)]
#[path = "event_fetcher_test.rs"]
mod event_fetcher_test;

use std::time::Duration;

use alloy_primitives::Address;
use bridge_base_layer::{BaseLayerError, EventDescriptor, EventQuery, SharedBaseLayerClient};
use bridge_types::BridgeEvent;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Give up on a chain whose node keeps rejecting our log queries; anything
/// this persistent (filter too large, pruned range) will not fix itself.
const MAX_CONSECUTIVE_RPC_REJECTIONS: u32 = 10;

#[derive(Debug, Error)]
pub enum EventFetcherError {
    #[error(
        "{chain} chain node rejected log queries {rejections} times in a row, giving up: {message}"
    )]
    FatalRpc { chain: String, rejections: u32, message: String },
    #[error(transparent)]
    BaseLayer(#[from] BaseLayerError),
    #[error("{chain} chain event queue closed")]
    QueueClosed { chain: String },
}

#[derive(Clone, Debug)]
pub struct EventFetcherConfig {
    /// Chain tag used in logs, e.g. `"home"` or `"foreign"`.
    pub chain: String,
    pub contract_address: Address,
    pub descriptors: Vec<EventDescriptor>,
    pub start_block: u64,
    pub max_reorg_depth: u64,
    pub poll_interval: Duration,
}

/// Tails the logs of one contract on one chain and forwards every event from
/// the confirmed window, in `(block_number, log_index)` order.
pub struct EventFetcher {
    config: EventFetcherConfig,
    base_layer: SharedBaseLayerClient,
    events_tx: mpsc::UnboundedSender<BridgeEvent>,
    cancel: CancellationToken,
    /// Next block to fetch from; only advances after a fully delivered window.
    cursor: u64,
    consecutive_rpc_rejections: u32,
}

impl EventFetcher {
    pub fn new(
        config: EventFetcherConfig,
        base_layer: SharedBaseLayerClient,
        events_tx: mpsc::UnboundedSender<BridgeEvent>,
        cancel: CancellationToken,
    ) -> Self {
        let cursor = config.start_block;
        Self { config, base_layer, events_tx, cancel, cursor, consecutive_rpc_rejections: 0 }
    }

    pub async fn run(mut self) -> Result<(), EventFetcherError> {
        info!(
            "Starting {} chain event fetcher for {} at block {}",
            self.config.chain, self.config.contract_address, self.cursor
        );
        loop {
            let made_progress = match self.fetch_tick().await {
                Ok(made_progress) => {
                    self.consecutive_rpc_rejections = 0;
                    made_progress
                }
                Err(error) if error.is_transient() => {
                    self.register_transient_failure(&error)?;
                    false
                }
                Err(error) => return Err(error.into()),
            };
            if self.events_tx.is_closed() {
                return Err(EventFetcherError::QueueClosed { chain: self.config.chain.clone() });
            }
            if !made_progress {
                tokio::select! {
                    _ = self.cancel.cancelled() => return Ok(()),
                    _ = tokio::time::sleep(self.config.poll_interval) => {}
                }
            } else if self.cancel.is_cancelled() {
                return Ok(());
            }
        }
    }

    /// One poll: deliver every event in `[cursor, head - max_reorg_depth]` and
    /// advance the cursor past the window. Returns whether the window was
    /// non-empty. On error the cursor stays put and the window is refetched
    /// in full on the next tick.
    async fn fetch_tick(&mut self) -> Result<bool, BaseLayerError> {
        let head = self.base_layer.block_number().await?;
        let Some(confirmed_head) = head.checked_sub(self.config.max_reorg_depth) else {
            return Ok(false);
        };
        if self.cursor > confirmed_head {
            return Ok(false);
        }

        let mut batch = Vec::new();
        for descriptor in &self.config.descriptors {
            let query = EventQuery {
                contract: self.config.contract_address,
                descriptor: *descriptor,
                from_block: self.cursor,
                to_block: confirmed_head,
            };
            batch.extend(self.base_layer.events(query).await?);
        }
        batch.sort_by_key(|event| (event.block_number(), event.log_index()));

        if !batch.is_empty() {
            debug!(
                "Fetched {} {} chain events in blocks {}..={}",
                batch.len(),
                self.config.chain,
                self.cursor,
                confirmed_head
            );
        }
        for event in batch {
            // A closed queue is handled by the caller on the next iteration.
            if self.events_tx.send(event).is_err() {
                break;
            }
        }
        self.cursor = confirmed_head + 1;
        Ok(true)
    }

    fn register_transient_failure(
        &mut self,
        error: &BaseLayerError,
    ) -> Result<(), EventFetcherError> {
        if error.is_rpc_rejection() {
            self.consecutive_rpc_rejections += 1;
            if self.consecutive_rpc_rejections >= MAX_CONSECUTIVE_RPC_REJECTIONS {
                return Err(EventFetcherError::FatalRpc {
                    chain: self.config.chain.clone(),
                    rejections: self.consecutive_rpc_rejections,
                    message: error.to_string(),
                });
            }
        }
        warn!(
            "Fetching {} chain events failed, retrying next tick: {}",
            self.config.chain, error
        );
        Ok(())
    }
}
