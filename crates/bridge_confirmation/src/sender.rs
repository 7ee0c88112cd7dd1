#[cfg(test)]
#[path = "sender_test.rs"]
mod sender_test;

use alloy::eips::eip2718::Encodable2718;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::sol_types::SolCall;
use alloy_primitives::{Address, Bytes, B256, U256};
use bridge_base_layer::contracts::HomeBridge;
use bridge_base_layer::{BaseLayerError, SharedBaseLayerClient};
use bridge_types::{TransferEvent, HOME_CHAIN_STEP_DURATION};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Fixed gas limit for `confirmTransfer`. The quorum-reaching call also
/// performs the transfer itself, so this carries generous headroom over the
/// plain record-keeping case.
const CONFIRMATION_GAS_LIMIT: u64 = 500_000;

/// How many home chain steps to wait for a receipt before resubmitting, in
/// units of `max_reorg_depth`.
const RECEIPT_GRACE_FACTOR: u64 = 10;

#[derive(Debug, Error)]
pub enum SenderError {
    /// The observed transfer contradicts the configuration; submitting would
    /// waste gas or credit the wrong party on the wrong bridge.
    #[error("transfer failed sanity check: {reason}")]
    SanityCheckFailed { reason: String },
    #[error("failed to sign confirmation transaction: {0}")]
    Signing(String),
    #[error(transparent)]
    BaseLayer(#[from] BaseLayerError),
}

/// Checks that a transfer handed to the sender is one this bridge is actually
/// responsible for. A mismatch means the pipeline is fed from a wrong chain
/// or contract.
#[derive(Clone, Copy, Debug)]
pub struct TransferSanityCheck {
    pub foreign_token_address: Address,
    pub foreign_bridge_address: Address,
}

impl TransferSanityCheck {
    pub fn check(&self, event: &TransferEvent) -> Result<(), SenderError> {
        if event.token_address != self.foreign_token_address {
            return Err(SenderError::SanityCheckFailed {
                reason: format!(
                    "transfer was emitted by {} instead of the configured token contract {}",
                    event.token_address, self.foreign_token_address
                ),
            });
        }
        if event.recipient != self.foreign_bridge_address {
            return Err(SenderError::SanityCheckFailed {
                reason: format!(
                    "transfer went to {} instead of the configured foreign bridge {}",
                    event.recipient, self.foreign_bridge_address
                ),
            });
        }
        if event.value.is_zero() {
            return Err(SenderError::SanityCheckFailed {
                reason: "transfer of zero value".to_owned(),
            });
        }
        Ok(())
    }
}

/// A signed, submitted confirmation transaction awaiting burial.
///
/// `raw` keeps the signed payload so a resubmission after a mempool drop is
/// byte-identical: same nonce, same content, idempotent on the node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingTransaction {
    pub transaction_hash: B256,
    pub nonce: u64,
    pub transfer_hash: B256,
    pub raw: Bytes,
    pub submitted_at_block: u64,
}

#[derive(Clone, Debug)]
pub struct ConfirmationSenderConfig {
    pub home_bridge_address: Address,
    pub gas_price: u128,
    pub max_reorg_depth: u64,
    pub sanity_check: TransferSanityCheck,
}

/// Signs and submits one confirmation transaction per planned transfer and
/// tracks each submission until it is buried below the reorg window.
pub struct ConfirmationSender {
    config: ConfirmationSenderConfig,
    base_layer: SharedBaseLayerClient,
    wallet: EthereumWallet,
    validator_address: Address,
    chain_id: u64,
    next_nonce: u64,
    tasks_rx: mpsc::UnboundedReceiver<TransferEvent>,
    cancel: CancellationToken,
}

impl ConfirmationSender {
    /// The starting nonce is the account's current transaction count; from
    /// there on nonces are assigned locally, strictly sequentially.
    pub async fn new(
        config: ConfirmationSenderConfig,
        base_layer: SharedBaseLayerClient,
        signer: PrivateKeySigner,
        tasks_rx: mpsc::UnboundedReceiver<TransferEvent>,
        cancel: CancellationToken,
    ) -> Result<Self, SenderError> {
        let validator_address = signer.address();
        let chain_id = base_layer.chain_id().await?;
        let next_nonce = base_layer.transaction_count(validator_address).await?;
        debug!(
            "Confirmation sender for {validator_address} starting at nonce {next_nonce} on chain \
             {chain_id}"
        );
        Ok(Self {
            config,
            base_layer,
            wallet: EthereumWallet::from(signer),
            validator_address,
            chain_id,
            next_nonce,
            tasks_rx,
            cancel,
        })
    }

    pub fn validator_address(&self) -> Address {
        self.validator_address
    }

    pub async fn run(self) -> Result<(), SenderError> {
        let (pending_tx, pending_rx) = mpsc::unbounded_channel();
        let submitter = TransactionSubmitter {
            config: self.config.clone(),
            base_layer: self.base_layer.clone(),
            wallet: self.wallet,
            chain_id: self.chain_id,
            next_nonce: self.next_nonce,
            tasks_rx: self.tasks_rx,
            pending_tx,
            cancel: self.cancel.clone(),
        };
        let watcher = PendingTransactionWatcher {
            base_layer: self.base_layer,
            max_reorg_depth: self.config.max_reorg_depth,
            pending_rx,
            cancel: self.cancel,
        };
        tokio::try_join!(submitter.run(), watcher.run())?;
        Ok(())
    }
}

/// The build half: dequeue a task, sign, submit, hand over for watching.
struct TransactionSubmitter {
    config: ConfirmationSenderConfig,
    base_layer: SharedBaseLayerClient,
    wallet: EthereumWallet,
    chain_id: u64,
    next_nonce: u64,
    tasks_rx: mpsc::UnboundedReceiver<TransferEvent>,
    pending_tx: mpsc::UnboundedSender<PendingTransaction>,
    cancel: CancellationToken,
}

impl TransactionSubmitter {
    async fn run(mut self) -> Result<(), SenderError> {
        loop {
            // New tasks are only accepted here; an in-flight build below runs
            // to completion even if the stop signal fires meanwhile.
            let event = tokio::select! {
                _ = self.cancel.cancelled() => return Ok(()),
                maybe_event = self.tasks_rx.recv() => match maybe_event {
                    Some(event) => event,
                    None => return Ok(()),
                },
            };
            self.config.sanity_check.check(&event)?;
            let Some(pending) = self.submit_confirmation(event).await? else {
                return Ok(());
            };
            if self.pending_tx.send(pending).is_err() {
                // The watcher is gone; the process is on its way down.
                return Ok(());
            }
        }
    }

    /// Sign and submit a confirmation for `event`. Returns `None` when the
    /// stop signal interrupted a submission retry.
    async fn submit_confirmation(
        &mut self,
        event: TransferEvent,
    ) -> Result<Option<PendingTransaction>, SenderError> {
        let transfer_hash = event.transfer_hash();
        let nonce = self.next_nonce;
        let raw = self.prepare_confirmation_transaction(&event, nonce).await?;
        info!(
            "Sending confirmation transaction for transfer {transfer_hash} with nonce {nonce}"
        );

        let mut submitted_at_block = None;
        let transaction_hash = loop {
            if submitted_at_block.is_none() {
                submitted_at_block = match self.base_layer.block_number().await {
                    Ok(head) => Some(head),
                    Err(error) if error.is_transient() => {
                        warn!("Reading the head block failed, retrying: {error}");
                        if !self.pause_before_retry().await {
                            return Ok(None);
                        }
                        continue;
                    }
                    Err(error) => return Err(error.into()),
                };
            }
            match self.base_layer.send_raw_transaction(raw.clone()).await {
                Ok(transaction_hash) => break transaction_hash,
                // The node already has this transaction; the nonce is spent
                // and the confirmation is on its way.
                Err(BaseLayerError::KnownTransaction { transaction_hash }) => {
                    debug!("Confirmation transaction {transaction_hash} was already known");
                    break transaction_hash;
                }
                Err(error) if error.is_transient() => {
                    warn!("Submitting confirmation transaction failed, retrying: {error}");
                    if !self.pause_before_retry().await {
                        return Ok(None);
                    }
                }
                Err(error) => return Err(error.into()),
            }
        };

        self.next_nonce += 1;
        Ok(Some(PendingTransaction {
            transaction_hash,
            nonce,
            transfer_hash,
            raw,
            submitted_at_block: submitted_at_block.unwrap_or_default(),
        }))
    }

    async fn prepare_confirmation_transaction(
        &self,
        event: &TransferEvent,
        nonce: u64,
    ) -> Result<Bytes, SenderError> {
        let call = HomeBridge::confirmTransferCall {
            transferHash: event.transfer_hash(),
            transactionHash: event.transaction_hash,
            amount: event.value,
            // The foreign-chain sender receives the minted home asset.
            recipient: event.sender,
        };
        let request = TransactionRequest::default()
            .with_to(self.config.home_bridge_address)
            .with_input(call.abi_encode())
            .with_nonce(nonce)
            .with_chain_id(self.chain_id)
            .with_gas_price(self.config.gas_price)
            .with_gas_limit(CONFIRMATION_GAS_LIMIT)
            .with_value(U256::ZERO);
        let envelope = request
            .build(&self.wallet)
            .await
            .map_err(|error| SenderError::Signing(error.to_string()))?;
        Ok(envelope.encoded_2718().into())
    }

    /// Returns false when the stop signal fired during the pause.
    async fn pause_before_retry(&self) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(HOME_CHAIN_STEP_DURATION) => true,
        }
    }
}

/// The watch half: polls the oldest submission until its receipt is buried
/// `max_reorg_depth` blocks deep, resubmitting the identical payload when the
/// transaction seems to have been dropped from the mempool.
struct PendingTransactionWatcher {
    base_layer: SharedBaseLayerClient,
    max_reorg_depth: u64,
    pending_rx: mpsc::UnboundedReceiver<PendingTransaction>,
    cancel: CancellationToken,
}

impl PendingTransactionWatcher {
    async fn run(mut self) -> Result<(), SenderError> {
        loop {
            let pending = tokio::select! {
                _ = self.cancel.cancelled() => return Ok(()),
                maybe_pending = self.pending_rx.recv() => match maybe_pending {
                    Some(pending) => pending,
                    None => return Ok(()),
                },
            };
            if !self.track_until_buried(pending).await? {
                return Ok(());
            }
        }
    }

    /// Returns false when the stop signal interrupted the watch; the pending
    /// queue is intentionally left behind, a restart re-derives it on chain.
    async fn track_until_buried(
        &mut self,
        mut pending: PendingTransaction,
    ) -> Result<bool, SenderError> {
        let grace_blocks = RECEIPT_GRACE_FACTOR * self.max_reorg_depth;
        loop {
            match self.check_once(&mut pending, grace_blocks).await {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(error) if error.is_transient() => {
                    warn!("Watching confirmation transaction failed, retrying: {error}");
                }
                Err(error) => return Err(error.into()),
            }
            tokio::select! {
                _ = self.cancel.cancelled() => return Ok(false),
                _ = tokio::time::sleep(HOME_CHAIN_STEP_DURATION) => {}
            }
        }
    }

    /// One poll of the pending transaction. Returns whether it is buried.
    async fn check_once(
        &self,
        pending: &mut PendingTransaction,
        grace_blocks: u64,
    ) -> Result<bool, BaseLayerError> {
        let head = self.base_layer.block_number().await?;
        match self.base_layer.transaction_receipt(pending.transaction_hash).await? {
            Some(receipt) => {
                if head >= receipt.block_number + self.max_reorg_depth {
                    info!("Transaction confirmed: {}", pending.transaction_hash);
                    return Ok(true);
                }
                debug!(
                    "Transaction {} included in block {}, waiting for burial at head {head}",
                    pending.transaction_hash, receipt.block_number
                );
            }
            None => {
                if head >= pending.submitted_at_block + grace_blocks {
                    warn!(
                        "Confirmation transaction {} has no receipt {grace_blocks} blocks after \
                         submission, resubmitting",
                        pending.transaction_hash
                    );
                    match self.base_layer.send_raw_transaction(pending.raw.clone()).await {
                        Ok(_) | Err(BaseLayerError::KnownTransaction { .. }) => {
                            pending.submitted_at_block = head;
                        }
                        Err(error) if error.is_transient() => {
                            warn!("Resubmission failed, retrying: {error}");
                        }
                        Err(error) => return Err(error),
                    }
                }
            }
        }
        Ok(false)
    }
}
