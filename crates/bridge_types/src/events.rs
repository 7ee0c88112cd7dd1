use alloy_primitives::{Address, B256, U256};

use crate::transfer_hash::compute_transfer_hash;

/// A token transfer into the foreign bridge account, observed on the foreign
/// chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferEvent {
    pub sender: Address,
    pub recipient: Address,
    pub value: U256,
    pub transaction_hash: B256,
    pub log_index: u64,
    pub block_number: u64,
    pub block_hash: B256,
    /// The contract that emitted the event. Checked against the configured
    /// token address before a confirmation is submitted.
    pub token_address: Address,
}

impl TransferEvent {
    pub fn transfer_hash(&self) -> B256 {
        compute_transfer_hash(self.transaction_hash, self.log_index)
    }
}

/// A `Confirmation` event on the home bridge, emitted once a validator has
/// confirmed a transfer. Fetched filtered to this validator's address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfirmationEvent {
    pub transfer_hash: B256,
    pub transaction_hash: B256,
    pub amount: U256,
    pub recipient: Address,
    pub validator: Address,
    pub block_number: u64,
    pub log_index: u64,
}

/// A `Completion` event on the home bridge: quorum was reached for the
/// transfer hash and no further confirmations are needed from anyone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletionEvent {
    pub transfer_hash: B256,
    pub block_number: u64,
    pub log_index: u64,
}

/// Any event a fetcher can deliver, ordered by `(block_number, log_index)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BridgeEvent {
    Transfer(TransferEvent),
    Confirmation(ConfirmationEvent),
    Completion(CompletionEvent),
}

impl BridgeEvent {
    pub fn block_number(&self) -> u64 {
        match self {
            BridgeEvent::Transfer(event) => event.block_number,
            BridgeEvent::Confirmation(event) => event.block_number,
            BridgeEvent::Completion(event) => event.block_number,
        }
    }

    pub fn log_index(&self) -> u64 {
        match self {
            BridgeEvent::Transfer(event) => event.log_index,
            BridgeEvent::Confirmation(event) => event.log_index,
            BridgeEvent::Completion(event) => event.log_index,
        }
    }
}
