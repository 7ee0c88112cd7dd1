//! Access to the two chains the validator talks to.
//!
//! [`BaseLayerClient`] is the narrow RPC surface the pipeline consumes; the
//! [`ethereum::EthereumBaseLayer`] implementation backs it with an alloy HTTP
//! provider. One client instance is shared per chain; all calls are stateless
//! reads or raw submissions, so concurrent use needs no locking.

pub mod contracts;
pub mod errors;
pub mod ethereum;
pub mod event_filters;
#[cfg(any(feature = "testing", test))]
pub mod test_utils;

use std::sync::Arc;

use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use mockall::automock;

pub use crate::errors::{BaseLayerError, BaseLayerResult};
pub use crate::event_filters::{EventDescriptor, EventQuery};

/// The part of a transaction receipt the pipeline cares about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransactionReceiptInfo {
    pub block_number: u64,
}

#[automock]
#[async_trait]
pub trait BaseLayerClient: Send + Sync {
    /// Current head block number.
    async fn block_number(&self) -> BaseLayerResult<u64>;

    /// Fetch and decode the logs matching `query` over its inclusive block
    /// range.
    async fn events(&self, query: EventQuery) -> BaseLayerResult<Vec<bridge_types::BridgeEvent>>;

    /// Submit a signed raw transaction, returning its hash.
    async fn send_raw_transaction(&self, raw: Bytes) -> BaseLayerResult<B256>;

    /// Receipt of a transaction, or `None` while it is not yet included.
    async fn transaction_receipt(
        &self,
        transaction_hash: B256,
    ) -> BaseLayerResult<Option<TransactionReceiptInfo>>;

    async fn balance(&self, address: Address) -> BaseLayerResult<U256>;

    /// Number of transactions ever sent from `address`; the next usable nonce.
    async fn transaction_count(&self, address: Address) -> BaseLayerResult<u64>;

    async fn chain_id(&self) -> BaseLayerResult<u64>;

    /// Whether any contract code is deployed at `address`.
    async fn has_code(&self, address: Address) -> BaseLayerResult<bool>;

    /// The validator proxy contract the home bridge at `home_bridge` points to.
    async fn validator_proxy_address(&self, home_bridge: Address) -> BaseLayerResult<Address>;

    /// Whether `validator` is a member of the validator set kept by the proxy
    /// contract at `validator_proxy`.
    async fn is_validator(
        &self,
        validator_proxy: Address,
        validator: Address,
    ) -> BaseLayerResult<bool>;
}

pub type SharedBaseLayerClient = Arc<dyn BaseLayerClient>;
