use alloy::transports::{RpcError, TransportErrorKind};
use alloy_primitives::B256;
use thiserror::Error;

pub type BaseLayerResult<T> = Result<T, BaseLayerError>;

#[derive(Debug, Error)]
pub enum BaseLayerError {
    /// Network-level failure: timeout, connection refused, 5xx. Retryable.
    #[error("transport error: {0}")]
    Transport(String),
    /// The node accepted the request but answered with an error. Retryable;
    /// callers that see these persistently should give up.
    #[error("RPC error response: {0}")]
    Rpc(String),
    /// The node already holds this exact transaction in its pool or chain.
    #[error("transaction {transaction_hash} is already known to the node")]
    KnownTransaction { transaction_hash: B256 },
    #[error("contract interaction failed: {0}")]
    Contract(String),
    #[error("malformed log: {0}")]
    MalformedLog(String),
}

impl BaseLayerError {
    pub fn is_transient(&self) -> bool {
        // No catch-all: adding a variant forces a retry-policy decision.
        match self {
            BaseLayerError::Transport(_) | BaseLayerError::Rpc(_) => true,
            BaseLayerError::KnownTransaction { .. }
            | BaseLayerError::Contract(_)
            | BaseLayerError::MalformedLog(_) => false,
        }
    }

    /// Whether the node answered (as opposed to the network failing). Used by
    /// the event fetcher to count persistent rejections towards fatality.
    pub fn is_rpc_rejection(&self) -> bool {
        matches!(self, BaseLayerError::Rpc(_))
    }
}

impl From<RpcError<TransportErrorKind>> for BaseLayerError {
    fn from(error: RpcError<TransportErrorKind>) -> Self {
        match error {
            RpcError::Transport(kind) => BaseLayerError::Transport(kind.to_string()),
            RpcError::ErrorResp(payload) => BaseLayerError::Rpc(payload.to_string()),
            other => BaseLayerError::Rpc(other.to_string()),
        }
    }
}

impl From<alloy::contract::Error> for BaseLayerError {
    fn from(error: alloy::contract::Error) -> Self {
        match error {
            alloy::contract::Error::TransportError(rpc_error) => rpc_error.into(),
            other => BaseLayerError::Contract(other.to_string()),
        }
    }
}

/// Substrings nodes use to report a resubmitted transaction they already hold.
const KNOWN_TRANSACTION_MARKERS: &[&str] =
    &["known transaction", "already known", "already imported"];

pub(crate) fn classify_send_error(
    transaction_hash: B256,
    error: RpcError<TransportErrorKind>,
) -> BaseLayerError {
    if let RpcError::ErrorResp(payload) = &error {
        let message = payload.message.to_lowercase();
        if KNOWN_TRANSACTION_MARKERS.iter().any(|marker| message.contains(marker)) {
            return BaseLayerError::KnownTransaction { transaction_hash };
        }
    }
    error.into()
}
