//! Shared types for the bridge validator: the events observed on the two
//! chains and the transfer-hash identity that joins them.

use std::time::Duration;

pub mod events;
pub mod transfer_hash;

pub use events::{BridgeEvent, CompletionEvent, ConfirmationEvent, TransferEvent};
pub use transfer_hash::compute_transfer_hash;

/// Approximate block time of the home chain.
pub const HOME_CHAIN_STEP_DURATION: Duration = Duration::from_secs(5);

/// Upper bound on orderly teardown; exceeding it forces a hard exit.
pub const APPLICATION_CLEANUP_TIMEOUT: Duration = Duration::from_secs(10);
