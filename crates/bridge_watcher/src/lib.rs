//! The watcher tasks of the validator: log tailing with reorg tolerance,
//! validator-set membership, and account balance.

pub mod balance_watcher;
pub mod event_fetcher;
pub mod status_watcher;

pub use balance_watcher::ValidatorBalanceWatcher;
pub use event_fetcher::{EventFetcher, EventFetcherConfig, EventFetcherError};
pub use status_watcher::ValidatorStatusWatcher;
