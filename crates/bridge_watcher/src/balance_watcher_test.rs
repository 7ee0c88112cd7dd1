use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{address, Address, U256};
use bridge_base_layer::MockBaseLayerClient;
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;
use tracing_test::traced_test;

use super::{BalanceEpisode, BalanceSignal, ValidatorBalanceWatcher};

const VALIDATOR_ADDRESS: Address = address!("90F79bf6EB2c4f870365E785982E1f101E93b906");
const POLL_INTERVAL: Duration = Duration::from_secs(60);

#[test]
fn warns_once_per_low_balance_episode() {
    let threshold = U256::from(100);
    let mut episode = BalanceEpisode::default();

    assert_eq!(episode.observe(U256::from(7), threshold), BalanceSignal::Low);
    assert_eq!(episode.observe(U256::from(8), threshold), BalanceSignal::NoChange);
    assert_eq!(episode.observe(U256::from(500), threshold), BalanceSignal::Recovered);
    assert_eq!(episode.observe(U256::from(500), threshold), BalanceSignal::NoChange);
    assert_eq!(episode.observe(U256::from(9), threshold), BalanceSignal::Low);
}

#[test]
fn balance_at_the_threshold_is_sufficient() {
    let threshold = U256::from(100);
    let mut episode = BalanceEpisode::default();
    assert_eq!(episode.observe(U256::from(100), threshold), BalanceSignal::NoChange);
}

#[traced_test]
#[tokio::test(start_paused = true)]
async fn low_balance_is_logged_as_a_warning() {
    let recovered = Arc::new(AtomicBool::new(false));
    let mut mock = MockBaseLayerClient::new();
    {
        let recovered = recovered.clone();
        mock.expect_balance().returning(move |_| {
            if recovered.load(Ordering::SeqCst) {
                Ok(U256::from(1_000_000))
            } else {
                Ok(U256::from(1))
            }
        });
    }
    let cancel = CancellationToken::new();
    let watcher = ValidatorBalanceWatcher::new(
        Arc::new(mock),
        VALIDATOR_ADDRESS,
        POLL_INTERVAL,
        U256::from(1_000),
        cancel.clone(),
    );
    let handle = tokio::spawn(watcher.run());

    tokio::time::sleep(3 * POLL_INTERVAL).await;
    assert!(logs_contain("below the configured threshold"));

    recovered.store(true, Ordering::SeqCst);
    tokio::time::sleep(2 * POLL_INTERVAL).await;
    assert!(logs_contain("recovered"));

    cancel.cancel();
    handle.await.expect("watcher task panicked").expect("watcher should exit cleanly");
}
