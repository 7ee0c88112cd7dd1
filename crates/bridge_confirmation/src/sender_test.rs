use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::signers::local::PrivateKeySigner;
use alloy_primitives::{address, keccak256, Address, Bytes, B256, U256};
use assert_matches::assert_matches;
use bridge_base_layer::test_utils::FakeBaseLayer;
use bridge_base_layer::{
    BaseLayerError, MockBaseLayerClient, SharedBaseLayerClient, TransactionReceiptInfo,
};
use bridge_types::{compute_transfer_hash, TransferEvent};
use pretty_assertions::assert_eq;
use rstest::rstest;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_test::traced_test;

use super::{
    ConfirmationSender, ConfirmationSenderConfig, SenderError, TransferSanityCheck,
};

const HOME_BRIDGE_ADDRESS: Address = address!("b8a6c7c04958d0299e82e4530737fc4a5ad2a4aa");
const FOREIGN_BRIDGE_ADDRESS: Address = address!("2946259E0334f33A064106302415aD3391BeD384");
const TOKEN_ADDRESS: Address = address!("F2E246BB76DF876Cef8b38ae84130F4F55De395b");
const SENDER_ADDRESS: Address = address!("7E5F4552091A69125d5DfCb7b8C2659029395Bdf");
const TRANSACTION_HASH: B256 =
    alloy_primitives::b256!("66ba278660204ddd43f350e9110a8339fd32a227354429744456aac63ff9ef6f");

const GAS_PRICE: u128 = 15;
const MAX_REORG_DEPTH: u64 = 5;
const CHAIN_ID: u64 = 123;

fn validator_signer() -> PrivateKeySigner {
    PrivateKeySigner::from_bytes(&B256::with_last_byte(2)).expect("static test key is valid")
}

fn sender_config() -> ConfirmationSenderConfig {
    ConfirmationSenderConfig {
        home_bridge_address: HOME_BRIDGE_ADDRESS,
        gas_price: GAS_PRICE,
        max_reorg_depth: MAX_REORG_DEPTH,
        sanity_check: TransferSanityCheck {
            foreign_token_address: TOKEN_ADDRESS,
            foreign_bridge_address: FOREIGN_BRIDGE_ADDRESS,
        },
    }
}

fn transfer_event() -> TransferEvent {
    TransferEvent {
        sender: SENDER_ADDRESS,
        recipient: FOREIGN_BRIDGE_ADDRESS,
        value: U256::from(1),
        transaction_hash: TRANSACTION_HASH,
        log_index: 5,
        block_number: 3,
        block_hash: B256::with_last_byte(0xf8),
        token_address: TOKEN_ADDRESS,
    }
}

fn numbered_transfer_event(index: u64) -> TransferEvent {
    TransferEvent {
        transaction_hash: keccak256(index.to_be_bytes()),
        ..transfer_event()
    }
}

async fn spawn_sender(
    base_layer: SharedBaseLayerClient,
    cancel: CancellationToken,
) -> (mpsc::UnboundedSender<TransferEvent>, tokio::task::JoinHandle<Result<(), SenderError>>) {
    let (tasks_tx, tasks_rx) = mpsc::unbounded_channel();
    let sender = ConfirmationSender::new(
        sender_config(),
        base_layer,
        validator_signer(),
        tasks_rx,
        cancel,
    )
    .await
    .expect("sender setup against a reachable chain should succeed");
    (tasks_tx, tokio::spawn(sender.run()))
}

/// Poll `condition` under the paused clock until it holds.
async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..1_000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    panic!("condition not reached in time");
}

#[rstest]
#[case::wrong_token(TransferEvent { token_address: HOME_BRIDGE_ADDRESS, ..transfer_event() })]
#[case::wrong_bridge(TransferEvent { recipient: SENDER_ADDRESS, ..transfer_event() })]
#[case::zero_value(TransferEvent { value: U256::ZERO, ..transfer_event() })]
fn sanity_check_rejects_foreign_chain_mixups(#[case] event: TransferEvent) {
    let result = sender_config().sanity_check.check(&event);
    assert_matches!(result, Err(SenderError::SanityCheckFailed { .. }));
}

#[test]
fn sanity_check_accepts_the_configured_transfer_shape() {
    sender_config().sanity_check.check(&transfer_event()).expect("transfer should pass");
}

#[tokio::test(start_paused = true)]
async fn submits_the_confirm_transfer_call_described_by_the_transfer() {
    let fake = Arc::new(FakeBaseLayer::new(CHAIN_ID));
    fake.set_head(100);
    let cancel = CancellationToken::new();
    let (tasks_tx, handle) = spawn_sender(fake.clone(), cancel.clone()).await;

    tasks_tx.send(transfer_event()).expect("task queue open");
    wait_until(|| !fake.submissions().is_empty()).await;

    let submission = fake.submissions().remove(0);
    assert_eq!(submission.to, HOME_BRIDGE_ADDRESS);
    assert_eq!(submission.nonce, 0);
    assert_eq!(submission.gas_price, GAS_PRICE);
    assert_eq!(submission.value, U256::ZERO);
    assert_eq!(submission.transfer_hash, compute_transfer_hash(TRANSACTION_HASH, 5));
    assert_eq!(submission.transaction_hash, TRANSACTION_HASH);
    assert_eq!(submission.amount, U256::from(1));
    // The foreign-chain sender is credited on the home chain.
    assert_eq!(submission.recipient, SENDER_ADDRESS);

    cancel.cancel();
    handle.await.expect("sender task panicked").expect("sender should exit cleanly");
}

#[tokio::test(start_paused = true)]
async fn assigns_strictly_increasing_nonces_from_the_account_nonce() {
    let fake = Arc::new(FakeBaseLayer::new(CHAIN_ID));
    fake.set_head(100);
    fake.set_transaction_count(validator_signer().address(), 7);
    let cancel = CancellationToken::new();
    let (tasks_tx, handle) = spawn_sender(fake.clone(), cancel.clone()).await;

    for index in 0..10 {
        tasks_tx.send(numbered_transfer_event(index)).expect("task queue open");
    }
    wait_until(|| fake.submissions().len() == 10).await;

    let nonces: Vec<u64> = fake.submissions().iter().map(|submission| submission.nonce).collect();
    assert_eq!(nonces, (7..17).collect::<Vec<u64>>());

    cancel.cancel();
    handle.await.expect("sender task panicked").expect("sender should exit cleanly");
}

#[tokio::test(start_paused = true)]
async fn a_sanity_check_failure_is_fatal() {
    let fake = Arc::new(FakeBaseLayer::new(CHAIN_ID));
    let cancel = CancellationToken::new();
    let (tasks_tx, handle) = spawn_sender(fake.clone(), cancel).await;

    let foreign_event =
        TransferEvent { token_address: HOME_BRIDGE_ADDRESS, ..transfer_event() };
    tasks_tx.send(foreign_event).expect("task queue open");

    let result = handle.await.expect("sender task panicked");
    assert_matches!(result, Err(SenderError::SanityCheckFailed { .. }));
    assert!(fake.submissions().is_empty());
}

#[traced_test]
#[tokio::test(start_paused = true)]
async fn a_known_transaction_response_counts_as_submitted() {
    let mut mock = MockBaseLayerClient::new();
    mock.expect_chain_id().returning(|| Ok(CHAIN_ID));
    mock.expect_transaction_count().returning(|_| Ok(5));
    mock.expect_block_number().returning(|| Ok(100));
    let submissions = Arc::new(AtomicU64::new(0));
    {
        let submissions = submissions.clone();
        mock.expect_send_raw_transaction().returning(move |raw: Bytes| {
            submissions.fetch_add(1, Ordering::SeqCst);
            Err(BaseLayerError::KnownTransaction { transaction_hash: keccak256(&raw) })
        });
    }
    // Any receipt this deep below head 100 is long buried.
    mock.expect_transaction_receipt()
        .returning(|_| Ok(Some(TransactionReceiptInfo { block_number: 10 })));

    let cancel = CancellationToken::new();
    let (tasks_tx, handle) = spawn_sender(Arc::new(mock), cancel.clone()).await;
    tasks_tx.send(transfer_event()).expect("task queue open");

    wait_until(|| submissions.load(Ordering::SeqCst) == 1).await;
    wait_until(|| logs_contain("Transaction confirmed:")).await;

    cancel.cancel();
    handle.await.expect("sender task panicked").expect("sender should exit cleanly");
}

#[traced_test]
#[tokio::test(start_paused = true)]
async fn resubmits_the_identical_payload_when_no_receipt_appears() {
    let head = Arc::new(AtomicU64::new(100));
    let raw_submissions: Arc<Mutex<Vec<Bytes>>> = Arc::new(Mutex::new(Vec::new()));

    let mut mock = MockBaseLayerClient::new();
    mock.expect_chain_id().returning(|| Ok(CHAIN_ID));
    mock.expect_transaction_count().returning(|_| Ok(0));
    {
        let head = head.clone();
        mock.expect_block_number().returning(move || Ok(head.load(Ordering::SeqCst)));
    }
    {
        let raw_submissions = raw_submissions.clone();
        mock.expect_send_raw_transaction().returning(move |raw: Bytes| {
            let hash = keccak256(&raw);
            raw_submissions.lock().expect("submission log lock poisoned").push(raw);
            Ok(hash)
        });
    }
    mock.expect_transaction_receipt().returning(|_| Ok(None));

    let cancel = CancellationToken::new();
    let (tasks_tx, handle) = spawn_sender(Arc::new(mock), cancel.clone()).await;
    tasks_tx.send(transfer_event()).expect("task queue open");

    wait_until(|| raw_submissions.lock().expect("lock poisoned").len() == 1).await;

    // Push the head past the receipt grace period of 10 * max_reorg_depth.
    head.store(100 + 10 * MAX_REORG_DEPTH, Ordering::SeqCst);
    wait_until(|| raw_submissions.lock().expect("lock poisoned").len() == 2).await;

    let raws = raw_submissions.lock().expect("lock poisoned").clone();
    assert_eq!(raws[0], raws[1], "resubmission must be byte-identical");
    assert!(logs_contain("resubmitting"));

    cancel.cancel();
    handle.await.expect("sender task panicked").expect("sender should exit cleanly");
}

#[traced_test]
#[tokio::test(start_paused = true)]
async fn pending_transactions_clear_only_after_burial() {
    let head = Arc::new(AtomicU64::new(10));

    let mut mock = MockBaseLayerClient::new();
    mock.expect_chain_id().returning(|| Ok(CHAIN_ID));
    mock.expect_transaction_count().returning(|_| Ok(0));
    {
        let head = head.clone();
        mock.expect_block_number().returning(move || Ok(head.load(Ordering::SeqCst)));
    }
    mock.expect_send_raw_transaction().returning(|raw: Bytes| Ok(keccak256(&raw)));
    mock.expect_transaction_receipt()
        .returning(|_| Ok(Some(TransactionReceiptInfo { block_number: 11 })));

    let cancel = CancellationToken::new();
    let (tasks_tx, handle) = spawn_sender(Arc::new(mock), cancel.clone()).await;
    tasks_tx.send(transfer_event()).expect("task queue open");

    // Included in block 11 but head is 10: several polls must not confirm.
    tokio::time::sleep(10 * bridge_types::HOME_CHAIN_STEP_DURATION).await;
    assert!(!logs_contain("Transaction confirmed:"));

    head.store(11 + MAX_REORG_DEPTH, Ordering::SeqCst);
    wait_until(|| logs_contain("Transaction confirmed:")).await;

    cancel.cancel();
    handle.await.expect("sender task panicked").expect("sender should exit cleanly");
}
