//! An in-memory chain pair stand-in for flow tests: seeded events, a movable
//! head, and capture of every submitted raw transaction in decoded form.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use alloy::consensus::{Transaction, TxEnvelope};
use alloy::eips::eip2718::Decodable2718;
use alloy::sol_types::SolCall;
use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use bridge_types::BridgeEvent;

use crate::contracts::HomeBridge;
use crate::errors::{BaseLayerError, BaseLayerResult};
use crate::event_filters::{EventDescriptor, EventQuery};
use crate::{BaseLayerClient, TransactionReceiptInfo};

/// A captured `confirmTransfer` submission, decoded from its raw bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmittedTransaction {
    pub hash: B256,
    pub nonce: u64,
    pub to: Address,
    pub gas_price: u128,
    pub value: U256,
    pub transfer_hash: B256,
    pub transaction_hash: B256,
    pub amount: U256,
    pub recipient: Address,
}

#[derive(Default)]
struct FakeChainState {
    head: u64,
    chain_id: u64,
    events: Vec<BridgeEvent>,
    receipts: HashMap<B256, u64>,
    balances: HashMap<Address, U256>,
    transaction_counts: HashMap<Address, u64>,
    deployed_contracts: HashSet<Address>,
    validator_proxies: HashMap<Address, Address>,
    validators: HashSet<Address>,
    submissions: Vec<SubmittedTransaction>,
    auto_mine: bool,
}

pub struct FakeBaseLayer {
    state: Mutex<FakeChainState>,
}

impl FakeBaseLayer {
    pub fn new(chain_id: u64) -> Self {
        Self { state: Mutex::new(FakeChainState { chain_id, ..Default::default() }) }
    }

    pub fn set_head(&self, head: u64) {
        self.lock().head = head;
    }

    pub fn advance_head(&self, blocks: u64) {
        self.lock().head += blocks;
    }

    pub fn head(&self) -> u64 {
        self.lock().head
    }

    pub fn push_event(&self, event: BridgeEvent) {
        self.lock().events.push(event);
    }

    pub fn deploy_contract(&self, address: Address) {
        self.lock().deployed_contracts.insert(address);
    }

    pub fn set_validator_proxy(&self, home_bridge: Address, proxy: Address) {
        self.lock().validator_proxies.insert(home_bridge, proxy);
    }

    pub fn set_validator_status(&self, validator: Address, active: bool) {
        let mut state = self.lock();
        if active {
            state.validators.insert(validator);
        } else {
            state.validators.remove(&validator);
        }
    }

    pub fn set_balance(&self, address: Address, balance: U256) {
        self.lock().balances.insert(address, balance);
    }

    pub fn set_transaction_count(&self, address: Address, count: u64) {
        self.lock().transaction_counts.insert(address, count);
    }

    /// Give every future submission a receipt one block past the current head.
    pub fn enable_auto_mine(&self) {
        self.lock().auto_mine = true;
    }

    pub fn submissions(&self) -> Vec<SubmittedTransaction> {
        self.lock().submissions.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeChainState> {
        self.state.lock().expect("fake chain state lock poisoned")
    }
}

#[async_trait]
impl BaseLayerClient for FakeBaseLayer {
    async fn block_number(&self) -> BaseLayerResult<u64> {
        Ok(self.lock().head)
    }

    async fn events(&self, query: EventQuery) -> BaseLayerResult<Vec<BridgeEvent>> {
        let state = self.lock();
        Ok(state
            .events
            .iter()
            .filter(|event| {
                let block_number = event.block_number();
                block_number >= query.from_block
                    && block_number <= query.to_block
                    && matches_descriptor(event, &query)
            })
            .cloned()
            .collect())
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> BaseLayerResult<B256> {
        let submission = decode_submission(&raw)?;
        let mut state = self.lock();
        if state.submissions.iter().any(|known| known.hash == submission.hash) {
            return Err(BaseLayerError::KnownTransaction { transaction_hash: submission.hash });
        }
        let hash = submission.hash;
        state.submissions.push(submission);
        if state.auto_mine {
            state.head += 1;
            let head = state.head;
            state.receipts.insert(hash, head);
        }
        Ok(hash)
    }

    async fn transaction_receipt(
        &self,
        transaction_hash: B256,
    ) -> BaseLayerResult<Option<TransactionReceiptInfo>> {
        Ok(self
            .lock()
            .receipts
            .get(&transaction_hash)
            .map(|block_number| TransactionReceiptInfo { block_number: *block_number }))
    }

    async fn balance(&self, address: Address) -> BaseLayerResult<U256> {
        Ok(self.lock().balances.get(&address).copied().unwrap_or(U256::ZERO))
    }

    async fn transaction_count(&self, address: Address) -> BaseLayerResult<u64> {
        Ok(self.lock().transaction_counts.get(&address).copied().unwrap_or(0))
    }

    async fn chain_id(&self) -> BaseLayerResult<u64> {
        Ok(self.lock().chain_id)
    }

    async fn has_code(&self, address: Address) -> BaseLayerResult<bool> {
        Ok(self.lock().deployed_contracts.contains(&address))
    }

    async fn validator_proxy_address(&self, home_bridge: Address) -> BaseLayerResult<Address> {
        self.lock().validator_proxies.get(&home_bridge).copied().ok_or_else(|| {
            BaseLayerError::Contract(format!("no validator proxy behind {home_bridge}"))
        })
    }

    async fn is_validator(
        &self,
        _validator_proxy: Address,
        validator: Address,
    ) -> BaseLayerResult<bool> {
        Ok(self.lock().validators.contains(&validator))
    }
}

fn matches_descriptor(event: &BridgeEvent, query: &EventQuery) -> bool {
    match (&query.descriptor, event) {
        (EventDescriptor::Transfer { to }, BridgeEvent::Transfer(transfer)) => {
            transfer.recipient == *to && transfer.token_address == query.contract
        }
        (EventDescriptor::Confirmation { validator }, BridgeEvent::Confirmation(confirmation)) => {
            confirmation.validator == *validator
        }
        (EventDescriptor::Completion, BridgeEvent::Completion(_)) => true,
        _ => false,
    }
}

fn decode_submission(raw: &Bytes) -> BaseLayerResult<SubmittedTransaction> {
    let envelope = TxEnvelope::decode_2718(&mut raw.as_ref())
        .map_err(|error| BaseLayerError::Contract(format!("undecodable raw transaction: {error}")))?;
    let to = envelope
        .to()
        .ok_or_else(|| BaseLayerError::Contract("raw transaction without recipient".to_owned()))?;
    let call = HomeBridge::confirmTransferCall::abi_decode(envelope.input())
        .map_err(|error| BaseLayerError::Contract(format!("unexpected calldata: {error}")))?;
    Ok(SubmittedTransaction {
        hash: *envelope.tx_hash(),
        nonce: envelope.nonce(),
        to,
        gas_price: envelope.gas_price().unwrap_or_default(),
        value: envelope.value(),
        transfer_hash: call.transferHash,
        transaction_hash: call.transactionHash,
        amount: call.amount,
        recipient: call.recipient,
    })
}
