#[cfg(test)]
#[path = "ethereum_test.rs"]
mod ethereum_test;

use std::time::Duration;

use alloy::network::Ethereum;
use alloy::providers::{Provider, RootProvider};
use alloy::rpc::client::RpcClient;
use alloy::rpc::types::{Filter, Log};
use alloy::sol_types::SolEvent;
use alloy::transports::http::Http;
use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use async_trait::async_trait;
use bridge_types::{BridgeEvent, CompletionEvent, ConfirmationEvent, TransferEvent};
use url::Url;

use crate::contracts::{ForeignToken, HomeBridge, ValidatorProxy};
use crate::errors::{classify_send_error, BaseLayerError, BaseLayerResult};
use crate::event_filters::{EventDescriptor, EventQuery};
use crate::{BaseLayerClient, TransactionReceiptInfo};

/// A chain reached over HTTP JSON-RPC.
#[derive(Clone, Debug)]
pub struct EthereumBaseLayer {
    provider: RootProvider<Ethereum>,
}

impl EthereumBaseLayer {
    pub fn new(rpc_url: Url, rpc_timeout: Duration) -> BaseLayerResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(rpc_timeout)
            .build()
            .map_err(|error| BaseLayerError::Transport(error.to_string()))?;
        let transport = Http::with_client(http_client, rpc_url);
        let rpc_client = RpcClient::new(transport, false);
        Ok(Self { provider: RootProvider::new(rpc_client) })
    }
}

#[async_trait]
impl BaseLayerClient for EthereumBaseLayer {
    async fn block_number(&self) -> BaseLayerResult<u64> {
        Ok(self.provider.get_block_number().await?)
    }

    async fn events(&self, query: EventQuery) -> BaseLayerResult<Vec<BridgeEvent>> {
        let filter = build_filter(&query);
        let logs = self.provider.get_logs(&filter).await?;
        logs.iter().map(|log| decode_log(&query.descriptor, log)).collect()
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> BaseLayerResult<B256> {
        let transaction_hash = keccak256(&raw);
        self.provider
            .send_raw_transaction(raw.as_ref())
            .await
            .map_err(|error| classify_send_error(transaction_hash, error))?;
        Ok(transaction_hash)
    }

    async fn transaction_receipt(
        &self,
        transaction_hash: B256,
    ) -> BaseLayerResult<Option<TransactionReceiptInfo>> {
        let receipt = self.provider.get_transaction_receipt(transaction_hash).await?;
        Ok(receipt.and_then(|receipt| {
            receipt.block_number.map(|block_number| TransactionReceiptInfo { block_number })
        }))
    }

    async fn balance(&self, address: Address) -> BaseLayerResult<U256> {
        Ok(self.provider.get_balance(address).await?)
    }

    async fn transaction_count(&self, address: Address) -> BaseLayerResult<u64> {
        Ok(self.provider.get_transaction_count(address).await?)
    }

    async fn chain_id(&self) -> BaseLayerResult<u64> {
        Ok(self.provider.get_chain_id().await?)
    }

    async fn has_code(&self, address: Address) -> BaseLayerResult<bool> {
        let code = self.provider.get_code_at(address).await?;
        Ok(!code.is_empty())
    }

    async fn validator_proxy_address(&self, home_bridge: Address) -> BaseLayerResult<Address> {
        let bridge = HomeBridge::new(home_bridge, self.provider.clone());
        Ok(bridge.validatorProxy().call().await?)
    }

    async fn is_validator(
        &self,
        validator_proxy: Address,
        validator: Address,
    ) -> BaseLayerResult<bool> {
        let proxy = ValidatorProxy::new(validator_proxy, self.provider.clone());
        Ok(proxy.isValidator(validator).call().await?)
    }
}

fn build_filter(query: &EventQuery) -> Filter {
    let filter = Filter::new()
        .address(query.contract)
        .from_block(query.from_block)
        .to_block(query.to_block);
    match query.descriptor {
        EventDescriptor::Transfer { to } => filter
            .event_signature(ForeignToken::Transfer::SIGNATURE_HASH)
            .topic2(to.into_word()),
        EventDescriptor::Confirmation { validator } => filter
            .event_signature(HomeBridge::Confirmation::SIGNATURE_HASH)
            .topic1(validator.into_word()),
        EventDescriptor::Completion => {
            filter.event_signature(HomeBridge::Completion::SIGNATURE_HASH)
        }
    }
}

fn decode_log(descriptor: &EventDescriptor, log: &Log) -> BaseLayerResult<BridgeEvent> {
    // All queried ranges are below the confirmed head, so a log without block
    // metadata is a node bug rather than a pending log.
    let block_number = log
        .block_number
        .ok_or_else(|| BaseLayerError::MalformedLog("log without block number".to_owned()))?;
    let log_index = log
        .log_index
        .ok_or_else(|| BaseLayerError::MalformedLog("log without log index".to_owned()))?;
    let transaction_hash = log
        .transaction_hash
        .ok_or_else(|| BaseLayerError::MalformedLog("log without transaction hash".to_owned()))?;

    match descriptor {
        EventDescriptor::Transfer { .. } => {
            let block_hash = log.block_hash.ok_or_else(|| {
                BaseLayerError::MalformedLog("log without block hash".to_owned())
            })?;
            let decoded = log
                .log_decode::<ForeignToken::Transfer>()
                .map_err(|error| BaseLayerError::MalformedLog(error.to_string()))?;
            Ok(BridgeEvent::Transfer(TransferEvent {
                sender: decoded.inner.data.from,
                recipient: decoded.inner.data.to,
                value: decoded.inner.data.value,
                transaction_hash,
                log_index,
                block_number,
                block_hash,
                token_address: decoded.inner.address,
            }))
        }
        EventDescriptor::Confirmation { .. } => {
            let decoded = log
                .log_decode::<HomeBridge::Confirmation>()
                .map_err(|error| BaseLayerError::MalformedLog(error.to_string()))?;
            Ok(BridgeEvent::Confirmation(ConfirmationEvent {
                transfer_hash: decoded.inner.data.transferHash,
                transaction_hash: decoded.inner.data.transactionHash,
                amount: decoded.inner.data.amount,
                recipient: decoded.inner.data.recipient,
                validator: decoded.inner.data.validator,
                block_number,
                log_index,
            }))
        }
        EventDescriptor::Completion => {
            let decoded = log
                .log_decode::<HomeBridge::Completion>()
                .map_err(|error| BaseLayerError::MalformedLog(error.to_string()))?;
            Ok(BridgeEvent::Completion(CompletionEvent {
                transfer_hash: decoded.inner.data.transferHash,
                block_number,
                log_index,
            }))
        }
    }
}
