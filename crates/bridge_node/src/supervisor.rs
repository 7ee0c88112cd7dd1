//! Wires the six pipeline tasks together and supervises them: one shared
//! stop token, OS signal handling, and bounded-time teardown.

use alloy::signers::local::PrivateKeySigner;
use alloy_primitives::U256;
use bridge_base_layer::{EventDescriptor, SharedBaseLayerClient};
use bridge_config::BridgeConfig;
use bridge_confirmation::{
    ConfirmationSender, ConfirmationSenderConfig, ConfirmationTaskPlanner, TransferSanityCheck,
};
use bridge_types::{APPLICATION_CLEANUP_TIMEOUT, HOME_CHAIN_STEP_DURATION};
use bridge_watcher::{
    EventFetcher, EventFetcherConfig, ValidatorBalanceWatcher, ValidatorStatusWatcher,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{startup, NodeError};

/// Exit code for a teardown that exceeded its deadline (EX_SOFTWARE).
const CLEANUP_TIMEOUT_EXIT_CODE: i32 = 70;

pub async fn run_with_base_layers(
    config: BridgeConfig,
    home_base_layer: SharedBaseLayerClient,
    foreign_base_layer: SharedBaseLayerClient,
    signer: PrivateKeySigner,
) -> Result<(), NodeError> {
    let validator_address = signer.address();
    let balance_warn_threshold = U256::from(config.balance_warn_threshold);

    let validator_proxy_address =
        startup::validate_contracts(&home_base_layer, &foreign_base_layer, &config).await?;
    startup::check_validator_balance(&home_base_layer, validator_address, balance_warn_threshold)
        .await?;

    info!("Starting bridge validator for account {validator_address}");

    let cancel = CancellationToken::new();
    let (transfer_events_tx, transfer_events_rx) = mpsc::unbounded_channel();
    let (home_events_tx, home_events_rx) = mpsc::unbounded_channel();
    let (tasks_tx, tasks_rx) = mpsc::unbounded_channel();
    let (activation_tx, activation_rx) = watch::channel(false);

    let transfer_event_fetcher = EventFetcher::new(
        EventFetcherConfig {
            chain: "foreign".to_owned(),
            contract_address: config.foreign_chain_token_contract_address,
            descriptors: vec![EventDescriptor::Transfer {
                to: config.foreign_bridge_contract_address,
            }],
            start_block: config.foreign_chain_event_fetch_start_block_number,
            max_reorg_depth: config.foreign_chain_max_reorg_depth,
            poll_interval: config.foreign_chain_event_poll_interval(),
        },
        foreign_base_layer.clone(),
        transfer_events_tx,
        cancel.clone(),
    );

    let home_event_fetcher = EventFetcher::new(
        EventFetcherConfig {
            chain: "home".to_owned(),
            contract_address: config.home_bridge_contract_address,
            descriptors: vec![
                EventDescriptor::Confirmation { validator: validator_address },
                EventDescriptor::Completion,
            ],
            start_block: config.home_chain_event_fetch_start_block_number,
            max_reorg_depth: config.home_chain_max_reorg_depth,
            poll_interval: config.home_chain_event_poll_interval(),
        },
        home_base_layer.clone(),
        home_events_tx,
        cancel.clone(),
    );

    let task_planner = ConfirmationTaskPlanner::new(
        HOME_CHAIN_STEP_DURATION,
        transfer_events_rx,
        home_events_rx,
        tasks_tx,
        activation_rx,
        cancel.clone(),
    );

    let confirmation_sender = ConfirmationSender::new(
        ConfirmationSenderConfig {
            home_bridge_address: config.home_bridge_contract_address,
            gas_price: config.home_chain_gas_price,
            max_reorg_depth: config.home_chain_max_reorg_depth,
            sanity_check: TransferSanityCheck {
                foreign_token_address: config.foreign_chain_token_contract_address,
                foreign_bridge_address: config.foreign_bridge_contract_address,
            },
        },
        home_base_layer.clone(),
        signer,
        tasks_rx,
        cancel.clone(),
    )
    .await?;

    let status_watcher = ValidatorStatusWatcher::new(
        home_base_layer.clone(),
        validator_proxy_address,
        validator_address,
        HOME_CHAIN_STEP_DURATION,
        activation_tx,
        cancel.clone(),
    );

    let balance_watcher = ValidatorBalanceWatcher::new(
        home_base_layer,
        validator_address,
        config.balance_warn_poll_interval(),
        balance_warn_threshold,
        cancel.clone(),
    );

    let mut tasks: JoinSet<Result<(), NodeError>> = JoinSet::new();
    tasks.spawn(async move { transfer_event_fetcher.run().await.map_err(NodeError::from) });
    tasks.spawn(async move { home_event_fetcher.run().await.map_err(NodeError::from) });
    tasks.spawn(async move { task_planner.run().await.map_err(NodeError::from) });
    tasks.spawn(async move { confirmation_sender.run().await.map_err(NodeError::from) });
    tasks.spawn(async move { status_watcher.run().await.map_err(NodeError::from) });
    tasks.spawn(async move { balance_watcher.run().await.map_err(NodeError::from) });

    let result = supervise(&mut tasks, &cancel).await;
    drain_within_deadline(tasks).await;
    result
}

/// Wait for a stop signal or the first task to exit, then stop the group.
/// A clean task exit (the status watcher after losing validator status) is an
/// orderly stop; a task error is propagated.
async fn supervise(
    tasks: &mut JoinSet<Result<(), NodeError>>,
    cancel: &CancellationToken,
) -> Result<(), NodeError> {
    let result = tokio::select! {
        signal = shutdown_signal() => {
            info!("Received {signal}, stopping");
            Ok(())
        }
        joined = tasks.join_next() => match joined {
            None | Some(Ok(Ok(()))) => Ok(()),
            Some(Ok(Err(error))) => {
                error!("Task failed, stopping: {error}");
                Err(error)
            }
            Some(Err(join_error)) => {
                error!("Task panicked, stopping: {join_error}");
                Err(NodeError::TaskPanicked(join_error.to_string()))
            }
        },
    };
    cancel.cancel();
    result
}

/// Join the remaining tasks; if they do not finish within the cleanup
/// timeout, hard-exit so a supervising container restarts the process.
async fn drain_within_deadline(tasks: JoinSet<Result<(), NodeError>>) {
    if tokio::time::timeout(APPLICATION_CLEANUP_TIMEOUT, drain(tasks)).await.is_err() {
        error!("Bridge didn't clean up in time, doing a hard exit");
        std::process::exit(CLEANUP_TIMEOUT_EXIT_CODE);
    }
}

async fn drain(mut tasks: JoinSet<Result<(), NodeError>>) {
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            // The stop already has a cause; teardown stragglers are only noted.
            Ok(Err(error)) => warn!("Task failed during teardown: {error}"),
            Err(join_error) => warn!("Task panicked during teardown: {join_error}"),
        }
    }
}

#[cfg(unix)]
async fn shutdown_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(error) => {
            warn!("Failed to install the SIGTERM handler: {error}");
            return interrupt_only().await;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> &'static str {
    interrupt_only().await
}

async fn interrupt_only() -> &'static str {
    let _ = tokio::signal::ctrl_c().await;
    "SIGINT"
}
