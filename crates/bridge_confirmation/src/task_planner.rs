#[cfg(test)]
#[path = "task_planner_test.rs"]
mod task_planner_test;

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::time::Duration;

use alloy_primitives::B256;
use bridge_types::{BridgeEvent, TransferEvent};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("confirmation task queue closed")]
    TaskQueueClosed,
}

/// A foreign transfer held back until its release time.
///
/// Ordered so that the earliest release pops first from a max-heap; ties
/// break on arrival order.
struct ScheduledTransfer {
    release_at: Instant,
    seq: u64,
    event: TransferEvent,
}

impl PartialEq for ScheduledTransfer {
    fn eq(&self, other: &Self) -> bool {
        self.release_at == other.release_at && self.seq == other.seq
    }
}

impl Eq for ScheduledTransfer {}

impl PartialOrd for ScheduledTransfer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledTransfer {
    fn cmp(&self, other: &Self) -> Ordering {
        (other.release_at, other.seq).cmp(&(self.release_at, self.seq))
    }
}

/// Joins the foreign transfer stream with the home bridge event stream and
/// emits the transfers that still need this validator's confirmation.
///
/// Every incoming transfer is held for `sync_persistence_time` before release.
/// The delay gives the home fetcher a chance to deliver this validator's
/// prior `Confirmation` events first. Without it, a restarted validator
/// would re-confirm transfers it already handled in an earlier run, because
/// the matching home event may still be inside the reorg window or in
/// transit. One home chain step suffices: anything older has left the reorg
/// window and was delivered before the transfer's release.
pub struct ConfirmationTaskPlanner {
    sync_persistence_time: Duration,
    transfer_events_rx: mpsc::UnboundedReceiver<BridgeEvent>,
    home_events_rx: mpsc::UnboundedReceiver<BridgeEvent>,
    tasks_tx: mpsc::UnboundedSender<TransferEvent>,
    activation_rx: watch::Receiver<bool>,
    cancel: CancellationToken,
    scheduled_transfers: BinaryHeap<ScheduledTransfer>,
    already_confirmed_by_me: HashSet<B256>,
    completed: HashSet<B256>,
    /// Transfers already released this run; a transfer is confirmed at most
    /// once per process even before its home `Confirmation` is observed.
    emitted: HashSet<B256>,
    running: bool,
    next_seq: u64,
}

impl ConfirmationTaskPlanner {
    pub fn new(
        sync_persistence_time: Duration,
        transfer_events_rx: mpsc::UnboundedReceiver<BridgeEvent>,
        home_events_rx: mpsc::UnboundedReceiver<BridgeEvent>,
        tasks_tx: mpsc::UnboundedSender<TransferEvent>,
        activation_rx: watch::Receiver<bool>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            sync_persistence_time,
            transfer_events_rx,
            home_events_rx,
            tasks_tx,
            activation_rx,
            cancel,
            scheduled_transfers: BinaryHeap::new(),
            already_confirmed_by_me: HashSet::new(),
            completed: HashSet::new(),
            emitted: HashSet::new(),
            running: false,
            next_seq: 0,
        }
    }

    pub async fn run(mut self) -> Result<(), PlannerError> {
        loop {
            if !self.running {
                tokio::select! {
                    _ = self.cancel.cancelled() => return Ok(()),
                    changed = self.activation_rx.changed() => {
                        if changed.is_err() {
                            return Ok(());
                        }
                        self.running = *self.activation_rx.borrow();
                        if self.running {
                            info!("Starting to plan confirmation tasks");
                        }
                    }
                }
                continue;
            }

            // Home events first: a Confirmation or Completion that is already
            // queued must be able to suppress a transfer released this round.
            self.drain_home_events();
            self.drain_transfer_events();
            if !self.release_due_transfers() {
                if self.cancel.is_cancelled() {
                    return Ok(());
                }
                return Err(PlannerError::TaskQueueClosed);
            }

            let wakeup = self.next_wakeup();
            tokio::select! {
                _ = self.cancel.cancelled() => return Ok(()),
                maybe_event = self.home_events_rx.recv() => match maybe_event {
                    Some(event) => self.handle_home_event(event),
                    None => return Ok(()),
                },
                maybe_event = self.transfer_events_rx.recv() => match maybe_event {
                    Some(event) => self.schedule_transfer(event),
                    None => return Ok(()),
                },
                _ = tokio::time::sleep_until(wakeup) => {}
            }
        }
    }

    fn drain_home_events(&mut self) {
        while let Ok(event) = self.home_events_rx.try_recv() {
            self.handle_home_event(event);
        }
    }

    fn drain_transfer_events(&mut self) {
        while let Ok(event) = self.transfer_events_rx.try_recv() {
            self.schedule_transfer(event);
        }
    }

    fn handle_home_event(&mut self, event: BridgeEvent) {
        match event {
            BridgeEvent::Confirmation(confirmation) => {
                debug!(
                    "Transfer {} was already confirmed by this validator",
                    confirmation.transfer_hash
                );
                self.already_confirmed_by_me.insert(confirmation.transfer_hash);
            }
            BridgeEvent::Completion(completion) => {
                debug!("Transfer {} is complete", completion.transfer_hash);
                // Scheduled entries for this hash stay heaped; the membership
                // re-check at release time drops them.
                self.completed.insert(completion.transfer_hash);
            }
            BridgeEvent::Transfer(transfer) => {
                warn!(
                    "Ignoring unexpected transfer event on the home bridge event queue: {:?}",
                    transfer
                );
            }
        }
    }

    fn schedule_transfer(&mut self, event: BridgeEvent) {
        let transfer = match event {
            BridgeEvent::Transfer(transfer) => transfer,
            other => {
                warn!("Ignoring unexpected event on the transfer event queue: {other:?}");
                return;
            }
        };
        let transfer_hash = transfer.transfer_hash();
        if self.is_settled(&transfer_hash) {
            debug!("Dropping transfer {transfer_hash} which needs no confirmation");
            return;
        }
        self.scheduled_transfers.push(ScheduledTransfer {
            release_at: Instant::now() + self.sync_persistence_time,
            seq: self.next_seq,
            event: transfer,
        });
        self.next_seq += 1;
    }

    /// Pop every due transfer and emit the ones still lacking a confirmation.
    /// Returns whether the task queue is still open.
    fn release_due_transfers(&mut self) -> bool {
        let now = Instant::now();
        while let Some(scheduled) = self.scheduled_transfers.peek() {
            if scheduled.release_at > now {
                break;
            }
            let Some(scheduled) = self.scheduled_transfers.pop() else {
                break;
            };
            let transfer_hash = scheduled.event.transfer_hash();
            // The home queue may have settled this transfer while it was
            // heaped; this re-check is where duplicate suppression fires.
            if self.is_settled(&transfer_hash) {
                debug!("Dropping scheduled transfer {transfer_hash} which needs no confirmation");
                continue;
            }
            info!("Planning confirmation of transfer {transfer_hash}");
            self.emitted.insert(transfer_hash);
            if self.tasks_tx.send(scheduled.event).is_err() {
                return false;
            }
        }
        true
    }

    fn is_settled(&self, transfer_hash: &B256) -> bool {
        self.completed.contains(transfer_hash)
            || self.already_confirmed_by_me.contains(transfer_hash)
            || self.emitted.contains(transfer_hash)
    }

    fn next_wakeup(&self) -> Instant {
        let fallback = Instant::now() + self.sync_persistence_time;
        match self.scheduled_transfers.peek() {
            Some(scheduled) => scheduled.release_at.min(fallback),
            None => fallback,
        }
    }
}
