//! Per-session event watcher.
//!
//! One watcher task per exchange session polls the ledger and forwards
//! matching events into a bounded queue. The cursor advances past every
//! event the poll returned, matching or not, so nothing is delivered twice.
//! The task exits on its own once the session drops the receiving end.

use alloy::primitives::Address;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;

use crate::observability::metrics;

use super::types::SequencedEvent;
use super::LedgerClient;

/// Queue depth between a watcher and its session.
const EVENT_QUEUE_DEPTH: usize = 32;

/// Polls the ledger for events concerning one seller.
pub struct EventWatcher {
    ledger: Arc<dyn LedgerClient>,
    seller: Address,
    cursor: u64,
    poll_interval: Duration,
}

impl EventWatcher {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        seller: Address,
        from_sequence: u64,
        poll_interval: Duration,
    ) -> Self {
        Self { ledger, seller, cursor: from_sequence, poll_interval }
    }

    /// Start the watcher task and return the event queue.
    pub fn spawn(self) -> mpsc::Receiver<SequencedEvent> {
        let (tx, rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        tokio::spawn(self.run(tx));
        rx
    }

    async fn run(mut self, tx: mpsc::Sender<SequencedEvent>) {
        tracing::debug!(
            seller = %self.seller,
            from_sequence = self.cursor,
            "Event watcher started"
        );

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                _ = sleep(self.poll_interval) => {
                    match self.ledger.events_since(self.cursor).await {
                        Ok(events) => {
                            for sequenced in events {
                                self.cursor = sequenced.sequence + 1;
                                if !sequenced.event.concerns(self.seller) {
                                    continue;
                                }
                                metrics::record_ledger_event(sequenced.event.kind());
                                if tx.send(sequenced).await.is_err() {
                                    return;
                                }
                            }
                        }
                        // Polling failures are transient by nature; next tick retries.
                        Err(e) => tracing::warn!(seller = %self.seller, error = %e, "Event poll failed"),
                    }
                }
            }
        }

        tracing::debug!(seller = %self.seller, "Event watcher stopped");
    }
}
