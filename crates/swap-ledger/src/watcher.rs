use futures::stream::{self, BoxStream, StreamExt};
use std::collections::VecDeque;
use swap_core::WatcherSettings;
use tracing::{debug, warn};

use crate::error::LedgerError;
use crate::traits::LedgerAdapter;
use crate::types::{ContractEvent, ContractRef, EventCursor, LedgerEvent, ObservedEvent, WatchItem};

/// Per-ledger finality rule.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub confirmations_required: u64,
}

impl WatcherConfig {
    pub fn from_settings(settings: &WatcherSettings) -> Self {
        Self {
            confirmations_required: settings.confirmations_required.max(1),
        }
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self::from_settings(&WatcherSettings::default())
    }
}

/// Turns one contract's raw ledger events into state-machine input.
///
/// `Funded` is held back until it has `confirmations_required` blocks; any
/// later event of the same contract queues behind it so delivery order always
/// matches ledger order. The cursor only moves past an event once it has been
/// released, so a watcher restarted from a persisted cursor never skips an
/// unconfirmed funding and never re-delivers a released event.
pub struct ContractWatcher {
    contract: ContractRef,
    config: WatcherConfig,
    cursor: EventCursor,
    tip_height: u64,
    pending: VecDeque<LedgerEvent>,
}

impl ContractWatcher {
    pub fn new(contract: ContractRef, from: EventCursor, config: WatcherConfig) -> Self {
        Self {
            contract,
            config,
            cursor: from,
            tip_height: 0,
            pending: VecDeque::new(),
        }
    }

    pub fn contract(&self) -> &ContractRef {
        &self.contract
    }

    /// Cursor just after the last released event.
    pub fn cursor(&self) -> EventCursor {
        self.cursor
    }

    /// Number of events held back waiting for confirmations.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Where the next fetch from the ledger should start.
    fn fetch_cursor(&self) -> EventCursor {
        self.pending
            .back()
            .map(LedgerEvent::cursor_after)
            .unwrap_or(self.cursor)
    }

    fn confirmations(&self, height: u64) -> u64 {
        if self.tip_height >= height {
            self.tip_height - height + 1
        } else {
            0
        }
    }

    /// Fold one raw stream item in; return the events that became final.
    pub fn ingest(&mut self, item: WatchItem) -> Vec<ObservedEvent> {
        match item {
            WatchItem::Event(event) => {
                if event.seq < self.fetch_cursor().0 {
                    debug!(contract = %self.contract, seq = event.seq, "skipping already seen event");
                } else {
                    debug!(contract = %self.contract, seq = event.seq, kind = event.event.kind(), "ledger event");
                    self.pending.push_back(event);
                }
            }
            WatchItem::Tip(height) => {
                if height < self.tip_height {
                    warn!(
                        contract = %self.contract,
                        previous_height = self.tip_height,
                        current_height = height,
                        "chain tip moved backwards"
                    );
                }
                self.tip_height = height;
            }
        }
        self.release()
    }

    fn release(&mut self) -> Vec<ObservedEvent> {
        let mut released = Vec::new();
        while let Some(front) = self.pending.front() {
            if let ContractEvent::Funded(_) = front.event {
                let confirmations = self.confirmations(front.height);
                if confirmations < self.config.confirmations_required {
                    debug!(
                        contract = %self.contract,
                        confirmations,
                        required = self.config.confirmations_required,
                        "awaiting confirmations"
                    );
                    break;
                }
            }
            let Some(event) = self.pending.pop_front() else {
                break;
            };
            self.cursor = event.cursor_after();
            released.push(ObservedEvent {
                cursor: self.cursor,
                event: event.event,
            });
        }
        released
    }

    /// Fetch once from the ledger and return the events that became final.
    pub async fn poll_once(
        &mut self,
        adapter: &dyn LedgerAdapter,
    ) -> Result<Vec<ObservedEvent>, LedgerError> {
        let page = adapter.events_since(&self.contract, self.fetch_cursor()).await?;
        let mut released = Vec::new();
        for event in page.events {
            released.extend(self.ingest(WatchItem::Event(event)));
        }
        released.extend(self.ingest(WatchItem::Tip(page.tip_height)));
        Ok(released)
    }

    /// Consume the watcher into a lazy stream of final events fed by `adapter.watch`.
    pub fn into_stream(self, adapter: &dyn LedgerAdapter) -> BoxStream<'static, ObservedEvent> {
        let raw = adapter.watch(&self.contract, self.fetch_cursor());
        stream::unfold((self, raw), |(mut watcher, mut raw)| async move {
            loop {
                match raw.next().await {
                    None => return None,
                    Some(Ok(item)) => {
                        let released = watcher.ingest(item);
                        if !released.is_empty() {
                            return Some((stream::iter(released), (watcher, raw)));
                        }
                    }
                    Some(Err(err)) => {
                        debug!(contract = %watcher.contract, error = %err, "watch stream error");
                    }
                }
            }
        })
        .flatten()
        .boxed()
    }
}
