//! Polling implementation of [`LedgerAdapter::watch`].
//!
//! Ledgers that only offer request/response access (most RPC nodes) expose
//! their events as a lazy stream by polling `events_since` from a cursor.

use futures::stream::{self, StreamExt};
use std::time::Duration;
use tokio::time::sleep;

use crate::retry::RetryConfig;
use crate::traits::{EventStream, LedgerAdapter};
use crate::types::{ContractRef, EventCursor, WatchItem};

struct PollState<A> {
    adapter: A,
    contract: ContractRef,
    cursor: EventCursor,
    poll_interval: Duration,
    retry: RetryConfig,
    failures: u32,
    delay: Option<Duration>,
}

/// Build an infinite event stream for `contract` by polling `adapter`.
///
/// Every successful poll yields the new events followed by a
/// [`WatchItem::Tip`]. Failed polls yield the error and back off; the stream
/// itself never ends.
pub fn poll_events<A>(
    adapter: A,
    contract: ContractRef,
    from: EventCursor,
    poll_interval: Duration,
    retry: RetryConfig,
) -> EventStream
where
    A: LedgerAdapter + 'static,
{
    let state = PollState {
        adapter,
        contract,
        cursor: from,
        poll_interval,
        retry,
        failures: 0,
        delay: None,
    };

    stream::unfold(state, |mut st| async move {
        if let Some(delay) = st.delay.take() {
            sleep(delay).await;
        }

        let items = match st.adapter.events_since(&st.contract, st.cursor).await {
            Ok(page) => {
                st.failures = 0;
                if let Some(last) = page.events.last() {
                    st.cursor = last.cursor_after();
                }
                let mut items: Vec<_> = page
                    .events
                    .into_iter()
                    .map(|event| Ok(WatchItem::Event(event)))
                    .collect();
                items.push(Ok(WatchItem::Tip(page.tip_height)));
                st.delay = Some(st.poll_interval);
                items
            }
            Err(err) => {
                let delay = st.retry.backoff(st.failures);
                st.failures = st.failures.saturating_add(1);
                tracing::warn!(
                    contract = %st.contract,
                    failures = st.failures,
                    error = %err,
                    "polling ledger failed; backing off"
                );
                st.delay = Some(delay);
                vec![Err(err)]
            }
        };

        Some((stream::iter(items), st))
    })
    .flatten()
    .boxed()
}

