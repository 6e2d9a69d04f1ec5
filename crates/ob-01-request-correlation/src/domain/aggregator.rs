//! # Result Aggregator
//!
//! Runs on the event-delivery thread. Matches a tagged event against the
//! live token of its context, merges the chunk and, on the terminal chunk,
//! finalizes the operation and fires completion exactly once.
//!
//! Never blocks beyond the short context lock.

use bytes::Bytes;
use shared_types::{CorrelationToken, StatusCode};
use std::sync::atomic::Ordering;
use tracing::{debug, trace};

use super::context::RequestContext;

/// Why an event was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DropReason {
    /// The context has no armed token.
    NoLiveToken,
    /// The event carries a token other than the live one.
    TokenMismatch,
    /// The wait for the live token already timed out.
    DiscardedAfterTimeout,
}

impl DropReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DropReason::NoLiveToken => "no_live_token",
            DropReason::TokenMismatch => "token_mismatch",
            DropReason::DiscardedAfterTimeout => "discarded_after_timeout",
        }
    }
}

/// What the aggregator did with one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventDisposition {
    /// Chunk merged, more data expected.
    Accumulated,
    /// Terminal chunk merged, completion fired.
    Completed,
    /// Event ignored, no state change.
    Dropped(DropReason),
}

/// Stateless matcher; all state lives in the `RequestContext`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResultAggregator;

impl ResultAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Process one `(token, more_data, payload, status)` event for `context`.
    pub fn on_event(
        &self,
        context: &RequestContext,
        token: CorrelationToken,
        more_data: bool,
        payload: Bytes,
        status: StatusCode,
    ) -> EventDisposition {
        let mut state = context.lock_state();

        let drop_reason = match state.live_token {
            None => Some(DropReason::NoLiveToken),
            Some(_) if state.discard_late_results => Some(DropReason::DiscardedAfterTimeout),
            Some(live) if live != token => Some(DropReason::TokenMismatch),
            Some(_) => None,
        };

        if let Some(reason) = drop_reason {
            context.stats().dropped_events.fetch_add(1, Ordering::Relaxed);
            debug!(
                class = %context.class(),
                token = %token,
                live_token = ?state.live_token,
                reason = reason.as_str(),
                "Dropping event"
            );
            return EventDisposition::Dropped(reason);
        }

        state.accumulator.merge(payload, status, more_data);
        context.stats().chunks.fetch_add(1, Ordering::Relaxed);

        if !state.accumulator.is_terminal() {
            trace!(
                class = %context.class(),
                token = %token,
                chunks = state.accumulator.received(),
                "Accumulated partial result"
            );
            return EventDisposition::Accumulated;
        }

        let (final_status, result) = state.accumulator.take();
        if final_status.is_success() {
            context.stats().completed.fetch_add(1, Ordering::Relaxed);
        } else {
            context.stats().failed.fetch_add(1, Ordering::Relaxed);
        }

        debug!(
            class = %context.class(),
            token = %token,
            status = final_status.label(),
            chunks = result.chunk_count,
            bytes = result.len(),
            truncated = result.truncated,
            "Operation completed"
        );

        state.status = final_status;
        state.live_token = None;
        state.finished = Some(result);
        state.completion_fired = true;
        context.notify_completion();

        EventDisposition::Completed
    }
}
