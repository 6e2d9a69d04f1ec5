//! # Request Context
//!
//! Per-operation-class correlation state. One context exists for each
//! `OperationClass` for the whole lifetime of the dispatcher.
//!
//! The mutable fields are guarded by a single short-held mutex shared by the
//! issuing thread and the event-delivery thread. The completion signal is a
//! condvar paired with that mutex plus a `completion_fired` flag, so the
//! waiter never holds the lock while blocked.
//!
//! ## Arm cycle
//!
//! 1. `arm()` clears the discard flag, installs a fresh token, resets the
//!    completion flag and the accumulator
//! 2. the dispatcher forwards the request with the lock released
//! 3. `wait()` blocks on the condvar until the aggregator fires completion
//!    or the deadline passes
//! 4. on timeout the context is marked to discard late results

use parking_lot::{Condvar, Mutex, MutexGuard};
use shared_types::{CorrelationToken, ErrorKind, OperationClass};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::accumulator::{CompletedResult, ResultAccumulator};
use super::status::RequestStatus;

/// Lock-free counters kept per context.
#[derive(Debug, Default)]
pub struct ContextStats {
    /// Requests armed
    pub issued: AtomicU64,
    /// Requests that reached a terminal chunk with success
    pub completed: AtomicU64,
    /// Requests that reached a terminal chunk with a failure status
    pub failed: AtomicU64,
    /// Waits that expired
    pub timeouts: AtomicU64,
    /// Requests refused synchronously by the control entity
    pub rejected: AtomicU64,
    /// Issues refused because a wait was still pending
    pub busy: AtomicU64,
    /// Events dropped by the aggregator
    pub dropped_events: AtomicU64,
    /// Chunks merged into the accumulator
    pub chunks: AtomicU64,
}

impl ContextStats {
    pub fn snapshot(&self) -> ContextStatsSnapshot {
        ContextStatsSnapshot {
            issued: self.issued.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            busy: self.busy.load(Ordering::Relaxed),
            dropped_events: self.dropped_events.load(Ordering::Relaxed),
            chunks: self.chunks.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of `ContextStats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContextStatsSnapshot {
    pub issued: u64,
    pub completed: u64,
    pub failed: u64,
    pub timeouts: u64,
    pub rejected: u64,
    pub busy: u64,
    pub dropped_events: u64,
    pub chunks: u64,
}

/// Diagnostic view of a context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextSnapshot {
    pub class: OperationClass,
    pub live_token: Option<CorrelationToken>,
    pub status: RequestStatus,
    pub discard_late_results: bool,
    pub wait_pending: bool,
    pub expected_more: bool,
    pub stats: ContextStatsSnapshot,
}

/// Fields guarded by the context mutex.
#[derive(Debug)]
pub(crate) struct ContextState {
    pub(crate) live_token: Option<CorrelationToken>,
    pub(crate) status: RequestStatus,
    pub(crate) discard_late_results: bool,
    /// A caller armed this context and has not collected the outcome yet.
    pub(crate) wait_pending: bool,
    pub(crate) completion_fired: bool,
    pub(crate) accumulator: ResultAccumulator,
    pub(crate) finished: Option<CompletedResult>,
}

/// Per-operation-class request context.
#[derive(Debug)]
pub struct RequestContext {
    class: OperationClass,
    state: Mutex<ContextState>,
    completion: Condvar,
    stats: ContextStats,
}

impl RequestContext {
    pub fn new(class: OperationClass, max_result_bytes: usize) -> Self {
        Self {
            class,
            state: Mutex::new(ContextState {
                live_token: None,
                status: RequestStatus::Pending,
                discard_late_results: false,
                wait_pending: false,
                completion_fired: false,
                accumulator: ResultAccumulator::new(max_result_bytes),
                finished: None,
            }),
            completion: Condvar::new(),
            stats: ContextStats::default(),
        }
    }

    pub fn class(&self) -> OperationClass {
        self.class
    }

    pub fn stats(&self) -> &ContextStats {
        &self.stats
    }

    /// Arm the context for a new request carrying `token`.
    ///
    /// Fails with `Busy` while a previous wait is still pending; the
    /// in-flight token is left untouched in that case.
    pub fn arm(&self, token: CorrelationToken) -> Result<(), ErrorKind> {
        let mut state = self.state.lock();

        if state.wait_pending {
            self.stats.busy.fetch_add(1, Ordering::Relaxed);
            debug!(
                class = %self.class,
                token = %token,
                live_token = ?state.live_token,
                "Context busy, refusing to re-arm"
            );
            return Err(ErrorKind::Busy);
        }

        state.discard_late_results = false;
        state.live_token = Some(token);
        state.status = RequestStatus::Pending;
        state.wait_pending = true;
        state.completion_fired = false;
        state.finished = None;
        state.accumulator.reset();

        self.stats.issued.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Undo `arm()` after the control entity refused the hand-off.
    pub fn disarm(&self, token: CorrelationToken) {
        let mut state = self.state.lock();
        if state.live_token == Some(token) {
            state.live_token = None;
        }
        state.wait_pending = false;
        state.status = RequestStatus::Pending;
        self.stats.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Block until completion fires for the armed token or `timeout` passes.
    ///
    /// The mutex is released for the duration of each condvar wait.
    pub fn wait(
        &self,
        token: CorrelationToken,
        timeout: Duration,
    ) -> Result<(RequestStatus, CompletedResult), ErrorKind> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();

        while !state.completion_fired {
            if self.completion.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }

        state.wait_pending = false;

        if state.completion_fired {
            let result = state.finished.take().unwrap_or_default();
            return Ok((state.status.clone(), result));
        }

        state.discard_late_results = true;
        state.status = RequestStatus::Failed(ErrorKind::Timeout);
        self.stats.timeouts.fetch_add(1, Ordering::Relaxed);
        warn!(
            class = %self.class,
            token = %token,
            timeout_ms = timeout.as_millis() as u64,
            chunks_received = state.accumulator.received(),
            "Operation timed out, late results will be discarded"
        );
        Err(ErrorKind::Timeout)
    }

    pub fn snapshot(&self) -> ContextSnapshot {
        let state = self.state.lock();
        ContextSnapshot {
            class: self.class,
            live_token: state.live_token,
            status: state.status.clone(),
            discard_late_results: state.discard_late_results,
            wait_pending: state.wait_pending,
            expected_more: state.accumulator.expected_more(),
            stats: self.stats.snapshot(),
        }
    }

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, ContextState> {
        self.state.lock()
    }

    /// Wake the waiter. Called with the state lock held, after setting
    /// `completion_fired`.
    pub(crate) fn notify_completion(&self) {
        self.completion.notify_one();
    }
}
