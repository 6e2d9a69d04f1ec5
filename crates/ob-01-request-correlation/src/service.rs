//! # Async Dispatcher
//!
//! Issues offload requests to the control entity and blocks the caller until
//! the correlated terminal result arrives or the wait bound passes.
//!
//! ## Architecture
//!
//! Implements both inbound ports:
//! - [`OffloadOperationApi`]: caller side, one blocking `issue` per class
//! - [`ControlEventSink`]: event-delivery side, never blocks
//!
//! Depends on one outbound port:
//! - [`ControlEntity`]: one-way `forward` of token-stamped requests
//!
//! ## Thread Safety
//!
//! Shareable via `Arc`. Each operation class owns an independent
//! `RequestContext`, so operations of different classes never contend.

use bytes::Bytes;
use shared_types::{ErrorKind, OperationClass};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::domain::{
    ContextSnapshot, ContextTable, DispatchConfig, EventDisposition, ResultAggregator, TokenSource,
};
use crate::events::{ControlEvent, ForwardedRequest, OperationOutcome};
use crate::ports::inbound::{ControlEventSink, OffloadOperationApi};
use crate::ports::outbound::ControlEntity;


/// Correlation engine front end.
pub struct AsyncDispatcher<E: ControlEntity> {
    config: DispatchConfig,
    table: ContextTable,
    aggregator: ResultAggregator,
    tokens: TokenSource,
    entity: Arc<E>,
}

impl<E: ControlEntity> AsyncDispatcher<E> {
    pub fn new(config: DispatchConfig, entity: Arc<E>) -> Self {
        Self::with_token_source(config, entity, TokenSource::new())
    }

    pub fn with_token_source(config: DispatchConfig, entity: Arc<E>, tokens: TokenSource) -> Self {
        info!(
            classes = OperationClass::COUNT,
            default_timeout_ms = config.default_timeout.as_millis() as u64,
            max_result_bytes = config.max_result_bytes,
            "Initializing async dispatcher"
        );
        Self {
            table: ContextTable::new(config.max_result_bytes),
            aggregator: ResultAggregator::new(),
            tokens,
            entity,
            config,
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn entity(&self) -> &Arc<E> {
        &self.entity
    }

    /// Run one dispatch / wait / correlate cycle.
    pub fn issue(
        &self,
        class: OperationClass,
        payload: Bytes,
        timeout: Duration,
    ) -> Result<OperationOutcome, ErrorKind> {
        let context = self.table.get(class);
        let token = self.tokens.next();
        let started = Instant::now();

        context.arm(token)?;

        debug!(
            class = %class,
            token = %token,
            payload_len = payload.len(),
            timeout_ms = timeout.as_millis() as u64,
            "Forwarding request"
        );

        // The context lock is not held here; the entity may emit events
        // before forward() returns.
        let request = ForwardedRequest {
            class,
            token,
            payload,
        };
        if let Err(rejection) = self.entity.forward(request) {
            context.disarm(token);
            warn!(
                class = %class,
                token = %token,
                reason = %rejection,
                "Control entity rejected request"
            );
            return Err(ErrorKind::DispatchRejected {
                reason: rejection.to_string(),
            });
        }

        let (status, result) = context.wait(token, timeout)?;
        let elapsed = started.elapsed();

        debug!(
            class = %class,
            token = %token,
            status = status.label(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Operation finished"
        );

        Ok(OperationOutcome::new(class, token, status, result, elapsed))
    }

    pub fn issue_default(
        &self,
        class: OperationClass,
        payload: Bytes,
    ) -> Result<OperationOutcome, ErrorKind> {
        self.issue(class, payload, self.config.timeout_for(class))
    }

    /// Route one inbound event to its context and run the aggregator.
    pub fn deliver(&self, event: ControlEvent) -> EventDisposition {
        let context = self.table.get(event.class);
        self.aggregator.on_event(
            context,
            event.token,
            event.more_data,
            event.payload,
            event.status,
        )
    }

    pub fn snapshot(&self, class: OperationClass) -> ContextSnapshot {
        self.table.get(class).snapshot()
    }

    /// Snapshots of every context, in table order.
    pub fn snapshots(&self) -> Vec<ContextSnapshot> {
        self.table.iter().map(|context| context.snapshot()).collect()
    }
}

impl<E: ControlEntity> OffloadOperationApi for AsyncDispatcher<E> {
    fn issue(
        &self,
        class: OperationClass,
        payload: Bytes,
        timeout: Duration,
    ) -> Result<OperationOutcome, ErrorKind> {
        AsyncDispatcher::issue(self, class, payload, timeout)
    }

    fn issue_default(
        &self,
        class: OperationClass,
        payload: Bytes,
    ) -> Result<OperationOutcome, ErrorKind> {
        AsyncDispatcher::issue_default(self, class, payload)
    }

    fn snapshot(&self, class: OperationClass) -> ContextSnapshot {
        AsyncDispatcher::snapshot(self, class)
    }
}

impl<E: ControlEntity> ControlEventSink for AsyncDispatcher<E> {
    fn deliver(&self, event: ControlEvent) -> EventDisposition {
        AsyncDispatcher::deliver(self, event)
    }
}
