//! # Domain Layer for Request Correlation
//!
//! Pure correlation logic. The only blocking primitive here is the
//! completion condvar owned by each `RequestContext`.
//!
//! ## Contents
//!
//! - **token**: `TokenSource` producing fresh correlation tokens
//! - **status**: `RequestStatus` and the rolling-status rule
//! - **accumulator**: `ResultAccumulator` for multi-chunk results
//! - **context**: `RequestContext` (live token, status, discard flag, completion)
//! - **aggregator**: `ResultAggregator` matching events to the live context
//! - **table**: `ContextTable`, one context per `OperationClass`
//! - **config**: `DispatchConfig` (per-class timeouts, result bound)

mod accumulator;
mod aggregator;
mod config;
mod context;
mod status;
mod table;
mod token;

pub use accumulator::{CompletedResult, ResultAccumulator};
pub use aggregator::{DropReason, EventDisposition, ResultAggregator};
pub use config::{DispatchConfig, DEFAULT_MAX_RESULT_BYTES, DEFAULT_TIMEOUT};
pub use context::{ContextSnapshot, ContextStats, ContextStatsSnapshot, RequestContext};
pub use status::RequestStatus;
pub use table::ContextTable;
pub use token::TokenSource;
