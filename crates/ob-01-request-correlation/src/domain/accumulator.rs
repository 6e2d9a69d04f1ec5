//! # Result Accumulator
//!
//! Collects the chunks of one multi-part result. Single-chunk operations go
//! through the same path with a single terminal chunk.
//!
//! The accumulator is terminal only once a chunk with `more_data == false`
//! has been merged; the aggregator never fires completion before that.

use bytes::{Bytes, BytesMut};
use shared_types::StatusCode;

use super::status::RequestStatus;

/// Finalized result moved out of the accumulator on the terminal chunk.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompletedResult {
    /// Stored chunks in delivery order.
    pub chunks: Vec<Bytes>,
    /// Chunks received, including any that were not stored.
    pub chunk_count: usize,
    /// True when the size bound cut the result. `chunks` then holds the
    /// leading chunks up to the first one that did not fit.
    pub truncated: bool,
}

impl CompletedResult {
    /// Total stored payload bytes.
    pub fn len(&self) -> usize {
        self.chunks.iter().map(Bytes::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All stored chunks joined into one buffer.
    pub fn concat(&self) -> Bytes {
        match self.chunks.as_slice() {
            [] => Bytes::new(),
            [single] => single.clone(),
            many => {
                let mut buf = BytesMut::with_capacity(self.len());
                for chunk in many {
                    buf.extend_from_slice(chunk);
                }
                buf.freeze()
            }
        }
    }
}

/// Per-context accumulator for partial results.
#[derive(Debug)]
pub struct ResultAccumulator {
    chunks: Vec<Bytes>,
    stored_bytes: usize,
    max_bytes: usize,
    received: usize,
    truncated: bool,
    expected_more: bool,
    partial_status: RequestStatus,
}

impl ResultAccumulator {
    /// Create an empty accumulator bounded to `max_bytes` of stored payload.
    pub fn new(max_bytes: usize) -> Self {
        Self {
            chunks: Vec::new(),
            stored_bytes: 0,
            max_bytes,
            received: 0,
            truncated: false,
            expected_more: false,
            partial_status: RequestStatus::Pending,
        }
    }

    /// Merge one chunk.
    pub fn merge(&mut self, payload: Bytes, code: StatusCode, more_data: bool) {
        self.received += 1;
        self.partial_status = self.partial_status.fold(code);
        self.expected_more = more_data;

        // Once a chunk is cut, later ones are not stored either, so the
        // result is always a prefix of what the firmware sent.
        if payload.is_empty() || self.truncated {
            return;
        }
        if self.stored_bytes + payload.len() > self.max_bytes {
            self.truncated = true;
            return;
        }
        self.stored_bytes += payload.len();
        self.chunks.push(payload);
    }

    /// True once the last merged chunk carried no more-data flag.
    pub fn is_terminal(&self) -> bool {
        self.received > 0 && !self.expected_more
    }

    pub fn expected_more(&self) -> bool {
        self.expected_more
    }

    pub fn partial_status(&self) -> &RequestStatus {
        &self.partial_status
    }

    pub fn received(&self) -> usize {
        self.received
    }

    pub fn stored_bytes(&self) -> usize {
        self.stored_bytes
    }

    /// Move the collected result out and reset for the next operation.
    pub fn take(&mut self) -> (RequestStatus, CompletedResult) {
        let status = std::mem::take(&mut self.partial_status);
        let result = CompletedResult {
            chunks: std::mem::take(&mut self.chunks),
            chunk_count: self.received,
            truncated: self.truncated,
        };
        self.reset();
        (status, result)
    }

    pub fn reset(&mut self) {
        self.chunks.clear();
        self.stored_bytes = 0;
        self.received = 0;
        self.truncated = false;
        self.expected_more = false;
        self.partial_status = RequestStatus::Pending;
    }
}
