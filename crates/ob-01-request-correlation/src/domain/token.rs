//! Correlation token generation.

use shared_types::CorrelationToken;
use std::sync::atomic::{AtomicU32, Ordering};

/// Produces fresh tokens for the dispatcher.
///
/// Tokens wrap around after `u32::MAX`; uniqueness is only required within
/// one context at a time, and a context never holds more than one live token.
#[derive(Debug)]
pub struct TokenSource {
    next: AtomicU32,
}

impl TokenSource {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Start the sequence at `seed` (tests use this to force wrap-around).
    pub fn starting_at(seed: u32) -> Self {
        Self {
            next: AtomicU32::new(seed),
        }
    }

    pub fn next(&self) -> CorrelationToken {
        CorrelationToken::new(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for TokenSource {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_are_sequential() {
        let source = TokenSource::starting_at(10);
        assert_eq!(source.next(), CorrelationToken::new(10));
        assert_eq!(source.next(), CorrelationToken::new(11));
    }

    #[test]
    fn test_tokens_wrap() {
        let source = TokenSource::starting_at(u32::MAX);
        assert_eq!(source.next().as_u32(), u32::MAX);
        assert_eq!(source.next().as_u32(), 0);
    }
}
