//! # Integration Tests
//!
//! The correlation engine and the peer-link service wired together the way
//! the runtime wires them, with timing controlled by the test.

#[cfg(test)]
mod support;

#[cfg(test)]
mod scenarios;

#[cfg(test)]
mod properties;
