//! # Bridge Container
//!
//! Configuration loading for the runtime.

pub mod config;

pub use config::*;
