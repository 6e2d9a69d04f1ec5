//! # Offload-Bridge Test Suite
//!
//! Cross-crate tests that drive the bridge through its public surface with a
//! scripted control entity on the other side of the queues.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── support.rs      # Scripted collaborator, fixtures
//!     ├── scenarios.rs    # End-to-end scenarios A, B, C
//!     └── properties.rs   # Property tests over the wired bridge
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p ob-tests
//! cargo test -p ob-tests integration::scenarios::
//! ```

#![allow(dead_code)]

pub mod integration;
