//! # Shared Types Crate
//!
//! Identifiers and the error taxonomy shared by every crate in the bridge.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: `CorrelationToken`, `OperationClass`,
//!   `MacAddr` and `ErrorKind` are defined once and re-used everywhere.
//! - **Opaque Tokens**: the correlation engine never interprets a token beyond
//!   equality; wire formats belong to the marshaling layer.

pub mod entities;
pub mod errors;

pub use entities::*;
pub use errors::*;
