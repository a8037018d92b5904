//! Error types
//!
//! Re-exports the unified error from the poe-error crate.

pub use poe_error::{PoeError, Result};
