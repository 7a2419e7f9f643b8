//! # Error Handling
//!
//! Errors raised while decoding identifiers, matching rules and talking to the
//! ACL service through the proxy. Retries are decided on these values, so every
//! failure keeps its original message for diagnostics.

pub mod types;

pub use types::{AclError, Result, EVENT_LOCKED_MARKER};
