//! rollbacker-state — durable record of the last image each container was
//! observed healthy on.
//!
//! The record is a single JSON object mapping container names to image
//! references. It is read in full on every load and rewritten in full on
//! every save; a missing file is an empty record.
//!
//! Saves go through a sibling temporary file that is renamed over the
//! target, so a crash mid-write leaves the previous record intact.

pub mod error;
pub mod store;

pub use error::{StateError, StateResult};
pub use store::{GoodImageRecord, GoodImageStore};
