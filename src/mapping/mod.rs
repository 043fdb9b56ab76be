//! Bidirectional mapping between source lines and rendered offsets.
//!
//! The renderer reports a [`Block`] list after every layout pass;
//! [`MappingStore`] turns it into an immutable [`MappingTable`] and
//! publishes it to readers.

mod store;
mod table;
mod types;

pub use store::MappingStore;
pub use table::MappingTable;
pub use types::{Block, BlockId, BlockKind, MappingInconsistency};
