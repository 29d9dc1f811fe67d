//! Storage abstraction layer for scopesearch.
//!
//! The search subsystem never owns entity data. It reads attributes and walks
//! relationships through [`EntityStore`] and learns about changes through
//! [`ChangeObserver`]. [`MemoryStore`] is an in-memory implementation of both
//! sides.

pub mod event;
pub mod memory;
pub mod traits;

// Re-export commonly used types
pub use event::{ChangeEvent, ChangeKind, ChangeObserver, LinkAction};
pub use memory::MemoryStore;
pub use traits::EntityStore;
