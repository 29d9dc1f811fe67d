//! Search execution: the engine, its backend seam and result handling.

pub mod backend;
pub mod cache;
pub mod engine;
pub mod memory;
pub mod permission;
pub mod result;

pub use self::backend::{IndexedDocument, ScopeRequest, SearchBackend};
pub use self::cache::ResultCache;
pub use self::engine::SearchEngine;
pub use self::memory::MemoryBackend;
pub use self::permission::{Actor, AllowAll, Grant, GrantPermissions, PermissionChecker};
pub use self::result::ResultSet;
