//! Client-side entity cache.
//!
//! This module provides the process-wide cache the query/mutation layer
//! sits on:
//! - One id-keyed map per entity kind, with a per-kind bulk-refresh stamp
//! - Durable mirroring of the whole state as a single snapshot blob
//! - An explicit load/save boundary so tests can swap in an in-memory
//!   stand-in for the sqlite backend

mod store;
mod storage;
mod traits;

pub use storage::{MemoryStorage, NoopStorage, SqliteStorage, Storage, StoreSnapshot, STORAGE_KEY};
pub use store::EntityStore;
pub use traits::{CacheResult, CacheSource, Cacheable};
