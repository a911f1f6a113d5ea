//! Document and chunk storage
//!
//! In-memory, `DashMap`-backed, with JSON snapshot persistence.

mod chunk_store;

pub use chunk_store::{ChunkStore, Snapshot};
