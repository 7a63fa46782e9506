//! Record store and sequence counter backends.
//!
//! - [`InMemoryRecordStore`] / [`InMemoryCounter`]: process-local, for tests
//!   and single-process deployments.
//! - [`MySqlRecordStore`] / [`MySqlCounter`]: durable, shared by any number
//!   of processes through unique constraints and atomic updates.
//! - [`RedisCounter`]: a counter on a single Redis key.

pub mod memory;
pub mod mysql;
pub mod redis;

pub use memory::{InMemoryCounter, InMemoryRecordStore};
pub use mysql::{MySqlCounter, MySqlRecordStore};
pub use crate::redis::RedisCounter;
pub use seqlink_core::{Insertion, Record, RecordStore, SequenceCounter, StorageError};
