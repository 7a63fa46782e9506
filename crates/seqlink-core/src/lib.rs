//! Core types and traits for the seqlink URL shortener.
//!
//! This crate defines the short-code alphabet and the contracts for the
//! sequence counter and record store that the shortener service is built on.

pub mod alphabet;
pub mod counter;
pub mod error;
pub mod shortcode;
pub mod shortener;
pub mod store;

pub use alphabet::{CodeAlphabet, DEFAULT_SYMBOLS, MAX_CODE_LEN};
pub use counter::{SequenceCounter, SequenceNumber};
pub use error::{CoreError, CounterError, ShortenerError, StorageError};
pub use shortcode::ShortCode;
pub use shortener::Shortener;
pub use store::{Insertion, Record, RecordStore};
