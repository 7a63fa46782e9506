//! URL shortener service implementation.
//!
//! This crate wires a [`RecordStore`](seqlink_core::RecordStore), a
//! [`SequenceCounter`](seqlink_core::SequenceCounter) and a
//! [`CodeAlphabet`](seqlink_core::CodeAlphabet) into the
//! [`Shortener`](seqlink_core::Shortener) entry point. Core types are
//! re-exported from `seqlink_core`.

pub mod service;

pub use seqlink_core::{CodeAlphabet, Record, ShortCode, Shortener, ShortenerError};
pub use service::{HitRecording, ShortenerService, ShortenerSettings};
