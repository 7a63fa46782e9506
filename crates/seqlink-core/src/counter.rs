use crate::error::CounterError;
use async_trait::async_trait;

/// The internal number a short code is derived from.
pub type SequenceNumber = u64;

pub type Result<T> = std::result::Result<T, CounterError>;

/// A shared, persisted source of sequence numbers.
///
/// Implementations hand out `0, 1, 2, ...` in issuance order. A value is
/// returned at most once per counter, even across concurrent callers and
/// process restarts, and no value is skipped unless a caller discards it.
/// When the backing store cannot confirm an increment, `next` fails with
/// [`CounterError::Unavailable`] rather than guessing a value.
#[async_trait]
pub trait SequenceCounter: Send + Sync + 'static {
    /// Issues the next sequence number.
    async fn next(&self) -> Result<SequenceNumber>;

    /// Returns the number the next call to [`next`](Self::next) would issue,
    /// without consuming it.
    async fn peek(&self) -> Result<SequenceNumber>;
}

#[async_trait]
impl<T: SequenceCounter + ?Sized> SequenceCounter for Box<T> {
    async fn next(&self) -> Result<SequenceNumber> {
        (**self).next().await
    }

    async fn peek(&self) -> Result<SequenceNumber> {
        (**self).peek().await
    }
}
