use thiserror::Error;

/// Errors related to the core functionality of the URL shortener service.
pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("invalid short code: {0}")]
    InvalidCode(String),
    #[error("invalid alphabet: {0}")]
    InvalidAlphabet(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CounterError {
    #[error("sequence counter unavailable: {0}")]
    Unavailable(String),
    #[error("sequence counter exhausted")]
    Exhausted,
}

#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// A record already exists under this code. Generated codes are unique
    /// by construction, so this is an integrity violation.
    #[error("short code already exists: {0}")]
    DuplicateCode(String),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    /// The backend cannot represent the value it was asked to store.
    #[error("value not supported by storage backend: {0}")]
    Unsupported(String),
}

#[derive(Debug, Clone, Error)]
pub enum ShortenerError {
    #[error("invalid short code: {0}")]
    InvalidCode(String),
    #[error("short code not found: {0}")]
    NotFound(String),
    #[error("short code already exists: {0}")]
    DuplicateCode(String),
    #[error("sequence counter unavailable: {0}")]
    CounterUnavailable(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("invalid configuration: {0}")]
    Configuration(String),
    /// The URL cannot be stored by the configured backend. Retrying the
    /// same URL fails the same way.
    #[error("url not supported: {0}")]
    UnsupportedUrl(String),
}

impl ShortenerError {
    /// Whether the caller should present this as a missing link.
    ///
    /// Malformed codes are reported the same way as unknown ones so the
    /// code format is not leaked to end users.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::InvalidCode(_))
    }

    /// Whether the failure came from infrastructure and may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::CounterUnavailable(_) | Self::Storage(_))
    }
}

impl From<CoreError> for ShortenerError {
    fn from(value: CoreError) -> Self {
        match value {
            CoreError::InvalidCode(message) => Self::InvalidCode(message),
            CoreError::InvalidAlphabet(message) => Self::Configuration(message),
        }
    }
}

impl From<CounterError> for ShortenerError {
    fn from(value: CounterError) -> Self {
        Self::CounterUnavailable(value.to_string())
    }
}

impl From<StorageError> for ShortenerError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::DuplicateCode(code) => Self::DuplicateCode(code),
            StorageError::Unsupported(message) => Self::UnsupportedUrl(message),
            other => Self::Storage(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_code_reads_as_not_found() {
        let err = ShortenerError::from(CoreError::InvalidCode("a/b".to_string()));
        assert!(err.is_not_found());
        assert!(!err.is_retryable());
    }

    #[test]
    fn counter_failures_are_retryable() {
        let err = ShortenerError::from(CounterError::Unavailable("connection refused".into()));
        assert!(matches!(err, ShortenerError::CounterUnavailable(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn duplicate_code_is_not_retryable() {
        let err = ShortenerError::from(StorageError::DuplicateCode("abc".into()));
        assert!(matches!(err, ShortenerError::DuplicateCode(ref code) if code == "abc"));
        assert!(!err.is_retryable());
        assert!(!err.is_not_found());
    }

    #[test]
    fn unsupported_url_is_not_retryable() {
        let err = ShortenerError::from(StorageError::Unsupported("non-ASCII url".into()));
        assert!(matches!(err, ShortenerError::UnsupportedUrl(_)));
        assert!(!err.is_retryable());
        assert!(!err.is_not_found());
    }
}
