use crate::shortcode::ShortCode;
use crate::store::Record;
use async_trait::async_trait;

type Result<T> = std::result::Result<T, crate::error::ShortenerError>;

#[async_trait]
pub trait Shortener: Send + Sync + 'static {
    /// Returns the code for a URL, allocating one if the URL is new.
    ///
    /// The URL must already be validated and normalized by the caller.
    async fn shorten(&self, long_url: &str) -> Result<ShortCode>;

    /// Resolves a code to its URL and counts the hit.
    async fn resolve(&self, code: &str) -> Result<String>;

    /// Returns the full record for a code without counting a hit.
    async fn inspect(&self, code: &str) -> Result<Record>;
}
