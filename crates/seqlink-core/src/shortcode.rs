use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// The public identifier of a shortened URL.
///
/// Codes are produced by [`CodeAlphabet::encode`](crate::CodeAlphabet::encode)
/// and validated with [`CodeAlphabet::parse`](crate::CodeAlphabet::parse);
/// a `ShortCode` never carries characters outside its alphabet.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShortCode(String);

impl ShortCode {
    /// Creates a `ShortCode` without validation.
    ///
    /// Use this only for codes produced by trusted internal sources
    /// (the alphabet encoder, or rows read back from storage).
    pub fn new_unchecked(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Generates the full shortened URL based on the provided base URL.
    pub fn to_url(&self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self)
    }

    /// Returns the short code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl Display for ShortCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ShortCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<ShortCode> for String {
    fn from(code: ShortCode) -> Self {
        code.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_code() {
        let code = ShortCode::new_unchecked("aZ9");
        assert_eq!(code.to_string(), "aZ9");
        assert_eq!(String::from(code), "aZ9");
    }

    #[test]
    fn to_url() {
        let code = ShortCode::new_unchecked("abD12");
        assert_eq!(
            code.to_url("https://short.example"),
            "https://short.example/abD12"
        );
        assert_eq!(
            code.to_url("https://short.example/"),
            "https://short.example/abD12"
        );
    }

    #[test]
    fn serializes_as_plain_string() {
        let code = ShortCode::new_unchecked("ab");
        let json = serde_json::to_string(&code).unwrap();
        assert_eq!(json, "\"ab\"");
    }
}
