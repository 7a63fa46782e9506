use crate::error::{CoreError, Result};
use crate::shortcode::ShortCode;
use std::fmt;
use std::str::FromStr;

/// Lowercase letters, then uppercase letters, then digits.
pub const DEFAULT_SYMBOLS: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

const MIN_SYMBOLS: usize = 2;

/// Length of the longest code any alphabet can produce: `u64::MAX` in the
/// two-symbol alphabet.
pub const MAX_CODE_LEN: usize = 64;

/// An ordered symbol set that maps sequence numbers to short codes.
///
/// Codes are bijective base-K numerals, where K is the number of symbols.
/// Every non-negative integer has exactly one code and every non-empty
/// string over the alphabet is the code of exactly one integer. Codes are
/// ordered by length first, then lexicographically by symbol position, so
/// with the default alphabet the sequence runs `a`, `b`, ..., `9`, `aa`,
/// `ab`, ... and each code is as short as the alphabet allows.
///
/// Symbols are restricted to ASCII alphanumerics, `-` and `_`, so a code can
/// never contain a character with meaning in a URL path.
#[derive(Clone, PartialEq, Eq)]
pub struct CodeAlphabet {
    symbols: Box<[u8]>,
    digits: [Option<u8>; 128],
}

impl CodeAlphabet {
    /// Builds an alphabet from an ordered list of symbols.
    ///
    /// Fails if there are fewer than two symbols, if a symbol repeats, or if
    /// a symbol is outside `[a-zA-Z0-9_-]`.
    pub fn new(symbols: &str) -> Result<Self> {
        let mut digits = [None; 128];
        let mut ordered = Vec::with_capacity(symbols.len());

        for symbol in symbols.chars() {
            if !is_allowed_symbol(symbol) {
                return Err(CoreError::InvalidAlphabet(format!(
                    "symbol {symbol:?} is not allowed; use only alphanumeric characters, hyphens, or underscores"
                )));
            }

            // allowed symbols are ASCII, so both casts are lossless
            let byte = symbol as u8;
            let slot = &mut digits[usize::from(byte)];
            if slot.is_some() {
                return Err(CoreError::InvalidAlphabet(format!(
                    "symbol {symbol:?} appears more than once"
                )));
            }
            *slot = Some(ordered.len() as u8);
            ordered.push(byte);
        }

        if ordered.len() < MIN_SYMBOLS {
            return Err(CoreError::InvalidAlphabet(format!(
                "at least {} symbols are required, got {}",
                MIN_SYMBOLS,
                ordered.len()
            )));
        }

        Ok(Self {
            symbols: ordered.into_boxed_slice(),
            digits,
        })
    }

    /// Number of symbols, the K in bijective base-K.
    pub fn radix(&self) -> usize {
        self.symbols.len()
    }

    /// The symbols in order.
    pub fn symbols(&self) -> &str {
        // every stored byte came from an ASCII char
        std::str::from_utf8(&self.symbols).unwrap_or_default()
    }

    /// Renders a sequence number as its shortest code.
    pub fn encode(&self, n: u64) -> ShortCode {
        let radix = self.radix() as u128;
        // widened so that u64::MAX + 1 does not overflow
        let mut value = u128::from(n) + 1;
        let mut code = Vec::new();

        while value > 0 {
            value -= 1;
            code.push(self.symbols[(value % radix) as usize]);
            value /= radix;
        }

        code.reverse();
        ShortCode::new_unchecked(code.into_iter().map(char::from).collect::<String>())
    }

    /// Recovers the sequence number a code was rendered from.
    pub fn decode(&self, code: &str) -> Result<u64> {
        if code.is_empty() {
            return Err(CoreError::InvalidCode("code cannot be empty".to_string()));
        }

        let radix = self.radix() as u128;
        let out_of_range = || CoreError::InvalidCode(format!("code is out of range: '{code}'"));
        let mut value: u128 = 0;

        for symbol in code.chars() {
            let digit = self.digit(symbol).ok_or_else(|| {
                CoreError::InvalidCode(format!(
                    "symbol {symbol:?} is not in the alphabet: '{code}'"
                ))
            })?;
            value = value
                .checked_mul(radix)
                .and_then(|v| v.checked_add(u128::from(digit) + 1))
                .ok_or_else(out_of_range)?;
        }

        u64::try_from(value - 1).map_err(|_| out_of_range())
    }

    /// Validates untrusted input as a code of this alphabet.
    ///
    /// Only the symbols are checked. A well-formed code too long to have
    /// been encoded from a `u64` is accepted; it is never stored, so a
    /// lookup for it misses.
    pub fn parse(&self, code: &str) -> Result<ShortCode> {
        if code.is_empty() {
            return Err(CoreError::InvalidCode("code cannot be empty".to_string()));
        }

        if let Some(symbol) = code.chars().find(|&symbol| self.digit(symbol).is_none()) {
            return Err(CoreError::InvalidCode(format!(
                "symbol {symbol:?} is not in the alphabet: '{code}'"
            )));
        }

        Ok(ShortCode::new_unchecked(code))
    }

    fn digit(&self, symbol: char) -> Option<u8> {
        if !symbol.is_ascii() {
            return None;
        }
        self.digits[symbol as usize]
    }
}

fn is_allowed_symbol(symbol: char) -> bool {
    symbol.is_ascii_alphanumeric() || symbol == '-' || symbol == '_'
}

impl Default for CodeAlphabet {
    fn default() -> Self {
        Self::new(DEFAULT_SYMBOLS).unwrap_or_else(|_| unreachable!("default alphabet is valid"))
    }
}

impl FromStr for CodeAlphabet {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl fmt::Debug for CodeAlphabet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CodeAlphabet").field(&self.symbols()).finish()
    }
}

impl fmt::Display for CodeAlphabet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbols())
    }
}
