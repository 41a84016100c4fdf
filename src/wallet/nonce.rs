use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

// EIP-4361: nonce is at least 8 alphanumeric characters.
static NONCE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new("^[A-Za-z0-9]{8,}$").unwrap());

#[derive(Debug, Error, PartialEq, Eq)]
#[error("nonce must be at least 8 alphanumeric characters")]
pub struct InvalidNonce;

/// Single-use random token preventing replay of a signed message.
///
/// The raw value travels to the client (JSON body + cookie); storage only
/// ever sees its hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nonce(String);

impl Nonce {
    #[must_use]
    pub fn generate() -> Self {
        Self(siwe::generate_nonce())
    }

    /// Validate an externally supplied nonce value.
    ///
    /// # Errors
    /// Returns `InvalidNonce` if the value is not `^[A-Za-z0-9]{8,}$`.
    pub fn parse(value: impl Into<String>) -> Result<Self, InvalidNonce> {
        let value = value.into();
        if NONCE_REGEX.is_match(&value) {
            Ok(Self(value))
        } else {
            Err(InvalidNonce)
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Nonce {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_nonce_is_well_formed() {
        let nonce = Nonce::generate();
        assert!(NONCE_REGEX.is_match(nonce.as_str()));
    }

    #[test]
    fn generated_nonces_differ() {
        assert_ne!(Nonce::generate(), Nonce::generate());
    }

    #[test]
    fn parse_accepts_alphanumeric() {
        let nonce = Nonce::parse("a1B2c3D4e5");
        assert_eq!(nonce.as_ref().map(Nonce::as_str), Ok("a1B2c3D4e5"));
    }

    #[test]
    fn parse_rejects_short_values() {
        assert_eq!(Nonce::parse("abc123"), Err(InvalidNonce));
    }

    #[test]
    fn parse_rejects_symbols() {
        assert_eq!(Nonce::parse("abcd-1234"), Err(InvalidNonce));
        assert_eq!(Nonce::parse("abcd 1234"), Err(InvalidNonce));
    }
}
