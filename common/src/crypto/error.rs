use thiserror::Error;

/// Errors that can occur during cryptographic operations
///
/// This error type provides structured error handling for all crypto module
/// operations, eliminating the need for .unwrap() calls that could cause panics.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Invalid hexadecimal string format
    #[error("Invalid hex string: {0}")]
    InvalidHex(String),

    /// Hash has invalid length
    #[error("Invalid hash length: {len} bytes, expected: {expected} bytes")]
    InvalidHashLength { len: usize, expected: usize },
}
