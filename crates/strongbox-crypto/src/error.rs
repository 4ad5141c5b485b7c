use thiserror::Error;

pub type Result<T> = std::result::Result<T, CryptoError>;

/// Error taxonomy of the vault core.
///
/// Authentication failures (`UnauthenticCiphertext`, `InvalidPassphrase`) are
/// terminal for the operation that raised them and are never retried or
/// downgraded by this crate.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Malformed input shape, size, or encoding. A caller error, not a
    /// security signal.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Integrity check failed: wrong key, tampering, or corruption.
    #[error("unauthentic ciphertext")]
    UnauthenticCiphertext,

    /// Key unwrap integrity failure while unlocking a masterkey file.
    /// Surfaced distinctly so callers can prompt for re-entry.
    #[error("invalid passphrase")]
    InvalidPassphrase,

    /// Structural or encoding defect in a persisted masterkey file.
    #[error("malformed masterkey file: {0}")]
    MalformedKeyFile(String),

    /// System randomness unavailable. Fatal; there is no fallback source.
    #[error("system randomness unavailable")]
    CsprngError,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
