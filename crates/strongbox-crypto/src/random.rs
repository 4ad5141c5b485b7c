//! Injectable randomness source
//!
//! Nonces, content keys, and scrypt salts are drawn through [`SecureRandom`]
//! so the full header/chunk pipeline can be exercised with deterministic
//! bytes in tests. Production code uses [`OsRandom`] exclusively.

use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::{CryptoError, Result};

pub trait SecureRandom {
    /// Fill `dest` with random bytes, or fail with [`CryptoError::CsprngError`]
    /// if the underlying source is unavailable.
    fn fill_bytes(&self, dest: &mut [u8]) -> Result<()>;

    fn random_bytes(&self, len: usize) -> Result<Vec<u8>> {
        let mut bytes = vec![0u8; len];
        self.fill_bytes(&mut bytes)?;
        Ok(bytes)
    }
}

/// The operating system CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRandom;

impl SecureRandom for OsRandom {
    fn fill_bytes(&self, dest: &mut [u8]) -> Result<()> {
        OsRng
            .try_fill_bytes(dest)
            .map_err(|_| CryptoError::CsprngError)
    }
}

/// Test double yielding a constant byte, mirroring the fixed-byte generator
/// used for the known-answer vectors.
#[cfg(test)]
#[derive(Debug, Clone, Copy)]
pub(crate) struct FixedRandom(pub u8);

#[cfg(test)]
impl SecureRandom for FixedRandom {
    fn fill_bytes(&self, dest: &mut [u8]) -> Result<()> {
        dest.fill(self.0);
        Ok(())
    }
}
