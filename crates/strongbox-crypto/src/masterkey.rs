//! The unlocked masterkey: two raw 256-bit keys, zeroized on drop

use zeroize::Zeroize;

use crate::error::Result;
use crate::random::{OsRandom, SecureRandom};
use crate::KEY_SIZE;

/// The two 256-bit vault keys. Immutable once constructed; share across
/// concurrent operations via `Arc` so zeroization happens only after the last
/// user releases it.
#[derive(Clone)]
pub struct Masterkey {
    aes_key: [u8; KEY_SIZE],
    mac_key: [u8; KEY_SIZE],
}

impl Masterkey {
    /// Creates a fresh masterkey from two independent CSPRNG draws.
    pub fn create_new() -> Result<Self> {
        Self::create_with_rng(&OsRandom)
    }

    pub fn create_with_rng(rng: &impl SecureRandom) -> Result<Self> {
        let mut aes_key = [0u8; KEY_SIZE];
        let mut mac_key = [0u8; KEY_SIZE];
        rng.fill_bytes(&mut aes_key)?;
        rng.fill_bytes(&mut mac_key)?;
        Ok(Self { aes_key, mac_key })
    }

    /// `aes_key` encrypts file-specific keys and names; `mac_key`
    /// authenticates.
    pub fn from_raw(aes_key: &[u8; KEY_SIZE], mac_key: &[u8; KEY_SIZE]) -> Self {
        Self {
            aes_key: *aes_key,
            mac_key: *mac_key,
        }
    }

    pub fn aes_key(&self) -> &[u8; KEY_SIZE] {
        &self.aes_key
    }

    pub fn mac_key(&self) -> &[u8; KEY_SIZE] {
        &self.mac_key
    }
}

impl Drop for Masterkey {
    fn drop(&mut self) {
        self.aes_key.zeroize();
        self.mac_key.zeroize();
    }
}

impl std::fmt::Debug for Masterkey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Masterkey")
            .field("aes_key", &"[REDACTED]")
            .field("mac_key", &"[REDACTED]")
            .finish()
    }
}
