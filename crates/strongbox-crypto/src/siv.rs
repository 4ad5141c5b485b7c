//! AES-SIV deterministic authenticated encryption (RFC 5297)
//!
//! S2V is built on the `cmac` module; the keystream comes from AES-256-CTR.
//! The 16-byte synthetic IV doubles as the authentication tag: decryption
//! re-derives it over the recovered plaintext and compares in constant time.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{KeyIvInit, StreamCipher};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::cmac::{cmac, dbl, pad, xor_in, Aes256Block, ZERO_BLOCK};
use crate::error::{CryptoError, Result};
use crate::BLOCK_SIZE;

type Aes256Ctr = ctr::Ctr128BE<aes::Aes256>;

/// Maximum number of associated-data fields (S2V bit-length limit:
/// block size in bits minus 2).
const MAX_ASSOCIATED_DATA: usize = 126;

pub struct SivCipher {
    ctr_key: [u8; 32],
    mac_cipher: Aes256Block,
}

impl Drop for SivCipher {
    fn drop(&mut self) {
        self.ctr_key.zeroize();
    }
}

impl SivCipher {
    /// SIV mode requires two separate keys, see RFC 5297 section 2.2.
    pub fn new(aes_key: &[u8; 32], mac_key: &[u8; 32]) -> Self {
        Self {
            ctr_key: *aes_key,
            mac_cipher: Aes256Block::new(mac_key),
        }
    }

    /// Encrypts `plaintext`, authenticating the associated-data fields in the
    /// given order. Returns `iv || ciphertext`.
    pub fn encrypt(&self, plaintext: &[u8], ad: &[&[u8]]) -> Result<Vec<u8>> {
        if plaintext.len() as u64 > u64::from(u32::MAX) - BLOCK_SIZE as u64 {
            return Err(CryptoError::InvalidParameter(
                "plaintext must not be longer than 2^32 - 16 bytes".into(),
            ));
        }
        let iv = self.s2v(plaintext, ad)?;
        let mut out = Vec::with_capacity(BLOCK_SIZE + plaintext.len());
        out.extend_from_slice(&iv);
        out.extend_from_slice(&self.ctr_crypt(&iv, plaintext));
        Ok(out)
    }

    /// Decrypts `ciphertext` (`iv || body`), verifying the associated data.
    pub fn decrypt(&self, ciphertext: &[u8], ad: &[&[u8]]) -> Result<Vec<u8>> {
        if ciphertext.len() < BLOCK_SIZE {
            return Err(CryptoError::InvalidParameter(
                "ciphertext must be at least 16 bytes".into(),
            ));
        }
        let mut iv = [0u8; BLOCK_SIZE];
        iv.copy_from_slice(&ciphertext[..BLOCK_SIZE]);
        let plaintext = self.ctr_crypt(&iv, &ciphertext[BLOCK_SIZE..]);
        let control = self.s2v(&plaintext, ad)?;
        if bool::from(control.ct_eq(&iv)) {
            Ok(plaintext)
        } else {
            Err(CryptoError::UnauthenticCiphertext)
        }
    }

    /// S2V (RFC 5297 section 2.4). `plaintext` is always the final vector
    /// element, so the n == 0 case of the RFC cannot occur here.
    fn s2v(&self, plaintext: &[u8], ad: &[&[u8]]) -> Result<[u8; BLOCK_SIZE]> {
        if ad.len() > MAX_ASSOCIATED_DATA {
            return Err(CryptoError::InvalidParameter(
                "too many associated data fields".into(),
            ));
        }

        let mut d = cmac(&self.mac_cipher, &ZERO_BLOCK);
        for s in ad {
            let mut next = dbl(&d);
            xor_in(&mut next, &cmac(&self.mac_cipher, s));
            d = next;
        }

        let t = if plaintext.len() >= BLOCK_SIZE {
            xorend(plaintext, &d)
        } else {
            let mut block = dbl(&d);
            xor_in(&mut block, &pad(plaintext));
            block.to_vec()
        };

        Ok(cmac(&self.mac_cipher, &t))
    }

    /// AES-CTR with the 31st and 63rd bit of the IV cleared
    /// (RFC 5297 section 2.5).
    fn ctr_crypt(&self, iv: &[u8; BLOCK_SIZE], data: &[u8]) -> Vec<u8> {
        let mut ctr_iv = *iv;
        ctr_iv[8] &= 0x7F;
        ctr_iv[12] &= 0x7F;
        aes256_ctr(&self.ctr_key, &ctr_iv, data)
    }
}

/// AES-256-CTR keystream application (encrypt == decrypt). Shared with the
/// CTR-then-HMAC content cipher.
pub(crate) fn aes256_ctr(key: &[u8; 32], iv: &[u8; BLOCK_SIZE], data: &[u8]) -> Vec<u8> {
    let mut cipher = Aes256Ctr::new(
        GenericArray::from_slice(key),
        GenericArray::from_slice(iv),
    );
    let mut buf = data.to_vec();
    cipher.apply_keystream(&mut buf);
    buf
}

/// XORs `mask` into the last `mask.len()` bytes of `data`, leaving earlier
/// bytes unchanged.
fn xorend(data: &[u8], mask: &[u8; BLOCK_SIZE]) -> Vec<u8> {
    debug_assert!(data.len() >= mask.len());
    let mut out = data.to_vec();
    let offset = data.len() - mask.len();
    xor_in(&mut out[offset..], mask);
    out
}
