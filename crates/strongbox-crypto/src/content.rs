//! Per-chunk authenticated content encryption
//!
//! A closed set of schemes, selected when the vault format version is
//! resolved. The associated data binds each chunk to its index and to the
//! file's header nonce, preventing chunk reordering and cross-file splicing.
//!
//! The two variants intentionally disagree on AD byte order
//! (`headerNonce || chunkNumber` for CTR-then-HMAC, `chunkNumber ||
//! headerNonce` for GCM); each matches the ciphertexts of its format
//! generation and must not be unified.

use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, Payload};
use aes_gcm::{Aes256Gcm, KeyInit};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{CryptoError, Result};
use crate::masterkey::Masterkey;
use crate::siv::aes256_ctr;

type HmacSha256 = Hmac<Sha256>;

/// Cipher scheme of a vault format generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherCombo {
    /// Legacy: AES-CTR with a separate HMAC-SHA256 tag
    SivCtrMac,
    /// AES-GCM
    SivGcm,
}

pub enum ContentCipher {
    CtrThenHmac { mac_key: Zeroizing<[u8; 32]> },
    Gcm,
}

impl ContentCipher {
    /// The CTR-then-HMAC variant authenticates with the masterkey's MAC key;
    /// GCM needs no separate MAC key.
    pub fn new(combo: CipherCombo, masterkey: &Masterkey) -> Self {
        match combo {
            CipherCombo::SivCtrMac => ContentCipher::CtrThenHmac {
                mac_key: Zeroizing::new(*masterkey.mac_key()),
            },
            CipherCombo::SivGcm => ContentCipher::Gcm,
        }
    }

    pub fn nonce_len(&self) -> usize {
        match self {
            ContentCipher::CtrThenHmac { .. } => 16,
            ContentCipher::Gcm => 12,
        }
    }

    pub fn tag_len(&self) -> usize {
        match self {
            ContentCipher::CtrThenHmac { .. } => 32,
            ContentCipher::Gcm => 16,
        }
    }

    /// Associated data for one chunk. Byte order is variant-specific.
    pub fn associated_data(&self, chunk_number: u64, header_nonce: &[u8]) -> Vec<u8> {
        let mut ad = Vec::with_capacity(8 + header_nonce.len());
        match self {
            ContentCipher::CtrThenHmac { .. } => {
                ad.extend_from_slice(header_nonce);
                ad.extend_from_slice(&chunk_number.to_be_bytes());
            }
            ContentCipher::Gcm => {
                ad.extend_from_slice(&chunk_number.to_be_bytes());
                ad.extend_from_slice(header_nonce);
            }
        }
        ad
    }

    /// Encrypts one chunk. Returns `nonce || ciphertext || tag`.
    pub fn encrypt(&self, chunk: &[u8], key: &[u8; 32], nonce: &[u8], ad: &[u8]) -> Result<Vec<u8>> {
        if nonce.len() != self.nonce_len() {
            return Err(CryptoError::InvalidParameter(format!(
                "nonce must be {} bytes, got {}",
                self.nonce_len(),
                nonce.len()
            )));
        }
        match self {
            ContentCipher::CtrThenHmac { mac_key } => {
                let mut iv = [0u8; 16];
                iv.copy_from_slice(nonce);
                let ciphertext = aes256_ctr(key, &iv, chunk);
                let tag = hmac_tag(mac_key, ad, nonce, &ciphertext);
                let mut out = Vec::with_capacity(nonce.len() + ciphertext.len() + tag.len());
                out.extend_from_slice(nonce);
                out.extend_from_slice(&ciphertext);
                out.extend_from_slice(&tag);
                Ok(out)
            }
            ContentCipher::Gcm => {
                let cipher = Aes256Gcm::new(GenericArray::from_slice(key));
                let sealed = cipher
                    .encrypt(
                        GenericArray::from_slice(nonce),
                        Payload { msg: chunk, aad: ad },
                    )
                    .map_err(|_| {
                        CryptoError::InvalidParameter("AES-GCM encryption failed".into())
                    })?;
                let mut out = Vec::with_capacity(nonce.len() + sealed.len());
                out.extend_from_slice(nonce);
                out.extend_from_slice(&sealed);
                Ok(out)
            }
        }
    }

    /// Decrypts one chunk (`nonce || ciphertext || tag`), verifying its tag
    /// before any plaintext is released.
    pub fn decrypt(&self, chunk: &[u8], key: &[u8; 32], ad: &[u8]) -> Result<Vec<u8>> {
        if chunk.len() < self.nonce_len() + self.tag_len() {
            return Err(CryptoError::InvalidParameter(
                "ciphertext chunk must at least contain nonce + tag".into(),
            ));
        }
        match self {
            ContentCipher::CtrThenHmac { mac_key } => {
                let tag_start = chunk.len() - self.tag_len();
                let (nonce, rest) = chunk.split_at(self.nonce_len());
                let (ciphertext, expected_tag) = rest.split_at(tag_start - self.nonce_len());

                // Mac::verify_slice compares in constant time.
                let mut mac = <HmacSha256 as Mac>::new_from_slice(mac_key.as_ref())
                    .expect("HMAC accepts any key length");
                mac.update(ad);
                mac.update(nonce);
                mac.update(ciphertext);
                mac.verify_slice(expected_tag)
                    .map_err(|_| CryptoError::UnauthenticCiphertext)?;

                let mut iv = [0u8; 16];
                iv.copy_from_slice(nonce);
                Ok(aes256_ctr(key, &iv, ciphertext))
            }
            ContentCipher::Gcm => {
                let (nonce, sealed) = chunk.split_at(self.nonce_len());
                let cipher = Aes256Gcm::new(GenericArray::from_slice(key));
                cipher
                    .decrypt(
                        GenericArray::from_slice(nonce),
                        Payload { msg: sealed, aad: ad },
                    )
                    .map_err(|_| CryptoError::UnauthenticCiphertext)
            }
        }
    }
}

fn hmac_tag(mac_key: &[u8; 32], ad: &[u8], nonce: &[u8], ciphertext: &[u8]) -> Vec<u8> {
    let mut mac =
        <HmacSha256 as Mac>::new_from_slice(mac_key).expect("HMAC accepts any key length");
    mac.update(ad);
    mac.update(nonce);
    mac.update(ciphertext);
    mac.finalize().into_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_masterkey() -> Masterkey {
        Masterkey::from_raw(&[0x55u8; 32], &[0x77u8; 32])
    }

    fn cipher(combo: CipherCombo) -> ContentCipher {
        ContentCipher::new(combo, &test_masterkey())
    }

    #[test]
    fn test_nonce_and_tag_lengths() {
        let ctrmac = cipher(CipherCombo::SivCtrMac);
        assert_eq!((ctrmac.nonce_len(), ctrmac.tag_len()), (16, 32));
        let gcm = cipher(CipherCombo::SivGcm);
        assert_eq!((gcm.nonce_len(), gcm.tag_len()), (12, 16));
    }

    #[test]
    fn test_ctrmac_ad_layout() {
        let c = cipher(CipherCombo::SivCtrMac);
        let header_nonce = [0xAAu8; 16];
        let ad = c.associated_data(0x0102030405060708, &header_nonce);
        assert_eq!(&ad[..16], &header_nonce);
        assert_eq!(&ad[16..], &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_gcm_ad_layout() {
        let c = cipher(CipherCombo::SivGcm);
        let header_nonce = [0xBBu8; 12];
        let ad = c.associated_data(0x0102030405060708, &header_nonce);
        assert_eq!(&ad[..8], &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(&ad[8..], &header_nonce);
    }

    #[test]
    fn test_ctrmac_tag_is_hmac_over_ad_nonce_ciphertext() {
        let c = cipher(CipherCombo::SivCtrMac);
        let key = [0x42u8; 32];
        let nonce = [0x01u8; 16];
        let ad = c.associated_data(5, &[0xAAu8; 16]);

        let sealed = c.encrypt(b"chunk payload", &key, &nonce, &ad).unwrap();
        let (body, tag) = sealed.split_at(sealed.len() - 32);

        let mut mac = <HmacSha256 as Mac>::new_from_slice(&[0x77u8; 32]).unwrap();
        mac.update(&ad);
        mac.update(body);
        assert_eq!(mac.finalize().into_bytes().as_slice(), tag);

        assert_eq!(c.decrypt(&sealed, &key, &ad).unwrap(), b"chunk payload");
    }

    #[test]
    fn test_roundtrip_both_variants() {
        for combo in [CipherCombo::SivCtrMac, CipherCombo::SivGcm] {
            let c = cipher(combo);
            let key = [0x42u8; 32];
            let nonce = vec![0x01u8; c.nonce_len()];
            let ad = c.associated_data(3, &vec![0u8; c.nonce_len()]);

            let sealed = c.encrypt(b"chunk payload", &key, &nonce, &ad).unwrap();
            assert_eq!(sealed.len(), c.nonce_len() + 13 + c.tag_len());
            assert_eq!(c.decrypt(&sealed, &key, &ad).unwrap(), b"chunk payload");
        }
    }

    #[test]
    fn test_empty_chunk_roundtrip() {
        for combo in [CipherCombo::SivCtrMac, CipherCombo::SivGcm] {
            let c = cipher(combo);
            let key = [0x42u8; 32];
            let nonce = vec![0u8; c.nonce_len()];
            let sealed = c.encrypt(b"", &key, &nonce, &[]).unwrap();
            assert_eq!(sealed.len(), c.nonce_len() + c.tag_len());
            assert_eq!(c.decrypt(&sealed, &key, &[]).unwrap(), b"");
        }
    }

    #[test]
    fn test_tamper_detection() {
        for combo in [CipherCombo::SivCtrMac, CipherCombo::SivGcm] {
            let c = cipher(combo);
            let key = [0x42u8; 32];
            let nonce = vec![0x01u8; c.nonce_len()];
            let sealed = c.encrypt(b"chunk payload", &key, &nonce, &[]).unwrap();
            for i in 0..sealed.len() {
                let mut tampered = sealed.clone();
                tampered[i] ^= 0x80;
                assert!(
                    matches!(
                        c.decrypt(&tampered, &key, &[]),
                        Err(CryptoError::UnauthenticCiphertext)
                    ),
                    "bit flip at byte {i} must be detected"
                );
            }
        }
    }

    #[test]
    fn test_swapped_chunk_number_fails() {
        for combo in [CipherCombo::SivCtrMac, CipherCombo::SivGcm] {
            let c = cipher(combo);
            let key = [0x42u8; 32];
            let nonce = vec![0x01u8; c.nonce_len()];
            let header_nonce = vec![0x02u8; c.nonce_len()];

            let ad0 = c.associated_data(0, &header_nonce);
            let ad1 = c.associated_data(1, &header_nonce);
            let sealed = c.encrypt(b"chunk payload", &key, &nonce, &ad0).unwrap();
            assert!(matches!(
                c.decrypt(&sealed, &key, &ad1),
                Err(CryptoError::UnauthenticCiphertext)
            ));
        }
    }

    #[test]
    fn test_swapped_header_nonce_fails() {
        for combo in [CipherCombo::SivCtrMac, CipherCombo::SivGcm] {
            let c = cipher(combo);
            let key = [0x42u8; 32];
            let nonce = vec![0x01u8; c.nonce_len()];

            let ad_a = c.associated_data(0, &vec![0xAAu8; c.nonce_len()]);
            let ad_b = c.associated_data(0, &vec![0xBBu8; c.nonce_len()]);
            let sealed = c.encrypt(b"chunk payload", &key, &nonce, &ad_a).unwrap();
            assert!(matches!(
                c.decrypt(&sealed, &key, &ad_b),
                Err(CryptoError::UnauthenticCiphertext)
            ));
        }
    }

    #[test]
    fn test_truncated_chunk_rejected() {
        let c = cipher(CipherCombo::SivGcm);
        let err = c.decrypt(&[0u8; 27], &[0u8; 32], &[]).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidParameter(_)));
    }

    #[test]
    fn test_wrong_nonce_length_rejected() {
        let c = cipher(CipherCombo::SivGcm);
        let err = c.encrypt(b"x", &[0u8; 32], &[0u8; 16], &[]).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidParameter(_)));
    }
}
