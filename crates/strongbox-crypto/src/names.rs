//! File and directory name encryption
//!
//! Names are encrypted deterministically with AES-SIV so that equal cleartext
//! names inside the same directory map to equal ciphertext names. The parent
//! directory ID is bound as associated data, so the same name encrypts
//! differently in different directories.

use data_encoding::{BASE32, BASE64URL_NOPAD};
use sha1::{Digest, Sha1};
use unicode_normalization::UnicodeNormalization;

use crate::error::{CryptoError, Result};
use crate::masterkey::Masterkey;
use crate::siv::SivCipher;

/// Ciphertext name alphabet. Base32 exists for case-insensitive filesystems
/// and produces longer names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileNameEncoding {
    Base64url,
    Base32,
}

impl FileNameEncoding {
    fn encode(self, data: &[u8]) -> String {
        match self {
            FileNameEncoding::Base64url => BASE64URL_NOPAD.encode(data),
            FileNameEncoding::Base32 => BASE32.encode(data),
        }
    }

    fn decode(self, name: &str) -> Result<Vec<u8>> {
        let decoded = match self {
            FileNameEncoding::Base64url => BASE64URL_NOPAD.decode(name.as_bytes()),
            FileNameEncoding::Base32 => BASE32.decode(name.as_bytes()),
        };
        decoded.map_err(|_| {
            CryptoError::InvalidParameter(format!("not a valid ciphertext name: {name}"))
        })
    }
}

pub struct NameCipher {
    siv: SivCipher,
}

impl NameCipher {
    pub fn new(masterkey: &Masterkey) -> Self {
        Self {
            siv: SivCipher::new(masterkey.aes_key(), masterkey.mac_key()),
        }
    }

    /// Derives the storage path component for a directory: the directory ID is
    /// SIV-encrypted, hashed and Base32-encoded. The hash keeps the component
    /// at a fixed 32 characters regardless of ID length.
    pub fn encrypt_dir_id(&self, dir_id: &str) -> Result<String> {
        let ciphertext = self.siv.encrypt(dir_id.as_bytes(), &[])?;
        let digest = Sha1::digest(&ciphertext);
        Ok(BASE32.encode(&digest))
    }

    /// Encrypts a file name within the directory identified by `dir_id`. The
    /// cleartext is NFC-normalized first so that canonically equal names from
    /// different platforms produce the same ciphertext.
    pub fn encrypt_file_name(
        &self,
        cleartext_name: &str,
        dir_id: &str,
        encoding: FileNameEncoding,
    ) -> Result<String> {
        let normalized: String = cleartext_name.nfc().collect();
        let ciphertext = self
            .siv
            .encrypt(normalized.as_bytes(), &[dir_id.as_bytes()])?;
        Ok(encoding.encode(&ciphertext))
    }

    pub fn decrypt_file_name(
        &self,
        ciphertext_name: &str,
        dir_id: &str,
        encoding: FileNameEncoding,
    ) -> Result<String> {
        let ciphertext = encoding.decode(ciphertext_name)?;
        let cleartext = self.siv.decrypt(&ciphertext, &[dir_id.as_bytes()])?;
        String::from_utf8(cleartext).map_err(|_| {
            CryptoError::InvalidParameter("decrypted name is not valid UTF-8".into())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cipher() -> NameCipher {
        let masterkey = Masterkey::from_raw(&[0x55u8; 32], &[0x77u8; 32]);
        NameCipher::new(&masterkey)
    }

    #[test]
    fn test_encrypt_root_dir_id() {
        let names = test_cipher();
        let encrypted = names.encrypt_dir_id("").unwrap();
        assert_eq!(encrypted, "VLWEHT553J5DR7OZLRJAYDIWFCXZABOD");
    }

    #[test]
    fn test_encrypt_dir_id() {
        let names = test_cipher();
        let encrypted = names
            .encrypt_dir_id("918acfbd-a467-3f77-93f1-f4a44f9cfe9c")
            .unwrap();
        assert_eq!(encrypted, "7C3USOO3VU7IVQRKFMRFV3QE4VEZJECV");
    }

    #[test]
    fn test_file_name_roundtrip() {
        let names = test_cipher();
        for encoding in [FileNameEncoding::Base64url, FileNameEncoding::Base32] {
            let encrypted = names
                .encrypt_file_name("hello.txt", "some-dir-id", encoding)
                .unwrap();
            let decrypted = names
                .decrypt_file_name(&encrypted, "some-dir-id", encoding)
                .unwrap();
            assert_eq!(decrypted, "hello.txt");
        }
    }

    #[test]
    fn test_file_name_is_deterministic_per_directory() {
        let names = test_cipher();
        let a = names
            .encrypt_file_name("hello.txt", "dir-a", FileNameEncoding::Base64url)
            .unwrap();
        let b = names
            .encrypt_file_name("hello.txt", "dir-a", FileNameEncoding::Base64url)
            .unwrap();
        let c = names
            .encrypt_file_name("hello.txt", "dir-b", FileNameEncoding::Base64url)
            .unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_wrong_dir_id_fails() {
        let names = test_cipher();
        let encrypted = names
            .encrypt_file_name("hello.txt", "dir-a", FileNameEncoding::Base64url)
            .unwrap();
        let err = names
            .decrypt_file_name(&encrypted, "dir-b", FileNameEncoding::Base64url)
            .unwrap_err();
        assert!(matches!(err, CryptoError::UnauthenticCiphertext));
    }

    #[test]
    fn test_invalid_alphabet_rejected() {
        let names = test_cipher();
        let err = names
            .decrypt_file_name("****", "dir", FileNameEncoding::Base64url)
            .unwrap_err();
        assert!(matches!(err, CryptoError::InvalidParameter(_)));
    }

    #[test]
    fn test_too_short_ciphertext_rejected() {
        // "test" decodes to 3 bytes, below the 16-byte IV minimum
        let names = test_cipher();
        let err = names
            .decrypt_file_name("test", "dir", FileNameEncoding::Base64url)
            .unwrap_err();
        assert!(matches!(err, CryptoError::InvalidParameter(_)));
    }

    #[test]
    fn test_nfc_and_nfd_names_encrypt_identically() {
        let names = test_cipher();
        let nfc = "s\u{00FC}\u{00DF}.txt";
        let nfd = "su\u{0308}\u{00DF}.txt";
        let a = names
            .encrypt_file_name(nfc, "dir", FileNameEncoding::Base64url)
            .unwrap();
        let b = names
            .encrypt_file_name(nfd, "dir", FileNameEncoding::Base64url)
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(
            names
                .decrypt_file_name(&a, "dir", FileNameEncoding::Base64url)
                .unwrap(),
            nfc
        );
    }

    #[test]
    fn test_non_utf8_cleartext_rejected() {
        let masterkey = Masterkey::from_raw(&[0x55u8; 32], &[0x77u8; 32]);
        let names = NameCipher::new(&masterkey);
        let siv = SivCipher::new(masterkey.aes_key(), masterkey.mac_key());

        let ciphertext = siv.encrypt(&[0xFF, 0xFE, 0xFD], &[b"dir"]).unwrap();
        let encoded = BASE64URL_NOPAD.encode(&ciphertext);
        let err = names
            .decrypt_file_name(&encoded, "dir", FileNameEncoding::Base64url)
            .unwrap_err();
        assert!(matches!(err, CryptoError::InvalidParameter(_)));
    }
}
