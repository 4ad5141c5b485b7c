//! strongbox-crypto: cryptographic core of the Strongbox vault format
//!
//! Turns cleartext file names, directory IDs, and file contents into an
//! authenticated, tamper-evident ciphertext representation, and back.
//!
//! Key hierarchy:
//! ```text
//! Masterkey (2 x 256-bit: AES key + MAC key)
//!   ├── unlocked from a scrypt-protected key file (RFC 3394 key wrap)
//!   ├── Name encryption: AES-SIV (deterministic, dirId as associated data)
//!   └── File content: per-file random content key, wrapped in a keyed header,
//!       32 KiB chunks sealed by a ContentCipher (AES-CTR + HMAC, or AES-GCM)
//! ```
//!
//! On-disk file layout:
//! ```text
//! [header: nonce | enc(8 reserved bytes + 32-byte content key) | tag]
//! [chunk 0: nonce | ciphertext | tag] [chunk 1] ... (<= 32 KiB cleartext each)
//! AAD binds each chunk to its index and to the file's header nonce.
//! ```

pub mod cmac;
pub mod content;
pub mod error;
pub mod file;
pub mod masterkey;
pub mod masterkey_file;
pub mod names;
pub mod random;
pub mod siv;
pub mod stream;

pub use content::{CipherCombo, ContentCipher};
pub use error::{CryptoError, Result};
pub use file::{FileCodec, FileHeader, CLEARTEXT_CHUNK_SIZE};
pub use masterkey::Masterkey;
pub use masterkey_file::MasterkeyFile;
pub use names::{FileNameEncoding, NameCipher};
pub use random::{OsRandom, SecureRandom};
pub use siv::SivCipher;
pub use stream::{DecryptingReader, EncryptingWriter};

/// Size of a master/content key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// AES block size in bytes; also the CMAC/SIV tag size
pub const BLOCK_SIZE: usize = 16;
