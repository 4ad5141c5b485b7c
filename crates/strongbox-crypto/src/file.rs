//! Chunked file container format
//!
//! Layout: an encrypted header (`nonce || enc(reserved || contentKey) || tag`)
//! followed by up to 32 KiB cleartext per chunk, each sealed by the configured
//! [`ContentCipher`]. Chunk numbers are implicit in emission order, so the
//! per-file loop is strictly sequential; independent files can be processed in
//! parallel, each with its own header and content key.

use std::io::{Read, Write};
use std::sync::Arc;

use tracing::trace;
use zeroize::Zeroizing;

use crate::content::{CipherCombo, ContentCipher};
use crate::error::{CryptoError, Result};
use crate::masterkey::Masterkey;
use crate::random::{OsRandom, SecureRandom};
use crate::KEY_SIZE;

/// Cleartext bytes per chunk
pub const CLEARTEXT_CHUNK_SIZE: usize = 32 * 1024;

/// Legacy marker prefix inside the header payload, conventionally all 0xFF
const HEADER_RESERVED_LEN: usize = 8;
const HEADER_RESERVED_BYTE: u8 = 0xFF;

/// Per-file header: nonce plus a fresh random content key, owned by the one
/// encrypt/decrypt operation that created or parsed it.
pub struct FileHeader {
    nonce: Vec<u8>,
    content_key: Zeroizing<[u8; KEY_SIZE]>,
}

impl FileHeader {
    pub fn nonce(&self) -> &[u8] {
        &self.nonce
    }

    pub fn content_key(&self) -> &[u8; KEY_SIZE] {
        &self.content_key
    }
}

pub struct FileCodec<R: SecureRandom = OsRandom> {
    masterkey: Arc<Masterkey>,
    cipher: ContentCipher,
    rng: R,
}

impl FileCodec<OsRandom> {
    pub fn new(masterkey: Arc<Masterkey>, combo: CipherCombo) -> Self {
        Self::with_rng(masterkey, combo, OsRandom)
    }
}

impl<R: SecureRandom> FileCodec<R> {
    pub fn with_rng(masterkey: Arc<Masterkey>, combo: CipherCombo, rng: R) -> Self {
        let cipher = ContentCipher::new(combo, &masterkey);
        Self {
            masterkey,
            cipher,
            rng,
        }
    }

    /// Total encrypted header size: nonce + payload + tag.
    pub fn header_size(&self) -> usize {
        self.cipher.nonce_len() + HEADER_RESERVED_LEN + KEY_SIZE + self.cipher.tag_len()
    }

    /// Encrypted size of one full chunk.
    pub fn ciphertext_chunk_size(&self) -> usize {
        self.cipher.nonce_len() + CLEARTEXT_CHUNK_SIZE + self.cipher.tag_len()
    }

    // --- header ---

    pub fn create_header(&self) -> Result<FileHeader> {
        let nonce = self.rng.random_bytes(self.cipher.nonce_len())?;
        let mut content_key = Zeroizing::new([0u8; KEY_SIZE]);
        self.rng.fill_bytes(content_key.as_mut())?;
        Ok(FileHeader { nonce, content_key })
    }

    pub fn encrypt_header(&self, header: &FileHeader) -> Result<Vec<u8>> {
        let mut cleartext = Zeroizing::new([0u8; HEADER_RESERVED_LEN + KEY_SIZE]);
        cleartext[..HEADER_RESERVED_LEN].fill(HEADER_RESERVED_BYTE);
        cleartext[HEADER_RESERVED_LEN..].copy_from_slice(header.content_key());
        self.cipher.encrypt(
            cleartext.as_ref(),
            self.masterkey.aes_key(),
            &header.nonce,
            &[],
        )
    }

    pub fn decrypt_header(&self, header: &[u8]) -> Result<FileHeader> {
        if header.len() != self.header_size() {
            return Err(CryptoError::InvalidParameter(format!(
                "header must be {} bytes, got {}",
                self.header_size(),
                header.len()
            )));
        }
        let nonce = header[..self.cipher.nonce_len()].to_vec();
        let cleartext = Zeroizing::new(self.cipher.decrypt(
            header,
            self.masterkey.aes_key(),
            &[],
        )?);
        let mut content_key = Zeroizing::new([0u8; KEY_SIZE]);
        content_key.copy_from_slice(&cleartext[HEADER_RESERVED_LEN..]);
        Ok(FileHeader { nonce, content_key })
    }

    // --- chunks ---

    /// Encrypts one chunk with a fresh random nonce, binding it to its
    /// position and to the file's header nonce.
    pub fn encrypt_chunk(
        &self,
        chunk: &[u8],
        chunk_number: u64,
        header: &FileHeader,
    ) -> Result<Vec<u8>> {
        let nonce = self.rng.random_bytes(self.cipher.nonce_len())?;
        let ad = self.cipher.associated_data(chunk_number, header.nonce());
        self.cipher
            .encrypt(chunk, header.content_key(), &nonce, &ad)
    }

    pub fn decrypt_chunk(
        &self,
        chunk: &[u8],
        chunk_number: u64,
        header: &FileHeader,
    ) -> Result<Vec<u8>> {
        let ad = self.cipher.associated_data(chunk_number, header.nonce());
        self.cipher.decrypt(chunk, header.content_key(), &ad)
    }

    // --- streaming ---

    /// Encrypts a cleartext stream: header first, then sequentially numbered
    /// chunks until the input is exhausted.
    pub fn encrypt_content(&self, mut cleartext: impl Read, mut ciphertext: impl Write) -> Result<()> {
        let header = self.create_header()?;
        ciphertext.write_all(&self.encrypt_header(&header)?)?;

        let mut chunk = vec![0u8; CLEARTEXT_CHUNK_SIZE];
        let mut chunk_number: u64 = 0;
        loop {
            let n = read_full(&mut cleartext, &mut chunk)?;
            if n == 0 {
                break;
            }
            let sealed = self.encrypt_chunk(&chunk[..n], chunk_number, &header)?;
            ciphertext.write_all(&sealed)?;
            chunk_number += 1;
            if n < CLEARTEXT_CHUNK_SIZE {
                break;
            }
        }
        trace!(chunks = chunk_number, "encrypted content stream");
        Ok(())
    }

    /// Decrypts a ciphertext stream. Fails with an I/O error if the input
    /// ends before a full header was read; any chunk that fails
    /// authentication aborts the whole operation.
    pub fn decrypt_content(&self, mut ciphertext: impl Read, mut cleartext: impl Write) -> Result<()> {
        let mut header_buf = vec![0u8; self.header_size()];
        let n = read_full(&mut ciphertext, &mut header_buf)?;
        if n < header_buf.len() {
            return Err(CryptoError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "ciphertext ends before the file header is complete",
            )));
        }
        let header = self.decrypt_header(&header_buf)?;

        let mut chunk = vec![0u8; self.ciphertext_chunk_size()];
        let mut chunk_number: u64 = 0;
        loop {
            let n = read_full(&mut ciphertext, &mut chunk)?;
            if n == 0 {
                break;
            }
            let opened = self.decrypt_chunk(&chunk[..n], chunk_number, &header)?;
            cleartext.write_all(&opened)?;
            chunk_number += 1;
            if n < self.ciphertext_chunk_size() {
                break;
            }
        }
        trace!(chunks = chunk_number, "decrypted content stream");
        Ok(())
    }

    // --- size arithmetic ---

    /// Ciphertext size of a `cleartext_size`-sized payload, excluding the
    /// file header.
    pub fn ciphertext_size(&self, cleartext_size: u64) -> u64 {
        let chunk_size = CLEARTEXT_CHUNK_SIZE as u64;
        let overhead = (self.cipher.nonce_len() + self.cipher.tag_len()) as u64;
        let full_chunks = cleartext_size / chunk_size;
        let rest = cleartext_size % chunk_size;
        let rest_ciphertext = if rest == 0 { 0 } else { rest + overhead };
        full_chunks * (chunk_size + overhead) + rest_ciphertext
    }

    /// Inverse of [`ciphertext_size`](Self::ciphertext_size). Fails for sizes
    /// that no valid chunk layout can produce: a trailing remainder of more
    /// than zero but at most nonce + tag bytes can represent neither an empty
    /// nor a non-empty chunk.
    pub fn cleartext_size(&self, ciphertext_size: u64) -> Result<u64> {
        let chunk_size = CLEARTEXT_CHUNK_SIZE as u64;
        let overhead = (self.cipher.nonce_len() + self.cipher.tag_len()) as u64;
        let full_chunks = ciphertext_size / (chunk_size + overhead);
        let rest = ciphertext_size % (chunk_size + overhead);
        if rest != 0 && rest <= overhead {
            return Err(CryptoError::InvalidParameter(format!(
                "method not defined for input value {ciphertext_size}"
            )));
        }
        let rest_cleartext = if rest == 0 { 0 } else { rest - overhead };
        Ok(full_chunks * chunk_size + rest_cleartext)
    }
}

/// Reads until `buf` is full or the stream ends; a short count only occurs at
/// end of stream.
pub(crate) fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(CryptoError::Io(e)),
        }
    }
    Ok(filled)
}
