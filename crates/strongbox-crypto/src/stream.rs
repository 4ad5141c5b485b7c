//! std::io adapters over the file container format
//!
//! [`EncryptingWriter`] and [`DecryptingReader`] let callers plug vault
//! encryption into ordinary `Read`/`Write` pipelines without buffering whole
//! files. Crypto failures surface as `io::Error` of kind `InvalidData`.

use std::io::{self, Read, Write};

use crate::error::CryptoError;
use crate::file::{read_full, FileCodec, FileHeader, CLEARTEXT_CHUNK_SIZE};
use crate::random::{OsRandom, SecureRandom};

fn to_io(err: CryptoError) -> io::Error {
    match err {
        CryptoError::Io(e) => e,
        other => io::Error::new(io::ErrorKind::InvalidData, other),
    }
}

/// Reads cleartext from an underlying encrypted stream, verifying each chunk
/// before handing out its bytes.
pub struct DecryptingReader<'a, R: Read, G: SecureRandom = OsRandom> {
    codec: &'a FileCodec<G>,
    inner: R,
    header: Option<FileHeader>,
    buf: Vec<u8>,
    pos: usize,
    chunk_number: u64,
    done: bool,
}

impl<'a, R: Read, G: SecureRandom> DecryptingReader<'a, R, G> {
    pub fn new(codec: &'a FileCodec<G>, inner: R) -> Self {
        Self {
            codec,
            inner,
            header: None,
            buf: Vec::new(),
            pos: 0,
            chunk_number: 0,
            done: false,
        }
    }

    fn refill(&mut self) -> io::Result<()> {
        self.buf.clear();
        self.pos = 0;
        if self.done {
            return Ok(());
        }

        if self.header.is_none() {
            let mut header_buf = vec![0u8; self.codec.header_size()];
            let n = read_full(&mut self.inner, &mut header_buf).map_err(to_io)?;
            if n < header_buf.len() {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "ciphertext ends before the file header is complete",
                ));
            }
            self.header = Some(self.codec.decrypt_header(&header_buf).map_err(to_io)?);
        }
        let header = self.header.as_ref().expect("header read above");

        let mut chunk = vec![0u8; self.codec.ciphertext_chunk_size()];
        let n = read_full(&mut self.inner, &mut chunk).map_err(to_io)?;
        if n == 0 {
            self.done = true;
            return Ok(());
        }
        if n < chunk.len() {
            self.done = true;
        }
        self.buf = self
            .codec
            .decrypt_chunk(&chunk[..n], self.chunk_number, header)
            .map_err(to_io)?;
        self.chunk_number += 1;
        Ok(())
    }
}

impl<R: Read, G: SecureRandom> Read for DecryptingReader<'_, R, G> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        if self.pos == self.buf.len() {
            self.refill()?;
            if self.pos == self.buf.len() {
                return Ok(0);
            }
        }
        let n = out.len().min(self.buf.len() - self.pos);
        out[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Writes cleartext into an underlying stream as encrypted chunks. Callers
/// must invoke [`finish`](Self::finish) to seal the trailing partial chunk;
/// dropping without it seals on a best-effort basis with no way to report
/// errors.
pub struct EncryptingWriter<'a, W: Write, G: SecureRandom = OsRandom> {
    codec: &'a FileCodec<G>,
    inner: W,
    header: FileHeader,
    header_written: bool,
    buf: Vec<u8>,
    chunk_number: u64,
    finished: bool,
}

impl<'a, W: Write, G: SecureRandom> EncryptingWriter<'a, W, G> {
    pub fn new(codec: &'a FileCodec<G>, inner: W) -> crate::Result<Self> {
        let header = codec.create_header()?;
        Ok(Self {
            codec,
            inner,
            header,
            header_written: false,
            buf: Vec::with_capacity(CLEARTEXT_CHUNK_SIZE),
            chunk_number: 0,
            finished: false,
        })
    }

    fn ensure_header(&mut self) -> io::Result<()> {
        if !self.header_written {
            let sealed = self.codec.encrypt_header(&self.header).map_err(to_io)?;
            self.inner.write_all(&sealed)?;
            self.header_written = true;
        }
        Ok(())
    }

    fn seal_chunk(&mut self, chunk_end: usize) -> io::Result<()> {
        self.ensure_header()?;
        let sealed = self
            .codec
            .encrypt_chunk(&self.buf[..chunk_end], self.chunk_number, &self.header)
            .map_err(to_io)?;
        self.inner.write_all(&sealed)?;
        self.buf.drain(..chunk_end);
        self.chunk_number += 1;
        Ok(())
    }

    /// Seals any buffered cleartext and flushes the underlying writer. Safe
    /// to call more than once.
    pub fn finish(&mut self) -> io::Result<()> {
        if self.finished {
            return Ok(());
        }
        self.ensure_header()?;
        if !self.buf.is_empty() {
            self.seal_chunk(self.buf.len())?;
        }
        self.finished = true;
        self.inner.flush()
    }
}

impl<W: Write, G: SecureRandom> Write for EncryptingWriter<'_, W, G> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.finished {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "writer already finished",
            ));
        }
        self.buf.extend_from_slice(data);
        while self.buf.len() >= CLEARTEXT_CHUNK_SIZE {
            self.seal_chunk(CLEARTEXT_CHUNK_SIZE)?;
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        // Partial chunks stay buffered until finish; flushing them here would
        // change the chunk layout.
        self.inner.flush()
    }
}

impl<W: Write, G: SecureRandom> Drop for EncryptingWriter<'_, W, G> {
    fn drop(&mut self) {
        let _ = self.finish();
    }
}
