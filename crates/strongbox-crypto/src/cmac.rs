//! CMAC-AES (NIST SP 800-38B / RFC 4493)
//!
//! Implemented over an injected single-block encrypt primitive so the MAC
//! stays provider-agnostic and can be driven by deterministic mocks. The SIV
//! construction reuses `dbl`/`pad` from here.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes256;

use crate::BLOCK_SIZE;

/// GF(2^128) reduction constant for the AES block size
const DBL_CONST: u8 = 0x87;

pub(crate) const ZERO_BLOCK: [u8; BLOCK_SIZE] = [0u8; BLOCK_SIZE];

/// A keyed AES-ECB single-block encryption primitive.
pub trait BlockEncrypter {
    fn encrypt_block(&self, block: &mut [u8; BLOCK_SIZE]);
}

/// AES-256 block encrypter backed by the `aes` crate.
pub struct Aes256Block(Aes256);

impl Aes256Block {
    pub fn new(key: &[u8; 32]) -> Self {
        Self(Aes256::new(GenericArray::from_slice(key)))
    }
}

impl BlockEncrypter for Aes256Block {
    fn encrypt_block(&self, block: &mut [u8; BLOCK_SIZE]) {
        self.0.encrypt_block(GenericArray::from_mut_slice(block));
    }
}

/// Computes CMAC over `data`.
///
/// Zero-length input is treated as a single incomplete block (padded, XOR K2).
pub fn cmac(cipher: &impl BlockEncrypter, data: &[u8]) -> [u8; BLOCK_SIZE] {
    // subkey generation: K1 = dbl(E(K, 0^128)), K2 = dbl(K1)
    let mut l = ZERO_BLOCK;
    cipher.encrypt_block(&mut l);
    let k1 = dbl(&l);
    let k2 = dbl(&k1);

    let n = data.len().div_ceil(BLOCK_SIZE);
    let (last_block_idx, last_block_complete) = if n == 0 {
        (0, false)
    } else {
        (n - 1, data.len() % BLOCK_SIZE == 0)
    };

    // CBC-MAC chain over blocks 0..n-1
    let mut mac = ZERO_BLOCK;
    for block in data.chunks_exact(BLOCK_SIZE).take(last_block_idx) {
        xor_in(&mut mac, block);
        cipher.encrypt_block(&mut mac);
    }

    // final block: XOR K1 if complete, otherwise pad and XOR K2
    let last = if last_block_complete {
        let mut block = [0u8; BLOCK_SIZE];
        block.copy_from_slice(&data[BLOCK_SIZE * last_block_idx..]);
        xor_in(&mut block, &k1);
        block
    } else {
        let mut block = pad(&data[BLOCK_SIZE * last_block_idx..]);
        xor_in(&mut block, &k2);
        block
    };
    xor_in(&mut mac, &last);
    cipher.encrypt_block(&mut mac);

    mac
}

/// Doubling in GF(2^128): left shift by one bit, reduce with 0x87 if the top
/// bit was set.
pub(crate) fn dbl(block: &[u8; BLOCK_SIZE]) -> [u8; BLOCK_SIZE] {
    let mut out = [0u8; BLOCK_SIZE];
    let mut carry = 0u8;
    for i in (0..BLOCK_SIZE).rev() {
        out[i] = (block[i] << 1) | carry;
        carry = block[i] >> 7;
    }
    if block[0] & 0x80 != 0 {
        out[BLOCK_SIZE - 1] ^= DBL_CONST;
    }
    out
}

pub(crate) fn xor_in(dest: &mut [u8], src: &[u8]) {
    debug_assert!(src.len() >= dest.len());
    for (d, s) in dest.iter_mut().zip(src) {
        *d ^= s;
    }
}

/// ISO/IEC 7816-4 padding: a single 0x80 byte, then zero-fill to one block.
pub(crate) fn pad(data: &[u8]) -> [u8; BLOCK_SIZE] {
    debug_assert!(data.len() < BLOCK_SIZE);
    let mut block = ZERO_BLOCK;
    block[..data.len()].copy_from_slice(data);
    block[data.len()] = 0x80;
    block
}
