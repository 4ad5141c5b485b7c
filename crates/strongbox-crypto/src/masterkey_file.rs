//! Persisted, passphrase-protected masterkey files
//!
//! JSON layout (field names are part of the on-disk format):
//! ```json
//! {
//!   "version": 7,
//!   "scryptSalt": "...",
//!   "scryptCostParam": 32768,
//!   "scryptBlockSize": 8,
//!   "primaryMasterKey": "...",
//!   "hmacMasterKey": "...",
//!   "versionMac": "..."
//! }
//! ```
//!
//! A KEK is derived from the passphrase via scrypt (p fixed at 1); both
//! 256-bit keys are wrapped with RFC 3394 AES Key Wrap. The wrap's integrity
//! check value is what turns a wrong passphrase into a clean
//! [`CryptoError::InvalidPassphrase`] instead of garbage keys.

use aes::Aes256;
use aes_kw::Kek;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::debug;
use unicode_normalization::UnicodeNormalization;
use zeroize::Zeroizing;

use crate::error::{CryptoError, Result};
use crate::masterkey::Masterkey;
use crate::random::{OsRandom, SecureRandom};
use crate::KEY_SIZE;

type HmacSha256 = Hmac<Sha256>;

/// RFC 3394 adds one 8-byte integrity block per wrapped key.
const KEY_WRAP_OVERHEAD: usize = 8;

pub const DEFAULT_SCRYPT_COST_PARAM: u64 = 1 << 15;
pub const DEFAULT_SCRYPT_BLOCK_SIZE: u32 = 8;
const SCRYPT_SALT_SIZE: usize = 8;

/// On-disk representation of a passphrase-protected masterkey.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterkeyFile {
    pub version: u32,
    pub scrypt_salt: String,
    pub scrypt_cost_param: u64,
    pub scrypt_block_size: u32,
    pub primary_master_key: String,
    pub hmac_master_key: String,
    pub version_mac: String,
}

impl MasterkeyFile {
    pub fn from_json(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data)
            .map_err(|e| CryptoError::MalformedKeyFile(format!("invalid JSON: {e}")))
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| CryptoError::MalformedKeyFile(format!("serialization failed: {e}")))
    }

    /// Derives the KEK from `passphrase` and this file's scrypt parameters,
    /// unwraps both keys, and optionally authenticates the vault version
    /// against the stored `versionMac`.
    pub fn unlock(
        &self,
        passphrase: &SecretString,
        pepper: &[u8],
        expected_version: Option<u32>,
    ) -> Result<Masterkey> {
        debug!(version = self.version, "unlocking masterkey file");

        let salt = base64_field(&self.scrypt_salt, "scryptSalt")?;
        let kek = self.derive_kek(passphrase, &salt, pepper)?;

        let wrapped_aes = base64_field(&self.primary_master_key, "primaryMasterKey")?;
        let aes_key = unwrap_key(&wrapped_aes, &kek)?;
        let wrapped_mac = base64_field(&self.hmac_master_key, "hmacMasterKey")?;
        let mac_key = unwrap_key(&wrapped_mac, &kek)?;

        if let Some(version) = expected_version {
            self.check_version_mac(version, &mac_key)?;
        }

        Ok(Masterkey::from_raw(&aes_key, &mac_key))
    }

    /// Wraps `masterkey` under a KEK derived from `passphrase` with a fresh
    /// random salt.
    pub fn lock(
        masterkey: &Masterkey,
        vault_version: u32,
        passphrase: &SecretString,
        pepper: &[u8],
        scrypt_cost_param: u64,
    ) -> Result<Self> {
        Self::lock_with_rng(
            masterkey,
            vault_version,
            passphrase,
            pepper,
            scrypt_cost_param,
            &OsRandom,
        )
    }

    pub fn lock_with_rng(
        masterkey: &Masterkey,
        vault_version: u32,
        passphrase: &SecretString,
        pepper: &[u8],
        scrypt_cost_param: u64,
        rng: &impl SecureRandom,
    ) -> Result<Self> {
        let salt = rng.random_bytes(SCRYPT_SALT_SIZE)?;
        let kek = derive_kek_from_params(
            passphrase,
            &salt,
            pepper,
            scrypt_cost_param,
            DEFAULT_SCRYPT_BLOCK_SIZE,
        )?;

        let wrapped_aes = wrap_key(masterkey.aes_key(), &kek)?;
        let wrapped_mac = wrap_key(masterkey.mac_key(), &kek)?;
        let version_mac = compute_version_mac(vault_version, masterkey.mac_key());

        Ok(Self {
            version: vault_version,
            scrypt_salt: base64_encode(&salt),
            scrypt_cost_param,
            scrypt_block_size: DEFAULT_SCRYPT_BLOCK_SIZE,
            primary_master_key: base64_encode(&wrapped_aes),
            hmac_master_key: base64_encode(&wrapped_mac),
            version_mac: base64_encode(&version_mac),
        })
    }

    /// Re-encrypts the masterkey under a new passphrase, keeping the vault
    /// version and drawing a fresh salt.
    pub fn change_passphrase(
        &self,
        old_passphrase: &SecretString,
        new_passphrase: &SecretString,
        pepper: &[u8],
        scrypt_cost_param: u64,
    ) -> Result<Self> {
        self.change_passphrase_with_rng(
            old_passphrase,
            new_passphrase,
            pepper,
            scrypt_cost_param,
            &OsRandom,
        )
    }

    pub fn change_passphrase_with_rng(
        &self,
        old_passphrase: &SecretString,
        new_passphrase: &SecretString,
        pepper: &[u8],
        scrypt_cost_param: u64,
        rng: &impl SecureRandom,
    ) -> Result<Self> {
        let masterkey = self.unlock(old_passphrase, pepper, None)?;
        Self::lock_with_rng(
            &masterkey,
            self.version,
            new_passphrase,
            pepper,
            scrypt_cost_param,
            rng,
        )
    }

    fn derive_kek(
        &self,
        passphrase: &SecretString,
        salt: &[u8],
        pepper: &[u8],
    ) -> Result<Zeroizing<[u8; KEY_SIZE]>> {
        derive_kek_from_params(
            passphrase,
            salt,
            pepper,
            self.scrypt_cost_param,
            self.scrypt_block_size,
        )
    }

    fn check_version_mac(&self, expected_version: u32, mac_key: &[u8; KEY_SIZE]) -> Result<()> {
        let stored = base64_field(&self.version_mac, "versionMac")?;
        if stored.len() != 32 {
            return Err(CryptoError::MalformedKeyFile(
                "versionMac must be 32 bytes".into(),
            ));
        }
        let calculated = compute_version_mac(expected_version, mac_key);
        if bool::from(calculated.ct_eq(&stored)) {
            Ok(())
        } else {
            Err(CryptoError::MalformedKeyFile(
                "incorrect version or versionMac".into(),
            ))
        }
    }
}

/// scrypt KDF with p fixed at 1 and a 32-byte output. The passphrase is
/// NFC-normalized before hashing so visually identical passphrases derive the
/// same key across platforms.
fn derive_kek_from_params(
    passphrase: &SecretString,
    salt: &[u8],
    pepper: &[u8],
    cost_param: u64,
    block_size: u32,
) -> Result<Zeroizing<[u8; KEY_SIZE]>> {
    if cost_param < 2 || !cost_param.is_power_of_two() {
        return Err(CryptoError::MalformedKeyFile(
            "scryptCostParam must be a power of two >= 2".into(),
        ));
    }
    let log_n = cost_param.trailing_zeros() as u8;
    let params = scrypt::Params::new(log_n, block_size, 1, KEY_SIZE)
        .map_err(|e| CryptoError::InvalidParameter(format!("invalid scrypt params: {e}")))?;

    let normalized: Zeroizing<String> =
        Zeroizing::new(passphrase.expose_secret().nfc().collect());
    let mut salted = Vec::with_capacity(salt.len() + pepper.len());
    salted.extend_from_slice(salt);
    salted.extend_from_slice(pepper);

    let mut kek = Zeroizing::new([0u8; KEY_SIZE]);
    scrypt::scrypt(normalized.as_bytes(), &salted, &params, kek.as_mut())
        .map_err(|e| CryptoError::InvalidParameter(format!("scrypt failed: {e}")))?;
    Ok(kek)
}

/// RFC 3394 AES Key Wrap with the fixed IV `A6A6A6A6A6A6A6A6`.
fn wrap_key(raw_key: &[u8; KEY_SIZE], kek: &[u8; KEY_SIZE]) -> Result<Vec<u8>> {
    let kek = Kek::<Aes256>::from(*kek);
    let mut wrapped = vec![0u8; KEY_SIZE + KEY_WRAP_OVERHEAD];
    kek.wrap(raw_key, &mut wrapped)
        .map_err(|e| CryptoError::InvalidParameter(format!("key wrap failed: {e}")))?;
    Ok(wrapped)
}

/// The unwrap integrity check doubles as the passphrase check: a KEK derived
/// from the wrong passphrase fails here. The recovered key stays in a
/// zeroizing buffer until it reaches its final owner.
fn unwrap_key(wrapped: &[u8], kek: &[u8; KEY_SIZE]) -> Result<Zeroizing<[u8; KEY_SIZE]>> {
    if wrapped.len() != KEY_SIZE + KEY_WRAP_OVERHEAD {
        return Err(CryptoError::MalformedKeyFile(format!(
            "wrapped key must be {} bytes, got {}",
            KEY_SIZE + KEY_WRAP_OVERHEAD,
            wrapped.len()
        )));
    }
    let kek = Kek::<Aes256>::from(*kek);
    let mut unwrapped = Zeroizing::new([0u8; KEY_SIZE]);
    kek.unwrap(wrapped, unwrapped.as_mut())
        .map_err(|e| match e {
            aes_kw::Error::IntegrityCheckFailed => CryptoError::InvalidPassphrase,
            other => CryptoError::InvalidParameter(format!("key unwrap failed: {other}")),
        })?;
    Ok(unwrapped)
}

fn compute_version_mac(version: u32, mac_key: &[u8; KEY_SIZE]) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(mac_key).expect("HMAC accepts any key length");
    mac.update(&version.to_be_bytes());
    mac.finalize().into_bytes().into()
}

fn base64_encode(data: &[u8]) -> String {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    STANDARD.encode(data)
}

fn base64_field(value: &str, field: &str) -> Result<Vec<u8>> {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    STANDARD
        .decode(value)
        .map_err(|_| CryptoError::MalformedKeyFile(format!("invalid base64 data in {field}")))
}
