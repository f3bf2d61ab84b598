use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes128Gcm, Aes256Gcm, Nonce};
use rand::RngCore;
use rand::rngs::OsRng;

use crate::error::{Result, SealError};
use crate::types::{EncryptionKey, KeyMaterial};

pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

/// Bytes added to every encrypted chunk: nonce prefix plus GCM tag.
pub const FRAME_OVERHEAD: usize = NONCE_LEN + TAG_LEN;

/// Encrypted size of a chunk of `plain_len` bytes.
pub const fn framed_len(plain_len: usize) -> usize {
    plain_len + FRAME_OVERHEAD
}

/// Length of the associated data binding a chunk to its place in a file.
pub const FRAME_AAD_LEN: usize = 9;

/// Associated data for chunk `index`: the big-endian index followed by a
/// final-chunk flag. Frames moved, dropped or cut off fail authentication.
pub fn frame_aad(index: u64, last: bool) -> [u8; FRAME_AAD_LEN] {
    let mut aad = [0u8; FRAME_AAD_LEN];
    aad[..8].copy_from_slice(&index.to_be_bytes());
    aad[8] = u8::from(last);
    aad
}

/// Symmetric authenticated encryption over opaque byte blocks.
///
/// Every call frames its output independently. Chunked files tie frames
/// together through the associated data (see [`frame_aad`]).
pub trait Encryptor: Send + Sync {
    fn encrypt_with_aad(&self, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>>;

    fn decrypt_with_aad(&self, ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>>;

    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        self.encrypt_with_aad(plaintext, &[])
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.decrypt_with_aad(ciphertext, &[])
    }
}

enum Inner {
    Aes128(Aes128Gcm),
    Aes256(Aes256Gcm),
}

/// AES-GCM with a random 96-bit nonce per call.
///
/// Frame layout: `nonce(12) || ciphertext || tag(16)`.
/// A 16-byte key selects AES-128-GCM, a 32-byte key AES-256-GCM.
pub struct AesGcmCipher {
    inner: Inner,
}

impl AesGcmCipher {
    pub fn new(key: &KeyMaterial) -> Result<Self> {
        let inner = match key.len() {
            16 => Inner::Aes128(
                Aes128Gcm::new_from_slice(key.as_bytes())
                    .map_err(|e| SealError::InvalidKey(format!("Invalid key: {e}")))?,
            ),
            32 => Inner::Aes256(
                Aes256Gcm::new_from_slice(key.as_bytes())
                    .map_err(|e| SealError::InvalidKey(format!("Invalid key: {e}")))?,
            ),
            n => {
                return Err(SealError::InvalidKey(format!(
                    "expected a 16 or 32 byte key, got {n} bytes"
                )));
            }
        };
        Ok(Self { inner })
    }

    /// Build from constructor input (hex string or raw bytes).
    pub fn from_key(key: impl Into<EncryptionKey>) -> Result<Self> {
        Self::new(&key.into().into_material()?)
    }
}

impl std::fmt::Debug for AesGcmCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let scheme = match self.inner {
            Inner::Aes128(_) => "AES-128-GCM",
            Inner::Aes256(_) => "AES-256-GCM",
        };
        f.debug_struct("AesGcmCipher")
            .field("scheme", &scheme)
            .finish_non_exhaustive()
    }
}

impl Encryptor for AesGcmCipher {
    fn encrypt_with_aad(&self, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let payload = Payload {
            msg: plaintext,
            aad,
        };
        let ciphertext = match &self.inner {
            Inner::Aes128(c) => c.encrypt(nonce, payload),
            Inner::Aes256(c) => c.encrypt(nonce, payload),
        }
        .map_err(|e| SealError::Encryption(format!("Encryption failed: {e}")))?;

        let mut frame = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        frame.extend_from_slice(&nonce_bytes);
        frame.extend_from_slice(&ciphertext);
        Ok(frame)
    }

    fn decrypt_with_aad(&self, ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.len() < FRAME_OVERHEAD {
            return Err(SealError::Decryption(format!(
                "frame too short: {} bytes, need at least {FRAME_OVERHEAD}",
                ciphertext.len()
            )));
        }
        let (nonce_bytes, body) = ciphertext.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);
        let payload = Payload { msg: body, aad };

        match &self.inner {
            Inner::Aes128(c) => c.decrypt(nonce, payload),
            Inner::Aes256(c) => c.decrypt(nonce, payload),
        }
        .map_err(|e| SealError::Decryption(format!("Decryption failed: {e}")))
    }
}
