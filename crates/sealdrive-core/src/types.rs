use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Result, SealError};

/// A remote entry returned by a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    /// Remote name or full object key, as reported by the backend.
    pub name: String,
    /// Name relative to the listing root.
    pub path: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
    pub is_dir: bool,
}

/// Key material as supplied to a backend constructor.
#[derive(Clone)]
pub enum EncryptionKey {
    /// Hex-encoded key.
    Hex(String),
    /// Raw key bytes.
    Raw(Vec<u8>),
}

impl EncryptionKey {
    /// Normalize to raw bytes.
    pub fn into_material(self) -> Result<KeyMaterial> {
        let bytes = match self {
            EncryptionKey::Hex(s) => hex::decode(s.trim())
                .map_err(|e| SealError::InvalidKey(format!("not a hex string: {e}")))?,
            EncryptionKey::Raw(b) => b,
        };
        if bytes.is_empty() {
            return Err(SealError::InvalidKey("key is empty".to_string()));
        }
        Ok(KeyMaterial { key: bytes })
    }
}

impl From<&str> for EncryptionKey {
    fn from(s: &str) -> Self {
        EncryptionKey::Hex(s.to_string())
    }
}

impl From<String> for EncryptionKey {
    fn from(s: String) -> Self {
        EncryptionKey::Hex(s)
    }
}

impl From<&[u8]> for EncryptionKey {
    fn from(b: &[u8]) -> Self {
        EncryptionKey::Raw(b.to_vec())
    }
}

impl<const N: usize> From<[u8; N]> for EncryptionKey {
    fn from(b: [u8; N]) -> Self {
        EncryptionKey::Raw(b.to_vec())
    }
}

impl From<Vec<u8>> for EncryptionKey {
    fn from(b: Vec<u8>) -> Self {
        EncryptionKey::Raw(b)
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey([REDACTED])")
    }
}

/// Normalized encryption key, zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial {
    key: Vec<u8>,
}

impl KeyMaterial {
    pub fn as_bytes(&self) -> &[u8] {
        &self.key
    }

    pub fn len(&self) -> usize {
        self.key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.key.is_empty()
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("len", &self.key.len())
            .field("key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_key_is_decoded() {
        let key = EncryptionKey::from("00ff10").into_material().unwrap();
        assert_eq!(key.as_bytes(), &[0x00, 0xff, 0x10]);
    }

    #[test]
    fn raw_key_is_kept() {
        let key = EncryptionKey::from([7u8; 16]).into_material().unwrap();
        assert_eq!(key.len(), 16);
    }

    #[test]
    fn bad_hex_is_invalid_key() {
        let err = EncryptionKey::from("not-hex").into_material().unwrap_err();
        assert!(matches!(err, SealError::InvalidKey(_)));
    }

    #[test]
    fn empty_key_is_invalid() {
        let err = EncryptionKey::Raw(vec![]).into_material().unwrap_err();
        assert!(matches!(err, SealError::InvalidKey(_)));
    }

    #[test]
    fn debug_redacts_key() {
        let key = EncryptionKey::from([0x42u8; 32]).into_material().unwrap();
        let dbg = format!("{key:?}");
        assert!(dbg.contains("REDACTED"));
        assert!(!dbg.contains("66"));
    }
}
