pub mod cipher;
pub mod config;
pub mod error;
pub mod slicer;
pub mod types;

pub use cipher::{AesGcmCipher, Encryptor};
pub use error::{Result, SealError};
pub use types::{EncryptionKey, File, KeyMaterial};
