use async_trait::async_trait;
use sealdrive_core::error::Result;
use sealdrive_core::types::File;
use std::path::Path;

/// Remote storage backend with encryption at rest (async flavor).
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Encrypt a local file and store it at `remote_path`.
    async fn upload_and_encrypt_file(&self, local_path: &Path, remote_path: &str) -> Result<()>;

    /// Fetch `remote_path` and write its decrypted contents to `local_path`.
    ///
    /// On failure the local file is left in an unspecified state.
    async fn download_and_decrypt_file(&self, remote_path: &str, local_path: &Path) -> Result<()>;

    /// List entries under `path`.
    async fn list_files(&self, path: &str) -> Result<Vec<File>>;

    /// Backend name for display.
    fn name(&self) -> &str;
}

/// Blocking flavor of [`StorageBackend`] with the same semantics.
pub trait BlockingStorageBackend: Send + Sync {
    fn upload_and_encrypt_file(&self, local_path: &Path, remote_path: &str) -> Result<()>;

    fn download_and_decrypt_file(&self, remote_path: &str, local_path: &Path) -> Result<()>;

    fn list_files(&self, path: &str) -> Result<Vec<File>>;

    fn name(&self) -> &str;
}

#[async_trait]
impl<T: StorageBackend + ?Sized> StorageBackend for Box<T> {
    async fn upload_and_encrypt_file(&self, local_path: &Path, remote_path: &str) -> Result<()> {
        (**self).upload_and_encrypt_file(local_path, remote_path).await
    }

    async fn download_and_decrypt_file(&self, remote_path: &str, local_path: &Path) -> Result<()> {
        (**self).download_and_decrypt_file(remote_path, local_path).await
    }

    async fn list_files(&self, path: &str) -> Result<Vec<File>> {
        (**self).list_files(path).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
