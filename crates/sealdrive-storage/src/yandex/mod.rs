pub mod api;
pub mod blocking;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH};
use reqwest::{Client, StatusCode};
use sealdrive_core::cipher::{AesGcmCipher, Encryptor};
use sealdrive_core::error::{Result, SealError};
use sealdrive_core::slicer::{self, DEFAULT_CHUNK_SIZE};
use sealdrive_core::types::{EncryptionKey, File};
use std::path::Path;
use std::sync::Arc;

use crate::provider::StorageBackend;

pub use api::DEFAULT_API_BASE;

/// Options for creating a Yandex Disk backend.
pub struct YandexOptions<'a> {
    /// OAuth token, sent as `Authorization: OAuth {token}`.
    pub token: &'a str,
    pub encryption_key: EncryptionKey,
    /// Plaintext chunk size. Downloads must use the size the file was uploaded with.
    pub chunk_size: usize,
    /// API base, e.g. `https://cloud-api.yandex.net/v1/disk`.
    pub api_base: Option<&'a str>,
    pub name: &'a str,
}

impl<'a> YandexOptions<'a> {
    pub fn new(token: &'a str, encryption_key: impl Into<EncryptionKey>) -> Self {
        Self {
            token,
            encryption_key: encryption_key.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            api_base: None,
            name: "yandex",
        }
    }
}

/// Settings shared by the async and blocking clients.
pub(crate) struct YandexSettings {
    pub token: String,
    pub cipher: Arc<dyn Encryptor>,
    pub chunk_size: usize,
    pub api_base: String,
    pub name: String,
}

impl YandexSettings {
    pub fn from_options(opts: YandexOptions<'_>) -> Result<Self> {
        if opts.chunk_size == 0 {
            return Err(SealError::Config("chunk size must be positive".to_string()));
        }
        let cipher = AesGcmCipher::new(&opts.encryption_key.into_material()?)?;
        Ok(Self {
            token: opts.token.to_string(),
            cipher: Arc::new(cipher),
            chunk_size: opts.chunk_size,
            api_base: opts.api_base.unwrap_or(DEFAULT_API_BASE).to_string(),
            name: opts.name.to_string(),
        })
    }

    pub fn auth(&self) -> String {
        api::auth_header(&self.token)
    }
}

/// Yandex Disk backend with client-side chunk encryption (async).
pub struct YandexDiskStorage {
    client: Client,
    settings: YandexSettings,
}

impl YandexDiskStorage {
    /// Create with the default chunk size and public API endpoint.
    pub fn new(token: &str, encryption_key: impl Into<EncryptionKey>) -> Result<Self> {
        Self::with_options(YandexOptions::new(token, encryption_key))
    }

    /// Create with full options.
    pub fn with_options(opts: YandexOptions<'_>) -> Result<Self> {
        Ok(Self {
            client: Client::new(),
            settings: YandexSettings::from_options(opts)?,
        })
    }

    /// Use a preconfigured HTTP client (timeouts, proxies, TLS).
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.settings.chunk_size
    }

    async fn get_upload_url(&self, remote_path: &str) -> Result<String> {
        let resp = self
            .client
            .get(api::upload_url(&self.settings.api_base))
            .query(&[("path", remote_path)])
            .header(AUTHORIZATION, self.settings.auth())
            .send()
            .await
            .map_err(SealError::transport)?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await.map_err(SealError::transport)?;
        api::parse_upload_link(status, &body, remote_path)
    }

    async fn get_download_url(&self, remote_path: &str) -> Result<String> {
        let resp = self
            .client
            .get(api::download_url(&self.settings.api_base))
            .query(&[("path", remote_path)])
            .header(AUTHORIZATION, self.settings.auth())
            .send()
            .await
            .map_err(SealError::transport)?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await.map_err(SealError::transport)?;
        api::parse_download_link(status, &body)
    }
}

#[async_trait]
impl StorageBackend for YandexDiskStorage {
    async fn upload_and_encrypt_file(&self, local_path: &Path, remote_path: &str) -> Result<()> {
        let upload_url = self.get_upload_url(remote_path).await?;

        let file = tokio::fs::File::open(local_path).await?;
        let plain_len = file.metadata().await?.len();
        let body_len = slicer::encrypted_len(plain_len, self.settings.chunk_size);
        tracing::info!(
            "Uploading {} ({plain_len} bytes, {body_len} encrypted) to {remote_path}",
            local_path.display()
        );

        let stream = slicer::encrypt_stream(
            file,
            Arc::clone(&self.settings.cipher),
            self.settings.chunk_size,
        );
        let resp = self
            .client
            .put(&upload_url)
            .header(AUTHORIZATION, self.settings.auth())
            .header(CONTENT_LENGTH, body_len)
            .body(reqwest::Body::wrap_stream(stream))
            .send()
            .await
            .map_err(SealError::transport)?;

        if resp.status() != StatusCode::CREATED {
            return Err(SealError::Upload {
                status: resp.status().as_u16(),
            });
        }
        tracing::debug!("Upload of {remote_path} complete");
        Ok(())
    }

    async fn download_and_decrypt_file(&self, remote_path: &str, local_path: &Path) -> Result<()> {
        let download_url = self.get_download_url(remote_path).await?;

        let resp = self
            .client
            .get(&download_url)
            .header(AUTHORIZATION, self.settings.auth())
            .send()
            .await
            .map_err(SealError::transport)?;
        if !resp.status().is_success() {
            return Err(SealError::Download {
                status: resp.status().as_u16(),
            });
        }

        let mut file = tokio::fs::File::create(local_path).await?;
        let written = slicer::decrypt_stream_to(
            Box::pin(resp.bytes_stream()),
            &mut file,
            Arc::clone(&self.settings.cipher),
            self.settings.chunk_size,
        )
        .await?;
        tracing::info!(
            "Downloaded {remote_path} to {} ({written} bytes)",
            local_path.display()
        );
        Ok(())
    }

    async fn list_files(&self, path: &str) -> Result<Vec<File>> {
        let mut files = Vec::new();
        let mut offset = 0u64;
        loop {
            let resp = self
                .client
                .get(api::resources_url(&self.settings.api_base))
                .query(&[("path", path)])
                .query(&[("limit", api::PAGE_LIMIT), ("offset", offset)])
                .header(AUTHORIZATION, self.settings.auth())
                .send()
                .await
                .map_err(SealError::transport)?;
            let status = resp.status().as_u16();
            let body = resp.bytes().await.map_err(SealError::transport)?;

            let page = api::parse_list_page(status, &body)?;
            let page_len = page.items.len();
            for item in page.items {
                files.push(item.into_file()?);
            }
            offset += page_len as u64;
            if !api::has_more(page.total, offset, page_len) {
                break;
            }
        }
        tracing::debug!("Listed {} entries under {path}", files.len());
        Ok(files)
    }

    fn name(&self) -> &str {
        &self.settings.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_key() {
        let err = YandexDiskStorage::new("token", [0u8; 7]).err().unwrap();
        assert!(matches!(err, SealError::InvalidKey(_)));
    }

    #[test]
    fn rejects_zero_chunk_size() {
        let mut opts = YandexOptions::new("token", [0u8; 16]);
        opts.chunk_size = 0;
        assert!(matches!(
            YandexDiskStorage::with_options(opts),
            Err(SealError::Config(_))
        ));
    }

    #[test]
    fn defaults() {
        let storage = YandexDiskStorage::new("token", [0u8; 32]).unwrap();
        assert_eq!(storage.chunk_size(), DEFAULT_CHUNK_SIZE);
        assert_eq!(storage.name(), "yandex");
        assert_eq!(storage.settings.api_base, DEFAULT_API_BASE);
        assert_eq!(storage.settings.auth(), "OAuth token");
    }
}
