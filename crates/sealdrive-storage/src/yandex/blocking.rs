//! Blocking Yandex Disk backend.
//!
//! Built on `reqwest::blocking`, which must not be used from inside an async
//! runtime. Async callers should use [`super::YandexDiskStorage`] or wrap this
//! type in [`crate::runtime::Offloaded`].

use reqwest::StatusCode;
use reqwest::blocking::{Body, Client};
use reqwest::header::AUTHORIZATION;
use sealdrive_core::error::{Result, SealError};
use sealdrive_core::slicer::{self, DecryptSlicer, EncryptSlicer};
use sealdrive_core::types::{EncryptionKey, File};
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;

use super::{YandexOptions, YandexSettings, api};
use crate::provider::BlockingStorageBackend;

/// Yandex Disk backend with client-side chunk encryption (blocking).
pub struct YandexDiskStorage {
    client: Client,
    settings: YandexSettings,
}

impl YandexDiskStorage {
    pub fn new(token: &str, encryption_key: impl Into<EncryptionKey>) -> Result<Self> {
        Self::with_options(YandexOptions::new(token, encryption_key))
    }

    pub fn with_options(opts: YandexOptions<'_>) -> Result<Self> {
        Ok(Self {
            client: Client::new(),
            settings: YandexSettings::from_options(opts)?,
        })
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.settings.chunk_size
    }

    fn get_upload_url(&self, remote_path: &str) -> Result<String> {
        let resp = self
            .client
            .get(api::upload_url(&self.settings.api_base))
            .query(&[("path", remote_path)])
            .header(AUTHORIZATION, self.settings.auth())
            .send()
            .map_err(SealError::transport)?;
        let status = resp.status().as_u16();
        let body = resp.bytes().map_err(SealError::transport)?;
        api::parse_upload_link(status, &body, remote_path)
    }

    fn get_download_url(&self, remote_path: &str) -> Result<String> {
        let resp = self
            .client
            .get(api::download_url(&self.settings.api_base))
            .query(&[("path", remote_path)])
            .header(AUTHORIZATION, self.settings.auth())
            .send()
            .map_err(SealError::transport)?;
        let status = resp.status().as_u16();
        let body = resp.bytes().map_err(SealError::transport)?;
        api::parse_download_link(status, &body)
    }
}

impl BlockingStorageBackend for YandexDiskStorage {
    fn upload_and_encrypt_file(&self, local_path: &Path, remote_path: &str) -> Result<()> {
        let upload_url = self.get_upload_url(remote_path)?;

        let file = std::fs::File::open(local_path)?;
        let plain_len = file.metadata()?.len();
        let body_len = slicer::encrypted_len(plain_len, self.settings.chunk_size);
        tracing::info!(
            "Uploading {} ({plain_len} bytes, {body_len} encrypted) to {remote_path}",
            local_path.display()
        );

        let reader = EncryptSlicer::new(
            file,
            Arc::clone(&self.settings.cipher),
            self.settings.chunk_size,
        )
        .into_reader();
        let resp = self
            .client
            .put(&upload_url)
            .header(AUTHORIZATION, self.settings.auth())
            .body(Body::sized(reader, body_len))
            .send()
            .map_err(SealError::transport)?;

        if resp.status() != StatusCode::CREATED {
            return Err(SealError::Upload {
                status: resp.status().as_u16(),
            });
        }
        tracing::debug!("Upload of {remote_path} complete");
        Ok(())
    }

    fn download_and_decrypt_file(&self, remote_path: &str, local_path: &Path) -> Result<()> {
        let download_url = self.get_download_url(remote_path)?;

        let resp = self
            .client
            .get(&download_url)
            .header(AUTHORIZATION, self.settings.auth())
            .send()
            .map_err(SealError::transport)?;
        if !resp.status().is_success() {
            return Err(SealError::Download {
                status: resp.status().as_u16(),
            });
        }

        let mut out = BufWriter::new(std::fs::File::create(local_path)?);
        let written = DecryptSlicer::new(
            resp,
            Arc::clone(&self.settings.cipher),
            self.settings.chunk_size,
        )
        .write_to(&mut out)?;
        tracing::info!(
            "Downloaded {remote_path} to {} ({written} bytes)",
            local_path.display()
        );
        Ok(())
    }

    fn list_files(&self, path: &str) -> Result<Vec<File>> {
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
                .map_err(SealError::transport)?;
            let status = resp.status().as_u16();
            let body = resp.bytes().map_err(SealError::transport)?;

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
        Ok(files)
    }

    fn name(&self) -> &str {
        &self.settings.name
    }
}
