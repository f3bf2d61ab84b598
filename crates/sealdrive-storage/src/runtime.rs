//! Scheduling adapters between the async and blocking backend traits.
//!
//! - [`Blocking`] drives an async backend to completion on a process-wide
//!   worker runtime, for callers that have no runtime of their own.
//! - [`Offloaded`] runs a blocking backend on tokio's blocking thread pool
//!   and awaits the result, so it can be used from async code.

use async_trait::async_trait;
use sealdrive_core::error::{Result, SealError};
use sealdrive_core::types::File;
use std::future::Future;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tokio::runtime::Runtime;

use crate::provider::{BlockingStorageBackend, StorageBackend};

/// Worker threads backing every [`Blocking`] adapter in the process.
const WORKER_THREADS: usize = 4;

static WORKER_RUNTIME: OnceLock<std::result::Result<Runtime, String>> = OnceLock::new();

/// Shared worker runtime, created on first use and never shut down.
fn worker_runtime() -> Result<&'static Runtime> {
    WORKER_RUNTIME
        .get_or_init(|| {
            tokio::runtime::Builder::new_multi_thread()
                .worker_threads(WORKER_THREADS)
                .thread_name("sealdrive-worker")
                .enable_all()
                .build()
                .map_err(|e| e.to_string())
        })
        .as_ref()
        .map_err(|e| SealError::Io(std::io::Error::other(format!("worker runtime: {e}"))))
}

/// Blocking facade over an async [`StorageBackend`].
///
/// Calls block the current thread. They must not be made from inside an
/// async runtime.
pub struct Blocking<S> {
    inner: S,
}

impl<S: StorageBackend> Blocking<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    /// Run an async constructor on the worker runtime.
    pub fn connect<F>(build: F) -> Result<Self>
    where
        F: Future<Output = Result<S>>,
    {
        let inner = worker_runtime()?.block_on(build)?;
        Ok(Self::new(inner))
    }
}

impl<S: StorageBackend> BlockingStorageBackend for Blocking<S> {
    fn upload_and_encrypt_file(&self, local_path: &Path, remote_path: &str) -> Result<()> {
        worker_runtime()?.block_on(self.inner.upload_and_encrypt_file(local_path, remote_path))
    }

    fn download_and_decrypt_file(&self, remote_path: &str, local_path: &Path) -> Result<()> {
        worker_runtime()?.block_on(self.inner.download_and_decrypt_file(remote_path, local_path))
    }

    fn list_files(&self, path: &str) -> Result<Vec<File>> {
        worker_runtime()?.block_on(self.inner.list_files(path))
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

/// Async facade over a [`BlockingStorageBackend`].
pub struct Offloaded<B> {
    inner: Arc<B>,
}

impl<B: BlockingStorageBackend + 'static> Offloaded<B> {
    pub fn new(inner: B) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    async fn run<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&B) -> Result<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || op(inner.as_ref()))
            .await
            .map_err(|e| SealError::Io(std::io::Error::other(e)))?
    }
}

#[async_trait]
impl<B: BlockingStorageBackend + 'static> StorageBackend for Offloaded<B> {
    async fn upload_and_encrypt_file(&self, local_path: &Path, remote_path: &str) -> Result<()> {
        let local_path = local_path.to_path_buf();
        let remote_path = remote_path.to_string();
        self.run(move |b| b.upload_and_encrypt_file(&local_path, &remote_path))
            .await
    }

    async fn download_and_decrypt_file(&self, remote_path: &str, local_path: &Path) -> Result<()> {
        let local_path = local_path.to_path_buf();
        let remote_path = remote_path.to_string();
        self.run(move |b| b.download_and_decrypt_file(&remote_path, &local_path))
            .await
    }

    async fn list_files(&self, path: &str) -> Result<Vec<File>> {
        let path = path.to_string();
        self.run(move |b| b.list_files(&path)).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
