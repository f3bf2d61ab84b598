use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use sealdrive_core::error::{Result, SealError};
use sealdrive_core::types::{EncryptionKey, File};
use std::fmt;

pub const DEFAULT_SSE_ALGORITHM: &str = "AES256";

/// Customer key length required by `AES256` SSE-C.
pub const SSE_AES256_KEY_LEN: usize = 32;

/// SSE-C parameters attached to every object upload and download.
#[derive(Clone)]
pub struct SseParams {
    pub algorithm: String,
    /// Base64 of the raw customer key.
    pub key_b64: String,
    /// Base64 of the MD5 digest of the raw customer key.
    pub key_md5_b64: String,
}

impl SseParams {
    pub fn new(algorithm: &str, key: impl Into<EncryptionKey>) -> Result<Self> {
        let key = key.into().into_material()?;
        if algorithm == DEFAULT_SSE_ALGORITHM && key.len() != SSE_AES256_KEY_LEN {
            return Err(SealError::InvalidKey(format!(
                "SSE-C {algorithm} needs a {SSE_AES256_KEY_LEN} byte key, got {} bytes",
                key.len()
            )));
        }
        let digest = Md5::digest(key.as_bytes());
        Ok(Self {
            algorithm: algorithm.to_string(),
            key_b64: STANDARD.encode(key.as_bytes()),
            key_md5_b64: STANDARD.encode(digest),
        })
    }
}

impl fmt::Debug for SseParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SseParams")
            .field("algorithm", &self.algorithm)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Map a listed object to a [`File`].
///
/// `path` is the key with `prefix` stripped; a key ending in `/` is a directory.
pub fn object_to_file(
    key: &str,
    prefix: &str,
    size: Option<i64>,
    modified: Option<DateTime<Utc>>,
) -> File {
    let path = if prefix.is_empty() {
        key
    } else {
        key.strip_prefix(prefix).unwrap_or(key)
    };
    File {
        name: key.to_string(),
        path: path.to_string(),
        size: size.and_then(|s| u64::try_from(s).ok()).unwrap_or(0),
        modified: modified.unwrap_or_default(),
        is_dir: key.ends_with('/'),
    }
}

#[cfg(feature = "s3")]
mod inner {
    use async_trait::async_trait;
    use aws_sdk_s3::Client;
    use aws_sdk_s3::primitives::ByteStream;
    use chrono::{DateTime, Utc};
    use sealdrive_core::error::{Result, SealError};
    use sealdrive_core::types::{EncryptionKey, File};
    use std::path::Path;
    use tokio::io::AsyncWriteExt;

    use super::{DEFAULT_SSE_ALGORITHM, SseParams, object_to_file};
    use crate::provider::StorageBackend;

    /// S3 / S3-compatible backend using server-side encryption with a
    /// customer-provided key (SSE-C). No client-side chunk transform.
    pub struct S3Storage {
        client: Client,
        bucket: String,
        sse: SseParams,
        name: String,
    }

    /// Options for creating an S3 backend.
    pub struct S3Options<'a> {
        pub bucket: &'a str,
        /// Hex string or raw bytes.
        pub encryption_key: EncryptionKey,
        /// SSE-C algorithm, `AES256` unless the service says otherwise.
        pub algorithm: &'a str,
        pub region: Option<&'a str>,
        pub name: &'a str,
        /// Custom endpoint URL (e.g. `http://localhost:9000` for MinIO).
        pub endpoint_url: Option<&'a str>,
        /// Force path-style addressing (`http://host/bucket/key` instead of
        /// `http://bucket.host/key`).
        pub path_style: bool,
        /// Explicit access key. If None, uses env/profile credentials.
        pub access_key: Option<&'a str>,
        /// Explicit secret key. If None, uses env/profile credentials.
        pub secret_key: Option<&'a str>,
    }

    impl<'a> S3Options<'a> {
        pub fn new(bucket: &'a str, encryption_key: impl Into<EncryptionKey>) -> Self {
            Self {
                bucket,
                encryption_key: encryption_key.into(),
                algorithm: DEFAULT_SSE_ALGORITHM,
                region: None,
                name: "s3",
                endpoint_url: None,
                path_style: false,
                access_key: None,
                secret_key: None,
            }
        }
    }

    impl S3Storage {
        /// Create for standard AWS S3 with env/profile credentials.
        pub async fn new(bucket: &str, encryption_key: impl Into<EncryptionKey>) -> Result<Self> {
            Self::with_options(S3Options::new(bucket, encryption_key)).await
        }

        /// Create with full options.
        pub async fn with_options(opts: S3Options<'_>) -> Result<Self> {
            let sse = SseParams::new(opts.algorithm, opts.encryption_key)?;

            let mut config_loader = aws_config::from_env();

            if let Some(r) = opts.region {
                config_loader = config_loader.region(aws_config::Region::new(r.to_string()));
            }

            // If explicit credentials are provided, inject them
            if let (Some(ak), Some(sk)) = (opts.access_key, opts.secret_key) {
                let creds =
                    aws_sdk_s3::config::Credentials::new(ak, sk, None, None, "sealdrive-config");
                config_loader = config_loader.credentials_provider(creds);
            }

            let sdk_config = config_loader.load().await;

            let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&sdk_config);

            if let Some(endpoint) = opts.endpoint_url {
                s3_config_builder = s3_config_builder.endpoint_url(endpoint);
            }

            if opts.path_style {
                s3_config_builder = s3_config_builder.force_path_style(true);
            }

            Ok(Self::from_client(
                Client::from_conf(s3_config_builder.build()),
                opts.bucket,
                sse,
                opts.name,
            ))
        }

        /// Wrap an already configured client.
        pub fn from_client(client: Client, bucket: &str, sse: SseParams, name: &str) -> Self {
            Self {
                client,
                bucket: bucket.to_string(),
                sse,
                name: name.to_string(),
            }
        }
    }

    fn smithy_to_chrono(dt: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(dt.secs(), dt.subsec_nanos())
    }

    #[async_trait]
    impl StorageBackend for S3Storage {
        async fn upload_and_encrypt_file(
            &self,
            local_path: &Path,
            remote_path: &str,
        ) -> Result<()> {
            tracing::info!(
                "PutObject: {}/{remote_path} from {}",
                self.bucket,
                local_path.display()
            );
            let body = ByteStream::from_path(local_path)
                .await
                .map_err(SealError::transport)?;
            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(remote_path)
                .sse_customer_algorithm(&self.sse.algorithm)
                .sse_customer_key(&self.sse.key_b64)
                .sse_customer_key_md5(&self.sse.key_md5_b64)
                .body(body)
                .send()
                .await
                .map_err(SealError::transport)?;
            Ok(())
        }

        async fn download_and_decrypt_file(
            &self,
            remote_path: &str,
            local_path: &Path,
        ) -> Result<()> {
            tracing::info!(
                "GetObject: {}/{remote_path} to {}",
                self.bucket,
                local_path.display()
            );
            let mut resp = self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(remote_path)
                .sse_customer_algorithm(&self.sse.algorithm)
                .sse_customer_key(&self.sse.key_b64)
                .sse_customer_key_md5(&self.sse.key_md5_b64)
                .send()
                .await
                .map_err(SealError::transport)?;

            let mut file = tokio::fs::File::create(local_path).await?;
            while let Some(bytes) = resp.body.try_next().await.map_err(SealError::transport)? {
                file.write_all(&bytes).await?;
            }
            file.flush().await?;
            Ok(())
        }

        async fn list_files(&self, path: &str) -> Result<Vec<File>> {
            tracing::info!("ListObjectsV2: {} prefix={path}", self.bucket);
            let mut files = Vec::new();
            let mut continuation: Option<String> = None;
            loop {
                let resp = self
                    .client
                    .list_objects_v2()
                    .bucket(&self.bucket)
                    .prefix(path)
                    .set_continuation_token(continuation.take())
                    .send()
                    .await
                    .map_err(SealError::transport)?;

                for obj in resp.contents() {
                    let Some(key) = obj.key() else { continue };
                    files.push(object_to_file(
                        key,
                        path,
                        obj.size(),
                        obj.last_modified().and_then(smithy_to_chrono),
                    ));
                }

                match resp.next_continuation_token() {
                    Some(token) if resp.is_truncated() == Some(true) => {
                        continuation = Some(token.to_string());
                    }
                    _ => break,
                }
            }
            Ok(files)
        }

        fn name(&self) -> &str {
            &self.name
        }
    }
}

#[cfg(feature = "s3")]
pub use inner::{S3Options, S3Storage};
