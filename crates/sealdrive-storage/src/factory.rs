//! Build storage backends from configuration.

use sealdrive_core::config::{BackendConfig, SealConfig};
use sealdrive_core::error::{Result, SealError};

use crate::provider::StorageBackend;
use crate::yandex::{YandexDiskStorage, YandexOptions};

/// Create the async backend described by `config`.
///
/// Supported types:
/// - `"yandex"`: Yandex Disk with client-side chunk encryption
/// - `"s3"`: S3 / S3-compatible with SSE-C (compile with the `s3` feature)
pub async fn create_backend(
    config: &BackendConfig,
    chunk_size: usize,
) -> Result<Box<dyn StorageBackend>> {
    match config {
        BackendConfig::Yandex(y) => {
            let opts = YandexOptions {
                token: &y.token,
                encryption_key: y.key(),
                chunk_size: y.chunk_size.unwrap_or(chunk_size),
                api_base: y.api_base.as_deref(),
                name: &y.name,
            };
            Ok(Box::new(YandexDiskStorage::with_options(opts)?))
        }

        #[cfg(feature = "s3")]
        BackendConfig::S3(s) => {
            let opts = crate::s3::S3Options {
                bucket: &s.bucket,
                encryption_key: s.key(),
                algorithm: &s.algorithm,
                region: s.region.as_deref(),
                name: &s.name,
                endpoint_url: s.endpoint_url.as_deref(),
                path_style: s.path_style,
                access_key: s.access_key.as_deref(),
                secret_key: s.secret_key.as_deref(),
            };
            Ok(Box::new(crate::s3::S3Storage::with_options(opts).await?))
        }

        #[cfg(not(feature = "s3"))]
        BackendConfig::S3(_) => Err(SealError::Config(
            "s3 feature not enabled. Recompile with --features s3".to_string(),
        )),
    }
}

/// Create the named backend from a loaded config.
pub async fn create_named_backend(
    config: &SealConfig,
    name: &str,
) -> Result<Box<dyn StorageBackend>> {
    let backend = config.backend(name)?;
    tracing::info!("Creating backend '{name}'");
    create_backend(backend, config.chunk_size_for(backend))
        .await
        .map_err(|e| match e {
            SealError::InvalidKey(msg) => SealError::InvalidKey(format!("backend '{name}': {msg}")),
            other => other,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
[sealdrive]
chunk_size = 64

[[backends]]
name = "disk"
type = "yandex"
token = "t"
encryption_key = "00112233445566778899aabbccddeeff"

[[backends]]
name = "broken"
type = "yandex"
token = "t"
encryption_key = "abcd"
"#;

    #[tokio::test]
    async fn builds_yandex_backend() {
        let config = SealConfig::parse(CONFIG).unwrap();
        let backend = create_named_backend(&config, "disk").await.unwrap();
        assert_eq!(backend.name(), "disk");
    }

    #[tokio::test]
    async fn bad_key_names_backend() {
        let config = SealConfig::parse(CONFIG).unwrap();
        match create_named_backend(&config, "broken").await {
            Err(SealError::InvalidKey(msg)) => assert!(msg.contains("broken")),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected an invalid key error"),
        }
    }

    #[tokio::test]
    async fn unknown_backend() {
        let config = SealConfig::parse(CONFIG).unwrap();
        assert!(matches!(
            create_named_backend(&config, "missing").await,
            Err(SealError::Config(_))
        ));
    }
}
