/// Integration tests for the S3 SSE-C backend.
///
/// These tests require a real bucket and are skipped if env vars are not set.
///
/// Run with:
///   S3_TEST_BUCKET=sealdrive-test \
///   S3_TEST_ENDPOINT=http://localhost:9000 \
///   S3_TEST_ACCESS_KEY=minioadmin S3_TEST_SECRET_KEY=minioadmin \
///   cargo test -p sealdrive-storage --test s3_live -- --nocapture
///
/// SSE-C needs TLS on AWS; MinIO accepts it over plain HTTP only with
/// `MINIO_KMS_SECRET_KEY` configured.
#[cfg(feature = "s3")]
mod s3_tests {
    use sealdrive_core::error::SealError;
    use sealdrive_storage::Blocking;
    use sealdrive_storage::provider::{BlockingStorageBackend, StorageBackend};
    use sealdrive_storage::s3::{S3Options, S3Storage};
    use std::time::{SystemTime, UNIX_EPOCH};
    use tempfile::TempDir;

    const KEY_HEX: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    struct Env {
        bucket: String,
        endpoint: Option<String>,
        region: Option<String>,
        access_key: Option<String>,
        secret_key: Option<String>,
    }

    fn test_env() -> Option<Env> {
        let bucket = std::env::var("S3_TEST_BUCKET").ok()?;
        if bucket.is_empty() {
            return None;
        }
        Some(Env {
            bucket,
            endpoint: std::env::var("S3_TEST_ENDPOINT").ok(),
            region: std::env::var("S3_TEST_REGION").ok(),
            access_key: std::env::var("S3_TEST_ACCESS_KEY").ok(),
            secret_key: std::env::var("S3_TEST_SECRET_KEY").ok(),
        })
    }

    async fn storage(env: &Env, key: &str) -> S3Storage {
        let mut opts = S3Options::new(&env.bucket, key);
        opts.name = "s3-live";
        opts.region = env.region.as_deref().or(Some("us-east-1"));
        opts.endpoint_url = env.endpoint.as_deref();
        opts.path_style = env.endpoint.is_some();
        opts.access_key = env.access_key.as_deref();
        opts.secret_key = env.secret_key.as_deref();
        S3Storage::with_options(opts).await.expect("s3 client")
    }

    fn unique_prefix() -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        format!("sealdrive-test/{nanos}/")
    }

    #[tokio::test]
    async fn s3_upload_download_list() {
        let Some(env) = test_env() else {
            eprintln!("SKIP: S3_TEST_BUCKET not set");
            return;
        };
        let s3 = storage(&env, KEY_HEX).await;
        let prefix = unique_prefix();
        let remote = format!("{prefix}hello.txt");

        let tmp = TempDir::new().unwrap();
        let local = tmp.path().join("hello.txt");
        let data = b"Hello from sealdrive integration test - S3 SSE-C!";
        std::fs::write(&local, data).unwrap();

        s3.upload_and_encrypt_file(&local, &remote)
            .await
            .expect("upload failed");
        println!("OK: S3 upload");

        let restored = tmp.path().join("restored.txt");
        s3.download_and_decrypt_file(&remote, &restored)
            .await
            .expect("download failed");
        assert_eq!(std::fs::read(&restored).unwrap(), data);
        println!("OK: S3 download matches");

        let files = s3.list_files(&prefix).await.expect("list failed");
        assert!(
            files
                .iter()
                .any(|f| f.path == "hello.txt" && f.size == data.len() as u64)
        );
        println!("OK: S3 list ({} entries)", files.len());
    }

    #[tokio::test]
    async fn s3_wrong_key_is_rejected() {
        let Some(env) = test_env() else {
            eprintln!("SKIP: S3_TEST_BUCKET not set");
            return;
        };
        let s3 = storage(&env, KEY_HEX).await;
        let other = storage(&env, &"ab".repeat(32)).await;
        let remote = format!("{}k.bin", unique_prefix());

        let tmp = TempDir::new().unwrap();
        let local = tmp.path().join("k.bin");
        std::fs::write(&local, b"secret").unwrap();
        s3.upload_and_encrypt_file(&local, &remote).await.unwrap();

        let err = other
            .download_and_decrypt_file(&remote, &tmp.path().join("out"))
            .await
            .unwrap_err();
        assert!(matches!(err, SealError::Transport(_)));
        println!("OK: S3 rejected wrong SSE-C key: {err}");
    }

    #[test]
    fn s3_blocking_facade() {
        let Some(env) = test_env() else {
            eprintln!("SKIP: S3_TEST_BUCKET not set");
            return;
        };
        let blocking = Blocking::connect(async {
            let mut opts = S3Options::new(&env.bucket, KEY_HEX);
            opts.region = env.region.as_deref().or(Some("us-east-1"));
            opts.endpoint_url = env.endpoint.as_deref();
            opts.path_style = env.endpoint.is_some();
            opts.access_key = env.access_key.as_deref();
            opts.secret_key = env.secret_key.as_deref();
            S3Storage::with_options(opts).await
        })
        .expect("s3 client");

        let prefix = unique_prefix();
        let remote = format!("{prefix}b.bin");
        let tmp = TempDir::new().unwrap();
        let local = tmp.path().join("b.bin");
        let data: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&local, &data).unwrap();

        blocking.upload_and_encrypt_file(&local, &remote).unwrap();
        let restored = tmp.path().join("b.out");
        blocking.download_and_decrypt_file(&remote, &restored).unwrap();
        assert_eq!(std::fs::read(&restored).unwrap(), data);
        assert_eq!(blocking.list_files(&prefix).unwrap().len(), 1);
        println!("OK: S3 blocking roundtrip");
    }
}
