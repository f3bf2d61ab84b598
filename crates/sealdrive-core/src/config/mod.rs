use crate::error::{Result, SealError};
use crate::slicer::DEFAULT_CHUNK_SIZE;
use crate::types::EncryptionKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Top-level SealDrive configuration stored as TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealConfig {
    #[serde(default)]
    pub sealdrive: SealSettings,
    #[serde(default)]
    pub backends: Vec<BackendConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealSettings {
    /// Plaintext chunk size for client-side encryption. Must stay the same
    /// between upload and download of a file.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for SealSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_algorithm() -> String {
    "AES256".to_string()
}

/// One configured storage backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    Yandex(YandexBackendConfig),
    S3(S3BackendConfig),
}

impl BackendConfig {
    pub fn name(&self) -> &str {
        match self {
            BackendConfig::Yandex(c) => &c.name,
            BackendConfig::S3(c) => &c.name,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct YandexBackendConfig {
    pub name: String,
    /// OAuth token.
    pub token: String,
    /// Hex-encoded 16 or 32 byte key.
    pub encryption_key: String,
    /// Per-backend override of `sealdrive.chunk_size`.
    #[serde(default)]
    pub chunk_size: Option<usize>,
    /// API base override (defaults to the public Disk API).
    #[serde(default)]
    pub api_base: Option<String>,
}

impl YandexBackendConfig {
    pub fn key(&self) -> EncryptionKey {
        EncryptionKey::Hex(self.encryption_key.clone())
    }
}

impl fmt::Debug for YandexBackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("YandexBackendConfig")
            .field("name", &self.name)
            .field("token", &"[REDACTED]")
            .field("encryption_key", &"[REDACTED]")
            .field("chunk_size", &self.chunk_size)
            .field("api_base", &self.api_base)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct S3BackendConfig {
    pub name: String,
    pub bucket: String,
    /// Hex-encoded SSE-C customer key.
    pub encryption_key: String,
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
    #[serde(default)]
    pub region: Option<String>,
    /// Custom endpoint URL for S3-compatible services (MinIO, Garage, ...).
    #[serde(default)]
    pub endpoint_url: Option<String>,
    /// Use path-style addressing (required by most S3-compatible servers).
    #[serde(default)]
    pub path_style: bool,
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
}

impl S3BackendConfig {
    pub fn key(&self) -> EncryptionKey {
        EncryptionKey::Hex(self.encryption_key.clone())
    }
}

impl fmt::Debug for S3BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3BackendConfig")
            .field("name", &self.name)
            .field("bucket", &self.bucket)
            .field("encryption_key", &"[REDACTED]")
            .field("algorithm", &self.algorithm)
            .field("region", &self.region)
            .field("endpoint_url", &self.endpoint_url)
            .field("path_style", &self.path_style)
            .field("access_key", &self.access_key.as_ref().map(|_| "[REDACTED]"))
            .field("secret_key", &self.secret_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl SealConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SealError::ConfigNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| SealError::TomlDe(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| SealError::TomlSer(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.sealdrive.chunk_size == 0 {
            return Err(SealError::Config("chunk_size must be positive".to_string()));
        }
        for (i, b) in self.backends.iter().enumerate() {
            if self.backends[..i].iter().any(|p| p.name() == b.name()) {
                return Err(SealError::Config(format!(
                    "duplicate backend name '{}'",
                    b.name()
                )));
            }
            if let BackendConfig::Yandex(y) = b {
                if y.chunk_size == Some(0) {
                    return Err(SealError::Config(format!(
                        "backend '{}': chunk_size must be positive",
                        y.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Look up a backend by name.
    pub fn backend(&self, name: &str) -> Result<&BackendConfig> {
        self.backends
            .iter()
            .find(|b| b.name() == name)
            .ok_or_else(|| SealError::Config(format!("backend '{name}' is not configured")))
    }

    /// Effective chunk size for a backend.
    pub fn chunk_size_for(&self, backend: &BackendConfig) -> usize {
        match backend {
            BackendConfig::Yandex(y) => y.chunk_size.unwrap_or(self.sealdrive.chunk_size),
            BackendConfig::S3(_) => self.sealdrive.chunk_size,
        }
    }

    /// Resolve the config file path: `<base_dir>/sealdrive.toml`
    pub fn default_path(base_dir: &Path) -> PathBuf {
        base_dir.join("sealdrive.toml")
    }

    /// Resolve the default home directory: `~/.sealdrive`
    pub fn default_base_dir() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|h| h.join(".sealdrive"))
            .ok_or_else(|| SealError::Config("Cannot determine home directory".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
[sealdrive]
chunk_size = 4096

[[backends]]
name = "disk"
type = "yandex"
token = "y0_secret"
encryption_key = "00112233445566778899aabbccddeeff"

[[backends]]
name = "archive"
type = "s3"
bucket = "backups"
encryption_key = "aa"
endpoint_url = "http://localhost:9000"
path_style = true
"#;

    #[test]
    fn parse_sample() {
        let config = SealConfig::parse(SAMPLE).unwrap();
        assert_eq!(config.sealdrive.chunk_size, 4096);
        assert_eq!(config.backends.len(), 2);

        let BackendConfig::S3(s3) = config.backend("archive").unwrap() else {
            panic!("expected s3 backend");
        };
        assert_eq!(s3.algorithm, "AES256");
        assert!(s3.path_style);
        assert_eq!(s3.region, None);
    }

    #[test]
    fn roundtrip_config() {
        let tmp = TempDir::new().unwrap();
        let path = SealConfig::default_path(tmp.path());
        let config = SealConfig::parse(SAMPLE).unwrap();
        config.save(&path).unwrap();
        let loaded = SealConfig::load(&path).unwrap();
        assert_eq!(loaded.backends.len(), 2);
        assert_eq!(loaded.backend("disk").unwrap().name(), "disk");
    }

    #[test]
    fn load_nonexistent_returns_error() {
        let result = SealConfig::load(Path::new("/nonexistent/sealdrive.toml"));
        assert!(matches!(result, Err(SealError::ConfigNotFound(_))));
    }

    #[test]
    fn default_chunk_size_applies() {
        let config = SealConfig::parse("").unwrap();
        assert_eq!(config.sealdrive.chunk_size, DEFAULT_CHUNK_SIZE);
        assert!(config.backends.is_empty());
    }

    #[test]
    fn per_backend_chunk_size_override() {
        let toml = r#"
[[backends]]
name = "disk"
type = "yandex"
token = "t"
encryption_key = "00"
chunk_size = 4
"#;
        let config = SealConfig::parse(toml).unwrap();
        let backend = config.backend("disk").unwrap();
        assert_eq!(config.chunk_size_for(backend), 4);
    }

    #[test]
    fn duplicate_names_rejected() {
        let toml = r#"
[[backends]]
name = "x"
type = "s3"
bucket = "a"
encryption_key = "00"

[[backends]]
name = "x"
type = "s3"
bucket = "b"
encryption_key = "00"
"#;
        assert!(matches!(SealConfig::parse(toml), Err(SealError::Config(_))));
    }

    #[test]
    fn unknown_backend_is_config_error() {
        let config = SealConfig::parse(SAMPLE).unwrap();
        assert!(matches!(config.backend("nope"), Err(SealError::Config(_))));
    }

    #[test]
    fn debug_hides_secrets() {
        let config = SealConfig::parse(SAMPLE).unwrap();
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("y0_secret"));
        assert!(!dbg.contains("00112233"));
    }
}
