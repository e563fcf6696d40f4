//! Configuration management for PDF Toolbox Server

use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::rasterizer::QualityTier;

/// Default maximum request body: 32 MB
pub const DEFAULT_MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Longest link lifetime a SigV4 presigned URL accepts: 7 days
pub const MAX_SIGNED_URL_TTL_HOURS: u64 = 7 * 24;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub rasterizer: RasterizerConfig,
    pub jobs: JobConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound for a whole multipart request
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub provider: StorageProvider,
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: Option<String>,
    /// Root directory for the `local` provider
    pub local_root: PathBuf,
    /// Base URL under which `/files` is reachable (local provider)
    pub public_base_url: String,
    /// Secret used to sign local download URLs
    pub signing_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    Local,
    Minio,
    R2,
    S3,
    B2,
}

impl StorageProvider {
    pub fn is_local(&self) -> bool {
        matches!(self, StorageProvider::Local)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RasterizerConfig {
    pub program: String,
    /// Arguments placed before the fixed Ghostscript arguments
    pub prefix_args: Vec<String>,
    pub default_quality: QualityTier,
    pub timeout_secs: u64,
}

impl RasterizerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    pub scratch_dir: PathBuf,
    pub signed_url_ttl_hours: u64,
}

impl JobConfig {
    pub fn signed_url_ttl(&self) -> Duration {
        Duration::from_secs(self.signed_url_ttl_hours.saturating_mul(3600))
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            },
            storage: StorageConfig {
                provider: StorageProvider::Local,
                endpoint: "http://localhost:9000".to_string(),
                bucket: "pdf-toolbox".to_string(),
                access_key: String::new(),
                secret_key: String::new(),
                region: Some("us-east-1".to_string()),
                local_root: PathBuf::from("./data"),
                public_base_url: "http://localhost:8080".to_string(),
                signing_secret: random_secret(),
            },
            rasterizer: RasterizerConfig {
                program: "gs".to_string(),
                prefix_args: Vec::new(),
                default_quality: QualityTier::Ebook,
                timeout_secs: 60,
            },
            jobs: JobConfig {
                scratch_dir: env::temp_dir().join("pdf-toolbox"),
                signed_url_ttl_hours: 1,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        let defaults = Config::default();

        let provider = match env::var("STORAGE_PROVIDER")
            .unwrap_or_else(|_| "local".to_string())
            .to_lowercase()
            .as_str()
        {
            "minio" => StorageProvider::Minio,
            "r2" => StorageProvider::R2,
            "s3" => StorageProvider::S3,
            "b2" => StorageProvider::B2,
            _ => StorageProvider::Local,
        };

        // Remote providers cannot fall back to made-up credentials
        let storage = if provider.is_local() {
            StorageConfig {
                provider,
                local_root: env::var("LOCAL_STORAGE_ROOT")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.storage.local_root),
                public_base_url: env::var("PUBLIC_BASE_URL")
                    .unwrap_or(defaults.storage.public_base_url),
                signing_secret: env::var("URL_SIGNING_SECRET")
                    .unwrap_or(defaults.storage.signing_secret),
                ..defaults.storage
            }
        } else {
            StorageConfig {
                provider,
                endpoint: env::var("S3_ENDPOINT")?,
                bucket: env::var("S3_BUCKET")?,
                access_key: env::var("S3_ACCESS_KEY")?,
                secret_key: env::var("S3_SECRET_KEY")?,
                region: env::var("S3_REGION").ok(),
                ..defaults.storage
            }
        };

        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_var("SERVER_PORT", defaults.server.port),
                max_body_bytes: parse_var("MAX_BODY_BYTES", defaults.server.max_body_bytes),
            },
            storage,
            rasterizer: RasterizerConfig {
                program: env::var("RASTERIZER_PROGRAM").unwrap_or(defaults.rasterizer.program),
                prefix_args: env::var("RASTERIZER_PREFIX_ARGS")
                    .map(|raw| raw.split_whitespace().map(str::to_string).collect())
                    .unwrap_or_default(),
                default_quality: parse_var("RASTERIZER_QUALITY", defaults.rasterizer.default_quality),
                timeout_secs: parse_var("RASTERIZER_TIMEOUT_SECS", defaults.rasterizer.timeout_secs),
            },
            jobs: JobConfig {
                scratch_dir: env::var("SCRATCH_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.jobs.scratch_dir),
                signed_url_ttl_hours: clamp_ttl_hours(parse_var(
                    "SIGNED_URL_TTL_HOURS",
                    defaults.jobs.signed_url_ttl_hours,
                )),
            },
        })
    }
}

/// Read and parse an optional variable, keeping the default on absence or garbage.
fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(variable = name, value = %raw, "Ignoring unparsable value");
            default
        }),
        Err(_) => default,
    }
}

/// Keep link lifetimes within what every backend can sign
fn clamp_ttl_hours(hours: u64) -> u64 {
    if hours == 0 || hours > MAX_SIGNED_URL_TTL_HOURS {
        let clamped = hours.clamp(1, MAX_SIGNED_URL_TTL_HOURS);
        tracing::warn!(requested = hours, using = clamped, "SIGNED_URL_TTL_HOURS out of range");
        clamped
    } else {
        hours
    }
}

fn random_secret() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
