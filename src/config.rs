use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "DigiArch";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_BUCKET: &str = "digiarch-documents";
pub const DEFAULT_MAX_UPLOAD_MB: u64 = 10;
pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;
pub const DEFAULT_MAX_COLLISION_ATTEMPTS: u32 = 100;
pub const DEFAULT_SIGNED_URL_TTL_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_PUBLIC_URL: &str = "http://localhost:9000";
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.1";
pub const DEFAULT_OLLAMA_TIMEOUT_SECS: u64 = 120;

const ENV_PREFIX: &str = "DIGIARCH_";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: String, value: String },

    #[error("Cannot determine home directory; set DIGIARCH_DATA_DIR")]
    NoHomeDir,
}

/// Filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "info,digiarch=debug"
}

/// ~/DigiArch/ unless overridden.
pub fn app_data_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|home| home.join(APP_NAME))
        .ok_or(ConfigError::NoHomeDir)
}

/// Runtime settings, from defaults overridden by `DIGIARCH_*` variables.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveConfig {
    pub data_dir: PathBuf,
    pub bucket: String,
    pub max_upload_bytes: u64,
    pub worker_count: usize,
    pub queue_capacity: usize,
    pub max_collision_attempts: u32,
    pub signed_url_ttl: Duration,
    pub public_base_url: String,
    /// `None` means a random per-process secret.
    pub url_secret: Option<String>,
    pub ollama_url: String,
    pub ollama_model: String,
    pub ollama_timeout_secs: u64,
}

impl ArchiveConfig {
    /// Defaults rooted at `data_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            bucket: DEFAULT_BUCKET.to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
            worker_count: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_collision_attempts: DEFAULT_MAX_COLLISION_ATTEMPTS,
            signed_url_ttl: Duration::from_secs(DEFAULT_SIGNED_URL_TTL_SECS),
            public_base_url: DEFAULT_PUBLIC_URL.to_string(),
            url_secret: None,
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            ollama_model: DEFAULT_OLLAMA_MODEL.to_string(),
            ollama_timeout_secs: DEFAULT_OLLAMA_TIMEOUT_SECS,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source (`key` includes the prefix).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}"))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let data_dir = match get("DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => app_data_dir()?,
        };
        let mut config = Self::with_data_dir(data_dir);

        if let Some(bucket) = get("BUCKET") {
            config.bucket = bucket;
        }
        if let Some(mb) = parse(&get, "MAX_UPLOAD_MB")? {
            config.max_upload_bytes = positive::<u64>("MAX_UPLOAD_MB", mb)? * 1024 * 1024;
        }
        if let Some(n) = parse(&get, "WORKERS")? {
            config.worker_count = positive("WORKERS", n)?;
        }
        if let Some(n) = parse(&get, "QUEUE_CAPACITY")? {
            config.queue_capacity = positive("QUEUE_CAPACITY", n)?;
        }
        if let Some(n) = parse(&get, "MAX_COLLISION_ATTEMPTS")? {
            config.max_collision_attempts = positive("MAX_COLLISION_ATTEMPTS", n)?;
        }
        if let Some(secs) = parse(&get, "SIGNED_URL_TTL_SECS")? {
            config.signed_url_ttl = Duration::from_secs(positive("SIGNED_URL_TTL_SECS", secs)?);
        }
        if let Some(url) = get("PUBLIC_URL") {
            config.public_base_url = url;
        }
        config.url_secret = get("URL_SECRET");
        if let Some(url) = get("OLLAMA_URL") {
            config.ollama_url = url;
        }
        if let Some(model) = get("OLLAMA_MODEL") {
            config.ollama_model = model;
        }
        if let Some(secs) = parse(&get, "OLLAMA_TIMEOUT_SECS")? {
            config.ollama_timeout_secs = positive("OLLAMA_TIMEOUT_SECS", secs)?;
        }

        Ok(config)
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("archive.db")
    }

    /// Root of the filesystem object store for the configured bucket.
    pub fn objects_dir(&self) -> PathBuf {
        self.data_dir.join("objects").join(&self.bucket)
    }
}

fn parse<T, G>(get: &G, name: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    G: Fn(&str) -> Option<String>,
{
    get(name)
        .map(|raw| {
            raw.parse::<T>().map_err(|_| ConfigError::Invalid {
                key: format!("{ENV_PREFIX}{name}"),
                value: raw,
            })
        })
        .transpose()
}

fn positive<T>(name: &str, value: T) -> Result<T, ConfigError>
where
    T: PartialOrd + Default + ToString,
{
    if value > T::default() {
        Ok(value)
    } else {
        Err(ConfigError::Invalid {
            key: format!("{ENV_PREFIX}{name}"),
            value: value.to_string(),
        })
    }
}
