//! Configuration loaded from the environment (and `.env` when present).

use crate::adapters::b2::{B2Config, DEFAULT_API_URL};
use crate::domain::upload::{UploadPolicy, DEFAULT_MAX_BYTES, DEFAULT_MAX_DURATION_SECS};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} env var required")]
    Missing(&'static str),
    #[error("{key} has an invalid value {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub enum StorageBackend {
    /// Objects kept under a local directory
    Fs { root: PathBuf },
    B2(B2Config),
}

#[derive(Clone, Debug)]
pub enum RepositoryBackend {
    Memory,
    Redis { url: String },
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// HTTP server bind address
    pub addr: String,
    /// HTTP server port
    pub port: String,
    /// Uploaded sources and per-short transcode directories
    pub work_dir: PathBuf,
    /// Prepended to proxy links in rewritten manifests; empty keeps them relative
    pub public_base_url: String,
    /// Number of background publish workers
    pub workers: usize,
    pub upload: UploadPolicy,
    pub storage: StorageBackend,
    pub repository: RepositoryBackend,
    /// JSON array of airports loaded at startup
    pub airports_seed: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| var(key).ok_or(ConfigError::Missing(key));

        let storage = match var("STORAGE_BACKEND").as_deref().unwrap_or("fs") {
            "fs" => StorageBackend::Fs {
                root: var("STORAGE_DIR").unwrap_or_else(|| String::from("./storage")).into(),
            },
            "b2" => StorageBackend::B2(B2Config {
                key_id: required("B2_KEY_ID")?,
                application_key: required("B2_APPLICATION_KEY")?,
                bucket_id: required("B2_BUCKET_ID")?,
                bucket_name: required("B2_BUCKET_NAME")?,
                api_url: var("B2_API_URL").unwrap_or_else(|| String::from(DEFAULT_API_URL)),
                download_auth_secs: parse(&lookup, "B2_DOWNLOAD_AUTH_SECS", 3600)?,
            }),
            other => {
                return Err(ConfigError::Invalid {
                    key: "STORAGE_BACKEND",
                    value: other.to_string(),
                })
            }
        };

        let repository = match var("REPOSITORY_BACKEND").as_deref().unwrap_or("memory") {
            "memory" => RepositoryBackend::Memory,
            "redis" => RepositoryBackend::Redis {
                url: var("REDIS_URL").unwrap_or_else(|| String::from("redis://127.0.0.1/")),
            },
            other => {
                return Err(ConfigError::Invalid {
                    key: "REPOSITORY_BACKEND",
                    value: other.to_string(),
                })
            }
        };

        let workers: usize = parse(&lookup, "WORKERS", 2)?;
        if workers == 0 {
            return Err(ConfigError::Invalid {
                key: "WORKERS",
                value: "0".to_string(),
            });
        }

        let max_duration_secs: f64 = parse(&lookup, "MAX_DURATION_SECS", DEFAULT_MAX_DURATION_SECS)?;
        if !max_duration_secs.is_finite() || max_duration_secs <= 0.0 {
            return Err(ConfigError::Invalid {
                key: "MAX_DURATION_SECS",
                value: max_duration_secs.to_string(),
            });
        }

        Ok(Self {
            addr: var("ADDR").unwrap_or_else(|| String::from("127.0.0.1")),
            port: var("PORT").unwrap_or_else(|| String::from("3000")),
            work_dir: var("WORK_DIR").unwrap_or_else(|| String::from("./work")).into(),
            public_base_url: var("PUBLIC_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_default(),
            workers,
            upload: UploadPolicy {
                max_bytes: parse(&lookup, "MAX_UPLOAD_BYTES", DEFAULT_MAX_BYTES)?,
                max_duration_secs,
            },
            storage,
            repository,
            airports_seed: var("AIRPORTS_SEED").map(PathBuf::from),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.addr, self.port)
    }
}

fn parse<T, F>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}
