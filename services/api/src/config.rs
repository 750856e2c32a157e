//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;
use trip_mate_core::ingestion::{DEFAULT_MAX_IMAGE_BYTES, DEFAULT_MAX_VIDEO_BYTES};
use trip_mate_core::IngestionLimits;

const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_STORAGE_ENDPOINT: &str = "https://storage.googleapis.com";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Connection settings for the S3-compatible object store.
#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub bucket: String,
    pub endpoint: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    /// Prefix that every public asset URL starts with.
    pub public_base_url: String,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub gemini_api_key: String,
    pub gemini_api_base: String,
    pub vision_model: String,
    pub summary_model: String,
    pub storage: StorageConfig,
    pub max_image_bytes: u64,
    pub max_video_bytes: u64,
    pub cors_origin: String,
    pub download_cache_entries: usize,
    pub reaper_interval: Duration,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);

        // --- Server and Database Settings ---
        let bind_address: SocketAddr = vars.parsed("BIND_ADDRESS", "0.0.0.0:3000".parse().ok())?;
        let database_url = vars.required("DATABASE_URL")?;

        let log_level_str = vars.or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- AI Gateway ---
        let gemini_api_key = vars.required("GEMINI_API_KEY")?;
        let gemini_api_base = vars.or("GEMINI_API_BASE", DEFAULT_GEMINI_API_BASE);
        let vision_model = vars.or("VISION_MODEL", DEFAULT_MODEL);
        let summary_model = vars.or("SUMMARY_MODEL", DEFAULT_MODEL);

        // --- Object Storage ---
        let bucket = vars.required("STORAGE_BUCKET")?;
        let endpoint = vars
            .or("STORAGE_ENDPOINT", DEFAULT_STORAGE_ENDPOINT)
            .trim_end_matches('/')
            .to_string();
        let public_base_url = vars
            .get("STORAGE_PUBLIC_BASE_URL")
            .unwrap_or_else(|| format!("{}/{}", endpoint, bucket));
        let storage = StorageConfig {
            region: vars.or("STORAGE_REGION", "auto"),
            access_key: vars.required("STORAGE_ACCESS_KEY")?,
            secret_key: vars.required("STORAGE_SECRET_KEY")?,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            bucket,
            endpoint,
        };

        // --- Limits and Tuning ---
        let max_image_bytes = vars.parsed("MAX_IMAGE_BYTES", Some(DEFAULT_MAX_IMAGE_BYTES))?;
        let max_video_bytes = vars.parsed("MAX_VIDEO_BYTES", Some(DEFAULT_MAX_VIDEO_BYTES))?;
        let cors_origin = vars.or("CORS_ORIGIN", "http://localhost:3000");
        let download_cache_entries = vars.parsed("DOWNLOAD_CACHE_ENTRIES", Some(64usize))?;
        let reaper_secs: u64 = vars.parsed("REAPER_INTERVAL_SECS", Some(300))?;
        if reaper_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "REAPER_INTERVAL_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            gemini_api_key,
            gemini_api_base,
            vision_model,
            summary_model,
            storage,
            max_image_bytes,
            max_video_bytes,
            cors_origin,
            download_cache_entries,
            reaper_interval: Duration::from_secs(reaper_secs),
        })
    }

    pub fn ingestion_limits(&self) -> IngestionLimits {
        IngestionLimits {
            max_image_bytes: self.max_image_bytes,
            max_video_bytes: self.max_video_bytes,
        }
    }
}

struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.get(key)
            .ok_or_else(|| ConfigError::MissingVar(key.to_string()))
    }

    fn parsed<T>(&self, key: &str, default: Option<T>) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
            None => default.ok_or_else(|| ConfigError::MissingVar(key.to_string())),
        }
    }
}
