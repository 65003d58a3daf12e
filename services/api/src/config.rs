//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Which `ObjectStore` implementation backs the service.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "postgres" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!("'{other}' is not one of postgres, memory")),
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    pub store_backend: StoreBackend,
    /// Required when `store_backend` is `Postgres`.
    pub database_url: Option<String>,
    pub data_dir: PathBuf,
    /// On-disk Tantivy index. The index lives in RAM when unset.
    pub index_dir: Option<PathBuf>,
    pub search_limit: usize,
    pub ocr_api_base: String,
    pub ocr_api_key: String,
    pub ocr_model: String,
    pub ocr_prompt: String,
    pub ocr_concurrency: usize,
    pub ocr_timeout: Duration,
    pub ocr_max_retries: usize,
    pub render_width: u16,
    pub pdfium_library_path: Option<PathBuf>,
    pub ingest_timeout: Option<Duration>,
    pub reindex_on_start: bool,
    pub cors_origin: Option<String>,
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
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values count as unset.
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        // --- Server ---
        let bind_address = parse_or(&var, "BIND_ADDRESS", "0.0.0.0:8000".parse::<SocketAddr>())?;

        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Storage ---
        let store_backend = match var("STORE_BACKEND") {
            Some(value) => value
                .parse::<StoreBackend>()
                .map_err(|e| ConfigError::InvalidValue("STORE_BACKEND".to_string(), e))?,
            None => StoreBackend::Postgres,
        };
        let database_url = var("DATABASE_URL");
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::MissingVar("DATABASE_URL".to_string()));
        }

        let data_dir = var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./pdfs"));
        let index_dir = var("INDEX_DIR").map(PathBuf::from);
        let search_limit = parse_or(&var, "SEARCH_LIMIT", Ok::<usize, String>(20))?;
        if search_limit == 0 {
            return Err(ConfigError::InvalidValue(
                "SEARCH_LIMIT".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        // --- OCR Service ---
        let ocr_api_base =
            var("OCR_API_BASE").unwrap_or_else(|| "http://localhost:8000/v1".to_string());
        let ocr_api_key = var("OCR_API_KEY").unwrap_or_else(|| "not-needed".to_string());
        let ocr_model = var("OCR_MODEL").unwrap_or_else(|| "deepseek-ai/DeepSeek-OCR".to_string());
        let ocr_prompt = var("OCR_PROMPT").unwrap_or_else(|| "Free OCR.".to_string());
        let ocr_concurrency = parse_or(&var, "OCR_CONCURRENCY", Ok::<usize, String>(4))?;
        if ocr_concurrency == 0 {
            return Err(ConfigError::InvalidValue(
                "OCR_CONCURRENCY".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let ocr_timeout =
            Duration::from_secs(parse_or(&var, "OCR_TIMEOUT_SECS", Ok::<u64, String>(120))?);
        let ocr_max_retries = parse_or(&var, "OCR_MAX_RETRIES", Ok::<usize, String>(0))?;

        // --- Rendering ---
        let render_width = parse_or(&var, "RENDER_WIDTH", Ok::<u16, String>(1600))?;
        let pdfium_library_path = var("PDFIUM_LIBRARY_PATH").map(PathBuf::from);

        // --- Ingestion ---
        let ingest_timeout = var("INGEST_TIMEOUT_SECS")
            .map(|value| parse_value::<u64>("INGEST_TIMEOUT_SECS", &value))
            .transpose()?
            .map(Duration::from_secs);
        let reindex_on_start = var("REINDEX_ON_START")
            .map(|value| parse_bool("REINDEX_ON_START", &value))
            .transpose()?
            .unwrap_or(false);

        let cors_origin = var("CORS_ORIGIN");

        Ok(Self {
            bind_address,
            log_level,
            store_backend,
            database_url,
            data_dir,
            index_dir,
            search_limit,
            ocr_api_base,
            ocr_api_key,
            ocr_model,
            ocr_prompt,
            ocr_concurrency,
            ocr_timeout,
            ocr_max_retries,
            render_width,
            pdfium_library_path,
            ingest_timeout,
            reindex_on_start,
            cors_origin,
        })
    }
}

/// Parses `key` if set, otherwise returns the default.
fn parse_or<T, E>(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Result<T, E>,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    E: std::fmt::Display,
{
    match var(key) {
        Some(value) => parse_value(key, &value),
        None => default.map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
    }
}

fn parse_value<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(key.to_string(), format!("'{value}': {e}")))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue(
            key.to_string(),
            format!("'{other}' is not a boolean"),
        )),
    }
}
