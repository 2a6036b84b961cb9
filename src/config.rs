//! Runtime configuration read from the environment (and `.env` via dotenvy).

use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_BIND: &str = "0.0.0.0:3000";
pub const DEFAULT_DATA_DIR: &str = "domuseye_data";
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;
pub const DEFAULT_LLM_PROVIDER: &str = "openai";
pub const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_IMAGEKIT_UPLOAD_URL: &str = "https://upload.imagekit.io/api/v1/files/upload";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

// Development fallback only; startup warns when it is in use.
const DEV_JWT_SECRET: &str = "domuseye-dev-secret";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Backend name understood by the `llm` crate (`openai`, `ollama`, ...).
    pub provider: String,
    /// Overrides the backend's default endpoint, for OpenAI-compatible hosts.
    pub api_base: Option<String>,
    pub api_key: Option<String>,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct ImageKitConfig {
    pub public_key: Option<String>,
    pub private_key: Option<String>,
    pub url_endpoint: Option<String>,
    pub upload_url: String,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// `RUST_LOG`-style directives.
    pub filter: String,
    pub json: bool,
    /// Daily-rolling log files are written here when set.
    pub directory: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind: SocketAddr,
    pub data_dir: PathBuf,
    pub jwt_secret: String,
    pub token_ttl_secs: u64,
    pub max_upload_bytes: usize,
    pub llm: LlmConfig,
    pub imagekit: ImageKitConfig,
    pub log: LogConfig,
}

impl AppConfig {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            bind: parse_or("DOMUSEYE_BIND", get("DOMUSEYE_BIND"), DEFAULT_BIND.parse().ok())?,
            data_dir: get("DOMUSEYE_DATA_DIR")
                .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string())
                .into(),
            jwt_secret: get("DOMUSEYE_JWT_SECRET").unwrap_or_else(|| DEV_JWT_SECRET.to_string()),
            token_ttl_secs: parse_or(
                "DOMUSEYE_TOKEN_TTL_SECS",
                get("DOMUSEYE_TOKEN_TTL_SECS"),
                Some(DEFAULT_TOKEN_TTL_SECS),
            )?,
            max_upload_bytes: parse_or(
                "DOMUSEYE_MAX_UPLOAD_BYTES",
                get("DOMUSEYE_MAX_UPLOAD_BYTES"),
                Some(DEFAULT_MAX_UPLOAD_BYTES),
            )?,
            llm: LlmConfig {
                provider: get("LLM_PROVIDER").unwrap_or_else(|| DEFAULT_LLM_PROVIDER.to_string()),
                api_base: get("LLM_API_BASE"),
                api_key: get("LLM_API_KEY"),
                model: get("LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            },
            imagekit: ImageKitConfig {
                public_key: get("IMAGEKIT_PUBLIC_KEY"),
                private_key: get("IMAGEKIT_PRIVATE_KEY"),
                url_endpoint: get("IMAGEKIT_URL_ENDPOINT"),
                upload_url: get("IMAGEKIT_UPLOAD_URL")
                    .unwrap_or_else(|| DEFAULT_IMAGEKIT_UPLOAD_URL.to_string()),
            },
            log: LogConfig {
                filter: get("RUST_LOG").unwrap_or_else(|| "domuseye=info,tower=warn".to_string()),
                json: parse_or("DOMUSEYE_LOG_JSON", get("DOMUSEYE_LOG_JSON"), Some(false))?,
                directory: get("DOMUSEYE_LOG_DIR").map(PathBuf::from),
            },
        })
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }
}

fn parse_or<T: std::str::FromStr>(
    key: &'static str,
    raw: Option<String>,
    default: Option<T>,
) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => default.ok_or(ConfigError::Invalid {
            key,
            value: String::new(),
        }),
    }
}
