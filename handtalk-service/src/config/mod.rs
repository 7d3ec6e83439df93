use secrecy::SecretString;
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_JSONBIN_BASE_URL: &str = "https://api.jsonbin.io/v3/b";
const DEFAULT_CORS_ORIGINS: &str = "https://handtalk-wy4h.onrender.com";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct HandtalkConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub gemini: GeminiSettings,
    pub jsonbin: JsonBinSettings,
    pub http: HttpSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiSettings {
    pub api_key: SecretString,
    /// Model used for image analysis (e.g., gemini-1.5-flash)
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonBinSettings {
    pub api_key: SecretString,
    pub base_url: String,
    pub timeout_secs: u64,
    /// Upper bound on time spent retrying transport failures. 0 disables retries.
    pub retry_max_elapsed_ms: u64,
    pub bins: BinIds,
}

/// Identifiers of the three documents the service reads and writes.
#[derive(Debug, Clone, Deserialize)]
pub struct BinIds {
    pub dictionary: String,
    pub statistics: String,
    pub prompt: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpSettings {
    pub cors_origins: Vec<String>,
    pub max_upload_bytes: usize,
}

impl HandtalkConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        Ok(HandtalkConfig {
            common: common_config,
            gemini: GeminiSettings {
                api_key: SecretString::new(get_env("GEMINI_API_KEY", None)?),
                model: get_env("GEMINI_MODEL", Some(DEFAULT_GEMINI_MODEL))?,
                base_url: get_env("GEMINI_BASE_URL", Some(DEFAULT_GEMINI_BASE_URL))?,
                timeout_secs: get_env_parsed("GEMINI_TIMEOUT_SECS", 60)?,
            },
            jsonbin: JsonBinSettings {
                api_key: SecretString::new(get_env("JSONBIN_API_KEY", None)?),
                base_url: get_env("JSONBIN_BASE_URL", Some(DEFAULT_JSONBIN_BASE_URL))?,
                timeout_secs: get_env_parsed("JSONBIN_TIMEOUT_SECS", 10)?,
                retry_max_elapsed_ms: get_env_parsed("JSONBIN_RETRY_MAX_ELAPSED_MS", 2000)?,
                bins: BinIds {
                    dictionary: get_env("DICTIONARY_BIN_ID", None)?,
                    statistics: get_env("STATS_BIN_ID", None)?,
                    prompt: get_env("PROMPT_BIN_ID", None)?,
                },
            },
            http: HttpSettings {
                cors_origins: parse_origins(&get_env(
                    "CORS_ALLOWED_ORIGINS",
                    Some(DEFAULT_CORS_ORIGINS),
                )?),
                max_upload_bytes: get_env_parsed("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            },
        })
    }
}

impl GeminiSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl JsonBinSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_max_elapsed(&self) -> Duration {
        Duration::from_millis(self.retry_max_elapsed_ms)
    }
}

/// Split a comma separated origin list, dropping blanks.
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.trim_end_matches('/').to_string())
        .collect()
}

/// Read an environment variable. Empty values count as unset.
fn get_env(key: &str, default: Option<&str>) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) if !val.trim().is_empty() => Ok(val),
        _ => match default {
            Some(def) => Ok(def.to_string()),
            None => Err(AppError::ConfigError(anyhow::anyhow!(
                "{} is required but not set",
                key
            ))),
        },
    }
}

fn get_env_parsed<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(val) if !val.trim().is_empty() => val.trim().parse().map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!("{} has an invalid value: {}", key, e))
        }),
        _ => Ok(default),
    }
}
