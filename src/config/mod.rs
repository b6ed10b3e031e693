use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::admission::RateLimitConfig;
use crate::advisory::AdvisoryConfig;

const MAX_WINDOW_SECS: u64 = 86_400;
const MAX_CACHE_TTL_SECS: u64 = 7 * 86_400;
const MAX_TIMEOUT_MS: u64 = 300_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
    #[error("{key} must be greater than zero")]
    Zero { key: &'static str },
    #[error("{key} must not exceed {max}")]
    TooLarge { key: &'static str, max: u64 },
    #[error("RATE_LIMIT_BURST ({burst}) must not be lower than RATE_LIMIT_REQUESTS ({requests})")]
    BurstBelowSteady { burst: u32, requests: u32 },
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub rate_limit_requests: u32,
    pub rate_limit_burst: u32,
    pub rate_limit_window_secs: u64,
    pub rate_limit_cleanup_secs: u64,
    pub advice_cache_ttl_secs: u64,
    pub advice_cache_cleanup_secs: u64,
    pub advice_timeout_ms: u64,
    pub advice_max_concurrent: usize,
    pub gemini_api_key: String,
    pub gemini_model_id: String,
    pub gemini_api_base: String,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 从任意键值来源构建配置，未设置的可选项使用默认值
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Config {
            server_host: lookup("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            server_port: parse_or(&lookup, "SERVER_PORT", 8080)?,
            rate_limit_requests: parse_or(&lookup, "RATE_LIMIT_REQUESTS", 100)?,
            rate_limit_burst: parse_or(&lookup, "RATE_LIMIT_BURST", 120)?,
            rate_limit_window_secs: parse_or(&lookup, "RATE_LIMIT_WINDOW", 60)?,
            rate_limit_cleanup_secs: parse_or(&lookup, "RATE_LIMIT_CLEANUP_INTERVAL", 10)?,
            advice_cache_ttl_secs: parse_or(&lookup, "ADVICE_CACHE_TTL", 300)?,
            advice_cache_cleanup_secs: parse_or(&lookup, "ADVICE_CACHE_CLEANUP_INTERVAL", 60)?,
            advice_timeout_ms: parse_or(&lookup, "ADVICE_TIMEOUT_MS", 4000)?,
            advice_max_concurrent: parse_or(&lookup, "ADVICE_MAX_CONCURRENT", 10)?,
            gemini_api_key: lookup("GEMINI_API_KEY")
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing("GEMINI_API_KEY"))?,
            gemini_model_id: lookup("GEMINI_MODEL_ID").unwrap_or_else(|| "gemini-1.5-flash".into()),
            gemini_api_base: lookup("GEMINI_API_BASE")
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com".into()),
            max_upload_bytes: parse_or(&lookup, "MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let non_zero = [
            ("RATE_LIMIT_REQUESTS", self.rate_limit_requests as u64),
            ("RATE_LIMIT_WINDOW", self.rate_limit_window_secs),
            ("RATE_LIMIT_CLEANUP_INTERVAL", self.rate_limit_cleanup_secs),
            ("ADVICE_CACHE_TTL", self.advice_cache_ttl_secs),
            ("ADVICE_CACHE_CLEANUP_INTERVAL", self.advice_cache_cleanup_secs),
            ("ADVICE_TIMEOUT_MS", self.advice_timeout_ms),
            ("ADVICE_MAX_CONCURRENT", self.advice_max_concurrent as u64),
            ("MAX_UPLOAD_BYTES", self.max_upload_bytes as u64),
        ];
        if let Some(&(key, _)) = non_zero.iter().find(|(_, v)| *v == 0) {
            return Err(ConfigError::Zero { key });
        }

        let bounded = [
            ("RATE_LIMIT_WINDOW", self.rate_limit_window_secs, MAX_WINDOW_SECS),
            ("RATE_LIMIT_CLEANUP_INTERVAL", self.rate_limit_cleanup_secs, MAX_WINDOW_SECS),
            ("ADVICE_CACHE_TTL", self.advice_cache_ttl_secs, MAX_CACHE_TTL_SECS),
            ("ADVICE_CACHE_CLEANUP_INTERVAL", self.advice_cache_cleanup_secs, MAX_WINDOW_SECS),
            ("ADVICE_TIMEOUT_MS", self.advice_timeout_ms, MAX_TIMEOUT_MS),
        ];
        if let Some(&(key, _, max)) = bounded.iter().find(|(_, v, max)| v > max) {
            return Err(ConfigError::TooLarge { key, max });
        }

        if self.rate_limit_burst < self.rate_limit_requests {
            return Err(ConfigError::BurstBelowSteady {
                burst: self.rate_limit_burst,
                requests: self.rate_limit_requests,
            });
        }

        if !self.gemini_model_id.starts_with("gemini-") {
            return Err(ConfigError::Invalid {
                key: "GEMINI_MODEL_ID",
                value: self.gemini_model_id.clone(),
            });
        }

        Ok(())
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig {
            requests_per_window: self.rate_limit_requests,
            burst_limit: self.rate_limit_burst,
            window_size: self.rate_limit_window(),
            cleanup_interval: Duration::from_secs(self.rate_limit_cleanup_secs),
        }
    }

    pub fn advisory(&self) -> AdvisoryConfig {
        AdvisoryConfig {
            cache_ttl: Duration::from_secs(self.advice_cache_ttl_secs),
            cleanup_interval: Duration::from_secs(self.advice_cache_cleanup_secs),
            generator_timeout: Duration::from_millis(self.advice_timeout_ms),
            max_concurrent_generations: self.advice_max_concurrent,
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}
