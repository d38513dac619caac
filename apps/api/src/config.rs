use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use url::Url;

/// Application configuration loaded from environment variables.
/// Startup fails if a required variable is missing or a value does not parse.
#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_base_url: String,
    pub cost_per_input_token: f64,
    pub cost_per_output_token: f64,
    pub backend_timeout_secs: u64,
    /// Backend attempts per stage, including the first. At least 1.
    pub backend_max_attempts: u32,
    pub use_redis: bool,
    pub redis_url: String,
    pub cache_ttl_secs: u64,
    pub allowed_origins: Vec<String>,
    /// Cache clearing is disabled while unset.
    pub admin_token: Option<String>,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup (the process environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let redis_url = match var("REDIS_URL") {
            Some(url) => url,
            None => redis_url_from_parts(
                &var("REDIS_HOST").unwrap_or_else(|| "localhost".to_string()),
                parse_or(var("REDIS_PORT"), "REDIS_PORT", 6379)?,
                var("REDIS_PASSWORD").as_deref(),
                parse_or(var("REDIS_DB"), "REDIS_DB", 0)?,
            )?,
        };

        let backend_max_attempts = parse_or(var("BACKEND_MAX_ATTEMPTS"), "BACKEND_MAX_ATTEMPTS", 3)?;
        if backend_max_attempts == 0 {
            return Err(anyhow!("Environment variable 'BACKEND_MAX_ATTEMPTS' must be at least 1"));
        }

        Ok(Config {
            openai_api_key: var("OPENAI_API_KEY")
                .context("Required environment variable 'OPENAI_API_KEY' is not set")?,
            openai_model: var("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o-2024-08-06".to_string()),
            openai_base_url: var("OPENAI_BASE_URL")
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            cost_per_input_token: parse_or(var("COST_PER_INPUT_TOKEN"), "COST_PER_INPUT_TOKEN", 0.00001)?,
            cost_per_output_token: parse_or(var("COST_PER_OUTPUT_TOKEN"), "COST_PER_OUTPUT_TOKEN", 0.00003)?,
            backend_timeout_secs: parse_or(var("BACKEND_TIMEOUT_SECS"), "BACKEND_TIMEOUT_SECS", 60)?,
            backend_max_attempts,
            use_redis: var("USE_REDIS").map(|v| parse_flag(&v)).unwrap_or(false),
            redis_url,
            cache_ttl_secs: parse_or(var("CACHE_TTL"), "CACHE_TTL", 86400)?,
            allowed_origins: parse_origins(
                &var("ALLOWED_ORIGINS").unwrap_or_else(|| "http://localhost:3000".to_string()),
            ),
            admin_token: var("ADMIN_TOKEN"),
            port: parse_or(var("PORT"), "PORT", 8000)?,
            rust_log: var("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }
}

fn parse_or<T>(raw: Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(v) => v
            .trim()
            .parse()
            .with_context(|| format!("Environment variable '{key}' has an invalid value '{v}'")),
        None => Ok(default),
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}

/// `redis://[:password@]host:port/db`, with the password percent-encoded.
fn redis_url_from_parts(host: &str, port: u16, password: Option<&str>, db: u32) -> Result<String> {
    let mut url = Url::parse(&format!("redis://{host}:{port}/{db}"))
        .with_context(|| format!("REDIS_HOST '{host}' does not form a valid URL"))?;
    if let Some(password) = password {
        url.set_password(Some(password))
            .map_err(|_| anyhow!("REDIS_PASSWORD cannot be set on '{url}'"))?;
    }
    Ok(url.to_string())
}
