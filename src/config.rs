// src/config.rs
use crate::errors::StyleSenseError;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// The model-service credential. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Placeholder values the front-end build tooling tends to inject when
    /// the variable was never set.
    const PLACEHOLDERS: [&'static str; 2] = ["undefined", "null"];

    pub fn resolve(raw: Option<String>) -> Option<Self> {
        let raw = raw?;
        let trimmed = raw.trim();
        if trimmed.is_empty()
            || Self::PLACEHOLDERS
                .iter()
                .any(|p| trimmed.eq_ignore_ascii_case(p))
        {
            return None;
        }
        Some(Self(trimmed.to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Service configuration loaded from environment variables.
///
/// | Env Var                | Default                                     |
/// |------------------------|---------------------------------------------|
/// | `GEMINI_API_KEY`       | falls back to `API_KEY`, otherwise missing  |
/// | `GEMINI_BASE_URL`      | `https://generativelanguage.googleapis.com` |
/// | `TEXT_MODEL`           | `gemini-2.5-flash`                          |
/// | `IMAGE_MODEL`          | `gemini-2.5-flash-image`                    |
/// | `REDIS_URL`            | unset, in-memory store                      |
/// | `HOST`                 | `0.0.0.0`                                   |
/// | `PORT`                 | `8000`                                      |
/// | `STATIC_DIR`           | `./static`                                  |
/// | `RETRY_MAX_ATTEMPTS`   | `3`                                         |
/// | `RETRY_BASE_DELAY_MS`  | `2000`                                      |
/// | `IMAGE_PACING_MS`      | `1500`                                      |
/// | `REQUEST_TIMEOUT_SECS` | `90`                                        |
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_key: Option<ApiKey>,
    pub base_url: String,
    pub text_model: String,
    pub image_model: String,
    pub redis_url: Option<String>,
    pub host: String,
    pub port: u16,
    pub static_dir: PathBuf,
    pub retry_max_attempts: u32,
    pub retry_base_delay: Duration,
    pub image_pacing: Duration,
    pub request_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, StyleSenseError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, StyleSenseError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = ApiKey::resolve(lookup("GEMINI_API_KEY"))
            .or_else(|| ApiKey::resolve(lookup("API_KEY")));

        let string_or = |name: &str, default: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Ok(Self {
            api_key,
            base_url: string_or("GEMINI_BASE_URL", "https://generativelanguage.googleapis.com"),
            text_model: string_or("TEXT_MODEL", "gemini-2.5-flash"),
            image_model: string_or("IMAGE_MODEL", "gemini-2.5-flash-image"),
            redis_url: lookup("REDIS_URL").filter(|v| !v.trim().is_empty()),
            host: string_or("HOST", "0.0.0.0"),
            port: parse_or(&lookup, "PORT", 8000)?,
            static_dir: PathBuf::from(string_or("STATIC_DIR", "./static")),
            retry_max_attempts: parse_or(&lookup, "RETRY_MAX_ATTEMPTS", 3)?,
            retry_base_delay: Duration::from_millis(parse_or(&lookup, "RETRY_BASE_DELAY_MS", 2000)?),
            image_pacing: Duration::from_millis(parse_or(&lookup, "IMAGE_PACING_MS", 1500)?),
            request_timeout: Duration::from_secs(parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 90)?),
        })
    }
}

fn parse_or<T, F>(lookup: &F, name: &str, default: T) -> Result<T, StyleSenseError>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) if !raw.trim().is_empty() => raw.trim().parse().map_err(|e| {
            StyleSenseError::Configuration(format!("{} must be a valid number: {}", name, e))
        }),
        _ => Ok(default),
    }
}
