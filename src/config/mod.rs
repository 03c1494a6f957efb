//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

mod cli;

pub use cli::{CliArgs, Command, Overrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "ipsum";
const DEFAULT_POSTS_BASE_URL: &str = "https://jsonplaceholder.typicode.com";
const DEFAULT_CATALOG_BASE_URL: &str = "https://swapi.dev/api/people/";
const DEFAULT_STALE_TIME_MS: u64 = 0;
const DEFAULT_GC_TIME_MS: u64 = 5 * 60 * 1000;
const DEFAULT_RETRY: u32 = 3;
const DEFAULT_RETRY_DELAY_MS: u64 = 1000;
const MAX_RETRY: u32 = 10;

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api: ApiSettings,
    pub cache: CacheSettings,
    pub logging: LoggingSettings,
    pub devtools: DevtoolsSettings,
    pub app: AppSettings,
}

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub posts_base_url: Url,
    pub catalog_base_url: Url,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub stale_time: Duration,
    pub gc_time: Duration,
    pub retry: u32,
    pub retry_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone, Copy)]
pub struct DevtoolsSettings {
    pub initial_open: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct AppSettings {
    /// Mount the people list next to the posts browser.
    pub show_people: bool,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("IPSUM").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&cli.overrides);

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    api: RawApiSettings,
    cache: RawCacheSettings,
    logging: RawLoggingSettings,
    devtools: RawDevtoolsSettings,
    app: RawAppSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(url) = overrides.posts_base_url.as_ref() {
            self.api.posts_base_url = Some(url.clone());
        }
        if let Some(url) = overrides.catalog_base_url.as_ref() {
            self.api.catalog_base_url = Some(url.clone());
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(ms) = overrides.cache_stale_time_ms {
            self.cache.stale_time_ms = Some(ms);
        }
        if let Some(retry) = overrides.cache_retry {
            self.cache.retry = Some(retry);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        Ok(Self {
            api: build_api_settings(raw.api)?,
            cache: build_cache_settings(raw.cache)?,
            logging: build_logging_settings(raw.logging)?,
            devtools: DevtoolsSettings {
                initial_open: raw.devtools.initial_open.unwrap_or(false),
            },
            app: AppSettings {
                show_people: raw.app.show_people.unwrap_or(false),
            },
        })
    }
}

fn build_api_settings(api: RawApiSettings) -> Result<ApiSettings, LoadError> {
    let posts_base_url = parse_url(
        api.posts_base_url.as_deref().unwrap_or(DEFAULT_POSTS_BASE_URL),
        "api.posts_base_url",
    )?;
    let catalog_base_url = parse_url(
        api.catalog_base_url
            .as_deref()
            .unwrap_or(DEFAULT_CATALOG_BASE_URL),
        "api.catalog_base_url",
    )?;
    Ok(ApiSettings {
        posts_base_url,
        catalog_base_url,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let retry = cache.retry.unwrap_or(DEFAULT_RETRY);
    if retry > MAX_RETRY {
        return Err(LoadError::invalid(
            "cache.retry",
            format!("must not exceed {MAX_RETRY}"),
        ));
    }
    let gc_time_ms = cache.gc_time_ms.unwrap_or(DEFAULT_GC_TIME_MS);
    if gc_time_ms == 0 {
        return Err(LoadError::invalid(
            "cache.gc_time_ms",
            "must be greater than zero",
        ));
    }
    Ok(CacheSettings {
        stale_time: Duration::from_millis(cache.stale_time_ms.unwrap_or(DEFAULT_STALE_TIME_MS)),
        gc_time: Duration::from_millis(gc_time_ms),
        retry,
        retry_delay: Duration::from_millis(
            cache.retry_delay_ms.unwrap_or(DEFAULT_RETRY_DELAY_MS),
        ),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn parse_url(value: &str, key: &'static str) -> Result<Url, LoadError> {
    let url = Url::parse(value.trim())
        .map_err(|err| LoadError::invalid(key, format!("invalid URL `{value}`: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(LoadError::invalid(
            key,
            format!("unsupported scheme `{}`", url.scheme()),
        ));
    }
    Ok(url)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawApiSettings {
    posts_base_url: Option<String>,
    catalog_base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    stale_time_ms: Option<u64>,
    gc_time_ms: Option<u64>,
    retry: Option<u32>,
    retry_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDevtoolsSettings {
    initial_open: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAppSettings {
    show_people: Option<bool>,
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[cfg(test)]
mod tests;
