use log::LevelFilter;
use serde::Deserialize;
use std::io;
use std::path::Path;
use validator::Validate;

pub const DEFAULT_APP_NAME: &str = "DocSpace";
pub const DEFAULT_BASE_URL: &str = "https://docspace.uk";
pub const DEFAULT_DOCUMENT_API_HOST: &str = "document-api.company-information.service.gov.uk";
pub const DEFAULT_SITEMAP_API_URL: &str = "https://companies-api-production-68c2.up.railway.app";

pub struct ConfigLoader {
    config: AppConfig,
}

impl ConfigLoader {
    pub fn load_from_str(contents: &str) -> Result<Self, io::Error> {
        let config: AppConfig = toml::from_str(contents)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        config
            .validate()
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err.to_string()))?;
        Ok(Self { config })
    }

    pub fn from_path(path: &Path) -> Result<Self, io::Error> {
        let contents = std::fs::read_to_string(path)?;
        Self::load_from_str(&contents)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

#[derive(Debug, Default, Clone, Deserialize, Validate)]
pub struct AppConfig {
    #[serde(default)]
    #[validate(nested)]
    pub app: AppSection,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    #[validate(nested)]
    pub site: SiteConfig,
    #[serde(default)]
    #[validate(nested)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    #[validate(nested)]
    pub sitemap: SitemapConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    #[validate(nested)]
    pub directors: DirectorsConfig,
    #[serde(default)]
    pub backend: BackendSection,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AppSection {
    #[serde(default = "default_app_name")]
    #[validate(length(min = 1))]
    pub name: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: default_app_name(),
        }
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,
    #[serde(default)]
    pub echo_stdout: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SiteConfig {
    /// Public origin used for canonical links, Open Graph urls and sitemap `<loc>` entries.
    #[serde(default = "default_base_url")]
    #[validate(url)]
    pub base_url: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProxyConfig {
    #[serde(default = "default_document_api_host")]
    #[validate(length(min = 1))]
    pub document_api_host: String,
    #[serde(default = "default_allow_methods")]
    #[validate(length(min = 1))]
    pub allow_methods: String,
    #[serde(default = "default_allow_headers")]
    #[validate(length(min = 1))]
    pub allow_headers: String,
    #[serde(default)]
    #[validate(range(min = 1))]
    pub timeout_secs: Option<u64>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            document_api_host: default_document_api_host(),
            allow_methods: default_allow_methods(),
            allow_headers: default_allow_headers(),
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SitemapConfig {
    #[serde(default = "default_sitemap_api_url")]
    #[validate(url)]
    pub api_url: String,
    #[serde(default = "default_listing_limit")]
    #[validate(range(min = 1, max = 50000))]
    pub listing_limit: u32,
}

impl Default for SitemapConfig {
    fn default() -> Self {
        Self {
            api_url: default_sitemap_api_url(),
            listing_limit: default_listing_limit(),
        }
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct RoutingConfig {
    #[serde(default)]
    pub clean_urls: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DirectorsConfig {
    #[serde(default = "default_cache_capacity")]
    #[validate(range(min = 1))]
    pub cache_capacity: usize,
    #[serde(default = "default_cache_ttl_secs")]
    #[validate(range(min = 1))]
    pub cache_ttl_secs: u64,
}

impl Default for DirectorsConfig {
    fn default() -> Self {
        Self {
            cache_capacity: default_cache_capacity(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

/// Hosted backend credentials. Both values are blank until a project is configured.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct BackendSection {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub anon_key: String,
}

impl BackendSection {
    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty() && !self.anon_key.trim().is_empty()
    }
}

fn default_app_name() -> String {
    DEFAULT_APP_NAME.to_string()
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_document_api_host() -> String {
    DEFAULT_DOCUMENT_API_HOST.to_string()
}

fn default_allow_methods() -> String {
    "GET, POST, OPTIONS".to_string()
}

fn default_allow_headers() -> String {
    "Content-Type".to_string()
}

fn default_sitemap_api_url() -> String {
    DEFAULT_SITEMAP_API_URL.to_string()
}

fn default_listing_limit() -> u32 {
    1000
}

fn default_cache_capacity() -> usize {
    256
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Off,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Off => "off",
        }
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::Trace,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Off => LevelFilter::Off,
        }
    }
}

impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        match value.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            "off" => Ok(Self::Off),
            other => Err(serde::de::Error::custom(format!(
                "logging level must be trace, debug, info, warn, error, or off (got `{}`)",
                other
            ))),
        }
    }
}
