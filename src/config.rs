//! Configuration file parser for ~/.config/chapterwatch/config.toml.
//!
//! A missing or empty file yields `Config::default()`, which still fails
//! [`Config::validate`] until the catalog and channel settings are filled in.
//! Unknown keys are accepted but logged, since they are usually typos.
use crate::checker::ZeroSubscriberPolicy;
use crate::service::ListingSizes;
use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Environment variable that overrides `notifier_webhook_url`.
pub const WEBHOOK_ENV_VAR: &str = "CHAPTERWATCH_WEBHOOK_URL";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Missing required setting '{0}'")]
    Missing(&'static str),

    #[error("Invalid value for '{key}': {reason}")]
    Invalid { key: &'static str, reason: String },
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// The webhook URL usually embeds a token; the custom Debug impl hides it.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the catalog REST API.
    pub api_base_url: String,

    /// Base URL of the public reader; chapter links are `{base}/chapter/{id}`.
    pub reader_base_url: String,

    /// Channel that receives new-chapter announcements.
    pub update_channel_id: String,

    /// Webhook the notifier POSTs to. Overridden by `CHAPTERWATCH_WEBHOOK_URL`.
    pub notifier_webhook_url: Option<String>,

    /// SQLite file. Defaults to `chapterwatch.db` next to the config file.
    pub database_path: Option<PathBuf>,

    pub check_interval_minutes: u64,
    pub title_delay_secs: u64,
    pub request_timeout_secs: u64,

    pub search_page_size: u32,
    pub watchlist_page_size: u32,
    pub chapter_page_size: u32,
    pub max_chapter_pages: u32,

    pub zero_subscriber_policy: ZeroSubscriberPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: String::new(),
            reader_base_url: String::new(),
            update_channel_id: String::new(),
            notifier_webhook_url: None,
            database_path: None,
            check_interval_minutes: 30,
            title_delay_secs: 3,
            request_timeout_secs: 10,
            search_page_size: 3,
            watchlist_page_size: 5,
            chapter_page_size: 50,
            max_chapter_pages: 10,
            zero_subscriber_policy: ZeroSubscriberPolicy::Hold,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_base_url", &self.api_base_url)
            .field("reader_base_url", &self.reader_base_url)
            .field("update_channel_id", &self.update_channel_id)
            .field(
                "notifier_webhook_url",
                &self.notifier_webhook_url.as_ref().map(|_| "[REDACTED]"),
            )
            .field("database_path", &self.database_path)
            .field("check_interval_minutes", &self.check_interval_minutes)
            .field("title_delay_secs", &self.title_delay_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("search_page_size", &self.search_page_size)
            .field("watchlist_page_size", &self.watchlist_page_size)
            .field("chapter_page_size", &self.chapter_page_size)
            .field("max_chapter_pages", &self.max_chapter_pages)
            .field("zero_subscriber_policy", &self.zero_subscriber_policy)
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 13] = [
        "api_base_url",
        "reader_base_url",
        "update_channel_id",
        "notifier_webhook_url",
        "database_path",
        "check_interval_minutes",
        "title_delay_secs",
        "request_timeout_secs",
        "search_page_size",
        "watchlist_page_size",
        "chapter_page_size",
        "max_chapter_pages",
        "zero_subscriber_policy",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            api_base_url = %config.api_base_url,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Apply environment overrides. A non-empty `CHAPTERWATCH_WEBHOOK_URL`
    /// replaces the file's webhook URL.
    pub fn apply_env(&mut self) {
        self.apply_webhook_override(std::env::var(WEBHOOK_ENV_VAR).ok());
    }

    fn apply_webhook_override(&mut self, value: Option<String>) {
        if let Some(url) = value.filter(|v| !v.trim().is_empty()) {
            tracing::debug!("Using webhook URL from environment");
            self.notifier_webhook_url = Some(url);
        }
    }

    /// Reject settings the service cannot run with.
    ///
    /// The webhook URL is only required when notifications are actually sent,
    /// so it is checked by [`Config::webhook_url`] instead.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_http_url("api_base_url", &self.api_base_url)?;
        require_http_url("reader_base_url", &self.reader_base_url)?;
        if self.update_channel_id.trim().is_empty() {
            return Err(ConfigError::Missing("update_channel_id"));
        }
        if let Some(url) = &self.notifier_webhook_url {
            require_http_url("notifier_webhook_url", url).map_err(|e| match e {
                // Never echo the secret back
                ConfigError::Invalid { key, .. } => ConfigError::Invalid {
                    key,
                    reason: "not an http(s) URL".to_string(),
                },
                other => other,
            })?;
        }

        // title_delay_secs may be zero
        let positive: [(&'static str, u64); 6] = [
            ("check_interval_minutes", self.check_interval_minutes),
            ("request_timeout_secs", self.request_timeout_secs),
            ("search_page_size", u64::from(self.search_page_size)),
            ("watchlist_page_size", u64::from(self.watchlist_page_size)),
            ("chapter_page_size", u64::from(self.chapter_page_size)),
            ("max_chapter_pages", u64::from(self.max_chapter_pages)),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    key,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        Ok(())
    }

    /// The webhook URL, required unless running dry.
    pub fn webhook_url(&self) -> Result<SecretString, ConfigError> {
        self.notifier_webhook_url
            .clone()
            .map(SecretString::from)
            .ok_or(ConfigError::Missing("notifier_webhook_url"))
    }

    /// Database file, relative paths resolved against `config_dir`.
    pub fn database_path(&self, config_dir: &Path) -> PathBuf {
        match &self.database_path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => config_dir.join(path),
            None => config_dir.join("chapterwatch.db"),
        }
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_minutes.saturating_mul(60))
    }

    pub fn title_delay(&self) -> Duration {
        Duration::from_secs(self.title_delay_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Page sizes for [`crate::service::WatchService::new`].
    pub fn listing_sizes(&self) -> ListingSizes {
        ListingSizes {
            search_page_size: self.search_page_size,
            watchlist_page_size: self.watchlist_page_size,
            chapter_page_size: self.chapter_page_size,
            max_chapter_pages: self.max_chapter_pages,
        }
    }
}

fn require_http_url(key: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Missing(key));
    }
    let url = Url::parse(value).map_err(|e| ConfigError::Invalid {
        key,
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid {
            key,
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
