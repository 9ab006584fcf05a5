use anyhow::{Context as _, Result};
use std::{str::FromStr, time::Duration};

use crate::ui::{interval::IntervalBounds, reporter::ReporterSettings};

#[derive(Clone)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub guild_id: Option<u64>, // development command registration

    // Idle handling
    pub auto_disconnect_timeout: Duration,
    pub idle_check_interval: Duration,

    // Display
    pub progress_bar_length: usize,
    pub min_update_interval: f64,
    pub max_update_interval: f64,
    pub queue_preview_limit: usize,

    // Extraction
    pub max_playlist_size: usize,
    pub extractor_workers: usize,
    pub ytdlp_path: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self::from_lookup(|key| std::env::var(key).ok())?;
        config.validate()?;

        Ok(config)
    }

    /// Builds a configuration from any key lookup, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Ok(Self {
            discord_token: var("DISCORD_TOKEN").context("DISCORD_TOKEN must be set")?,
            guild_id: var("GUILD_ID")
                .map(|id| id.trim().parse())
                .transpose()
                .context("GUILD_ID must be a numeric id")?,

            auto_disconnect_timeout: parse_duration(
                var("AUTO_DISCONNECT_TIMEOUT"),
                "AUTO_DISCONNECT_TIMEOUT",
                defaults.auto_disconnect_timeout,
            )?,
            idle_check_interval: parse_duration(
                var("IDLE_CHECK_INTERVAL"),
                "IDLE_CHECK_INTERVAL",
                defaults.idle_check_interval,
            )?,

            progress_bar_length: parse_or(
                var("PROGRESS_BAR_LENGTH"),
                "PROGRESS_BAR_LENGTH",
                defaults.progress_bar_length,
            )?,
            min_update_interval: parse_or(
                var("MIN_UPDATE_INTERVAL"),
                "MIN_UPDATE_INTERVAL",
                defaults.min_update_interval,
            )?,
            max_update_interval: parse_or(
                var("MAX_UPDATE_INTERVAL"),
                "MAX_UPDATE_INTERVAL",
                defaults.max_update_interval,
            )?,
            queue_preview_limit: parse_or(
                var("QUEUE_PREVIEW_LIMIT"),
                "QUEUE_PREVIEW_LIMIT",
                defaults.queue_preview_limit,
            )?,

            max_playlist_size: parse_or(
                var("MAX_PLAYLIST_SIZE"),
                "MAX_PLAYLIST_SIZE",
                defaults.max_playlist_size,
            )?,
            extractor_workers: parse_or(
                var("EXTRACTOR_WORKERS"),
                "EXTRACTOR_WORKERS",
                defaults.extractor_workers,
            )?,
            ytdlp_path: var("YTDLP_PATH").unwrap_or(defaults.ytdlp_path),
        })
    }

    /// Validates configuration values for correctness.
    pub fn validate(&self) -> Result<()> {
        if self.progress_bar_length == 0 {
            anyhow::bail!("Progress bar length must be greater than 0");
        }

        if !(self.min_update_interval > 0.0) || !self.min_update_interval.is_finite() {
            anyhow::bail!(
                "Min update interval must be a positive number of seconds, got: {}",
                self.min_update_interval
            );
        }

        if !self.max_update_interval.is_finite() || self.max_update_interval < self.min_update_interval {
            anyhow::bail!(
                "Max update interval ({}) must not be below min update interval ({})",
                self.max_update_interval,
                self.min_update_interval
            );
        }

        if self.queue_preview_limit == 0 {
            anyhow::bail!("Queue preview limit must be greater than 0");
        }

        if self.max_playlist_size == 0 {
            anyhow::bail!("Max playlist size must be greater than 0");
        }

        if self.extractor_workers == 0 {
            anyhow::bail!("Extractor workers must be greater than 0");
        }

        if self.auto_disconnect_timeout.is_zero() || self.idle_check_interval.is_zero() {
            anyhow::bail!("Idle timeout and idle check interval must be greater than 0");
        }

        Ok(())
    }

    pub fn reporter_settings(&self) -> ReporterSettings {
        ReporterSettings {
            bar_length: self.progress_bar_length,
            bounds: IntervalBounds {
                min: self.min_update_interval,
                max: self.max_update_interval,
            },
        }
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// The token is never included.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: commands {}\n  \
            Idle: leave after {} alone, checked every {}\n  \
            Display: {} cells, updates every {}-{}s, {} queue entries shown\n  \
            Extraction: {} via {} workers, playlists up to {}",
            self.guild_id
                .map_or("global".to_string(), |id| format!("in guild {}", id)),
            humantime::format_duration(self.auto_disconnect_timeout),
            humantime::format_duration(self.idle_check_interval),
            self.progress_bar_length,
            self.min_update_interval,
            self.max_update_interval,
            self.queue_preview_limit,
            self.ytdlp_path,
            self.extractor_workers,
            self.max_playlist_size,
        )
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("discord_token", &"<redacted>")
            .field("guild_id", &self.guild_id)
            .field("auto_disconnect_timeout", &self.auto_disconnect_timeout)
            .field("idle_check_interval", &self.idle_check_interval)
            .field("progress_bar_length", &self.progress_bar_length)
            .field("min_update_interval", &self.min_update_interval)
            .field("max_update_interval", &self.max_update_interval)
            .field("queue_preview_limit", &self.queue_preview_limit)
            .field("max_playlist_size", &self.max_playlist_size)
            .field("extractor_workers", &self.extractor_workers)
            .field("ytdlp_path", &self.ytdlp_path)
            .finish()
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (no defaults - must be provided)
            discord_token: String::new(),
            guild_id: None,

            auto_disconnect_timeout: Duration::from_secs(30),
            idle_check_interval: Duration::from_secs(10),

            progress_bar_length: 25,
            min_update_interval: 1.0,
            max_update_interval: 15.0,
            queue_preview_limit: 5,

            max_playlist_size: 100,
            extractor_workers: num_cpus::get(),
            ytdlp_path: "yt-dlp".to_string(),
        }
    }
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {}", key, value)),
        None => Ok(default),
    }
}

/// Accepts humantime strings ("30s", "2m") or bare seconds
fn parse_duration(value: Option<String>, key: &str, default: Duration) -> Result<Duration> {
    let Some(value) = value else {
        return Ok(default);
    };
    let value = value.trim();

    if let Ok(secs) = value.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(value)
        .with_context(|| format!("{} has an invalid duration: {}", key, value))
}
