//! Application configuration.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Durable storage configuration.
    pub storage: StorageConfig,
    /// Escalation thresholds and sweep timing.
    pub escalation: EscalationConfig,
    /// Follow-up chat configuration.
    pub chat: ChatConfig,
    /// Report submission limits.
    pub reports: ReportsConfig,
    /// Service rating limits.
    pub rating: RatingConfig,
    /// Reverse geocoding configuration.
    pub geocoding: GeocodingConfig,
    /// Dashboard configuration.
    pub dashboard: DashboardConfig,
    /// Profile created on first run.
    pub profile: ProfileDefaults,
}

/// Durable storage configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding one JSON document per collection.
    pub data_dir: PathBuf,
    /// Keys of the stored collections.
    pub keys: StorageKeys,
    /// Whether deleting a report also deletes its escalation records.
    pub cascade_escalations: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            keys: StorageKeys::default(),
            cascade_escalations: false,
        }
    }
}

/// Keys under which each collection is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StorageKeys {
    /// Reports collection.
    pub reports: String,
    /// Profile singleton.
    pub profile: String,
    /// Ratings collection.
    pub ratings: String,
    /// Chat messages collection.
    pub chat_messages: String,
    /// Escalation records collection.
    pub escalations: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            reports: "pa_reports_v2".to_string(),
            profile: "pa_profile_v2".to_string(),
            ratings: "pa_ratings_v2".to_string(),
            chat_messages: "pa_chat_messages_v1".to_string(),
            escalations: "pa_escalations_v1".to_string(),
        }
    }
}

/// Escalation thresholds and sweep timing.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EscalationConfig {
    /// Whether the periodic sweep runs at all.
    pub enabled: bool,
    /// Days before a normal-priority report is escalated.
    pub auto_escalate_days: u32,
    /// Days before an urgent report is escalated.
    pub urgent_priority_days: u32,
    /// Low-priority threshold as a multiple of `auto_escalate_days`.
    pub low_priority_multiplier: u32,
    /// Days after which an open report shows a warning.
    pub warning_days: u32,
    /// Age in days used by the store's "needs escalation" statistic.
    pub stats_threshold_days: u32,
    /// Seconds between sweeps.
    pub sweep_interval_secs: u64,
    /// Seconds before the first sweep after startup.
    pub initial_delay_secs: u64,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_escalate_days: 7,
            urgent_priority_days: 3,
            low_priority_multiplier: 2,
            warning_days: 5,
            stats_threshold_days: 7,
            sweep_interval_secs: 3600,
            initial_delay_secs: 5,
        }
    }
}

impl EscalationConfig {
    /// Interval between sweeps.
    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Delay before the first sweep.
    #[must_use]
    pub const fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_secs)
    }
}

/// Follow-up chat configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Whether a canned officer reply follows each citizen message.
    pub auto_reply_enabled: bool,
    /// Milliseconds before the canned officer reply is posted.
    pub auto_reply_delay_ms: u64,
    /// Sender name used for canned officer replies.
    pub officer_name: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            auto_reply_enabled: true,
            auto_reply_delay_ms: 2000,
            officer_name: "Village Officer".to_string(),
        }
    }
}

impl ChatConfig {
    /// Delay before the canned officer reply.
    #[must_use]
    pub const fn auto_reply_delay(&self) -> Duration {
        Duration::from_millis(self.auto_reply_delay_ms)
    }
}

/// Report submission limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportsConfig {
    /// Minimum title length.
    pub title_min: usize,
    /// Maximum title length.
    pub title_max: usize,
    /// Minimum location length.
    pub location_min: usize,
    /// Maximum location length.
    pub location_max: usize,
    /// Minimum description length.
    pub description_min: usize,
    /// Maximum description length.
    pub description_max: usize,
    /// Minimum reporter name length.
    pub name_min: usize,
    /// Maximum reporter name length.
    pub name_max: usize,
    /// Maximum size of a single attachment in bytes.
    pub max_file_size: u64,
    /// Description length shown on report cards.
    pub max_description_preview: usize,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            title_min: 5,
            title_max: 100,
            location_min: 5,
            location_max: 100,
            description_min: 10,
            description_max: 1000,
            name_min: 2,
            name_max: 50,
            max_file_size: 5 * 1024 * 1024,
            max_description_preview: 140,
        }
    }
}

/// Service rating limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RatingConfig {
    /// Lowest accepted score.
    pub min_stars: u8,
    /// Highest accepted score.
    pub max_stars: u8,
    /// Maximum comment length.
    pub max_comment_length: usize,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            min_stars: 1,
            max_stars: 5,
            max_comment_length: 500,
        }
    }
}

/// Reverse geocoding configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeocodingConfig {
    /// Whether reverse geocoding is attempted.
    pub enabled: bool,
    /// Base URL of a Nominatim-compatible service.
    pub base_url: String,
    /// User agent sent with every request.
    pub user_agent: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: format!("civic-desk/{}", env!("CARGO_PKG_VERSION")),
            timeout_secs: 10,
        }
    }
}

/// Dashboard configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Seconds between dashboard refreshes.
    pub refresh_interval_secs: u64,
    /// Maximum entries in the recent activity feed.
    pub max_recent_activities: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 60,
            max_recent_activities: 10,
        }
    }
}

impl DashboardConfig {
    /// Interval between dashboard refreshes.
    #[must_use]
    pub const fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

/// Profile created on first run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProfileDefaults {
    /// Display name.
    pub name: String,
    /// Contact email.
    pub email: String,
    /// Role, `citizen` or `officer`.
    pub role: String,
}

impl Default for ProfileDefaults {
    fn default() -> Self {
        Self {
            name: "Citizen".to_string(),
            email: "citizen@example.com".to_string(),
            role: "citizen".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `CIVIC_ENV`)
    /// 3. Environment variables with `CIVIC_` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let env = std::env::var("CIVIC_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("CIVIC")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("CIVIC")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
