use airbook_core::BookingSettings;
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub kafka: KafkaConfig,
    pub booking: BookingConfig,
    pub worker: WorkerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 { 5 }

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
    pub booking_topic: String,
    pub notifications_topic: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BookingConfig {
    pub hold_ttl_seconds: u64,
    /// 0 means "same as the hold".
    #[serde(default)]
    pub confirmation_ttl_seconds: u64,
    #[serde(default = "default_flights_cache_ttl")]
    pub flights_cache_ttl_seconds: u64,
    #[serde(default)]
    pub purge_cancelled_on_release: bool,
}

fn default_flights_cache_ttl() -> u64 { 60 }

#[derive(Debug, Deserialize, Clone)]
pub struct WorkerConfig {
    pub sweep_interval_seconds: u64,
}

impl BookingConfig {
    pub fn hold_ttl(&self) -> Duration {
        Duration::from_secs(self.hold_ttl_seconds)
    }

    pub fn confirmation_ttl(&self) -> Duration {
        Duration::from_secs(self.confirmation_ttl_seconds)
    }

    pub fn flights_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.flights_cache_ttl_seconds)
    }
}

impl WorkerConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds.max(1))
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local, never checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg.. `AIRBOOK_BOOKING__HOLD_TTL_SECONDS=300`
            .add_source(config::Environment::with_prefix("AIRBOOK").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    /// Fails when the booking window is too long to put an expiry timestamp on.
    pub fn booking_settings(&self) -> Result<BookingSettings, config::ConfigError> {
        let settings = BookingSettings::new(
            self.booking.hold_ttl(),
            self.booking.confirmation_ttl(),
            self.kafka.booking_topic.clone(),
        )
        .with_purge_cancelled_on_release(self.booking.purge_cancelled_on_release);

        let representable = chrono::Duration::from_std(settings.pending_ttl())
            .ok()
            .and_then(|ttl| chrono::Utc::now().checked_add_signed(ttl))
            .is_some();
        if !representable {
            return Err(config::ConfigError::Message(format!(
                "booking window of {:?} is out of range",
                settings.pending_ttl()
            )));
        }

        Ok(match &self.kafka.notifications_topic {
            Some(topic) => settings.with_notifications_topic(topic.clone()),
            None => settings,
        })
    }

    /// Same layering as [`Config::load`], but from an in-memory TOML document. Used in tests.
    pub fn from_toml(source: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}
