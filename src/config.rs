//! Configuration loading and validation.
//!
//! Everything environment-derived (the SMTP password) is resolved here,
//! once, at load time. The rest of the program only ever sees this struct.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
pub struct Config {
    /// Booking page to watch.
    pub url: String,

    /// How many days to scan, today included.
    #[serde(default = "default_days_ahead")]
    pub days_ahead: u32,

    /// Fetcher name; the binary `courtwatch-fetcher-{name}` must be on PATH.
    #[serde(default = "default_fetcher")]
    pub fetcher: String,

    #[serde(default)]
    pub store: StoreConfig,

    /// Digest delivery; when absent, new slots are only printed.
    pub email: Option<EmailConfig>,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub markers: MarkerConfig,
}

fn default_days_ahead() -> u32 {
    7
}

fn default_fetcher() -> String {
    "chrome".to_string()
}

/// Where the seen-slot set is persisted.
#[derive(Debug, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StoreConfig {
    S3(S3Config),
    Local {
        /// Path of the JSON file; defaults under the platform data dir.
        #[serde(default)]
        path: Option<PathBuf>,
    },
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Local { path: None }
    }
}

#[derive(Debug, Deserialize)]
pub struct S3Config {
    pub bucket: String,

    #[serde(default = "default_object_key")]
    pub object_key: String,

    #[serde(default = "default_region")]
    pub region: String,

    /// Custom endpoint for S3-compatible services (MinIO etc.).
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

fn default_object_key() -> String {
    "seen_slots.json".to_string()
}

fn default_region() -> String {
    "eu-north-1".to_string()
}

#[derive(Debug, Deserialize)]
pub struct EmailConfig {
    /// Sender address, also used as the SMTP username.
    pub address: String,

    /// Where the digest goes.
    pub recipient: String,

    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,

    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    /// Resolved from COURTWATCH_SMTP_PASSWORD at load time.
    #[serde(skip)]
    pub password: String,
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

/// Canonical time labels per schedule kind. The remote site's opening
/// hours are domain knowledge the extractor is configured with, not
/// something discovered from the page.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_weekday_times")]
    pub weekday_times: Vec<String>,

    #[serde(default = "default_weekend_times")]
    pub weekend_times: Vec<String>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        ScheduleConfig {
            weekday_times: default_weekday_times(),
            weekend_times: default_weekend_times(),
        }
    }
}

/// "16:00", "16:30", ... up to and including "{end}:00".
fn half_hour_labels(start: u32, end: u32) -> Vec<String> {
    let mut labels = Vec::new();
    for hour in start..end {
        labels.push(format!("{hour:02}:00"));
        labels.push(format!("{hour:02}:30"));
    }
    labels.push(format!("{end:02}:00"));
    labels
}

fn default_weekday_times() -> Vec<String> {
    half_hour_labels(16, 19)
}

fn default_weekend_times() -> Vec<String> {
    half_hour_labels(10, 19)
}

/// Class-attribute marker tokens driving the availability heuristic.
/// Matched case-insensitively as substrings. The defaults carry the
/// Finnish vocabulary of the watched site alongside the English ones.
#[derive(Debug, Clone, Deserialize)]
pub struct MarkerConfig {
    #[serde(default = "default_available_markers")]
    pub available: Vec<String>,

    #[serde(default = "default_booked_markers")]
    pub booked: Vec<String>,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        MarkerConfig {
            available: default_available_markers(),
            booked: default_booked_markers(),
        }
    }
}

fn default_available_markers() -> Vec<String> {
    ["available", "free", "open", "vapaana"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_booked_markers() -> Vec<String> {
    ["booked", "occupied", "varattu", "disabled"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Get the config directory path (~/.config/courtwatch)
pub fn config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .context("Could not determine config directory")?
        .join("courtwatch");
    Ok(config_dir)
}

/// Get the config file path (~/.config/courtwatch/config.toml)
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Default location of the local seen-slot file
/// (~/.local/share/courtwatch/seen_slots.json on Linux).
pub fn default_local_store_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .context("Could not determine data directory")?
        .join("courtwatch");
    Ok(data_dir.join("seen_slots.json"))
}

/// Load config from ~/.config/courtwatch/config.toml
pub fn load_config() -> Result<Config> {
    load_config_from(&config_path()?)
}

pub fn load_config_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        anyhow::bail!(
            "Config file not found at {}\n\n\
            Create it with at least the page to watch:\n\n\
            url = \"https://example-booking-site.example/\"\n\n\
            [store]\n\
            backend = \"local\"\n",
            path.display()
        );
    }

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config at {}", path.display()))?;
    let mut config: Config = toml::from_str(&raw)
        .with_context(|| format!("Failed to parse config at {}", path.display()))?;

    // The SMTP password never lives in the config file.
    if let Some(email) = &mut config.email {
        email.password = std::env::var("COURTWATCH_SMTP_PASSWORD").context(
            "COURTWATCH_SMTP_PASSWORD must be set when an [email] section is configured",
        )?;
    }

    config.validate()?;
    Ok(config)
}

impl Config {
    fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            anyhow::bail!("url must not be empty");
        }
        if self.days_ahead == 0 {
            anyhow::bail!("days_ahead must be at least 1");
        }
        if let StoreConfig::S3(s3) = &self.store {
            if s3.bucket.trim().is_empty() {
                anyhow::bail!("store.bucket must not be empty");
            }
        }
        if let Some(email) = &self.email {
            if email.address.trim().is_empty() || email.recipient.trim().is_empty() {
                anyhow::bail!("email.address and email.recipient must not be empty");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config: Config = toml::from_str(r#"url = "https://example.test/""#).unwrap();

        assert_eq!(config.days_ahead, 7);
        assert_eq!(config.fetcher, "chrome");
        assert!(matches!(config.store, StoreConfig::Local { path: None }));
        assert!(config.email.is_none());
    }

    #[test]
    fn test_default_schedule_labels() {
        let schedule = ScheduleConfig::default();

        assert_eq!(schedule.weekday_times.len(), 7);
        assert_eq!(schedule.weekday_times.first().unwrap(), "16:00");
        assert_eq!(schedule.weekday_times.last().unwrap(), "19:00");

        assert_eq!(schedule.weekend_times.len(), 19);
        assert_eq!(schedule.weekend_times.first().unwrap(), "10:00");
        assert_eq!(schedule.weekend_times.last().unwrap(), "19:00");
    }

    #[test]
    fn test_default_markers_include_finnish_tokens() {
        let markers = MarkerConfig::default();

        assert!(markers.available.contains(&"vapaana".to_string()));
        assert!(markers.booked.contains(&"varattu".to_string()));
    }

    #[test]
    fn test_s3_store_config_parses() {
        let config: Config = toml::from_str(
            r#"
            url = "https://example.test/"

            [store]
            backend = "s3"
            bucket = "tennis-slots-bucket"
            "#,
        )
        .unwrap();

        match config.store {
            StoreConfig::S3(s3) => {
                assert_eq!(s3.bucket, "tennis-slots-bucket");
                assert_eq!(s3.object_key, "seen_slots.json");
                assert_eq!(s3.region, "eu-north-1");
                assert!(s3.endpoint_url.is_none());
            }
            StoreConfig::Local { .. } => panic!("expected s3 backend"),
        }
    }

    #[test]
    fn test_zero_days_ahead_rejected() {
        let config: Config = toml::from_str(
            r#"
            url = "https://example.test/"
            days_ahead = 0
            "#,
        )
        .unwrap();

        assert!(config.validate().is_err());
    }
}
