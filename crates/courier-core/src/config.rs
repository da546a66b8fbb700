use chrono::FixedOffset;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{CourierError, Result};

pub const DEFAULT_PORT: u16 = 10000;
pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_UPLOAD_DIR: &str = "/tmp/uploads";
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024; // 50 MB per payload
pub const TICK_INTERVAL_SECS: u64 = 60;
pub const UTC_OFFSET_MINUTES: i32 = 9 * 60; // Asia/Tokyo, no DST
pub const SSH_PORT: u16 = 22;
pub const CONNECT_TIMEOUT_SECS: u64 = 30;
pub const RECENT_JOBS_LIMIT: usize = 20;

/// Top-level config (courier.toml + COURIER_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CourierConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Where uploaded payloads are written before delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_upload_dir")]
    pub upload_dir: String,
    /// Hard cap on a single multipart upload body.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            max_upload_bytes: MAX_UPLOAD_BYTES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between two scans for due jobs.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,
    /// Offset of the civil time zone that `scheduled_at` values are written in.
    /// Override with env var: COURIER_SCHEDULER__UTC_OFFSET_MINUTES=0
    #[serde(default = "default_utc_offset")]
    pub utc_offset_minutes: i32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: TICK_INTERVAL_SECS,
            utc_offset_minutes: UTC_OFFSET_MINUTES,
        }
    }
}

impl SchedulerConfig {
    /// The fixed civil zone used for every "now" comparison.
    pub fn civil_offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or_else(|| {
            CourierError::Config(format!(
                "utc_offset_minutes out of range: {}",
                self.utc_offset_minutes
            ))
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            port: SSH_PORT,
            connect_timeout_secs: CONNECT_TIMEOUT_SECS,
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_upload_dir() -> String {
    DEFAULT_UPLOAD_DIR.to_string()
}
fn default_max_upload_bytes() -> usize {
    MAX_UPLOAD_BYTES
}
fn default_tick_interval() -> u64 {
    TICK_INTERVAL_SECS
}
fn default_utc_offset() -> i32 {
    UTC_OFFSET_MINUTES
}
fn default_ssh_port() -> u16 {
    SSH_PORT
}
fn default_connect_timeout() -> u64 {
    CONNECT_TIMEOUT_SECS
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.courier/courier.db", home)
}

impl CourierConfig {
    /// Load config from a TOML file with COURIER_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.courier/courier.toml
    ///
    /// A missing file is not an error; every field has a default.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: CourierConfig = Figment::from(Serialized::defaults(CourierConfig::default()))
            .merge(Toml::file(&path))
            .merge(Env::prefixed("COURIER_").split("__"))
            .extract()
            .map_err(|e| CourierError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values the scheduler or the SFTP client cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.scheduler.civil_offset()?;
        if self.scheduler.tick_interval_secs == 0 {
            return Err(CourierError::Config(
                "scheduler.tick_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.transfer.connect_timeout_secs == 0 {
            return Err(CourierError::Config(
                "transfer.connect_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.courier/courier.toml", home)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_a_plain_deployment() {
        let config = CourierConfig::default();
        assert_eq!(config.gateway.port, 10000);
        assert_eq!(config.storage.upload_dir, "/tmp/uploads");
        assert_eq!(config.scheduler.tick_interval_secs, 60);
        assert_eq!(config.transfer.port, 22);
        assert_eq!(config.transfer.connect_timeout_secs, 30);
    }

    #[test]
    fn civil_offset_defaults_to_plus_nine() {
        let offset = SchedulerConfig::default().civil_offset().unwrap();
        assert_eq!(offset.local_minus_utc(), 9 * 3600);
    }

    #[test]
    fn civil_offset_rejects_out_of_range() {
        let config = SchedulerConfig {
            tick_interval_secs: 60,
            utc_offset_minutes: 24 * 60,
        };
        assert!(matches!(config.civil_offset(), Err(CourierError::Config(_))));
    }

    #[test]
    fn load_merges_file_and_env() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "courier.toml",
                r#"
                [gateway]
                port = 8080

                [scheduler]
                utc_offset_minutes = 0
                "#,
            )?;
            jail.set_env("COURIER_TRANSFER__CONNECT_TIMEOUT_SECS", "5");

            let config = CourierConfig::load(Some("courier.toml")).expect("load failed");
            assert_eq!(config.gateway.port, 8080);
            assert_eq!(config.gateway.bind, "0.0.0.0");
            assert_eq!(config.scheduler.utc_offset_minutes, 0);
            assert_eq!(config.transfer.connect_timeout_secs, 5);
            assert_eq!(config.transfer.port, 22);
            Ok(())
        });
    }

    #[test]
    fn load_rejects_zero_tick_interval() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("COURIER_SCHEDULER__TICK_INTERVAL_SECS", "0");
            let err = CourierConfig::load(Some("missing.toml")).unwrap_err();
            assert!(matches!(err, CourierError::Config(ref m) if m.contains("tick_interval_secs")));
            Ok(())
        });
    }

    #[test]
    fn load_rejects_zero_connect_timeout() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "courier.toml",
                r#"
                [transfer]
                connect_timeout_secs = 0
                "#,
            )?;
            let err = CourierConfig::load(Some("courier.toml")).unwrap_err();
            assert!(matches!(err, CourierError::Config(ref m) if m.contains("connect_timeout_secs")));
            Ok(())
        });
    }

    #[test]
    fn default_config_is_valid() {
        assert!(CourierConfig::default().validate().is_ok());
    }

    #[test]
    fn load_without_file_uses_defaults() {
        figment::Jail::expect_with(|_jail| {
            let config = CourierConfig::load(Some("missing.toml")).expect("load failed");
            assert_eq!(config.gateway.port, DEFAULT_PORT);
            assert_eq!(config.storage.max_upload_bytes, MAX_UPLOAD_BYTES);
            Ok(())
        });
    }
}
