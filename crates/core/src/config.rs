use crate::error::{PromoError, PromoResult};
use chrono::{Duration, FixedOffset};
use serde::Deserialize;

/// Root application configuration. Loaded from environment variables
/// with the prefix `PROMO_EXPRESS__` and TOML config files.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub promo: PromoConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

/// Promotion lifecycle tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct PromoConfig {
    /// Coupon validity from issuance, in minutes. Independent of the
    /// offer's own end date; redemption requires both windows.
    #[serde(default = "default_validity_minutes")]
    pub validity_minutes: i64,
    /// Prefix for generated coupon codes.
    #[serde(default = "default_code_prefix")]
    pub code_prefix: String,
    /// Regeneration attempts before a duplicate code is treated as a
    /// store fault.
    #[serde(default = "default_max_code_attempts")]
    pub max_code_attempts: u32,
    /// Visits at which a customer counts as "frequent".
    #[serde(default = "default_frequent_visit_threshold")]
    pub frequent_visit_threshold: u32,
    /// Days without a visit at which a customer counts as "inactive".
    #[serde(default = "default_inactive_days_threshold")]
    pub inactive_days_threshold: u32,
    /// Business reporting timezone as minutes east of UTC. The
    /// one-draw-per-day rule keys on calendar dates in this zone.
    #[serde(default = "default_reporting_utc_offset_minutes")]
    pub reporting_utc_offset_minutes: i32,
}

impl PromoConfig {
    pub fn validity(&self) -> Duration {
        Duration::minutes(self.validity_minutes)
    }

    pub fn reporting_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.reporting_utc_offset_minutes * 60)
            .unwrap_or_else(|| FixedOffset::east_opt(0).unwrap())
    }
}

// Default functions
fn default_node_id() -> String {
    "node-01".to_string()
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8080
}
fn default_metrics_port() -> u16 {
    9091
}
fn default_validity_minutes() -> i64 {
    120
}
fn default_code_prefix() -> String {
    "RESTO".to_string()
}
fn default_max_code_attempts() -> u32 {
    16
}
fn default_frequent_visit_threshold() -> u32 {
    10
}
fn default_inactive_days_threshold() -> u32 {
    30
}
fn default_reporting_utc_offset_minutes() -> i32 {
    0
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            port: default_metrics_port(),
        }
    }
}

impl Default for PromoConfig {
    fn default() -> Self {
        Self {
            validity_minutes: default_validity_minutes(),
            code_prefix: default_code_prefix(),
            max_code_attempts: default_max_code_attempts(),
            frequent_visit_threshold: default_frequent_visit_threshold(),
            inactive_days_threshold: default_inactive_days_threshold(),
            reporting_utc_offset_minutes: default_reporting_utc_offset_minutes(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            api: ApiConfig::default(),
            metrics: MetricsConfig::default(),
            promo: PromoConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and optional config file.
    pub fn load() -> PromoResult<Self> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("PROMO_EXPRESS")
                .separator("__")
                .try_parsing(true)
                .list_separator(","),
        );

        let config = builder
            .build()
            .map_err(|e| PromoError::Config(e.to_string()))?;
        config
            .try_deserialize()
            .map_err(|e| PromoError::Config(e.to_string()))
    }
}
