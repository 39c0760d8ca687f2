use serde::{Deserialize, Serialize};
use chrono::NaiveDate;
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub scheduler: SchedulerConfig,
    /// Overrides "today" for replaying a missed processing day.
    pub processing_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Days before the actionable date after which cancellation is deferred.
    pub minimum_cancellation_notice_days: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be a non-negative integer, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },

    #[error("{name} must be a YYYY-MM-DD date, got {value:?}")]
    InvalidDate { name: &'static str, value: String },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = SchedulerConfig::default();

        Ok(Config {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "memory://".to_string()),

            scheduler: SchedulerConfig {
                minimum_cancellation_notice_days: match env::var("MINIMUM_CANCELLATION_NOTICE_DAYS") {
                    Ok(value) => value.trim().parse().map_err(|_| ConfigError::InvalidNumber {
                        name: "MINIMUM_CANCELLATION_NOTICE_DAYS",
                        value,
                    })?,
                    Err(_) => defaults.minimum_cancellation_notice_days,
                },
            },

            processing_date: match env::var("PROCESSING_DATE") {
                Ok(value) => Some(
                    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
                        .map_err(|_| ConfigError::InvalidDate { name: "PROCESSING_DATE", value })?,
                ),
                Err(_) => None,
            },
        })
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            minimum_cancellation_notice_days: 1,
        }
    }
}
