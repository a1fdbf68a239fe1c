//! Engine configuration and application-level constants.

use serde::Deserialize;

use crate::error::{Result, SchedulingError};
use crate::models::FixedResource;

pub const APP_NAME: &str = "slotgrid";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Granularity of the calendar grid.
pub const SLOT_DURATION_MINUTES: i64 = 5;

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "slotgrid=info,warn"
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub slot_duration_minutes: i64,
    /// Non-human resources appended after the practitioner columns.
    pub fixed_resources: Vec<FixedResource>,
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            slot_duration_minutes: SLOT_DURATION_MINUTES,
            fixed_resources: vec![FixedResource::Ekg, FixedResource::Labor],
            log_filter: default_log_filter().to_string(),
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from JSON; missing fields take their defaults.
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: EngineConfig =
            serde_json::from_str(raw).map_err(|e| SchedulingError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the grid cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.slot_duration_minutes <= 0 {
            return Err(SchedulingError::Config(
                "Slot duration must be positive".to_string(),
            ));
        }
        if 60 % self.slot_duration_minutes != 0 {
            return Err(SchedulingError::Config(format!(
                "Slot duration {} does not divide an hour",
                self.slot_duration_minutes
            )));
        }
        Ok(())
    }
}
