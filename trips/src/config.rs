use std::path::Path;

use anyhow::{Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Everything that changes how trips get split and labeled. The two thresholds have no defaults;
/// leaving one out is an error at startup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Gaps between consecutive samples longer than this many seconds end a trip
    pub time_threshold: i64,
    /// Trips need strictly more samples than this
    pub min_data_points: usize,
    /// How much of each side of the observed extent counts as border
    #[serde(default = "default_border_fraction")]
    pub border_fraction: f64,
    /// Rows per window when deriving training samples
    #[serde(default = "default_feature_window")]
    pub feature_window: usize,
}

fn default_border_fraction() -> f64 {
    0.04
}

fn default_feature_window() -> usize {
    5
}

impl Config {
    pub fn new(time_threshold: i64, min_data_points: usize) -> Self {
        Self {
            time_threshold,
            min_data_points,
            border_fraction: default_border_fraction(),
            feature_window: default_feature_window(),
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs_err::read(path)?;
        let config: Config = serde_json::from_slice(&bytes)
            .with_context(|| format!("Bad config in {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.time_threshold < 0 {
            bail!("time_threshold can't be negative: {}", self.time_threshold);
        }
        // Larger values overflow chrono
        if self.time_threshold > i64::from(i32::MAX) {
            bail!("time_threshold {} is unreasonably large", self.time_threshold);
        }
        if !(0.0..0.5).contains(&self.border_fraction) {
            bail!(
                "border_fraction must be in [0, 0.5), not {}",
                self.border_fraction
            );
        }
        if self.feature_window < 2 {
            bail!("feature_window must be at least 2, not {}", self.feature_window);
        }
        Ok(())
    }

    pub fn idle_threshold(&self) -> Duration {
        Duration::seconds(self.time_threshold)
    }
}
