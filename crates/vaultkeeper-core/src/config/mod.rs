//! Configuration management

use crate::error::{Result, VaultkeeperError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Analysis tuning
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Inventory slot partition
    #[serde(default)]
    pub inventory: InventoryConfig,

    /// Cleanup execution settings
    #[serde(default)]
    pub execution: ExecutionConfig,
}

/// Analysis thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Orphans look like a bulk deletion when
    /// `range_count < orphaned_count * sequential_range_ratio`.
    /// The default of 0.1 is an uncalibrated heuristic.
    #[serde(default = "default_sequential_ratio")]
    pub sequential_range_ratio: f64,

    /// Maximum rows in top-N forensic tables
    #[serde(default = "default_report_limit")]
    pub report_limit: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sequential_range_ratio: default_sequential_ratio(),
            report_limit: default_report_limit(),
        }
    }
}

fn default_sequential_ratio() -> f64 {
    std::env::var("VAULTKEEPER_SEQUENTIAL_RATIO")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0.1)
}

fn default_report_limit() -> usize {
    20
}

/// Which inventory slot codes live on a character and which belong to
/// placed structures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryConfig {
    #[serde(default = "default_personal_slots")]
    pub personal_slots: Vec<i64>,

    #[serde(default = "default_external_slots")]
    pub external_slots: Vec<i64>,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            personal_slots: default_personal_slots(),
            external_slots: default_external_slots(),
        }
    }
}

fn default_personal_slots() -> Vec<i64> {
    vec![0, 1, 2, 3]
}

fn default_external_slots() -> Vec<i64> {
    (4..=26).collect()
}

/// Cleanup execution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Relative divergence between estimated and real affected rows
    /// above which the outcome is reported as an anomaly
    #[serde(default = "default_anomaly_tolerance")]
    pub anomaly_tolerance: f64,

    /// Run VACUUM after a successful cleanup
    #[serde(default)]
    pub vacuum_after: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            anomaly_tolerance: default_anomaly_tolerance(),
            vacuum_after: false,
        }
    }
}

fn default_anomaly_tolerance() -> f64 {
    std::env::var("VAULTKEEPER_ANOMALY_TOLERANCE")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0.10)
}

impl Config {
    /// Load config from default path
    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_path())
    }

    /// Load config from an explicit path, falling back to defaults when the
    /// file does not exist. Either way the result is validated, so bad
    /// environment overrides are rejected too.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_yaml::from_str(&content)?
        } else {
            Config::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Get default config path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(crate::CONFIG_DIR_NAME)
            .join("config.yml")
    }

    /// Reject settings that would break the slot partition or the heuristics
    pub fn validate(&self) -> Result<()> {
        let ratio = self.analysis.sequential_range_ratio;
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(VaultkeeperError::Config(format!(
                "analysis.sequential_range_ratio must be in (0, 1], got {}",
                ratio
            )));
        }

        let tolerance = self.execution.anomaly_tolerance;
        if !(tolerance.is_finite() && tolerance >= 0.0) {
            return Err(VaultkeeperError::Config(format!(
                "execution.anomaly_tolerance must be a finite non-negative number, got {}",
                tolerance
            )));
        }

        if let Some(code) = self
            .inventory
            .personal_slots
            .iter()
            .find(|code| self.inventory.external_slots.contains(code))
        {
            return Err(VaultkeeperError::Config(format!(
                "inventory slot {} is listed as both personal and external",
                code
            )));
        }

        Ok(())
    }
}
