//! Engine configuration with multi-source merging.
//!
//! Sources, lowest precedence first:
//! 1. Built-in defaults
//! 2. `wardstone.toml` (tracked, project config)
//! 3. `wardstone.local.toml` (gitignored, local overrides)
//! 4. Environment variables (`WARDSTONE_*` prefix)
//!
//! Every section deserializes with `#[serde(default)]`, so a config file
//! only names the values it changes.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use wardstone_types::BusinessHours;

// ============================================================================
// Schema
// ============================================================================

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WardstoneConfig {
    pub cache: CacheConfig,
    pub business_hours: BusinessHoursConfig,
    pub emergency: EmergencyConfig,
    pub review: ReviewConfig,
}

/// Decision cache sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached decisions.
    pub capacity: usize,
    /// Seconds a cached decision may be replayed. Bounds how long an
    /// attribute or clock change can go unobserved.
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            ttl_secs: 30,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// The window `business_hours` time constraints check against.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusinessHoursConfig {
    /// First hour inside the window, UTC, inclusive.
    pub start_hour: u32,
    /// First hour outside the window, UTC, exclusive.
    pub end_hour: u32,
}

impl Default for BusinessHoursConfig {
    fn default() -> Self {
        Self {
            start_hour: 9,
            end_hour: 17,
        }
    }
}

impl BusinessHoursConfig {
    pub fn window(&self) -> BusinessHours {
        BusinessHours::new(self.start_hour, self.end_hour)
    }
}

/// Break-glass grant lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmergencyConfig {
    /// Seconds an emergency grant stays valid. Values above one hour are
    /// clamped when the record is built.
    pub grant_secs: i64,
}

impl Default for EmergencyConfig {
    fn default() -> Self {
        Self { grant_secs: 3600 }
    }
}

/// Windows used by access reviews and automated remediation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// Grants expiring within this many days are flagged.
    pub expiring_within_days: i64,
    /// Grants at least this old with no recorded use are flagged and
    /// revoked by remediation.
    pub unused_after_days: i64,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            expiring_within_days: 30,
            unused_after_days: 90,
        }
    }
}

impl ReviewConfig {
    pub(crate) fn to_lifecycle(&self) -> wardstone_lifecycle::ReviewConfig {
        wardstone_lifecycle::ReviewConfig {
            expiring_within_days: self.expiring_within_days,
            unused_after_days: self.unused_after_days,
        }
    }
}

// ============================================================================
// Loader
// ============================================================================

/// Configuration loader with builder pattern.
pub struct ConfigLoader {
    project_dir: PathBuf,
    env_prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader rooted at the current directory.
    pub fn new() -> Self {
        Self {
            project_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env_prefix: "WARDSTONE".to_string(),
        }
    }

    /// Set the directory searched for config files.
    #[must_use]
    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the environment variable prefix (default: "WARDSTONE").
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Load configuration from all sources with proper precedence.
    pub fn load(self) -> Result<WardstoneConfig> {
        let mut builder = config::Config::builder();

        // 1. Start with built-in defaults
        let defaults = WardstoneConfig::default();
        builder = builder.add_source(config::Config::try_from(&defaults)?);

        // 2. Project config (wardstone.toml)
        let project_config_file = self.project_dir.join("wardstone.toml");
        if project_config_file.exists() {
            builder = builder.add_source(
                config::File::from(project_config_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // 3. Local config (wardstone.local.toml, gitignored)
        let local_config_file = self.project_dir.join("wardstone.local.toml");
        if local_config_file.exists() {
            builder = builder.add_source(
                config::File::from(local_config_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // 4. Environment variables (WARDSTONE_*)
        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .separator("_")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Load configuration or return defaults if loading fails.
    pub fn load_or_default(self) -> WardstoneConfig {
        self.load().unwrap_or_default()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn load_defaults() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let config = ConfigLoader::new()
            .with_project_dir(temp_dir.path())
            .load()
            .expect("Failed to load config");

        assert_eq!(config.cache.capacity, 1024);
        assert_eq!(config.cache.ttl_secs, 30);
        assert_eq!(config.business_hours.start_hour, 9);
        assert_eq!(config.business_hours.end_hour, 17);
        assert_eq!(config.emergency.grant_secs, 3600);
        assert_eq!(config.review.unused_after_days, 90);
    }

    #[test]
    fn load_project_config() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        let config_content = r#"
[cache]
capacity = 64
ttl_secs = 5

[business_hours]
start_hour = 8
end_hour = 20
"#;
        fs::write(project_dir.join("wardstone.toml"), config_content)
            .expect("Failed to write config");

        let config = ConfigLoader::new()
            .with_project_dir(project_dir)
            .load()
            .expect("Failed to load config");

        assert_eq!(config.cache.capacity, 64);
        assert_eq!(config.cache.ttl_secs, 5);
        assert_eq!(config.business_hours.start_hour, 8);
        assert_eq!(config.business_hours.end_hour, 20);
        // Untouched sections keep their defaults
        assert_eq!(config.emergency.grant_secs, 3600);
        assert_eq!(config.review.expiring_within_days, 30);
    }

    #[test]
    fn local_overrides_project() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        fs::write(
            project_dir.join("wardstone.toml"),
            r#"
[cache]
capacity = 64
"#,
        )
        .expect("Failed to write project config");

        fs::write(
            project_dir.join("wardstone.local.toml"),
            r#"
[cache]
capacity = 8
"#,
        )
        .expect("Failed to write local config");

        let config = ConfigLoader::new()
            .with_project_dir(project_dir)
            .load()
            .expect("Failed to load config");

        assert_eq!(config.cache.capacity, 8);
    }

    // Note: Environment variable testing is tricky in unit tests due to how
    // the config crate caches values. Environment variables work as expected
    // in actual usage:
    //
    // WARDSTONE_CACHE_CAPACITY=4096
    // WARDSTONE_BUSINESS_HOURS_START_HOUR=7
    //
    // These will override the corresponding config file values.

    #[test]
    fn sections_convert_to_engine_types() {
        let config = WardstoneConfig::default();
        assert_eq!(config.cache.ttl(), Duration::from_secs(30));

        let window = config.business_hours.window();
        let inside = chrono::DateTime::parse_from_rfc3339("2025-06-02T10:00:00Z")
            .expect("valid timestamp")
            .with_timezone(&chrono::Utc);
        assert!(window.contains(inside));
    }
}
