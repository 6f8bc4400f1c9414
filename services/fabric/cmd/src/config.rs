//! Configuration handling for the fabric router.
//!
//! Settings are read from a YAML file, then overridden by environment
//! variables. Command line flags are applied last by the caller.

use anyhow::{Context, Result};
use fabric_routing::{PathOptions, RouterConfig, DEFAULT_FDB_MAX_AGE_SECS, DEFAULT_IDLE_TIMEOUT};
use fabric_wire::DEFAULT_FLOW_PRIORITY;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment override for the base idle timeout
pub const ENV_IDLE_TIMEOUT: &str = "FABRIC_IDLE_TIMEOUT";
/// Environment override for the FDB maximum age, in seconds
pub const ENV_FDB_MAX_AGE_SECS: &str = "FABRIC_FDB_MAX_AGE_SECS";
/// Environment override for the path flow priority
pub const ENV_PRIORITY: &str = "FABRIC_PRIORITY";

/// Fabric router settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterSettings {
    /// Base idle timeout for installed paths (seconds)
    pub idle_timeout: u16,
    /// Hard timeout for installed paths (seconds, 0 = none)
    pub hard_timeout: u16,
    /// Priority for installed paths
    pub priority: u16,
    /// How long a learned host stays valid without being seen
    pub fdb_max_age: Duration,
    /// Operator-pinned paths; shortest-path resolution when absent
    pub static_paths: Option<PathBuf>,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            hard_timeout: 0,
            priority: DEFAULT_FLOW_PRIORITY,
            fdb_max_age: Duration::from_secs(DEFAULT_FDB_MAX_AGE_SECS),
            static_paths: None,
        }
    }
}

/// Root configuration structure (matches the YAML structure)
#[derive(Debug, Deserialize)]
struct RootConfig {
    fabric: Option<FabricConfig>,
}

#[derive(Debug, Deserialize)]
struct FabricConfig {
    /// Kept untyped so malformed values report the offending field
    flow: Option<serde_json::Value>,
    fdb: Option<FdbConfig>,
    static_paths: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct FdbConfig {
    max_age_secs: Option<u64>,
}

impl RouterSettings {
    /// Load settings from file and environment variables
    ///
    /// A missing or unparsable file falls back to defaults. A file that
    /// parses but carries an invalid `flow` section is an error.
    pub fn load_from_file<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let mut settings = Self::default();

        match std::fs::read_to_string(&config_path) {
            Ok(content) => match serde_yaml::from_str::<RootConfig>(&content) {
                Ok(root_config) => {
                    settings.apply_root_config(root_config).with_context(|| {
                        format!("invalid configuration in {:?}", config_path.as_ref())
                    })?;
                    info!("Loaded configuration from {:?}", config_path.as_ref());
                }
                Err(e) => warn!(
                    "Failed to parse config file {:?}, using defaults: {}",
                    config_path.as_ref(),
                    e
                ),
            },
            Err(_) => warn!("Config file {:?} not found, using defaults", config_path.as_ref()),
        }

        settings.apply_environment_overrides();

        info!(
            "Fabric configuration: idle_timeout={}, hard_timeout={}, priority={}, fdb_max_age={:?}",
            settings.idle_timeout, settings.hard_timeout, settings.priority, settings.fdb_max_age
        );

        Ok(settings)
    }

    /// Flow entry policy handed to the router
    pub fn router_config(&self) -> RouterConfig {
        RouterConfig {
            idle_timeout: self.idle_timeout,
            hard_timeout: self.hard_timeout,
            priority: self.priority,
        }
    }

    fn apply_root_config(&mut self, root_config: RootConfig) -> Result<()> {
        let Some(fabric) = root_config.fabric else {
            return Ok(());
        };

        if let Some(mut flow) = fabric.flow {
            // Missing keys keep the current values rather than PathOptions defaults
            if let Some(object) = flow.as_object_mut() {
                object
                    .entry("idle_timeout")
                    .or_insert_with(|| self.idle_timeout.into());
                object
                    .entry("hard_timeout")
                    .or_insert_with(|| self.hard_timeout.into());
                object.entry("priority").or_insert_with(|| self.priority.into());
            }

            let options = PathOptions::try_from(&flow)?;
            self.idle_timeout = options.idle_timeout;
            self.hard_timeout = options.hard_timeout;
            self.priority = options.priority;
        }

        if let Some(max_age_secs) = fabric.fdb.and_then(|fdb| fdb.max_age_secs) {
            self.fdb_max_age = Duration::from_secs(max_age_secs);
        }

        if fabric.static_paths.is_some() {
            self.static_paths = fabric.static_paths;
        }

        Ok(())
    }

    /// Apply environment variable overrides
    fn apply_environment_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_IDLE_TIMEOUT) {
            match value.parse::<u16>() {
                Ok(timeout) => {
                    self.idle_timeout = timeout;
                    info!("Idle timeout overridden by environment: {}", timeout);
                }
                Err(_) => warn!("Ignoring {}={:?}: not a u16", ENV_IDLE_TIMEOUT, value),
            }
        }

        if let Some(value) = lookup(ENV_FDB_MAX_AGE_SECS) {
            match value.parse::<u64>() {
                Ok(secs) => {
                    self.fdb_max_age = Duration::from_secs(secs);
                    info!("FDB max age overridden by environment: {}s", secs);
                }
                Err(_) => warn!("Ignoring {}={:?}: not a number", ENV_FDB_MAX_AGE_SECS, value),
            }
        }

        if let Some(value) = lookup(ENV_PRIORITY) {
            match value.parse::<u16>() {
                Ok(priority) => {
                    self.priority = priority;
                    info!("Priority overridden by environment: {}", priority);
                }
                Err(_) => warn!("Ignoring {}={:?}: not a u16", ENV_PRIORITY, value),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn settings_from_yaml(yaml: &str) -> Result<RouterSettings> {
        let mut settings = RouterSettings::default();
        let root: RootConfig = serde_yaml::from_str(yaml)?;
        settings.apply_root_config(root)?;
        Ok(settings)
    }

    #[test]
    fn test_default_settings() {
        let settings = RouterSettings::default();
        assert_eq!(settings.idle_timeout, 60);
        assert_eq!(settings.hard_timeout, 0);
        assert_eq!(settings.priority, 65535);
        assert_eq!(settings.fdb_max_age, Duration::from_secs(300));
        assert_eq!(settings.static_paths, None);
    }

    #[test]
    fn test_load_from_file() {
        let yaml_content = r#"
fabric:
  flow:
    idle_timeout: 30
    priority: 100
  fdb:
    max_age_secs: 120
  static_paths: /etc/fabric/paths.json
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(yaml_content.as_bytes()).unwrap();

        let settings = RouterSettings::load_from_file(temp_file.path()).unwrap();

        assert_eq!(settings.idle_timeout, 30);
        assert_eq!(settings.hard_timeout, 0);
        assert_eq!(settings.priority, 100);
        assert_eq!(settings.fdb_max_age, Duration::from_secs(120));
        assert_eq!(settings.static_paths, Some(PathBuf::from("/etc/fabric/paths.json")));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = RouterSettings::load_from_file(dir.path().join("absent.yaml")).unwrap();
        assert_eq!(settings.idle_timeout, RouterSettings::default().idle_timeout);
    }

    #[test]
    fn test_flow_section_errors() {
        let wrong_type = settings_from_yaml("fabric:\n  flow:\n    idle_timeout: soon\n");
        let message = format!("{:#}", wrong_type.unwrap_err());
        assert!(message.contains("invalid type for idle_timeout"), "{}", message);

        let too_large = settings_from_yaml("fabric:\n  flow:\n    priority: 70000\n");
        let message = format!("{:#}", too_large.unwrap_err());
        assert!(message.contains("priority out of range"), "{}", message);

        let negative = settings_from_yaml("fabric:\n  flow:\n    hard_timeout: -1\n");
        assert!(negative.is_err());

        let not_mapping = settings_from_yaml("fabric:\n  flow: [1, 2]\n");
        let message = format!("{:#}", not_mapping.unwrap_err());
        assert!(message.contains("expected mapping"), "{}", message);
    }

    #[test]
    fn test_environment_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_IDLE_TIMEOUT, "15"),
            (ENV_FDB_MAX_AGE_SECS, "45"),
            (ENV_PRIORITY, "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut settings = settings_from_yaml("fabric:\n  flow:\n    idle_timeout: 30\n").unwrap();
        settings.apply_overrides(|key| env.get(key).map(|value| value.to_string()));

        assert_eq!(settings.idle_timeout, 15);
        assert_eq!(settings.fdb_max_age, Duration::from_secs(45));
        assert_eq!(settings.priority, DEFAULT_FLOW_PRIORITY);
    }

    #[test]
    fn test_router_config() {
        let settings = RouterSettings {
            idle_timeout: 5,
            hard_timeout: 10,
            priority: 7,
            ..RouterSettings::default()
        };
        assert_eq!(
            settings.router_config(),
            RouterConfig {
                idle_timeout: 5,
                hard_timeout: 10,
                priority: 7
            }
        );
    }
}
