use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::DashboardError;
use crate::loader::TableCache;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Directories searched in order when resolving an input file.
    pub search_dirs: Vec<PathBuf>,
    pub file_prefix: String,
    pub file_extension: String,
    pub top_n: usize,
    pub significance_level: f64,
    pub currency_label: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            search_dirs: vec![PathBuf::from("data"), PathBuf::from(".")],
            file_prefix: "out_".to_string(),
            file_extension: "csv".to_string(),
            top_n: 10,
            significance_level: 0.05,
            currency_label: "₩".to_string(),
        }
    }
}

impl DashboardConfig {
    /// Reads a TOML file when one is given, otherwise returns the defaults.
    /// Not validated here: CLI overrides still apply on top.
    pub fn load(path: Option<&Path>) -> Result<Self, DashboardError> {
        match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| DashboardError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_toml(&raw)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_toml(raw: &str) -> Result<Self, DashboardError> {
        toml::from_str(raw).map_err(|err| DashboardError::InvalidConfig {
            field: "config".to_string(),
            details: err.to_string(),
        })
    }

    pub fn with_data_dir(mut self, dir: PathBuf) -> Self {
        self.search_dirs.retain(|existing| existing != &dir);
        self.search_dirs.insert(0, dir);
        self
    }

    pub fn validate(&self) -> Result<(), DashboardError> {
        if self.top_n == 0 {
            return Err(DashboardError::InvalidConfig {
                field: "top_n".to_string(),
                details: "must be at least 1".to_string(),
            });
        }
        if !(self.significance_level > 0.0 && self.significance_level <= 1.0) {
            return Err(DashboardError::InvalidConfig {
                field: "significance_level".to_string(),
                details: format!("{} is outside (0, 1]", self.significance_level),
            });
        }
        if self.search_dirs.is_empty() {
            return Err(DashboardError::InvalidConfig {
                field: "search_dirs".to_string(),
                details: "at least one directory is required".to_string(),
            });
        }
        Ok(())
    }
}

/// Everything a render needs, built once at startup.
pub struct AppContext {
    pub config: DashboardConfig,
    pub cache: TableCache,
}

impl AppContext {
    pub fn new(config: DashboardConfig) -> Self {
        Self {
            config,
            cache: TableCache::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_search_data_dir_before_working_dir() {
        let config = DashboardConfig::default();
        assert_eq!(
            config.search_dirs,
            vec![PathBuf::from("data"), PathBuf::from(".")]
        );
        assert_eq!(config.top_n, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_remaining_defaults() {
        let config = DashboardConfig::from_toml("top_n = 5\nsignificance_level = 0.01\n").unwrap();
        assert_eq!(config.top_n, 5);
        assert_eq!(config.significance_level, 0.01);
        assert_eq!(config.file_prefix, "out_");
    }

    #[test]
    fn data_dir_override_moves_to_front_without_duplicates() {
        let config = DashboardConfig::default().with_data_dir(PathBuf::from("."));
        assert_eq!(
            config.search_dirs,
            vec![PathBuf::from("."), PathBuf::from("data")]
        );
    }

    #[test]
    fn rejects_zero_top_n_and_bad_threshold() {
        let config = DashboardConfig {
            top_n: 0,
            ..DashboardConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(DashboardError::InvalidConfig { ref field, .. }) if field == "top_n"
        ));

        let config = DashboardConfig {
            significance_level: 1.5,
            ..DashboardConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn cli_override_can_repair_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dashboard.toml");
        std::fs::write(&path, "top_n = 0\n").unwrap();

        let mut config = DashboardConfig::load(Some(path.as_path())).unwrap();
        assert!(config.validate().is_err());
        config.top_n = 5;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unreadable_config_path_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            DashboardConfig::load(Some(dir.path().join("absent.toml").as_path())),
            Err(DashboardError::Io { .. })
        ));
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        assert!(matches!(
            DashboardConfig::from_toml("top_n = \"ten\""),
            Err(DashboardError::InvalidConfig { .. })
        ));
    }
}
