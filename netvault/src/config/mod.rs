//! Process configuration: global options plus the device list, marshalled
//! as TOML and versioned in the repository store like any capture.

pub mod duration;

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Error, Result};
use crate::store::{Prefix, Repository};
use crate::table::Device;

/// Application name, used for the config and log file names.
pub const APP_NAME: &str = "netvault";

/// Environment variable overriding the home directory.
pub const HOME_ENV: &str = "HOME_DIR";

/// Who changed a record, when and from where.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Change {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub when: Option<DateTime<Utc>>,
    pub by: String,
    pub from: String,
}

impl Change {
    pub fn now(by: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            when: Some(Utc::now()),
            by: by.into(),
            from: from.into(),
        }
    }
}

/// Global scan options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Pause between the start of two scan rounds.
    #[serde(with = "duration")]
    pub scan_interval: Duration,
    /// Minimum interval between two successful fetches of one device.
    #[serde(with = "duration")]
    pub holdtime: Duration,
    /// Snapshots kept per device; 0 keeps all.
    pub max_config_files: usize,
    /// Fetches running at once.
    pub max_concurrency: usize,
    pub last_change: Change,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_secs(10 * 60),
            holdtime: Duration::from_secs(12 * 3600),
            max_config_files: 120,
            max_concurrency: 20,
            last_change: Change::default(),
        }
    }
}

/// The whole configuration record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub options: Options,
    pub devices: Vec<Device>,
}

impl AppConfig {
    /// Decode from TOML text.
    pub fn load(text: &str) -> std::result::Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Encode as TOML text.
    pub fn dump(&self) -> std::result::Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }
}

/// Persisted state layout under the home directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub home: PathBuf,
    /// Prefix of the versioned config snapshots.
    pub config_prefix: PathBuf,
    pub repository: PathBuf,
    pub log_prefix: PathBuf,
}

impl Paths {
    /// Layout rooted at `home`.
    pub fn new(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            config_prefix: home.join("etc").join(format!("{}.conf.", APP_NAME)),
            repository: home.join("repo"),
            log_prefix: home.join("log").join(format!("{}.log.", APP_NAME)),
            home,
        }
    }

    /// Layout rooted at `$HOME_DIR`, else `<user home>/netvault`.
    pub fn from_env() -> Self {
        let home = env::var_os(HOME_ENV)
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|h| h.join(APP_NAME)))
            .unwrap_or_else(|| PathBuf::from(APP_NAME));
        Self::new(home)
    }

    /// Create every directory of the layout.
    pub fn create_dirs(&self) -> Result<()> {
        let dirs = [
            self.config_prefix.parent(),
            Some(self.repository.as_path()),
            self.log_prefix.parent(),
        ];
        for dir in dirs.into_iter().flatten() {
            std::fs::create_dir_all(dir)
                .map_err(|e| crate::error::StoreError::io("mkdir", dir, e))?;
        }
        Ok(())
    }
}

/// Save `config` as a new config snapshot unless it is unchanged.
pub fn save(
    repo: &Repository,
    config_prefix: &Path,
    config: &AppConfig,
    max_files: usize,
) -> Result<PathBuf> {
    let text = config.dump()?;
    let path = repo.save_new_config(
        &Prefix::new(config_prefix),
        max_files,
        |buf| {
            buf.extend_from_slice(text.as_bytes());
            Ok(())
        },
        true,
        "application/toml",
    )?;
    info!("config: saved {}", path.display());
    Ok(path)
}

/// Load the latest config snapshot; a fresh default when none exists.
pub fn load(repo: &Repository, config_prefix: &Path) -> Result<AppConfig> {
    let prefix = Prefix::new(config_prefix);
    match repo.read_last(&prefix) {
        Ok(data) => {
            let text = String::from_utf8(data).map_err(ConfigError::from)?;
            Ok(AppConfig::load(&text)?)
        }
        Err(crate::error::StoreError::NoSnapshot(_)) => {
            info!("config: no snapshot under {}, starting empty", config_prefix.display());
            Ok(AppConfig::default())
        }
        Err(e) => Err(Error::from(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::vendors;

    fn sample() -> AppConfig {
        let mut device = Device::new(
            "r1",
            &vendors::cisco_ios::model(),
            "10.0.0.1",
            "telnet,ssh",
            "lab",
            "pass",
            "en",
        );
        device.debug = true;
        device.last_change = Change {
            when: Some("2024-05-01T12:00:00Z".parse().unwrap()),
            by: "import".to_string(),
            from: "stdin".to_string(),
        };

        AppConfig {
            options: Options {
                scan_interval: Duration::from_secs(300),
                ..Default::default()
            },
            devices: vec![device],
        }
    }

    #[test]
    fn test_dump_load_roundtrip() {
        let config = sample();
        let text = config.dump().unwrap();
        let loaded = AppConfig::load(&text).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.dump().unwrap(), text);
    }

    #[test]
    fn test_dump_uses_duration_text() {
        let text = sample().dump().unwrap();
        assert!(text.contains("scan_interval = \"5m\""));
        assert!(text.contains("holdtime = \"12h\""));
        assert!(text.contains("[[devices]]"));
    }

    #[test]
    fn test_load_fills_defaults() {
        let config = AppConfig::load("[options]\nmax_concurrency = 4\n").unwrap();
        assert_eq!(config.options.max_concurrency, 4);
        assert_eq!(config.options.max_config_files, 120);
        assert!(config.devices.is_empty());
    }

    #[test]
    fn test_load_rejects_bad_duration() {
        assert!(AppConfig::load("[options]\nholdtime = \"soon\"\n").is_err());
    }

    #[test]
    fn test_paths_layout() {
        let paths = Paths::new("/srv/nv");
        assert_eq!(paths.config_prefix, PathBuf::from("/srv/nv/etc/netvault.conf."));
        assert_eq!(paths.repository, PathBuf::from("/srv/nv/repo"));
    }

    #[test]
    fn test_save_and_load_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::new(dir.path());
        paths.create_dirs().unwrap();
        let repo = Repository::local();

        assert_eq!(load(&repo, &paths.config_prefix).unwrap(), AppConfig::default());

        let config = sample();
        let first = save(&repo, &paths.config_prefix, &config, 10).unwrap();
        let again = save(&repo, &paths.config_prefix, &config, 10).unwrap();
        assert_eq!(first, again);
        assert!(first.ends_with("netvault.conf.0"));

        assert_eq!(load(&repo, &paths.config_prefix).unwrap(), config);
    }
}
