//! Device records and their whitespace-separated text form.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Change;
use crate::driver::FetchResult;
use crate::error::ConfigError;
use crate::platform::{Attributes, Model};

/// Runtime fetch status of a device. Not persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceStatus {
    pub last_try: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_elapsed: Duration,
    pub last_status: bool,
}

impl DeviceStatus {
    /// Record a fetch result. Results older than the last try are ignored
    /// so `last_success` never moves backwards.
    pub fn apply(&mut self, result: &FetchResult) -> bool {
        if self.last_try.is_some_and(|t| result.begin < t) {
            return false;
        }
        self.last_try = Some(result.begin);
        self.last_elapsed = result.elapsed;
        self.last_status = result.is_success();
        if self.last_status {
            self.last_success = Some(result.begin);
        }
        true
    }

    /// Forget the last success so the next scan fetches the device.
    pub fn clear(&mut self) {
        self.last_success = None;
        self.last_status = false;
    }
}

/// A device in the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub model: String,
    pub host_port: String,
    /// Comma-separated transport preference list.
    pub transports: String,
    pub login_user: String,
    pub login_password: String,
    #[serde(default)]
    pub enable_password: String,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub last_change: Change,
    /// Cloned from the model on creation, then edited per device.
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(skip)]
    pub status: DeviceStatus,
}

impl Device {
    pub fn new(
        id: impl Into<String>,
        model: &Model,
        host_port: impl Into<String>,
        transports: impl Into<String>,
        login_user: impl Into<String>,
        login_password: impl Into<String>,
        enable_password: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            model: model.name.clone(),
            host_port: host_port.into(),
            transports: transports.into(),
            login_user: login_user.into(),
            login_password: login_password.into(),
            enable_password: enable_password.into(),
            debug: false,
            deleted: false,
            last_change: Change::default(),
            attributes: model.attributes.clone(),
            status: DeviceStatus::default(),
        }
    }

    /// Remaining cooldown at `now`; positive means "skip for now".
    pub fn holdtime(&self, now: DateTime<Utc>, configured: Duration) -> TimeDelta {
        let Some(last_success) = self.status.last_success else {
            return TimeDelta::zero();
        };
        let configured = TimeDelta::from_std(configured).unwrap_or(TimeDelta::MAX);
        configured
            .checked_sub(&(now - last_success))
            .unwrap_or(TimeDelta::zero())
    }
}

/// One line of the device text form:
///
/// ```text
/// <model> <id> <hostPort> <transports> <user> <password> [<enable>] [<debug>]
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    pub model: String,
    pub id: String,
    pub host_port: String,
    pub transports: String,
    pub user: String,
    pub password: String,
    pub enable_password: String,
    pub debug: bool,
}

impl DeviceRecord {
    /// Parse one line. Blank lines and `#` comments yield `None`.
    pub fn parse(line: &str) -> Option<Result<Self, String>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 6 {
            return Some(Err(format!(
                "expected at least 6 fields, found {}",
                fields.len()
            )));
        }

        let enable_password = match fields.get(6) {
            None | Some(&".") => String::new(),
            Some(enable) => enable.to_string(),
        };

        Some(Ok(Self {
            model: fields[0].to_string(),
            id: fields[1].to_string(),
            host_port: fields[2].to_string(),
            transports: fields[3].to_string(),
            user: fields[4].to_string(),
            password: fields[5].to_string(),
            enable_password,
            debug: fields.len() > 7,
        }))
    }

    /// Parse a whole document, reporting the 1-based line of any error.
    pub fn parse_all(text: &str) -> Result<Vec<Self>, ConfigError> {
        text.lines()
            .enumerate()
            .filter_map(|(i, line)| {
                Self::parse(line).map(|r| {
                    r.map_err(|message| ConfigError::DeviceLine {
                        line: i + 1,
                        message,
                    })
                })
            })
            .collect()
    }
}

impl From<&Device> for DeviceRecord {
    fn from(device: &Device) -> Self {
        Self {
            model: device.model.clone(),
            id: device.id.clone(),
            host_port: device.host_port.clone(),
            transports: device.transports.clone(),
            user: device.login_user.clone(),
            password: device.login_password.clone(),
            enable_password: device.enable_password.clone(),
            debug: device.debug,
        }
    }
}

impl fmt::Display for DeviceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let enable = if self.enable_password.is_empty() {
            "."
        } else {
            &self.enable_password
        };
        write!(
            f,
            "{} {} {} {} {} {} {}",
            self.model, self.id, self.host_port, self.transports, self.user, self.password, enable
        )?;
        if self.debug {
            f.write_str(" debug")?;
        }
        Ok(())
    }
}
