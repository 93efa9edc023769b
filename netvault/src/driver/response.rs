//! Fetch outcome types.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Outcome code carried on every fetch result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchCode {
    /// Success.
    None,
    /// Device not found in the table.
    GetDev,
    /// Every transport failed to connect.
    Transport,
    /// Authentication dialog did not complete.
    Login,
    /// Could not reach enabled mode.
    Enable,
    /// Could not disable the pager.
    Pager,
    /// A command step failed.
    Commands,
    /// Repository write failed.
    Save,
    /// A fetch for the same device was already running.
    Busy,
}

impl FetchCode {
    pub fn as_str(self) -> &'static str {
        match self {
            FetchCode::None => "NONE",
            FetchCode::GetDev => "GETDEV",
            FetchCode::Transport => "TRANSPORT",
            FetchCode::Login => "LOGIN",
            FetchCode::Enable => "ENABLE",
            FetchCode::Pager => "PAGER",
            FetchCode::Commands => "COMMANDS",
            FetchCode::Save => "SAVE",
            FetchCode::Busy => "BUSY",
        }
    }

    pub fn is_success(self) -> bool {
        self == FetchCode::None
    }
}

impl fmt::Display for FetchCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one fetch.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub model: String,
    pub dev_id: String,
    pub host_port: String,
    /// Transport the dialog ran over; empty when none connected.
    pub transport: String,
    pub code: FetchCode,
    pub message: String,
    pub begin: DateTime<Utc>,
    pub elapsed: Duration,
}

impl FetchResult {
    pub fn new(
        model: impl Into<String>,
        dev_id: impl Into<String>,
        host_port: impl Into<String>,
        begin: DateTime<Utc>,
    ) -> Self {
        Self {
            model: model.into(),
            dev_id: dev_id.into(),
            host_port: host_port.into(),
            transport: String::new(),
            code: FetchCode::None,
            message: String::new(),
            begin,
            elapsed: Duration::ZERO,
        }
    }

    /// Create a failed result.
    pub fn failed(mut self, code: FetchCode, message: impl Into<String>) -> Self {
        self.code = code;
        self.message = message.into();
        self
    }

    pub fn is_success(&self) -> bool {
        self.code.is_success()
    }

    /// One-line summary as written to the error log.
    pub fn errlog_line(&self) -> String {
        format!(
            "{} success={} model={} dev={} host={} transport={} code={} msg={}",
            self.begin.to_rfc3339(),
            self.is_success(),
            self.model,
            self.dev_id,
            self.host_port,
            self.transport,
            self.code,
            self.message.replace(['\r', '\n'], " "),
        )
    }
}

impl fmt::Display for FetchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}: {} in {:?}",
            self.model, self.dev_id, self.host_port, self.code, self.elapsed
        )?;
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        Ok(())
    }
}
