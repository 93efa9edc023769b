//! Transport configuration.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

/// Fixed per-attempt dial timeout.
pub const DIAL_TIMEOUT: Duration = Duration::from_secs(10);

/// PTY columns requested on SSH shells.
pub const PTY_WIDTH: u32 = 80;

/// PTY rows requested on SSH shells.
pub const PTY_HEIGHT: u32 = 40;

/// Host key verification mode, analogous to OpenSSH's `StrictHostKeyChecking`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum HostKeyVerification {
    /// Reject unknown and changed keys. Connection fails if the host
    /// is not already in known_hosts.
    Strict,

    /// Accept and auto-learn unknown keys, but reject changed keys.
    AcceptNew,

    /// Accept all keys without checking. Network gear regenerates host
    /// keys on reimage, so this is the default for fleet scans.
    #[default]
    Disabled,
}

/// Options shared by every dial attempt of a fetch.
#[derive(Debug, Clone)]
pub struct DialOptions {
    /// Per-attempt dial timeout.
    pub dial_timeout: Duration,

    /// SSH host key verification mode.
    pub host_key_verification: HostKeyVerification,

    /// Path to known_hosts file (None for the user default).
    pub known_hosts_path: Option<PathBuf>,
}

impl Default for DialOptions {
    fn default() -> Self {
        Self {
            dial_timeout: DIAL_TIMEOUT,
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
        }
    }
}

/// Parameters of one SSH dial.
#[derive(Debug)]
pub struct SshConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    /// Bounds the handshake and the authentication exchange separately.
    pub timeout: Duration,
    pub terminal_width: u32,
    pub terminal_height: u32,
    pub host_key_verification: HostKeyVerification,
    /// `None` uses the user's known_hosts.
    pub known_hosts_path: Option<PathBuf>,
}

impl SshConfig {
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
