//! Error types for netvault.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::driver::FetchCode;

/// Main error type for netvault operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Transport-level errors (dial, TELNET, SSH, child process)
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Match primitive errors
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Dialog phase errors
    #[error("Dialog error: {0}")]
    Dialog(#[from] DialogError),

    /// Device table errors
    #[error("Table error: {0}")]
    Table(#[from] TableError),

    /// Repository store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration marshal errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Transport layer errors.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to connect to host
    #[error("Connection failed to {addr}: {source}")]
    ConnectionFailed {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// Every transport in the preference list failed
    #[error("All transports failed for {addr} ({tried}): {last}")]
    Exhausted {
        addr: String,
        tried: String,
        last: Box<TransportError>,
    },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// Host key was not found in known_hosts (strict mode)
    #[error("Unknown host key for {host}:{port}")]
    HostKeyUnknown { host: String, port: u16 },

    /// Host key does not match the known_hosts entry
    #[error("Host key changed for {host}:{port} (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// Child process could not be spawned
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// Child process program list was empty
    #[error("Empty program list")]
    EmptyProgram,

    /// A TELNET read carried only option negotiation, no payload
    #[error("TELNET negotiation only")]
    TelnetNegotiationOnly,

    /// Connection was closed unexpectedly
    #[error("Connection disconnected")]
    Disconnected,

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    /// Whether this error is a deadline expiry.
    pub fn is_timeout(&self) -> bool {
        match self {
            TransportError::Timeout(_) => true,
            TransportError::Io(e) => e.kind() == io::ErrorKind::TimedOut,
            _ => false,
        }
    }
}

/// Match primitive errors.
#[derive(Error, Debug)]
pub enum ChannelError {
    /// One read did not return within the read timeout
    #[error("match: read timed out")]
    ReadTimeout,

    /// No pattern matched within the match timeout
    #[error("match: timed out")]
    MatchTimeout,

    /// Peer closed the stream while a prompt was expected
    #[error("match: unexpected EOF")]
    UnexpectedEof,

    /// Transport failure while reading
    #[error("match: read error: {0}")]
    Read(#[source] TransportError),

    /// Transport failure while writing
    #[error("send error: {0}")]
    Send(#[source] TransportError),

    /// Invalid regex pattern
    #[error("Invalid regex pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// A dialog phase failure, tagged with the code reported on the fetch result.
#[derive(Error, Debug)]
#[error("{phase}: {source}")]
pub struct DialogError {
    pub code: FetchCode,
    pub phase: &'static str,
    #[source]
    pub source: ChannelError,
}

impl DialogError {
    pub fn new(code: FetchCode, phase: &'static str, source: ChannelError) -> Self {
        Self {
            code,
            phase,
            source,
        }
    }
}

/// Device table errors.
#[derive(Error, Debug)]
pub enum TableError {
    /// Insert of an id that already exists
    #[error("Device '{id}' already exists")]
    DeviceExists { id: String },

    /// Lookup of an id that does not exist
    #[error("Device '{id}' not found")]
    DeviceNotFound { id: String },

    /// Device references an unregistered model
    #[error("Unknown model '{name}'")]
    UnknownModel { name: String },

    /// Model name registered twice
    #[error("Model '{name}' already registered")]
    ModelExists { name: String },
}

/// Repository store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A previous write left its temporary file behind
    #[error("Temporary file exists: {}", .0.display())]
    TmpExists(PathBuf),

    /// No snapshot exists under the prefix
    #[error("No snapshot found for {}", .0.display())]
    NoSnapshot(PathBuf),

    /// Filesystem operation failed
    #[error("{op} {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        StoreError::Io {
            op,
            path: path.into(),
            source,
        }
    }
}

/// Configuration marshal errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// TOML could not be decoded
    #[error("Decode error: {0}")]
    Decode(#[from] toml::de::Error),

    /// TOML could not be encoded
    #[error("Encode error: {0}")]
    Encode(#[from] toml::ser::Error),

    /// Device text line was malformed
    #[error("Line {line}: {message}")]
    DeviceLine { line: usize, message: String },

    /// Duration text was malformed
    #[error("Invalid duration '{0}'")]
    Duration(String),

    /// Loaded snapshot was not UTF-8
    #[error("Config is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Result type alias using netvault's Error.
pub type Result<T> = std::result::Result<T, Error>;
