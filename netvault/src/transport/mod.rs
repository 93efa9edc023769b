//! Uniform byte-stream transports.
//!
//! A device is reached over the first transport in its comma-separated
//! preference list that connects: SSH (interactive shell with PTY), TELNET
//! (with option refusal), plain TCP, or a local child process for models
//! that run a program instead of dialing.

pub mod config;
mod process;
mod ssh;
pub mod telnet;

use std::fmt;
use std::time::Duration;

use log::{debug, warn};
use secrecy::SecretString;
use tokio::net::TcpStream;
use tokio::time::Instant;

pub use config::{DialOptions, HostKeyVerification, SshConfig};
pub use process::ProcessStream;
pub use ssh::SshStream;
pub use telnet::TelnetStream;

use crate::error::TransportError;

/// Transport variants a device may be reached over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    Ssh,
    Telnet,
    Tcp,
    Process,
}

impl TransportKind {
    /// Parse one preference token. Unknown tokens fall back to plain TCP.
    pub fn from_token(token: &str) -> Self {
        match token.trim().to_ascii_lowercase().as_str() {
            "ssh" => TransportKind::Ssh,
            "telnet" => TransportKind::Telnet,
            _ => TransportKind::Tcp,
        }
    }

    /// Parse a comma-separated preference list.
    pub fn parse_list(transports: &str) -> Vec<Self> {
        transports.split(',').map(Self::from_token).collect()
    }

    /// Port used when the host carries none.
    pub fn default_port(self) -> Option<u16> {
        match self {
            TransportKind::Ssh => Some(22),
            TransportKind::Telnet => Some(23),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransportKind::Ssh => "ssh",
            TransportKind::Telnet => "telnet",
            TransportKind::Tcp => "tcp",
            TransportKind::Process => "run",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append `:default_port` to `host` unless it already carries a port.
pub fn force_host_port(host: &str, default_port: &str) -> String {
    if host.contains(':') {
        host.to_string()
    } else {
        format!("{}:{}", host, default_port)
    }
}

/// Split `host:port`, accepting bracketed IPv6 literals.
fn split_host_port(addr: &str) -> Option<(String, u16)> {
    let (host, port) = addr.rsplit_once(':')?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    Some((host.to_string(), port.parse().ok()?))
}

/// Where and as whom to connect.
#[derive(Debug, Clone)]
pub struct Endpoint<'a> {
    pub model: &'a str,
    pub device_id: &'a str,
    pub host_port: &'a str,
    pub transports: &'a str,
    pub user: &'a str,
    pub password: &'a str,
}

/// A connected stream and how it was obtained.
pub struct Opened {
    pub stream: Stream,
    pub kind: TransportKind,
    /// True when the transport authenticated on its own (SSH).
    pub logged: bool,
}

enum Inner {
    Tcp(TcpStream),
    Telnet(TelnetStream<TcpStream>),
    Ssh(Box<SshStream>),
    Process(ProcessStream),
}

/// Deadline-bearing byte stream over any transport.
pub struct Stream {
    inner: Inner,
    read_deadline: Option<Instant>,
    write_deadline: Option<Instant>,
}

impl Stream {
    fn new(inner: Inner) -> Self {
        Self {
            inner,
            read_deadline: None,
            write_deadline: None,
        }
    }

    /// Wrap an already connected plain TCP stream.
    pub fn from_tcp(tcp: TcpStream) -> Self {
        Self::new(Inner::Tcp(tcp))
    }

    /// Wrap a running child process.
    pub fn from_process(process: ProcessStream) -> Self {
        Self::new(Inner::Process(process))
    }

    pub fn kind(&self) -> TransportKind {
        match self.inner {
            Inner::Tcp(_) => TransportKind::Tcp,
            Inner::Telnet(_) => TransportKind::Telnet,
            Inner::Ssh(_) => TransportKind::Ssh,
            Inner::Process(_) => TransportKind::Process,
        }
    }

    pub fn set_read_deadline(&mut self, deadline: Instant) {
        self.read_deadline = Some(deadline);
    }

    pub fn set_write_deadline(&mut self, deadline: Instant) {
        self.write_deadline = Some(deadline);
    }

    /// Read once. `Ok(0)` is EOF.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let deadline = self.read_deadline;
        let started = Instant::now();
        let read = async {
            match &mut self.inner {
                Inner::Tcp(s) => {
                    use tokio::io::AsyncReadExt;
                    s.read(buf).await.map_err(TransportError::from)
                }
                Inner::Telnet(s) => s.read(buf).await,
                Inner::Ssh(s) => s.read(buf).await,
                Inner::Process(s) => s.read(buf).await,
            }
        };
        match deadline {
            Some(d) => tokio::time::timeout_at(d, read)
                .await
                .map_err(|_| TransportError::Timeout(started.elapsed()))?,
            None => read.await,
        }
    }

    /// Write the whole buffer.
    pub async fn write(&mut self, buf: &[u8]) -> Result<usize, TransportError> {
        let deadline = self.write_deadline;
        let started = Instant::now();
        let write = async {
            match &mut self.inner {
                Inner::Tcp(s) => {
                    use tokio::io::AsyncWriteExt;
                    s.write_all(buf)
                        .await
                        .map(|_| buf.len())
                        .map_err(TransportError::from)
                }
                Inner::Telnet(s) => s.write(buf).await,
                Inner::Ssh(s) => s.write(buf).await,
                Inner::Process(s) => s.write(buf).await,
            }
        };
        match deadline {
            Some(d) => tokio::time::timeout_at(d, write)
                .await
                .map_err(|_| TransportError::Timeout(started.elapsed()))?,
            None => write.await,
        }
    }

    pub async fn close(self) -> Result<(), TransportError> {
        match self.inner {
            Inner::Tcp(mut s) => {
                use tokio::io::AsyncWriteExt;
                s.shutdown().await?;
                Ok(())
            }
            Inner::Telnet(mut s) => s.shutdown().await,
            Inner::Ssh(s) => s.close().await,
            Inner::Process(s) => s.close().await,
        }
    }
}

async fn dial_tcp(addr: &str, timeout: Duration) -> Result<TcpStream, TransportError> {
    tokio::time::timeout(timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| TransportError::Timeout(timeout))?
        .map_err(|source| TransportError::ConnectionFailed {
            addr: addr.to_string(),
            source,
        })
}

async fn open_one(
    kind: TransportKind,
    endpoint: &Endpoint<'_>,
    opts: &DialOptions,
) -> Result<Stream, TransportError> {
    let addr = match kind.default_port() {
        Some(port) => force_host_port(endpoint.host_port, &port.to_string()),
        None => endpoint.host_port.to_string(),
    };

    match kind {
        TransportKind::Ssh => {
            let (host, port) =
                split_host_port(&addr).ok_or_else(|| TransportError::ConnectionFailed {
                    addr: addr.clone(),
                    source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "bad host:port"),
                })?;
            let config = SshConfig {
                host,
                port,
                username: endpoint.user.to_string(),
                password: SecretString::from(endpoint.password.to_string()),
                timeout: opts.dial_timeout,
                terminal_width: config::PTY_WIDTH,
                terminal_height: config::PTY_HEIGHT,
                host_key_verification: opts.host_key_verification.clone(),
                known_hosts_path: opts.known_hosts_path.clone(),
            };
            let ssh = SshStream::open(config).await?;
            Ok(Stream::new(Inner::Ssh(Box::new(ssh))))
        }
        TransportKind::Telnet => {
            let tcp = dial_tcp(&addr, opts.dial_timeout).await?;
            Ok(Stream::new(Inner::Telnet(TelnetStream::new(tcp))))
        }
        TransportKind::Tcp | TransportKind::Process => {
            let tcp = dial_tcp(&addr, opts.dial_timeout).await?;
            Ok(Stream::new(Inner::Tcp(tcp)))
        }
    }
}

/// Connect over the first transport in the preference list that works.
pub async fn open(endpoint: &Endpoint<'_>, opts: &DialOptions) -> Result<Opened, TransportError> {
    let mut last = None;

    for kind in TransportKind::parse_list(endpoint.transports) {
        match open_one(kind, endpoint, opts).await {
            Ok(stream) => {
                debug!(
                    "{} {} {}: connected over {}",
                    endpoint.model, endpoint.device_id, endpoint.host_port, kind
                );
                return Ok(Opened {
                    stream,
                    kind,
                    logged: kind == TransportKind::Ssh,
                });
            }
            Err(e) => {
                warn!(
                    "{} {} {}: {} failed: {}",
                    endpoint.model, endpoint.device_id, endpoint.host_port, kind, e
                );
                last = Some(e);
            }
        }
    }

    Err(TransportError::Exhausted {
        addr: endpoint.host_port.to_string(),
        tried: endpoint.transports.to_string(),
        last: Box::new(last.unwrap_or(TransportError::Disconnected)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_force_host_port() {
        assert_eq!(force_host_port("10.0.0.1", "23"), "10.0.0.1:23");
        assert_eq!(force_host_port("10.0.0.1:2001", "23"), "10.0.0.1:2001");
        assert_eq!(force_host_port("router", "22"), "router:22");
    }

    #[test]
    fn test_parse_transport_list() {
        assert_eq!(
            TransportKind::parse_list("ssh, telnet,bogus"),
            vec![TransportKind::Ssh, TransportKind::Telnet, TransportKind::Tcp]
        );
        assert_eq!(TransportKind::parse_list(""), vec![TransportKind::Tcp]);
    }

    #[test]
    fn test_split_host_port() {
        assert_eq!(split_host_port("h:22"), Some(("h".to_string(), 22)));
        assert_eq!(split_host_port("[::1]:2222"), Some(("::1".to_string(), 2222)));
        assert_eq!(split_host_port("h"), None);
    }

    #[tokio::test]
    async fn test_open_first_working_transport_wins() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let _ = listener.accept().await;
        });

        let endpoint = Endpoint {
            model: "test",
            device_id: "d",
            host_port: &addr,
            transports: "tcp,telnet",
            user: "",
            password: "",
        };
        let opened = open(&endpoint, &DialOptions::default()).await.unwrap();
        assert_eq!(opened.kind, TransportKind::Tcp);
        assert!(!opened.logged);
    }

    #[tokio::test]
    async fn test_open_reports_exhaustion() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let endpoint = Endpoint {
            model: "test",
            device_id: "d",
            host_port: &addr,
            transports: "telnet",
            user: "",
            password: "",
        };
        let err = match open(&endpoint, &DialOptions::default()).await {
            Ok(_) => panic!("dial should fail"),
            Err(e) => e,
        };
        assert!(matches!(err, TransportError::Exhausted { .. }));
    }
}
