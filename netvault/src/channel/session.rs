//! Prompt-driven session over a transport stream.
//!
//! [`Session::expect`] is the match primitive every dialog phase is built
//! on: it reads with a per-read deadline, filters what arrived and checks
//! the candidate lines against an ordered [`PromptSet`].

use std::time::Duration;

use log::{debug, info};
use tokio::time::Instant;

use super::buffer::DialogBuffer;
use super::patterns::PromptSet;
use crate::error::{ChannelError, TransportError};
use crate::transport::Stream;

const READ_CHUNK: usize = 8192;

/// Deadlines applied by the match primitive and the send helpers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Bound on each single read.
    pub read: Duration,
    /// Bound on one whole match call.
    pub matching: Duration,
    /// Bound on each write.
    pub send: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            read: Duration::from_secs(10),
            matching: Duration::from_secs(20),
            send: Duration::from_secs(5),
        }
    }
}

/// Per-session behavior taken from the device attributes.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub timeouts: Timeouts,
    pub keep_control_chars: bool,
    pub suppress_auto_lf: bool,
    /// Log every chunk read and every line sent.
    pub debug: bool,
    /// Prefix for log lines, usually `model device host`.
    pub label: String,
}

/// Outcome of a successful match.
#[derive(Debug, Clone)]
pub struct Matched {
    /// Index of the pattern that matched (0 for EOF).
    pub index: usize,
    /// Filtered output accumulated during the match call.
    pub buffer: Vec<u8>,
    /// The match ended on EOF rather than on a prompt.
    pub eof: bool,
}

/// A dialog session owning its transport stream.
pub struct Session {
    stream: Stream,
    config: SessionConfig,
}

impl Session {
    pub fn new(stream: Stream, config: SessionConfig) -> Self {
        Self { stream, config }
    }

    pub fn timeouts(&self) -> Timeouts {
        self.config.timeouts
    }

    /// Replace the timeouts, returning the previous ones.
    pub fn set_timeouts(&mut self, timeouts: Timeouts) -> Timeouts {
        std::mem::replace(&mut self.config.timeouts, timeouts)
    }

    pub fn label(&self) -> &str {
        &self.config.label
    }

    /// Read until one of `prompts` matches a candidate line.
    pub async fn expect(&mut self, prompts: &PromptSet) -> Result<Matched, ChannelError> {
        let begin = Instant::now();
        let mut buffer = DialogBuffer::new(self.config.keep_control_chars);
        let mut chunk = vec![0u8; READ_CHUNK];

        loop {
            self.stream
                .set_read_deadline(Instant::now() + self.config.timeouts.read);

            match self.stream.read(&mut chunk).await {
                Ok(0) => {
                    if prompts.accepts_eof() {
                        debug!("{}: match: EOF", self.config.label);
                        return Ok(Matched {
                            index: 0,
                            buffer: buffer.into_bytes(),
                            eof: true,
                        });
                    }
                    return Err(ChannelError::UnexpectedEof);
                }
                Ok(n) => {
                    let data = &chunk[..n];
                    if self.config.debug {
                        info!(
                            "{}: read {} bytes: {:?}",
                            self.config.label,
                            n,
                            String::from_utf8_lossy(data)
                        );
                    }

                    let start = buffer.extend(data);
                    if let Some(index) = buffer.find(prompts, start) {
                        debug!("{}: match: pattern {}", self.config.label, index);
                        return Ok(Matched {
                            index,
                            buffer: buffer.into_bytes(),
                            eof: false,
                        });
                    }
                }
                Err(TransportError::TelnetNegotiationOnly) => {}
                Err(e) if e.is_timeout() => return Err(ChannelError::ReadTimeout),
                Err(e) => return Err(ChannelError::Read(e)),
            }

            if begin.elapsed() > self.config.timeouts.matching {
                return Err(ChannelError::MatchTimeout);
            }
        }
    }

    /// Write raw bytes under the send timeout.
    pub async fn send(&mut self, data: &[u8]) -> Result<(), ChannelError> {
        self.stream
            .set_write_deadline(Instant::now() + self.config.timeouts.send);
        self.stream
            .write(data)
            .await
            .map(|_| ())
            .map_err(ChannelError::Send)
    }

    /// Write `line`, followed by LF unless auto-LF is suppressed.
    pub async fn sendln(&mut self, line: &str) -> Result<(), ChannelError> {
        if self.config.debug {
            info!("{}: send: {:?}", self.config.label, line);
        }
        self.write_line(line).await
    }

    /// Like [`Session::sendln`] but never logs the content.
    pub async fn sendln_secret(&mut self, secret: &str) -> Result<(), ChannelError> {
        if self.config.debug {
            info!("{}: send: <hidden>", self.config.label);
        }
        self.write_line(secret).await
    }

    async fn write_line(&mut self, line: &str) -> Result<(), ChannelError> {
        if self.config.suppress_auto_lf {
            return self.send(line.as_bytes()).await;
        }
        let mut data = Vec::with_capacity(line.len() + 1);
        data.extend_from_slice(line.as_bytes());
        data.push(b'\n');
        self.send(&data).await
    }

    /// Close the underlying stream.
    pub async fn close(self) -> Result<(), TransportError> {
        self.stream.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    async fn pair() -> (Session, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        let config = SessionConfig {
            timeouts: Timeouts {
                read: Duration::from_millis(300),
                matching: Duration::from_secs(2),
                send: Duration::from_secs(1),
            },
            ..Default::default()
        };
        (Session::new(Stream::from_tcp(client), config), server)
    }

    #[tokio::test]
    async fn test_expect_matches_prompt_split_across_writes() {
        let (mut session, mut server) = pair().await;
        tokio::spawn(async move {
            server.write_all(b"banner\r\nUser").await.unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;
            server.write_all(b"name: ").await.unwrap();
            tokio::time::sleep(Duration::from_secs(1)).await;
        });

        let prompts = PromptSet::compile(&[r"[Pp]assword:\s*$", r"Username:\s*$"]).unwrap();
        let matched = session.expect(&prompts).await.unwrap();
        assert_eq!(matched.index, 1);
        assert!(!matched.eof);
        assert_eq!(matched.buffer, b"banner\r\nUsername: ");
    }

    #[tokio::test]
    async fn test_expect_read_timeout() {
        let (mut session, _server) = pair().await;
        let prompts = PromptSet::compile(&[r"#\s*$"]).unwrap();
        let err = session.expect(&prompts).await.unwrap_err();
        assert!(matches!(err, ChannelError::ReadTimeout));
        assert_eq!(err.to_string(), "match: read timed out");
    }

    #[tokio::test]
    async fn test_expect_match_timeout_with_trickling_output() {
        let (mut session, mut server) = pair().await;
        session.set_timeouts(Timeouts {
            read: Duration::from_millis(500),
            matching: Duration::from_millis(200),
            send: Duration::from_secs(1),
        });
        tokio::spawn(async move {
            for _ in 0..20 {
                if server.write_all(b"noise\n").await.is_err() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        });

        let prompts = PromptSet::compile(&[r"#\s*$"]).unwrap();
        let err = session.expect(&prompts).await.unwrap_err();
        assert_eq!(err.to_string(), "match: timed out");
    }

    #[tokio::test]
    async fn test_expect_eof() {
        let (mut session, mut server) = pair().await;
        tokio::spawn(async move {
            server.write_all(b"config line\n").await.unwrap();
        });

        let prompts = PromptSet::compile(&[""]).unwrap();
        let matched = session.expect(&prompts).await.unwrap();
        assert!(matched.eof);
        assert_eq!(matched.index, 0);
        assert_eq!(matched.buffer, b"config line\n");
    }

    #[tokio::test]
    async fn test_expect_unexpected_eof() {
        let (mut session, server) = pair().await;
        drop(server);
        let prompts = PromptSet::compile(&[r"#\s*$"]).unwrap();
        let err = session.expect(&prompts).await.unwrap_err();
        assert!(matches!(err, ChannelError::UnexpectedEof));
    }

    #[tokio::test]
    async fn test_sendln_and_suppressed_lf() {
        let (mut session, mut server) = pair().await;
        session.sendln("show run").await.unwrap();
        session.config.suppress_auto_lf = true;
        session.sendln("q").await.unwrap();
        session.close().await.unwrap();

        let mut got = Vec::new();
        server.read_to_end(&mut got).await.unwrap();
        assert_eq!(got, b"show run\nq");
    }
}
