//! TELNET option refusal layer (RFC 854).
//!
//! Every option the peer offers or requests is refused: `DO x` is answered
//! with `WONT x` and `WILL x` with `DONT x`. Negotiation bytes are stripped
//! from the payload before it reaches the dialog engine.

use bytes::{Buf, BytesMut};
use log::trace;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::TransportError;

pub const IAC: u8 = 255;
pub const DONT: u8 = 254;
pub const DO: u8 = 253;
pub const WONT: u8 = 252;
pub const WILL: u8 = 251;
pub const SB: u8 = 250;
pub const SE: u8 = 240;

/// Incomplete commands larger than this are discarded.
const MAX_PENDING: usize = 4096;

/// Stateful IAC parser that survives commands split across reads.
#[derive(Debug, Default)]
pub struct Negotiator {
    pending: BytesMut,
}

impl Negotiator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes; returns `(payload, replies)`.
    ///
    /// Any incomplete command at the end of `data` is kept for the next call.
    pub fn feed(&mut self, data: &[u8]) -> (Vec<u8>, Vec<u8>) {
        self.pending.extend_from_slice(data);

        let input = &self.pending[..];
        let mut payload = Vec::with_capacity(input.len());
        let mut replies = Vec::new();
        let mut i = 0;

        while i < input.len() {
            let b = input[i];
            if b != IAC {
                payload.push(b);
                i += 1;
                continue;
            }
            let Some(&cmd) = input.get(i + 1) else {
                break;
            };
            match cmd {
                IAC => {
                    payload.push(IAC);
                    i += 2;
                }
                DO | DONT | WILL | WONT => {
                    let Some(&opt) = input.get(i + 2) else {
                        break;
                    };
                    match cmd {
                        DO => replies.extend_from_slice(&[IAC, WONT, opt]),
                        WILL => replies.extend_from_slice(&[IAC, DONT, opt]),
                        _ => {}
                    }
                    trace!("telnet: cmd={} opt={}", cmd, opt);
                    i += 3;
                }
                SB => match find_subnegotiation_end(&input[i + 2..]) {
                    Some(end) => i += 2 + end,
                    None => break,
                },
                _ => i += 2,
            }
        }

        self.pending.advance(i);
        if self.pending.len() > MAX_PENDING {
            self.pending.clear();
        }

        (payload, replies)
    }
}

/// Offset just past `IAC SE`, if present.
fn find_subnegotiation_end(data: &[u8]) -> Option<usize> {
    data.windows(2)
        .position(|w| w == [IAC, SE])
        .map(|pos| pos + 2)
}

/// Double every IAC byte of outgoing payload.
pub fn escape(data: &[u8]) -> std::borrow::Cow<'_, [u8]> {
    if !data.contains(&IAC) {
        return std::borrow::Cow::Borrowed(data);
    }
    let mut out = Vec::with_capacity(data.len() + 4);
    for &b in data {
        out.push(b);
        if b == IAC {
            out.push(IAC);
        }
    }
    std::borrow::Cow::Owned(out)
}

/// A byte stream with TELNET negotiation filtered out.
///
/// Reads may be cancelled by a deadline at any await point: payload already
/// taken from the socket and replies not yet sent stay buffered for the
/// next call.
pub struct TelnetStream<S> {
    io: S,
    negotiator: Negotiator,
    payload: BytesMut,
    replies: BytesMut,
}

impl<S> TelnetStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(io: S) -> Self {
        Self {
            io,
            negotiator: Negotiator::new(),
            payload: BytesMut::new(),
            replies: BytesMut::new(),
        }
    }

    /// Read payload bytes.
    ///
    /// Returns [`TransportError::TelnetNegotiationOnly`] when the read
    /// carried nothing but negotiation, so callers can re-read without
    /// mistaking it for EOF.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        self.send_replies().await?;

        if self.payload.is_empty() {
            let n = self.io.read(buf).await?;
            if n == 0 {
                return Ok(0);
            }
            let (payload, replies) = self.negotiator.feed(&buf[..n]);
            self.payload.extend_from_slice(&payload);
            self.replies.extend_from_slice(&replies);
            self.send_replies().await?;
        }

        if self.payload.is_empty() {
            return Err(TransportError::TelnetNegotiationOnly);
        }
        let len = buf.len().min(self.payload.len());
        buf[..len].copy_from_slice(&self.payload.split_to(len));
        Ok(len)
    }

    /// Write queued negotiation replies, advancing past each partial write.
    async fn send_replies(&mut self) -> Result<(), TransportError> {
        if self.replies.is_empty() {
            return Ok(());
        }
        while !self.replies.is_empty() {
            let n = self.io.write(&self.replies).await?;
            if n == 0 {
                return Err(TransportError::Disconnected);
            }
            self.replies.advance(n);
        }
        self.io.flush().await?;
        Ok(())
    }

    pub async fn write(&mut self, buf: &[u8]) -> Result<usize, TransportError> {
        self.send_replies().await?;
        self.io.write_all(&escape(buf)).await?;
        self.io.flush().await?;
        Ok(buf.len())
    }

    pub async fn shutdown(&mut self) -> Result<(), TransportError> {
        self.io.shutdown().await?;
        Ok(())
    }
}
