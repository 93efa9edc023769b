//! Child-process transport.
//!
//! Runs a configured program and exposes its merged stdout/stderr as the
//! read side and its stdin as the write side. Process exit is EOF.

use std::process::Stdio;
use std::time::Duration;

use bytes::BytesMut;
use log::{debug, warn};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::error::TransportError;

const PUMP_CHUNK: usize = 4096;

/// Byte stream over a child process.
pub struct ProcessStream {
    program: String,
    child: Child,
    stdin: Option<ChildStdin>,
    output: mpsc::Receiver<Vec<u8>>,
    pending: BytesMut,
    deadline: Instant,
    run_timeout: Duration,
}

impl ProcessStream {
    /// Spawn `argv` with `env` added to the inherited environment.
    ///
    /// The whole run is bounded by `run_timeout`; a zero timeout means unbounded.
    pub fn spawn(
        argv: &[String],
        env: &[(String, String)],
        run_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let (program, args) = argv.split_first().ok_or(TransportError::EmptyProgram)?;

        let mut child = Command::new(program)
            .args(args)
            .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TransportError::Spawn {
                program: program.clone(),
                source,
            })?;

        let (tx, rx) = mpsc::channel(32);
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(pump(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(pump(stderr, tx));
        }

        let run_timeout = if run_timeout.is_zero() {
            Duration::from_secs(365 * 24 * 3600)
        } else {
            run_timeout
        };

        debug!("run: spawned '{}' pid={:?}", program, child.id());

        Ok(Self {
            program: program.clone(),
            stdin: child.stdin.take(),
            child,
            output: rx,
            pending: BytesMut::new(),
            deadline: Instant::now() + run_timeout,
            run_timeout,
        })
    }

    pub(crate) async fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        if self.pending.is_empty() {
            match tokio::time::timeout_at(self.deadline, self.output.recv()).await {
                Err(_) => {
                    warn!(
                        "run: '{}' exceeded run timeout {:?}, killing",
                        self.program, self.run_timeout
                    );
                    let _ = self.child.start_kill();
                    return Err(TransportError::Timeout(self.run_timeout));
                }
                Ok(None) => return Ok(0),
                Ok(Some(chunk)) => self.pending.extend_from_slice(&chunk),
            }
        }

        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending.split_to(n));
        Ok(n)
    }

    pub(crate) async fn write(&mut self, buf: &[u8]) -> Result<usize, TransportError> {
        let stdin = self.stdin.as_mut().ok_or(TransportError::Disconnected)?;
        stdin.write_all(buf).await?;
        stdin.flush().await?;
        Ok(buf.len())
    }

    pub(crate) async fn close(mut self) -> Result<(), TransportError> {
        drop(self.stdin.take());
        if self.child.try_wait()?.is_none() {
            let _ = self.child.start_kill();
        }
        let status = self.child.wait().await?;
        debug!("run: '{}' finished: {}", self.program, status);
        Ok(())
    }
}

/// Forward everything from `reader` to `tx` until EOF.
async fn pump<R>(mut reader: R, tx: mpsc::Sender<Vec<u8>>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; PUMP_CHUNK];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if tx.send(buf[..n].to_vec()).await.is_err() {
                    break;
                }
            }
        }
    }
}
