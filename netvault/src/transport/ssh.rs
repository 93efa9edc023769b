//! SSH transport: an interactive shell channel with a PTY, read as one
//! merged byte stream.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use bytes::BytesMut;
use log::{debug, warn};
use russh::client::{self, Handle, Msg};
use russh::keys::PublicKey;
use russh::{Channel, ChannelMsg};
use secrecy::ExposeSecret;

use super::config::{HostKeyVerification, SshConfig};
use crate::error::TransportError;

/// Byte stream over an SSH shell channel.
///
/// Standard output and standard error are merged into a single read stream;
/// writes go to the shell's standard input.
pub struct SshStream {
    session: Handle<HostKeyCheck>,
    channel: Channel<Msg>,
    pending: BytesMut,
    eof: bool,
}

impl SshStream {
    /// Connect, authenticate with the device password and start a shell.
    pub async fn open(config: SshConfig) -> Result<Self, TransportError> {
        let addr = config.socket_addr();
        let rejected: Arc<Mutex<Option<TransportError>>> = Arc::default();
        let handler = HostKeyCheck {
            host: config.host.clone(),
            port: config.port,
            mode: config.host_key_verification.clone(),
            known_hosts_path: config.known_hosts_path.clone(),
            rejected: rejected.clone(),
        };
        let client_config = Arc::new(client::Config {
            inactivity_timeout: None,
            ..Default::default()
        });

        let mut session = tokio::time::timeout(
            config.timeout,
            client::connect(client_config, (config.host.as_str(), config.port), handler),
        )
        .await
        .map_err(|_| TransportError::Timeout(config.timeout))?
        .map_err(|e| {
            // russh only reports UnknownKey; surface the recorded reason
            let recorded = rejected.lock().ok().and_then(|mut slot| slot.take());
            recorded.unwrap_or(TransportError::Ssh(e))
        })?;

        let auth = session.authenticate_password(&config.username, config.password.expose_secret());
        let accepted = tokio::time::timeout(config.timeout, auth)
            .await
            .map_err(|_| TransportError::Timeout(config.timeout))??
            .success();
        if !accepted {
            return Err(TransportError::AuthenticationFailed {
                user: config.username.clone(),
            });
        }
        debug!("ssh: {}: authenticated as {}", addr, config.username);

        let channel = session.channel_open_session().await?;
        channel
            .request_pty(
                false,
                "vt100",
                config.terminal_width,
                config.terminal_height,
                0,
                0,
                &[],
            )
            .await?;
        channel.request_shell(false).await?;

        Ok(Self {
            session,
            channel,
            pending: BytesMut::new(),
            eof: false,
        })
    }

    pub(crate) async fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        while self.pending.is_empty() {
            if self.eof {
                return Ok(0);
            }
            match self.channel.wait().await {
                Some(ChannelMsg::Data { ref data }) => self.pending.extend_from_slice(data),
                Some(ChannelMsg::ExtendedData { ref data, .. }) => {
                    self.pending.extend_from_slice(data)
                }
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    debug!("ssh: shell exited with status {}", exit_status);
                }
                Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => self.eof = true,
                Some(_) => {}
            }
        }

        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending.split_to(n));
        Ok(n)
    }

    pub(crate) async fn write(&mut self, buf: &[u8]) -> Result<usize, TransportError> {
        self.channel.data(buf).await?;
        Ok(buf.len())
    }

    pub(crate) async fn close(self) -> Result<(), TransportError> {
        let _ = self.channel.eof().await;
        self.session
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await?;
        Ok(())
    }
}

/// russh handler applying the configured host key policy.
struct HostKeyCheck {
    host: String,
    port: u16,
    mode: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    /// Why the key was refused, read back by `open`.
    rejected: Arc<Mutex<Option<TransportError>>>,
}

impl HostKeyCheck {
    /// `Ok(false)` when the host is not listed.
    fn known(&self, key: &PublicKey) -> Result<bool, TransportError> {
        let listed = match &self.known_hosts_path {
            Some(path) => russh::keys::check_known_hosts_path(&self.host, self.port, key, path),
            None => russh::keys::check_known_hosts(&self.host, self.port, key),
        };
        match listed {
            Ok(found) => Ok(found),
            Err(russh::keys::Error::KeyChanged { line }) => Err(TransportError::HostKeyChanged {
                host: self.host.clone(),
                port: self.port,
                line,
            }),
            Err(e) => Err(TransportError::KnownHosts(e.to_string())),
        }
    }

    fn learn(&self, key: &PublicKey) {
        let learned = match &self.known_hosts_path {
            Some(path) => {
                russh::keys::known_hosts::learn_known_hosts_path(&self.host, self.port, key, path)
            }
            None => russh::keys::known_hosts::learn_known_hosts(&self.host, self.port, key),
        };
        if let Err(e) = learned {
            warn!("ssh: {}:{}: could not save host key: {}", self.host, self.port, e);
        }
    }

    fn reject(&self, err: TransportError) -> bool {
        if let Ok(mut slot) = self.rejected.lock() {
            *slot = Some(err);
        }
        false
    }
}

impl client::Handler for HostKeyCheck {
    type Error = russh::Error;

    async fn check_server_key(&mut self, key: &PublicKey) -> Result<bool, Self::Error> {
        if self.mode == HostKeyVerification::Disabled {
            return Ok(true);
        }
        match (self.known(key), &self.mode) {
            (Ok(true), _) => Ok(true),
            (Ok(false), HostKeyVerification::AcceptNew) => {
                self.learn(key);
                Ok(true)
            }
            (Ok(false), _) => Ok(self.reject(TransportError::HostKeyUnknown {
                host: self.host.clone(),
                port: self.port,
            })),
            (Err(e), _) => Ok(self.reject(e)),
        }
    }
}
